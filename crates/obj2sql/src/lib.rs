//! # obj2sql
//!
//! Object/class to relational mapper over SQLite.
//!
//! Classes are described explicitly with [`ClassDef`] and instances through
//! the [`Persistable`] trait (or the dynamic [`Object`]). The mapper derives
//! tables from the live class shape and keeps them in sync as classes change:
//!
//! - **Schema synthesis**: one table per class, `<module>$<Class>`, with
//!   role-prefixed member columns and a link column per base class
//! - **Schema evolution**: tables are rebuilt in place when members change
//! - **Graph persistence**: composite attributes are saved first and stored
//!   as association references; shared sub-objects and cycles are handled
//! - **Cascading delete** with a configurable policy for shared sub-objects
//! - **Catalog introspection** of tables, columns, sizes and stored rows
//!
//! ## Example
//!
//! ```rust,no_run
//! use obj2sql::{ClassDef, Config, Mapper, Object};
//!
//! fn main() -> obj2sql::Result<()> {
//!     let mapper = Mapper::open(&Config::load("obj2sql.yaml")?)?;
//!     let point = ClassDef::builder("geometry", "Point")
//!         .field("x", 0i64)
//!         .field("y", 0i64)
//!         .build();
//!     let p = Object::new(&point);
//!     p.set("x", 3i64);
//!     let row = mapper.save(&p.value())?;
//!     println!("Saved point in row {}", row);
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod codec;
pub mod config;
pub mod core;
pub mod error;
pub mod hierarchy;
pub mod mapper;
pub mod persist;
pub mod schema;
pub mod store;

// Re-exports for convenient access
pub use crate::core::{
    AssociationRef, ClassDef, ClassDescriptor, ColumnInfo, ColumnRole, EngineInfo, Object,
    ObjectId, Persistable, PrimitiveKind, StoredRow, Value,
};
pub use config::{CascadePolicy, Config, DatabaseConfig, MapperConfig};
pub use error::{MapperError, Result};
pub use mapper::Mapper;
pub use store::Store;
