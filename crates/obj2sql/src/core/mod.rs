//! Core abstractions of the mapper.
//!
//! - [`class`] and [`object`]: the explicit class model (what reflection
//!   would provide in a dynamic language)
//! - [`value`]: runtime values and association references
//! - [`classify`]: primitive vs composite
//! - [`naming`]: table and column naming scheme
//! - [`identifier`]: quoting of dynamic identifiers
//! - [`schema`]: table and column metadata

pub mod class;
pub mod classify;
pub mod identifier;
pub mod naming;
pub mod object;
pub mod schema;
pub mod value;

pub use class::{ClassBuilder, ClassDef, ClassDescriptor, FieldDescriptor, Member, MemberKind};
pub use classify::{is_composite, is_opaque, is_primitive, is_primitive_class};
pub use naming::ColumnRole;
pub use object::{Object, ObjectId, Persistable};
pub use schema::{ColumnInfo, ColumnSpec, EngineInfo, StoredCell, StoredRow, TableSpec};
pub use value::{ArrayCode, AssociationRef, NumArray, Number, PrimitiveKind, Value};
