//! Schema synthesis: class tables derived from class definitions.
//!
//! A class table is created on first use and rebuilt whenever the set of
//! declared members changes. Only the last-seen shape is kept. Class-bound
//! members and the current field defaults live on the sentinel row (`ID = 1`),
//! which is refreshed on every synthesis.

pub mod diff;
pub mod migrate;

use rusqlite::params_from_iter;
use tracing::{debug, info};

use crate::core::class::{ClassDef, MemberKind};
use crate::core::identifier::quote;
use crate::core::naming::SENTINEL_ROW_ID;
use crate::core::schema::{ColumnSpec, TableSpec};
use crate::core::value::{PrimitiveKind, Value};
use crate::error::{MapperError, Result};
use crate::mapper::Mapper;
use crate::persist::session::Session;

pub use diff::SchemaDiff;

/// Expected shape of a class table plus the values of its sentinel row.
#[derive(Debug, Clone)]
pub struct ClassSchema {
    pub spec: TableSpec,
    pub sentinel: Vec<(String, Option<String>)>,
}

impl Mapper {
    /// Make sure the table of `class` (and of every base) exists with the
    /// current shape. Returns the table name.
    pub fn ensure_class_schema(&self, class: &ClassDef) -> Result<String> {
        let mut session = Session::new();
        self.ensure_class_schema_in(class, &mut session)
    }

    /// Alias of [`Mapper::ensure_class_schema`].
    pub fn save_class(&self, class: &ClassDef) -> Result<String> {
        self.ensure_class_schema(class)
    }

    pub(crate) fn ensure_class_schema_in(
        &self,
        class: &ClassDef,
        session: &mut Session,
    ) -> Result<String> {
        let table = class.table_name();
        if session.schema_ready(&table) {
            return Ok(table);
        }
        if !session.begin_schema(&table) {
            return Err(MapperError::invalid(format!(
                "default values of {} form a schema cycle",
                table
            )));
        }

        for base in class.bases() {
            self.ensure_class_schema_in(base, session)?;
        }

        let schema = self.class_schema(class, session)?;
        let created = if self.store().table_exists(&table)? {
            false
        } else {
            match self.create_table(&schema.spec) {
                Ok(()) => true,
                Err(MapperError::SchemaConflict(name)) => {
                    debug!("Table {} appeared concurrently, diffing instead", name);
                    false
                }
                Err(e) => return Err(e),
            }
        };
        if !created {
            self.evolve_table(&schema.spec)?;
        }
        self.refresh_sentinel(&schema)?;

        session.finish_schema(&table);
        Ok(table)
    }

    /// Compute the current expected shape of a class table.
    ///
    /// Composite defaults are saved on the way, since their column default
    /// is their association reference.
    pub(crate) fn class_schema(&self, class: &ClassDef, session: &mut Session) -> Result<ClassSchema> {
        let mut spec = TableSpec::composite(class.table_name());
        let mut sentinel = Vec::new();

        for base in class.bases() {
            spec.push(ColumnSpec::base_ref(&base.table_name()));
        }
        for member in class.members() {
            let encoded = match &member.kind {
                MemberKind::Field(Value::Type(_)) | MemberKind::ClassAttr(Value::Type(_)) => {
                    debug!(
                        "{}: skipping type-valued member {}",
                        class.table_name(),
                        member.name
                    );
                    continue;
                }
                MemberKind::Field(value) | MemberKind::ClassAttr(value) => {
                    self.encode_attr(value, session)?
                }
                MemberKind::Method(source) | MemberKind::ClassMethod(source) => {
                    Some(source.clone())
                }
            };
            let column = ColumnSpec::member(member.role(), &member.name, encoded.as_deref());
            sentinel.push((column.name.clone(), encoded));
            spec.push(column);
        }

        Ok(ClassSchema { spec, sentinel })
    }

    /// Make sure the table of a primitive kind exists. Returns its name.
    pub fn ensure_value_schema(&self, kind: PrimitiveKind) -> Result<String> {
        let spec = TableSpec::primitive(kind.table_name());
        if !self.store().table_exists(&spec.name)? {
            match self.create_table(&spec) {
                Ok(()) | Err(MapperError::SchemaConflict(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(spec.name)
    }

    fn create_table(&self, spec: &TableSpec) -> Result<()> {
        let sql = spec.create_sql()?;
        self.store().execute(&sql, []).map_err(|e| match e {
            MapperError::Storage(ref inner) if MapperError::is_already_exists(inner) => {
                MapperError::SchemaConflict(spec.name.clone())
            }
            other => other,
        })?;
        if spec.composite {
            self.store().execute(
                &format!(
                    "INSERT INTO {} (ID) VALUES ({})",
                    quote(&spec.name)?,
                    SENTINEL_ROW_ID
                ),
                [],
            )?;
        }
        info!("Created table {}", spec.name);
        Ok(())
    }

    fn evolve_table(&self, spec: &TableSpec) -> Result<()> {
        let actual = self.store().columns(&spec.name)?;
        let diff = SchemaDiff::compute(spec, &actual);
        if diff.is_empty() {
            debug!("Table {} is up to date", spec.name);
            return Ok(());
        }
        migrate::rebuild(self.store().conn()?, spec, &actual)
    }

    fn refresh_sentinel(&self, schema: &ClassSchema) -> Result<()> {
        let table = quote(&schema.spec.name)?;
        self.store().execute(
            &format!("INSERT OR IGNORE INTO {} (ID) VALUES ({})", table, SENTINEL_ROW_ID),
            [],
        )?;
        if schema.sentinel.is_empty() {
            return Ok(());
        }
        let assignments = schema
            .sentinel
            .iter()
            .enumerate()
            .map(|(i, (column, _))| Ok(format!("{} = ?{}", quote(column)?, i + 1)))
            .collect::<Result<Vec<_>>>()?;
        let sql = format!(
            "UPDATE {} SET {} WHERE ID = {}",
            table,
            assignments.join(", "),
            SENTINEL_ROW_ID
        );
        self.store()
            .execute(&sql, params_from_iter(schema.sentinel.iter().map(|(_, v)| v)))?;
        Ok(())
    }

    /// Drop the table of `class`.
    ///
    /// With `cascade`, the objects referenced from the table's association
    /// references are deleted first, subject to the configured cascade policy.
    pub fn delete_class(&self, class: &ClassDef, cascade: bool) -> Result<()> {
        let table = class.table_name();
        if !self.store().table_exists(&table)? {
            debug!("Table {} does not exist, nothing to drop", table);
            return Ok(());
        }
        let references = if cascade {
            self.stored_references(&table)?
        } else {
            Vec::new()
        };
        self.store().drop_table(&table)?;

        let mut visited = Default::default();
        for reference in references {
            self.cascade_reference(&reference, &mut visited)?;
        }
        Ok(())
    }
}
