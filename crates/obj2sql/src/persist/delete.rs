//! Deleting instances and values, cascading through stored references.

use std::collections::HashSet;
use std::rc::Rc;

use rusqlite::params;
use rusqlite::types::Value as SqlValue;
use tracing::debug;

use crate::codec;
use crate::config::CascadePolicy;
use crate::core::identifier::quote;
use crate::core::naming::{self, ColumnRole, SENTINEL_ROW_ID};
use crate::core::object::Persistable;
use crate::core::value::{AssociationRef, Value};
use crate::error::{MapperError, Result};
use crate::mapper::Mapper;

/// Rows already handled by one delete call, as `(table, row id)`.
pub(crate) type Visited = HashSet<(String, i64)>;

impl Mapper {
    /// Delete a stored value. Deleting something that was never stored is a
    /// no-op.
    pub fn delete(&self, value: &Value) -> Result<()> {
        match value {
            Value::Object(object) => self.delete_object(object),
            other => self.delete_primitive(other),
        }
    }

    /// Delete an object, its base slices and, per the cascade policy, the
    /// objects its attributes reference.
    pub fn delete_object(&self, object: &Rc<dyn Persistable>) -> Result<()> {
        let table = object.class().table_name();
        if !self.store().table_exists(&table)? {
            debug!("Table {} does not exist, nothing to delete", table);
            return Ok(());
        }
        let Some(row) = self
            .store()
            .row_for_origin(&table, object.identity().as_i64())?
        else {
            debug!("{}#{} is not stored, nothing to delete", table, object.identity());
            return Ok(());
        };
        let mut visited = Visited::new();
        self.delete_row(&table, row, &mut visited)
    }

    fn delete_primitive(&self, value: &Value) -> Result<()> {
        let kind = value.primitive_kind().ok_or_else(|| {
            MapperError::invalid(format!(
                "a {} value cannot be deleted on its own",
                value.type_name()
            ))
        })?;
        let table = kind.table_name();
        if !self.store().table_exists(&table)? {
            return Ok(());
        }
        let origin = codec::content_identity(value)?;
        let deleted = self.store().execute(
            &format!("DELETE FROM {} WHERE origin_id = ?1", quote(&table)?),
            params![origin.as_i64()],
        )?;
        debug!("Deleted {} row(s) from {}", deleted, table);
        self.drop_if_empty(&table)
    }

    /// Delete one row with its base slices, then follow its references.
    pub(crate) fn delete_row(&self, table: &str, row: i64, visited: &mut Visited) -> Result<()> {
        if !visited.insert((table.to_string(), row)) {
            return Ok(());
        }
        let primitive = naming::is_primitive_table(table);
        if !primitive && row == SENTINEL_ROW_ID {
            debug!("Not deleting sentinel row of {}", table);
            return Ok(());
        }
        if !self.store().table_exists(table)? {
            return Ok(());
        }
        let Some(cells) = self.store().fetch_raw(table, row)? else {
            return Ok(());
        };

        self.store().execute(
            &format!("DELETE FROM {} WHERE ID = ?1", quote(table)?),
            params![row],
        )?;
        debug!("Deleted {} row {}", table, row);

        for (column, value) in &cells {
            match (ColumnRole::of(column), value) {
                (Some(ColumnRole::BaseRef), SqlValue::Integer(slice)) => {
                    if let Some(base_table) = naming::field_of(column) {
                        self.delete_row(base_table, *slice, visited)?;
                    }
                }
                (Some(ColumnRole::ObjectAttr), SqlValue::Text(text))
                    if AssociationRef::is_encoded(text) =>
                {
                    let reference: AssociationRef = text.parse()?;
                    self.cascade_reference(&reference, visited)?;
                }
                _ => {}
            }
        }

        if primitive {
            self.drop_if_empty(table)?;
        }
        Ok(())
    }

    /// Delete a referenced object unless the policy keeps it.
    pub(crate) fn cascade_reference(
        &self,
        reference: &AssociationRef,
        visited: &mut Visited,
    ) -> Result<()> {
        if visited.contains(&(reference.table.clone(), reference.row_id)) {
            return Ok(());
        }
        if self.config().cascade == CascadePolicy::SkipShared && self.is_referenced(reference)? {
            debug!("Keeping {}: still referenced", reference);
            return Ok(());
        }
        self.delete_row(&reference.table, reference.row_id, visited)
    }

    /// Whether any attribute column of any table stores this reference.
    pub fn is_referenced(&self, reference: &AssociationRef) -> Result<bool> {
        let needle = reference.to_string();
        for table in self.store().tables()? {
            for column in self.store().columns(&table)? {
                if !matches!(
                    column.role(),
                    Some(ColumnRole::ObjectAttr) | Some(ColumnRole::ClassAttr)
                ) {
                    continue;
                }
                let sql = format!(
                    "SELECT EXISTS(SELECT 1 FROM {} WHERE {} = ?1)",
                    quote(&table)?,
                    quote(&column.name)?
                );
                let found: bool =
                    self.store()
                        .conn()?
                        .query_row(&sql, params![needle], |row| row.get(0))?;
                if found {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// Every distinct association reference stored in a table's attribute
    /// columns, sentinel row included.
    pub(crate) fn stored_references(&self, table: &str) -> Result<Vec<AssociationRef>> {
        let mut references = Vec::new();
        let pattern = format!("{}{}%", ColumnRole::AssociationRef.prefix(), naming::SEPARATOR);
        for column in self.store().columns(table)? {
            if !matches!(
                column.role(),
                Some(ColumnRole::ObjectAttr) | Some(ColumnRole::ClassAttr)
            ) {
                continue;
            }
            let sql = format!(
                "SELECT {col} FROM {} WHERE {col} LIKE ?1",
                quote(table)?,
                col = quote(&column.name)?
            );
            let conn = self.store().conn()?;
            let mut stmt = conn.prepare(&sql)?;
            let texts = stmt
                .query_map(params![pattern], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            for text in texts {
                let reference: AssociationRef = text.parse()?;
                if !references.contains(&reference) {
                    references.push(reference);
                }
            }
        }
        Ok(references)
    }

    fn drop_if_empty(&self, table: &str) -> Result<()> {
        if self.config().drop_empty_value_tables
            && self.store().table_exists(table)?
            && self.store().row_count(table)? == 0
        {
            self.store().drop_table(table)?;
        }
        Ok(())
    }
}
