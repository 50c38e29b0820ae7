//! Read-only introspection of the database and of stored rows.

use rusqlite::types::{Value as SqlValue, ValueRef};
use tracing::debug;

use crate::codec;
use crate::core::identifier::{quote, validate_identifier};
use crate::core::naming::{self, ColumnRole};
use crate::core::schema::{ColumnInfo, EngineInfo, StoredCell, StoredRow};
use crate::core::value::{AssociationRef, PrimitiveKind, Value};
use crate::error::{MapperError, Result};
use crate::mapper::Mapper;

/// Name reported by [`Mapper::engine`].
pub const ENGINE_NAME: &str = "SQLite";

/// Bytes counted for an integer or real cell.
const NUMERIC_CELL_BYTES: u64 = 8;

impl Mapper {
    /// User tables, ordered by name.
    pub fn tables(&self) -> Result<Vec<String>> {
        self.store().tables()
    }

    /// Whether a table exists. Never fails for a missing table.
    pub fn table_exists(&self, table: &str) -> Result<bool> {
        self.store().table_exists(table)
    }

    /// Columns of a table; empty for a missing table.
    pub fn table_structure(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        self.store().columns(table)
    }

    /// Estimated size of a table's data in bytes.
    pub fn table_size(&self, table: &str) -> Result<u64> {
        validate_identifier(table)?;
        if !self.store().table_exists(table)? {
            return Err(MapperError::UnknownTable(table.to_string()));
        }
        let conn = self.store().conn()?;
        let mut stmt = conn.prepare(&format!("SELECT * FROM {}", quote(table)?))?;
        let width = stmt.column_count();
        let mut rows = stmt.query([])?;
        let mut total = 0u64;
        while let Some(row) = rows.next()? {
            for i in 0..width {
                total += cell_bytes(row.get_ref(i)?);
            }
        }
        debug!("Estimated size of {}: {} bytes", table, total);
        Ok(total)
    }

    /// Engine name and version.
    pub fn engine(&self) -> Result<EngineInfo> {
        Ok(EngineInfo {
            name: ENGINE_NAME.to_string(),
            version: self.store().engine_version()?,
        })
    }

    /// Schema name of the main database, as the engine lists it.
    pub fn db_name(&self) -> Result<String> {
        let name = self
            .store()
            .conn()?
            .query_row("SELECT name FROM pragma_database_list ORDER BY seq LIMIT 1", [], |row| {
                row.get(0)
            })?;
        Ok(name)
    }

    /// Size of the database in bytes: the file size, or the allocated pages
    /// for in-memory stores.
    pub fn db_size(&self) -> Result<u64> {
        match self.store().main_db_file()? {
            Some(file) => Ok(std::fs::metadata(file)?.len()),
            None => self.store().page_bytes(),
        }
    }

    /// `(module, class)` of a class table.
    pub fn class_of(&self, table: &str) -> Result<(String, String)> {
        naming::parse_table_name(table)
    }

    /// Read one stored row, decoding every cell by its column role.
    pub fn fetch_row(&self, table: &str, id: i64) -> Result<Option<StoredRow>> {
        validate_identifier(table)?;
        if !self.store().table_exists(table)? {
            return Err(MapperError::UnknownTable(table.to_string()));
        }
        let Some(raw) = self.store().fetch_raw(table, id)? else {
            return Ok(None);
        };
        let primitive_kind = naming::parse_table_name(table)
            .ok()
            .filter(|(module, _)| module == naming::PRIMITIVE_MODULE)
            .and_then(|(_, class)| PrimitiveKind::from_name(&class));

        let mut stored = StoredRow {
            table: table.to_string(),
            id,
            origin_id: None,
            cells: Vec::new(),
        };
        for (column, value) in raw {
            if column == naming::ID_COLUMN {
                continue;
            }
            if column == naming::ORIGIN_COLUMN {
                stored.origin_id = match value {
                    SqlValue::Integer(v) => Some(v),
                    _ => None,
                };
                continue;
            }
            stored.cells.push(decode_cell(column, value, primitive_kind)?);
        }
        Ok(Some(stored))
    }

    /// Follow an association reference.
    pub fn resolve(&self, reference: &AssociationRef) -> Result<Option<StoredRow>> {
        self.fetch_row(&reference.table, reference.row_id)
    }
}

fn cell_bytes(cell: ValueRef<'_>) -> u64 {
    match cell {
        ValueRef::Null => 0,
        ValueRef::Integer(_) | ValueRef::Real(_) => NUMERIC_CELL_BYTES,
        ValueRef::Text(bytes) => bytes.len() as u64 + 1,
        ValueRef::Blob(bytes) => bytes.len() as u64,
    }
}

fn decode_cell(column: String, value: SqlValue, kind: Option<PrimitiveKind>) -> Result<StoredCell> {
    let role = ColumnRole::of(&column);
    let (raw, decoded) = match value {
        SqlValue::Null => (None, Value::Null),
        SqlValue::Integer(v) => (Some(v.to_string()), Value::Int(v)),
        SqlValue::Real(v) => (Some(v.to_string()), Value::Real(v)),
        SqlValue::Blob(bytes) => (Some(format!("<{} bytes>", bytes.len())), Value::Null),
        SqlValue::Text(text) => {
            let decoded = if role.map_or(false, ColumnRole::holds_source) {
                Value::Callable(text.clone())
            } else if column == naming::VALUE_COLUMN {
                match kind {
                    Some(kind) => codec::decode_as(&text, kind)?,
                    None => codec::decode(&text)?,
                }
            } else {
                codec::decode(&text)?
            };
            (Some(text), decoded)
        }
    };
    Ok(StoredCell {
        column,
        role,
        raw,
        value: decoded,
    })
}
