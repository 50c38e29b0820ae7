//! Table and column metadata.
//!
//! [`TableSpec`] and [`ColumnSpec`] describe the shape a class table should
//! have; [`ColumnInfo`] is what the engine reports for an existing table.

use serde::{Deserialize, Serialize};

use super::identifier::{quote, sql_literal};
use super::naming::{self, ColumnRole};
use super::value::Value;
use crate::error::Result;

/// Column as reported by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    /// Ordinal position (0-based).
    pub id: i64,

    /// Column name.
    pub name: String,

    /// Declared type, empty when none was given.
    pub decl_type: String,
}

impl ColumnInfo {
    /// Role of the column, `None` for structural or unknown columns.
    pub fn role(&self) -> Option<ColumnRole> {
        ColumnRole::of(&self.name)
    }
}

/// Expected column of a synthesized table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    /// Column name.
    pub name: String,

    /// Declared type (may be empty).
    pub decl_type: String,

    /// Raw SQL default expression, already rendered as a literal.
    pub default: Option<String>,

    /// Whether this is the surrogate key.
    pub primary_key: bool,
}

impl ColumnSpec {
    /// Surrogate key column.
    pub fn id() -> Self {
        Self {
            name: naming::ID_COLUMN.to_string(),
            decl_type: "INTEGER".to_string(),
            default: None,
            primary_key: true,
        }
    }

    /// Origin identity column.
    pub fn origin() -> Self {
        Self {
            name: naming::ORIGIN_COLUMN.to_string(),
            decl_type: "INTEGER".to_string(),
            default: None,
            primary_key: false,
        }
    }

    /// Single data column of a primitive table.
    pub fn value() -> Self {
        Self {
            name: naming::VALUE_COLUMN.to_string(),
            decl_type: "TEXT".to_string(),
            default: None,
            primary_key: false,
        }
    }

    /// Base-class reference column, defaulting to the sentinel row.
    pub fn base_ref(base_table: &str) -> Self {
        Self {
            name: naming::base_ref_column(base_table),
            decl_type: "INTEGER".to_string(),
            default: Some(naming::SENTINEL_ROW_ID.to_string()),
            primary_key: false,
        }
    }

    /// Member column carrying an encoded value or method source.
    pub fn member(role: ColumnRole, field: &str, encoded_default: Option<&str>) -> Self {
        Self {
            name: naming::column_name(role, field),
            decl_type: "TEXT".to_string(),
            default: encoded_default.map(sql_literal),
            primary_key: false,
        }
    }

    pub fn role(&self) -> Option<ColumnRole> {
        ColumnRole::of(&self.name)
    }

    /// Column definition for CREATE TABLE.
    pub fn to_ddl(&self) -> Result<String> {
        let mut ddl = quote(&self.name)?;
        if !self.decl_type.is_empty() {
            ddl.push(' ');
            ddl.push_str(&self.decl_type);
        }
        if self.primary_key {
            ddl.push_str(" PRIMARY KEY AUTOINCREMENT");
        }
        if let Some(default) = &self.default {
            ddl.push_str(" DEFAULT ");
            ddl.push_str(default);
        }
        Ok(ddl)
    }
}

/// Expected shape of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    pub name: String,
    pub columns: Vec<ColumnSpec>,

    /// Composite tables carry the sentinel row.
    pub composite: bool,
}

impl TableSpec {
    /// Shape of a primitive value table.
    pub fn primitive(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: vec![ColumnSpec::id(), ColumnSpec::origin(), ColumnSpec::value()],
            composite: false,
        }
    }

    /// Start a composite table with its structural columns.
    pub fn composite(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: vec![ColumnSpec::id(), ColumnSpec::origin()],
            composite: true,
        }
    }

    /// Add a column, replacing one of the same name.
    pub fn push(&mut self, column: ColumnSpec) {
        match self.columns.iter_mut().find(|c| c.name == column.name) {
            Some(existing) => *existing = column,
            None => self.columns.push(column),
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// CREATE TABLE statement (without IF NOT EXISTS).
    pub fn create_sql(&self) -> Result<String> {
        let columns = self
            .columns
            .iter()
            .map(ColumnSpec::to_ddl)
            .collect::<Result<Vec<_>>>()?;
        Ok(format!(
            "CREATE TABLE {} ({})",
            quote(&self.name)?,
            columns.join(", ")
        ))
    }
}

/// Engine identification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineInfo {
    pub name: String,
    pub version: String,
}

/// One decoded cell of a stored row.
#[derive(Debug, Clone, Serialize)]
pub struct StoredCell {
    pub column: String,
    pub role: Option<ColumnRole>,

    /// Text as stored, `None` for NULL.
    pub raw: Option<String>,

    #[serde(skip)]
    pub value: Value,
}

/// A stored row read back through the catalog.
#[derive(Debug, Clone, Serialize)]
pub struct StoredRow {
    pub table: String,
    pub id: i64,
    pub origin_id: Option<i64>,
    pub cells: Vec<StoredCell>,
}

impl StoredRow {
    /// Decoded value of a member, looked up by field name.
    pub fn field(&self, role: ColumnRole, name: &str) -> Option<&Value> {
        let column = naming::column_name(role, name);
        self.cell(&column).map(|c| &c.value)
    }

    /// Decoded value of an instance attribute.
    pub fn attr(&self, name: &str) -> Option<&Value> {
        self.field(ColumnRole::ObjectAttr, name)
    }

    pub fn cell(&self, column: &str) -> Option<&StoredCell> {
        self.cells.iter().find(|c| c.column == column)
    }

    /// Decoded `value` column of a primitive table row.
    pub fn value(&self) -> Option<&Value> {
        self.cell(naming::VALUE_COLUMN).map(|c| &c.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_table_ddl() {
        let spec = TableSpec::primitive("builtins$int");
        assert_eq!(
            spec.create_sql().unwrap(),
            "CREATE TABLE \"builtins$int\" (\"ID\" INTEGER PRIMARY KEY AUTOINCREMENT, \
             \"origin_id\" INTEGER, \"value\" TEXT)"
        );
        assert!(!spec.composite);
    }

    #[test]
    fn test_member_default_is_quoted_literal() {
        let col = ColumnSpec::member(ColumnRole::ObjectAttr, "name", Some("text(\"it's\")"));
        assert_eq!(
            col.to_ddl().unwrap(),
            "\"OBJECT_ATTR$name\" TEXT DEFAULT 'text(\"it''s\")'"
        );
        let col = ColumnSpec::member(ColumnRole::ObjectAttr, "none", None);
        assert_eq!(col.to_ddl().unwrap(), "\"OBJECT_ATTR$none\" TEXT");
    }

    #[test]
    fn test_base_ref_defaults_to_sentinel() {
        let col = ColumnSpec::base_ref("demo$A");
        assert_eq!(col.to_ddl().unwrap(), "\"BASE_REF$demo$A\" INTEGER DEFAULT 1");
        assert_eq!(col.role(), Some(ColumnRole::BaseRef));
    }

    #[test]
    fn test_table_spec_push_replaces() {
        let mut spec = TableSpec::composite("demo$A");
        spec.push(ColumnSpec::member(ColumnRole::ObjectAttr, "a", Some("int(0)")));
        spec.push(ColumnSpec::member(ColumnRole::ObjectAttr, "a", Some("int(1)")));
        assert_eq!(spec.columns.len(), 3);
        assert_eq!(
            spec.column("OBJECT_ATTR$a").unwrap().default.as_deref(),
            Some("'int(1)'")
        );
        assert_eq!(spec.column_names(), vec!["ID", "origin_id", "OBJECT_ATTR$a"]);
    }

    #[test]
    fn test_stored_row_lookup() {
        let row = StoredRow {
            table: "demo$A".into(),
            id: 2,
            origin_id: Some(7),
            cells: vec![StoredCell {
                column: "OBJECT_ATTR$a".into(),
                role: Some(ColumnRole::ObjectAttr),
                raw: Some("int(3)".into()),
                value: Value::Int(3),
            }],
        };
        assert_eq!(row.attr("a"), Some(&Value::Int(3)));
        assert_eq!(row.attr("b"), None);
        assert!(row.value().is_none());
    }
}
