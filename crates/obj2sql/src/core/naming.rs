//! Deterministic table and column naming.
//!
//! Table names are `<module>$<Class>`, column names are `<ROLE>$<field>`.
//! The separator never appears in legitimate module, class or field names, so
//! a table name can be split back into its `(module, class)` pair and a
//! column's role can be recovered by prefix match. A `$` inside a user
//! supplied name breaks that parse; this is not guarded against.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{MapperError, Result};

/// Reserved separator between name parts.
pub const SEPARATOR: char = '$';

/// Surrogate primary key column.
pub const ID_COLUMN: &str = "ID";

/// Column holding the origin identity of the instance that produced a row.
pub const ORIGIN_COLUMN: &str = "origin_id";

/// Single data column of primitive value tables.
pub const VALUE_COLUMN: &str = "value";

/// Row id of the sentinel (class-bound default) row of composite tables.
pub const SENTINEL_ROW_ID: i64 = 1;

/// Module under which primitive pseudo-classes are named.
pub const PRIMITIVE_MODULE: &str = "builtins";

/// Suffix given to a table renamed aside during a migration.
pub const MIGRATION_SUFFIX: &str = "migrating";

/// Role of a column, encoded as its name prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnRole {
    /// Data attribute of an instance.
    ObjectAttr,
    /// Method bound to instances.
    ObjectMethod,
    /// Class-level attribute.
    ClassAttr,
    /// Class-level method.
    ClassMethod,
    /// Link to the base-class slice row.
    BaseRef,
    /// Prefix of encoded association references.
    AssociationRef,
}

impl ColumnRole {
    /// Every role, in prefix-matching order.
    pub const ALL: [ColumnRole; 6] = [
        ColumnRole::ObjectAttr,
        ColumnRole::ObjectMethod,
        ColumnRole::ClassAttr,
        ColumnRole::ClassMethod,
        ColumnRole::BaseRef,
        ColumnRole::AssociationRef,
    ];

    /// Name prefix of the role.
    pub fn prefix(self) -> &'static str {
        match self {
            ColumnRole::ObjectAttr => "OBJECT_ATTR",
            ColumnRole::ObjectMethod => "OBJECT_METHOD",
            ColumnRole::ClassAttr => "CLASS_ATTR",
            ColumnRole::ClassMethod => "CLASS_METHOD",
            ColumnRole::BaseRef => "BASE_REF",
            ColumnRole::AssociationRef => "ASSOCIATION_REF",
        }
    }

    /// Recover the role of a column from its name.
    pub fn of(column: &str) -> Option<ColumnRole> {
        let (prefix, rest) = column.split_once(SEPARATOR)?;
        if rest.is_empty() {
            return None;
        }
        Self::ALL.into_iter().find(|role| role.prefix() == prefix)
    }

    /// Data carried per instance row.
    pub fn is_object_bound(self) -> bool {
        matches!(self, ColumnRole::ObjectAttr | ColumnRole::ObjectMethod)
    }

    /// Data carried once per class, on the sentinel row.
    pub fn is_class_bound(self) -> bool {
        matches!(self, ColumnRole::ClassAttr | ColumnRole::ClassMethod)
    }

    /// Whether the column stores method source text rather than an encoding.
    pub fn holds_source(self) -> bool {
        matches!(self, ColumnRole::ObjectMethod | ColumnRole::ClassMethod)
    }
}

impl fmt::Display for ColumnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Build the table name for a class.
pub fn table_name(module: &str, class: &str) -> String {
    format!("{}{}{}", module, SEPARATOR, class)
}

/// Build the table name of a primitive pseudo-class.
pub fn primitive_table_name(kind_name: &str) -> String {
    table_name(PRIMITIVE_MODULE, kind_name)
}

/// Split a table name back into `(module, class)`.
pub fn parse_table_name(table: &str) -> Result<(String, String)> {
    match table.rsplit_once(SEPARATOR) {
        Some((module, class)) if !module.is_empty() && !class.is_empty() => {
            Ok((module.to_string(), class.to_string()))
        }
        _ => Err(MapperError::UnknownTable(table.to_string())),
    }
}

/// Whether a table holds a primitive pseudo-class.
pub fn is_primitive_table(table: &str) -> bool {
    matches!(parse_table_name(table), Ok((module, _)) if module == PRIMITIVE_MODULE)
}

/// Build a role-prefixed column name.
pub fn column_name(role: ColumnRole, field: &str) -> String {
    format!("{}{}{}", role.prefix(), SEPARATOR, field)
}

/// Strip the role prefix, returning the field name.
pub fn field_of(column: &str) -> Option<&str> {
    ColumnRole::of(column)?;
    column.split_once(SEPARATOR).map(|(_, field)| field)
}

/// Base-class reference column pointing into `base_table`.
pub fn base_ref_column(base_table: &str) -> String {
    column_name(ColumnRole::BaseRef, base_table)
}

/// Whether the column is bookkeeping rather than data.
pub fn is_structural(column: &str) -> bool {
    column == ID_COLUMN || column == ORIGIN_COLUMN || column == VALUE_COLUMN
}

/// Name a table is renamed to while it is being rebuilt.
pub fn aside_table_name(table: &str) -> String {
    format!("{}{}{}", table, SEPARATOR, MIGRATION_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_name_roundtrip() {
        let name = table_name("demo_classes", "SampleClass");
        assert_eq!(name, "demo_classes$SampleClass");
        let (module, class) = parse_table_name(&name).unwrap();
        assert_eq!(module, "demo_classes");
        assert_eq!(class, "SampleClass");
    }

    #[test]
    fn test_parse_table_name_nested_module() {
        let (module, class) = parse_table_name("app::models$User").unwrap();
        assert_eq!(module, "app::models");
        assert_eq!(class, "User");
    }

    #[test]
    fn test_parse_table_name_rejects_foreign_tables() {
        assert!(matches!(
            parse_table_name("plain_table"),
            Err(MapperError::UnknownTable(_))
        ));
        assert!(parse_table_name("$Orphan").is_err());
        assert!(parse_table_name("module$").is_err());
    }

    #[test]
    fn test_primitive_table_name() {
        assert_eq!(primitive_table_name("int"), "builtins$int");
        assert!(is_primitive_table("builtins$int"));
        assert!(!is_primitive_table("demo$A"));
        assert!(!is_primitive_table("builtins"));
    }

    #[test]
    fn test_column_roles() {
        let col = column_name(ColumnRole::ObjectAttr, "int_object_attr");
        assert_eq!(col, "OBJECT_ATTR$int_object_attr");
        assert_eq!(ColumnRole::of(&col), Some(ColumnRole::ObjectAttr));
        assert_eq!(field_of(&col), Some("int_object_attr"));

        assert_eq!(ColumnRole::of("CLASS_METHOD$run"), Some(ColumnRole::ClassMethod));
        assert_eq!(ColumnRole::of("ID"), None);
        assert_eq!(ColumnRole::of("origin_id"), None);
        assert_eq!(ColumnRole::of("UNKNOWN$x"), None);
        assert_eq!(ColumnRole::of("OBJECT_ATTR$"), None);
    }

    #[test]
    fn test_base_ref_column_keeps_table_name() {
        let col = base_ref_column("demo$A");
        assert_eq!(col, "BASE_REF$demo$A");
        assert_eq!(ColumnRole::of(&col), Some(ColumnRole::BaseRef));
        assert_eq!(field_of(&col), Some("demo$A"));
    }

    #[test]
    fn test_role_binding() {
        assert!(ColumnRole::ObjectAttr.is_object_bound());
        assert!(ColumnRole::ObjectMethod.is_object_bound());
        assert!(ColumnRole::ClassAttr.is_class_bound());
        assert!(!ColumnRole::BaseRef.is_object_bound());
        assert!(!ColumnRole::BaseRef.is_class_bound());
        assert!(ColumnRole::ClassMethod.holds_source());
    }

    #[test]
    fn test_structural_columns() {
        assert!(is_structural(ID_COLUMN));
        assert!(is_structural(ORIGIN_COLUMN));
        assert!(is_structural(VALUE_COLUMN));
        assert!(!is_structural("OBJECT_ATTR$value"));
    }

    #[test]
    fn test_aside_table_name() {
        assert_eq!(aside_table_name("demo$A"), "demo$A$migrating");
    }
}
