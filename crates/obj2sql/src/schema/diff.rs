//! Comparison of an expected table shape with the stored one.

use crate::core::naming::{self, ColumnRole};
use crate::core::schema::{ColumnInfo, TableSpec};

/// Columns to add and remove to reach the expected shape.
///
/// Only role-prefixed and structural columns take part; anything else in the
/// stored table is a legacy column the mapper does not own.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

impl SchemaDiff {
    pub fn compute(expected: &TableSpec, actual: &[ColumnInfo]) -> Self {
        let owned: Vec<&str> = actual
            .iter()
            .map(|c| c.name.as_str())
            .filter(|name| is_owned(name))
            .collect();

        let added = expected
            .columns
            .iter()
            .filter(|c| !owned.contains(&c.name.as_str()))
            .map(|c| c.name.clone())
            .collect();
        let removed = owned
            .iter()
            .filter(|name| expected.column(name).is_none())
            .map(|name| name.to_string())
            .collect();

        Self { added, removed }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

fn is_owned(column: &str) -> bool {
    naming::is_structural(column) || ColumnRole::of(column).is_some()
}

/// Columns present in both shapes, in expected order.
pub fn shared_columns(expected: &TableSpec, actual: &[ColumnInfo]) -> Vec<String> {
    expected
        .columns
        .iter()
        .filter(|c| actual.iter().any(|a| a.name == c.name))
        .map(|c| c.name.clone())
        .collect()
}
