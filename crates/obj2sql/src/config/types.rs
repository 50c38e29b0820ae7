//! Configuration type definitions.

use serde::{Deserialize, Serialize};

/// Path value that selects a private in-memory database.
pub const IN_MEMORY_PATH: &str = ":memory:";

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Backing store configuration.
    pub database: DatabaseConfig,

    /// Mapper behavior configuration.
    #[serde(default)]
    pub mapper: MapperConfig,
}

impl Config {
    /// Configuration for a database file with default mapper behavior.
    pub fn for_path(path: impl Into<String>) -> Self {
        Self {
            database: DatabaseConfig {
                path: path.into(),
                create_if_missing: true,
            },
            mapper: MapperConfig::default(),
        }
    }

    /// Configuration for a private in-memory database.
    pub fn in_memory() -> Self {
        Self::for_path(IN_MEMORY_PATH)
    }
}

/// Backing store (SQLite) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database file path, or `:memory:`.
    pub path: String,

    /// Create the database file when it does not exist (default: true).
    #[serde(default = "default_true")]
    pub create_if_missing: bool,
}

impl DatabaseConfig {
    /// Whether this configuration selects an in-memory database.
    pub fn is_in_memory(&self) -> bool {
        self.path == IN_MEMORY_PATH
    }
}

/// Mapper behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapperConfig {
    /// How cascading deletes treat sub-objects referenced elsewhere
    /// (default: skip_shared).
    #[serde(default)]
    pub cascade: CascadePolicy,

    /// Drop a primitive value table once its last row is deleted (default: true).
    #[serde(default = "default_true")]
    pub drop_empty_value_tables: bool,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            cascade: CascadePolicy::default(),
            drop_empty_value_tables: true,
        }
    }
}

impl MapperConfig {
    /// Set the cascade policy.
    pub fn with_cascade(mut self, cascade: CascadePolicy) -> Self {
        self.cascade = cascade;
        self
    }

    /// Set whether emptied primitive tables are dropped.
    pub fn with_drop_empty_value_tables(mut self, drop: bool) -> Self {
        self.drop_empty_value_tables = drop;
        self
    }
}

/// Cascade policy for deleting composite attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CascadePolicy {
    /// Keep a sub-object while any stored association reference still points at it.
    #[default]
    SkipShared,

    /// Delete every composite attribute unconditionally, even when shared.
    Always,
}

fn default_true() -> bool {
    true
}
