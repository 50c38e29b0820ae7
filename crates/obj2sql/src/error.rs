//! Error types for the mapper library.

use thiserror::Error;

/// Exit code for configuration errors.
pub const EXIT_CONFIG_ERROR: u8 = 1;
/// Exit code for storage engine errors.
pub const EXIT_STORAGE_ERROR: u8 = 2;
/// Exit code for schema (migration, cycle, unknown table) errors.
pub const EXIT_SCHEMA_ERROR: u8 = 3;
/// Exit code for rejected arguments.
pub const EXIT_ARGUMENT_ERROR: u8 = 4;
/// Exit code for values that cannot be decoded.
pub const EXIT_DECODE_ERROR: u8 = 5;
/// Exit code for file system errors.
pub const EXIT_IO_ERROR: u8 = 7;

/// Main error type for mapper operations.
#[derive(Error, Debug)]
pub enum MapperError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Storage engine error
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// DDL issued against a table whose shape assumption is stale.
    ///
    /// Recovered internally; the following diff step re-validates the table.
    #[error("Table {0} already exists")]
    SchemaConflict(String),

    /// A table or class mapping that cannot be resolved
    #[error("Unknown table: {0}")]
    UnknownTable(String),

    /// A public operation received a value of the wrong shape
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Copy-forward of a schema migration did not complete
    #[error("Migration failed for table {table}: {message}")]
    MigrationFailure { table: String, message: String },

    /// Class inheritance graph loops back on itself
    #[error("Class hierarchy cycle detected at {0}")]
    HierarchyCycle(String),

    /// Stored text is not a valid encoding
    #[error("Decode error: {0}")]
    Decode(String),

    /// Operation issued after the store was closed
    #[error("Store is closed")]
    Closed,

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MapperError {
    /// Create a MigrationFailure error
    pub fn migration(table: impl Into<String>, message: impl Into<String>) -> Self {
        MapperError::MigrationFailure {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Create an InvalidArgument error
    pub fn invalid(message: impl Into<String>) -> Self {
        MapperError::InvalidArgument(message.into())
    }

    /// Create a Decode error
    pub fn decode(message: impl Into<String>) -> Self {
        MapperError::Decode(message.into())
    }

    /// Whether the engine rejected a CREATE because the table already exists.
    pub fn is_already_exists(err: &rusqlite::Error) -> bool {
        match err {
            rusqlite::Error::SqliteFailure(_, Some(msg)) => msg.contains("already exists"),
            _ => false,
        }
    }

    /// Process exit code for the CLI.
    pub fn exit_code(&self) -> u8 {
        match self {
            MapperError::Config(_) | MapperError::Yaml(_) => EXIT_CONFIG_ERROR,
            MapperError::Storage(_) | MapperError::Closed => EXIT_STORAGE_ERROR,
            MapperError::SchemaConflict(_)
            | MapperError::UnknownTable(_)
            | MapperError::MigrationFailure { .. }
            | MapperError::HierarchyCycle(_) => EXIT_SCHEMA_ERROR,
            MapperError::InvalidArgument(_) => EXIT_ARGUMENT_ERROR,
            MapperError::Decode(_) | MapperError::Json(_) => EXIT_DECODE_ERROR,
            MapperError::Io(_) => EXIT_IO_ERROR,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for mapper operations.
pub type Result<T> = std::result::Result<T, MapperError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(MapperError::Config("x".into()).exit_code(), EXIT_CONFIG_ERROR);
        assert_eq!(MapperError::Closed.exit_code(), EXIT_STORAGE_ERROR);
        assert_eq!(MapperError::migration("t", "m").exit_code(), EXIT_SCHEMA_ERROR);
        assert_eq!(MapperError::invalid("bad").exit_code(), EXIT_ARGUMENT_ERROR);
        assert_eq!(MapperError::decode("bad").exit_code(), EXIT_DECODE_ERROR);
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        assert_eq!(MapperError::from(io).exit_code(), EXIT_IO_ERROR);
    }

    #[test]
    fn test_format_detailed_includes_message() {
        let err = MapperError::migration("demo$A", "copy failed");
        let text = err.format_detailed();
        assert!(text.contains("Migration failed for table demo$A"));
        assert!(text.contains("copy failed"));
    }

    #[test]
    fn test_already_exists_detection() {
        let err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(1),
            Some("table \"x\" already exists".to_string()),
        );
        assert!(MapperError::is_already_exists(&err));
        assert!(!MapperError::is_already_exists(&rusqlite::Error::QueryReturnedNoRows));
    }
}
