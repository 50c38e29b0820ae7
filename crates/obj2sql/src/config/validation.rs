//! Configuration validation.

use super::Config;
use crate::error::{MapperError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    if config.database.path.trim().is_empty() {
        return Err(MapperError::Config("database.path is required".into()));
    }
    if config.database.path.contains('\0') {
        return Err(MapperError::Config(
            "database.path must not contain null bytes".into(),
        ));
    }

    if !config.database.is_in_memory() && !config.database.create_if_missing {
        let path = std::path::Path::new(&config.database.path);
        if !path.exists() {
            return Err(MapperError::Config(format!(
                "database.path {:?} does not exist and create_if_missing is false",
                config.database.path
            )));
        }
    }

    Ok(())
}
