//! The mapper: one store plus the behavior configuration.
//!
//! Operations are spread over the modules that implement them:
//! [`crate::schema`] (class tables), [`crate::persist`] (instances),
//! [`crate::hierarchy`] (class trees) and [`crate::catalog`] (introspection).

use tracing::info;

use crate::config::{Config, MapperConfig};
use crate::error::Result;
use crate::store::Store;

/// Object-to-relational mapper over a SQLite database.
pub struct Mapper {
    store: Store,
    config: MapperConfig,
}

impl Mapper {
    /// Validate the configuration and open its database.
    pub fn open(config: &Config) -> Result<Self> {
        config.validate()?;
        let store = Store::open(&config.database)?;
        info!(
            "Mapper ready on {} (cascade: {:?}, drop empty value tables: {})",
            store.path(),
            config.mapper.cascade,
            config.mapper.drop_empty_value_tables
        );
        Ok(Self::with_store(store, config.mapper.clone()))
    }

    /// Mapper over a fresh in-memory database with default behavior.
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::with_store(Store::open_in_memory()?, MapperConfig::default()))
    }

    pub fn with_store(store: Store, config: MapperConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    /// Replace the behavior configuration.
    pub fn set_config(&mut self, config: MapperConfig) {
        self.config = config;
    }

    /// Close the database. Later operations fail with `Closed`.
    pub fn close(&mut self) -> Result<()> {
        self.store.close()
    }

    pub fn is_open(&self) -> bool {
        self.store.is_open()
    }
}
