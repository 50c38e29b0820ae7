//! SQLite connection lifecycle and metadata helpers.
//!
//! The store owns one connection. After [`Store::close`] every operation
//! answers [`MapperError::Closed`].

use rusqlite::types::Value as SqlValue;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Params};
use tracing::{debug, info};

use crate::config::{DatabaseConfig, IN_MEMORY_PATH};
use crate::core::identifier::quote;
use crate::core::schema::ColumnInfo;
use crate::error::{MapperError, Result};

/// An open (or closed) SQLite database.
pub struct Store {
    conn: Option<Connection>,
    path: String,
}

impl Store {
    /// Open the database described by the configuration.
    pub fn open(config: &DatabaseConfig) -> Result<Self> {
        if config.is_in_memory() {
            return Self::open_in_memory();
        }
        let mut flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        if config.create_if_missing {
            flags |= OpenFlags::SQLITE_OPEN_CREATE;
        }
        let conn = Connection::open_with_flags(&config.path, flags)?;
        info!("Opened database {}", config.path);
        Ok(Self {
            conn: Some(conn),
            path: config.path.clone(),
        })
    }

    /// Open a fresh in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        debug!("Opened in-memory database");
        Ok(Self {
            conn: Some(conn),
            path: IN_MEMORY_PATH.to_string(),
        })
    }

    /// Close the connection. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            conn.close().map_err(|(_, e)| MapperError::Storage(e))?;
            info!("Closed database {}", self.path);
        }
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    /// Path the store was opened with (`:memory:` for in-memory stores).
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_in_memory(&self) -> bool {
        self.path == IN_MEMORY_PATH
    }

    /// Borrow the open connection.
    pub fn conn(&self) -> Result<&Connection> {
        self.conn.as_ref().ok_or(MapperError::Closed)
    }

    pub fn conn_mut(&mut self) -> Result<&mut Connection> {
        self.conn.as_mut().ok_or(MapperError::Closed)
    }

    /// Execute one statement, logging it.
    pub fn execute<P: Params>(&self, sql: &str, params: P) -> Result<usize> {
        debug!("SQL: {}", sql);
        Ok(self.conn()?.execute(sql, params)?)
    }

    /// Whether a table of that name exists.
    pub fn table_exists(&self, table: &str) -> Result<bool> {
        let exists: bool = self.conn()?.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
            params![table],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// User tables, ordered by name.
    pub fn tables(&self) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(names)
    }

    /// Columns of a table in ordinal order; empty for a missing table.
    pub fn columns(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT cid, name, type FROM pragma_table_info(?1) ORDER BY cid")?;
        let columns = stmt
            .query_map(params![table], |row| {
                Ok(ColumnInfo {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    decl_type: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(columns)
    }

    /// Number of rows in a table.
    pub fn row_count(&self, table: &str) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote(table)?);
        Ok(self.conn()?.query_row(&sql, [], |row| row.get(0))?)
    }

    /// Row id holding the given origin identity, if any.
    pub fn row_for_origin(&self, table: &str, origin: i64) -> Result<Option<i64>> {
        let sql = format!(
            "SELECT ID FROM {} WHERE origin_id = ?1 ORDER BY ID LIMIT 1",
            quote(table)?
        );
        Ok(self
            .conn()?
            .query_row(&sql, params![origin], |row| row.get(0))
            .optional()?)
    }

    /// Whether a row with that id exists.
    pub fn row_exists(&self, table: &str, id: i64) -> Result<bool> {
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE ID = ?1)",
            quote(table)?
        );
        Ok(self.conn()?.query_row(&sql, params![id], |row| row.get(0))?)
    }

    /// Every cell of one row as stored, `None` if the row does not exist.
    pub fn fetch_raw(&self, table: &str, id: i64) -> Result<Option<Vec<(String, SqlValue)>>> {
        let sql = format!("SELECT * FROM {} WHERE ID = ?1", quote(table)?);
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let names: Vec<String> = stmt.column_names().iter().map(|n| n.to_string()).collect();
        let row = stmt
            .query_row(params![id], |row| {
                names
                    .iter()
                    .enumerate()
                    .map(|(i, name)| Ok((name.clone(), row.get::<_, SqlValue>(i)?)))
                    .collect::<rusqlite::Result<Vec<_>>>()
            })
            .optional()?;
        Ok(row)
    }

    /// Drop a table if it exists.
    pub fn drop_table(&self, table: &str) -> Result<()> {
        self.execute(&format!("DROP TABLE IF EXISTS {}", quote(table)?), [])?;
        info!("Dropped table {}", table);
        Ok(())
    }

    /// Version string of the engine.
    pub fn engine_version(&self) -> Result<String> {
        Ok(self
            .conn()?
            .query_row("SELECT sqlite_version()", [], |row| row.get(0))?)
    }

    /// File backing the main database, `None` for in-memory stores.
    pub fn main_db_file(&self) -> Result<Option<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT name, file FROM pragma_database_list WHERE name = 'main'")?;
        let file = stmt
            .query_row([], |row| row.get::<_, Option<String>>(1))
            .optional()?
            .flatten();
        Ok(file.filter(|f| !f.is_empty()))
    }

    /// Allocated size of the database in pages.
    pub fn page_bytes(&self) -> Result<u64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("PRAGMA page_count", [], |row| row.get(0))?;
        let size: i64 = conn.query_row("PRAGMA page_size", [], |row| row.get(0))?;
        Ok((count.max(0) as u64) * (size.max(0) as u64))
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Err((_, e)) = conn.close() {
                debug!("Error closing database {}: {}", self.path, e);
            }
        }
    }
}
