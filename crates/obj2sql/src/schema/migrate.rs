//! Table rebuild for schema evolution.
//!
//! SQLite cannot drop or retype columns in place, so a table whose member set
//! changed is rebuilt: renamed aside, recreated with the new shape, refilled
//! from the shared columns, and the aside copy dropped. All of it runs in one
//! transaction; on any failure the original table is left as it was.

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use super::diff::{shared_columns, SchemaDiff};
use crate::core::identifier::{quote, quote_list};
use crate::core::naming::{self, SENTINEL_ROW_ID};
use crate::core::schema::{ColumnInfo, TableSpec};
use crate::error::{MapperError, Result};

/// Rebuild `spec.name` into the expected shape, keeping every row but the
/// sentinel and the data of every shared column.
pub fn rebuild(conn: &Connection, spec: &TableSpec, actual: &[ColumnInfo]) -> Result<()> {
    let diff = SchemaDiff::compute(spec, actual);
    info!(
        "Migrating table {} (+{:?} -{:?})",
        spec.name, diff.added, diff.removed
    );
    run(conn, spec, actual).map_err(|e| {
        MapperError::migration(spec.name.clone(), e.to_string())
    })
}

fn run(conn: &Connection, spec: &TableSpec, actual: &[ColumnInfo]) -> Result<()> {
    let table = quote(&spec.name)?;
    let aside_name = naming::aside_table_name(&spec.name);
    let aside = quote(&aside_name)?;
    let shared = shared_columns(spec, actual);

    let tx = conn.unchecked_transaction()?;

    exec(&tx, &format!("DROP TABLE IF EXISTS {}", aside))?;
    exec(&tx, &format!("ALTER TABLE {} RENAME TO {}", table, aside))?;
    exec(&tx, &spec.create_sql()?)?;
    if spec.composite {
        exec(
            &tx,
            &format!("INSERT INTO {} (ID) VALUES ({})", table, SENTINEL_ROW_ID),
        )?;
    }
    if !shared.is_empty() {
        let columns = quote_list(&shared)?;
        let filter = if spec.composite {
            format!(" WHERE ID != {}", SENTINEL_ROW_ID)
        } else {
            String::new()
        };
        let copied = tx.execute(
            &format!(
                "INSERT INTO {} ({}) SELECT {} FROM {}{}",
                table, columns, columns, aside, filter
            ),
            [],
        )?;
        debug!("Copied {} rows into {}", copied, spec.name);
    }
    carry_sequence(&tx, &aside_name, &spec.name)?;
    exec(&tx, &format!("DROP TABLE {}", aside))?;

    tx.commit()?;
    Ok(())
}

/// Keep the AUTOINCREMENT counter of `from` on `to`, so that ids of rows
/// deleted before the rebuild are never handed out again.
fn carry_sequence(conn: &Connection, from: &str, to: &str) -> Result<()> {
    let seq: Option<i64> = conn
        .query_row(
            "SELECT seq FROM sqlite_sequence WHERE name = ?1",
            params![from],
            |row| row.get(0),
        )
        .optional()?;
    let Some(seq) = seq else {
        return Ok(());
    };
    let updated = conn.execute(
        "UPDATE sqlite_sequence SET seq = MAX(seq, ?1) WHERE name = ?2",
        params![seq, to],
    )?;
    if updated == 0 {
        conn.execute(
            "INSERT INTO sqlite_sequence (name, seq) VALUES (?1, ?2)",
            params![to, seq],
        )?;
    }
    debug!("Carried sequence {} from {} to {}", seq, from, to);
    Ok(())
}

fn exec(conn: &Connection, sql: &str) -> Result<()> {
    debug!("SQL: {}", sql);
    conn.execute(sql, [])?;
    Ok(())
}
