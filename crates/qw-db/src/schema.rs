use rusqlite::Connection;
use tracing::info;

use qw_core::config::{RetryConfig, TableName};
use qw_core::error::StoreError;

pub fn open(path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(path)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "busy_timeout", 5000)?;
    Ok(conn)
}

/// Idempotently creates the destination table with `id` as the uniqueness
/// constraint. Safe to call on every startup.
pub fn ensure_schema(conn: &Connection, table: &TableName) -> Result<(), StoreError> {
    let sql = format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            id          TEXT PRIMARY KEY,
            time_ms     INTEGER NOT NULL,
            mag         REAL,
            place       TEXT,
            url         TEXT,
            detail      TEXT,
            longitude   REAL,
            latitude    REAL,
            depth       REAL,
            ingested_at TEXT NOT NULL
        )"
    );
    conn.execute_batch(&sql).map_err(|err| StoreError::Schema {
        message: err.to_string(),
    })
}

/// Startup-time gate: retries opening the database and running a trivial
/// liveness query until it succeeds or the retry budget is exhausted.
/// Returns the opened connection so the store can keep it for the process
/// lifetime.
pub async fn wait_until_reachable(
    path: &str,
    retry: &RetryConfig,
) -> Result<Connection, StoreError> {
    let mut last_error = String::new();
    for attempt in 1..=retry.max_attempts {
        match open(path).and_then(|conn| {
            conn.query_row("SELECT 1", [], |_| Ok(()))?;
            Ok(conn)
        }) {
            Ok(conn) => {
                info!(attempt, "database connection established");
                return Ok(conn);
            }
            Err(err) => {
                last_error = err.to_string();
                info!(
                    attempt,
                    max_attempts = retry.max_attempts,
                    "waiting for database"
                );
                if attempt < retry.max_attempts {
                    tokio::time::sleep(retry.delay).await;
                }
            }
        }
    }
    Err(StoreError::Unreachable {
        attempts: retry.max_attempts,
        message: last_error,
    })
}

/// In-memory database with the destination table created; test setup only.
pub fn with_test_db(table: &TableName) -> Result<Connection, StoreError> {
    let conn = Connection::open_in_memory().map_err(|err| StoreError::Schema {
        message: err.to_string(),
    })?;
    ensure_schema(&conn, table)?;
    Ok(conn)
}
