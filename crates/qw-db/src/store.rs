use chrono::Utc;
use rusqlite::Connection;

use qw_core::config::TableName;
use qw_core::error::StoreError;
use qw_core::event::Event;
use qw_core::store::EventStore;

use crate::schema;
use crate::util::to_rfc3339;

fn write_err(err: rusqlite::Error) -> StoreError {
    StoreError::Write {
        message: err.to_string(),
    }
}

/// SQLite-backed persistence gateway. Owns the one long-lived connection for
/// the life of the process; the table identity is injected at construction.
pub struct SqliteEventStore {
    conn: Connection,
    table: TableName,
}

impl SqliteEventStore {
    pub fn new(conn: Connection, table: TableName) -> Self {
        Self { conn, table }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn table(&self) -> &TableName {
        &self.table
    }

    pub fn ensure_schema(&self) -> Result<(), StoreError> {
        schema::ensure_schema(&self.conn, &self.table)
    }

    fn with_tx<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        self.conn
            .execute_batch("BEGIN IMMEDIATE")
            .map_err(write_err)?;
        match f(&self.conn) {
            Ok(value) => {
                self.conn.execute_batch("COMMIT").map_err(write_err)?;
                Ok(value)
            }
            Err(err) => {
                self.conn.execute_batch("ROLLBACK").map_err(write_err)?;
                Err(err)
            }
        }
    }
}

impl EventStore for SqliteEventStore {
    /// Persists a batch inside one transaction and returns the number of
    /// rows newly inserted. A conflicting `id` refreshes only `ingested_at`;
    /// first-seen field values stay authoritative.
    fn append(&self, events: &[Event]) -> Result<usize, StoreError> {
        if events.is_empty() {
            return Ok(0);
        }
        let ingested_at = to_rfc3339(&Utc::now());
        self.with_tx(|conn| {
            let mut insert = conn
                .prepare(&format!(
                    "INSERT OR IGNORE INTO {} (id, time_ms, mag, place, url, detail, \
                     longitude, latitude, depth, ingested_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                    self.table
                ))
                .map_err(write_err)?;
            let mut refresh = conn
                .prepare(&format!(
                    "UPDATE {} SET ingested_at = ?2 WHERE id = ?1",
                    self.table
                ))
                .map_err(write_err)?;

            let mut inserted = 0usize;
            for event in events {
                let changed = insert
                    .execute((
                        &event.id,
                        event.time_ms,
                        event.magnitude,
                        &event.place,
                        &event.url,
                        &event.detail_url,
                        event.longitude,
                        event.latitude,
                        event.depth_km,
                        &ingested_at,
                    ))
                    .map_err(write_err)?;
                if changed == 0 {
                    refresh
                        .execute((&event.id, &ingested_at))
                        .map_err(write_err)?;
                } else {
                    inserted += 1;
                }
            }
            Ok(inserted)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::from_rfc3339;
    use qw_core::config::RetryConfig;
    use std::time::Duration;

    fn setup_store() -> SqliteEventStore {
        let table = TableName::new("earthquake_minute").unwrap();
        let conn = schema::with_test_db(&table).unwrap();
        SqliteEventStore::new(conn, table)
    }

    fn sample_event(id: &str) -> Event {
        Event {
            id: id.to_string(),
            time_ms: 1_700_000_000_000,
            magnitude: Some(4.5),
            place: Some("10 km SW of Somewhere".to_string()),
            url: Some("https://example.org/a".to_string()),
            detail_url: None,
            longitude: Some(-122.5),
            latitude: Some(37.8),
            depth_km: Some(8.2),
        }
    }

    fn row_count(store: &SqliteEventStore, id: &str) -> i64 {
        store
            .connection()
            .query_row(
                "SELECT COUNT(*) FROM earthquake_minute WHERE id = ?1",
                [id],
                |row| row.get(0),
            )
            .unwrap()
    }

    #[test]
    fn empty_batch_is_a_no_op() {
        let store = setup_store();
        assert_eq!(store.append(&[]).unwrap(), 0);
    }

    #[test]
    fn duplicate_ids_within_one_batch_store_once() {
        let store = setup_store();
        let event = sample_event("us7000abcd");
        let inserted = store.append(&[event.clone(), event]).unwrap();
        assert_eq!(inserted, 1);
        assert_eq!(row_count(&store, "us7000abcd"), 1);
    }

    #[test]
    fn redelivery_across_batches_stores_once() {
        let store = setup_store();
        let event = sample_event("us7000abcd");
        assert_eq!(store.append(std::slice::from_ref(&event)).unwrap(), 1);
        assert_eq!(store.append(std::slice::from_ref(&event)).unwrap(), 0);
        assert_eq!(row_count(&store, "us7000abcd"), 1);
    }

    #[test]
    fn conflict_refreshes_timestamp_but_preserves_first_seen_fields() {
        let store = setup_store();
        let first = sample_event("us7000abcd");
        store.append(std::slice::from_ref(&first)).unwrap();
        let (mag_before, ingested_before): (Option<f64>, String) = store
            .connection()
            .query_row(
                "SELECT mag, ingested_at FROM earthquake_minute WHERE id = ?1",
                ["us7000abcd"],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();

        std::thread::sleep(Duration::from_millis(5));
        let mut redelivered = sample_event("us7000abcd");
        redelivered.magnitude = Some(9.9);
        redelivered.place = Some("revised".to_string());
        assert_eq!(store.append(&[redelivered]).unwrap(), 0);

        let (mag_after, place_after, ingested_after): (Option<f64>, Option<String>, String) =
            store
                .connection()
                .query_row(
                    "SELECT mag, place, ingested_at FROM earthquake_minute WHERE id = ?1",
                    ["us7000abcd"],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .unwrap();
        assert_eq!(mag_after, mag_before);
        assert_eq!(place_after.as_deref(), Some("10 km SW of Somewhere"));
        assert!(from_rfc3339(&ingested_after).unwrap() > from_rfc3339(&ingested_before).unwrap());
    }

    #[test]
    fn unset_fields_store_as_null_not_zero() {
        let store = setup_store();
        let event = Event {
            id: "bare".to_string(),
            time_ms: 1_700_000_000_000,
            magnitude: None,
            place: None,
            url: None,
            detail_url: None,
            longitude: None,
            latitude: None,
            depth_km: None,
        };
        store.append(&[event]).unwrap();

        let (mag, longitude): (Option<f64>, Option<f64>) = store
            .connection()
            .query_row(
                "SELECT mag, longitude FROM earthquake_minute WHERE id = ?1",
                ["bare"],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(mag, None);
        assert_eq!(longitude, None);
    }

    #[test]
    fn mixed_batch_scenario_dedups_on_rerun() {
        let store = setup_store();
        let a1 = sample_event("a1");
        let mut a2 = sample_event("a2");
        a2.magnitude = None;
        let batch = vec![a1, a2];

        assert_eq!(store.append(&batch).unwrap(), 2);
        assert_eq!(store.append(&batch).unwrap(), 0);

        let total: i64 = store
            .connection()
            .query_row("SELECT COUNT(*) FROM earthquake_minute", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(total, 2);
        let a2_mag: Option<f64> = store
            .connection()
            .query_row(
                "SELECT mag FROM earthquake_minute WHERE id = ?1",
                ["a2"],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(a2_mag, None);
    }

    #[test]
    fn ensure_schema_is_idempotent() {
        let store = setup_store();
        store.ensure_schema().unwrap();
        store.ensure_schema().unwrap();
    }

    #[tokio::test]
    async fn reachability_gate_succeeds_on_a_real_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.db");
        let retry = RetryConfig {
            max_attempts: 2,
            delay: Duration::from_millis(10),
        };
        let conn = schema::wait_until_reachable(path.to_str().unwrap(), &retry)
            .await
            .unwrap();
        let table = TableName::new("earthquake_minute").unwrap();
        schema::ensure_schema(&conn, &table).unwrap();
    }

    #[tokio::test]
    async fn reachability_gate_exhausts_attempts() {
        let retry = RetryConfig {
            max_attempts: 2,
            delay: Duration::from_millis(10),
        };
        let result =
            schema::wait_until_reachable("/nonexistent-dir/nested/events.db", &retry).await;
        assert!(matches!(
            result,
            Err(StoreError::Unreachable { attempts: 2, .. })
        ));
    }
}
