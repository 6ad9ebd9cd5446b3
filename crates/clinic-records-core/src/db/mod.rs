//! Database layer for clinic records.

mod schema;
mod patients;
mod visits;
mod vitals;

pub use schema::*;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, Row};
use std::path::Path;
use thiserror::Error;

/// Database errors.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

pub type DbResult<T> = Result<T, DbError>;

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open database at path, creating if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Create in-memory database (for testing).
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Initialize schema.
    fn initialize(&self) -> DbResult<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Get raw connection (for advanced queries).
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Total records of every kind still waiting for upload.
    pub fn count_unsynced(&self) -> DbResult<u64> {
        let count: i64 = self.conn.query_row(
            r#"
            SELECT (SELECT COUNT(*) FROM patients WHERE synced = 0)
                 + (SELECT COUNT(*) FROM vitals WHERE synced = 0)
                 + (SELECT COUNT(*) FROM visit_a WHERE synced = 0)
                 + (SELECT COUNT(*) FROM visit_b WHERE synced = 0)
            "#,
            [],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }
}

// =========================================================================
// Column helpers
// =========================================================================

pub(crate) fn to_millis(dt: &DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}

/// Epoch-millisecond bounds `[start, end)` of a UTC calendar day.
pub(crate) fn day_bounds(day: NaiveDate) -> (i64, i64) {
    let start = day.and_time(chrono::NaiveTime::MIN).and_utc();
    let end = start + chrono::Duration::days(1);
    (start.timestamp_millis(), end.timestamp_millis())
}

pub(crate) fn datetime_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let ms: i64 = row.get(idx)?;
    DateTime::from_timestamp_millis(ms).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Integer,
            format!("timestamp out of range: {}", ms).into(),
        )
    })
}

pub(crate) fn enum_column<T>(
    row: &Row<'_>,
    idx: usize,
    parse: fn(&str) -> Option<T>,
) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    parse(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("unexpected value: {}", raw).into(),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory() {
        let db = Database::open_in_memory();
        assert!(db.is_ok());
    }

    #[test]
    fn test_schema_initialized() {
        let db = Database::open_in_memory().unwrap();

        // Check that tables exist
        let tables: Vec<String> = db
            .conn()
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        assert!(tables.contains(&"patients".to_string()));
        assert!(tables.contains(&"vitals".to_string()));
        assert!(tables.contains(&"visit_a".to_string()));
        assert!(tables.contains(&"visit_b".to_string()));
    }

    #[test]
    fn test_open_on_disk_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clinic.db");

        {
            let db = Database::open(&path).unwrap();
            db.conn()
                .execute(
                    "INSERT INTO visit_b (patient_id, visit_date, general_health, using_drugs, comments)
                     VALUES ('P1', 0, 'Good', 'No', 'ok')",
                    [],
                )
                .unwrap();
        }

        let db = Database::open(&path).unwrap();
        assert_eq!(db.count_unsynced().unwrap(), 1);
    }

    #[test]
    fn test_day_bounds() {
        let day = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let (start, end) = day_bounds(day);
        assert_eq!(end - start, 86_400_000);
        assert_eq!(start, 1_705_276_800_000);
    }
}
