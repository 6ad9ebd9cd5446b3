//! Vitals database operations.

use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension, Row};

use super::{datetime_column, day_bounds, to_millis, Database, DbResult};
use crate::models::Vitals;

const VITALS_COLUMNS: &str = "id, patient_id, visit_date, height_cm, weight_kg, bmi, synced";

fn vitals_from_row(row: &Row<'_>) -> rusqlite::Result<Vitals> {
    Ok(Vitals {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        visit_date: datetime_column(row, 2)?,
        height_cm: row.get(3)?,
        weight_kg: row.get(4)?,
        bmi: row.get(5)?,
        synced: row.get(6)?,
    })
}

impl Database {
    /// Insert or replace vitals. A record without an ID gets a new one.
    ///
    /// Returns the row ID.
    pub fn upsert_vitals(&self, vitals: &Vitals) -> DbResult<i64> {
        self.conn.execute(
            r#"
            INSERT OR REPLACE INTO vitals (
                id, patient_id, visit_date, height_cm, weight_kg, bmi, synced
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                vitals.id,
                vitals.patient_id,
                to_millis(&vitals.visit_date),
                vitals.height_cm,
                vitals.weight_kg,
                vitals.bmi,
                vitals.synced,
            ],
        )?;
        Ok(vitals.id.unwrap_or_else(|| self.conn.last_insert_rowid()))
    }

    pub fn get_vitals(&self, id: i64) -> DbResult<Option<Vitals>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM vitals WHERE id = ?", VITALS_COLUMNS),
                [id],
                vitals_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Most recent vitals for a patient by visit date.
    pub fn latest_vitals_for_patient(&self, patient_id: &str) -> DbResult<Option<Vitals>> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {} FROM vitals WHERE patient_id = ? ORDER BY visit_date DESC, id DESC LIMIT 1",
                    VITALS_COLUMNS
                ),
                [patient_id],
                vitals_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    /// All vitals for a patient, most recent first.
    pub fn list_vitals_for_patient(&self, patient_id: &str) -> DbResult<Vec<Vitals>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM vitals WHERE patient_id = ? ORDER BY visit_date DESC, id DESC",
            VITALS_COLUMNS
        ))?;
        let rows = stmt.query_map([patient_id], vitals_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Vitals whose visit date falls on the given UTC calendar day.
    pub fn list_vitals_on_date(&self, day: NaiveDate) -> DbResult<Vec<Vitals>> {
        let (start, end) = day_bounds(day);
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM vitals WHERE visit_date >= ?1 AND visit_date < ?2 ORDER BY visit_date, id",
            VITALS_COLUMNS
        ))?;
        let rows = stmt.query_map(params![start, end], vitals_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn list_unsynced_vitals(&self) -> DbResult<Vec<Vitals>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM vitals WHERE synced = 0 ORDER BY id",
            VITALS_COLUMNS
        ))?;
        let rows = stmt.query_map([], vitals_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn setup_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn test_insert_assigns_id() {
        let db = setup_db();
        let vitals = Vitals::record("P1".into(), Utc::now(), 170.0, 70.0);

        let id1 = db.upsert_vitals(&vitals).unwrap();
        let id2 = db.upsert_vitals(&vitals).unwrap();
        assert_ne!(id1, id2);

        let stored = db.get_vitals(id1).unwrap().unwrap();
        assert_eq!(stored.id, Some(id1));
        assert_eq!(stored.bmi, vitals.bmi);
    }

    #[test]
    fn test_upsert_with_id_replaces() {
        let db = setup_db();
        let vitals = Vitals::record("P1".into(), Utc::now(), 170.0, 70.0);
        let id = db.upsert_vitals(&vitals).unwrap();

        let stored = db.get_vitals(id).unwrap().unwrap();
        assert_eq!(db.upsert_vitals(&stored.into_synced()).unwrap(), id);

        assert!(db.list_unsynced_vitals().unwrap().is_empty());
        assert!(db.get_vitals(id).unwrap().unwrap().synced);
    }

    #[test]
    fn test_latest_vitals_by_visit_date() {
        let db = setup_db();
        let day = |d| Utc.with_ymd_and_hms(2024, 5, d, 10, 0, 0).unwrap();

        // Insert out of chronological order
        db.upsert_vitals(&Vitals::record("P1".into(), day(20), 160.0, 70.0))
            .unwrap();
        db.upsert_vitals(&Vitals::record("P1".into(), day(2), 160.0, 50.0))
            .unwrap();
        db.upsert_vitals(&Vitals::record("P2".into(), day(25), 160.0, 90.0))
            .unwrap();

        let latest = db.latest_vitals_for_patient("P1").unwrap().unwrap();
        assert_eq!(latest.visit_date, day(20));
        assert_eq!(latest.weight_kg, 70.0);

        assert!(db.latest_vitals_for_patient("P3").unwrap().is_none());
        assert_eq!(db.list_vitals_for_patient("P1").unwrap().len(), 2);
    }

    #[test]
    fn test_vitals_on_date() {
        let db = setup_db();
        let at = |d, h| Utc.with_ymd_and_hms(2024, 5, d, h, 0, 0).unwrap();

        db.upsert_vitals(&Vitals::record("P1".into(), at(3, 0), 160.0, 60.0))
            .unwrap();
        db.upsert_vitals(&Vitals::record("P2".into(), at(3, 23), 160.0, 60.0))
            .unwrap();
        db.upsert_vitals(&Vitals::record("P3".into(), at(4, 0), 160.0, 60.0))
            .unwrap();

        let on_day = db
            .list_vitals_on_date(NaiveDate::from_ymd_opt(2024, 5, 3).unwrap())
            .unwrap();
        let ids: Vec<_> = on_day.iter().map(|v| v.patient_id.as_str()).collect();
        assert_eq!(ids, vec!["P1", "P2"]);
    }
}
