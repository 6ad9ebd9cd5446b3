//! Patient database operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{datetime_column, enum_column, to_millis, Database, DbResult};
use crate::models::{Gender, Patient};

const PATIENT_COLUMNS: &str =
    "patient_id, first_name, last_name, date_of_birth, registration_date, gender, synced";

fn patient_from_row(row: &Row<'_>) -> rusqlite::Result<Patient> {
    Ok(Patient {
        patient_id: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        date_of_birth: datetime_column(row, 3)?,
        registration_date: datetime_column(row, 4)?,
        gender: enum_column(row, 5, Gender::parse)?,
        synced: row.get(6)?,
    })
}

impl Database {
    /// Insert a patient, replacing any existing record with the same ID.
    pub fn upsert_patient(&self, patient: &Patient) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT OR REPLACE INTO patients (
                patient_id, first_name, last_name, date_of_birth,
                registration_date, gender, synced
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                patient.patient_id,
                patient.first_name,
                patient.last_name,
                to_millis(&patient.date_of_birth),
                to_millis(&patient.registration_date),
                patient.gender.as_str(),
                patient.synced,
            ],
        )?;
        Ok(())
    }

    /// Get a patient by ID.
    pub fn get_patient(&self, patient_id: &str) -> DbResult<Option<Patient>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM patients WHERE patient_id = ?", PATIENT_COLUMNS),
                [patient_id],
                patient_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    /// List all patients, most recently registered first.
    pub fn list_patients(&self) -> DbResult<Vec<Patient>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM patients ORDER BY registration_date DESC",
            PATIENT_COLUMNS
        ))?;
        let rows = stmt.query_map([], patient_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Patients not yet accepted by the registry.
    pub fn list_unsynced_patients(&self) -> DbResult<Vec<Patient>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM patients WHERE synced = 0 ORDER BY rowid",
            PATIENT_COLUMNS
        ))?;
        let rows = stmt.query_map([], patient_from_row)?;
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

    fn make_patient(id: &str) -> Patient {
        Patient::new(
            id.into(),
            "Justine".into(),
            "Nabs".into(),
            Utc.with_ymd_and_hms(2019, 3, 22, 0, 0, 0).unwrap(),
            Gender::Male,
        )
    }

    #[test]
    fn test_upsert_and_get() {
        let db = setup_db();
        let patient = make_patient("P002");
        db.upsert_patient(&patient).unwrap();

        let retrieved = db.get_patient("P002").unwrap().unwrap();
        assert_eq!(retrieved.first_name, "Justine");
        assert_eq!(retrieved.gender, Gender::Male);
        assert_eq!(retrieved.date_of_birth, patient.date_of_birth);
        assert_eq!(
            retrieved.registration_date.timestamp_millis(),
            patient.registration_date.timestamp_millis()
        );
        assert!(!retrieved.synced);

        assert!(db.get_patient("missing").unwrap().is_none());
    }

    #[test]
    fn test_upsert_replaces_same_id() {
        let db = setup_db();
        let patient = make_patient("P002");
        db.upsert_patient(&patient).unwrap();

        let mut renamed = patient.clone();
        renamed.first_name = "Justin".into();
        db.upsert_patient(&renamed.into_synced()).unwrap();

        let all = db.list_patients().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].first_name, "Justin");
        assert!(all[0].synced);
    }

    #[test]
    fn test_list_unsynced() {
        let db = setup_db();
        db.upsert_patient(&make_patient("P1")).unwrap();
        db.upsert_patient(&make_patient("P2").into_synced()).unwrap();
        db.upsert_patient(&make_patient("P3")).unwrap();

        let ids: Vec<_> = db
            .list_unsynced_patients()
            .unwrap()
            .into_iter()
            .map(|p| p.patient_id)
            .collect();
        assert_eq!(ids, vec!["P1", "P3"]);
    }

    #[test]
    fn test_list_patients_newest_registration_first() {
        let db = setup_db();
        let mut older = make_patient("OLD");
        older.registration_date = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        let mut newer = make_patient("NEW");
        newer.registration_date = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        db.upsert_patient(&older).unwrap();
        db.upsert_patient(&newer).unwrap();

        let ids: Vec<_> = db
            .list_patients()
            .unwrap()
            .into_iter()
            .map(|p| p.patient_id)
            .collect();
        assert_eq!(ids, vec!["NEW", "OLD"]);
    }
}
