//! SQLite schema definition.

/// Complete database schema for clinic records.
///
/// All dates are stored as epoch milliseconds (UTC).
pub const SCHEMA: &str = r#"
-- ============================================================================
-- Patients
-- ============================================================================

CREATE TABLE IF NOT EXISTS patients (
    patient_id TEXT PRIMARY KEY,                 -- assigned by clinic staff
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    date_of_birth INTEGER NOT NULL,
    registration_date INTEGER NOT NULL,
    gender TEXT NOT NULL CHECK (gender IN ('Male', 'Female', 'Other')),
    synced INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_patients_synced ON patients(synced);
CREATE INDEX IF NOT EXISTS idx_patients_registration ON patients(registration_date);

-- ============================================================================
-- Vitals
-- ============================================================================

CREATE TABLE IF NOT EXISTS vitals (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    patient_id TEXT NOT NULL,
    visit_date INTEGER NOT NULL,
    height_cm REAL NOT NULL,
    weight_kg REAL NOT NULL,
    bmi REAL NOT NULL,
    synced INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_vitals_patient ON vitals(patient_id, visit_date);
CREATE INDEX IF NOT EXISTS idx_vitals_visit_date ON vitals(visit_date);
CREATE INDEX IF NOT EXISTS idx_vitals_synced ON vitals(synced);

-- ============================================================================
-- Visit Forms
-- ============================================================================

CREATE TABLE IF NOT EXISTS visit_a (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    patient_id TEXT NOT NULL,
    visit_date INTEGER NOT NULL,
    general_health TEXT NOT NULL CHECK (general_health IN ('Good', 'Poor')),
    on_diet TEXT NOT NULL CHECK (on_diet IN ('Yes', 'No')),
    comments TEXT NOT NULL,
    synced INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_visit_a_patient ON visit_a(patient_id, visit_date);
CREATE INDEX IF NOT EXISTS idx_visit_a_synced ON visit_a(synced);

CREATE TABLE IF NOT EXISTS visit_b (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    patient_id TEXT NOT NULL,
    visit_date INTEGER NOT NULL,
    general_health TEXT NOT NULL CHECK (general_health IN ('Good', 'Poor')),
    using_drugs TEXT NOT NULL CHECK (using_drugs IN ('Yes', 'No')),
    comments TEXT NOT NULL,
    synced INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_visit_b_patient ON visit_b(patient_id, visit_date);
CREATE INDEX IF NOT EXISTS idx_visit_b_synced ON visit_b(synced);
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_valid() {
        let conn = Connection::open_in_memory().unwrap();
        let result = conn.execute_batch(SCHEMA);
        assert!(result.is_ok(), "Schema should be valid SQL: {:?}", result);
    }

    #[test]
    fn test_schema_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        assert!(conn.execute_batch(SCHEMA).is_ok());
    }

    #[test]
    fn test_gender_constraint() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        let result = conn.execute(
            "INSERT INTO patients (patient_id, first_name, last_name, date_of_birth, registration_date, gender)
             VALUES ('P1', 'A', 'B', 0, 0, 'Unknown')",
            [],
        );
        assert!(result.is_err());

        let result = conn.execute(
            "INSERT INTO patients (patient_id, first_name, last_name, date_of_birth, registration_date, gender)
             VALUES ('P1', 'A', 'B', 0, 0, 'Female')",
            [],
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_vitals_autoincrement() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        for _ in 0..2 {
            conn.execute(
                "INSERT INTO vitals (id, patient_id, visit_date, height_cm, weight_kg, bmi)
                 VALUES (NULL, 'P1', 0, 160.0, 64.0, 25.0)",
                [],
            )
            .unwrap();
        }
        let max_id: i64 = conn
            .query_row("SELECT MAX(id) FROM vitals", [], |row| row.get(0))
            .unwrap();
        assert_eq!(max_id, 2);
    }
}
