//! Visit form database operations.
//!
//! Both forms keep the same sync bookkeeping as patients and vitals.

use rusqlite::{params, OptionalExtension, Row};

use super::{datetime_column, enum_column, to_millis, Database, DbResult};
use crate::models::{merge_visit_history, GeneralHealth, Visit, VisitA, VisitB, YesNo};

const VISIT_A_COLUMNS: &str =
    "id, patient_id, visit_date, general_health, on_diet, comments, synced";
const VISIT_B_COLUMNS: &str =
    "id, patient_id, visit_date, general_health, using_drugs, comments, synced";

fn visit_a_from_row(row: &Row<'_>) -> rusqlite::Result<VisitA> {
    Ok(VisitA {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        visit_date: datetime_column(row, 2)?,
        general_health: enum_column(row, 3, GeneralHealth::parse)?,
        on_diet: enum_column(row, 4, YesNo::parse)?,
        comments: row.get(5)?,
        synced: row.get(6)?,
    })
}

fn visit_b_from_row(row: &Row<'_>) -> rusqlite::Result<VisitB> {
    Ok(VisitB {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        visit_date: datetime_column(row, 2)?,
        general_health: enum_column(row, 3, GeneralHealth::parse)?,
        using_drugs: enum_column(row, 4, YesNo::parse)?,
        comments: row.get(5)?,
        synced: row.get(6)?,
    })
}

impl Database {
    // =========================================================================
    // Form A
    // =========================================================================

    /// Insert or replace a form A visit. Returns the row ID.
    pub fn upsert_visit_a(&self, visit: &VisitA) -> DbResult<i64> {
        self.conn.execute(
            r#"
            INSERT OR REPLACE INTO visit_a (
                id, patient_id, visit_date, general_health, on_diet, comments, synced
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                visit.id,
                visit.patient_id,
                to_millis(&visit.visit_date),
                visit.general_health.as_str(),
                visit.on_diet.as_str(),
                visit.comments,
                visit.synced,
            ],
        )?;
        Ok(visit.id.unwrap_or_else(|| self.conn.last_insert_rowid()))
    }

    pub fn get_visit_a(&self, id: i64) -> DbResult<Option<VisitA>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM visit_a WHERE id = ?", VISIT_A_COLUMNS),
                [id],
                visit_a_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    pub fn list_visit_a_for_patient(&self, patient_id: &str) -> DbResult<Vec<VisitA>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM visit_a WHERE patient_id = ? ORDER BY visit_date DESC, id DESC",
            VISIT_A_COLUMNS
        ))?;
        let rows = stmt.query_map([patient_id], visit_a_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn list_unsynced_visit_a(&self) -> DbResult<Vec<VisitA>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM visit_a WHERE synced = 0 ORDER BY id",
            VISIT_A_COLUMNS
        ))?;
        let rows = stmt.query_map([], visit_a_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    // =========================================================================
    // Form B
    // =========================================================================

    /// Insert or replace a form B visit. Returns the row ID.
    pub fn upsert_visit_b(&self, visit: &VisitB) -> DbResult<i64> {
        self.conn.execute(
            r#"
            INSERT OR REPLACE INTO visit_b (
                id, patient_id, visit_date, general_health, using_drugs, comments, synced
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                visit.id,
                visit.patient_id,
                to_millis(&visit.visit_date),
                visit.general_health.as_str(),
                visit.using_drugs.as_str(),
                visit.comments,
                visit.synced,
            ],
        )?;
        Ok(visit.id.unwrap_or_else(|| self.conn.last_insert_rowid()))
    }

    pub fn get_visit_b(&self, id: i64) -> DbResult<Option<VisitB>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM visit_b WHERE id = ?", VISIT_B_COLUMNS),
                [id],
                visit_b_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    pub fn list_visit_b_for_patient(&self, patient_id: &str) -> DbResult<Vec<VisitB>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM visit_b WHERE patient_id = ? ORDER BY visit_date DESC, id DESC",
            VISIT_B_COLUMNS
        ))?;
        let rows = stmt.query_map([patient_id], visit_b_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn list_unsynced_visit_b(&self) -> DbResult<Vec<VisitB>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM visit_b WHERE synced = 0 ORDER BY id",
            VISIT_B_COLUMNS
        ))?;
        let rows = stmt.query_map([], visit_b_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Both forms for a patient, most recent visit first.
    pub fn visit_history(&self, patient_id: &str) -> DbResult<Vec<Visit>> {
        let visits_a = self.list_visit_a_for_patient(patient_id)?;
        let visits_b = self.list_visit_b_for_patient(patient_id)?;
        Ok(merge_visit_history(visits_a, visits_b))
    }
}
