//! Patient list views labelled with the latest BMI.

use std::collections::HashSet;

use chrono::NaiveDate;

use super::{next_visit_variant, BmiCategory, VisitVariant};
use crate::db::{Database, DbResult};
use crate::models::{Patient, Vitals};

/// A patient row with the BMI label shown in lists.
#[derive(Debug, Clone, PartialEq)]
pub struct PatientSummary {
    pub patient: Patient,
    /// BMI from the most recent vitals, if any were recorded
    pub last_bmi: Option<f64>,
    pub bmi_category: BmiCategory,
    pub next_visit: VisitVariant,
}

impl PatientSummary {
    pub fn new(patient: Patient, latest: Option<&Vitals>) -> Self {
        let last_bmi = latest.map(|v| v.bmi);
        Self {
            patient,
            last_bmi,
            bmi_category: BmiCategory::from_bmi(last_bmi.unwrap_or(0.0)),
            next_visit: next_visit_variant(latest),
        }
    }

    /// BMI as displayed: missing vitals show as 0.0.
    pub fn display_bmi(&self) -> f64 {
        self.last_bmi.unwrap_or(0.0)
    }
}

impl Database {
    /// Next visit form for a stored patient.
    pub fn next_visit_for_patient(&self, patient_id: &str) -> DbResult<VisitVariant> {
        let latest = self.latest_vitals_for_patient(patient_id)?;
        Ok(next_visit_variant(latest.as_ref()))
    }

    /// All patients with their latest BMI, most recently registered first.
    pub fn patient_summaries(&self) -> DbResult<Vec<PatientSummary>> {
        self.summarize(self.list_patients()?)
    }

    /// Patients who had vitals taken on the given UTC calendar day.
    pub fn patients_seen_on(&self, day: NaiveDate) -> DbResult<Vec<PatientSummary>> {
        let seen: HashSet<String> = self
            .list_vitals_on_date(day)?
            .into_iter()
            .map(|v| v.patient_id)
            .collect();

        let patients = self
            .list_patients()?
            .into_iter()
            .filter(|p| seen.contains(&p.patient_id))
            .collect();
        self.summarize(patients)
    }

    fn summarize(&self, patients: Vec<Patient>) -> DbResult<Vec<PatientSummary>> {
        patients
            .into_iter()
            .map(|patient| {
                let latest = self.latest_vitals_for_patient(&patient.patient_id)?;
                Ok(PatientSummary::new(patient, latest.as_ref()))
            })
            .collect()
    }
}
