//! Request bodies sent to the registry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Patient, VisitA, VisitB, Vitals};

pub const PATIENTS_PATH: &str = "patients/";
pub const VITALS_PATH: &str = "vitals/";
pub const VISIT_FORM_A_PATH: &str = "visit-form-a/";
pub const VISIT_FORM_B_PATH: &str = "visit-form-b/";

/// Registry date format (`YYYY-MM-DD`).
pub fn wire_date(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d").to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatientPayload {
    pub patient_id: String,
    pub registration_date: String,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: String,
    pub gender: String,
}

impl From<&Patient> for PatientPayload {
    fn from(p: &Patient) -> Self {
        Self {
            patient_id: p.patient_id.clone(),
            registration_date: wire_date(&p.registration_date),
            first_name: p.first_name.clone(),
            last_name: p.last_name.clone(),
            date_of_birth: wire_date(&p.date_of_birth),
            gender: p.gender.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VitalsPayload {
    /// Patient ID
    pub patient: String,
    pub visit_date: String,
    pub height_cm: f64,
    pub weight_kg: f64,
    pub bmi: f64,
}

impl From<&Vitals> for VitalsPayload {
    fn from(v: &Vitals) -> Self {
        Self {
            patient: v.patient_id.clone(),
            visit_date: wire_date(&v.visit_date),
            height_cm: v.height_cm,
            weight_kg: v.weight_kg,
            bmi: v.bmi,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VisitAPayload {
    pub patient: String,
    pub visit_date: String,
    pub general_health: String,
    pub on_diet: bool,
    pub comments: String,
}

impl From<&VisitA> for VisitAPayload {
    fn from(v: &VisitA) -> Self {
        Self {
            patient: v.patient_id.clone(),
            visit_date: wire_date(&v.visit_date),
            general_health: v.general_health.as_str().to_string(),
            on_diet: v.on_diet.as_bool(),
            comments: v.comments.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VisitBPayload {
    pub patient: String,
    pub visit_date: String,
    pub general_health: String,
    pub using_drugs: bool,
    pub comments: String,
}

impl From<&VisitB> for VisitBPayload {
    fn from(v: &VisitB) -> Self {
        Self {
            patient: v.patient_id.clone(),
            visit_date: wire_date(&v.visit_date),
            general_health: v.general_health.as_str().to_string(),
            using_drugs: v.using_drugs.as_bool(),
            comments: v.comments.clone(),
        }
    }
}
