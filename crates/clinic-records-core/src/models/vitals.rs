//! Vitals models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Body mass index from height in centimetres and weight in kilograms.
///
/// Equal to `weight_kg / (height_cm / 100)^2`, scaled so that whole-number
/// inputs on the 25.0 boundary (160 cm, 64 kg) land on it exactly.
/// Callers must ensure `height_cm > 0`.
pub fn compute_bmi(height_cm: f64, weight_kg: f64) -> f64 {
    weight_kg * 10_000.0 / (height_cm * height_cm)
}

/// One vitals measurement taken at a visit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Vitals {
    /// Row id, `None` until first stored
    pub id: Option<i64>,
    pub patient_id: String,
    pub visit_date: DateTime<Utc>,
    pub height_cm: f64,
    pub weight_kg: f64,
    /// Computed once at recording time and trusted afterwards
    pub bmi: f64,
    pub synced: bool,
}

impl Vitals {
    /// Record new vitals, computing BMI from the measurements.
    pub fn record(
        patient_id: String,
        visit_date: DateTime<Utc>,
        height_cm: f64,
        weight_kg: f64,
    ) -> Self {
        Self {
            id: None,
            patient_id,
            visit_date,
            height_cm,
            weight_kg,
            bmi: compute_bmi(height_cm, weight_kg),
            synced: false,
        }
    }

    pub fn into_synced(self) -> Self {
        Self {
            synced: true,
            ..self
        }
    }
}
