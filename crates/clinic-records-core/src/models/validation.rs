//! Input checks applied before a record is stored.

use thiserror::Error;

use super::{Patient, VisitA, VisitB, Vitals};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("{0} is required")]
    Required(&'static str),

    #[error("{field} must be greater than zero, got {value}")]
    NotPositive { field: &'static str, value: f64 },
}

pub type ValidationResult = Result<(), ValidationError>;

fn require_text(field: &'static str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::Required(field));
    }
    Ok(())
}

fn require_positive(field: &'static str, value: f64) -> ValidationResult {
    // NaN fails this comparison too
    if !(value > 0.0) {
        return Err(ValidationError::NotPositive { field, value });
    }
    Ok(())
}

impl Patient {
    pub fn validate(&self) -> ValidationResult {
        require_text("patient_id", &self.patient_id)?;
        require_text("first_name", &self.first_name)?;
        require_text("last_name", &self.last_name)
    }
}

impl Vitals {
    pub fn validate(&self) -> ValidationResult {
        require_text("patient_id", &self.patient_id)?;
        require_positive("height_cm", self.height_cm)?;
        require_positive("weight_kg", self.weight_kg)
    }
}

impl VisitA {
    pub fn validate(&self) -> ValidationResult {
        require_text("patient_id", &self.patient_id)?;
        require_text("comments", &self.comments)
    }
}

impl VisitB {
    pub fn validate(&self) -> ValidationResult {
        require_text("patient_id", &self.patient_id)?;
        require_text("comments", &self.comments)
    }
}
