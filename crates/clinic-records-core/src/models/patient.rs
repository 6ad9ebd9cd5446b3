//! Patient models.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

/// Gender options offered at registration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
            Gender::Other => "Other",
        }
    }

    /// Parse a stored or user-entered value (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "male" => Some(Gender::Male),
            "female" => Some(Gender::Female),
            "other" => Some(Gender::Other),
            _ => None,
        }
    }
}

/// A registered patient.
///
/// `patient_id` is assigned by clinic staff, not generated, and is the
/// primary key both locally and on the registry server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    /// Externally assigned identifier
    pub patient_id: String,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: DateTime<Utc>,
    pub registration_date: DateTime<Utc>,
    pub gender: Gender,
    /// Whether the registry has accepted this record
    pub synced: bool,
}

impl Patient {
    /// Create a new, unsynced patient registered now.
    pub fn new(
        patient_id: String,
        first_name: String,
        last_name: String,
        date_of_birth: DateTime<Utc>,
        gender: Gender,
    ) -> Self {
        Self {
            patient_id,
            first_name,
            last_name,
            date_of_birth,
            registration_date: Utc::now(),
            gender,
            synced: false,
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Age in whole years on the given date.
    pub fn age_on(&self, on: DateTime<Utc>) -> i32 {
        let dob = self.date_of_birth.date_naive();
        let today = on.date_naive();
        let mut age = today.year() - dob.year();
        if (today.month(), today.day()) < (dob.month(), dob.day()) {
            age -= 1;
        }
        age
    }

    /// Copy of this record flagged as accepted by the registry.
    pub fn into_synced(self) -> Self {
        Self {
            synced: true,
            ..self
        }
    }
}
