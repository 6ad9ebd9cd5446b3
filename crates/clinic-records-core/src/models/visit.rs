//! Visit assessment models.
//!
//! A visit is recorded on exactly one of two forms. Form A is used for
//! patients below the overweight threshold and asks about diet; form B asks
//! about drug use.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// General health assessment shared by both forms.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum GeneralHealth {
    Good,
    Poor,
}

impl GeneralHealth {
    pub fn as_str(&self) -> &'static str {
        match self {
            GeneralHealth::Good => "Good",
            GeneralHealth::Poor => "Poor",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "good" => Some(GeneralHealth::Good),
            "poor" => Some(GeneralHealth::Poor),
            _ => None,
        }
    }
}

/// Yes/No answer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum YesNo {
    Yes,
    No,
}

impl YesNo {
    pub fn as_str(&self) -> &'static str {
        match self {
            YesNo::Yes => "Yes",
            YesNo::No => "No",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "yes" => Some(YesNo::Yes),
            "no" => Some(YesNo::No),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> bool {
        matches!(self, YesNo::Yes)
    }
}

impl From<bool> for YesNo {
    fn from(value: bool) -> Self {
        if value {
            YesNo::Yes
        } else {
            YesNo::No
        }
    }
}

/// Visit form A (BMI below 25).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VisitA {
    pub id: Option<i64>,
    pub patient_id: String,
    pub visit_date: DateTime<Utc>,
    pub general_health: GeneralHealth,
    pub on_diet: YesNo,
    pub comments: String,
    pub synced: bool,
}

impl VisitA {
    pub fn new(
        patient_id: String,
        visit_date: DateTime<Utc>,
        general_health: GeneralHealth,
        on_diet: YesNo,
        comments: String,
    ) -> Self {
        Self {
            id: None,
            patient_id,
            visit_date,
            general_health,
            on_diet,
            comments,
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

/// Visit form B (BMI 25 and above).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VisitB {
    pub id: Option<i64>,
    pub patient_id: String,
    pub visit_date: DateTime<Utc>,
    pub general_health: GeneralHealth,
    pub using_drugs: YesNo,
    pub comments: String,
    pub synced: bool,
}

impl VisitB {
    pub fn new(
        patient_id: String,
        visit_date: DateTime<Utc>,
        general_health: GeneralHealth,
        using_drugs: YesNo,
        comments: String,
    ) -> Self {
        Self {
            id: None,
            patient_id,
            visit_date,
            general_health,
            using_drugs,
            comments,
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

/// Either visit form, for a patient's merged visit history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "form")]
pub enum Visit {
    A(VisitA),
    B(VisitB),
}

impl Visit {
    pub fn visit_date(&self) -> DateTime<Utc> {
        match self {
            Visit::A(v) => v.visit_date,
            Visit::B(v) => v.visit_date,
        }
    }

    pub fn comments(&self) -> &str {
        match self {
            Visit::A(v) => &v.comments,
            Visit::B(v) => &v.comments,
        }
    }
}

/// Merge both forms into one history, most recent visit first.
pub fn merge_visit_history(visits_a: Vec<VisitA>, visits_b: Vec<VisitB>) -> Vec<Visit> {
    let mut all: Vec<Visit> = visits_a
        .into_iter()
        .map(Visit::A)
        .chain(visits_b.into_iter().map(Visit::B))
        .collect();
    all.sort_by(|a, b| b.visit_date().cmp(&a.visit_date()));
    all
}
