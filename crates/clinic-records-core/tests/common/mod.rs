//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use clinic_records_core::db::Database;
use clinic_records_core::models::{Gender, Patient};
use clinic_records_core::sync::{
    PatientPayload, RegistryClient, RemoteError, VisitAPayload, VisitBPayload, VitalsPayload,
    PATIENTS_PATH, VISIT_FORM_A_PATH, VISIT_FORM_B_PATH, VITALS_PATH,
};

/// In-process registry that answers from a script and accepts everything
/// once the script runs out.
#[derive(Default)]
pub struct FakeRegistry {
    script: Mutex<VecDeque<Result<(), RemoteError>>>,
    calls: Mutex<Vec<String>>,
}

impl FakeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(self, response: Result<(), RemoteError>) -> Self {
        self.script.lock().unwrap().push_back(response);
        self
    }

    /// `"<path><patient id>"` for every call, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn respond(&self, path: &str, key: &str) -> Result<(), RemoteError> {
        self.calls.lock().unwrap().push(format!("{}{}", path, key));
        self.script.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }
}

#[async_trait]
impl RegistryClient for FakeRegistry {
    async fn register_patient(&self, body: &PatientPayload) -> Result<(), RemoteError> {
        self.respond(PATIENTS_PATH, &body.patient_id)
    }

    async fn submit_vitals(&self, body: &VitalsPayload) -> Result<(), RemoteError> {
        self.respond(VITALS_PATH, &body.patient)
    }

    async fn submit_visit_a(&self, body: &VisitAPayload) -> Result<(), RemoteError> {
        self.respond(VISIT_FORM_A_PATH, &body.patient)
    }

    async fn submit_visit_b(&self, body: &VisitBPayload) -> Result<(), RemoteError> {
        self.respond(VISIT_FORM_B_PATH, &body.patient)
    }
}

pub fn transport(message: &str) -> Result<(), RemoteError> {
    Err(RemoteError::Transport(message.into()))
}

pub fn rejected(status: u16, body: &str) -> Result<(), RemoteError> {
    Err(RemoteError::Rejected {
        status,
        body: body.into(),
    })
}

pub fn date(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 9, 30, 0).unwrap()
}

pub fn add_patient(db: &Database, id: &str) -> Patient {
    let patient = Patient::new(
        id.into(),
        "Amina".into(),
        "Okoro".into(),
        date(1990, 3, 12),
        Gender::Female,
    );
    db.upsert_patient(&patient).unwrap();
    patient
}
