//! Registry client: one create call per record kind.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use super::wire::*;

/// Rejection text the registry returns for an already registered patient.
pub const DUPLICATE_PATIENT_MARKER: &str = "patient with this patient id already exists";

/// Outcome of a registry call that did not succeed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RemoteError {
    /// The exchange never completed (no connectivity, timeout, I/O).
    #[error("Transport failure: {0}")]
    Transport(String),

    /// The registry answered with an application-level rejection.
    #[error("Rejected with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
}

impl RemoteError {
    pub fn is_transport(&self) -> bool {
        matches!(self, RemoteError::Transport(_))
    }

    /// Whether this rejection says the patient already exists server-side.
    pub fn is_duplicate_patient(&self) -> bool {
        match self {
            RemoteError::Rejected { body, .. } => body
                .to_lowercase()
                .contains(DUPLICATE_PATIENT_MARKER),
            RemoteError::Transport(_) => false,
        }
    }
}

/// Remote patient registry.
#[async_trait]
pub trait RegistryClient: Send + Sync {
    async fn register_patient(&self, body: &PatientPayload) -> Result<(), RemoteError>;

    async fn submit_vitals(&self, body: &VitalsPayload) -> Result<(), RemoteError>;

    async fn submit_visit_a(&self, body: &VisitAPayload) -> Result<(), RemoteError>;

    async fn submit_visit_b(&self, body: &VisitBPayload) -> Result<(), RemoteError>;
}

/// JSON-over-HTTP registry client.
pub struct HttpRegistryClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRegistryClient {
    pub fn new(base_url: &str, timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn post<T: Serialize + Sync>(&self, path: &str, body: &T) -> Result<(), RemoteError> {
        let url = self.endpoint(path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| RemoteError::Transport(describe_transport_error(&e, &url)))?;

        let status = response.status();
        if status.is_success() {
            debug!(%url, status = status.as_u16(), "Registry accepted record");
            return Ok(());
        }

        // A body we cannot read means the exchange did not complete.
        let body = response
            .text()
            .await
            .map_err(|e| RemoteError::Transport(describe_transport_error(&e, &url)))?;

        Err(RemoteError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

fn describe_transport_error(e: &reqwest::Error, url: &str) -> String {
    if e.is_timeout() {
        format!("timeout posting to {}", url)
    } else if e.is_connect() {
        format!("connection error posting to {}: {}", url, e)
    } else {
        format!("request to {} failed: {}", url, e)
    }
}

#[async_trait]
impl RegistryClient for HttpRegistryClient {
    async fn register_patient(&self, body: &PatientPayload) -> Result<(), RemoteError> {
        self.post(PATIENTS_PATH, body).await
    }

    async fn submit_vitals(&self, body: &VitalsPayload) -> Result<(), RemoteError> {
        self.post(VITALS_PATH, body).await
    }

    async fn submit_visit_a(&self, body: &VisitAPayload) -> Result<(), RemoteError> {
        self.post(VISIT_FORM_A_PATH, body).await
    }

    async fn submit_visit_b(&self, body: &VisitBPayload) -> Result<(), RemoteError> {
        self.post(VISIT_FORM_B_PATH, body).await
    }
}
