//! One sync pass: scan, push, reconcile.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use super::client::{RegistryClient, RemoteError};
use super::wire::{PatientPayload, VisitAPayload, VisitBPayload, VitalsPayload};
use super::{RecordKind, SyncError, SyncResult};
use crate::db::{Database, DbResult};
use crate::models::{Patient, VisitA, VisitB, Vitals};

/// Whether the scheduler should try again later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    Success,
    Retry,
}

/// What a pass did.
#[derive(Debug, Clone, PartialEq)]
pub struct PassReport {
    pub outcome: PassOutcome,
    /// Records accepted by the registry and marked synced locally
    pub synced: u32,
    /// Patients the registry already had, reconciled as synced
    pub duplicates: u32,
    /// Records rejected this pass; they stay unsynced
    pub rejected: u32,
    /// Set when the pass stopped early
    pub aborted: Option<SyncError>,
}

impl PassReport {
    fn new() -> Self {
        Self {
            outcome: PassOutcome::Success,
            synced: 0,
            duplicates: 0,
            rejected: 0,
            aborted: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == PassOutcome::Success
    }
}

/// A locally stored record kind that participates in sync.
#[async_trait]
trait SyncRecord: Send + Sync + Sized + PartialEq {
    const KIND: RecordKind;

    fn load_unsynced(db: &Database) -> DbResult<Vec<Self>>;

    /// The row currently stored under this record's key.
    fn load_current(&self, db: &Database) -> DbResult<Option<Self>>;

    /// Re-store the full record with `synced = true`.
    fn store_synced(&self, db: &Database) -> DbResult<()>;

    /// Identifies the record in logs.
    fn label(&self) -> String;

    async fn push(&self, client: &dyn RegistryClient) -> Result<(), RemoteError>;
}

#[async_trait]
impl SyncRecord for Patient {
    const KIND: RecordKind = RecordKind::Patient;

    fn load_unsynced(db: &Database) -> DbResult<Vec<Self>> {
        db.list_unsynced_patients()
    }

    fn load_current(&self, db: &Database) -> DbResult<Option<Self>> {
        db.get_patient(&self.patient_id)
    }

    fn store_synced(&self, db: &Database) -> DbResult<()> {
        db.upsert_patient(&self.clone().into_synced())
    }

    fn label(&self) -> String {
        self.patient_id.clone()
    }

    async fn push(&self, client: &dyn RegistryClient) -> Result<(), RemoteError> {
        client.register_patient(&PatientPayload::from(self)).await
    }
}

#[async_trait]
impl SyncRecord for Vitals {
    const KIND: RecordKind = RecordKind::Vitals;

    fn load_unsynced(db: &Database) -> DbResult<Vec<Self>> {
        db.list_unsynced_vitals()
    }

    fn load_current(&self, db: &Database) -> DbResult<Option<Self>> {
        self.id.map_or(Ok(None), |id| db.get_vitals(id))
    }

    fn store_synced(&self, db: &Database) -> DbResult<()> {
        db.upsert_vitals(&self.clone().into_synced()).map(|_| ())
    }

    fn label(&self) -> String {
        format!("{}#{}", self.patient_id, self.id.unwrap_or_default())
    }

    async fn push(&self, client: &dyn RegistryClient) -> Result<(), RemoteError> {
        client.submit_vitals(&VitalsPayload::from(self)).await
    }
}

#[async_trait]
impl SyncRecord for VisitA {
    const KIND: RecordKind = RecordKind::VisitA;

    fn load_unsynced(db: &Database) -> DbResult<Vec<Self>> {
        db.list_unsynced_visit_a()
    }

    fn load_current(&self, db: &Database) -> DbResult<Option<Self>> {
        self.id.map_or(Ok(None), |id| db.get_visit_a(id))
    }

    fn store_synced(&self, db: &Database) -> DbResult<()> {
        db.upsert_visit_a(&self.clone().into_synced()).map(|_| ())
    }

    fn label(&self) -> String {
        format!("{}#{}", self.patient_id, self.id.unwrap_or_default())
    }

    async fn push(&self, client: &dyn RegistryClient) -> Result<(), RemoteError> {
        client.submit_visit_a(&VisitAPayload::from(self)).await
    }
}

#[async_trait]
impl SyncRecord for VisitB {
    const KIND: RecordKind = RecordKind::VisitB;

    fn load_unsynced(db: &Database) -> DbResult<Vec<Self>> {
        db.list_unsynced_visit_b()
    }

    fn load_current(&self, db: &Database) -> DbResult<Option<Self>> {
        self.id.map_or(Ok(None), |id| db.get_visit_b(id))
    }

    fn store_synced(&self, db: &Database) -> DbResult<()> {
        db.upsert_visit_b(&self.clone().into_synced()).map(|_| ())
    }

    fn label(&self) -> String {
        format!("{}#{}", self.patient_id, self.id.unwrap_or_default())
    }

    async fn push(&self, client: &dyn RegistryClient) -> Result<(), RemoteError> {
        client.submit_visit_b(&VisitBPayload::from(self)).await
    }
}

/// Pushes unsynced local records to the registry.
///
/// Passes are serialized: a second caller waits for the running pass to
/// finish before starting its own.
pub struct SyncEngine {
    db: Arc<Mutex<Database>>,
    client: Arc<dyn RegistryClient>,
    pass_lock: tokio::sync::Mutex<()>,
}

impl SyncEngine {
    pub fn new(db: Arc<Mutex<Database>>, client: Arc<dyn RegistryClient>) -> Self {
        Self {
            db,
            client,
            pass_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Run one pass over all record kinds.
    pub async fn run_pass(&self) -> PassReport {
        let _pass = self.pass_lock.lock().await;
        let mut report = PassReport::new();
        info!("Starting sync pass");

        if let Err(e) = self.sync_all(&mut report).await {
            warn!(error = %e, "Sync pass aborted, will retry");
            report.outcome = PassOutcome::Retry;
            report.aborted = Some(e);
        } else {
            info!(
                synced = report.synced,
                duplicates = report.duplicates,
                rejected = report.rejected,
                "Sync pass complete"
            );
        }

        report
    }

    async fn sync_all(&self, report: &mut PassReport) -> SyncResult<()> {
        for kind in RecordKind::PASS_ORDER {
            match kind {
                RecordKind::Patient => self.sync_kind::<Patient>(report).await?,
                RecordKind::Vitals => self.sync_kind::<Vitals>(report).await?,
                RecordKind::VisitA => self.sync_kind::<VisitA>(report).await?,
                RecordKind::VisitB => self.sync_kind::<VisitB>(report).await?,
            }
        }
        Ok(())
    }

    async fn sync_kind<R: SyncRecord>(&self, report: &mut PassReport) -> SyncResult<()> {
        let pending = {
            let db = self.lock_db(R::KIND)?;
            R::load_unsynced(&db).map_err(|e| store_error(R::KIND, e))?
        };
        debug!(kind = %R::KIND, count = pending.len(), "Found unsynced records");

        for record in pending {
            match record.push(self.client.as_ref()).await {
                Ok(()) => {
                    if self.mark_synced(&record)? {
                        report.synced += 1;
                        debug!(kind = %R::KIND, record = %record.label(), "Synced");
                    }
                }
                Err(RemoteError::Transport(message)) => {
                    warn!(kind = %R::KIND, record = %record.label(), %message, "Network error");
                    return Err(SyncError::Transport {
                        kind: R::KIND,
                        message,
                    });
                }
                Err(err) if R::KIND == RecordKind::Patient && err.is_duplicate_patient() => {
                    if self.mark_synced(&record)? {
                        report.duplicates += 1;
                        warn!(record = %record.label(), "Duplicate patient marked as synced");
                    }
                }
                Err(err) => {
                    report.rejected += 1;
                    error!(kind = %R::KIND, record = %record.label(), error = %err, "Registry rejected record");
                }
            }
        }

        Ok(())
    }

    /// Store `record` as synced unless the row changed while it was in flight.
    ///
    /// Returns `false` when the stored row no longer matches what was pushed;
    /// the newer row stays unsynced for the next pass.
    fn mark_synced<R: SyncRecord>(&self, record: &R) -> SyncResult<bool> {
        let db = self.lock_db(R::KIND)?;
        let current = record
            .load_current(&db)
            .map_err(|e| store_error(R::KIND, e))?;
        if current.as_ref() != Some(record) {
            info!(kind = %R::KIND, record = %record.label(), "Record changed during upload, leaving unsynced");
            return Ok(false);
        }

        record.store_synced(&db).map_err(|e| {
            error!(kind = %R::KIND, record = %record.label(), error = %e, "Failed to store sync state");
            store_error(R::KIND, e)
        })?;
        Ok(true)
    }

    fn lock_db(&self, kind: RecordKind) -> SyncResult<MutexGuard<'_, Database>> {
        self.db.lock().map_err(|e| SyncError::Store {
            kind,
            message: format!("Lock poisoned: {}", e),
        })
    }
}

fn store_error(kind: RecordKind, e: crate::db::DbError) -> SyncError {
    SyncError::Store {
        kind,
        message: e.to_string(),
    }
}
