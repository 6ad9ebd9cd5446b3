//! Clinic Records Core Library
//!
//! Offline-first patient records for field clinics, with background upload
//! to a central registry.
//!
//! # Architecture
//!
//! ```text
//!   Register patient ─┐
//!   Record vitals ────┼──► SQLite (synced = 0) ──► trigger one-shot sync
//!   Visit form A / B ─┘            │
//!                                  │            periodic job (15 min)
//!                                  ▼                    │
//!                    ┌──────────────────────────────┐   │
//!                    │          Sync pass           │◄──┘
//!                    │ patients → vitals → A → B    │
//!                    │ POST each, mark accepted     │
//!                    │ abort on transport failure   │
//!                    └──────────────┬───────────────┘
//!                                   ▼
//!                            Patient registry
//! ```
//!
//! The latest stored BMI routes a patient to visit form A (below 25) or
//! form B (25 and above).
//!
//! # Modules
//!
//! - [`db`]: SQLite store, one table per record kind
//! - [`models`]: Domain types (Patient, Vitals, VisitA, VisitB)
//! - [`workflow`]: BMI routing and patient list views
//! - [`sync`]: Registry client, sync engine and scheduler
//! - [`config`]: Sync configuration
//! - [`logging`]: Tracing subscriber setup

pub mod config;
pub mod db;
pub mod logging;
pub mod models;
pub mod sync;
pub mod workflow;

// Re-export commonly used types
pub use self::config::SyncConfig;
pub use db::Database;
pub use models::{
    Gender, GeneralHealth, Patient, ValidationError, Visit, VisitA, VisitB, Vitals, YesNo,
};
pub use sync::{
    HttpRegistryClient, NetworkMonitor, PassOutcome, PassReport, RegistryClient, RemoteError,
    ScheduleSettings, SyncEngine, SyncScheduler,
};
pub use workflow::{next_visit_variant, BmiCategory, PatientSummary, VisitVariant};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tracing::info;

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum ClinicError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Sync error: {0}")]
    SyncError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<db::DbError> for ClinicError {
    fn from(e: db::DbError) -> Self {
        ClinicError::DatabaseError(e.to_string())
    }
}

impl From<ValidationError> for ClinicError {
    fn from(e: ValidationError) -> Self {
        ClinicError::InvalidInput(e.to_string())
    }
}

impl From<self::config::ConfigError> for ClinicError {
    fn from(e: self::config::ConfigError) -> Self {
        ClinicError::ConfigError(e.to_string())
    }
}

impl From<sync::SyncError> for ClinicError {
    fn from(e: sync::SyncError) -> Self {
        ClinicError::SyncError(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for ClinicError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        ClinicError::DatabaseError(format!("Lock poisoned: {}", e))
    }
}

fn from_millis(field: &str, ms: i64) -> Result<DateTime<Utc>, ClinicError> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| ClinicError::InvalidInput(format!("{} out of range: {}", field, ms)))
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create a database at the given path.
///
/// `config_json` overrides the sync configuration; when absent it is read
/// from `CLINIC_SYNC__*` environment variables on top of the defaults.
#[uniffi::export]
pub fn open_database(
    path: String,
    config_json: Option<String>,
) -> Result<Arc<ClinicCore>, ClinicError> {
    let config = match config_json {
        Some(json) => SyncConfig::from_json(&json)?,
        None => SyncConfig::load(None)?,
    };
    ClinicCore::open(Database::open(&path)?, &config)
}

/// Create an in-memory database (for testing).
#[uniffi::export]
pub fn open_database_in_memory() -> Result<Arc<ClinicCore>, ClinicError> {
    ClinicCore::open(Database::open_in_memory()?, &SyncConfig::default())
}

/// Install the tracing subscriber. Returns `false` if one was already set.
#[uniffi::export]
pub fn init_logging(filter: Option<String>) -> bool {
    logging::init(filter.as_deref().unwrap_or(logging::DEFAULT_FILTER))
}

// =========================================================================
// Main API Object
// =========================================================================

/// Store, sync engine and scheduler, shared across FFI calls.
///
/// Connectivity starts as unavailable; the host reports it through
/// [`ClinicCore::set_network_available`].
#[derive(uniffi::Object)]
pub struct ClinicCore {
    db: Arc<Mutex<Database>>,
    engine: Arc<SyncEngine>,
    // Declared before `runtime` so jobs are aborted before it shuts down.
    scheduler: SyncScheduler,
    runtime: tokio::runtime::Runtime,
}

impl ClinicCore {
    fn open(db: Database, config: &SyncConfig) -> Result<Arc<Self>, ClinicError> {
        let client = HttpRegistryClient::new(&config.base_url, config.request_timeout())
            .map_err(|e| ClinicError::ConfigError(format!("HTTP client: {}", e)))?;
        info!(base_url = %config.base_url, "Opening clinic records core");
        Self::with_client(
            db,
            Arc::new(client),
            config.schedule(),
            NetworkMonitor::new(false),
        )
    }

    /// Build a core around any registry client.
    pub fn with_client(
        db: Database,
        client: Arc<dyn RegistryClient>,
        settings: ScheduleSettings,
        network: NetworkMonitor,
    ) -> Result<Arc<Self>, ClinicError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| ClinicError::SyncError(format!("Failed to start runtime: {}", e)))?;

        let db = Arc::new(Mutex::new(db));
        let engine = Arc::new(SyncEngine::new(db.clone(), client));
        let scheduler = SyncScheduler::new(engine.clone(), network, settings, runtime.handle().clone());

        Ok(Arc::new(Self {
            db,
            engine,
            scheduler,
            runtime,
        }))
    }

    pub fn scheduler(&self) -> &SyncScheduler {
        &self.scheduler
    }

    fn require_patient(&self, db: &Database, patient_id: &str) -> Result<(), ClinicError> {
        match db.get_patient(patient_id)? {
            Some(_) => Ok(()),
            None => Err(ClinicError::NotFound(format!("patient {}", patient_id))),
        }
    }

    fn after_write(&self) {
        // Detached; the one-shot job outlives this call.
        let _job = self.scheduler.trigger_immediate_sync();
    }
}

#[uniffi::export]
impl ClinicCore {
    // =========================================================================
    // Patient Operations
    // =========================================================================

    /// Register a patient. Re-registering an ID replaces the record.
    pub fn register_patient(
        &self,
        patient_id: String,
        first_name: String,
        last_name: String,
        date_of_birth_ms: i64,
        gender: FfiGender,
    ) -> Result<FfiPatient, ClinicError> {
        let patient = Patient::new(
            patient_id.trim().to_string(),
            first_name.trim().to_string(),
            last_name.trim().to_string(),
            from_millis("date_of_birth", date_of_birth_ms)?,
            gender.into(),
        );
        patient.validate()?;
        {
            let db = self.db.lock()?;
            db.upsert_patient(&patient)?;
        }
        info!(patient_id = %patient.patient_id, "Patient registered");
        self.after_write();
        Ok(patient.into())
    }

    /// Get a patient by ID.
    pub fn get_patient(&self, patient_id: String) -> Result<Option<FfiPatient>, ClinicError> {
        let db = self.db.lock()?;
        Ok(db.get_patient(&patient_id)?.map(|p| p.into()))
    }

    /// All patients with their BMI labels, newest registration first.
    pub fn list_patients(&self) -> Result<Vec<FfiPatientSummary>, ClinicError> {
        let db = self.db.lock()?;
        Ok(db.patient_summaries()?.into_iter().map(|s| s.into()).collect())
    }

    /// Patients with vitals recorded on the UTC day containing `date_ms`.
    pub fn list_patients_seen_on(
        &self,
        date_ms: i64,
    ) -> Result<Vec<FfiPatientSummary>, ClinicError> {
        let day = from_millis("date", date_ms)?.date_naive();
        let db = self.db.lock()?;
        Ok(db.patients_seen_on(day)?.into_iter().map(|s| s.into()).collect())
    }

    // =========================================================================
    // Vitals Operations
    // =========================================================================

    /// Record vitals and report which visit form comes next.
    pub fn record_vitals(
        &self,
        patient_id: String,
        visit_date_ms: i64,
        height_cm: f64,
        weight_kg: f64,
    ) -> Result<FfiVitalsOutcome, ClinicError> {
        let mut vitals = Vitals::record(
            patient_id,
            from_millis("visit_date", visit_date_ms)?,
            height_cm,
            weight_kg,
        );
        vitals.validate()?;

        let next_visit = {
            let db = self.db.lock()?;
            self.require_patient(&db, &vitals.patient_id)?;
            vitals.id = Some(db.upsert_vitals(&vitals)?);
            db.next_visit_for_patient(&vitals.patient_id)?
        };
        info!(
            patient_id = %vitals.patient_id,
            bmi = vitals.bmi,
            next_visit = ?next_visit,
            "Vitals recorded"
        );
        self.after_write();

        Ok(FfiVitalsOutcome {
            vitals: vitals.into(),
            next_visit: next_visit.into(),
        })
    }

    /// Vitals for a patient, newest first.
    pub fn vitals_for_patient(&self, patient_id: String) -> Result<Vec<FfiVitals>, ClinicError> {
        let db = self.db.lock()?;
        Ok(db
            .list_vitals_for_patient(&patient_id)?
            .into_iter()
            .map(|v| v.into())
            .collect())
    }

    /// Visit form to present next for a patient.
    pub fn next_visit_variant(&self, patient_id: String) -> Result<FfiVisitVariant, ClinicError> {
        let db = self.db.lock()?;
        self.require_patient(&db, &patient_id)?;
        Ok(db.next_visit_for_patient(&patient_id)?.into())
    }

    // =========================================================================
    // Visit Operations
    // =========================================================================

    /// Record a visit form A (diet assessment).
    pub fn record_visit_a(
        &self,
        patient_id: String,
        visit_date_ms: i64,
        general_health: FfiGeneralHealth,
        on_diet: bool,
        comments: String,
    ) -> Result<FfiVisitA, ClinicError> {
        let mut visit = VisitA::new(
            patient_id,
            from_millis("visit_date", visit_date_ms)?,
            general_health.into(),
            on_diet.into(),
            comments.trim().to_string(),
        );
        visit.validate()?;
        {
            let db = self.db.lock()?;
            self.require_patient(&db, &visit.patient_id)?;
            visit.id = Some(db.upsert_visit_a(&visit)?);
        }
        info!(patient_id = %visit.patient_id, "Visit form A recorded");
        self.after_write();
        Ok(visit.into())
    }

    /// Record a visit form B (drug use assessment).
    pub fn record_visit_b(
        &self,
        patient_id: String,
        visit_date_ms: i64,
        general_health: FfiGeneralHealth,
        using_drugs: bool,
        comments: String,
    ) -> Result<FfiVisitB, ClinicError> {
        let mut visit = VisitB::new(
            patient_id,
            from_millis("visit_date", visit_date_ms)?,
            general_health.into(),
            using_drugs.into(),
            comments.trim().to_string(),
        );
        visit.validate()?;
        {
            let db = self.db.lock()?;
            self.require_patient(&db, &visit.patient_id)?;
            visit.id = Some(db.upsert_visit_b(&visit)?);
        }
        info!(patient_id = %visit.patient_id, "Visit form B recorded");
        self.after_write();
        Ok(visit.into())
    }

    /// Both visit forms for a patient, newest first.
    pub fn visit_history(&self, patient_id: String) -> Result<Vec<FfiVisit>, ClinicError> {
        let db = self.db.lock()?;
        Ok(db
            .visit_history(&patient_id)?
            .into_iter()
            .map(|v| v.into())
            .collect())
    }

    // =========================================================================
    // Sync Operations
    // =========================================================================

    /// Records of every kind still waiting for upload.
    pub fn unsynced_count(&self) -> Result<u64, ClinicError> {
        let db = self.db.lock()?;
        Ok(db.count_unsynced()?)
    }

    /// Report connectivity from the host platform.
    pub fn set_network_available(&self, available: bool) {
        self.scheduler.network().set_connected(available);
    }

    /// Schedule the periodic sync job. Returns `false` if it already exists.
    pub fn start_periodic_sync(&self) -> bool {
        self.scheduler.schedule_periodic_sync()
    }

    /// Cancel the periodic sync job. Returns `false` if none was scheduled.
    pub fn stop_periodic_sync(&self) -> bool {
        self.scheduler.cancel_periodic_sync()
    }

    pub fn is_periodic_sync_scheduled(&self) -> bool {
        self.scheduler.is_periodic_scheduled()
    }

    /// Enqueue one background pass once the network is available.
    pub fn trigger_immediate_sync(&self) {
        self.after_write();
    }

    /// Run one pass now, ignoring the connectivity gate, and wait for it.
    pub fn sync_now(&self) -> FfiPassReport {
        let engine = self.engine.clone();
        self.runtime.block_on(async move { engine.run_pass().await }).into()
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe gender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum FfiGender {
    Male,
    Female,
    Other,
}

impl From<FfiGender> for Gender {
    fn from(g: FfiGender) -> Self {
        match g {
            FfiGender::Male => Gender::Male,
            FfiGender::Female => Gender::Female,
            FfiGender::Other => Gender::Other,
        }
    }
}

impl From<Gender> for FfiGender {
    fn from(g: Gender) -> Self {
        match g {
            Gender::Male => FfiGender::Male,
            Gender::Female => FfiGender::Female,
            Gender::Other => FfiGender::Other,
        }
    }
}

/// FFI-safe general health rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum FfiGeneralHealth {
    Good,
    Poor,
}

impl From<FfiGeneralHealth> for GeneralHealth {
    fn from(h: FfiGeneralHealth) -> Self {
        match h {
            FfiGeneralHealth::Good => GeneralHealth::Good,
            FfiGeneralHealth::Poor => GeneralHealth::Poor,
        }
    }
}

impl From<GeneralHealth> for FfiGeneralHealth {
    fn from(h: GeneralHealth) -> Self {
        match h {
            GeneralHealth::Good => FfiGeneralHealth::Good,
            GeneralHealth::Poor => FfiGeneralHealth::Poor,
        }
    }
}

/// FFI-safe visit form selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum FfiVisitVariant {
    VisitA,
    VisitB,
}

impl From<VisitVariant> for FfiVisitVariant {
    fn from(v: VisitVariant) -> Self {
        match v {
            VisitVariant::VisitA => FfiVisitVariant::VisitA,
            VisitVariant::VisitB => FfiVisitVariant::VisitB,
        }
    }
}

/// FFI-safe BMI label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum FfiBmiCategory {
    Underweight,
    Normal,
    Overweight,
}

impl From<BmiCategory> for FfiBmiCategory {
    fn from(c: BmiCategory) -> Self {
        match c {
            BmiCategory::Underweight => FfiBmiCategory::Underweight,
            BmiCategory::Normal => FfiBmiCategory::Normal,
            BmiCategory::Overweight => FfiBmiCategory::Overweight,
        }
    }
}

/// FFI-safe patient. Dates are epoch milliseconds (UTC).
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatient {
    pub patient_id: String,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth_ms: i64,
    pub registration_date_ms: i64,
    pub gender: FfiGender,
    pub synced: bool,
}

impl From<Patient> for FfiPatient {
    fn from(p: Patient) -> Self {
        Self {
            date_of_birth_ms: p.date_of_birth.timestamp_millis(),
            registration_date_ms: p.registration_date.timestamp_millis(),
            gender: p.gender.into(),
            synced: p.synced,
            patient_id: p.patient_id,
            first_name: p.first_name,
            last_name: p.last_name,
        }
    }
}

/// FFI-safe patient list row.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatientSummary {
    pub patient: FfiPatient,
    pub full_name: String,
    pub age: i32,
    /// Latest BMI, 0.0 when no vitals were recorded
    pub bmi: f64,
    pub has_vitals: bool,
    pub bmi_category: FfiBmiCategory,
    pub next_visit: FfiVisitVariant,
}

impl From<PatientSummary> for FfiPatientSummary {
    fn from(s: PatientSummary) -> Self {
        Self {
            full_name: s.patient.full_name(),
            age: s.patient.age_on(Utc::now()),
            bmi: s.display_bmi(),
            has_vitals: s.last_bmi.is_some(),
            bmi_category: s.bmi_category.into(),
            next_visit: s.next_visit.into(),
            patient: s.patient.into(),
        }
    }
}

/// FFI-safe vitals.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiVitals {
    pub id: Option<i64>,
    pub patient_id: String,
    pub visit_date_ms: i64,
    pub height_cm: f64,
    pub weight_kg: f64,
    pub bmi: f64,
    pub synced: bool,
}

impl From<Vitals> for FfiVitals {
    fn from(v: Vitals) -> Self {
        Self {
            id: v.id,
            visit_date_ms: v.visit_date.timestamp_millis(),
            height_cm: v.height_cm,
            weight_kg: v.weight_kg,
            bmi: v.bmi,
            synced: v.synced,
            patient_id: v.patient_id,
        }
    }
}

/// Stored vitals plus the visit form they route to.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiVitalsOutcome {
    pub vitals: FfiVitals,
    pub next_visit: FfiVisitVariant,
}

/// FFI-safe visit form A.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiVisitA {
    pub id: Option<i64>,
    pub patient_id: String,
    pub visit_date_ms: i64,
    pub general_health: FfiGeneralHealth,
    pub on_diet: bool,
    pub comments: String,
    pub synced: bool,
}

impl From<VisitA> for FfiVisitA {
    fn from(v: VisitA) -> Self {
        Self {
            id: v.id,
            visit_date_ms: v.visit_date.timestamp_millis(),
            general_health: v.general_health.into(),
            on_diet: v.on_diet.as_bool(),
            synced: v.synced,
            patient_id: v.patient_id,
            comments: v.comments,
        }
    }
}

/// FFI-safe visit form B.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiVisitB {
    pub id: Option<i64>,
    pub patient_id: String,
    pub visit_date_ms: i64,
    pub general_health: FfiGeneralHealth,
    pub using_drugs: bool,
    pub comments: String,
    pub synced: bool,
}

impl From<VisitB> for FfiVisitB {
    fn from(v: VisitB) -> Self {
        Self {
            id: v.id,
            visit_date_ms: v.visit_date.timestamp_millis(),
            general_health: v.general_health.into(),
            using_drugs: v.using_drugs.as_bool(),
            synced: v.synced,
            patient_id: v.patient_id,
            comments: v.comments,
        }
    }
}

/// FFI-safe entry in a patient's visit history.
#[derive(Debug, Clone, uniffi::Enum)]
pub enum FfiVisit {
    A { visit: FfiVisitA },
    B { visit: FfiVisitB },
}

impl From<Visit> for FfiVisit {
    fn from(v: Visit) -> Self {
        match v {
            Visit::A(visit) => FfiVisit::A { visit: visit.into() },
            Visit::B(visit) => FfiVisit::B { visit: visit.into() },
        }
    }
}

/// FFI-safe sync pass report.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPassReport {
    /// `false` means the pass should be retried later
    pub success: bool,
    pub synced: u32,
    pub duplicates: u32,
    pub rejected: u32,
    pub aborted: Option<String>,
}

impl From<PassReport> for FfiPassReport {
    fn from(r: PassReport) -> Self {
        Self {
            success: r.is_success(),
            synced: r.synced,
            duplicates: r.duplicates,
            rejected: r.rejected,
            aborted: r.aborted.map(|e| e.to_string()),
        }
    }
}
