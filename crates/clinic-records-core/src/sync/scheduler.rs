//! Background triggers for sync passes.
//!
//! Two kinds of job run on the tokio runtime:
//! - one unique periodic job, kept (not replaced) when scheduled again
//! - one-shot passes fired after local writes, at most one waiting at a time
//!
//! Both wait for network connectivity before every pass.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::engine::{PassOutcome, SyncEngine};

/// Identity of the recurring sync job.
pub const PERIODIC_SYNC_JOB: &str = "PatientSyncWorker";

/// Connectivity state reported by the host platform.
#[derive(Clone)]
pub struct NetworkMonitor {
    tx: Arc<watch::Sender<bool>>,
}

impl NetworkMonitor {
    pub fn new(connected: bool) -> Self {
        let (tx, _rx) = watch::channel(connected);
        Self { tx: Arc::new(tx) }
    }

    pub fn set_connected(&self, connected: bool) {
        let previous = self.tx.send_replace(connected);
        if previous != connected {
            info!(connected, "Network connectivity changed");
        }
    }

    pub fn is_connected(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve once connectivity is present.
    pub async fn connected(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|connected| *connected).await;
    }
}

/// Exponential backoff: `base * 2^attempt`, capped at `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub max: Duration,
}

impl BackoffPolicy {
    /// Delay before retry number `attempt` (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base.saturating_mul(factor).min(self.max)
    }
}

/// Timing for scheduled passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleSettings {
    pub periodic_interval: Duration,
    pub backoff: BackoffPolicy,
    /// Passes a one-shot job attempts before giving up
    pub one_shot_max_attempts: u32,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            periodic_interval: Duration::from_secs(15 * 60),
            backoff: BackoffPolicy {
                base: Duration::from_secs(5 * 60),
                max: Duration::from_secs(5 * 60 * 60),
            },
            one_shot_max_attempts: 5,
        }
    }
}

/// Owns job identity, timing and the connectivity gate. Holds no domain logic.
pub struct SyncScheduler {
    engine: Arc<SyncEngine>,
    network: NetworkMonitor,
    settings: ScheduleSettings,
    runtime: Handle,
    jobs: Mutex<HashMap<String, JoinHandle<()>>>,
    /// Set while a one-shot job waits to start its first pass
    one_shot_pending: Arc<AtomicBool>,
}

impl SyncScheduler {
    pub fn new(
        engine: Arc<SyncEngine>,
        network: NetworkMonitor,
        settings: ScheduleSettings,
        runtime: Handle,
    ) -> Self {
        Self {
            engine,
            network,
            settings,
            runtime,
            jobs: Mutex::new(HashMap::new()),
            one_shot_pending: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn network(&self) -> &NetworkMonitor {
        &self.network
    }

    /// Register the recurring sync job unless it already exists.
    ///
    /// Returns `true` when a new job was started.
    pub fn schedule_periodic_sync(&self) -> bool {
        let mut jobs = self.lock_jobs();
        if let Some(existing) = jobs.get(PERIODIC_SYNC_JOB) {
            if !existing.is_finished() {
                debug!(job = PERIODIC_SYNC_JOB, "Periodic sync already scheduled, keeping it");
                return false;
            }
        }

        let handle = self.runtime.spawn(run_periodic(
            self.engine.clone(),
            self.network.clone(),
            self.settings,
        ));
        jobs.insert(PERIODIC_SYNC_JOB.to_string(), handle);
        info!(
            job = PERIODIC_SYNC_JOB,
            interval_secs = self.settings.periodic_interval.as_secs(),
            "Periodic sync scheduled"
        );
        true
    }

    /// Stop the recurring job. Returns `true` if one was running.
    pub fn cancel_periodic_sync(&self) -> bool {
        match self.lock_jobs().remove(PERIODIC_SYNC_JOB) {
            Some(handle) => {
                handle.abort();
                info!(job = PERIODIC_SYNC_JOB, "Periodic sync cancelled");
                true
            }
            None => false,
        }
    }

    pub fn is_periodic_scheduled(&self) -> bool {
        self.lock_jobs()
            .get(PERIODIC_SYNC_JOB)
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Identities of live recurring jobs.
    pub fn scheduled_jobs(&self) -> Vec<String> {
        self.lock_jobs()
            .iter()
            .filter(|(_, handle)| !handle.is_finished())
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Enqueue one non-recurring pass, independent of the periodic timer.
    ///
    /// Returns `None` when a one-shot job is already waiting to start; that
    /// job's pass will pick up the new records.
    pub fn trigger_immediate_sync(&self) -> Option<JoinHandle<PassOutcome>> {
        if self.one_shot_pending.swap(true, Ordering::AcqRel) {
            debug!("One-time sync already pending");
            return None;
        }

        debug!("One-time sync triggered");
        Some(self.runtime.spawn(run_one_shot(
            self.engine.clone(),
            self.network.clone(),
            self.settings,
            self.one_shot_pending.clone(),
        )))
    }

    pub fn has_pending_one_shot(&self) -> bool {
        self.one_shot_pending.load(Ordering::Acquire)
    }

    fn lock_jobs(&self) -> MutexGuard<'_, HashMap<String, JoinHandle<()>>> {
        // A panic while holding the lock leaves the map itself intact.
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for SyncScheduler {
    fn drop(&mut self) {
        for (_, handle) in self.lock_jobs().drain() {
            handle.abort();
        }
    }
}

async fn run_periodic(engine: Arc<SyncEngine>, network: NetworkMonitor, settings: ScheduleSettings) {
    let mut failures: u32 = 0;
    loop {
        network.connected().await;
        let report = engine.run_pass().await;

        let delay = match report.outcome {
            PassOutcome::Success => {
                failures = 0;
                settings.periodic_interval
            }
            PassOutcome::Retry => {
                let delay = settings.backoff.delay(failures);
                failures = failures.saturating_add(1);
                warn!(
                    attempt = failures,
                    delay_secs = delay.as_secs(),
                    "Periodic sync backing off"
                );
                delay
            }
        };
        tokio::time::sleep(delay).await;
    }
}

async fn run_one_shot(
    engine: Arc<SyncEngine>,
    network: NetworkMonitor,
    settings: ScheduleSettings,
    pending: Arc<AtomicBool>,
) -> PassOutcome {
    let max_attempts = settings.one_shot_max_attempts.max(1);
    let mut attempt: u32 = 0;
    loop {
        network.connected().await;
        // Writes from here on may land after this pass has scanned their kind.
        pending.store(false, Ordering::Release);
        let report = engine.run_pass().await;
        if report.is_success() {
            return PassOutcome::Success;
        }

        attempt += 1;
        if attempt >= max_attempts {
            warn!(attempts = attempt, "One-time sync giving up until next trigger");
            return PassOutcome::Retry;
        }
        let delay = settings.backoff.delay(attempt - 1);
        debug!(attempt, delay_secs = delay.as_secs(), "One-time sync retrying");
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::{Gender, Patient};
    use crate::sync::mock::ScriptedRegistry;
    use crate::sync::RemoteError;
    use chrono::Utc;

    fn engine_with(registry: Arc<ScriptedRegistry>) -> (Arc<Mutex<Database>>, Arc<SyncEngine>) {
        let db = Arc::new(Mutex::new(Database::open_in_memory().unwrap()));
        let patient = Patient::new(
            "P1".into(),
            "Hope".into(),
            "Shapash".into(),
            Utc::now(),
            Gender::Female,
        );
        db.lock().unwrap().upsert_patient(&patient).unwrap();
        (db.clone(), Arc::new(SyncEngine::new(db, registry)))
    }

    fn scheduler(engine: Arc<SyncEngine>, network: NetworkMonitor) -> SyncScheduler {
        SyncScheduler::new(engine, network, ScheduleSettings::default(), Handle::current())
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = BackoffPolicy {
            base: Duration::from_secs(300),
            max: Duration::from_secs(3600),
        };
        assert_eq!(policy.delay(0), Duration::from_secs(300));
        assert_eq!(policy.delay(1), Duration::from_secs(600));
        assert_eq!(policy.delay(2), Duration::from_secs(1200));
        assert_eq!(policy.delay(4), Duration::from_secs(3600));
        assert_eq!(policy.delay(40), Duration::from_secs(3600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_periodic_is_idempotent() {
        let registry = Arc::new(ScriptedRegistry::new());
        let (_db, engine) = engine_with(registry);
        let scheduler = scheduler(engine, NetworkMonitor::new(false));

        assert!(scheduler.schedule_periodic_sync());
        for _ in 0..4 {
            assert!(!scheduler.schedule_periodic_sync());
        }
        assert_eq!(scheduler.scheduled_jobs(), vec![PERIODIC_SYNC_JOB.to_string()]);

        assert!(scheduler.cancel_periodic_sync());
        tokio::task::yield_now().await;
        assert!(!scheduler.is_periodic_scheduled());
        assert!(!scheduler.cancel_periodic_sync());
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_sync_waits_for_network() {
        let registry = Arc::new(ScriptedRegistry::new());
        let (db, engine) = engine_with(registry.clone());
        let network = NetworkMonitor::new(false);
        let scheduler = scheduler(engine, network.clone());

        let job = scheduler.trigger_immediate_sync().unwrap();
        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert!(registry.calls().is_empty());

        network.set_connected(true);
        assert_eq!(job.await.unwrap(), PassOutcome::Success);
        assert_eq!(registry.calls(), vec!["patients/P1"]);
        assert!(db.lock().unwrap().list_unsynced_patients().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_shot_retries_after_backoff() {
        let registry = Arc::new(
            ScriptedRegistry::new().then(Err(RemoteError::Transport("offline".into()))),
        );
        let (_db, engine) = engine_with(registry.clone());
        let scheduler = scheduler(engine, NetworkMonitor::new(true));

        let start = tokio::time::Instant::now();
        let outcome = scheduler.trigger_immediate_sync().unwrap().await.unwrap();
        assert_eq!(outcome, PassOutcome::Success);
        assert!(start.elapsed() >= Duration::from_secs(300));
        assert_eq!(registry.calls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_offline_triggers_share_one_job() {
        let registry = Arc::new(ScriptedRegistry::new());
        let (_db, engine) = engine_with(registry.clone());
        let network = NetworkMonitor::new(false);
        let scheduler = scheduler(engine, network.clone());

        let job = scheduler.trigger_immediate_sync().unwrap();
        assert!(scheduler.trigger_immediate_sync().is_none());
        assert!(scheduler.trigger_immediate_sync().is_none());
        assert!(scheduler.has_pending_one_shot());

        network.set_connected(true);
        assert_eq!(job.await.unwrap(), PassOutcome::Success);
        assert!(!scheduler.has_pending_one_shot());
        assert_eq!(registry.calls(), vec!["patients/P1"]);

        // A write after the pass started gets its own job
        let next = scheduler.trigger_immediate_sync().unwrap();
        assert_eq!(next.await.unwrap(), PassOutcome::Success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_backs_off_then_resets_to_interval() {
        use tokio::time::{sleep, sleep_until, Instant};

        let registry = Arc::new(
            ScriptedRegistry::new()
                .then(Err(RemoteError::Transport("offline".into())))
                .then(Err(RemoteError::Transport("offline".into()))),
        );
        let (db, engine) = engine_with(registry.clone());
        let network = NetworkMonitor::new(false);
        let scheduler = scheduler(engine, network.clone());
        assert!(scheduler.schedule_periodic_sync());

        // Nothing runs while offline
        sleep(Duration::from_secs(3600)).await;
        assert!(registry.calls().is_empty());

        network.set_connected(true);
        let start = Instant::now();
        let at = |secs| start + Duration::from_secs(secs);

        sleep_until(at(1)).await;
        assert_eq!(registry.calls().len(), 1);

        // First retry after the 300s base delay
        sleep_until(at(299)).await;
        assert_eq!(registry.calls().len(), 1);
        sleep_until(at(301)).await;
        assert_eq!(registry.calls().len(), 2);

        // Second retry 600s later; this one succeeds
        sleep_until(at(899)).await;
        assert_eq!(registry.calls().len(), 2);
        sleep_until(at(901)).await;
        assert_eq!(registry.calls().len(), 3);
        assert!(db.lock().unwrap().list_unsynced_patients().unwrap().is_empty());

        // After success the next pass waits a full interval
        let patient = Patient::new(
            "P2".into(),
            "Justine".into(),
            "Nabs".into(),
            Utc::now(),
            Gender::Male,
        );
        db.lock().unwrap().upsert_patient(&patient).unwrap();

        sleep_until(at(1799)).await;
        assert_eq!(registry.calls().len(), 3);
        sleep_until(at(1801)).await;
        assert_eq!(
            registry.calls(),
            vec!["patients/P1", "patients/P1", "patients/P1", "patients/P2"]
        );
    }
}
