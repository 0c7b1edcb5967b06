// [crates/consultease-presence/src/engine.rs]
/*!
 * Faculty Presence Engine (spec §4.5). Applies incoming presence
 * updates one faculty at a time, deferring to a [`PendingStatusUpdate`]
 * buffer when persistence is unhealthy, and fans out a snapshot to
 * registered callbacks after every successful commit.
 */

use crate::errors::PresenceError;
use crate::lock_map::FacultyLockMap;
use consultease_cache::CacheCoordinator;
use consultease_db::{faculty as faculty_repo, DbPool};
use consultease_domain::{FacultySnapshot, NormalizedMac, NtpSyncStatus, PendingStatusUpdate};
use parking_lot::{Mutex, RwLock as SyncRwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Maximum retry attempts for a transient failure (spec §4.5 step 5).
const MAX_TRANSIENT_RETRIES: u32 = 5;
/// Maximum retry attempts for an optimistic-concurrency conflict (spec
/// §7: "Conflict ... Retried up to 3 times").
const MAX_CONFLICT_RETRIES: u32 = 3;
/// Initial backoff before the first retry.
const INITIAL_BACKOFF: Duration = Duration::from_millis(100);
/// Backoff ceiling.
const MAX_BACKOFF: Duration = Duration::from_secs(10);
/// Delay before the single persistence-health retry on first attempt
/// (spec §4.5 step 2).
const HEALTH_RETRY_DELAY: Duration = Duration::from_millis(2000);

/// Shared flag the System Coordinator flips when the Persistence Layer
/// reports unhealthy (spec §4.7 "Degradation"). Cloning shares the same
/// underlying flag; the Presence Engine only ever reads it.
#[derive(Clone, Default)]
pub struct PersistenceHealth(Arc<AtomicBool>);

impl PersistenceHealth {
    pub fn new_healthy() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_healthy(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.0.store(healthy, Ordering::Release);
    }
}

/// The outcome of [`PresenceEngine::handle_status_update`] (spec §9:
/// replaces exception-driven "deferred" control flow with a tagged
/// result).
#[derive(Debug, Clone)]
pub enum PresenceOutcome {
    Applied(FacultySnapshot),
    Deferred { faculty_id: i64, reason: String },
}

pub type FacultyChangeCallback = Arc<dyn Fn(FacultySnapshot) + Send + Sync>;

/// Source tag recorded on a [`PendingStatusUpdate`] and surfaced in
/// logs; distinguishes desk-unit JSON updates from MAC reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateSource {
    Status,
    MacStatus,
}

impl UpdateSource {
    fn as_str(self) -> &'static str {
        match self {
            UpdateSource::Status => "status",
            UpdateSource::MacStatus => "mac_status",
        }
    }
}

pub struct PresenceEngine {
    pool: DbPool,
    cache: Arc<CacheCoordinator>,
    locks: FacultyLockMap,
    health: PersistenceHealth,
    pending: Mutex<Vec<PendingStatusUpdate>>,
    callbacks: SyncRwLock<Vec<FacultyChangeCallback>>,
}

impl PresenceEngine {
    pub fn new(pool: DbPool, cache: Arc<CacheCoordinator>, health: PersistenceHealth) -> Self {
        Self {
            pool,
            cache,
            locks: FacultyLockMap::new(),
            health,
            pending: Mutex::new(Vec::new()),
            callbacks: SyncRwLock::new(Vec::new()),
        }
    }

    pub fn health_handle(&self) -> PersistenceHealth {
        self.health.clone()
    }

    /// Subscribes to post-commit change events (spec §4.5
    /// `registerCallback`).
    pub fn register_callback(&self, callback: FacultyChangeCallback) {
        self.callbacks.write().push(callback);
    }

    /// Applies an incoming presence update from a desk unit's status
    /// topic (spec §4.5 `handleStatusUpdate`).
    #[instrument(skip(self))]
    pub async fn handle_status_update(
        &self,
        faculty_id: i64,
        present: bool,
        source: &str,
    ) -> Result<PresenceOutcome, PresenceError> {
        self.apply(faculty_id, present, None, None, source, UpdateSource::Status).await
    }

    /// Applies a MAC-status update, reconciling the stored beacon id
    /// first if it differs from what the desk unit reports (spec §4.5
    /// `handleMacStatus`).
    #[instrument(skip(self))]
    pub async fn handle_mac_status(
        &self,
        faculty_id: i64,
        mac: &str,
        present: bool,
    ) -> Result<PresenceOutcome, PresenceError> {
        let normalized = NormalizedMac::parse(mac).map_err(|e| PresenceError::Validation(e.to_string()))?;

        let lock = self.locks.get_or_create(faculty_id);
        let _guard = lock.lock().await;

        self.pool
            .with_session(|tx| {
                let normalized = normalized.clone();
                async move {
                    let current = faculty_repo::fetch_for_update_tx(tx, faculty_id).await?;
                    if current.beacon_mac.as_ref() != Some(&normalized) {
                        faculty_repo::reconcile_beacon_mac_tx(tx, faculty_id, &normalized).await?;
                    }
                    Ok(())
                }
            })
            .await?;

        self.apply_locked(faculty_id, present, None, None, "mqtt", UpdateSource::MacStatus).await
    }

    /// Records a desk unit's grace-period and NTP status alongside a
    /// presence value (heartbeat-adjacent updates; spec §4.5 "Grace
    /// period").
    #[instrument(skip(self))]
    pub async fn handle_grace_and_ntp(
        &self,
        faculty_id: i64,
        present: bool,
        in_grace_period: bool,
        ntp_sync_status: NtpSyncStatus,
        source: &str,
    ) -> Result<PresenceOutcome, PresenceError> {
        self.apply(faculty_id, present, Some(ntp_sync_status), Some(in_grace_period), source, UpdateSource::Status)
            .await
    }

    async fn apply(
        &self,
        faculty_id: i64,
        present: bool,
        ntp_sync_status: Option<NtpSyncStatus>,
        in_grace_period: Option<bool>,
        source: &str,
        update_source: UpdateSource,
    ) -> Result<PresenceOutcome, PresenceError> {
        let lock = self.locks.get_or_create(faculty_id);
        let _guard = lock.lock().await;
        self.apply_locked(faculty_id, present, ntp_sync_status, in_grace_period, source, update_source)
            .await
    }

    /// Core algorithm. Callers must already hold the per-faculty lock
    /// for the duration of this call (spec §4.5 steps 2-5); the two
    /// public entry points above acquire it before calling in.
    async fn apply_locked(
        &self,
        faculty_id: i64,
        present: bool,
        ntp_sync_status: Option<NtpSyncStatus>,
        in_grace_period: Option<bool>,
        source: &str,
        update_source: UpdateSource,
    ) -> Result<PresenceOutcome, PresenceError> {
        if !self.health.is_healthy() {
            tokio::time::sleep(HEALTH_RETRY_DELAY).await;
            if !self.health.is_healthy() {
                let pending = PendingStatusUpdate {
                    faculty_id,
                    desired_present: present,
                    received_at: chrono::Utc::now(),
                    source: format!("{}:{}", update_source.as_str(), source),
                };
                self.pending.lock().push(pending);
                warn!("persistence unhealthy, deferring faculty id={faculty_id} status update");
                return Ok(PresenceOutcome::Deferred {
                    faculty_id,
                    reason: "persistence unhealthy".to_string(),
                });
            }
        }

        let mut attempt = 0u32;
        let mut backoff = INITIAL_BACKOFF;

        loop {
            attempt += 1;
            match self.commit_once(faculty_id, present, ntp_sync_status, in_grace_period).await {
                Ok(snapshot) => {
                    self.cache.invalidate_faculty(faculty_id);
                    self.broadcast(&snapshot);
                    return Ok(PresenceOutcome::Applied(snapshot));
                }
                Err(err) if err.is_retryable() => {
                    let budget = if err.is_conflict() { MAX_CONFLICT_RETRIES } else { MAX_TRANSIENT_RETRIES };
                    if attempt < budget {
                        warn!("presence update for faculty id={faculty_id} failed on attempt {attempt}: {err}, retrying in {backoff:?}");
                        tokio::time::sleep(backoff).await;
                        backoff = (backoff * 2).min(MAX_BACKOFF);
                    } else {
                        return Err(PresenceError::RetriesExhausted { attempts: attempt, last: err.to_string() });
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn commit_once(
        &self,
        faculty_id: i64,
        present: bool,
        ntp_sync_status: Option<NtpSyncStatus>,
        in_grace_period: Option<bool>,
    ) -> Result<FacultySnapshot, PresenceError> {
        let now = chrono::Utc::now();
        let snapshot = self
            .pool
            .with_session(move |tx| async move {
                let current = faculty_repo::fetch_for_update_tx(tx, faculty_id).await?;

                // `alwaysAvailable` overrides a desk-reported absence at
                // write time (spec §9 Open Question, resolved in favor
                // of the override).
                let effective_present = if current.always_available { true } else { present };

                let updated = faculty_repo::apply_presence_update_tx(
                    tx,
                    faculty_id,
                    current.version,
                    effective_present,
                    now,
                    ntp_sync_status,
                    in_grace_period,
                )
                .await?;

                Ok(updated.to_snapshot())
            })
            .await?;

        Ok(snapshot)
    }

    fn broadcast(&self, snapshot: &FacultySnapshot) {
        let callbacks = self.callbacks.read();
        for callback in callbacks.iter() {
            callback(snapshot.clone());
        }
        info!(
            faculty_id = snapshot.id,
            present = snapshot.present,
            version = snapshot.version,
            "faculty presence committed"
        );
    }

    /// Replays deferred updates once persistence has returned healthy
    /// (spec §4.7 "replays the pending-update buffer in receipt-order,
    /// discarding entries older than 5 minutes"). Intended to be driven
    /// by the System Coordinator.
    #[instrument(skip(self))]
    pub async fn replay_pending(&self) -> usize {
        let due: Vec<PendingStatusUpdate> = {
            let mut pending = self.pending.lock();
            let now = chrono::Utc::now();
            let (stale, fresh): (Vec<_>, Vec<_>) = pending.drain(..).partition(|p| p.is_stale(now));
            if !stale.is_empty() {
                warn!("discarding {} pending update(s) past the staleness window", stale.len());
            }
            *pending = Vec::new();
            fresh
        };

        let mut replayed = 0;
        for update in due {
            match self
                .apply(update.faculty_id, update.desired_present, None, None, &update.source, UpdateSource::Status)
                .await
            {
                Ok(PresenceOutcome::Applied(_)) => replayed += 1,
                Ok(PresenceOutcome::Deferred { .. }) => {
                    // Still unhealthy; push back onto the buffer for the
                    // next recovery attempt.
                    self.pending.lock().push(update);
                }
                Err(err) => warn!("failed to replay pending update for faculty id={}: {err}", update.faculty_id),
            }
        }
        replayed
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}
