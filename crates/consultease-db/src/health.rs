// [crates/consultease-db/src/health.rs]
/*!
 * Health monitor and safe restart sequence (spec §4.1 "Health monitoring
 * and restart").
 *
 * A background task probes the pool on a fixed interval. Five
 * consecutive failed probes, combined with a restart cooldown and a
 * minimum time since the last success, trigger a full pool rebuild: the
 * monitor waits for in-flight sessions to drain, disposes the old
 * driver handle, opens a fresh one against the same connection
 * parameters, and swaps it in behind a [`SharedPool`] so the rest of
 * the process keeps working off a stable handle.
 */

use crate::client::DbClient;
use crate::errors::DbError;
use crate::pool::DbPool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{error, info, instrument, warn};

/// Connection parameters needed to rebuild a [`DbClient`] from scratch.
/// Kept alongside the live pool so a restart does not need anything the
/// caller configured once at startup.
#[derive(Clone)]
pub struct ConnectParams {
    pub url: String,
    pub access_token: Option<String>,
    pub pool_size: u32,
    pub max_overflow: u32,
}

/// Consecutive failed probes before a restart is considered (spec §4.1).
const FAILURE_THRESHOLD: u32 = 5;
/// Minimum time between restarts.
const RESTART_COOLDOWN: Duration = Duration::from_secs(600);
/// Minimum time since the last successful probe before restarting; this
/// is the window during which the system is considered merely degraded
/// rather than in need of a rebuild.
const GRACE_PERIOD: Duration = Duration::from_secs(300);
/// Per-probe statement timeout.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
/// How long to wait for in-flight sessions to drain before disposing
/// the old driver handle.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// A `DbPool` behind a lock, so the health monitor can swap in a
/// rebuilt pool without invalidating handles other parts of the process
/// are holding onto; `current()` returns a cheap clone of the pool as
/// it stands right now.
#[derive(Clone)]
pub struct SharedPool {
    inner: Arc<RwLock<DbPool>>,
}

impl SharedPool {
    pub fn new(pool: DbPool) -> Self {
        Self { inner: Arc::new(RwLock::new(pool)) }
    }

    pub async fn current(&self) -> DbPool {
        self.inner.read().await.clone()
    }

    async fn replace(&self, pool: DbPool) {
        *self.inner.write().await = pool;
    }
}

pub struct HealthMonitor {
    shared: SharedPool,
    params: ConnectParams,
    probe_interval: Duration,
    consecutive_failures: u32,
    last_success: Instant,
    last_restart: Option<Instant>,
}

impl HealthMonitor {
    pub fn new(shared: SharedPool, params: ConnectParams, probe_interval: Duration) -> Self {
        Self {
            shared,
            params,
            probe_interval,
            consecutive_failures: 0,
            last_success: Instant::now(),
            last_restart: None,
        }
    }

    /// Runs the probe loop forever. Intended to be spawned as its own
    /// task by the system coordinator.
    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.probe_interval);
        loop {
            ticker.tick().await;
            self.probe_once().await;
        }
    }

    #[instrument(skip(self))]
    async fn probe_once(&mut self) {
        let pool = self.shared.current().await;
        let outcome = tokio::time::timeout(PROBE_TIMEOUT, pool.ping()).await;

        match outcome {
            Ok(Ok(())) => {
                self.consecutive_failures = 0;
                self.last_success = Instant::now();
            }
            Ok(Err(err)) => {
                warn!("health probe failed: {err}");
                self.consecutive_failures += 1;
            }
            Err(_) => {
                warn!("health probe timed out after {:?}", PROBE_TIMEOUT);
                self.consecutive_failures += 1;
            }
        }

        if self.should_restart() {
            match self.restart().await {
                Ok(()) => {
                    info!("pool restart completed successfully");
                    self.consecutive_failures = 0;
                    self.last_success = Instant::now();
                    self.last_restart = Some(Instant::now());
                }
                Err(err) => {
                    error!("pool restart failed: {err}");
                }
            }
        }
    }

    fn should_restart(&self) -> bool {
        if self.consecutive_failures < FAILURE_THRESHOLD {
            return false;
        }
        if self.last_success.elapsed() < GRACE_PERIOD {
            return false;
        }
        if let Some(last_restart) = self.last_restart {
            if last_restart.elapsed() < RESTART_COOLDOWN {
                return false;
            }
        }
        true
    }

    #[instrument(skip(self))]
    async fn restart(&self) -> Result<(), DbError> {
        warn!("restarting database pool after {} consecutive failures", self.consecutive_failures);

        let old_pool = self.shared.current().await;
        if !old_pool.wait_for_drain(DRAIN_TIMEOUT).await {
            warn!("proceeding with restart despite undrained sessions after {:?}", DRAIN_TIMEOUT);
        }

        let client = DbClient::connect(&self.params.url, self.params.access_token.clone()).await?;
        let new_pool = DbPool::new(client, self.params.pool_size, self.params.max_overflow);
        self.shared.replace(new_pool).await;
        Ok(())
    }
}
