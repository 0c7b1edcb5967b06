// [crates/consultease-db/src/pool.rs]
/*!
 * Scoped-session primitive (spec §4.1 "Contract"): `with_session`
 * guarantees acquisition of a live connection, execution of the caller
 * under a single transaction, commit on normal return, rollback on any
 * failure, and release on every exit path.
 *
 * For networked backends this behaves like a conventional bounded pool.
 * For the embedded (single-file) backend the pool degenerates to a
 * single shared driver handle guarded by the same semaphore, which is
 * sufficient because libSQL serializes writers at the file level and
 * the WAL pragma (applied at connect time) lets readers proceed
 * concurrently (spec §4.1 "Connection pool").
 */

use crate::client::DbClient;
use crate::errors::DbError;
use libsql::Transaction;
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{instrument, warn};

/// Default pool timeout (spec §5 "Cancellation and timeouts").
const POOL_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, Default)]
pub struct PoolStats {
    pub active_connections: u32,
    pub capacity: u32,
}

#[derive(Clone)]
pub struct DbPool {
    client: DbClient,
    semaphore: Arc<Semaphore>,
    capacity: u32,
    active: Arc<AtomicU32>,
}

impl DbPool {
    /// `pool_size` and `max_overflow` follow spec §4.1 defaults (5 and
    /// 10) for networked backends; the embedded backend still honors
    /// them as the concurrency bound on the shared driver handle.
    pub fn new(client: DbClient, pool_size: u32, max_overflow: u32) -> Self {
        let capacity = pool_size + max_overflow;
        Self {
            client,
            semaphore: Arc::new(Semaphore::new(capacity as usize)),
            capacity,
            active: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            active_connections: self.active.load(Ordering::Relaxed),
            capacity: self.capacity,
        }
    }

    pub fn client(&self) -> &DbClient {
        &self.client
    }

    /// Waits up to `timeout` for `active_connections` to drain to zero.
    /// Used by the health monitor's restart sequence (spec §4.1).
    pub async fn wait_for_drain(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.active.load(Ordering::Relaxed) == 0 {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    /// A lightweight liveness probe: `SELECT 1` under the pool's own
    /// accounting, used by the health monitor (spec §4.1).
    #[instrument(skip(self))]
    pub async fn ping(&self) -> Result<(), DbError> {
        self.with_session(|tx| async move {
            tx.query("SELECT 1", ())
                .await
                .map_err(DbError::Query)?
                .next()
                .await
                .map_err(DbError::Query)?;
            Ok(())
        })
        .await
    }

    /// Runs `f` inside a single transaction on a freshly acquired
    /// connection. Commits on `Ok`, rolls back on `Err`. The pool permit
    /// is released on every exit path because it is dropped when this
    /// function returns, regardless of which branch runs.
    #[instrument(skip(self, f))]
    pub async fn with_session<T, F, Fut>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&Transaction) -> Fut,
        Fut: Future<Output = Result<T, DbError>>,
    {
        let _permit = tokio::time::timeout(POOL_ACQUIRE_TIMEOUT, self.semaphore.acquire())
            .await
            .map_err(|_| DbError::PoolTimeout)?
            .map_err(|_| DbError::PoolTimeout)?;

        self.active.fetch_add(1, Ordering::Relaxed);
        let result = self.run_transaction(f).await;
        self.active.fetch_sub(1, Ordering::Relaxed);
        result
    }

    async fn run_transaction<T, F, Fut>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&Transaction) -> Fut,
        Fut: Future<Output = Result<T, DbError>>,
    {
        let conn = self.client.connect_new()?;
        let tx = conn
            .transaction()
            .await
            .map_err(|e| DbError::Transient(format!("failed to open transaction: {e}")))?;

        match f(&tx).await {
            Ok(value) => {
                tx.commit()
                    .await
                    .map_err(|e| DbError::TransactionAborted(format!("commit failed: {e}")))?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!("rollback itself failed: {rollback_err}");
                }
                warn!("session rolled back: {err}");
                Err(err)
            }
        }
    }
}
