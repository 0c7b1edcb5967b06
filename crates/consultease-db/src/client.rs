// [crates/consultease-db/src/client.rs]
/*!
 * Thin wrapper over the libSQL driver that knows how to open an embedded
 * file database, an in-memory database (test mode), or a networked
 * remote database, and applies the schema + pragmas exactly once at
 * connect time (spec §4.1 "Connection pool").
 */

use crate::errors::DbError;
use crate::schema::apply_schema;
use libsql::{Builder, Connection, Database};
use std::sync::Arc;
use tracing::{info, instrument};

/// Pragmas applied to embedded (single-file) backends: WAL journaling,
/// NORMAL synchronous durability, a ~64 MiB page cache, an in-memory
/// temp store, and a generous busy timeout so concurrent writers block
/// rather than fail outright (spec §4.1).
const EMBEDDED_PRAGMAS: &[&str] = &[
    "PRAGMA journal_mode = WAL;",
    "PRAGMA synchronous = NORMAL;",
    "PRAGMA cache_size = -65536;",
    "PRAGMA temp_store = MEMORY;",
    "PRAGMA busy_timeout = 60000;",
];

#[derive(Clone)]
pub struct DbClient {
    driver: Arc<Database>,
    /// For `:memory:` URLs, libSQL purges the database once its last
    /// connection drops. Holding one connection open for the lifetime of
    /// the client keeps the schema alive across pooled connections.
    _memory_anchor: Option<Arc<Connection>>,
    is_embedded: bool,
}

impl DbClient {
    #[instrument(skip(access_token))]
    pub async fn connect(url: &str, access_token: Option<String>) -> Result<Self, DbError> {
        if url.is_empty() {
            return Err(DbError::Connection("database url must not be empty".into()));
        }

        let is_remote = url.starts_with("libsql://") || url.starts_with("https://");
        let is_memory = url.contains(":memory:") || url.contains("mode=memory");

        let driver = if is_remote {
            let token = access_token
                .ok_or_else(|| DbError::Connection("remote database url requires an access token".into()))?;
            Builder::new_remote(url.to_string(), token)
                .build()
                .await
                .map_err(|e| DbError::Connection(e.to_string()))?
        } else {
            Builder::new_local(url)
                .build()
                .await
                .map_err(|e| DbError::Connection(e.to_string()))?
        };

        let driver = Arc::new(driver);
        let mut anchor = None;

        if is_memory {
            let anchor_conn = driver.connect().map_err(|e| DbError::Connection(e.to_string()))?;
            apply_embedded_pragmas(&anchor_conn).await?;
            apply_schema(&anchor_conn).await.map_err(|e| DbError::Connection(e.to_string()))?;
            anchor = Some(Arc::new(anchor_conn));
        } else if !is_remote {
            let bootstrap = driver.connect().map_err(|e| DbError::Connection(e.to_string()))?;
            apply_embedded_pragmas(&bootstrap).await?;
            apply_schema(&bootstrap).await.map_err(|e| DbError::Connection(e.to_string()))?;
        } else {
            let bootstrap = driver.connect().map_err(|e| DbError::Connection(e.to_string()))?;
            apply_schema(&bootstrap).await.map_err(|e| DbError::Connection(e.to_string()))?;
        }

        info!("connected to database backend (remote={is_remote}, memory={is_memory})");

        Ok(Self {
            driver,
            _memory_anchor: anchor,
            is_embedded: !is_remote,
        })
    }

    pub fn connect_new(&self) -> Result<Connection, DbError> {
        let conn = self.driver.connect().map_err(|e| DbError::Connection(e.to_string()))?;
        Ok(conn)
    }

    pub fn is_embedded(&self) -> bool {
        self.is_embedded
    }
}

async fn apply_embedded_pragmas(connection: &Connection) -> Result<(), DbError> {
    for pragma in EMBEDDED_PRAGMAS {
        connection
            .execute(pragma, ())
            .await
            .map_err(|e| DbError::Connection(format!("pragma '{pragma}' failed: {e}")))?;
    }
    Ok(())
}
