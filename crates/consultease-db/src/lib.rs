// [crates/consultease-db/src/lib.rs]
//! Persistence layer: scoped sessions over libSQL, a connection pool
//! with health monitoring and safe restart, and repositories for every
//! entity the coordination core persists.

mod client;
mod errors;
mod health;
mod pool;
mod repositories;
mod schema;

pub use client::DbClient;
pub use errors::DbError;
pub use health::{ConnectParams, HealthMonitor, SharedPool};
pub use pool::{DbPool, PoolStats};
pub use repositories::{admin, consultation, faculty, student};
