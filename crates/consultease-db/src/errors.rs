// [crates/consultease-db/src/errors.rs]
use consultease_domain::ConsultEaseError;
use thiserror::Error;

/// Persistence-layer error catalog (spec §4.1 "Failure semantics").
/// `TransientDBError` maps to `ConsultEaseError::Transient`; logical
/// errors (constraint violations, not-found) are surfaced to the caller
/// unchanged via the other variants.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("connection failure: {0}")]
    Connection(String),

    #[error("transient database error: {0}")]
    Transient(String),

    #[error("query rejected: {0}")]
    Query(#[from] libsql::Error),

    #[error("constraint violation: {0}")]
    Constraint(String),

    #[error("row not found: {0}")]
    NotFound(String),

    #[error("optimistic concurrency conflict on {entity} id={id}")]
    Conflict { entity: &'static str, id: i64 },

    #[error("pool exhausted: timed out waiting for a connection")]
    PoolTimeout,

    #[error("transaction rolled back due to: {0}")]
    TransactionAborted(String),
}

impl DbError {
    pub fn is_transient(&self) -> bool {
        matches!(self, DbError::Transient(_) | DbError::PoolTimeout)
    }
}

impl From<DbError> for ConsultEaseError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Transient(msg) => ConsultEaseError::Transient(msg),
            DbError::PoolTimeout => ConsultEaseError::Transient("connection pool exhausted".into()),
            DbError::Connection(msg) => ConsultEaseError::Transient(msg),
            DbError::NotFound(msg) => ConsultEaseError::NotFound(msg),
            DbError::Conflict { entity, id } => {
                ConsultEaseError::Conflict(format!("{entity} id={id} changed underneath this update"))
            }
            DbError::Constraint(msg) => ConsultEaseError::Validation(msg),
            DbError::Query(e) => ConsultEaseError::Transient(e.to_string()),
            DbError::TransactionAborted(msg) => ConsultEaseError::Transient(msg),
        }
    }
}
