// [crates/consultease-presence/src/errors.rs]
use consultease_db::DbError;
use consultease_domain::ConsultEaseError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PresenceError {
    #[error(transparent)]
    Db(#[from] DbError),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("faculty update retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },
}

impl PresenceError {
    pub fn is_retryable(&self) -> bool {
        match self {
            PresenceError::Db(e) => e.is_transient() || matches!(e, DbError::Conflict { .. }),
            _ => false,
        }
    }

    /// Conflicts carry their own, shorter retry budget (spec §7: "Retried
    /// up to 3 times"), separate from the general transient-error budget
    /// (spec §4.5: up to 5 attempts).
    pub fn is_conflict(&self) -> bool {
        matches!(self, PresenceError::Db(DbError::Conflict { .. }))
    }
}

impl From<PresenceError> for ConsultEaseError {
    fn from(err: PresenceError) -> Self {
        match err {
            PresenceError::Db(e) => e.into(),
            PresenceError::Validation(msg) => ConsultEaseError::Validation(msg),
            PresenceError::RetriesExhausted { attempts, last } => {
                ConsultEaseError::Transient(format!("gave up after {attempts} attempts: {last}"))
            }
        }
    }
}
