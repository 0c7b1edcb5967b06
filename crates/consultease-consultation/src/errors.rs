// [crates/consultease-consultation/src/errors.rs]
use consultease_db::DbError;
use consultease_domain::ConsultEaseError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsultationError {
    #[error(transparent)]
    Db(#[from] DbError),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invalid state transition: {0}")]
    InvalidTransition(String),

    #[error("consultation retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },
}

impl ConsultationError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, ConsultationError::Db(DbError::Conflict { .. }))
    }
}

impl From<ConsultationError> for ConsultEaseError {
    fn from(err: ConsultationError) -> Self {
        match err {
            ConsultationError::Db(e) => e.into(),
            ConsultationError::Validation(msg) => ConsultEaseError::Validation(msg),
            ConsultationError::InvalidTransition(msg) => ConsultEaseError::InvalidTransition(msg),
            ConsultationError::RetriesExhausted { attempts, last } => {
                ConsultEaseError::Conflict(format!("gave up after {attempts} attempts: {last}"))
            }
        }
    }
}
