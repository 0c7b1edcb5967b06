// [crates/consultease-domain/src/error.rs]
/*!
 * Error taxonomy (spec §7). Every component-level error type in the
 * workspace ultimately narrows down to one of these seven kinds so the
 * System Coordinator and callers can reason about retry/surface policy
 * without knowing which component raised the error.
 */

use thiserror::Error;

/// The seven error kinds recognized across the coordination core.
///
/// - `Validation`, `NotFound`, `InvalidTransition` are never retried and
///   are reported straight to the caller.
/// - `Transient` is retried locally per the backoff policy of the
///   component that raised it (§4.1, §4.3, §4.5).
/// - `Conflict` is retried up to 3 times before being reported.
/// - `Degraded` is not an error in the exception-handling sense; it marks
///   work that was deferred rather than failed.
/// - `Fatal` bubbles all the way to the System Coordinator.
#[derive(Debug, Error)]
pub enum ConsultEaseError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("transient failure: {0}")]
    Transient(String),

    #[error("conflicting update: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid state transition: {0}")]
    InvalidTransition(String),

    #[error("degraded: {0}")]
    Degraded(String),

    #[error("fatal: {0}")]
    Fatal(String),
}

impl ConsultEaseError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ConsultEaseError::Transient(_) | ConsultEaseError::Conflict(_))
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
}
