// [crates/consultease-domain/src/consultation.rs]
/*!
 * Consultation entity and its state machine (spec §4.6):
 *
 * ```text
 * PENDING --accept--> ACCEPTED --complete--> COMPLETED
 *    |  \--busy-----> BUSY
 *    |  \--cancel---> CANCELLED     (administrator action)
 *    +--expire------> EXPIRED       (timer sweep)
 * ```
 *
 * No other edges are valid; an attempt to leave a terminal state raises
 * `ConsultEaseError::InvalidTransition`.
 */

use crate::error::ConsultEaseError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConsultationStatus {
    Pending,
    Accepted,
    Busy,
    Completed,
    Cancelled,
    Expired,
}

impl ConsultationStatus {
    /// True once a consultation can no longer transition.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ConsultationStatus::Completed | ConsultationStatus::Cancelled | ConsultationStatus::Expired
        )
    }

    /// Validates a single edge of the state machine above. Returns the
    /// target status on success, or `InvalidTransition` if the edge does
    /// not exist.
    pub fn validate_transition(self, target: ConsultationStatus) -> Result<ConsultationStatus, ConsultEaseError> {
        let allowed = matches!(
            (self, target),
            (ConsultationStatus::Pending, ConsultationStatus::Accepted)
                | (ConsultationStatus::Pending, ConsultationStatus::Busy)
                | (ConsultationStatus::Pending, ConsultationStatus::Cancelled)
                | (ConsultationStatus::Pending, ConsultationStatus::Expired)
                | (ConsultationStatus::Accepted, ConsultationStatus::Completed)
        );

        if allowed {
            Ok(target)
        } else {
            Err(ConsultEaseError::InvalidTransition(format!(
                "{self:?} -> {target:?} is not a legal consultation transition"
            )))
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Consultation {
    pub id: i64,
    pub student_id: i64,
    pub faculty_id: i64,
    pub course_code: String,
    pub message: String,
    pub requested_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: ConsultationStatus,
    /// Correlation id echoed by the desk unit on ACKNOWLEDGE/BUSY
    /// responses (spec §4.6 "Routing and correlation").
    pub message_id: String,
}

/// Max length of a consultation message body (spec §3).
pub const MAX_MESSAGE_LEN: usize = 512;

impl Consultation {
    pub fn to_snapshot(&self) -> ConsultationSnapshot {
        ConsultationSnapshot {
            id: self.id,
            student_id: self.student_id,
            faculty_id: self.faculty_id,
            course_code: self.course_code.clone(),
            message: self.message.clone(),
            requested_at: self.requested_at,
            accepted_at: self.accepted_at,
            completed_at: self.completed_at,
            status: self.status,
            message_id: self.message_id.clone(),
        }
    }

    /// Sanitizes and length-checks a consultation message body.
    pub fn sanitize_message(raw: &str) -> Result<String, ConsultEaseError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ConsultEaseError::validation("consultation message must not be empty"));
        }
        if trimmed.chars().count() > MAX_MESSAGE_LEN {
            return Err(ConsultEaseError::validation(format!(
                "consultation message exceeds {MAX_MESSAGE_LEN} characters"
            )));
        }
        // Strip control characters; desk-unit displays cannot render them.
        let sanitized: String = trimmed.chars().filter(|c| !c.is_control() || *c == ' ').collect();
        Ok(sanitized)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsultationSnapshot {
    pub id: i64,
    pub student_id: i64,
    pub faculty_id: i64,
    pub course_code: String,
    pub message: String,
    pub requested_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: ConsultationStatus,
    pub message_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ConsultationStatus::*;

    #[test]
    fn pending_can_reach_every_direct_edge() {
        assert!(Pending.validate_transition(Accepted).is_ok());
        assert!(Pending.validate_transition(Busy).is_ok());
        assert!(Pending.validate_transition(Cancelled).is_ok());
        assert!(Pending.validate_transition(Expired).is_ok());
    }

    #[test]
    fn accepted_can_only_complete() {
        assert!(Accepted.validate_transition(Completed).is_ok());
        assert!(Accepted.validate_transition(Busy).is_err());
        assert!(Accepted.validate_transition(Cancelled).is_err());
    }

    #[test]
    fn terminal_states_reject_every_edge() {
        for terminal in [Completed, Cancelled, Expired] {
            assert!(terminal.is_terminal());
            assert!(terminal.validate_transition(Accepted).is_err());
        }
    }

    #[test]
    fn message_over_limit_is_rejected() {
        let long = "x".repeat(MAX_MESSAGE_LEN + 1);
        assert!(Consultation::sanitize_message(&long).is_err());
    }

    #[test]
    fn message_at_limit_is_accepted() {
        let exact = "x".repeat(MAX_MESSAGE_LEN);
        assert!(Consultation::sanitize_message(&exact).is_ok());
    }
}
