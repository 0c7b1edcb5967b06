// [crates/consultease-consultation/src/payloads.rs]
//! Wire payloads exchanged with desk units over the consultation topics
//! (spec §6 "External interfaces").

use serde::{Deserialize, Serialize};

/// Outgoing consultation request (spec §6:
/// `consultease/faculty/{id}/requests`).
#[derive(Debug, Clone, Serialize)]
pub struct ConsultationRequestPayload {
    pub message_id: String,
    pub student_name: String,
    pub course_code: String,
    pub request_message: String,
    pub timestamp: String,
}

/// Incoming desk-unit response (spec §6:
/// `consultease/faculty/{id}/responses`).
#[derive(Debug, Clone, Deserialize)]
pub struct ResponsePayload {
    pub faculty_id: i64,
    pub response_type: ResponseKind,
    pub message_id: String,
    #[serde(default)]
    pub original_message: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResponseKind {
    Acknowledge,
    Busy,
}

/// A cancellation notification published when a consultation expires
/// or is administratively cancelled (spec §4.6 "Expiry": "emit a
/// cancellation notification to the desk unit").
#[derive(Debug, Clone, Serialize)]
pub struct CancellationNotification {
    pub kind: &'static str,
    pub message_id: String,
    pub reason: String,
}
