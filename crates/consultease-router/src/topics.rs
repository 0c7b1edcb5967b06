// [crates/consultease-router/src/topics.rs]
//! The topic families the Router recognizes (spec §4.4, §6).

/// Identifies which first-class topic family a matched route belongs
/// to, so a caller's handler can branch without re-parsing the topic
/// string. Legacy synonyms resolve to the same kind as the topic they
/// replace during migration (spec §4.4 "Legacy synonyms").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TopicKind {
    FacultyStatus,
    FacultyMacStatus,
    FacultyResponses,
    FacultyHeartbeat,
    FacultyRequests,
    SystemNotifications,
}

pub const FACULTY_STATUS: &str = "consultease/faculty/{id}/status";
pub const FACULTY_MAC_STATUS: &str = "consultease/faculty/{id}/mac_status";
pub const FACULTY_RESPONSES: &str = "consultease/faculty/{id}/responses";
pub const FACULTY_HEARTBEAT: &str = "consultease/faculty/{id}/heartbeat";
pub const FACULTY_REQUESTS: &str = "consultease/faculty/{id}/requests";
pub const SYSTEM_NOTIFICATIONS: &str = "consultease/system/notifications";

/// Legacy synonym for [`FACULTY_STATUS`], carrying a plain
/// `keychain_connected`/`keychain_disconnected` string rather than JSON;
/// the topic carries no faculty id, so the handler must infer one from
/// elsewhere (spec §6 "Legacy `professor/status`").
pub const LEGACY_PROFESSOR_STATUS: &str = "professor/status";
/// Legacy synonym for [`FACULTY_RESPONSES`].
pub const LEGACY_PROFESSOR_MESSAGES: &str = "professor/messages";
