// [crates/consultease-domain/src/lib.rs]
//! Shared entity types and error taxonomy for the ConsultEase coordination
//! core. Every type here is a plain value: no type in this crate holds a
//! database handle, a lock guard, or a network connection, so values are
//! safe to carry past the session or transaction that produced them.

pub mod error;
pub mod faculty;
pub mod mac;
pub mod student;
pub mod consultation;
pub mod admin;
pub mod pending;

pub use error::ConsultEaseError;
pub use faculty::{Faculty, FacultySnapshot, NtpSyncStatus};
pub use mac::NormalizedMac;
pub use student::Student;
pub use consultation::{Consultation, ConsultationSnapshot, ConsultationStatus};
pub use admin::Admin;
pub use pending::PendingStatusUpdate;

/// Result alias used at every crate boundary in the workspace.
pub type ConsultEaseResult<T> = Result<T, ConsultEaseError>;
