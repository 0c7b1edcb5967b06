// [crates/consultease-domain/src/faculty.rs]
use crate::error::ConsultEaseError;
use crate::mac::NormalizedMac;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// NTP synchronization status as reported by a desk unit's heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NtpSyncStatus {
    Synced,
    Pending,
    Failed,
}

impl Default for NtpSyncStatus {
    fn default() -> Self {
        Self::Pending
    }
}

/// A faculty row as owned by the Persistence Layer while a session is
/// open. Mutated only by the Presence Engine (spec §3 Ownership).
#[derive(Debug, Clone, PartialEq)]
pub struct Faculty {
    pub id: i64,
    pub name: String,
    pub department: String,
    pub email: Option<String>,
    pub beacon_mac: Option<NormalizedMac>,
    pub always_available: bool,
    pub present: bool,
    pub last_seen: Option<DateTime<Utc>>,
    pub ntp_sync_status: NtpSyncStatus,
    pub in_grace_period: bool,
    pub version: i64,
}

/// An immutable, plain-value copy of a faculty row, safe to hold after the
/// originating session closes (spec §3 Invariant 5, Glossary "Snapshot").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacultySnapshot {
    pub id: i64,
    pub name: String,
    pub department: String,
    pub present: bool,
    pub last_seen: Option<DateTime<Utc>>,
    pub ntp_sync_status: NtpSyncStatus,
    pub in_grace_period: bool,
    pub version: i64,
}

impl Faculty {
    pub fn to_snapshot(&self) -> FacultySnapshot {
        FacultySnapshot {
            id: self.id,
            name: self.name.clone(),
            department: self.department.clone(),
            present: self.present,
            last_seen: self.last_seen,
            ntp_sync_status: self.ntp_sync_status,
            in_grace_period: self.in_grace_period,
            version: self.version,
        }
    }

    pub fn validate_new(name: &str, department: &str) -> Result<(), ConsultEaseError> {
        if name.trim().is_empty() {
            return Err(ConsultEaseError::validation("faculty name must not be empty"));
        }
        if department.trim().is_empty() {
            return Err(ConsultEaseError::validation("faculty department must not be empty"));
        }
        Ok(())
    }
}
