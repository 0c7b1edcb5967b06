// [crates/consultease-domain/src/student.rs]
use crate::error::ConsultEaseError;
use serde::{Deserialize, Serialize};

/// A student row. Created and mutated only by administrator action;
/// consumed read-only by the Consultation Coordinator (spec §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: i64,
    pub name: String,
    pub rfid_uid: String,
    pub department: String,
}

impl Student {
    /// Validates an RFID UID as a hex-like token (spec §3).
    pub fn validate_rfid_uid(raw: &str) -> Result<String, ConsultEaseError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.len() > 32 {
            return Err(ConsultEaseError::validation(
                "RFID UID must be between 1 and 32 characters",
            ));
        }
        if !trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ConsultEaseError::validation(
                "RFID UID must be a hex-like token",
            ));
        }
        Ok(trimmed.to_ascii_uppercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_hex_uid() {
        assert_eq!(Student::validate_rfid_uid("04a3f1c2").unwrap(), "04A3F1C2");
    }

    #[test]
    fn rejects_non_hex_uid() {
        assert!(Student::validate_rfid_uid("not-a-uid!").is_err());
    }

    #[test]
    fn rejects_empty_uid() {
        assert!(Student::validate_rfid_uid("   ").is_err());
    }
}
