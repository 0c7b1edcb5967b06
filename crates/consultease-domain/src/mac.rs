// [crates/consultease-domain/src/mac.rs]
//! Beacon MAC normalization (spec §8: `normalize(m)` is exactly 17
//! characters, uppercase, colon-separated hex).

use crate::error::ConsultEaseError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A beacon MAC address in its canonical form: `AA:BB:CC:DD:EE:FF`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NormalizedMac(String);

impl NormalizedMac {
    /// Accepts colon-, dash-, or bare-separated hex and normalizes to the
    /// canonical 17-character uppercase colon-separated form. Rejects
    /// anything that does not decode to exactly 6 octets.
    pub fn parse(raw: &str) -> Result<Self, ConsultEaseError> {
        let hex_only: String = raw
            .chars()
            .filter(|c| *c != ':' && *c != '-')
            .collect();

        if hex_only.len() != 12 || !hex_only.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ConsultEaseError::validation(format!(
                "'{raw}' is not a valid beacon MAC address"
            )));
        }

        let upper = hex_only.to_ascii_uppercase();
        let octets: Vec<&str> = upper
            .as_bytes()
            .chunks(2)
            .map(|pair| std::str::from_utf8(pair).unwrap())
            .collect();

        Ok(Self(octets.join(":")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NormalizedMac {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for NormalizedMac {
    type Error = ConsultEaseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<NormalizedMac> for String {
    fn from(value: NormalizedMac) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_mixed_case_and_dashes() {
        let mac = NormalizedMac::parse("aa-bb-cc-dd-ee-ff").unwrap();
        assert_eq!(mac.as_str(), "AA:BB:CC:DD:EE:FF");
        assert_eq!(mac.as_str().len(), 17);
    }

    #[test]
    fn normalizes_bare_hex() {
        let mac = NormalizedMac::parse("00112233aabb").unwrap();
        assert_eq!(mac.as_str(), "00:11:22:33:AA:BB");
    }

    #[test]
    fn rejects_short_input() {
        assert!(NormalizedMac::parse("AA:BB:CC").is_err());
    }

    #[test]
    fn rejects_non_hex() {
        assert!(NormalizedMac::parse("ZZ:11:22:33:44:55").is_err());
    }

    proptest::proptest! {
        #[test]
        fn accepted_macs_are_always_17_chars_upper_colon(
            octets in proptest::collection::vec(0u8..=255, 6..=6)
        ) {
            let raw = octets.iter().map(|b| format!("{:02x}", b)).collect::<Vec<_>>().join(":");
            let normalized = NormalizedMac::parse(&raw).unwrap();
            proptest::prop_assert_eq!(normalized.as_str().len(), 17);
            proptest::prop_assert!(normalized.as_str().chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == ':'));
        }
    }
}
