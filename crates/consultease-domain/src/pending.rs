// [crates/consultease-domain/src/pending.rs]
use chrono::{DateTime, Utc};

/// Transient record held in memory while persistence is unavailable
/// (spec §3). Discarded after successful apply or once it crosses the
/// 5-minute staleness window.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingStatusUpdate {
    pub faculty_id: i64,
    pub desired_present: bool,
    pub received_at: DateTime<Utc>,
    pub source: String,
}

/// Default staleness window for pending updates (spec §3, §4.7).
pub const PENDING_UPDATE_STALENESS_SECS: i64 = 300;

impl PendingStatusUpdate {
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        (now - self.received_at).num_seconds() >= PENDING_UPDATE_STALENESS_SECS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn stale_after_window() {
        let update = PendingStatusUpdate {
            faculty_id: 1,
            desired_present: true,
            received_at: Utc::now() - Duration::seconds(PENDING_UPDATE_STALENESS_SECS + 1),
            source: "mqtt".into(),
        };
        assert!(update.is_stale(Utc::now()));
    }

    #[test]
    fn not_stale_within_window() {
        let update = PendingStatusUpdate {
            faculty_id: 1,
            desired_present: true,
            received_at: Utc::now(),
            source: "mqtt".into(),
        };
        assert!(!update.is_stale(Utc::now()));
    }
}
