// [crates/consultease-consultation/src/message_id.rs]
//! Per-process monotonic message id generator (spec §4.6 "Routing and
//! correlation": "Each submission is assigned a stable message id
//! (monotonic per process, embedded in payload)").

use std::sync::atomic::{AtomicU64, Ordering};

pub struct MessageIdGenerator {
    counter: AtomicU64,
    /// Distinguishes ids minted by different process instances so a
    /// desk unit that crosses a restart boundary never echoes a stale
    /// id back into a fresh process's id space.
    epoch: u64,
}

impl MessageIdGenerator {
    pub fn new(epoch: u64) -> Self {
        Self { counter: AtomicU64::new(0), epoch }
    }

    pub fn next(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("ce-{:x}-{:012x}", self.epoch, n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_monotonic_and_unique() {
        let generator = MessageIdGenerator::new(1);
        let first = generator.next();
        let second = generator.next();
        assert_ne!(first, second);
        assert!(first < second, "{first} should sort before {second}");
    }
}
