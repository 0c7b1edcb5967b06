// [crates/consultease-router/src/ratelimit.rs]
//! Per-route token-bucket rate limiting (spec §4.4: "Per-rule
//! token-bucket rate-limiting protects handlers from flooding; excess
//! messages are dropped with a counter increment").

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    /// Maximum burst size, in tokens.
    pub capacity: f64,
    /// Tokens replenished per second.
    pub refill_per_sec: f64,
}

impl RateLimitConfig {
    pub fn new(capacity: f64, refill_per_sec: f64) -> Self {
        Self { capacity, refill_per_sec }
    }
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// A single route's token bucket plus its drop counter. Cheap to poll:
/// lookups take a short-lived lock only on the bucket itself.
pub struct TokenBucket {
    config: RateLimitConfig,
    state: Mutex<BucketState>,
    dropped: AtomicU64,
}

impl TokenBucket {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            state: Mutex::new(BucketState { tokens: config.capacity, last_refill: Instant::now() }),
            dropped: AtomicU64::new(0),
        }
    }

    /// Attempts to consume one token. Returns `true` if the message may
    /// proceed, `false` if it should be dropped.
    pub fn try_acquire(&self) -> bool {
        let mut state = self.state.lock();
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.config.refill_per_sec).min(self.config.capacity);
        state.last_refill = now;

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_burst_up_to_capacity() {
        let bucket = TokenBucket::new(RateLimitConfig::new(3.0, 1.0));
        assert!(bucket.try_acquire());
        assert!(bucket.try_acquire());
        assert!(bucket.try_acquire());
        assert!(!bucket.try_acquire());
        assert_eq!(bucket.dropped_count(), 1);
    }
}
