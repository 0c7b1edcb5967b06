// [crates/consultease-mqtt/src/queue.rs]
/*!
 * Bounded offline queue (spec §4.3 "Reliability"). Holds publishes that
 * could not be delivered while the broker connection is down. Full
 * queue evicts the oldest entry to make room; each entry carries a
 * retry count capped at 3 attempts before it is dropped for good.
 */

use crate::types::OutboundMessage;
use std::collections::VecDeque;
use tracing::warn;

const MAX_QUEUE_SIZE: usize = 20;
const MAX_RETRIES: u32 = 3;

pub struct QueuedMessage {
    pub message: OutboundMessage,
    pub attempts: u32,
}

#[derive(Default)]
pub struct OfflineQueue {
    entries: VecDeque<QueuedMessage>,
}

impl OfflineQueue {
    pub fn new() -> Self {
        Self { entries: VecDeque::with_capacity(MAX_QUEUE_SIZE) }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Enqueues a fresh message, evicting the oldest entry if the queue
    /// is already at capacity.
    pub fn push(&mut self, message: OutboundMessage) {
        if self.entries.len() >= MAX_QUEUE_SIZE {
            if let Some(evicted) = self.entries.pop_front() {
                warn!("offline queue full, evicting oldest message for topic '{}'", evicted.message.topic);
            }
        }
        self.entries.push_back(QueuedMessage { message, attempts: 0 });
    }

    /// Pops the oldest entry so callers can retry in receipt order.
    pub fn pop_front(&mut self) -> Option<QueuedMessage> {
        self.entries.pop_front()
    }

    /// Returns a failed entry to the front of the queue unless it has
    /// exhausted its retry budget, in which case it is dropped.
    pub fn requeue_or_drop(&mut self, mut entry: QueuedMessage) {
        entry.attempts += 1;
        if entry.attempts >= MAX_RETRIES {
            warn!(
                "dropping message for topic '{}' after {} failed attempts",
                entry.message.topic, entry.attempts
            );
            return;
        }
        self.entries.push_front(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rumqttc::QoS;

    fn msg(topic: &str) -> OutboundMessage {
        OutboundMessage {
            topic: topic.to_string(),
            payload: vec![1, 2, 3],
            qos: QoS::AtLeastOnce,
            retain: false,
            critical: false,
        }
    }

    #[test]
    fn evicts_oldest_when_full() {
        let mut queue = OfflineQueue::new();
        for i in 0..MAX_QUEUE_SIZE {
            queue.push(msg(&format!("t{i}")));
        }
        queue.push(msg("overflow"));
        assert_eq!(queue.len(), MAX_QUEUE_SIZE);
        assert_eq!(queue.pop_front().unwrap().message.topic, "t1");
    }

    #[test]
    fn drops_after_max_retries() {
        let mut queue = OfflineQueue::new();
        queue.push(msg("t"));
        let mut entry = queue.pop_front().unwrap();
        entry.attempts = MAX_RETRIES - 1;
        queue.requeue_or_drop(entry);
        assert!(queue.is_empty());
    }
}
