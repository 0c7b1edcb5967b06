// [crates/consultease-coordinator/src/fanout.rs]
//! Subscriber Fan-out (spec §4.8): a callback registry keyed by event
//! kind. Callbacks receive immutable snapshots; dispatch is synchronous
//! to the caller, but a panicking callback is caught and logged so it
//! never takes down the others.

use consultease_domain::{ConsultationSnapshot, FacultySnapshot};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::error;

#[derive(Debug, Clone)]
pub enum SystemEvent {
    FacultyChanged(FacultySnapshot),
    ConsultationChanged(ConsultationSnapshot),
    Notification { kind: String, detail: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    FacultyChanged,
    ConsultationChanged,
    Notification,
}

impl SystemEvent {
    fn kind(&self) -> EventKind {
        match self {
            SystemEvent::FacultyChanged(_) => EventKind::FacultyChanged,
            SystemEvent::ConsultationChanged(_) => EventKind::ConsultationChanged,
            SystemEvent::Notification { .. } => EventKind::Notification,
        }
    }
}

pub type Subscriber = Arc<dyn Fn(SystemEvent) + Send + Sync>;

/// Registration handle returned by `subscribe`; dropping it does not
/// deregister (spec leaves deregistration explicit via `unsubscribe`).
pub type SubscriptionId = u64;

#[derive(Default)]
pub struct SubscriberFanout {
    callbacks: RwLock<HashMap<EventKind, Vec<(SubscriptionId, Subscriber)>>>,
    next_id: std::sync::atomic::AtomicU64,
}

impl SubscriberFanout {
    pub fn new() -> Self {
        Self { callbacks: RwLock::new(HashMap::new()), next_id: std::sync::atomic::AtomicU64::new(1) }
    }

    /// Registers a callback for a single event kind. Thread-safe: may
    /// be called concurrently with `dispatch` and `unsubscribe`.
    pub fn subscribe(&self, kind: EventKind, callback: Subscriber) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        self.callbacks.write().entry(kind).or_default().push((id, callback));
        id
    }

    pub fn unsubscribe(&self, kind: EventKind, id: SubscriptionId) {
        if let Some(list) = self.callbacks.write().get_mut(&kind) {
            list.retain(|(existing, _)| *existing != id);
        }
    }

    /// Delivers `event` to every subscriber registered for its kind.
    /// Each callback runs in isolation: a panic is caught and logged,
    /// and dispatch continues to the remaining subscribers (spec §4.8
    /// "exceptions in a single callback are caught, logged, and never
    /// propagated").
    pub fn dispatch(&self, event: SystemEvent) {
        let kind = event.kind();
        // Snapshot the subscriber list under the lock, then release it
        // before invoking callbacks — callbacks must not suspend on I/O
        // while the registry is held (spec §5 "Suspension points").
        let subscribers: Vec<Subscriber> = match self.callbacks.read().get(&kind) {
            Some(list) => list.iter().map(|(_, cb)| cb.clone()).collect(),
            None => return,
        };

        for callback in subscribers {
            let event = event.clone();
            let result = catch_unwind(AssertUnwindSafe(|| callback(event)));
            if let Err(panic) = result {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "non-string panic payload".to_string());
                error!(event_kind = ?kind, "subscriber callback panicked: {message}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn dispatch_reaches_only_matching_kind_subscribers() {
        let fanout = SubscriberFanout::new();
        let faculty_hits = Arc::new(AtomicUsize::new(0));
        let consultation_hits = Arc::new(AtomicUsize::new(0));

        let f = faculty_hits.clone();
        fanout.subscribe(EventKind::FacultyChanged, Arc::new(move |_| { f.fetch_add(1, Ordering::SeqCst); }));
        let c = consultation_hits.clone();
        fanout.subscribe(EventKind::ConsultationChanged, Arc::new(move |_| { c.fetch_add(1, Ordering::SeqCst); }));

        fanout.dispatch(SystemEvent::Notification { kind: "test".into(), detail: "x".into() });
        assert_eq!(faculty_hits.load(Ordering::SeqCst), 0);
        assert_eq!(consultation_hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn panicking_callback_does_not_stop_siblings() {
        let fanout = SubscriberFanout::new();
        let hits = Arc::new(AtomicUsize::new(0));

        fanout.subscribe(EventKind::Notification, Arc::new(|_| panic!("boom")));
        let h = hits.clone();
        fanout.subscribe(EventKind::Notification, Arc::new(move |_| { h.fetch_add(1, Ordering::SeqCst); }));

        fanout.dispatch(SystemEvent::Notification { kind: "alert".into(), detail: "x".into() });
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribe_stops_future_delivery() {
        let fanout = SubscriberFanout::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let id = fanout.subscribe(EventKind::Notification, Arc::new(move |_| { h.fetch_add(1, Ordering::SeqCst); }));

        fanout.unsubscribe(EventKind::Notification, id);
        fanout.dispatch(SystemEvent::Notification { kind: "alert".into(), detail: "x".into() });
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }
}
