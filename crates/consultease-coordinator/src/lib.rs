// [crates/consultease-coordinator/src/lib.rs]
//! System Coordinator and Subscriber Fan-out (spec §4.7, §4.8): service
//! lifecycle management and the snapshot broadcast layer that sits on
//! top of the Presence Engine and Consultation Coordinator.

mod coordinator;
mod errors;
mod fanout;
mod service;

pub use coordinator::{SystemCoordinator, HEALTH_PROBE_INTERVAL};
pub use errors::CoordinatorError;
pub use fanout::{EventKind, SubscriberFanout, SubscriptionId, Subscriber, SystemEvent};
pub use service::{topological_order, Service, ServiceEntry};

/// Wires a freshly-built `ConsultationCoordinator`'s narrow change
/// callback and a `PresenceEngine`'s narrow change callback into a
/// shared [`SubscriberFanout`], so both crates stay unaware of each
/// other and of this one (spec §4.8, avoiding a dependency cycle
/// between the presence and consultation crates and this coordinator).
pub fn bridge_presence_and_consultation(
    fanout: std::sync::Arc<SubscriberFanout>,
    presence: &consultease_presence::PresenceEngine,
    consultation: &consultease_consultation::ConsultationCoordinator,
) {
    let presence_fanout = fanout.clone();
    presence.register_callback(std::sync::Arc::new(move |snapshot| {
        presence_fanout.dispatch(SystemEvent::FacultyChanged(snapshot));
    }));

    let consultation_fanout = fanout;
    consultation.register_callback(std::sync::Arc::new(move |snapshot| {
        consultation_fanout.dispatch(SystemEvent::ConsultationChanged(snapshot));
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use consultease_cache::CacheCoordinator;
    use consultease_config::MqttConfig;
    use consultease_consultation::ConsultationCoordinator;
    use consultease_db::{DbClient, DbPool};
    use consultease_mqtt::MqttTransport;
    use consultease_presence::{PersistenceHealth, PresenceEngine};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    async fn test_pool() -> DbPool {
        let client = DbClient::connect(":memory:", None).await.expect("connect in-memory db");
        DbPool::new(client, 4, 0)
    }

    fn test_transport() -> Arc<MqttTransport> {
        let config = MqttConfig {
            broker_host: "127.0.0.1".to_string(),
            broker_port: 1,
            username: None,
            password: None,
            batch_size: 10,
            batch_timeout: Duration::from_millis(100),
            offline_queue_size: 1024,
        };
        let (transport, _inbound_rx, _outbound_handle, _inbound_handle) =
            MqttTransport::connect(&config, "consultease-coordinator-test", Vec::new());
        Arc::new(transport)
    }

    #[tokio::test]
    async fn faculty_change_reaches_fanout_subscriber() {
        let pool = test_pool().await;
        let faculty = consultease_db::faculty::create(&pool, "Dr. Turing", "CS", None, None, false).await.unwrap();

        let cache = Arc::new(CacheCoordinator::new());
        let presence = PresenceEngine::new(pool.clone(), cache, PersistenceHealth::new_healthy());
        let consultation = ConsultationCoordinator::new(pool, test_transport(), 1, Duration::from_secs(300));

        let fanout = Arc::new(SubscriberFanout::new());
        bridge_presence_and_consultation(fanout.clone(), &presence, &consultation);

        let faculty_hits = Arc::new(AtomicUsize::new(0));
        let f = faculty_hits.clone();
        fanout.subscribe(EventKind::FacultyChanged, Arc::new(move |_| { f.fetch_add(1, Ordering::SeqCst); }));

        let _ = presence.handle_status_update(faculty.id, true, "mqtt").await.unwrap();

        assert_eq!(faculty_hits.load(Ordering::SeqCst), 1);
    }
}
