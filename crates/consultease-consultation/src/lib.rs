// [crates/consultease-consultation/src/lib.rs]
//! Consultation Coordinator (spec §4.6): the student-to-faculty
//! consultation request workflow, its state machine, and the periodic
//! expiry sweep.

mod coordinator;
mod errors;
mod message_id;
mod payloads;

pub use coordinator::{
    ConsultationChangeCallback, ConsultationCoordinator, ResponseOutcome, DEFAULT_EXPIRY, DEFAULT_SWEEP_INTERVAL,
};
pub use errors::ConsultationError;
pub use message_id::MessageIdGenerator;
pub use payloads::{CancellationNotification, ConsultationRequestPayload, ResponseKind, ResponsePayload};

#[cfg(test)]
mod tests {
    use super::*;
    use consultease_config::MqttConfig;
    use consultease_db::{DbClient, DbPool};
    use consultease_domain::ConsultationStatus;
    use consultease_mqtt::MqttTransport;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    async fn test_pool() -> DbPool {
        let client = DbClient::connect(":memory:", None).await.expect("connect in-memory db");
        DbPool::new(client, 4, 0)
    }

    async fn seed_student(pool: &DbPool) -> i64 {
        let student = consultease_db::student::upsert(pool, "Ada Lovelace", "04A1B2C3D4", "BSCS").await.expect("seed student");
        student.id
    }

    async fn seed_faculty(pool: &DbPool) -> i64 {
        let faculty = consultease_db::faculty::create(pool, "Dr. Turing", "CS Department", None, None, false)
            .await
            .expect("seed faculty");
        faculty.id
    }

    fn test_transport() -> Arc<MqttTransport> {
        // Points at a port nothing listens on; the inbound worker's
        // connect attempts fail in the background while outbound
        // publishes land harmlessly in the offline queue, which is all
        // these coordinator tests need.
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
            MqttTransport::connect(&config, "consultease-test", Vec::new());
        Arc::new(transport)
    }

    fn coordinator(pool: DbPool) -> ConsultationCoordinator {
        ConsultationCoordinator::new(pool, test_transport(), 1, Duration::from_secs(300))
    }

    #[tokio::test]
    async fn submit_creates_pending_and_publishes() {
        let pool = test_pool().await;
        let student_id = seed_student(&pool).await;
        let faculty_id = seed_faculty(&pool).await;
        let coord = coordinator(pool);

        let snapshot = coord.submit(student_id, faculty_id, "CS101", "Can I ask about the midterm?").await.unwrap();

        assert_eq!(snapshot.status, ConsultationStatus::Pending);
        assert_eq!(snapshot.course_code, "CS101");
        assert!(!snapshot.message_id.is_empty());
    }

    #[tokio::test]
    async fn acknowledge_response_transitions_to_accepted() {
        let pool = test_pool().await;
        let student_id = seed_student(&pool).await;
        let faculty_id = seed_faculty(&pool).await;
        let coord = coordinator(pool);

        let submitted = coord.submit(student_id, faculty_id, "CS101", "question").await.unwrap();
        let outcome = coord.on_response(&submitted.message_id, ResponseKind::Acknowledge).await.unwrap();

        match outcome {
            ResponseOutcome::Applied(snapshot) => {
                assert_eq!(snapshot.status, ConsultationStatus::Accepted);
                assert!(snapshot.accepted_at.is_some());
            }
            other => panic!("expected Applied, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn replaying_same_response_is_idempotent() {
        let pool = test_pool().await;
        let student_id = seed_student(&pool).await;
        let faculty_id = seed_faculty(&pool).await;
        let coord = coordinator(pool);

        let submitted = coord.submit(student_id, faculty_id, "CS101", "question").await.unwrap();
        coord.on_response(&submitted.message_id, ResponseKind::Acknowledge).await.unwrap();
        let replayed = coord.on_response(&submitted.message_id, ResponseKind::Acknowledge).await.unwrap();

        assert!(matches!(replayed, ResponseOutcome::AlreadyApplied(_)));
    }

    #[tokio::test]
    async fn unknown_message_id_is_dropped_without_error() {
        let pool = test_pool().await;
        let coord = coordinator(pool);

        let outcome = coord.on_response("ce-does-not-exist", ResponseKind::Acknowledge).await.unwrap();
        assert!(matches!(outcome, ResponseOutcome::UnknownMessageId));
    }

    #[tokio::test]
    async fn expire_stale_moves_old_pending_to_expired() {
        let pool = test_pool().await;
        let student_id = seed_student(&pool).await;
        let faculty_id = seed_faculty(&pool).await;
        let coord = ConsultationCoordinator::new(pool.clone(), test_transport(), 1, Duration::from_millis(1));

        coord.submit(student_id, faculty_id, "CS101", "question").await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let expired = coord.expire_stale().await.unwrap();
        assert_eq!(expired, 1);
    }

    #[tokio::test]
    async fn fresh_pending_survives_the_sweep() {
        let pool = test_pool().await;
        let student_id = seed_student(&pool).await;
        let faculty_id = seed_faculty(&pool).await;
        let coord = coordinator(pool);

        coord.submit(student_id, faculty_id, "CS101", "question").await.unwrap();
        let expired = coord.expire_stale().await.unwrap();
        assert_eq!(expired, 0, "a consultation submitted moments ago must not expire immediately");
    }

    #[tokio::test]
    async fn registered_callback_fires_on_submit_and_response() {
        let pool = test_pool().await;
        let student_id = seed_student(&pool).await;
        let faculty_id = seed_faculty(&pool).await;
        let coord = coordinator(pool);

        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();
        coord.register_callback(Arc::new(move |_snapshot| {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        }));

        let submitted = coord.submit(student_id, faculty_id, "CS101", "question").await.unwrap();
        coord.on_response(&submitted.message_id, ResponseKind::Busy).await.unwrap();

        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }
}
