// [crates/consultease-presence/src/lib.rs]
//! Faculty Presence Engine (spec §4.5): serializes presence updates
//! per faculty through a process-wide lock map, reconciles MAC/MQTT
//! reports, honors the `alwaysAvailable` override, and broadcasts a
//! snapshot to registered callbacks after every committed change.

mod engine;
mod errors;
mod lock_map;

pub use engine::{FacultyChangeCallback, PersistenceHealth, PresenceEngine, PresenceOutcome, UpdateSource};
pub use errors::PresenceError;
pub use lock_map::FacultyLockMap;

#[cfg(test)]
mod tests {
    use super::*;
    use consultease_cache::CacheCoordinator;
    use consultease_db::{faculty as faculty_repo, DbClient, DbPool};
    use consultease_domain::NtpSyncStatus;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    async fn test_engine() -> (PresenceEngine, DbPool) {
        let client = DbClient::connect(":memory:", None).await.unwrap();
        let pool = DbPool::new(client, 5, 5);
        let cache = Arc::new(CacheCoordinator::new());
        let engine = PresenceEngine::new(pool.clone(), cache, PersistenceHealth::new_healthy());
        (engine, pool)
    }

    #[tokio::test]
    async fn arrival_increments_version_and_fires_callback() {
        let (engine, pool) = test_engine().await;
        let faculty = faculty_repo::create(&pool, "Dr. Reyes", "CS", None, None, false).await.unwrap();

        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();
        engine.register_callback(Arc::new(move |snapshot| {
            assert!(snapshot.present);
            fired_clone.fetch_add(1, Ordering::SeqCst);
        }));

        let outcome = engine.handle_status_update(faculty.id, true, "mqtt").await.unwrap();
        match outcome {
            PresenceOutcome::Applied(snapshot) => {
                assert!(snapshot.present);
                assert_eq!(snapshot.version, faculty.version + 1);
            }
            other => panic!("expected Applied, got {other:?}"),
        }
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn always_available_overrides_reported_absence() {
        let (engine, pool) = test_engine().await;
        let faculty = faculty_repo::create(&pool, "Dr. Cruz", "Math", None, None, true).await.unwrap();

        let outcome = engine.handle_status_update(faculty.id, false, "mqtt").await.unwrap();
        match outcome {
            PresenceOutcome::Applied(snapshot) => {
                assert!(snapshot.present, "always-available faculty must stay present");
                assert_eq!(snapshot.version, faculty.version + 1);
            }
            other => panic!("expected Applied, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unhealthy_persistence_defers_the_update() {
        let (engine, pool) = test_engine().await;
        let faculty = faculty_repo::create(&pool, "Dr. Santos", "CS", None, None, false).await.unwrap();
        engine.health_handle().set_healthy(false);

        let outcome = engine.handle_status_update(faculty.id, true, "mqtt").await.unwrap();
        assert!(matches!(outcome, PresenceOutcome::Deferred { .. }));
        assert_eq!(engine.pending_count(), 1);

        let unchanged = faculty_repo::get(&pool, faculty.id).await.unwrap();
        assert!(!unchanged.present);
    }

    #[tokio::test]
    async fn recovery_replays_deferred_update_exactly_once() {
        let (engine, pool) = test_engine().await;
        let faculty = faculty_repo::create(&pool, "Dr. Lim", "CS", None, None, false).await.unwrap();
        engine.health_handle().set_healthy(false);
        engine.handle_status_update(faculty.id, true, "mqtt").await.unwrap();

        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();
        engine.register_callback(Arc::new(move |_| {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        }));

        engine.health_handle().set_healthy(true);
        let replayed = engine.replay_pending().await;
        assert_eq!(replayed, 1);
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        let updated = faculty_repo::get(&pool, faculty.id).await.unwrap();
        assert!(updated.present);
    }

    #[tokio::test]
    async fn grace_period_flag_does_not_alter_present() {
        let (engine, pool) = test_engine().await;
        let faculty = faculty_repo::create(&pool, "Dr. Tan", "CS", None, None, false).await.unwrap();
        engine.handle_status_update(faculty.id, true, "mqtt").await.unwrap();

        let outcome = engine
            .handle_grace_and_ntp(faculty.id, true, true, NtpSyncStatus::Synced, "mqtt")
            .await
            .unwrap();

        match outcome {
            PresenceOutcome::Applied(snapshot) => {
                assert!(snapshot.present);
                assert!(snapshot.in_grace_period);
            }
            other => panic!("expected Applied, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn concurrent_flips_for_one_faculty_preserve_every_update() {
        let (engine, pool) = test_engine().await;
        let faculty = faculty_repo::create(&pool, "Dr. Okafor", "CS", None, None, false).await.unwrap();
        let engine = Arc::new(engine);

        let mut handles = Vec::new();
        for i in 0..20 {
            let engine = engine.clone();
            let id = faculty.id;
            handles.push(tokio::spawn(async move {
                for j in 0..5 {
                    let present = (i * 5 + j) % 2 == 0;
                    engine.handle_status_update(id, present, "mqtt").await.unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let committed = faculty_repo::get(&pool, faculty.id).await.unwrap();
        assert_eq!(committed.version, faculty.version + 100);
    }
}
