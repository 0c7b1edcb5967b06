// [crates/consultease-coordinator/src/coordinator.rs]
//! System Coordinator (spec §4.7): topological service lifecycle,
//! periodic health probing with bounded, cooldown-backed restarts, and
//! the persistence-degradation bridge that drives the Presence
//! Engine's deferred-update replay.

use crate::errors::CoordinatorError;
use crate::service::{topological_order, Service, ServiceEntry};
use consultease_presence::PresenceEngine;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// Health probe interval (spec §4.7: "probes health on an interval (30 s)").
pub const HEALTH_PROBE_INTERVAL: Duration = Duration::from_secs(30);
const INITIAL_RESTART_COOLDOWN: Duration = Duration::from_secs(1);
const MAX_RESTART_COOLDOWN: Duration = Duration::from_secs(300);

struct RestartState {
    attempts: u32,
    cooldown: Duration,
}

impl Default for RestartState {
    fn default() -> Self {
        Self { attempts: 0, cooldown: INITIAL_RESTART_COOLDOWN }
    }
}

pub struct SystemCoordinator {
    start_order: Vec<String>,
    services: HashMap<String, Arc<dyn Service>>,
    restart_budget: u32,
    restart_state: Mutex<HashMap<String, RestartState>>,
    presence: Option<Arc<PresenceEngine>>,
}

impl SystemCoordinator {
    /// Builds a coordinator from the declared service entries, failing
    /// fast if the dependency graph has an unknown edge or a cycle.
    pub fn new(entries: Vec<ServiceEntry>, restart_budget: u32) -> Result<Self, CoordinatorError> {
        let start_order = topological_order(&entries)?;
        let services = entries
            .into_iter()
            .map(|entry| (entry.service.name().to_string(), Arc::from(entry.service)))
            .collect();

        Ok(Self {
            start_order,
            services,
            restart_budget,
            restart_state: Mutex::new(HashMap::new()),
            presence: None,
        })
    }

    /// Wires in the Presence Engine so the persistence-degradation
    /// bridge (spec §4.7 "Degradation") can drive its pending-update
    /// replay once the Persistence Layer recovers.
    pub fn with_presence_engine(mut self, presence: Arc<PresenceEngine>) -> Self {
        self.presence = Some(presence);
        self
    }

    /// Starts every service in dependency order. The first failure
    /// aborts startup; services started so far are left running for
    /// the caller to tear down via `shutdown`.
    pub async fn start_all(&self) -> Result<(), CoordinatorError> {
        for name in &self.start_order {
            let service = self.services.get(name).expect("start_order only names known services");
            info!(service = name.as_str(), "starting service");
            service.start().await.map_err(|source| CoordinatorError::StartFailed { name: name.clone(), source })?;
        }
        Ok(())
    }

    /// Stops every service in reverse dependency order (spec §4.7
    /// "its reverse for shutdown").
    pub async fn shutdown(&self) {
        for name in self.start_order.iter().rev() {
            if let Some(service) = self.services.get(name) {
                info!(service = name.as_str(), "stopping service");
                service.stop().await;
            }
        }
    }

    /// Probes every service once. A failed service is restarted up to
    /// `restart_budget` times with exponential cooldown; exceeding the
    /// budget leaves it stopped and the failure is returned for the
    /// caller to propagate to dependents (spec §4.7).
    pub async fn probe_once(&self) -> Vec<CoordinatorError> {
        let mut failures = Vec::new();
        for name in &self.start_order {
            let service = self.services.get(name).expect("start_order only names known services");
            if service.healthy().await {
                let mut state = self.restart_state.lock().await;
                state.remove(name);
                continue;
            }

            warn!(service = name.as_str(), "health probe failed");
            match self.attempt_restart(name, service.as_ref()).await {
                Ok(()) => {}
                Err(err) => {
                    error!(service = name.as_str(), "{err}");
                    failures.push(err);
                }
            }
        }
        failures
    }

    async fn attempt_restart(&self, name: &str, service: &dyn Service) -> Result<(), CoordinatorError> {
        let cooldown = {
            let mut states = self.restart_state.lock().await;
            let state = states.entry(name.to_string()).or_default();
            if state.attempts >= self.restart_budget {
                return Err(CoordinatorError::RestartBudgetExhausted { name: name.to_string(), budget: self.restart_budget });
            }
            state.attempts += 1;
            let cooldown = state.cooldown;
            state.cooldown = (state.cooldown * 2).min(MAX_RESTART_COOLDOWN);
            cooldown
        };

        tokio::time::sleep(cooldown).await;
        service.stop().await;
        service
            .start()
            .await
            .map_err(|source| CoordinatorError::StartFailed { name: name.to_string(), source })
    }

    /// Runs the health-probe loop forever at `HEALTH_PROBE_INTERVAL`.
    /// Intended to be spawned as a background task; a `Fatal` failure
    /// (budget exhausted) is logged but does not stop the loop — the
    /// daemon entry point decides whether to terminate the process.
    pub async fn run_health_loop(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(HEALTH_PROBE_INTERVAL);
        loop {
            ticker.tick().await;
            for failure in self.probe_once().await {
                error!("unrecoverable service failure: {failure}");
            }
        }
    }

    /// Runs the pending-update replay loop once persistence recovers.
    /// Checks every `HEALTH_PROBE_INTERVAL` and replays in receipt
    /// order, discarding stale entries, per spec §4.7.
    pub async fn run_replay_loop(self: Arc<Self>) {
        let Some(presence) = self.presence.clone() else { return };
        let mut ticker = tokio::time::interval(HEALTH_PROBE_INTERVAL);
        loop {
            ticker.tick().await;
            if presence.health_handle().is_healthy() && presence.pending_count() > 0 {
                let replayed = presence.replay_pending().await;
                if replayed > 0 {
                    info!(replayed, "replayed pending presence updates after persistence recovery");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::Service;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    struct FlakyService {
        name: &'static str,
        healthy: Arc<AtomicBool>,
        start_count: Arc<AtomicU32>,
    }

    #[async_trait]
    impl Service for FlakyService {
        fn name(&self) -> &str {
            self.name
        }
        async fn start(&self) -> anyhow::Result<()> {
            self.start_count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn stop(&self) {}
        async fn healthy(&self) -> bool {
            self.healthy.load(Ordering::SeqCst)
        }
    }

    #[tokio::test]
    async fn start_all_runs_in_dependency_order() {
        let started: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

        struct Recording {
            name: &'static str,
            log: Arc<Mutex<Vec<String>>>,
        }
        #[async_trait]
        impl Service for Recording {
            fn name(&self) -> &str {
                self.name
            }
            async fn start(&self) -> anyhow::Result<()> {
                self.log.lock().await.push(self.name.to_string());
                Ok(())
            }
            async fn stop(&self) {}
            async fn healthy(&self) -> bool {
                true
            }
        }

        let entries = vec![
            ServiceEntry::new(Recording { name: "router", log: started.clone() }, vec!["db"]),
            ServiceEntry::new(Recording { name: "db", log: started.clone() }, vec![]),
        ];
        let coordinator = SystemCoordinator::new(entries, 3).unwrap();
        coordinator.start_all().await.unwrap();

        let order = started.lock().await.clone();
        assert_eq!(order, vec!["db".to_string(), "router".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn unhealthy_service_is_restarted_up_to_budget() {
        let healthy = Arc::new(AtomicBool::new(false));
        let start_count = Arc::new(AtomicU32::new(0));
        let entries = vec![ServiceEntry::new(
            FlakyService { name: "mqtt", healthy: healthy.clone(), start_count: start_count.clone() },
            vec![],
        )];
        let coordinator = SystemCoordinator::new(entries, 2).unwrap();

        let first = coordinator.probe_once().await;
        assert!(first.is_empty());
        let second = coordinator.probe_once().await;
        assert!(second.is_empty());
        let third = coordinator.probe_once().await;
        assert_eq!(third.len(), 1, "third failure should exceed the restart budget of 2");
    }
}
