// [apps/consultease-daemon/src/bootstrap.rs]
//! Composition root: wires the Persistence Layer, Cache Coordinator,
//! MQTT Transport, Message Router, Faculty Presence Engine,
//! Consultation Coordinator, System Coordinator, and Subscriber
//! Fan-out into one running process (spec §4, §6 "Process exit
//! codes").

use crate::handlers::{
    FacultyHeartbeatHandler, FacultyMacStatusHandler, FacultyResponseHandler, FacultyStatusHandler, LegacyMessagesHandler,
    LegacyStatusHandler,
};
use async_trait::async_trait;
use consultease_cache::CacheCoordinator;
use consultease_config::Config;
use consultease_consultation::ConsultationCoordinator;
use consultease_coordinator::{bridge_presence_and_consultation, Service, ServiceEntry, SubscriberFanout, SystemCoordinator};
use consultease_db::{ConnectParams, DbClient, DbPool, HealthMonitor, SharedPool};
use consultease_mqtt::{InboundMessage, MqttTransport, QoS};
use consultease_presence::{PersistenceHealth, PresenceEngine};
use consultease_router::{topics, MessageRouter, Route};
use std::env;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};

/// Process exit codes distinguishing failure classes (spec §6).
pub mod exit_codes {
    pub const CONFIGURATION: i32 = 2;
    pub const PERSISTENCE: i32 = 3;
    pub const TRANSPORT: i32 = 4;
}

/// Everything the running daemon needs to keep alive and tear down
/// cleanly on shutdown.
pub struct RunningDaemon {
    pub coordinator: Arc<SystemCoordinator>,
    pub fanout: Arc<SubscriberFanout>,
    background: Vec<tokio::task::JoinHandle<()>>,
}

impl RunningDaemon {
    pub async fn shutdown(self) {
        for handle in self.background {
            handle.abort();
        }
        self.coordinator.shutdown().await;
        info!("consultease-daemon shut down cleanly");
    }
}

fn mqtt_wildcard(pattern: &str) -> String {
    pattern
        .split('/')
        .map(|segment| if segment.starts_with('{') && segment.ends_with('}') { "+" } else { segment })
        .collect::<Vec<_>>()
        .join("/")
}

struct DbHealthService {
    shared: SharedPool,
}

#[async_trait]
impl Service for DbHealthService {
    fn name(&self) -> &str {
        "persistence"
    }
    async fn start(&self) -> anyhow::Result<()> {
        Ok(())
    }
    async fn stop(&self) {}
    async fn healthy(&self) -> bool {
        self.shared.current().await.ping().await.is_ok()
    }
}

struct MqttService {
    transport: Arc<MqttTransport>,
}

#[async_trait]
impl Service for MqttService {
    fn name(&self) -> &str {
        "mqtt"
    }
    async fn start(&self) -> anyhow::Result<()> {
        Ok(())
    }
    async fn stop(&self) {}
    async fn healthy(&self) -> bool {
        self.transport.is_connected()
    }
}

/// Builds and starts every component, and spawns the background loops
/// (health monitor, replay loop, expiry sweeper, inbound pump). Returns
/// as soon as the process is ready to serve, or an exit code identifying
/// which stage failed.
pub async fn run(config: Config) -> Result<RunningDaemon, i32> {
    let client = DbClient::connect(&config.db.url, None).await.map_err(|err| {
        error!("failed to connect to persistence layer: {err}");
        exit_codes::PERSISTENCE
    })?;
    let pool = DbPool::new(client, config.db.pool_size, config.db.max_overflow);
    info!("persistence layer connected");

    let shared_pool = SharedPool::new(pool.clone());
    let health_monitor = HealthMonitor::new(
        shared_pool.clone(),
        ConnectParams {
            url: config.db.url.clone(),
            access_token: None,
            pool_size: config.db.pool_size,
            max_overflow: config.db.max_overflow,
        },
        config.db.health_interval,
    );

    let cache = Arc::new(CacheCoordinator::new());
    info!("cache coordinator initialized");

    let subscriptions = vec![
        (mqtt_wildcard(topics::FACULTY_STATUS), QoS::AtLeastOnce),
        (mqtt_wildcard(topics::FACULTY_MAC_STATUS), QoS::AtLeastOnce),
        (mqtt_wildcard(topics::FACULTY_RESPONSES), QoS::AtLeastOnce),
        (mqtt_wildcard(topics::FACULTY_HEARTBEAT), QoS::AtMostOnce),
        (topics::LEGACY_PROFESSOR_STATUS.to_string(), QoS::AtMostOnce),
        (topics::LEGACY_PROFESSOR_MESSAGES.to_string(), QoS::AtLeastOnce),
    ];

    let client_id = format!("consultease-core-{}", std::process::id());
    let (transport, mut inbound_rx, outbound_handle, inbound_handle) = MqttTransport::connect(&config.mqtt, &client_id, subscriptions);
    let transport = Arc::new(transport);
    info!(broker = %config.mqtt.broker_host, "mqtt transport connecting");

    let health = PersistenceHealth::new_healthy();
    let presence = Arc::new(PresenceEngine::new(pool.clone(), cache.clone(), health.clone()));
    let consultation = Arc::new(ConsultationCoordinator::new(
        pool.clone(),
        transport.clone(),
        std::process::id() as u64,
        config.consultation.expiry,
    ));
    info!("presence engine and consultation coordinator initialized");

    let legacy_faculty_id = env::var("CONSULTEASE_LEGACY_FACULTY_ID").ok().and_then(|v| v.parse().ok());

    let mut router = MessageRouter::new();
    router.register(Route::new(
        "faculty-status",
        topics::FACULTY_STATUS,
        topics::TopicKind::FacultyStatus,
        Box::new(FacultyStatusHandler::new(presence.clone())),
    ));
    router.register(Route::new(
        "faculty-mac-status",
        topics::FACULTY_MAC_STATUS,
        topics::TopicKind::FacultyMacStatus,
        Box::new(FacultyMacStatusHandler::new(presence.clone())),
    ));
    router.register(Route::new(
        "faculty-heartbeat",
        topics::FACULTY_HEARTBEAT,
        topics::TopicKind::FacultyHeartbeat,
        Box::new(FacultyHeartbeatHandler::new(presence.clone())),
    ));
    router.register(Route::new(
        "faculty-responses",
        topics::FACULTY_RESPONSES,
        topics::TopicKind::FacultyResponses,
        Box::new(FacultyResponseHandler::new(consultation.clone())),
    ));
    router.register(
        Route::new(
            "legacy-professor-status",
            topics::LEGACY_PROFESSOR_STATUS,
            topics::TopicKind::FacultyStatus,
            Box::new(LegacyStatusHandler::new(presence.clone(), legacy_faculty_id)),
        )
        .without_json(),
    );
    router.register(Route::new(
        "legacy-professor-messages",
        topics::LEGACY_PROFESSOR_MESSAGES,
        topics::TopicKind::FacultyResponses,
        Box::new(LegacyMessagesHandler::new(consultation.clone())),
    ));
    let router = Arc::new(router);
    info!("message router wired with {} route(s)", 6);

    let fanout = Arc::new(SubscriberFanout::new());
    bridge_presence_and_consultation(fanout.clone(), &presence, &consultation);

    let entries = vec![
        ServiceEntry::new(DbHealthService { shared: shared_pool.clone() }, vec![]),
        ServiceEntry::new(MqttService { transport: transport.clone() }, vec!["persistence"]),
    ];
    let coordinator = Arc::new(
        SystemCoordinator::new(entries, config.service.restart_budget)
            .map_err(|err| {
                error!("failed to build service dependency graph: {err}");
                exit_codes::CONFIGURATION
            })?
            .with_presence_engine(presence.clone()),
    );
    coordinator.start_all().await.map_err(|err| {
        error!("service startup failed: {err}");
        exit_codes::TRANSPORT
    })?;
    info!("all services started");

    let mut background = Vec::new();
    background.push(tokio::spawn(health_monitor.run()));
    background.push(tokio::spawn({
        let coordinator = coordinator.clone();
        async move { coordinator.run_health_loop().await }
    }));
    background.push(tokio::spawn({
        let coordinator = coordinator.clone();
        async move { coordinator.run_replay_loop().await }
    }));
    background.push(tokio::spawn(run_expiry_sweep(consultation.clone(), config.consultation.sweep_interval)));
    background.push(tokio::spawn(async move {
        run_inbound_pump(router, &mut inbound_rx).await;
    }));
    background.push(outbound_handle);
    background.push(inbound_handle);

    Ok(RunningDaemon { coordinator, fanout, background })
}

async fn run_inbound_pump(router: Arc<MessageRouter>, inbound_rx: &mut mpsc::UnboundedReceiver<InboundMessage>) {
    while let Some(message) = inbound_rx.recv().await {
        if let Err(err) = router.dispatch(&message.topic, &message.payload).await {
            tracing::warn!("dropping message on '{}': {err}", message.topic);
        }
    }
}

async fn run_expiry_sweep(consultation: Arc<ConsultationCoordinator>, interval: std::time::Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        match consultation.expire_stale().await {
            Ok(count) if count > 0 => info!("expired {count} stale consultation(s)"),
            Ok(_) => {}
            Err(err) => error!("consultation expiry sweep failed: {err}"),
        }
    }
}
