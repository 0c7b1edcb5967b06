// [crates/consultease-mqtt/src/transport.rs]
/*!
 * MQTT transport (spec §4.3). `publish` is non-blocking: it hands the
 * message to a channel and returns immediately. Two background tasks
 * do the actual work — one drains the outbound channel (batching
 * non-critical messages, bypassing critical ones, falling back to the
 * offline queue while disconnected), the other drives the `rumqttc`
 * event loop, replays subscriptions on every reconnect, and hands
 * incoming publishes to the caller's inbound channel.
 */

use crate::errors::MqttError;
use crate::queue::OfflineQueue;
use crate::types::OutboundMessage;
use consultease_config::MqttConfig;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, Publish, QoS};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

const MAX_BATCH_SIZE: usize = 10;
const BATCH_TIMEOUT: Duration = Duration::from_millis(100);
const MAX_BACKOFF: Duration = Duration::from_secs(60);
const INITIAL_BACKOFF: Duration = Duration::from_millis(500);

/// A message delivered to a subscriber of the inbound stream.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl From<Publish> for InboundMessage {
    fn from(p: Publish) -> Self {
        Self { topic: p.topic, payload: p.payload.to_vec() }
    }
}

#[derive(Clone)]
pub struct MqttTransport {
    client: AsyncClient,
    outbound_tx: mpsc::UnboundedSender<OutboundMessage>,
    connected: Arc<AtomicBool>,
    last_activity_epoch_secs: Arc<AtomicI64>,
}

impl MqttTransport {
    /// Connects to the broker and spawns the outbound/inbound worker
    /// tasks. Subscriptions are applied immediately and replayed on
    /// every reconnect (spec §4.3 "Subscriptions are declared at
    /// startup and re-applied on every reconnect").
    #[instrument(skip(config, subscriptions))]
    pub fn connect(
        config: &MqttConfig,
        client_id: &str,
        subscriptions: Vec<(String, QoS)>,
    ) -> (Self, mpsc::UnboundedReceiver<InboundMessage>, JoinHandle<()>, JoinHandle<()>) {
        let mut options = MqttOptions::new(client_id, config.broker_host.clone(), config.broker_port);
        options.set_keep_alive(Duration::from_secs(30));
        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            options.set_credentials(user.clone(), pass.clone());
        }

        let (client, eventloop) = AsyncClient::new(options, 256);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        let connected = Arc::new(AtomicBool::new(false));
        let last_activity_epoch_secs = Arc::new(AtomicI64::new(0));
        let offline_queue = Arc::new(Mutex::new(OfflineQueue::new()));

        let outbound_handle = tokio::spawn(run_outbound_worker(
            client.clone(),
            outbound_rx,
            connected.clone(),
            offline_queue.clone(),
        ));

        let inbound_handle = tokio::spawn(run_inbound_worker(
            client.clone(),
            eventloop,
            subscriptions,
            connected.clone(),
            last_activity_epoch_secs.clone(),
            offline_queue,
            inbound_tx,
        ));

        (
            Self { client, outbound_tx, connected, last_activity_epoch_secs },
            inbound_rx,
            outbound_handle,
            inbound_handle,
        )
    }

    /// Enqueues a message for delivery and returns immediately.
    pub fn publish(
        &self,
        topic: impl Into<String>,
        payload: Vec<u8>,
        qos: QoS,
        retain: bool,
        critical: bool,
    ) -> Result<(), MqttError> {
        let message = OutboundMessage { topic: topic.into(), payload, qos, retain, critical };
        self.outbound_tx.send(message).map_err(|_| MqttError::ShuttingDown)
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    pub fn last_activity_epoch_secs(&self) -> i64 {
        self.last_activity_epoch_secs.load(Ordering::Relaxed)
    }

    /// Stops the worker loop, disconnects the client, and drops every
    /// handle this transport held, so callers observing `connected ==
    /// false` afterward see no residual references (spec §4.3 "Safe
    /// shutdown").
    #[instrument(skip(self, outbound_handle, inbound_handle))]
    pub async fn shutdown(self, outbound_handle: JoinHandle<()>, inbound_handle: JoinHandle<()>) {
        outbound_handle.abort();
        inbound_handle.abort();
        if let Err(err) = self.client.disconnect().await {
            warn!("disconnect request failed: {err}");
        }
        self.connected.store(false, Ordering::Relaxed);
        info!("mqtt transport shut down");
    }
}

#[instrument(skip(client, rx, connected, offline_queue))]
async fn run_outbound_worker(
    client: AsyncClient,
    mut rx: mpsc::UnboundedReceiver<OutboundMessage>,
    connected: Arc<AtomicBool>,
    offline_queue: Arc<Mutex<OfflineQueue>>,
) {
    let mut batch: Vec<OutboundMessage> = Vec::with_capacity(MAX_BATCH_SIZE);

    loop {
        let deadline = tokio::time::sleep(BATCH_TIMEOUT);
        tokio::pin!(deadline);

        tokio::select! {
            received = rx.recv() => {
                match received {
                    Some(message) if message.critical => {
                        deliver_or_queue(&client, &connected, &offline_queue, message).await;
                    }
                    Some(message) => {
                        batch.push(message);
                        if batch.len() >= MAX_BATCH_SIZE {
                            flush_batch(&client, &connected, &offline_queue, &mut batch).await;
                        }
                    }
                    None => {
                        flush_batch(&client, &connected, &offline_queue, &mut batch).await;
                        debug!("outbound channel closed, worker exiting");
                        return;
                    }
                }
            }
            _ = &mut deadline => {
                flush_batch(&client, &connected, &offline_queue, &mut batch).await;
            }
        }
    }
}

async fn flush_batch(
    client: &AsyncClient,
    connected: &Arc<AtomicBool>,
    offline_queue: &Arc<Mutex<OfflineQueue>>,
    batch: &mut Vec<OutboundMessage>,
) {
    for message in batch.drain(..) {
        deliver_or_queue(client, connected, offline_queue, message).await;
    }
}

async fn deliver_or_queue(
    client: &AsyncClient,
    connected: &Arc<AtomicBool>,
    offline_queue: &Arc<Mutex<OfflineQueue>>,
    message: OutboundMessage,
) {
    if !connected.load(Ordering::Relaxed) {
        offline_queue.lock().await.push(message);
        return;
    }

    if let Err(err) = client
        .publish(&message.topic, message.qos, message.retain, message.payload.clone())
        .await
    {
        warn!("publish to '{}' failed, queueing for retry: {err}", message.topic);
        offline_queue.lock().await.push(message);
    }
}

#[allow(clippy::too_many_arguments)]
#[instrument(skip(client, eventloop, subscriptions, connected, last_activity_epoch_secs, offline_queue, inbound_tx))]
async fn run_inbound_worker(
    client: AsyncClient,
    mut eventloop: rumqttc::EventLoop,
    subscriptions: Vec<(String, QoS)>,
    connected: Arc<AtomicBool>,
    last_activity_epoch_secs: Arc<AtomicI64>,
    offline_queue: Arc<Mutex<OfflineQueue>>,
    inbound_tx: mpsc::UnboundedSender<InboundMessage>,
) {
    let mut backoff = INITIAL_BACKOFF;

    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!("mqtt connection established, replaying {} subscription(s)", subscriptions.len());
                for (topic, qos) in &subscriptions {
                    if let Err(err) = client.subscribe(topic, *qos).await {
                        error!("failed to (re)subscribe to '{topic}': {err}");
                    }
                }
                connected.store(true, Ordering::Relaxed);
                backoff = INITIAL_BACKOFF;
                touch_activity(&last_activity_epoch_secs);
                drain_offline_queue(&client, &offline_queue).await;
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                touch_activity(&last_activity_epoch_secs);
                if inbound_tx.send(publish.into()).is_err() {
                    debug!("inbound receiver dropped, discarding message");
                }
            }
            Ok(_) => {
                touch_activity(&last_activity_epoch_secs);
            }
            Err(err) => {
                if connected.swap(false, Ordering::Relaxed) {
                    warn!("mqtt connection lost: {err}");
                }
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(MAX_BACKOFF);
            }
        }
    }
}

async fn drain_offline_queue(client: &AsyncClient, offline_queue: &Arc<Mutex<OfflineQueue>>) {
    loop {
        let entry = {
            let mut queue = offline_queue.lock().await;
            queue.pop_front()
        };
        let Some(entry) = entry else { return };

        let message = entry.message.clone();
        if let Err(err) = client
            .publish(&message.topic, message.qos, message.retain, message.payload.clone())
            .await
        {
            warn!("offline queue replay failed for '{}': {err}", message.topic);
            offline_queue.lock().await.requeue_or_drop(entry);
            return;
        }
    }
}

fn touch_activity(last_activity_epoch_secs: &Arc<AtomicI64>) {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);
    last_activity_epoch_secs.store(now, Ordering::Relaxed);
}
