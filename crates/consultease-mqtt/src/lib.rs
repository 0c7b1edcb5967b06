// [crates/consultease-mqtt/src/lib.rs]
//! MQTT transport (spec §4.3): non-blocking publish, a background
//! publish/inbound worker pair, batching with a critical-message
//! bypass, bounded offline queueing, and reconnect-time subscription
//! replay. Built on `rumqttc`.

mod errors;
mod queue;
mod transport;
mod types;

pub use errors::MqttError;
pub use queue::OfflineQueue;
pub use rumqttc::QoS;
pub use transport::{InboundMessage, MqttTransport};
pub use types::OutboundMessage;
