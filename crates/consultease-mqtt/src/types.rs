// [crates/consultease-mqtt/src/types.rs]
use rumqttc::QoS;

/// A message handed to the transport by a caller. `critical` messages
/// (presence updates, consultation responses) bypass batching (spec
/// §4.3 "Batching").
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QoS,
    pub retain: bool,
    pub critical: bool,
}
