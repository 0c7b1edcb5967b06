// [crates/consultease-mqtt/src/errors.rs]
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MqttError {
    #[error("mqtt client rejected the request: {0}")]
    ClientRejected(#[from] rumqttc::ClientError),

    #[error("payload exceeded the transport's {0} byte ceiling")]
    PayloadTooLarge(usize),

    #[error("transport is shutting down")]
    ShuttingDown,
}
