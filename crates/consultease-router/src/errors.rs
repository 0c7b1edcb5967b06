// [crates/consultease-router/src/errors.rs]
use thiserror::Error;

/// Router-level failures (spec §4.4). None of these are retried; a
/// rejected message is dropped and logged at the call site.
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("topic '{0}' is not on the allow-list")]
    TopicNotAllowed(String),

    #[error("payload of {actual} bytes exceeds the {limit} byte ceiling")]
    PayloadTooLarge { actual: usize, limit: usize },

    #[error("payload on topic '{topic}' is not valid JSON: {source}")]
    MalformedJson {
        topic: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("handler for route '{0}' failed: {1}")]
    HandlerFailed(String, String),

    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}
