// ── Transport error types ──
//
// Decode failures never reach the core: the transport logs and drops the
// message, and the waiting command sees a timeout.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MqttError {
    #[error("Unrecognized topic '{topic}': {reason}")]
    InvalidTopic { topic: String, reason: String },

    #[error("Malformed payload on '{topic}': {source}")]
    Decode {
        topic: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid hex payload on '{topic}': {source}")]
    Hex {
        topic: String,
        #[source]
        source: hex::FromHexError,
    },

    #[error("Failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("TLS setup failed: {message}")]
    Tls { message: String },

    #[error("MQTT client error: {0}")]
    Client(#[from] rumqttc::ClientError),
}

impl MqttError {
    pub(crate) fn invalid_topic(topic: &str, reason: impl Into<String>) -> Self {
        Self::InvalidTopic {
            topic: topic.to_owned(),
            reason: reason.into(),
        }
    }
}
