// ── Domain model ──
//
// Canonical types shared by the registry, the correlator, the transport
// and the shell. Everything here is plain data: owned, cloneable and
// serializable so listings can be rendered as tables, JSON or YAML.

pub mod device_id;
pub mod gateway;
pub mod message;
pub mod network;
pub mod node;
pub mod response;
pub mod sink;

pub use device_id::DeviceId;
pub use gateway::{Gateway, GatewayState};
pub use message::{DataPacket, GatewayEvent, Inbound};
pub use network::Network;
pub use node::Node;
pub use response::{Response, ResponseBody, ResultCode, ScratchpadStatus};
pub use sink::{AppConfig, MAX_APP_CONFIG_LEN, Sink, SinkConfig};

/// Serde adapter rendering byte buffers as lowercase hex strings.
pub(crate) mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        hex::decode(text.trim()).map_err(serde::de::Error::custom)
    }
}
