//! MQTT transport for meshgate.
//!
//! Bridges a broker to a [`meshgate_core::Hub`]: inbound publications are
//! decoded by [`codec`] using the [`topics`] scheme and handed to
//! [`Hub::deliver`](meshgate_core::Hub::deliver); everything the hub queues
//! for publication is encoded and published with its delivery guarantee.
//! The core never sees topics or payload bytes.

pub mod codec;
pub mod config;
pub mod error;
pub mod topics;
pub mod transport;

pub use codec::{Publication, decode_inbound, encode_outbound};
pub use config::{BrokerConfig, ReconnectConfig, TlsMode};
pub use error::MqttError;
pub use topics::Topic;
pub use transport::{ConnectionState, MqttTransport};
