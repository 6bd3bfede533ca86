// ── Inbound traffic ──
//
// What the transport hands to the core. The transport owns topic and
// payload decoding; by the time a message lands here it is fully typed
// and tagged with the ids the correlator and the shell filter on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::device_id::DeviceId;
use super::gateway::GatewayState;
use super::response::Response;

/// A data packet received by a sink and forwarded by its gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPacket {
    pub gateway_id: DeviceId,
    pub sink_id: DeviceId,
    pub network_id: u32,
    pub source_address: u32,
    pub destination_address: u32,
    pub source_endpoint: u8,
    pub destination_endpoint: u8,
    #[serde(with = "super::hex_bytes")]
    pub payload: Vec<u8>,
    pub qos: u8,
    pub travel_time_ms: u32,
    pub hop_count: u8,
    pub received_at: DateTime<Utc>,
}

/// Gateway state change published on the status topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayEvent {
    pub gateway_id: DeviceId,
    pub state: GatewayState,
    pub received_at: DateTime<Utc>,
}

/// Everything the transport may deliver into the hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Status(GatewayEvent),
    Data(DataPacket),
    Response(Response),
}

impl Inbound {
    pub fn gateway_id(&self) -> &DeviceId {
        match self {
            Self::Status(event) => &event.gateway_id,
            Self::Data(packet) => &packet.gateway_id,
            Self::Response(response) => &response.key.gateway_id,
        }
    }
}
