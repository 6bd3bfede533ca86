// ── Node view ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::device_id::DeviceId;
use super::message::DataPacket;

/// A mesh node heard through uplink data traffic.
///
/// Nodes are identified by `(network_id, address)`; the gateway and sink
/// are the route of the most recent packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub network_id: u32,
    pub address: u32,
    pub gateway_id: DeviceId,
    pub sink_id: DeviceId,
    pub packets: u64,
    pub last_seen: DateTime<Utc>,
}

impl Node {
    /// First sighting of the packet's source.
    pub fn from_packet(packet: &DataPacket) -> Self {
        Self {
            network_id: packet.network_id,
            address: packet.source_address,
            gateway_id: packet.gateway_id.clone(),
            sink_id: packet.sink_id.clone(),
            packets: 1,
            last_seen: packet.received_at,
        }
    }

    /// Fold a later packet from the same source into this record.
    pub fn heard(&mut self, packet: &DataPacket) {
        self.gateway_id.clone_from(&packet.gateway_id);
        self.sink_id.clone_from(&packet.sink_id);
        self.packets += 1;
        self.last_seen = self.last_seen.max(packet.received_at);
    }

    pub fn key(&self) -> String {
        node_key(self.network_id, self.address)
    }
}

pub(crate) fn node_key(network_id: u32, address: u32) -> String {
    format!("{network_id}/{address}")
}
