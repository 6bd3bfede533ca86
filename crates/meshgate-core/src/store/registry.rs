// ── Device registry ──
//
// Gateways, sinks and nodes discovered from live traffic. Reads go straight to
// the collections and hand back owned copies; mutations are serialized
// by a single write lock so a sink is never inserted for a gateway that
// is concurrently being removed.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tokio::sync::watch;
use tracing::debug;

use super::collection::EntityCollection;
use crate::error::CoreError;
use crate::model::node::node_key;
use crate::model::sink::sink_key;
use crate::model::{DataPacket, DeviceId, Gateway, GatewayState, Network, Node, Sink, SinkConfig};

/// Registry of known gateways and sinks.
///
/// Orphan sinks are rejected rather than given a placeholder gateway:
/// traffic-driven discovery always touches the gateway first, so only
/// callers inserting sinks by hand can hit [`CoreError::OrphanSink`].
pub struct DeviceRegistry {
    gateways: EntityCollection<Gateway>,
    sinks: EntityCollection<Sink>,
    nodes: EntityCollection<Node>,
    /// Serializes mutations across both collections.
    write: Mutex<()>,
    /// Bumped after every gateway or sink mutation. Node sightings do not
    /// count: they arrive with every data packet.
    version: watch::Sender<u64>,
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceRegistry {
    pub fn new() -> Self {
        let (version, _) = watch::channel(0);
        Self {
            gateways: EntityCollection::new(),
            sinks: EntityCollection::new(),
            nodes: EntityCollection::new(),
            write: Mutex::new(()),
            version,
        }
    }

    // ── Mutations ────────────────────────────────────────────────────

    /// Insert a gateway or update its state. Never fails.
    pub fn upsert_gateway(&self, id: DeviceId, state: GatewayState) -> Gateway {
        let _write = self.lock();
        let gateway = Gateway::new(id, state);
        if self
            .gateways
            .upsert(gateway.device_id.to_string(), gateway.clone())
        {
            debug!(gateway = %gateway.device_id, %state, "gateway discovered");
        }
        self.bump();
        gateway
    }

    /// Record activity from a gateway without changing its state.
    /// Unknown gateways are created in `UNKNOWN` state.
    pub fn touch_gateway(&self, id: DeviceId) -> Gateway {
        let _write = self.lock();
        let state = self
            .gateways
            .get(id.as_str())
            .map_or(GatewayState::Unknown, |existing| existing.state);
        let gateway = Gateway::new(id, state);
        if self
            .gateways
            .upsert(gateway.device_id.to_string(), gateway.clone())
        {
            debug!(gateway = %gateway.device_id, "gateway discovered from traffic");
        }
        self.bump();
        gateway
    }

    /// Insert or update a sink. Keeps any configuration already known.
    pub fn upsert_sink(
        &self,
        id: DeviceId,
        gateway_id: DeviceId,
        network_id: u32,
    ) -> Result<Sink, CoreError> {
        let _write = self.lock();
        self.ensure_gateway(&id, &gateway_id)?;

        let key = sink_key(&gateway_id, &id);
        let mut sink = self
            .sinks
            .get(&key)
            .map_or_else(|| Sink::new(id, gateway_id, None), |s| (*s).clone());
        sink.network_id = Some(network_id);
        sink.updated_at = Utc::now();

        self.sinks.upsert(key, sink.clone());
        self.bump();
        Ok(sink)
    }

    /// Store a configuration reported by `gateway_id`, creating the sink
    /// if needed. The network id follows the configured network address;
    /// a config without one keeps whatever was known before, if anything.
    pub fn apply_sink_config(
        &self,
        gateway_id: &DeviceId,
        config: SinkConfig,
    ) -> Result<Sink, CoreError> {
        let _write = self.lock();
        self.ensure_gateway(&config.sink_id, gateway_id)?;

        let key = sink_key(gateway_id, &config.sink_id);
        let existing = self.sinks.get(&key);
        let network_id = config
            .network_address
            .or_else(|| existing.as_ref().and_then(|s| s.network_id));

        let mut sink = existing.map_or_else(
            || Sink::new(config.sink_id.clone(), gateway_id.clone(), None),
            |s| (*s).clone(),
        );
        sink.network_id = network_id;
        sink.updated_at = Utc::now();
        sink.config = Some(config);

        self.sinks.upsert(key, sink.clone());
        self.bump();
        Ok(sink)
    }

    /// Note the source of an uplink packet. Returns the updated node.
    pub fn record_node(&self, packet: &DataPacket) -> Node {
        let _write = self.lock();
        let key = node_key(packet.network_id, packet.source_address);
        let node = match self.nodes.get(&key) {
            Some(known) => {
                let mut node = (*known).clone();
                node.heard(packet);
                node
            }
            None => {
                debug!(
                    network = packet.network_id,
                    address = packet.source_address,
                    "node discovered"
                );
                Node::from_packet(packet)
            }
        };
        self.nodes.upsert(key, node.clone());
        node
    }

    /// Remove a gateway, every sink attached to it and the nodes last
    /// heard through it. Absent ids are a no-op.
    pub fn remove_gateway(&self, id: &DeviceId) -> Option<Gateway> {
        let _write = self.lock();
        let removed = self.gateways.remove(id.as_str())?;
        let sinks = self.sinks.remove_where(|sink| sink.gateway_id == *id);
        let nodes = self.nodes.remove_where(|node| node.gateway_id == *id);
        debug!(gateway = %id, sinks = sinks.len(), nodes = nodes.len(), "gateway removed");
        self.bump();
        Some((*removed).clone())
    }

    // ── Lookups ──────────────────────────────────────────────────────

    pub fn gateway(&self, id: &DeviceId) -> Option<Gateway> {
        self.gateways.get(id.as_str()).map(|g| (*g).clone())
    }

    pub fn sink(&self, gateway_id: &DeviceId, sink_id: &DeviceId) -> Option<Sink> {
        self.sinks
            .get(&sink_key(gateway_id, sink_id))
            .map(|s| (*s).clone())
    }

    /// Sinks attached to one gateway, sorted by id.
    pub fn sinks_of(&self, gateway_id: &DeviceId) -> Vec<Sink> {
        let mut sinks: Vec<Sink> = self
            .sinks
            .snapshot()
            .iter()
            .filter(|s| s.gateway_id == *gateway_id)
            .map(|s| (**s).clone())
            .collect();
        sinks.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        sinks
    }

    pub fn offline_gateways(&self) -> Vec<Gateway> {
        self.list_gateways()
            .into_iter()
            .filter(|g| g.state.is_offline())
            .collect()
    }

    // ── Listings (owned snapshots) ───────────────────────────────────

    /// All gateways, sorted by id.
    pub fn list_gateways(&self) -> Vec<Gateway> {
        let mut gateways: Vec<Gateway> =
            self.gateways.snapshot().iter().map(|g| (**g).clone()).collect();
        gateways.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        gateways
    }

    /// All sinks, sorted by gateway then sink id.
    pub fn list_sinks(&self) -> Vec<Sink> {
        let mut sinks: Vec<Sink> = self.sinks.snapshot().iter().map(|s| (**s).clone()).collect();
        sinks.sort_by(|a, b| {
            a.gateway_id
                .cmp(&b.gateway_id)
                .then_with(|| a.device_id.cmp(&b.device_id))
        });
        sinks
    }

    /// Sinks grouped by network id, ascending.
    pub fn list_networks(&self) -> Vec<Network> {
        let mut grouped: BTreeMap<u32, Vec<Sink>> = BTreeMap::new();
        for sink in self.list_sinks() {
            if let Some(network_id) = sink.network_id {
                grouped.entry(network_id).or_default().push(sink);
            }
        }
        grouped
            .into_iter()
            .map(|(network_id, sinks)| Network { network_id, sinks })
            .collect()
    }

    /// Nodes heard so far, sorted by network then address.
    pub fn list_nodes(&self) -> Vec<Node> {
        let mut nodes: Vec<Node> = self.nodes.snapshot().iter().map(|n| (**n).clone()).collect();
        nodes.sort_by_key(|n| (n.network_id, n.address));
        nodes
    }

    // ── Change tracking ──────────────────────────────────────────────

    /// Monotonic counter bumped on every mutation.
    pub fn version(&self) -> u64 {
        *self.version.borrow()
    }

    /// Subscribe to the mutation counter.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.write.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_gateway(&self, sink_id: &DeviceId, gateway_id: &DeviceId) -> Result<(), CoreError> {
        if self.gateways.contains(gateway_id.as_str()) {
            Ok(())
        } else {
            Err(CoreError::OrphanSink {
                sink_id: sink_id.to_string(),
                gateway_id: gateway_id.to_string(),
            })
        }
    }

    fn bump(&self) {
        self.version.send_modify(|v| *v += 1);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn id(s: &str) -> DeviceId {
        DeviceId::from(s)
    }

    fn packet(gateway: &str, network_id: u32, source_address: u32) -> DataPacket {
        DataPacket {
            gateway_id: id(gateway),
            sink_id: id("sink0"),
            network_id,
            source_address,
            destination_address: 1,
            source_endpoint: 10,
            destination_endpoint: 11,
            payload: vec![1],
            qos: 1,
            travel_time_ms: 5,
            hop_count: 1,
            received_at: Utc::now(),
        }
    }

    #[test]
    fn upsert_gateway_updates_state() {
        let registry = DeviceRegistry::new();
        registry.upsert_gateway(id("gw"), GatewayState::Online);
        registry.upsert_gateway(id("gw"), GatewayState::Offline);

        let gateways = registry.list_gateways();
        assert_eq!(gateways.len(), 1);
        assert_eq!(gateways[0].state, GatewayState::Offline);
    }

    #[test]
    fn touch_keeps_known_state() {
        let registry = DeviceRegistry::new();
        registry.upsert_gateway(id("gw"), GatewayState::Online);
        assert_eq!(registry.touch_gateway(id("gw")).state, GatewayState::Online);
        assert_eq!(registry.touch_gateway(id("new")).state, GatewayState::Unknown);
    }

    #[test]
    fn orphan_sink_is_rejected_without_partial_insert() {
        let registry = DeviceRegistry::new();
        let before = registry.version();

        let err = registry
            .upsert_sink(id("SINK2"), id("GW_UNKNOWN"), 1)
            .unwrap_err();
        assert!(matches!(err, CoreError::OrphanSink { .. }));
        assert!(registry.list_sinks().is_empty());
        assert!(registry.list_gateways().is_empty());
        assert_eq!(registry.version(), before);
    }

    #[test]
    fn same_sink_id_on_two_gateways() {
        let registry = DeviceRegistry::new();
        registry.upsert_gateway(id("gw-a"), GatewayState::Online);
        registry.upsert_gateway(id("gw-b"), GatewayState::Online);
        registry.upsert_sink(id("sink0"), id("gw-a"), 1).unwrap();
        registry.upsert_sink(id("sink0"), id("gw-b"), 2).unwrap();

        assert_eq!(registry.list_sinks().len(), 2);
        assert_eq!(registry.list_networks().len(), 2);
    }

    #[test]
    fn remove_gateway_cascades_to_sinks() {
        let registry = DeviceRegistry::new();
        registry.upsert_gateway(id("gw-a"), GatewayState::Online);
        registry.upsert_gateway(id("gw-b"), GatewayState::Online);
        registry.upsert_sink(id("sink0"), id("gw-a"), 1).unwrap();
        registry.upsert_sink(id("sink1"), id("gw-a"), 1).unwrap();
        registry.upsert_sink(id("sink0"), id("gw-b"), 1).unwrap();

        assert!(registry.remove_gateway(&id("gw-a")).is_some());
        assert!(registry.remove_gateway(&id("gw-a")).is_none());

        let sinks = registry.list_sinks();
        assert_eq!(sinks.len(), 1);
        assert_eq!(sinks[0].gateway_id, id("gw-b"));
    }

    #[test]
    fn upsert_keeps_reported_config() {
        let registry = DeviceRegistry::new();
        registry.upsert_gateway(id("gw"), GatewayState::Online);
        let config = SinkConfig {
            sink_id: id("sink0"),
            network_address: Some(0x00AB_CDEF),
            started: Some(true),
            ..SinkConfig::default()
        };
        registry.apply_sink_config(&id("gw"), config).unwrap();

        let sink = registry.upsert_sink(id("sink0"), id("gw"), 0x00AB_CDEF).unwrap();
        assert_eq!(sink.network_id, Some(0x00AB_CDEF));
        assert_eq!(sink.config.and_then(|c| c.started), Some(true));
    }

    #[test]
    fn config_without_network_address_has_no_network() {
        let registry = DeviceRegistry::new();
        registry.upsert_gateway(id("gw"), GatewayState::Online);
        let config = SinkConfig {
            sink_id: id("sink0"),
            node_address: Some(1),
            ..SinkConfig::default()
        };
        let sink = registry.apply_sink_config(&id("gw"), config.clone()).unwrap();
        assert_eq!(sink.network_id, None);
        assert!(registry.list_networks().is_empty());

        // A known network survives a later config that omits it.
        registry.upsert_sink(id("sink0"), id("gw"), 7).unwrap();
        let sink = registry.apply_sink_config(&id("gw"), config).unwrap();
        assert_eq!(sink.network_id, Some(7));
    }

    #[test]
    fn nodes_follow_the_latest_route() {
        let registry = DeviceRegistry::new();
        registry.upsert_gateway(id("gw-a"), GatewayState::Online);
        registry.upsert_gateway(id("gw-b"), GatewayState::Online);
        let before = registry.version();

        registry.record_node(&packet("gw-a", 100, 12));
        registry.record_node(&packet("gw-a", 100, 40));
        let node = registry.record_node(&packet("gw-b", 100, 12));
        assert_eq!(node.packets, 2);
        assert_eq!(node.gateway_id, id("gw-b"));
        assert_eq!(registry.version(), before);

        let addresses: Vec<u32> = registry.list_nodes().iter().map(|n| n.address).collect();
        assert_eq!(addresses, vec![12, 40]);

        registry.remove_gateway(&id("gw-a"));
        let nodes = registry.list_nodes();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].address, 12);
    }

    #[test]
    fn listings_are_copies() {
        let registry = DeviceRegistry::new();
        registry.upsert_gateway(id("gw"), GatewayState::Online);
        let mut gateways = registry.list_gateways();
        gateways[0].state = GatewayState::Offline;
        assert_eq!(registry.gateway(&id("gw")).unwrap().state, GatewayState::Online);
    }

    #[test]
    fn offline_gateways_filters_state() {
        let registry = DeviceRegistry::new();
        registry.upsert_gateway(id("up"), GatewayState::Online);
        registry.upsert_gateway(id("down"), GatewayState::Offline);
        let offline = registry.offline_gateways();
        assert_eq!(offline.len(), 1);
        assert_eq!(offline[0].device_id, id("down"));
    }
}
