// ── Network view ──

use serde::{Deserialize, Serialize};

use super::device_id::DeviceId;
use super::sink::Sink;

/// Sinks sharing a network id. Derived from the registry on demand,
/// never stored on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    pub network_id: u32,
    pub sinks: Vec<Sink>,
}

impl Network {
    /// Distinct gateways carrying this network, sorted.
    pub fn gateway_ids(&self) -> Vec<DeviceId> {
        let mut ids: Vec<DeviceId> = self.sinks.iter().map(|s| s.gateway_id.clone()).collect();
        ids.sort();
        ids.dedup();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_ids_are_distinct() {
        let network = Network {
            network_id: 5,
            sinks: vec![
                Sink::new("sink1".into(), "gw-b".into(), Some(5)),
                Sink::new("sink0".into(), "gw-a".into(), Some(5)),
                Sink::new("sink0".into(), "gw-b".into(), Some(5)),
            ],
        };
        assert_eq!(
            network.gateway_ids(),
            vec![DeviceId::from("gw-a"), DeviceId::from("gw-b")]
        );
    }
}
