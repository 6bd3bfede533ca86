// ── Sink domain types ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::device_id::DeviceId;
use crate::error::CoreError;

/// Largest application configuration blob a sink accepts.
pub const MAX_APP_CONFIG_LEN: usize = 80;

/// Application configuration distributed by a sink to its network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    pub sequence: u8,
    #[serde(with = "super::hex_bytes")]
    pub data: Vec<u8>,
    pub diagnostic_interval_secs: u16,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.data.len() > MAX_APP_CONFIG_LEN {
            return Err(CoreError::validation(format!(
                "app config data is {} bytes, at most {MAX_APP_CONFIG_LEN} allowed",
                self.data.len()
            )));
        }
        Ok(())
    }
}

/// Configuration block reported by `get_configs` and `set_config` responses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkConfig {
    pub sink_id: DeviceId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_role: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_address: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_address: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_channel: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_config: Option<AppConfig>,
}

/// A radio sink attached to a gateway.
///
/// `gateway_id` is a back-reference: the registry guarantees the gateway
/// exists for every sink it stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sink {
    pub device_id: DeviceId,
    pub gateway_id: DeviceId,
    /// `None` until a configuration reports a network address, and for
    /// ids typed by an operator that have not been seen on the wire yet.
    pub network_id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<SinkConfig>,
    pub updated_at: DateTime<Utc>,
}

impl Sink {
    pub fn new(device_id: DeviceId, gateway_id: DeviceId, network_id: Option<u32>) -> Self {
        Self {
            device_id,
            gateway_id,
            network_id,
            config: None,
            updated_at: Utc::now(),
        }
    }

    /// Registry key: sink ids such as `sink0` repeat across gateways.
    pub fn key(&self) -> String {
        sink_key(&self.gateway_id, &self.device_id)
    }
}

pub(crate) fn sink_key(gateway_id: &DeviceId, sink_id: &DeviceId) -> String {
    format!("{gateway_id}/{sink_id}")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn app_config_rejects_oversized_data() {
        let config = AppConfig {
            sequence: 1,
            data: vec![0; MAX_APP_CONFIG_LEN + 1],
            diagnostic_interval_secs: 60,
        };
        assert!(matches!(config.validate(), Err(CoreError::Validation { .. })));
    }

    #[test]
    fn app_config_data_serializes_as_hex() {
        let config = AppConfig {
            sequence: 2,
            data: vec![0x00, 0x11, 0xaa],
            diagnostic_interval_secs: 60,
        };
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["data"], "0011aa");
    }

    #[test]
    fn default_config_has_an_empty_sink_id() {
        let config = SinkConfig::default();
        assert!(config.sink_id.is_empty());
        assert_eq!(config.network_address, None);
    }

    #[test]
    fn key_combines_gateway_and_sink() {
        let sink = Sink::new("sink0".into(), "gw-1".into(), Some(7));
        assert_eq!(sink.key(), "gw-1/sink0");
    }
}
