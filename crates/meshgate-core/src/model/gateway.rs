// ── Gateway domain types ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::device_id::DeviceId;

/// Gateway connectivity as last reported on its status topic.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum GatewayState {
    Online,
    Offline,
    #[default]
    Unknown,
}

impl GatewayState {
    pub fn is_online(self) -> bool {
        matches!(self, Self::Online)
    }

    pub fn is_offline(self) -> bool {
        matches!(self, Self::Offline)
    }
}

/// A gateway bridging one or more sinks onto the broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gateway {
    pub device_id: DeviceId,
    pub state: GatewayState,
    pub last_seen: DateTime<Utc>,
}

impl Gateway {
    pub fn new(device_id: DeviceId, state: GatewayState) -> Self {
        Self {
            device_id,
            state,
            last_seen: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_parses_case_insensitively() {
        assert_eq!("online".parse::<GatewayState>().ok(), Some(GatewayState::Online));
        assert_eq!("OFFLINE".parse::<GatewayState>().ok(), Some(GatewayState::Offline));
        assert!("sleeping".parse::<GatewayState>().is_err());
    }

    #[test]
    fn state_displays_upper_case() {
        assert_eq!(GatewayState::Unknown.to_string(), "UNKNOWN");
    }
}
