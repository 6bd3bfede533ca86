// ── Typed request payloads ──
//
// Payload structs for the request kinds that carry more than a target.
// Each one validates itself before the correlator publishes it.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::model::AppConfig;

/// Highest hop limit a sink accepts; `0` means no limit.
pub const MAX_HOP_LIMIT: u8 = 15;

// ── Configuration ──────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetConfigRequest {
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

impl SetConfigRequest {
    pub fn is_empty(&self) -> bool {
        self.node_role.is_none()
            && self.node_address.is_none()
            && self.network_address.is_none()
            && self.network_channel.is_none()
            && self.started.is_none()
            && self.app_config.is_none()
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.is_empty() {
            return Err(CoreError::validation(
                "set_config needs at least one field to change",
            ));
        }
        if let Some(app_config) = &self.app_config {
            app_config.validate()?;
        }
        Ok(())
    }
}

// ── Data ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendDataRequest {
    pub source_endpoint: u8,
    pub destination_endpoint: u8,
    pub destination_address: u32,
    #[serde(with = "crate::model::hex_bytes")]
    pub payload: Vec<u8>,
    pub qos: u8,
    pub is_unack_csma_ca: bool,
    pub hop_limit: u8,
    pub initial_delay_ms: u32,
}

impl SendDataRequest {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.hop_limit > MAX_HOP_LIMIT {
            return Err(CoreError::validation(format!(
                "hop_limit must be at most {MAX_HOP_LIMIT}, got {}",
                self.hop_limit
            )));
        }
        if self.qos > 1 {
            return Err(CoreError::validation(format!(
                "qos must be 0 (normal) or 1 (high), got {}",
                self.qos
            )));
        }
        Ok(())
    }
}

// ── Scratchpad ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtapLoadRequest {
    pub sequence: u8,
    #[serde(with = "crate::model::hex_bytes")]
    pub scratchpad: Vec<u8>,
}

impl OtapLoadRequest {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.scratchpad.is_empty() {
            return Err(CoreError::validation("scratchpad image is empty"));
        }
        Ok(())
    }
}
