// ── Responses ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::sink::SinkConfig;
use crate::command::CorrelationKey;

/// Result code carried by every gateway response.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ResultCode {
    Ok,
    InternalError,
    InvalidSinkId,
    InvalidParameter,
    InvalidSinkState,
    InvalidScratchpad,
    AccessDenied,
    Other,
}

impl ResultCode {
    pub fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Parse a wire result, mapping anything unrecognized to `Other`.
    pub fn from_wire(value: &str) -> Self {
        value.trim().parse().unwrap_or(Self::Other)
    }
}

/// Scratchpad (over-the-air image) status of a sink.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScratchpadStatus {
    pub stored_seq: Option<u8>,
    pub stored_len: Option<u32>,
    pub stored_crc: Option<u16>,
    pub stored_status: Option<u8>,
    pub processed_seq: Option<u8>,
    pub processed_len: Option<u32>,
    pub processed_crc: Option<u16>,
    pub firmware_area_id: Option<u32>,
}

/// Kind-specific part of a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResponseBody {
    Configs { configs: Vec<SinkConfig> },
    SetConfig { config: Option<SinkConfig> },
    SendData,
    OtapStatus(ScratchpadStatus),
    OtapProcess,
    OtapLoad,
}

/// A gateway response, keyed exactly like the request it answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub key: CorrelationKey,
    pub req_id: Option<u64>,
    pub result: ResultCode,
    pub body: ResponseBody,
    pub received_at: DateTime<Utc>,
}

impl Response {
    pub fn new(key: CorrelationKey, result: ResultCode, body: ResponseBody) -> Self {
        Self {
            key,
            req_id: None,
            result,
            body,
            received_at: Utc::now(),
        }
    }

    pub fn with_req_id(mut self, req_id: u64) -> Self {
        self.req_id = Some(req_id);
        self
    }
}
