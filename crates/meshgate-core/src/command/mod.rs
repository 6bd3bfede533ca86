// ── Request envelope ──
//
// Every operation a gateway understands is a `Request` variant carrying
// only the fields that operation needs. The correlator stamps requests
// into `RequestEnvelope`s and the transport turns `Outbound` items into
// broker publications.

pub mod requests;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::model::DeviceId;

use self::requests::{OtapLoadRequest, SendDataRequest, SetConfigRequest};

// ── RequestKind ─────────────────────────────────────────────────────

/// Request kinds, displayed and serialized with their wire names.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::IntoStaticStr,
)]
pub enum RequestKind {
    #[serde(rename = "get_configs")]
    #[strum(serialize = "get_configs")]
    GetConfig,
    #[serde(rename = "set_config")]
    #[strum(serialize = "set_config")]
    SetConfig,
    #[serde(rename = "send_data")]
    #[strum(serialize = "send_data")]
    SendData,
    #[serde(rename = "otap_status")]
    #[strum(serialize = "otap_status")]
    OtapStatus,
    #[serde(rename = "otap_process_scratchpad")]
    #[strum(serialize = "otap_process_scratchpad")]
    OtapProcess,
    #[serde(rename = "otap_load_scratchpad")]
    #[strum(serialize = "otap_load_scratchpad")]
    OtapLoad,
}

impl RequestKind {
    /// Whether requests of this kind address a single sink.
    pub fn is_sink_scoped(self) -> bool {
        !matches!(self, Self::GetConfig)
    }
}

// ── CorrelationKey ──────────────────────────────────────────────────

/// Matches an outbound request to the response that answers it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationKey {
    pub gateway_id: DeviceId,
    pub sink_id: Option<DeviceId>,
    pub kind: RequestKind,
}

impl CorrelationKey {
    pub fn gateway(gateway_id: DeviceId, kind: RequestKind) -> Self {
        Self {
            gateway_id,
            sink_id: None,
            kind,
        }
    }

    pub fn sink(gateway_id: DeviceId, sink_id: DeviceId, kind: RequestKind) -> Self {
        Self {
            gateway_id,
            sink_id: Some(sink_id),
            kind,
        }
    }
}

impl fmt::Display for CorrelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.sink_id {
            Some(sink_id) => write!(f, "{}/{sink_id}/{}", self.gateway_id, self.kind),
            None => write!(f, "{}/{}", self.gateway_id, self.kind),
        }
    }
}

// ── Request ─────────────────────────────────────────────────────────

/// The sink a sink-scoped request is addressed to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SinkTarget {
    pub gateway_id: DeviceId,
    pub sink_id: DeviceId,
}

impl SinkTarget {
    pub fn new(gateway_id: impl Into<DeviceId>, sink_id: impl Into<DeviceId>) -> Self {
        Self {
            gateway_id: gateway_id.into(),
            sink_id: sink_id.into(),
        }
    }
}

/// A typed gateway request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Request {
    GetConfig {
        gateway_id: DeviceId,
    },
    SetConfig {
        target: SinkTarget,
        config: SetConfigRequest,
    },
    SendData {
        target: SinkTarget,
        data: SendDataRequest,
    },
    OtapStatus {
        target: SinkTarget,
    },
    OtapProcess {
        target: SinkTarget,
    },
    OtapLoad {
        target: SinkTarget,
        load: OtapLoadRequest,
    },
}

impl Request {
    pub fn kind(&self) -> RequestKind {
        match self {
            Self::GetConfig { .. } => RequestKind::GetConfig,
            Self::SetConfig { .. } => RequestKind::SetConfig,
            Self::SendData { .. } => RequestKind::SendData,
            Self::OtapStatus { .. } => RequestKind::OtapStatus,
            Self::OtapProcess { .. } => RequestKind::OtapProcess,
            Self::OtapLoad { .. } => RequestKind::OtapLoad,
        }
    }

    /// The sink addressed by this request, if it is sink-scoped.
    pub fn target(&self) -> Option<&SinkTarget> {
        match self {
            Self::GetConfig { .. } => None,
            Self::SetConfig { target, .. }
            | Self::SendData { target, .. }
            | Self::OtapStatus { target }
            | Self::OtapProcess { target }
            | Self::OtapLoad { target, .. } => Some(target),
        }
    }

    pub fn gateway_id(&self) -> &DeviceId {
        match self {
            Self::GetConfig { gateway_id } => gateway_id,
            Self::SetConfig { target, .. }
            | Self::SendData { target, .. }
            | Self::OtapStatus { target }
            | Self::OtapProcess { target }
            | Self::OtapLoad { target, .. } => &target.gateway_id,
        }
    }

    /// `GetConfig` is keyed by gateway; every other kind by gateway and sink.
    pub fn correlation_key(&self) -> CorrelationKey {
        match self.target() {
            Some(target) => CorrelationKey::sink(
                target.gateway_id.clone(),
                target.sink_id.clone(),
                self.kind(),
            ),
            None => CorrelationKey::gateway(self.gateway_id().clone(), self.kind()),
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.gateway_id().is_empty() {
            return Err(CoreError::validation("gateway id must not be empty"));
        }
        if let Some(target) = self.target() {
            if target.sink_id.is_empty() {
                return Err(CoreError::validation("sink id must not be empty"));
            }
        }
        match self {
            Self::SetConfig { config, .. } => config.validate(),
            Self::SendData { data, .. } => data.validate(),
            Self::OtapLoad { load, .. } => load.validate(),
            Self::GetConfig { .. } | Self::OtapStatus { .. } | Self::OtapProcess { .. } => Ok(()),
        }
    }

    /// Scratchpad processing and loading must reach the gateway exactly once.
    pub fn delivery(&self) -> Delivery {
        match self {
            Self::OtapProcess { .. } | Self::OtapLoad { .. } => Delivery::ExactlyOnce,
            _ => Delivery::AtLeastOnce,
        }
    }
}

// ── Outbound ────────────────────────────────────────────────────────

/// Delivery guarantee requested from the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Delivery {
    AtMostOnce,
    AtLeastOnce,
    ExactlyOnce,
}

/// A request stamped by the correlator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    pub req_id: u64,
    pub key: CorrelationKey,
    pub request: Request,
    pub issued_at: DateTime<Utc>,
}

/// Everything the hub asks the transport to publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Request(RequestEnvelope),
    /// Clears the retained status of a gateway that was removed.
    ClearStatus { gateway_id: DeviceId },
}

impl Outbound {
    pub fn delivery(&self) -> Delivery {
        match self {
            Self::Request(envelope) => envelope.request.delivery(),
            Self::ClearStatus { .. } => Delivery::AtLeastOnce,
        }
    }

    pub fn retain(&self) -> bool {
        matches!(self, Self::ClearStatus { .. })
    }

    pub fn gateway_id(&self) -> &DeviceId {
        match self {
            Self::Request(envelope) => envelope.request.gateway_id(),
            Self::ClearStatus { gateway_id } => gateway_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use strum::IntoEnumIterator;

    #[test]
    fn wire_names_round_trip_through_strum() {
        for kind in RequestKind::iter() {
            assert_eq!(kind.to_string().parse::<RequestKind>().ok(), Some(kind));
        }
        assert_eq!(RequestKind::OtapProcess.to_string(), "otap_process_scratchpad");
        assert_eq!(RequestKind::GetConfig.to_string(), "get_configs");
    }

    #[test]
    fn get_config_is_gateway_scoped() {
        let request = Request::GetConfig {
            gateway_id: "gw-1".into(),
        };
        let key = request.correlation_key();
        assert_eq!(key.sink_id, None);
        assert_eq!(key.to_string(), "gw-1/get_configs");
    }

    #[test]
    fn sink_requests_include_sink_in_key() {
        let request = Request::OtapStatus {
            target: SinkTarget::new("gw-1", "sink0"),
        };
        assert_eq!(request.correlation_key().to_string(), "gw-1/sink0/otap_status");
    }

    #[test]
    fn scratchpad_processing_is_exactly_once() {
        let target = SinkTarget::new("gw", "sink");
        assert_eq!(
            Request::OtapProcess {
                target: target.clone()
            }
            .delivery(),
            Delivery::ExactlyOnce
        );
        assert_eq!(Request::OtapStatus { target }.delivery(), Delivery::AtLeastOnce);
    }

    #[test]
    fn clear_status_is_retained() {
        let outbound = Outbound::ClearStatus {
            gateway_id: "gw".into(),
        };
        assert!(outbound.retain());
    }

    #[test]
    fn empty_sink_id_fails_validation() {
        let request = Request::OtapStatus {
            target: SinkTarget::new("gw", "  "),
        };
        assert!(matches!(request.validate(), Err(CoreError::Validation { .. })));
    }
}
