// ── Topic scheme ──
//
//   gw-event/status/<gw>
//   gw-event/received_data/<gw>/<sink>/<network>/<src_ep>/<dst_ep>
//   gw-response/<kind>/<gw>[/<sink>]
//   gw-request/<kind>/<gw>[/<sink>]

use std::fmt;
use std::str::FromStr;

use meshgate_core::{CorrelationKey, DeviceId, RequestKind};

use crate::error::MqttError;

pub const EVENT_PREFIX: &str = "gw-event";
pub const RESPONSE_PREFIX: &str = "gw-response";
pub const REQUEST_PREFIX: &str = "gw-request";

/// Filters the transport subscribes to on every (re)connect.
pub const SUBSCRIPTIONS: [&str; 2] = ["gw-event/#", "gw-response/#"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Topic {
    Status {
        gateway_id: DeviceId,
    },
    ReceivedData {
        gateway_id: DeviceId,
        sink_id: DeviceId,
        network_id: u32,
        source_endpoint: u8,
        destination_endpoint: u8,
    },
    Response(CorrelationKey),
    Request(CorrelationKey),
}

impl Topic {
    pub fn parse(topic: &str) -> Result<Self, MqttError> {
        let parts: Vec<&str> = topic.split('/').collect();
        match parts.as_slice() {
            [EVENT_PREFIX, "status", gw] => Ok(Self::Status {
                gateway_id: device(topic, gw)?,
            }),
            [EVENT_PREFIX, "received_data", gw, sink, network, src_ep, dst_ep] => {
                Ok(Self::ReceivedData {
                    gateway_id: device(topic, gw)?,
                    sink_id: device(topic, sink)?,
                    network_id: number(topic, "network id", network)?,
                    source_endpoint: number(topic, "source endpoint", src_ep)?,
                    destination_endpoint: number(topic, "destination endpoint", dst_ep)?,
                })
            }
            [RESPONSE_PREFIX, kind, rest @ ..] => Ok(Self::Response(key(topic, kind, rest)?)),
            [REQUEST_PREFIX, kind, rest @ ..] => Ok(Self::Request(key(topic, kind, rest)?)),
            _ => Err(MqttError::invalid_topic(topic, "unknown layout")),
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status { gateway_id } => write!(f, "{EVENT_PREFIX}/status/{gateway_id}"),
            Self::ReceivedData {
                gateway_id,
                sink_id,
                network_id,
                source_endpoint,
                destination_endpoint,
            } => write!(
                f,
                "{EVENT_PREFIX}/received_data/{gateway_id}/{sink_id}/{network_id}/{source_endpoint}/{destination_endpoint}"
            ),
            Self::Response(key) => write_key(f, RESPONSE_PREFIX, key),
            Self::Request(key) => write_key(f, REQUEST_PREFIX, key),
        }
    }
}

impl FromStr for Topic {
    type Err = MqttError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn write_key(f: &mut fmt::Formatter<'_>, prefix: &str, key: &CorrelationKey) -> fmt::Result {
    write!(f, "{prefix}/{}/{}", key.kind, key.gateway_id)?;
    if let Some(sink_id) = &key.sink_id {
        write!(f, "/{sink_id}")?;
    }
    Ok(())
}

fn key(topic: &str, kind: &str, rest: &[&str]) -> Result<CorrelationKey, MqttError> {
    let kind: RequestKind = kind
        .parse()
        .map_err(|_| MqttError::invalid_topic(topic, format!("unknown request kind '{kind}'")))?;
    match rest {
        [gw] => Ok(CorrelationKey::gateway(device(topic, gw)?, kind)),
        [gw, sink] => Ok(CorrelationKey::sink(
            device(topic, gw)?,
            device(topic, sink)?,
            kind,
        )),
        _ => Err(MqttError::invalid_topic(topic, "expected <gw> or <gw>/<sink>")),
    }
}

fn device(topic: &str, segment: &str) -> Result<DeviceId, MqttError> {
    let id = DeviceId::from(segment);
    if id.is_empty() {
        Err(MqttError::invalid_topic(topic, "empty device id"))
    } else {
        Ok(id)
    }
}

fn number<T: FromStr>(topic: &str, what: &str, segment: &str) -> Result<T, MqttError> {
    segment
        .parse()
        .map_err(|_| MqttError::invalid_topic(topic, format!("invalid {what} '{segment}'")))
}
