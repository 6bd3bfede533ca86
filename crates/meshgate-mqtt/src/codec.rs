// ── JSON wire codec ──
//
// Translates between broker publications and the core's typed messages.
// Byte fields travel as hex strings. Ids come from the topic, never from
// the payload, so a payload cannot claim to be from another gateway.

use chrono::{DateTime, TimeZone, Utc};
use meshgate_core::{
    DataPacket, Delivery, GatewayEvent, GatewayState, Inbound, Outbound, Request, RequestKind,
    Response, ResponseBody, ResultCode, ScratchpadStatus, SinkConfig,
};
use rumqttc::QoS;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::MqttError;
use crate::topics::Topic;

/// A message ready for `AsyncClient::publish`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publication {
    pub topic: String,
    pub qos: QoS,
    pub retain: bool,
    pub payload: Vec<u8>,
}

// ── Wire payloads ───────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct StatusWire {
    state: String,
}

#[derive(Debug, Deserialize)]
struct ReceivedDataWire {
    source_address: u32,
    destination_address: u32,
    payload: String,
    #[serde(default)]
    qos: u8,
    #[serde(default)]
    travel_time_ms: u32,
    #[serde(default)]
    hop_count: u8,
    #[serde(default)]
    rx_time_ms_epoch: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ResponseWire {
    #[serde(default)]
    req_id: Option<u64>,
    res: String,
    #[serde(default)]
    configs: Vec<SinkConfig>,
    #[serde(default)]
    config: Option<SinkConfig>,
    #[serde(flatten)]
    scratchpad: ScratchpadStatus,
}

// ── Decoding ────────────────────────────────────────────────────────

/// Decode one inbound publication.
///
/// Returns `Ok(None)` for publications the core has no use for: our own
/// requests echoed back, and empty retained status messages (a cleared
/// gateway).
pub fn decode_inbound(topic: &str, payload: &[u8]) -> Result<Option<Inbound>, MqttError> {
    match Topic::parse(topic)? {
        Topic::Status { gateway_id } => {
            if payload.is_empty() {
                return Ok(None);
            }
            let wire: StatusWire = parse(topic, payload)?;
            Ok(Some(Inbound::Status(GatewayEvent {
                gateway_id,
                state: wire.state.parse().unwrap_or(GatewayState::Unknown),
                received_at: Utc::now(),
            })))
        }
        Topic::ReceivedData {
            gateway_id,
            sink_id,
            network_id,
            source_endpoint,
            destination_endpoint,
        } => {
            let wire: ReceivedDataWire = parse(topic, payload)?;
            let data = hex::decode(wire.payload.trim()).map_err(|source| MqttError::Hex {
                topic: topic.to_owned(),
                source,
            })?;
            Ok(Some(Inbound::Data(DataPacket {
                gateway_id,
                sink_id,
                network_id,
                source_address: wire.source_address,
                destination_address: wire.destination_address,
                source_endpoint,
                destination_endpoint,
                payload: data,
                qos: wire.qos,
                travel_time_ms: wire.travel_time_ms,
                hop_count: wire.hop_count,
                received_at: wire
                    .rx_time_ms_epoch
                    .and_then(from_epoch_ms)
                    .unwrap_or_else(Utc::now),
            })))
        }
        Topic::Response(key) => {
            let wire: ResponseWire = parse(topic, payload)?;
            let body = match key.kind {
                RequestKind::GetConfig => ResponseBody::Configs {
                    configs: wire.configs,
                },
                RequestKind::SetConfig => ResponseBody::SetConfig {
                    config: wire.config,
                },
                RequestKind::SendData => ResponseBody::SendData,
                RequestKind::OtapStatus => ResponseBody::OtapStatus(wire.scratchpad),
                RequestKind::OtapProcess => ResponseBody::OtapProcess,
                RequestKind::OtapLoad => ResponseBody::OtapLoad,
            };
            Ok(Some(Inbound::Response(Response {
                key,
                req_id: wire.req_id,
                result: ResultCode::from_wire(&wire.res),
                body,
                received_at: Utc::now(),
            })))
        }
        Topic::Request(_) => Ok(None),
    }
}

fn parse<'a, T: Deserialize<'a>>(topic: &str, payload: &'a [u8]) -> Result<T, MqttError> {
    serde_json::from_slice(payload).map_err(|source| MqttError::Decode {
        topic: topic.to_owned(),
        source,
    })
}

fn from_epoch_ms(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}

// ── Encoding ────────────────────────────────────────────────────────

/// Encode an outbound message into a publication.
pub fn encode_outbound(outbound: &Outbound) -> Result<Publication, MqttError> {
    let qos = qos(outbound.delivery());
    let retain = outbound.retain();
    match outbound {
        Outbound::Request(envelope) => {
            let mut payload = Map::new();
            payload.insert("req_id".into(), Value::from(envelope.req_id));
            match &envelope.request {
                Request::SetConfig { config, .. } => {
                    payload.insert("config".into(), serde_json::to_value(config)?);
                }
                Request::SendData { data, .. } => merge(&mut payload, serde_json::to_value(data)?),
                Request::OtapLoad { load, .. } => merge(&mut payload, serde_json::to_value(load)?),
                Request::GetConfig { .. }
                | Request::OtapStatus { .. }
                | Request::OtapProcess { .. } => {}
            }
            Ok(Publication {
                topic: Topic::Request(envelope.key.clone()).to_string(),
                qos,
                retain,
                payload: serde_json::to_vec(&payload)?,
            })
        }
        // An empty retained payload clears the broker's retained status.
        Outbound::ClearStatus { gateway_id } => Ok(Publication {
            topic: Topic::Status {
                gateway_id: gateway_id.clone(),
            }
            .to_string(),
            qos,
            retain,
            payload: Vec::new(),
        }),
    }
}

fn merge(target: &mut Map<String, Value>, value: Value) {
    if let Value::Object(fields) = value {
        target.extend(fields);
    }
}

pub(crate) fn qos(delivery: Delivery) -> QoS {
    match delivery {
        Delivery::AtMostOnce => QoS::AtMostOnce,
        Delivery::AtLeastOnce => QoS::AtLeastOnce,
        Delivery::ExactlyOnce => QoS::ExactlyOnce,
    }
}
