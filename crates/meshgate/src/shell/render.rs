// ── Rendering of hub traffic ──

use tabled::Tabled;

use meshgate_core::{DataPacket, GatewayEvent, Response, ResponseBody, ScratchpadStatus, SinkConfig};

use crate::cli::OutputFormat;
use crate::output::{self, Painter, or_dash};

#[derive(Tabled)]
struct SinkConfigRow {
    #[tabled(rename = "Sink")]
    sink: String,
    #[tabled(rename = "Role")]
    role: String,
    #[tabled(rename = "Address")]
    address: String,
    #[tabled(rename = "Network")]
    network: String,
    #[tabled(rename = "Channel")]
    channel: String,
    #[tabled(rename = "Started")]
    started: String,
    #[tabled(rename = "App config")]
    app_config: String,
}

impl From<&SinkConfig> for SinkConfigRow {
    fn from(c: &SinkConfig) -> Self {
        Self {
            sink: c.sink_id.to_string(),
            role: or_dash(c.node_role),
            address: or_dash(c.node_address),
            network: or_dash(c.network_address),
            channel: or_dash(c.network_channel),
            started: or_dash(c.started),
            app_config: c.app_config.as_ref().map_or_else(
                || "-".into(),
                |app| format!("seq {} / {}", app.sequence, hex::encode(&app.data)),
            ),
        }
    }
}

/// `KEY  result=ok  req_id=N` summary line.
pub(crate) fn response_line(response: &Response, painter: Painter) -> String {
    let result = if response.result.is_ok() {
        painter.ok(response.result)
    } else {
        painter.warn(response.result)
    };
    format!(
        "{}  result={result}  req_id={}",
        response.key,
        or_dash(response.req_id)
    )
}

/// A response in the chosen output format; tables get a summary line
/// followed by the body details.
pub(crate) fn response(response: &Response, format: OutputFormat, painter: Painter) -> String {
    output::render_single(
        format,
        response,
        |r| {
            let mut text = response_line(r, painter);
            let details = body_details(&r.body);
            if !details.is_empty() {
                text.push('\n');
                text.push_str(&details);
            }
            text
        },
        |r| r.result.to_string(),
    )
}

fn body_details(body: &ResponseBody) -> String {
    match body {
        ResponseBody::Configs { configs } if !configs.is_empty() => {
            let rows: Vec<SinkConfigRow> = configs.iter().map(SinkConfigRow::from).collect();
            output::render_table(&rows)
        }
        ResponseBody::SetConfig {
            config: Some(config),
        } => output::render_table(&[SinkConfigRow::from(config)]),
        ResponseBody::OtapStatus(status) => scratchpad_detail(status),
        _ => String::new(),
    }
}

fn scratchpad_detail(s: &ScratchpadStatus) -> String {
    [
        format!("Stored seq:       {}", or_dash(s.stored_seq)),
        format!("Stored length:    {}", or_dash(s.stored_len)),
        format!("Stored CRC:       {}", or_dash(s.stored_crc.map(|c| format!("{c:#06x}")))),
        format!("Stored status:    {}", or_dash(s.stored_status)),
        format!("Processed seq:    {}", or_dash(s.processed_seq)),
        format!("Processed length: {}", or_dash(s.processed_len)),
        format!("Processed CRC:    {}", or_dash(s.processed_crc.map(|c| format!("{c:#06x}")))),
        format!("Firmware area:    {}", or_dash(s.firmware_area_id.map(|a| format!("{a:#x}")))),
    ]
    .join("\n")
}

pub(crate) fn packet_line(p: &DataPacket) -> String {
    format!(
        "{} {}/{} net={} {}:{} -> {}:{} qos={} hops={} travel={}ms payload={}",
        p.received_at.format("%H:%M:%S%.3f"),
        p.gateway_id,
        p.sink_id,
        p.network_id,
        p.source_address,
        p.source_endpoint,
        p.destination_address,
        p.destination_endpoint,
        p.qos,
        p.hop_count,
        p.travel_time_ms,
        hex::encode(&p.payload),
    )
}

/// A data packet as one line, or as a structured document.
pub(crate) fn packet(p: &DataPacket, format: OutputFormat) -> String {
    output::render_single(format, p, packet_line, packet_line)
}

pub(crate) fn event(e: &GatewayEvent, format: OutputFormat, painter: Painter) -> String {
    output::render_single(format, e, |e| event_line(e, painter), |e| e.gateway_id.to_string())
}

pub(crate) fn event_line(e: &GatewayEvent, painter: Painter) -> String {
    let state = if e.state.is_online() {
        painter.ok(e.state)
    } else {
        painter.warn(e.state)
    };
    format!(
        "{} gateway {} is {state}",
        e.received_at.format("%H:%M:%S%.3f"),
        e.gateway_id
    )
}
