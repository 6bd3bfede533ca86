//! End-to-end tests for the interactive shell.
//!
//! The shell reads scripted input and writes into a buffer. A responder
//! task plays the gateway side of the hub, so no broker is involved.
#![allow(clippy::unwrap_used)]

use std::time::Duration;

use chrono::Utc;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use meshgate::cli::OutputFormat;
use meshgate::shell::{Console, Selection, Shell, ShellOptions};
use meshgate_core::{
    DataPacket, DeviceId, GatewayEvent, GatewayState, Hub, HubConfig, Inbound, Outbound, Request,
    Response, ResponseBody, ResultCode, ScratchpadStatus, SinkConfig, SinkTarget,
};

// ── Helpers ─────────────────────────────────────────────────────────

fn options() -> ShellOptions {
    ShellOptions {
        output: OutputFormat::Table,
        color: false,
        spinner: false,
    }
}

fn hub() -> Hub {
    Hub::new(HubConfig::default().with_response_timeout(Duration::from_secs(3)))
}

/// Answer every request with `ok`, forwarding each outbound message to
/// the returned channel.
fn spawn_gateway(hub: &Hub) -> (JoinHandle<()>, mpsc::UnboundedReceiver<Outbound>) {
    let hub = hub.clone();
    let (seen_tx, seen_rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(async move {
        loop {
            let outbound = hub.next_outbound().await;
            if let Outbound::Request(envelope) = &outbound {
                let body = match &envelope.request {
                    Request::GetConfig { .. } => ResponseBody::Configs {
                        configs: vec![SinkConfig {
                            sink_id: "sink0".into(),
                            node_address: Some(1),
                            network_address: Some(100),
                            ..SinkConfig::default()
                        }],
                    },
                    Request::SetConfig { .. } => ResponseBody::SetConfig { config: None },
                    Request::SendData { .. } => ResponseBody::SendData,
                    Request::OtapStatus { .. } => {
                        ResponseBody::OtapStatus(ScratchpadStatus::default())
                    }
                    Request::OtapProcess { .. } => ResponseBody::OtapProcess,
                    Request::OtapLoad { .. } => ResponseBody::OtapLoad,
                };
                let response = Response::new(envelope.key.clone(), ResultCode::Ok, body)
                    .with_req_id(envelope.req_id);
                hub.deliver(Inbound::Response(response));
            }
            let _ = seen_tx.send(outbound);
        }
    });
    (task, seen_rx)
}

/// Run the shell to end of input; returns what it printed and the final selection.
async fn run_shell<R>(hub: Hub, input: R) -> (String, Selection)
where
    R: AsyncRead + Unpin,
{
    let mut shell = Shell::new(hub, Console::new(input, Vec::new()), options());
    shell.run().await.unwrap();
    let selection = shell.selection().clone();
    let output = String::from_utf8(shell.into_output()).unwrap();
    (output, selection)
}

fn packet(gateway: &str) -> DataPacket {
    DataPacket {
        gateway_id: gateway.into(),
        sink_id: "sink0".into(),
        network_id: 100,
        source_address: 12,
        destination_address: 1,
        source_endpoint: 10,
        destination_endpoint: 11,
        payload: vec![0xca, 0xfe],
        qos: 1,
        travel_time_ms: 20,
        hop_count: 1,
        received_at: Utc::now(),
    }
}

// ── Requests ────────────────────────────────────────────────────────

#[tokio::test]
async fn send_data_prints_the_gateway_response() {
    let hub = hub();
    hub.registry().upsert_gateway("GW1".into(), GatewayState::Online);
    hub.registry()
        .upsert_sink("SINK1".into(), "GW1".into(), 1)
        .unwrap();
    let (gateway, mut seen) = spawn_gateway(&hub);

    // Both selections come from the registry; empty lines take the first entry.
    let input: &[u8] = b"set_gateway\n\n\
        set_sink\n\n\
        send_data source_endpoint=1 destination_endpoint=2 destination_address=3 payload=0102\n";
    let (output, selection) = run_shell(hub, input).await;
    gateway.abort();

    assert!(output.contains("Gateway set to: GW1 (ONLINE)"), "{output}");
    assert!(output.contains("Sink set to: GW1/SINK1"), "{output}");
    assert!(output.contains("GW1/SINK1/send_data  result=ok"), "{output}");
    assert!(!output.contains("timed out"), "{output}");
    assert_eq!(selection.target(), Some(SinkTarget::new("GW1", "SINK1")));
    assert_eq!(selection.network, Some(1));

    let Some(Outbound::Request(envelope)) = seen.recv().await else {
        panic!("expected a published request");
    };
    let Request::SendData { data, .. } = &envelope.request else {
        panic!("expected send_data, got {:?}", envelope.request);
    };
    assert_eq!(data.payload, vec![1, 2]);
    assert_eq!(data.qos, 1);
}

#[tokio::test(start_paused = true)]
async fn unanswered_request_times_out_and_the_shell_continues() {
    let input: &[u8] = b"set_gateway id=gw1\n\
        set_sink id=sink0\n\
        send_data source_endpoint=1 destination_endpoint=2 destination_address=3 payload=01 timeout=2\n\
        selection\n";
    let (output, _) = run_shell(hub(), input).await;

    assert!(
        output.contains("gw1/sink0/send_data: timed out after 2s"),
        "{output}"
    );
    let after_timeout = output.split("timed out").nth(1).unwrap();
    assert!(after_timeout.contains("sink    : sink0"), "{output}");
}

#[tokio::test]
async fn set_sink_without_known_sinks_requests_the_configuration() {
    let hub = hub();
    let (gateway, mut seen) = spawn_gateway(&hub);

    // The empty line accepts the default pick.
    let input: &[u8] = b"set_gateway id=gw1\nset_sink\n\nsinks\n";
    let (output, selection) = run_shell(hub.clone(), input).await;
    gateway.abort();

    assert!(output.contains("requesting its configuration"), "{output}");
    assert!(output.contains("gw1/get_configs  result=ok"), "{output}");
    assert!(output.contains("Sink set to: gw1/sink0"), "{output}");
    assert_eq!(selection.network, Some(100));

    let Some(Outbound::Request(envelope)) = seen.recv().await else {
        panic!("expected a published request");
    };
    assert!(matches!(envelope.request, Request::GetConfig { .. }));
    assert!(hub.registry().sink(&DeviceId::from("gw1"), &DeviceId::from("sink0")).is_some());
}

#[tokio::test]
async fn set_config_requires_a_field_before_prompting() {
    let input: &[u8] = b"set_config\nselection\n";
    let (output, selection) = run_shell(hub(), input).await;

    assert!(output.contains("at least one field"), "{output}");
    assert!(!output.contains("Please define your target"), "{output}");
    assert_eq!(selection, Selection::default());
}

// ── Errors keep the shell alive ─────────────────────────────────────

#[tokio::test]
async fn unknown_commands_and_keys_are_reported() {
    let input: &[u8] = b"frobnicate\nsend_data qso=1\nhelp send_data\n";
    let (output, _) = run_shell(hub(), input).await;

    assert!(output.contains("Unknown command 'frobnicate'"), "{output}");
    assert!(output.contains("unknown key 'qso'"), "{output}");
    assert!(output.contains("send_data - "), "{output}");
}

#[tokio::test]
async fn quit_stops_reading_input() {
    let input: &[u8] = b"quit\nfrobnicate\n";
    let (output, _) = run_shell(hub(), input).await;
    assert!(!output.contains("frobnicate"), "{output}");
}

// ── Registry maintenance ────────────────────────────────────────────

#[tokio::test]
async fn clear_offline_gateways_removes_and_clears_status() {
    let hub = hub();
    for (id, state) in [("gw1", GatewayState::Online), ("gw2", GatewayState::Offline)] {
        hub.deliver(Inbound::Status(GatewayEvent {
            gateway_id: id.into(),
            state,
            received_at: Utc::now(),
        }));
    }

    let input: &[u8] = b"clear_offline_gateways\n";
    let (output, _) = run_shell(hub.clone(), input).await;

    assert!(output.contains("Cleared offline gateway gw2"), "{output}");
    assert!(hub.registry().gateway(&DeviceId::from("gw2")).is_none());
    assert!(hub.registry().gateway(&DeviceId::from("gw1")).is_some());

    let outbound = tokio::time::timeout(Duration::from_secs(1), hub.next_outbound())
        .await
        .unwrap();
    assert_eq!(
        outbound,
        Outbound::ClearStatus {
            gateway_id: "gw2".into()
        }
    );
}

// ── Tracking ────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn track_data_packets_prints_matching_packets() {
    let hub = hub();
    let (mut stdin, input) = tokio::io::duplex(256);
    stdin
        .write_all(b"track_data_packets gw_id=gw1 iterations=3 update_rate=1\n")
        .await
        .unwrap();

    let feeder = {
        let hub = hub.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1500)).await;
            hub.deliver(Inbound::Data(packet("gw1")));
            hub.deliver(Inbound::Data(packet("gw2")));
            tokio::time::sleep(Duration::from_secs(5)).await;
            stdin.write_all(b"quit\n").await.unwrap();
        })
    };

    let (output, _) = run_shell(hub, input).await;
    feeder.await.unwrap();

    assert!(output.contains("iteration 1: no packets"), "{output}");
    assert!(output.contains("gw1/sink0 net=100 12:10 -> 1:11"), "{output}");
    assert!(!output.contains("gw2/sink0"), "{output}");
}

#[tokio::test(start_paused = true)]
async fn track_devices_reprints_on_change() {
    let hub = hub();
    let (mut stdin, input) = tokio::io::duplex(256);
    stdin
        .write_all(b"track_devices iterations=3 update_rate=1\n")
        .await
        .unwrap();

    let feeder = {
        let hub = hub.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1500)).await;
            hub.deliver(Inbound::Status(GatewayEvent {
                gateway_id: "gw7".into(),
                state: GatewayState::Online,
                received_at: Utc::now(),
            }));
            tokio::time::sleep(Duration::from_secs(5)).await;
            stdin.write_all(b"quit\n").await.unwrap();
        })
    };

    let (output, _) = run_shell(hub, input).await;
    feeder.await.unwrap();

    assert!(output.contains("no devices discovered yet"), "{output}");
    assert!(output.contains("iteration 2: no changes"), "{output}");
    assert!(output.contains("gw7"), "{output}");
}

#[tokio::test(start_paused = true)]
async fn track_devices_drains_events_and_data_while_running() {
    let hub = hub();
    let (mut stdin, input) = tokio::io::duplex(256);
    stdin
        .write_all(b"track_devices iterations=5 update_rate=1\n")
        .await
        .unwrap();

    let feeder = {
        let hub = hub.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1500)).await;
            hub.deliver(Inbound::Status(GatewayEvent {
                gateway_id: "gw7".into(),
                state: GatewayState::Online,
                received_at: Utc::now(),
            }));
            hub.deliver(Inbound::Data(packet("gw7")));
            // Tracking polls at 2s and is still running at 2.5s.
            tokio::time::sleep(Duration::from_secs(1)).await;
            let leftover = (hub.drain_events().len(), hub.drain_data().len());
            tokio::time::sleep(Duration::from_secs(4)).await;
            stdin.write_all(b"quit\n").await.unwrap();
            leftover
        })
    };

    let (output, _) = run_shell(hub, input).await;
    let leftover = feeder.await.unwrap();

    assert_eq!(leftover, (0, 0), "{output}");
    assert!(output.contains("gateway gw7 is ONLINE"), "{output}");
    assert!(!output.contains("gw7/sink0 net=100"), "{output}");
}

// ── Nodes ───────────────────────────────────────────────────────────

#[tokio::test]
async fn nodes_lists_sources_heard_in_data_traffic() {
    let hub = hub();
    hub.deliver(Inbound::Data(packet("gw1")));
    hub.deliver(Inbound::Data(packet("gw2")));

    let input: &[u8] = b"nodes\n";
    let (output, _) = run_shell(hub, input).await;

    assert!(output.contains("Packets"), "{output}");
    // Pending packets are echoed before the prompt; keep only table rows.
    let rows: Vec<&str> = output
        .lines()
        .filter(|l| l.contains("sink0") && !l.contains("net="))
        .collect();
    assert_eq!(rows.len(), 1, "{output}");
    assert!(rows[0].contains("100"), "{output}");
    assert!(rows[0].contains("12"), "{output}");
    assert!(rows[0].contains("gw2"), "{output}");
    assert!(!rows[0].contains("gw1"), "{output}");
}

#[tokio::test]
async fn nodes_without_traffic_says_so() {
    let (output, _) = run_shell(hub(), &b"nodes\n"[..]).await;
    assert!(output.contains("no nodes heard yet"), "{output}");
}
