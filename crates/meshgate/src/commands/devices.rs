//! Device listing, selection and tracking commands.

use std::io::Write;

use serde::Serialize;
use tabled::Tabled;
use tokio::io::AsyncRead;
use tracing::debug;

use meshgate_core::{DeviceId, Gateway, GatewayState, Network, Node, Outbound, Sink, SinkTarget};

use crate::cli::OutputFormat;
use crate::error::CliError;
use crate::output::{self, or_dash};
use crate::shell::{KeyValueArgs, Pick, Selection, Shell, Tick, TrackingLoop, render};

// ── Table rows ──────────────────────────────────────────────────────

/// One line of the `list` view: a sink, or a gateway that has none yet.
#[derive(Debug, Serialize)]
struct ListEntry {
    network_id: Option<u32>,
    gateway_id: DeviceId,
    state: GatewayState,
    sink_id: Option<DeviceId>,
    node_address: Option<u32>,
}

#[derive(Tabled)]
struct ListRow {
    #[tabled(rename = "Network")]
    network: String,
    #[tabled(rename = "Gateway")]
    gateway: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Sink")]
    sink: String,
    #[tabled(rename = "Address")]
    address: String,
}

fn list_row(e: &ListEntry) -> ListRow {
    ListRow {
        network: or_dash(e.network_id),
        gateway: e.gateway_id.to_string(),
        state: e.state.to_string(),
        sink: or_dash(e.sink_id.as_ref()),
        address: or_dash(e.node_address),
    }
}

#[derive(Tabled)]
struct GatewayRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Sinks")]
    sinks: usize,
    #[tabled(rename = "Last seen")]
    last_seen: String,
}

#[derive(Tabled)]
struct SinkRow {
    #[tabled(rename = "Gateway")]
    gateway: String,
    #[tabled(rename = "Sink")]
    sink: String,
    #[tabled(rename = "Network")]
    network: String,
    #[tabled(rename = "Address")]
    address: String,
    #[tabled(rename = "Role")]
    role: String,
    #[tabled(rename = "Started")]
    started: String,
}

fn sink_row(s: &Sink) -> SinkRow {
    let config = s.config.as_ref();
    SinkRow {
        gateway: s.gateway_id.to_string(),
        sink: s.device_id.to_string(),
        network: or_dash(s.network_id),
        address: or_dash(config.and_then(|c| c.node_address)),
        role: or_dash(config.and_then(|c| c.node_role)),
        started: or_dash(config.and_then(|c| c.started)),
    }
}

#[derive(Tabled)]
struct NetworkRow {
    #[tabled(rename = "Network")]
    network: u32,
    #[tabled(rename = "Sinks")]
    sinks: usize,
    #[tabled(rename = "Gateways")]
    gateways: String,
}

fn network_row(n: &Network) -> NetworkRow {
    NetworkRow {
        network: n.network_id,
        sinks: n.sinks.len(),
        gateways: n
            .gateway_ids()
            .iter()
            .map(DeviceId::as_str)
            .collect::<Vec<_>>()
            .join(", "),
    }
}

#[derive(Tabled)]
struct NodeRow {
    #[tabled(rename = "Network")]
    network: u32,
    #[tabled(rename = "Address")]
    address: u32,
    #[tabled(rename = "Gateway")]
    gateway: String,
    #[tabled(rename = "Sink")]
    sink: String,
    #[tabled(rename = "Packets")]
    packets: u64,
    #[tabled(rename = "Last seen")]
    last_seen: String,
}

fn node_row(n: &Node) -> NodeRow {
    NodeRow {
        network: n.network_id,
        address: n.address,
        gateway: n.gateway_id.to_string(),
        sink: n.sink_id.to_string(),
        packets: n.packets,
        last_seen: n.last_seen.format("%Y-%m-%d %H:%M:%S").to_string(),
    }
}

fn selection_detail(selection: &Selection) -> String {
    [
        format!(
            "gateway : {}",
            selection
                .gateway
                .as_ref()
                .map_or_else(|| "-".into(), |g| format!("{} ({})", g.device_id, g.state))
        ),
        format!(
            "sink    : {}",
            selection
                .sink
                .as_ref()
                .map_or_else(|| "-".into(), |s| s.device_id.to_string())
        ),
        format!("network : {}", or_dash(selection.network)),
    ]
    .join("\n")
}

// ── Commands ────────────────────────────────────────────────────────

impl<R, W> Shell<R, W>
where
    R: AsyncRead + Unpin,
    W: Write,
{
    pub(crate) fn list(&mut self) -> Result<(), CliError> {
        let registry = self.hub.registry();
        let state_of = |id: &DeviceId| registry.gateway(id).map(|g| g.state).unwrap_or_default();

        let mut sinks = registry.list_sinks();
        // Grouped by network; sinks with no known network go last.
        sinks.sort_by_key(|s| (s.network_id.is_none(), s.network_id));
        let mut entries: Vec<ListEntry> = sinks
            .into_iter()
            .map(|sink| ListEntry {
                network_id: sink.network_id,
                state: state_of(&sink.gateway_id),
                node_address: sink.config.as_ref().and_then(|c| c.node_address),
                gateway_id: sink.gateway_id,
                sink_id: Some(sink.device_id),
            })
            .collect();
        entries.extend(
            registry
                .list_gateways()
                .into_iter()
                .filter(|g| registry.sinks_of(&g.device_id).is_empty())
                .map(|g| ListEntry {
                    network_id: None,
                    gateway_id: g.device_id,
                    state: g.state,
                    sink_id: None,
                    node_address: None,
                }),
        );

        if entries.is_empty() && self.output() == OutputFormat::Table {
            self.console.write_line("no devices discovered yet")?;
            return Ok(());
        }
        let out = output::render_list(self.output(), &entries, list_row, |e| {
            e.sink_id.as_ref().map_or_else(
                || e.gateway_id.to_string(),
                |sink| format!("{}/{sink}", e.gateway_id),
            )
        });
        self.console.write_line(out)?;
        Ok(())
    }

    pub(crate) fn gateways(&mut self) -> Result<(), CliError> {
        let registry = self.hub.registry();
        let gateways = registry.list_gateways();
        let out = output::render_list(
            self.output(),
            &gateways,
            |g: &Gateway| GatewayRow {
                id: g.device_id.to_string(),
                state: g.state.to_string(),
                sinks: registry.sinks_of(&g.device_id).len(),
                last_seen: g.last_seen.format("%Y-%m-%d %H:%M:%S").to_string(),
            },
            |g| g.device_id.to_string(),
        );
        self.console.write_line(out)?;
        Ok(())
    }

    pub(crate) fn sinks(&mut self) -> Result<(), CliError> {
        let sinks = self.hub.registry().list_sinks();
        let out = output::render_list(self.output(), &sinks, sink_row, Sink::key);
        self.console.write_line(out)?;
        Ok(())
    }

    pub(crate) fn networks(&mut self) -> Result<(), CliError> {
        let networks = self.hub.registry().list_networks();
        let out = output::render_list(self.output(), &networks, network_row, |n| {
            n.network_id.to_string()
        });
        self.console.write_line(out)?;
        Ok(())
    }

    pub(crate) fn nodes(&mut self) -> Result<(), CliError> {
        let nodes = self.hub.registry().list_nodes();
        if nodes.is_empty() && self.output() == OutputFormat::Table {
            self.console.write_line("no nodes heard yet")?;
            return Ok(());
        }
        let out = output::render_list(self.output(), &nodes, node_row, Node::key);
        self.console.write_line(out)?;
        Ok(())
    }

    pub(crate) fn show_selection(&mut self) -> Result<(), CliError> {
        let out = output::render_single(
            self.output(),
            &self.selection,
            selection_detail,
            Selection::prompt_label,
        );
        self.console.write_line(out)?;
        Ok(())
    }

    // ── Selection ────────────────────────────────────────────────────

    pub(crate) async fn set_gateway(&mut self, args: &KeyValueArgs) -> Result<(), CliError> {
        self.choose_gateway(args.str("id")).await
    }

    pub(crate) async fn set_sink(&mut self, args: &KeyValueArgs) -> Result<(), CliError> {
        self.choose_sink(args.str("id")).await
    }

    async fn choose_gateway(&mut self, id: Option<&str>) -> Result<(), CliError> {
        let registry = self.hub.registry();
        let gateway = if let Some(id) = id {
            let id = DeviceId::new(id);
            registry
                .gateway(&id)
                .unwrap_or_else(|| Gateway::new(id, GatewayState::Unknown))
        } else {
            let gateways = registry.list_gateways();
            let labels: Vec<String> = gateways
                .iter()
                .map(|g| format!("{} : {}", g.device_id, g.state))
                .collect();
            match self.pick("gateway", &labels).await? {
                Some(Pick::Index(index)) => gateways
                    .get(index)
                    .cloned()
                    .ok_or(CliError::SelectionRequired { target: "gateway" })?,
                Some(Pick::Custom(id)) => Gateway::new(DeviceId::new(id), GatewayState::Unknown),
                None => return Err(CliError::SelectionRequired { target: "gateway" }),
            }
        };

        self.console
            .write_line(format!("Gateway set to: {} ({})", gateway.device_id, gateway.state))?;
        self.selection.select_gateway(gateway);
        Ok(())
    }

    async fn choose_sink(&mut self, id: Option<&str>) -> Result<(), CliError> {
        let gateway_id = self.ensure_gateway().await?;

        let mut sinks = self.hub.registry().sinks_of(&gateway_id);
        if id.is_none() && sinks.is_empty() {
            self.console.write_line(format!(
                "No sinks known for {gateway_id}, requesting its configuration"
            ))?;
            self.request_configuration(&gateway_id).await?;
            sinks = self.hub.registry().sinks_of(&gateway_id);
        }

        let sink = if let Some(id) = id {
            let id = DeviceId::new(id);
            self.hub
                .registry()
                .sink(&gateway_id, &id)
                .unwrap_or_else(|| Sink::new(id, gateway_id.clone(), None))
        } else {
            let labels: Vec<String> = sinks
                .iter()
                .map(|s| format!("{}:{}:{}", or_dash(s.network_id), s.gateway_id, s.device_id))
                .collect();
            match self.pick("sink", &labels).await? {
                Some(Pick::Index(index)) => sinks
                    .get(index)
                    .cloned()
                    .ok_or(CliError::SelectionRequired { target: "sink" })?,
                Some(Pick::Custom(id)) => Sink::new(DeviceId::new(id), gateway_id.clone(), None),
                None => return Err(CliError::SelectionRequired { target: "sink" }),
            }
        };

        self.console.write_line(format!("Sink set to: {}", sink.key()))?;
        self.selection.select_sink(sink);
        Ok(())
    }

    /// The selected gateway, prompting for one when none is set.
    pub(crate) async fn ensure_gateway(&mut self) -> Result<DeviceId, CliError> {
        if let Some(id) = self.selection.gateway_id() {
            return Ok(id.clone());
        }
        self.console.write_line("Please define your target gateway")?;
        self.choose_gateway(None).await?;
        self.selection
            .gateway_id()
            .cloned()
            .ok_or(CliError::SelectionRequired { target: "gateway" })
    }

    /// The selected gateway and sink, prompting for whatever is missing.
    pub(crate) async fn ensure_target(&mut self) -> Result<SinkTarget, CliError> {
        if let Some(target) = self.selection.target() {
            return Ok(target);
        }
        self.console
            .write_line("Please define your target gateway and sink")?;
        self.choose_sink(None).await?;
        self.selection
            .target()
            .ok_or(CliError::SelectionRequired { target: "sink" })
    }

    // ── Maintenance ──────────────────────────────────────────────────

    pub(crate) fn clear_offline_gateways(&mut self) -> Result<(), CliError> {
        let registry = self.hub.registry();
        let offline = registry.offline_gateways();
        if offline.is_empty() {
            self.console.write_line("No offline gateways")?;
            return Ok(());
        }

        for gateway in offline {
            let id = gateway.device_id;
            registry.remove_gateway(&id);
            if self.selection.gateway_id() == Some(&id) {
                self.selection = Selection::default();
            }
            self.hub.publish(Outbound::ClearStatus {
                gateway_id: id.clone(),
            });
            self.console
                .write_line(format!("Cleared offline gateway {id}"))?;
        }
        Ok(())
    }

    // ── Tracking ─────────────────────────────────────────────────────

    /// Re-print `list` whenever the registry changes. Any input line stops it.
    ///
    /// Each poll drains the event and data queues: state changes are
    /// printed, data packets are only counted in the log.
    pub(crate) async fn track_devices(&mut self, args: &KeyValueArgs) -> Result<(), CliError> {
        let mut tracking = TrackingLoop::new(args.iterations("iterations")?);
        let period = self.poll_period(args)?;
        let silent = args.flag("silent", false)?;

        let mut rendered = None;
        loop {
            let events = self.hub.drain_events();
            let packets = self.hub.drain_data().len();
            if packets > 0 {
                debug!(packets, "dropping data packets while tracking devices");
            }
            if !silent {
                let (format, painter) = (self.output(), self.painter());
                for event in &events {
                    self.console.write_line(render::event(event, format, painter))?;
                }
            }

            let version = self.hub.registry().version();
            if rendered == Some(version) {
                if !silent && events.is_empty() {
                    let line = self
                        .painter()
                        .dim(format!("iteration {}: no changes", tracking.iteration() + 1));
                    self.console.write_line(line)?;
                }
            } else {
                rendered = Some(version);
                self.list()?;
            }

            if !tracking.advance() {
                break;
            }
            match self.next_tick(period).await? {
                Tick::Elapsed => {}
                Tick::Interrupted | Tick::Input(Some(_)) => break,
                Tick::Input(None) if tracking.is_unbounded() => break,
                Tick::Input(None) => {}
            }
        }
        Ok(())
    }
}
