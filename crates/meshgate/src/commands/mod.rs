//! Command handlers.
//!
//! `config_cmd` serves the `meshgate config` subcommand. The other modules
//! add the interactive shell's commands as `impl Shell` blocks; the
//! [`ShellCommand`] table here names them, lists the keys each one accepts
//! and supplies the `help` text.

pub mod config_cmd;

mod configure;
mod data;
mod devices;
mod scratchpad;

use strum::{EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

/// Every command the interactive shell understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, EnumString, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ShellCommand {
    #[strum(to_string = "list", serialize = "ls")]
    List,
    Gateways,
    Sinks,
    Networks,
    Nodes,
    Selection,
    SetGateway,
    SetSink,
    ClearOfflineGateways,
    GatewayConfiguration,
    SetConfig,
    SetAppConfig,
    SendData,
    ScratchpadStatus,
    ScratchpadUpdate,
    ScratchpadUpload,
    TrackDevices,
    TrackDataPackets,
    TogglePrintPendingResponses,
    TogglePrintPendingEvents,
    TogglePrintPendingData,
    #[strum(to_string = "help", serialize = "?")]
    Help,
    #[strum(to_string = "quit", serialize = "q", serialize = "bye", serialize = "exit")]
    Quit,
}

impl ShellCommand {
    /// Keys accepted as `key=value` arguments.
    pub fn keys(self) -> &'static [&'static str] {
        match self {
            Self::SetGateway | Self::SetSink => &["id"],
            Self::SetConfig => &[
                "node_role",
                "node_address",
                "network_address",
                "network_channel",
                "started",
            ],
            Self::SetAppConfig => &["app_config_seq", "app_config_data", "app_config_diag"],
            Self::SendData => &[
                "source_endpoint",
                "destination_endpoint",
                "destination_address",
                "payload",
                "timeout",
                "qos",
                "is_unack_csma_ca",
                "hop_limit",
                "initial_delay_ms",
            ],
            Self::ScratchpadUpload => &["file_path", "seq"],
            Self::TrackDevices => &["iterations", "update_rate", "silent"],
            Self::TrackDataPackets => &[
                "gw_id",
                "sink_id",
                "network_id",
                "source_address",
                "source_endpoint",
                "destination_endpoint",
                "iterations",
                "update_rate",
                "show_events",
                "silent",
            ],
            _ => &[],
        }
    }

    pub fn summary(self) -> &'static str {
        match self {
            Self::List => "List known networks with their sinks and gateways",
            Self::Gateways => "Show discovered gateways",
            Self::Sinks => "Show discovered sinks",
            Self::Networks => "Show networks and the gateways serving them",
            Self::Nodes => "Show nodes heard in data traffic and their latest route",
            Self::Selection => "Show the selected gateway, sink and network",
            Self::SetGateway => "Select the gateway used by later commands",
            Self::SetSink => "Select the sink used by later commands",
            Self::ClearOfflineGateways => "Forget offline gateways and clear their retained status",
            Self::GatewayConfiguration => "Request sink configuration from gateways",
            Self::SetConfig => "Change the selected sink's network configuration",
            Self::SetAppConfig => "Change the selected sink's application configuration",
            Self::SendData => "Send a payload through the selected sink",
            Self::ScratchpadStatus => "Query the selected sink's scratchpad",
            Self::ScratchpadUpdate => "Tell the selected sink to process its scratchpad",
            Self::ScratchpadUpload => "Upload a scratchpad image to the selected sink",
            Self::TrackDevices => "Re-print the device list whenever it changes",
            Self::TrackDataPackets => "Print incoming data packets (empty line stops)",
            Self::TogglePrintPendingResponses => "Toggle printing of unclaimed responses",
            Self::TogglePrintPendingEvents => "Toggle printing of unclaimed gateway events",
            Self::TogglePrintPendingData => "Toggle printing of unclaimed data packets",
            Self::Help => "List commands, or `help <command>` for details",
            Self::Quit => "Leave the shell",
        }
    }

    /// Aliases accepted besides the command name.
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            Self::List => &["ls"],
            Self::Help => &["?"],
            Self::Quit => &["q", "bye", "exit"],
            _ => &[],
        }
    }

    /// Defaults worth showing in `help <command>`.
    fn defaults(self) -> &'static str {
        match self {
            Self::SetAppConfig => "app_config_diag=60",
            Self::SendData => {
                "timeout=<configured> qos=1 is_unack_csma_ca=false hop_limit=0 initial_delay_ms=0"
            }
            Self::TrackDevices => "iterations=inf update_rate=<configured> silent=false",
            Self::TrackDataPackets => {
                "iterations=inf update_rate=<configured> show_events=false silent=false"
            }
            _ => "",
        }
    }

    /// Multi-line usage text for `help <command>`.
    pub fn usage(self) -> String {
        let mut text = format!("{self} - {}", self.summary());
        let keys = self.keys();
        if keys.is_empty() {
            text.push_str(&format!("\n  usage: {self}"));
        } else {
            text.push_str(&format!("\n  usage: {self} key=value ..."));
            text.push_str(&format!("\n  keys:  {}", keys.join(", ")));
        }
        if !self.defaults().is_empty() {
            text.push_str(&format!("\n  defaults: {}", self.defaults()));
        }
        if !self.aliases().is_empty() {
            text.push_str(&format!("\n  aliases: {}", self.aliases().join(", ")));
        }
        text
    }

    /// One line per command for the bare `help` listing.
    pub fn overview() -> String {
        ShellCommand::iter()
            .map(|cmd| {
                let name: &'static str = cmd.into();
                format!("  {name:<32} {}", cmd.summary())
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
