//! Command-line surface of `meshgate`.
//!
//! Also compiled by `build.rs` to render man pages, so this module may
//! only depend on clap and clap_complete.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// meshgate -- interactive shell for mesh network gateways
#[derive(Debug, Parser)]
#[command(
    name = "meshgate",
    version,
    about = "Talk to mesh network gateways over MQTT",
    long_about = "An interactive shell for mesh network gateways.\n\n\
        Discovers gateways and sinks from broker traffic, sends\n\
        configuration, data and scratchpad requests, and waits for\n\
        the matching gateway response. Starts the shell when no\n\
        subcommand is given.",
    propagate_version = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Option<Command>,
}

// ── Flags shared by every subcommand ────────────────────────────────

/// Connection and presentation flags. Anything left unset falls back to
/// the selected profile, then to the `[defaults]` table.
#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Named profile from the config file
    #[arg(long, short = 'p', env = "MESHGATE_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Broker to connect to: mqtt://host[:port] or mqtts://host[:port]
    #[arg(long, short = 'b', env = "MESHGATE_BROKER", global = true)]
    pub broker: Option<String>,

    /// MQTT username
    #[arg(long, env = "MESHGATE_USERNAME", global = true)]
    pub username: Option<String>,

    /// MQTT password
    #[arg(long, env = "MESHGATE_PASSWORD", global = true, hide_env = true)]
    pub password: Option<String>,

    /// Client id presented to the broker; a random one is used if omitted
    #[arg(long, global = true)]
    pub client_id: Option<String>,

    /// CA certificates (PEM) trusted for mqtts:// brokers
    #[arg(long, value_name = "PATH", global = true)]
    pub ca_cert: Option<PathBuf>,

    /// How results are printed [default: table]
    #[arg(long, short = 'o', env = "MESHGATE_OUTPUT", global = true)]
    pub output: Option<OutputFormat>,

    /// Colorize output [default: auto]
    #[arg(long, global = true)]
    pub color: Option<ColorMode>,

    /// More log output on stderr; repeat for more detail
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Print errors only
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Seconds to wait for a gateway response [default: 10]
    #[arg(long, env = "MESHGATE_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human readable tables
    Table,
    /// Indented JSON
    Json,
    /// One JSON document per line
    JsonCompact,
    /// YAML documents
    Yaml,
    /// Bare identifiers, one per line
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Color when stdout is a terminal and NO_COLOR is unset
    Auto,
    Always,
    Never,
}

// ── Subcommands ─────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Open the gateway shell; this is what runs without a subcommand
    #[command(alias = "sh")]
    Shell,

    /// Inspect and edit the config file
    Config(ConfigArgs),

    /// Print a completion script for your shell
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Walk through creating a profile
    Init,

    /// Print the config file with passwords masked
    Show,

    /// Change one value in the config file
    Set {
        /// Dotted key such as `defaults.timeout` or `profiles.lab.broker`;
        /// a bare profile field applies to the active profile
        key: String,

        value: String,
    },

    /// List profile names, marking the default with `*`
    Profiles,

    /// Make a profile the default
    Use { name: String },

    /// Save a broker password in the system keyring
    SetPassword {
        /// Profile the password belongs to [default: active profile]
        #[arg(long)]
        profile: Option<String>,
    },

    /// Print where the config file lives
    Path,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    pub shell: clap_complete::Shell,
}
