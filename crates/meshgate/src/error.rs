//! CLI error types with miette diagnostics.
//!
//! Maps core, transport and config errors into user-facing errors with
//! actionable help text. Inside the shell every one of these is printed and
//! the prompt comes back; only startup errors end the process.

use miette::Diagnostic;
use thiserror::Error;

use meshgate_config::ConfigError;
use meshgate_core::CoreError;
use meshgate_mqtt::MqttError;

/// Process exit codes.
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const CREDENTIALS: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to broker at {url}")]
    #[diagnostic(
        code(meshgate::connection_failed),
        help(
            "Check that the broker is running and reachable.\n\
             URL: {url}"
        )
    )]
    ConnectionFailed { url: String },

    #[error(transparent)]
    #[diagnostic(code(meshgate::transport))]
    Transport(#[from] MqttError),

    // ── Configuration ────────────────────────────────────────────────
    #[error("No broker configured")]
    #[diagnostic(
        code(meshgate::no_broker),
        help(
            "Pass --broker mqtt://host:1883, or create a profile with: meshgate config init\n\
             Expected config at: {path}"
        )
    )]
    NoBroker { path: String },

    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(meshgate::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: meshgate config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("Could not store credentials for profile '{profile}'")]
    #[diagnostic(
        code(meshgate::credentials),
        help("Set password_env in the profile or pass --password instead.")
    )]
    Credentials {
        profile: String,
        #[source]
        source: ConfigError,
    },

    #[error(transparent)]
    #[diagnostic(code(meshgate::config))]
    Config(ConfigError),

    // ── Registry / correlation ───────────────────────────────────────
    #[error("Sink '{sink_id}' references unknown gateway '{gateway_id}'")]
    #[diagnostic(
        code(meshgate::orphan_sink),
        help("Run `gateways` to see known gateways, or `gateway_configuration` to discover sinks.")
    )]
    OrphanSink { sink_id: String, gateway_id: String },

    #[error("A request for {key} is still waiting for its response")]
    #[diagnostic(
        code(meshgate::duplicate_request),
        help("Wait for the pending request to finish or time out.")
    )]
    DuplicateRequest { key: String },

    // ── Shell ────────────────────────────────────────────────────────
    #[error("No {target} selected")]
    #[diagnostic(
        code(meshgate::selection_required),
        help("Select one with `set_gateway` / `set_sink`, or pass id=<device id>.")
    )]
    SelectionRequired { target: &'static str },

    #[error("Unknown command '{name}'")]
    #[diagnostic(code(meshgate::unknown_command), help("Type `help` to list commands."))]
    UnknownCommand { name: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(meshgate::validation))]
    Validation { field: String, reason: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub(crate) fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::Transport(_) => exit_code::CONNECTION,
            Self::Credentials { .. } => exit_code::CREDENTIALS,
            Self::ProfileNotFound { .. } | Self::OrphanSink { .. } => exit_code::NOT_FOUND,
            Self::Validation { .. }
            | Self::UnknownCommand { .. }
            | Self::SelectionRequired { .. }
            | Self::NoBroker { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── Library error → CliError mapping ─────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::OrphanSink {
                sink_id,
                gateway_id,
            } => CliError::OrphanSink {
                sink_id,
                gateway_id,
            },
            CoreError::DuplicateRequest { key } => CliError::DuplicateRequest {
                key: key.to_string(),
            },
            CoreError::Validation { message } => CliError::Validation {
                field: "request".into(),
                reason: message,
            },
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::ProfileNotFound { name } => CliError::ProfileNotFound {
                name,
                available: String::new(),
            },
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            other => CliError::Config(other),
        }
    }
}
