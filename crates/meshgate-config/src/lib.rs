//! Shared configuration for meshgate.
//!
//! TOML profiles, credential resolution (env + keyring + plaintext),
//! and translation to `meshgate_mqtt::BrokerConfig`. The CLI layers its
//! `GlobalOpts` flag overrides on top.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use meshgate_mqtt::config::{DEFAULT_PORT, DEFAULT_TLS_PORT};
use meshgate_mqtt::{BrokerConfig, TlsMode};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Keyring service name; entries are keyed `<profile>/password`.
pub const KEYRING_SERVICE: &str = "meshgate";

/// Prefix for environment overrides, e.g. `MESHGATE_DEFAULTS__TIMEOUT=5`.
pub const ENV_PREFIX: &str = "MESHGATE_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{name}' not found")]
    ProfileNotFound { name: String },

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named broker profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// Response timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Tracking poll interval in seconds.
    #[serde(default = "default_update_rate")]
    pub update_rate: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
            update_rate: default_update_rate(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    10
}
fn default_update_rate() -> u64 {
    1
}

/// A named broker profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Profile {
    /// Broker URL, `mqtt://host:port` or `mqtts://host:port`.
    pub broker: String,

    pub username: Option<String>,

    /// Plaintext password, used when neither `password_env` nor the keyring has one.
    pub password: Option<String>,

    /// Environment variable name containing the password.
    pub password_env: Option<String>,

    /// Fixed MQTT client id; random when unset.
    pub client_id: Option<String>,

    /// Path to a PEM CA bundle for `mqtts://` brokers.
    pub ca_cert: Option<PathBuf>,

    /// Override response timeout (seconds).
    pub timeout: Option<u64>,
}

impl Profile {
    pub fn new(broker: impl Into<String>) -> Self {
        Self {
            broker: broker.into(),
            ..Self::default()
        }
    }
}

impl Config {
    pub fn profile(&self, name: &str) -> Result<&Profile, ConfigError> {
        self.profiles
            .get(name)
            .ok_or_else(|| ConfigError::ProfileNotFound { name: name.into() })
    }

    /// Profile names, sorted.
    pub fn profile_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.profiles.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("io", "meshgate", "meshgate").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("meshgate");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit file path + environment. A missing file is not an error.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if it cannot be read.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution (without CLI flags) ───────────────────────

fn keyring_entry(profile_name: &str) -> Result<keyring::Entry, ConfigError> {
    Ok(keyring::Entry::new(
        KEYRING_SERVICE,
        &format!("{profile_name}/password"),
    )?)
}

/// Resolve the broker password: `password_env` → keyring → plaintext.
///
/// `None` means the profile authenticates without a password.
pub fn resolve_password(profile: &Profile, profile_name: &str) -> Option<SecretString> {
    // 1. Profile's password_env → env var lookup
    if let Some(ref env_name) = profile.password_env {
        if let Ok(val) = std::env::var(env_name) {
            return Some(SecretString::from(val));
        }
    }

    // 2. System keyring
    if let Ok(entry) = keyring_entry(profile_name) {
        if let Ok(secret) = entry.get_password() {
            return Some(SecretString::from(secret));
        }
    }

    // 3. Plaintext in config
    profile.password.clone().map(SecretString::from)
}

/// Store a profile password in the system keyring.
pub fn store_password(profile_name: &str, secret: &str) -> Result<(), ConfigError> {
    keyring_entry(profile_name)?.set_password(secret)?;
    Ok(())
}

// ── Broker translation ──────────────────────────────────────────────

/// Host, port and TLS flag parsed from a broker URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerEndpoint {
    pub host: String,
    pub port: u16,
    pub tls: bool,
}

/// Parse `mqtt://host[:port]` / `mqtts://host[:port]`. Also accepts
/// `tcp://` and `ssl://`. The port defaults to 1883 / 8883.
pub fn parse_broker_url(raw: &str) -> Result<BrokerEndpoint, ConfigError> {
    let invalid = |reason: String| ConfigError::Validation {
        field: "broker".into(),
        reason,
    };

    let url: url::Url = raw
        .trim()
        .parse()
        .map_err(|e| invalid(format!("invalid URL '{raw}': {e}")))?;

    let tls = match url.scheme() {
        "mqtt" | "tcp" => false,
        "mqtts" | "ssl" => true,
        other => {
            return Err(invalid(format!(
                "unsupported scheme '{other}', expected mqtt:// or mqtts://"
            )));
        }
    };

    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| invalid(format!("missing host in '{raw}'")))?
        .to_owned();
    let port = url
        .port()
        .unwrap_or(if tls { DEFAULT_TLS_PORT } else { DEFAULT_PORT });

    Ok(BrokerEndpoint { host, port, tls })
}

/// Build a `BrokerConfig` from a profile alone, without CLI overrides.
pub fn profile_to_broker_config(
    profile: &Profile,
    profile_name: &str,
) -> Result<BrokerConfig, ConfigError> {
    let endpoint = parse_broker_url(&profile.broker)?;
    let mut broker = BrokerConfig::new(endpoint.host, endpoint.port);

    broker.tls = match (&profile.ca_cert, endpoint.tls) {
        (_, false) => TlsMode::Plain,
        (Some(ca), true) => TlsMode::CustomCa(ca.clone()),
        (None, true) => TlsMode::SystemRoots,
    };
    if let Some(ref client_id) = profile.client_id {
        broker.client_id.clone_from(client_id);
    }
    broker.username.clone_from(&profile.username);
    if broker.username.is_some() {
        broker.password = resolve_password(profile, profile_name);
    }

    Ok(broker)
}

/// Response timeout for a profile, falling back to the global default.
pub fn profile_timeout(profile: Option<&Profile>, defaults: &Defaults) -> Duration {
    Duration::from_secs(profile.and_then(|p| p.timeout).unwrap_or(defaults.timeout))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_plain_and_tls_urls() {
        assert_eq!(
            parse_broker_url("mqtt://broker.local").unwrap(),
            BrokerEndpoint {
                host: "broker.local".into(),
                port: 1883,
                tls: false
            }
        );
        let tls = parse_broker_url("mqtts://10.0.0.5:9999").unwrap();
        assert_eq!((tls.port, tls.tls), (9999, true));
        assert_eq!(parse_broker_url("mqtts://example.com").unwrap().port, 8883);
    }

    #[test]
    fn rejects_other_schemes() {
        let err = parse_broker_url("https://broker.local").unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
        assert!(parse_broker_url("not a url").is_err());
    }

    #[test]
    fn ca_cert_only_applies_to_tls() {
        let mut profile = Profile::new("mqtt://broker.local");
        profile.ca_cert = Some(PathBuf::from("/etc/ca.pem"));
        let broker = profile_to_broker_config(&profile, "default").unwrap();
        assert_eq!(broker.tls, TlsMode::Plain);

        profile.broker = "mqtts://broker.local".into();
        let broker = profile_to_broker_config(&profile, "default").unwrap();
        assert_eq!(broker.tls, TlsMode::CustomCa(PathBuf::from("/etc/ca.pem")));
    }

    #[test]
    fn fixed_client_id_is_kept() {
        let mut profile = Profile::new("mqtt://broker.local");
        profile.client_id = Some("bench-01".into());
        let broker = profile_to_broker_config(&profile, "default").unwrap();
        assert_eq!(broker.client_id, "bench-01");
    }

    #[test]
    fn profile_timeout_overrides_default() {
        let defaults = Defaults::default();
        let mut profile = Profile::new("mqtt://x");
        assert_eq!(profile_timeout(Some(&profile), &defaults), Duration::from_secs(10));
        profile.timeout = Some(3);
        assert_eq!(profile_timeout(Some(&profile), &defaults), Duration::from_secs(3));
        assert_eq!(profile_timeout(None, &defaults), Duration::from_secs(10));
    }
}
