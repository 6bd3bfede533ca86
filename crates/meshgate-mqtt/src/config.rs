// ── Broker connection configuration ──
//
// Describes how to reach the broker. Carries credentials but never
// touches disk; the CLI builds one from flags and profiles.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

pub const DEFAULT_PORT: u16 = 1883;
pub const DEFAULT_TLS_PORT: u16 = 8883;

/// TLS strategy for the broker connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsMode {
    /// Plain TCP (`mqtt://`).
    #[default]
    Plain,
    /// TLS verified against the platform trust store (`mqtts://`).
    SystemRoots,
    /// TLS verified against a PEM CA bundle.
    CustomCa(PathBuf),
}

impl TlsMode {
    pub fn is_tls(&self) -> bool {
        !matches!(self, Self::Plain)
    }
}

/// Exponential backoff between reconnection attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Delay before the first retry. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on the delay. Default: 30s.
    pub max_delay: Duration,

    /// Attempts before giving up. `None` retries forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

impl ReconnectConfig {
    /// Delay before retry number `attempt` (0-based), doubling up to `max_delay`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(16));
        self.initial_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<SecretString>,
    pub tls: TlsMode,
    pub keep_alive: Duration,
    pub reconnect: ReconnectConfig,
}

impl BrokerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            client_id: generate_client_id(),
            username: None,
            password: None,
            tls: TlsMode::Plain,
            keep_alive: Duration::from_secs(60),
            reconnect: ReconnectConfig::default(),
        }
    }

    /// `mqtt://host:port` or `mqtts://host:port`, without credentials.
    pub fn display_url(&self) -> String {
        let scheme = if self.tls.is_tls() { "mqtts" } else { "mqtt" };
        format!("{scheme}://{}:{}", self.host, self.port)
    }
}

/// `meshgate-` followed by eight random hex digits.
pub fn generate_client_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("meshgate-{}", id.get(..8).unwrap_or(&id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let reconnect = ReconnectConfig::default();
        assert_eq!(reconnect.backoff(0), Duration::from_secs(1));
        assert_eq!(reconnect.backoff(3), Duration::from_secs(8));
        assert_eq!(reconnect.backoff(10), Duration::from_secs(30));
        assert_eq!(reconnect.backoff(u32::MAX), Duration::from_secs(30));
    }

    #[test]
    fn client_ids_are_short_and_unique() {
        let a = generate_client_id();
        let b = generate_client_id();
        assert_eq!(a.len(), "meshgate-".len() + 8);
        assert_ne!(a, b);
    }

    #[test]
    fn display_url_reflects_tls() {
        let mut config = BrokerConfig::new("broker.local", DEFAULT_TLS_PORT);
        config.tls = TlsMode::SystemRoots;
        assert_eq!(config.display_url(), "mqtts://broker.local:8883");
    }
}
