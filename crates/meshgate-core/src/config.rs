// ── Runtime hub configuration ──
//
// Tuning knobs for the correlation core. The CLI builds a `HubConfig`
// from flags and profiles and hands it in; the core never reads disk.

use std::time::Duration;

/// Default wait for a correlated response.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default pause between polls in tracking loops.
pub const DEFAULT_UPDATE_RATE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubConfig {
    /// How long `Hub::execute` waits for a matching response.
    pub response_timeout: Duration,
    /// Poll interval used by tracking commands when none is given.
    pub update_rate: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            update_rate: DEFAULT_UPDATE_RATE,
        }
    }
}

impl HubConfig {
    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn with_update_rate(mut self, rate: Duration) -> Self {
        self.update_rate = rate;
        self
    }
}
