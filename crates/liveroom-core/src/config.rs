// ── Runtime engine configuration ──
//
// Describes *how* the sync engine talks to the recorder and how often it
// re-pulls. Never touches disk: the CLI builds one from liveroom-config.

use std::time::Duration;

use liveroom_api::ReconnectConfig;

/// Base poll period used when nothing else is configured.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Configuration for a single [`SyncEngine`](crate::SyncEngine).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Recorder root URL (e.g. `http://127.0.0.1:8080`).
    pub base_url: String,
    /// Request timeout for REST calls; connect timeout for the push stream.
    pub timeout: Duration,
    /// Accept self-signed TLS certificates.
    pub accept_invalid_certs: bool,
    /// Full-list pull period while push is disabled. Doubled while enabled.
    pub poll_interval: Duration,
    /// Open the list-level push subscriptions on start.
    pub push_enabled: bool,
    /// Log lines fetched when a room is expanded.
    pub log_lines: usize,
    /// Log lines kept per expanded room.
    pub max_log_lines: usize,
    /// Local countdown tick.
    pub tick_interval: Duration,
    /// Delay before re-reading a room's detail after a listen start/stop.
    pub listen_change_delay: Duration,
    /// Push stream reconnection policy.
    pub reconnect: ReconnectConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".into(),
            timeout: Duration::from_secs(30),
            accept_invalid_certs: false,
            poll_interval: DEFAULT_POLL_INTERVAL,
            push_enabled: true,
            log_lines: 100,
            max_log_lines: 500,
            tick_interval: Duration::from_secs(1),
            listen_change_delay: Duration::from_millis(500),
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Poll period for the given push state.
    ///
    /// With push on, polling is only a backstop for missed events.
    pub fn poll_period(&self, push_enabled: bool) -> Duration {
        if push_enabled {
            self.poll_interval.saturating_mul(2)
        } else {
            self.poll_interval
        }
    }
}
