// Shared transport configuration for building reqwest::Client instances.
//
// The REST client and the SSE hub share the same timeout and user agent,
// but the push stream must not carry a whole-request timeout.

use std::time::Duration;

use crate::error::Error;

const USER_AGENT: &str = concat!("liveroom/", env!("CARGO_PKG_VERSION"));

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Whole-request timeout for REST calls; connect timeout for the stream.
    pub timeout: Duration,
    /// Accept self-signed certificates (LAN deployments).
    pub accept_invalid_certs: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            accept_invalid_certs: false,
        }
    }
}

impl TransportConfig {
    /// Build the `reqwest::Client` used for request/response endpoints.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(USER_AGENT)
            .danger_accept_invalid_certs(self.accept_invalid_certs)
            .build()
            .map_err(Error::Transport)
    }

    /// Build a client for the long-lived SSE stream.
    ///
    /// Only the connect phase is bounded; reading the body is open-ended.
    pub fn build_stream_client(&self) -> Result<reqwest::Client, Error> {
        reqwest::Client::builder()
            .connect_timeout(self.timeout)
            .user_agent(USER_AGENT)
            .danger_accept_invalid_certs(self.accept_invalid_certs)
            .build()
            .map_err(Error::Transport)
    }
}
