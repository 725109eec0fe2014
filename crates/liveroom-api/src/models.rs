// Wire types for the recorder's REST and SSE payloads.
//
// Every field the server may omit carries `#[serde(default)]`; the
// room detail itself is kept as a raw JSON object by the client.

use serde::{Deserialize, Serialize};

/// One row of `GET /api/lives`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LiveSummary {
    pub id: String,
    #[serde(default)]
    pub live_url: String,
    #[serde(default)]
    pub platform_cn_name: String,
    #[serde(default)]
    pub host_name: String,
    #[serde(default)]
    pub nick_name: Option<String>,
    #[serde(default)]
    pub room_name: String,
    #[serde(default)]
    pub status: bool,
    #[serde(default)]
    pub listening: bool,
    #[serde(default)]
    pub recording: bool,
    #[serde(default)]
    pub recording_preparing: bool,
    #[serde(default)]
    pub initializing: bool,
    #[serde(default)]
    pub last_error: Option<String>,
}

/// One element of the `POST /api/lives` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLive {
    pub url: String,
    /// Start monitoring immediately.
    pub listen: bool,
}

/// Optional `DELETE /api/lives/{id}` body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveLiveRequest {
    pub delete_files: bool,
}

/// Server-side refresh scheduler state for one room.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SchedulerStatus {
    #[serde(default)]
    pub scheduler_running: bool,
    #[serde(default)]
    pub has_waiters: bool,
    #[serde(default)]
    pub seconds_until_next_request: f64,
}

/// Platform-wide access limiter state (legacy shape).
///
/// All fields are optional: a `rate_limit_update` event may carry only a
/// subset, and `min_interval_sec` falls back to the detail's
/// `platform_rate_limit` when absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RateLimitInfo {
    #[serde(default)]
    pub waited_seconds: Option<f64>,
    #[serde(default)]
    pub next_request_in_sec: Option<f64>,
    #[serde(default)]
    pub min_interval_sec: Option<f64>,
}

/// `GET /api/lives/{id}/logs?lines=N`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogsResponse {
    #[serde(default)]
    pub lines: Vec<String>,
    #[serde(default)]
    pub total: usize,
    #[serde(default)]
    pub max_lines: usize,
}

/// `GET /api/lives/{id}/forceRefresh`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForceRefreshResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub host_name: Option<String>,
    #[serde(default)]
    pub room_name: Option<String>,
}

/// One decoded `data:` payload from `GET /api/sse`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SseMessage {
    /// Event name, e.g. `"live_update"`, `"list_change"`, `"log"`.
    #[serde(rename = "type")]
    pub event_type: String,

    /// Room the event concerns; empty for server-wide events.
    #[serde(default)]
    pub room_id: String,

    /// Event-specific payload.
    #[serde(default)]
    pub data: serde_json::Value,
}
