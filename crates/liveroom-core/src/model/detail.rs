use liveroom_api::{RateLimitInfo, SchedulerStatus};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Open-ended room detail as returned by `GET /lives/{id}`.
///
/// Known keys get typed accessors; everything else (`room_config`,
/// `recorder_status`, ...) stays as raw JSON for display.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomDetail(Map<String, Value>);

impl RoomDetail {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Shallow merge: each top-level key in `partial` replaces ours.
    pub fn merge(&mut self, partial: Map<String, Value>) {
        for (key, value) in partial {
            self.0.insert(key, value);
        }
    }

    /// Replace a single top-level key.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.0
    }

    // ── Typed accessors ──────────────────────────────────────────────

    pub fn scheduler_status(&self) -> Option<SchedulerStatus> {
        self.typed("scheduler_status")
    }

    pub fn rate_limit_info(&self) -> Option<RateLimitInfo> {
        self.typed("rate_limit_info")
    }

    /// Per-platform minimum interval in seconds, if configured.
    pub fn platform_rate_limit(&self) -> Option<f64> {
        self.0.get("platform_rate_limit").and_then(Value::as_f64)
    }

    pub fn listening(&self) -> bool {
        self.flag("listening")
    }

    pub fn recording(&self) -> bool {
        self.flag("recording")
    }

    pub fn recording_preparing(&self) -> bool {
        self.flag("recording_preparing")
    }

    pub fn host_name(&self) -> Option<&str> {
        self.0.get("host_name").and_then(Value::as_str)
    }

    pub fn room_name(&self) -> Option<&str> {
        self.0.get("room_name").and_then(Value::as_str)
    }

    fn flag(&self, key: &str) -> bool {
        self.0.get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    /// Decode a nested object; JSON `null` and shape mismatches are `None`.
    fn typed<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.0.get(key)? {
            Value::Null => None,
            value => serde_json::from_value(value.clone()).ok(),
        }
    }
}

impl From<Map<String, Value>> for RoomDetail {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}
