// ── Push event decoding ──
//
// Turns loosely-typed `SseMessage` payloads into a closed set of events.
// Unknown event types are rejected with an error so callers can log them.

use liveroom_api::{RateLimitInfo, SchedulerStatus, SseMessage};
use serde_json::Value;
use strum::{Display, EnumString};
use thiserror::Error;

/// Event names the engine subscribes to.
pub mod names {
    pub const LIVE_UPDATE: &str = "live_update";
    pub const LIST_CHANGE: &str = "list_change";
    pub const RATE_LIMIT_UPDATE: &str = "rate_limit_update";
    pub const LOG: &str = "log";
    pub const CONN_STATS: &str = "conn_stats";
    pub const RECORDER_STATUS: &str = "recorder_status";
}

/// `change_type` of a `list_change` event.
#[derive(Debug, Clone, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum ListChangeKind {
    ListenStart,
    ListenStop,
    RoomAdded,
    RoomRemoved,
    #[strum(default)]
    Other(String),
}

impl ListChangeKind {
    /// Listen start/stop changes the room's own detail, not just the list.
    pub fn affects_detail(&self) -> bool {
        matches!(self, Self::ListenStart | Self::ListenStop)
    }
}

/// Payload of a `rate_limit_update` event.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RateLimitPayload {
    pub scheduler_status: Option<SchedulerStatus>,
    /// Legacy limiter fields, if the event carried any.
    pub rate_limit: Option<RateLimitInfo>,
}

/// A decoded push event.
#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    /// Something about the room changed; payload is the room id only.
    LiveUpdate,
    ListChange(ListChangeKind),
    RateLimitUpdate(RateLimitPayload),
    Log(String),
    ConnStats(Value),
    RecorderStatus(Value),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventError {
    #[error("unknown push event type '{0}'")]
    UnknownType(String),

    #[error("malformed '{event}' payload: {reason}")]
    Malformed { event: String, reason: String },
}

impl TryFrom<&SseMessage> for PushEvent {
    type Error = EventError;

    fn try_from(message: &SseMessage) -> Result<Self, Self::Error> {
        let data = &message.data;
        match message.event_type.as_str() {
            names::LIVE_UPDATE => Ok(Self::LiveUpdate),
            names::LIST_CHANGE => {
                let kind = data
                    .get("change_type")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                Ok(Self::ListChange(
                    kind.parse()
                        .unwrap_or_else(|_| ListChangeKind::Other(kind.to_owned())),
                ))
            }
            names::RATE_LIMIT_UPDATE => parse_rate_limit(data).map(Self::RateLimitUpdate),
            names::LOG => Ok(Self::Log(log_line(data))),
            names::CONN_STATS => Ok(Self::ConnStats(data.clone())),
            names::RECORDER_STATUS => Ok(Self::RecorderStatus(data.clone())),
            other => Err(EventError::UnknownType(other.to_owned())),
        }
    }
}

fn parse_rate_limit(data: &Value) -> Result<RateLimitPayload, EventError> {
    let malformed = |e: serde_json::Error| EventError::Malformed {
        event: names::RATE_LIMIT_UPDATE.into(),
        reason: e.to_string(),
    };

    if !data.is_object() {
        return Ok(RateLimitPayload::default());
    }

    let scheduler_status = match data.get("scheduler_status") {
        None | Some(Value::Null) => None,
        Some(v) => Some(serde_json::from_value(v.clone()).map_err(malformed)?),
    };

    let has_legacy = ["waited_seconds", "next_request_in_sec", "min_interval_sec"]
        .iter()
        .any(|k| data.get(*k).is_some_and(|v| !v.is_null()));
    let rate_limit = if has_legacy {
        Some(serde_json::from_value(data.clone()).map_err(malformed)?)
    } else {
        None
    };

    Ok(RateLimitPayload {
        scheduler_status,
        rate_limit,
    })
}

fn log_line(data: &Value) -> String {
    match data {
        Value::String(s) => s.clone(),
        Value::Object(map) => map
            .get("line")
            .or_else(|| map.get("message"))
            .and_then(Value::as_str)
            .map_or_else(|| data.to_string(), str::to_owned),
        other => other.to_string(),
    }
}
