//! Shared SSE push channel with client-side subscription fan-out.
//!
//! The recorder exposes a single `GET /api/sse` stream carrying every
//! event for every room. [`SseHub`] holds that one connection open
//! (reconnecting with exponential backoff + jitter), decodes each
//! `data:` frame into an [`SseMessage`], and delivers it to every
//! registered subscription whose [`SubscriptionFilter`] matches.
//!
//! Subscriptions are identified by opaque [`SubscriptionId`]s (v4 UUIDs,
//! never reused). Each delivery is tagged with the id it was delivered
//! on, so a consumer can tell a room-scoped event from the same event
//! arriving through a list-scoped subscription.
//!
//! # Example
//!
//! ```rust,ignore
//! use liveroom_api::{SseHub, SubscriptionFilter, ReconnectConfig};
//!
//! let hub = SseHub::connect(http, sse_url, ReconnectConfig::default(), cancel.clone());
//! let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
//! let id = hub.subscribe(SubscriptionFilter::room("r1"), tx)?;
//!
//! while let Some(envelope) = rx.recv().await {
//!     println!("{}: {}", envelope.message.event_type, envelope.message.data);
//! }
//!
//! hub.unsubscribe(&id);
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::{Buf, BytesMut};
use dashmap::DashMap;
use futures_util::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use url::Url;
use uuid::Uuid;

use crate::error::Error;
use crate::models::SseMessage;

// ── SubscriptionId ───────────────────────────────────────────────────

/// Opaque handle returned by [`SseHub::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    /// Fresh random id. Hubs mint these; alternate push sources may too.
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── SubscriptionFilter ───────────────────────────────────────────────

/// Which rooms a subscription covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// Events whose `room_id` equals this id.
    Room(String),
    /// Every room (`"*"`).
    All,
}

/// Which event types a subscription covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventFilter {
    Named(String),
    /// Every event type (`"*"`).
    Any,
}

/// `(scope, event)` pair matched against each incoming message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionFilter {
    pub scope: Scope,
    pub event: EventFilter,
}

impl SubscriptionFilter {
    /// Every event for one room.
    pub fn room(id: impl Into<String>) -> Self {
        Self {
            scope: Scope::Room(id.into()),
            event: EventFilter::Any,
        }
    }

    /// One event type across all rooms.
    pub fn all(event: impl Into<String>) -> Self {
        Self {
            scope: Scope::All,
            event: EventFilter::Named(event.into()),
        }
    }

    pub fn matches(&self, message: &SseMessage) -> bool {
        let scope_ok = match &self.scope {
            Scope::All => true,
            Scope::Room(id) => *id == message.room_id,
        };
        let event_ok = match &self.event {
            EventFilter::Any => true,
            EventFilter::Named(name) => *name == message.event_type,
        };
        scope_ok && event_ok
    }
}

/// A message delivered through one specific subscription.
#[derive(Debug, Clone)]
pub struct PushEnvelope {
    pub subscription: SubscriptionId,
    pub message: Arc<SseMessage>,
}

struct Subscriber {
    filter: SubscriptionFilter,
    inbox: mpsc::UnboundedSender<PushEnvelope>,
}

type Registry = DashMap<SubscriptionId, Subscriber>;

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff configuration for SSE reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum reconnection attempts before giving up.
    /// `None` means retry forever.
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

// ── SseHub ───────────────────────────────────────────────────────────

/// Handle to the shared push connection and its subscription table.
///
/// Cheaply cloneable. [`shutdown`](Self::shutdown) stops the background
/// reader; after that [`subscribe`](Self::subscribe) fails with
/// [`Error::SseClosed`].
#[derive(Clone)]
pub struct SseHub {
    registry: Arc<Registry>,
    connected: watch::Receiver<bool>,
    cancel: CancellationToken,
}

impl SseHub {
    /// Spawn the reader loop for `url` and return immediately.
    ///
    /// The first connection attempt happens asynchronously. Must be
    /// called from within a Tokio runtime.
    pub fn connect(
        http: reqwest::Client,
        url: Url,
        reconnect: ReconnectConfig,
        cancel: CancellationToken,
    ) -> Self {
        let registry: Arc<Registry> = Arc::new(DashMap::new());
        let (connected_tx, connected) = watch::channel(false);

        let task_registry = Arc::clone(&registry);
        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            sse_loop(http, url, task_registry, reconnect, task_cancel, connected_tx).await;
        });

        Self {
            registry,
            connected,
            cancel,
        }
    }

    /// Register a filter; matching messages are pushed into `inbox`.
    pub fn subscribe(
        &self,
        filter: SubscriptionFilter,
        inbox: mpsc::UnboundedSender<PushEnvelope>,
    ) -> Result<SubscriptionId, Error> {
        if self.cancel.is_cancelled() {
            return Err(Error::SseClosed);
        }
        let id = SubscriptionId::new();
        tracing::debug!(subscription = %id, ?filter, "SSE subscribe");
        self.registry.insert(id, Subscriber { filter, inbox });
        Ok(id)
    }

    /// Remove a subscription. Returns `false` if the id was unknown.
    pub fn unsubscribe(&self, id: &SubscriptionId) -> bool {
        let removed = self.registry.remove(id).is_some();
        tracing::debug!(subscription = %id, removed, "SSE unsubscribe");
        removed
    }

    /// Number of live subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.registry.len()
    }

    /// Observe whether the stream is currently open.
    pub fn connection_state(&self) -> watch::Receiver<bool> {
        self.connected.clone()
    }

    /// Signal the background reader to stop.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

// ── Background reconnection loop ─────────────────────────────────────

/// Main loop: connect → read → on error, backoff → reconnect.
async fn sse_loop(
    http: reqwest::Client,
    url: Url,
    registry: Arc<Registry>,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
    connected: watch::Sender<bool>,
) {
    let mut attempt: u32 = 0;

    loop {
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = connect_and_read(&http, &url, &registry, &cancel, &connected) => result,
        };
        connected.send_replace(false);

        let delay = match result {
            // Server closed the stream. Start over without escalating.
            Ok(()) => {
                tracing::info!("SSE stream ended, reconnecting");
                attempt = 0;
                reconnect.initial_delay
            }
            Err(e) => {
                tracing::warn!(error = %e, attempt, "SSE error");

                if let Some(max) = reconnect.max_retries {
                    if attempt >= max {
                        tracing::error!(max_retries = max, "SSE reconnection limit reached, giving up");
                        break;
                    }
                }

                let delay = calculate_backoff(attempt, &reconnect);
                attempt = attempt.saturating_add(1);
                delay
            }
        };

        tracing::debug!(
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            attempt,
            "waiting before reconnect"
        );
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(delay) => {}
        }
    }

    connected.send_replace(false);
    tracing::debug!("SSE loop exiting");
}

// ── Single connection lifecycle ──────────────────────────────────────

async fn connect_and_read(
    http: &reqwest::Client,
    url: &Url,
    registry: &Registry,
    cancel: &CancellationToken,
    connected: &watch::Sender<bool>,
) -> Result<(), Error> {
    tracing::info!(url = %url, "connecting to SSE stream");

    let resp = http
        .get(url.clone())
        .header(reqwest::header::ACCEPT, "text/event-stream")
        .send()
        .await
        .map_err(|e| Error::SseConnect(e.to_string()))?;

    let status = resp.status();
    if !status.is_success() {
        return Err(Error::SseConnect(format!("HTTP {status}")));
    }

    connected.send_replace(true);
    tracing::info!("SSE connected");

    let mut body = resp.bytes_stream();
    let mut decoder = SseDecoder::default();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(()),
            chunk = body.next() => match chunk {
                Some(Ok(bytes)) => {
                    for message in decoder.feed(&bytes) {
                        dispatch(message, registry);
                    }
                }
                Some(Err(e)) => return Err(Error::SseConnect(e.to_string())),
                None => return Ok(()),
            },
        }
    }
}

// ── Fan-out ──────────────────────────────────────────────────────────

/// Deliver `message` to every matching subscription. Returns the count.
fn dispatch(message: SseMessage, registry: &Registry) -> usize {
    let message = Arc::new(message);
    let mut delivered = 0;

    for entry in registry.iter() {
        if !entry.filter.matches(&message) {
            continue;
        }
        let envelope = PushEnvelope {
            subscription: *entry.key(),
            message: Arc::clone(&message),
        };
        if entry.inbox.send(envelope).is_ok() {
            delivered += 1;
        } else {
            tracing::trace!(subscription = %entry.key(), "subscriber inbox closed");
        }
    }

    tracing::trace!(
        event = %message.event_type,
        room = %message.room_id,
        delivered,
        "SSE dispatch"
    );
    delivered
}

// ── Frame decoding ───────────────────────────────────────────────────

/// Upper bound on an unterminated line or an unfinished event's data.
const MAX_PENDING_BYTES: usize = 1024 * 1024;

/// Incremental `text/event-stream` decoder.
///
/// Buffers raw bytes so multi-byte characters split across chunks
/// survive, and emits one [`SseMessage`] per blank-line-terminated event.
#[derive(Default)]
struct SseDecoder {
    buf: BytesMut,
    data: String,
    event: Option<String>,
}

impl SseDecoder {
    fn feed(&mut self, chunk: &[u8]) -> Vec<SseMessage> {
        self.buf.extend_from_slice(chunk);
        let mut out = Vec::new();

        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let line = self.buf.split_to(pos);
            self.buf.advance(1);
            let line = String::from_utf8_lossy(&line);
            let line = line.strip_suffix('\r').unwrap_or(&line);

            if line.is_empty() {
                if let Some(message) = self.finish_event() {
                    out.push(message);
                }
                continue;
            }
            if line.starts_with(':') {
                continue;
            }

            let (field, value) = line.split_once(':').unwrap_or((line, ""));
            let value = value.strip_prefix(' ').unwrap_or(value);
            match field {
                "data" => {
                    if !self.data.is_empty() {
                        self.data.push('\n');
                    }
                    self.data.push_str(value);
                }
                "event" => self.event = Some(value.to_owned()),
                _ => {}
            }
        }

        if self.buf.len() > MAX_PENDING_BYTES || self.data.len() > MAX_PENDING_BYTES {
            tracing::warn!(
                pending = self.buf.len(),
                data = self.data.len(),
                "SSE frame exceeds size limit, discarding"
            );
            self.buf.clear();
            self.data.clear();
            self.event = None;
        }

        out
    }

    fn finish_event(&mut self) -> Option<SseMessage> {
        let data = std::mem::take(&mut self.data);
        let event = self.event.take();
        if data.is_empty() {
            return None;
        }

        match serde_json::from_str::<SseMessage>(&data) {
            Ok(message) => Some(message),
            Err(e) => {
                // A named frame with a non-envelope body is still usable.
                if let Some(event_type) = event {
                    let data = serde_json::from_str(&data).unwrap_or(serde_json::Value::String(data));
                    return Some(SseMessage {
                        event_type,
                        room_id: String::new(),
                        data,
                    });
                }
                tracing::debug!(error = %e, "failed to parse SSE frame");
                None
            }
        }
    }
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) * (1 ± 0.25)`
fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exp = i32::try_from(attempt.min(30)).unwrap_or(30);
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exp);
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic jitter seeded from the attempt number.
    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    let with_jitter = (capped * jitter_factor).max(0.0);

    Duration::from_secs_f64(with_jitter)
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn message(event_type: &str, room_id: &str) -> SseMessage {
        SseMessage {
            event_type: event_type.into(),
            room_id: room_id.into(),
            data: serde_json::Value::Null,
        }
    }

    #[test]
    fn backoff_increases_exponentially() {
        let config = ReconnectConfig::default();

        let d0 = calculate_backoff(0, &config);
        let d1 = calculate_backoff(1, &config);
        let d2 = calculate_backoff(2, &config);

        assert!(d1 > d0, "d1 ({d1:?}) should be greater than d0 ({d0:?})");
        assert!(d2 > d1, "d2 ({d2:?}) should be greater than d1 ({d1:?})");
    }

    #[test]
    fn backoff_caps_at_max_delay() {
        let config = ReconnectConfig {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            max_retries: None,
        };

        let d = calculate_backoff(40, &config);
        assert!(d <= Duration::from_millis(12_500), "got {d:?}");
    }

    #[test]
    fn room_filter_matches_any_event_for_that_room() {
        let filter = SubscriptionFilter::room("r1");
        assert!(filter.matches(&message("log", "r1")));
        assert!(filter.matches(&message("conn_stats", "r1")));
        assert!(!filter.matches(&message("log", "r2")));
    }

    #[test]
    fn list_filter_matches_one_event_for_every_room() {
        let filter = SubscriptionFilter::all("list_change");
        assert!(filter.matches(&message("list_change", "r1")));
        assert!(filter.matches(&message("list_change", "")));
        assert!(!filter.matches(&message("live_update", "r1")));
    }

    #[test]
    fn decoder_emits_on_blank_line() {
        let mut decoder = SseDecoder::default();
        let out = decoder.feed(b"data: {\"type\":\"live_update\",\"room_id\":\"r1\"}\n");
        assert!(out.is_empty());

        let out = decoder.feed(b"\n");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].event_type, "live_update");
        assert_eq!(out[0].room_id, "r1");
    }

    #[test]
    fn decoder_handles_split_multibyte_and_crlf() {
        let frame = "data: {\"type\":\"log\",\"room_id\":\"r1\",\"data\":\"录制开始\"}\r\n\r\n";
        let bytes = frame.as_bytes();
        // Split inside the first CJK character.
        let cut = frame.find('录').unwrap() + 1;

        let mut decoder = SseDecoder::default();
        assert!(decoder.feed(&bytes[..cut]).is_empty());
        let out = decoder.feed(&bytes[cut..]);

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].data, serde_json::json!("录制开始"));
    }

    #[test]
    fn decoder_discards_oversized_pending_line() {
        let mut decoder = SseDecoder::default();
        let junk = vec![b'x'; MAX_PENDING_BYTES + 1];
        assert!(decoder.feed(b"data: {\"type\":").is_empty());
        assert!(decoder.feed(&junk).is_empty());
        assert!(decoder.buf.is_empty());

        // The stream recovers at the next complete line.
        let out = decoder.feed(b"\ndata: {\"type\":\"live_update\"}\n\n");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].event_type, "live_update");
    }

    #[test]
    fn decoder_skips_comments_and_malformed_frames() {
        let mut decoder = SseDecoder::default();
        let out = decoder.feed(b": keep-alive\n\ndata: not json\n\ndata: {\"type\":\"x\"}\n\n");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].event_type, "x");
    }

    #[test]
    fn decoder_uses_event_field_for_bare_payloads() {
        let mut decoder = SseDecoder::default();
        let out = decoder.feed(b"event: ping\ndata: 42\n\n");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].event_type, "ping");
        assert_eq!(out[0].data, serde_json::json!(42));
    }

    #[test]
    fn decoder_joins_multiline_data() {
        let mut decoder = SseDecoder::default();
        let out = decoder.feed(b"data: {\"type\":\"log\",\ndata: \"room_id\":\"r9\"}\n\n");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].room_id, "r9");
    }

    #[test]
    fn dispatch_tags_each_delivery_with_its_subscription() {
        let registry: Registry = DashMap::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let room = SubscriptionId::new();
        let list = SubscriptionId::new();
        let other = SubscriptionId::new();
        registry.insert(room, Subscriber { filter: SubscriptionFilter::room("r1"), inbox: tx.clone() });
        registry.insert(list, Subscriber { filter: SubscriptionFilter::all("live_update"), inbox: tx.clone() });
        registry.insert(other, Subscriber { filter: SubscriptionFilter::room("r2"), inbox: tx });

        let delivered = dispatch(message("live_update", "r1"), &registry);
        assert_eq!(delivered, 2);

        let mut seen = vec![rx.try_recv().unwrap().subscription, rx.try_recv().unwrap().subscription];
        seen.sort_by_key(|id| id.to_string());
        let mut expected = vec![room, list];
        expected.sort_by_key(|id| id.to_string());
        assert_eq!(seen, expected);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn dispatch_survives_closed_inbox() {
        let registry: Registry = DashMap::new();
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        registry.insert(SubscriptionId::new(), Subscriber { filter: SubscriptionFilter::room("r1"), inbox: tx });

        assert_eq!(dispatch(message("log", "r1"), &registry), 0);
    }

    #[tokio::test]
    async fn subscribe_after_shutdown_is_rejected() {
        let cancel = CancellationToken::new();
        let hub = SseHub::connect(
            reqwest::Client::new(),
            Url::parse("http://127.0.0.1:9/api/sse").unwrap(),
            ReconnectConfig::default(),
            cancel,
        );
        let (tx, _rx) = mpsc::unbounded_channel();

        let id = hub.subscribe(SubscriptionFilter::room("r1"), tx.clone()).unwrap();
        assert_eq!(hub.subscription_count(), 1);
        assert!(hub.unsubscribe(&id));
        assert!(!hub.unsubscribe(&id));

        hub.shutdown();
        assert!(matches!(
            hub.subscribe(SubscriptionFilter::room("r1"), tx),
            Err(Error::SseClosed)
        ));
    }
}
