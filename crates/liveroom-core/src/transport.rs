// ── Transport seam ──
//
// The engine talks to the recorder only through these traits, so tests
// can drive it with a scripted fake. `LiveTransport` is the real thing:
// REST via `LiveClient`, push via a lazily-connected `SseHub`.

use std::future::Future;
use std::sync::OnceLock;

use liveroom_api::{
    ForceRefreshResponse, LiveClient, LiveSummary, NewLive, PushEnvelope, ReconnectConfig, SseHub,
    SubscriptionFilter, SubscriptionId, TransportConfig,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::EngineConfig;
use crate::error::CoreError;
use crate::model::{RoomDetail, RoomId};

/// Push side of the transport: filter-based subscriptions.
pub trait PushSubscriber: Send + Sync + 'static {
    /// Register `filter`; matching messages arrive in `inbox` tagged with
    /// the returned id.
    fn subscribe(
        &self,
        filter: SubscriptionFilter,
        inbox: mpsc::UnboundedSender<PushEnvelope>,
    ) -> Result<SubscriptionId, CoreError>;

    /// Drop a subscription by the exact id `subscribe` returned.
    fn unsubscribe(&self, id: &SubscriptionId) -> bool;
}

/// Pull side of the transport plus push subscriptions.
pub trait Transport: PushSubscriber {
    fn list_lives(&self) -> impl Future<Output = Result<Vec<LiveSummary>, CoreError>> + Send;

    fn live_detail(
        &self,
        room: &RoomId,
    ) -> impl Future<Output = Result<RoomDetail, CoreError>> + Send;

    fn live_logs(
        &self,
        room: &RoomId,
        lines: usize,
    ) -> impl Future<Output = Result<Vec<String>, CoreError>> + Send;

    fn force_refresh(
        &self,
        room: &RoomId,
    ) -> impl Future<Output = Result<ForceRefreshResponse, CoreError>> + Send;
}

// ── LiveTransport ────────────────────────────────────────────────────

/// HTTP + SSE transport for a recorder instance.
///
/// The push stream is only opened on the first subscription, so one-shot
/// CLI commands never touch it.
pub struct LiveTransport {
    client: LiveClient,
    stream_http: reqwest::Client,
    sse_url: Url,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
    hub: OnceLock<SseHub>,
}

impl LiveTransport {
    pub fn new(config: &EngineConfig) -> Result<Self, CoreError> {
        let transport = TransportConfig {
            timeout: config.timeout,
            accept_invalid_certs: config.accept_invalid_certs,
        };
        let client = LiveClient::new(&config.base_url, &transport)?;
        let sse_url = client.sse_url()?;
        let stream_http = transport.build_stream_client()?;

        Ok(Self {
            client,
            stream_http,
            sse_url,
            reconnect: config.reconnect.clone(),
            cancel: CancellationToken::new(),
            hub: OnceLock::new(),
        })
    }

    /// Underlying REST client, for operations outside the engine.
    pub fn client(&self) -> &LiveClient {
        &self.client
    }

    /// Whether the push stream is currently open (false until first use).
    pub fn push_connected(&self) -> bool {
        self.hub
            .get()
            .is_some_and(|hub| *hub.connection_state().borrow())
    }

    pub async fn start_listening(&self, room: &RoomId) -> Result<LiveSummary, CoreError> {
        Ok(self.client.start_listening(room.as_str()).await?)
    }

    pub async fn stop_listening(&self, room: &RoomId) -> Result<LiveSummary, CoreError> {
        Ok(self.client.stop_listening(room.as_str()).await?)
    }

    /// Add rooms by URL; returns the ones the recorder accepted.
    pub async fn add_lives(
        &self,
        urls: &[String],
        listen: bool,
    ) -> Result<Vec<LiveSummary>, CoreError> {
        let rooms: Vec<NewLive> = urls
            .iter()
            .map(|url| NewLive {
                url: url.trim().to_owned(),
                listen,
            })
            .collect();
        Ok(self.client.add_lives(&rooms).await?)
    }

    pub async fn remove_live(&self, room: &RoomId, delete_files: bool) -> Result<(), CoreError> {
        Ok(self.client.remove_live(room.as_str(), delete_files).await?)
    }

    /// Stop the push reader, if one was started.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    fn hub(&self) -> &SseHub {
        self.hub.get_or_init(|| {
            tracing::info!(url = %self.sse_url, "opening push stream");
            SseHub::connect(
                self.stream_http.clone(),
                self.sse_url.clone(),
                self.reconnect.clone(),
                self.cancel.child_token(),
            )
        })
    }
}

impl PushSubscriber for LiveTransport {
    fn subscribe(
        &self,
        filter: SubscriptionFilter,
        inbox: mpsc::UnboundedSender<PushEnvelope>,
    ) -> Result<SubscriptionId, CoreError> {
        if self.cancel.is_cancelled() {
            return Err(liveroom_api::Error::SseClosed.into());
        }
        Ok(self.hub().subscribe(filter, inbox)?)
    }

    fn unsubscribe(&self, id: &SubscriptionId) -> bool {
        self.hub.get().is_some_and(|hub| hub.unsubscribe(id))
    }
}

impl Transport for LiveTransport {
    async fn list_lives(&self) -> Result<Vec<LiveSummary>, CoreError> {
        Ok(self.client.list_lives().await?)
    }

    async fn live_detail(&self, room: &RoomId) -> Result<RoomDetail, CoreError> {
        let fields = self.client.get_live(room.as_str()).await?;
        Ok(RoomDetail::new(fields))
    }

    async fn live_logs(&self, room: &RoomId, lines: usize) -> Result<Vec<String>, CoreError> {
        Ok(self.client.get_logs(room.as_str(), lines).await?.lines)
    }

    async fn force_refresh(&self, room: &RoomId) -> Result<ForceRefreshResponse, CoreError> {
        Ok(self.client.force_refresh(room.as_str()).await?)
    }
}
