// liveroom-api: Async Rust client for the live-room recorder (REST + SSE)

pub mod client;
pub mod error;
pub mod models;
pub mod sse;
pub mod transport;

pub use client::LiveClient;
pub use error::Error;
pub use models::{
    ForceRefreshResponse, LiveSummary, LogsResponse, NewLive, RateLimitInfo, RemoveLiveRequest,
    SchedulerStatus, SseMessage,
};
pub use sse::{
    EventFilter, PushEnvelope, ReconnectConfig, Scope, SseHub, SubscriptionFilter, SubscriptionId,
};
pub use transport::TransportConfig;
