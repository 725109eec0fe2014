// liveroom-core: sync engine between liveroom-api and consumers (CLI).

pub mod config;
pub mod convert;
pub mod engine;
pub mod error;
pub mod event;
pub mod model;
pub mod reconciler;
pub mod store;
pub mod stream;
pub mod subscription;
pub mod transport;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::EngineConfig;
pub use engine::{EngineHandle, EngineStatus, NoticeLevel, Notification, SyncEngine};
pub use error::CoreError;
pub use event::{ListChangeKind, PushEvent};
pub use reconciler::{Reconciler, RefreshSnapshot};
pub use store::DataStore;
pub use stream::RoomStream;
pub use subscription::{ListTopic, SubscriptionManager};
pub use transport::{LiveTransport, PushSubscriber, Transport};

pub use model::{
    NO_COUNTDOWN, RefreshState, RefreshStatus, RoomDetail, RoomId, RoomSummary, RoomTag,
    SortColumn, SortOrder, SortState, derive_status, sort_rooms,
};
