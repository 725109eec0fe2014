// ── Effects and completions ──
//
// Reducers never touch the network. They return `Effect`s; the run loop
// turns each `Request` into a task whose result comes back as a
// `Completion` tagged with the expansion generation it was issued for.

use std::sync::Arc;
use std::time::Duration;

use liveroom_api::{ForceRefreshResponse, LiveSummary};
use strum::Display;
use tokio::task::JoinSet;

use crate::error::CoreError;
use crate::model::{RoomDetail, RoomId};
use crate::transport::Transport;

/// Severity of a [`Notification`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// Non-fatal, user-visible message broadcast by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NoticeLevel,
    pub room: Option<RoomId>,
    pub message: String,
}

impl Notification {
    pub fn info(room: Option<RoomId>, message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            room,
            message: message.into(),
        }
    }

    pub fn warning(room: Option<RoomId>, message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            room,
            message: message.into(),
        }
    }

    pub fn error(room: Option<RoomId>, message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            room,
            message: message.into(),
        }
    }
}

/// Network or timer work requested by a reducer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Request {
    List,
    Detail { room: RoomId, generation: u64 },
    Logs { room: RoomId, generation: u64 },
    ForceRefresh { room: RoomId, generation: u64 },
    /// Re-read the detail after `delay`, if the room is still expanded.
    DelayedDetail {
        room: RoomId,
        generation: u64,
        delay: Duration,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Effect {
    Request(Request),
    Notify(Notification),
    /// Replace the poll timer with one of this period.
    ResetPollTimer(Duration),
}

impl From<Request> for Effect {
    fn from(request: Request) -> Self {
        Self::Request(request)
    }
}

/// Result of a finished [`Request`].
#[derive(Debug)]
pub(crate) enum Completion {
    List(Result<Vec<LiveSummary>, CoreError>),
    Detail {
        room: RoomId,
        generation: u64,
        result: Result<RoomDetail, CoreError>,
    },
    Logs {
        room: RoomId,
        generation: u64,
        result: Result<Vec<String>, CoreError>,
    },
    ForceRefresh {
        room: RoomId,
        generation: u64,
        result: Result<ForceRefreshResponse, CoreError>,
    },
    DelayElapsed {
        room: RoomId,
        generation: u64,
    },
}

/// Run `request` on `tasks`; its completion is picked up by the run loop.
pub(crate) fn spawn_request<T: Transport>(
    request: Request,
    tasks: &mut JoinSet<Completion>,
    transport: &Arc<T>,
    log_lines: usize,
) {
    let transport = Arc::clone(transport);
    match request {
        Request::List => {
            tasks.spawn(async move { Completion::List(transport.list_lives().await) });
        }
        Request::Detail { room, generation } => {
            tasks.spawn(async move {
                let result = transport.live_detail(&room).await;
                Completion::Detail {
                    room,
                    generation,
                    result,
                }
            });
        }
        Request::Logs { room, generation } => {
            tasks.spawn(async move {
                let result = transport.live_logs(&room, log_lines).await;
                Completion::Logs {
                    room,
                    generation,
                    result,
                }
            });
        }
        Request::ForceRefresh { room, generation } => {
            tasks.spawn(async move {
                let result = transport.force_refresh(&room).await;
                Completion::ForceRefresh {
                    room,
                    generation,
                    result,
                }
            });
        }
        Request::DelayedDetail {
            room,
            generation,
            delay,
        } => {
            tasks.spawn(async move {
                tokio::time::sleep(delay).await;
                Completion::DelayElapsed { room, generation }
            });
        }
    }
}
