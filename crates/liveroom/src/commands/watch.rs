//! `liveroom watch`: follow the recorder through the sync engine until Ctrl-C.
//!
//! Table and plain output print human-readable lines; the structured
//! formats emit one compact JSON object per event.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Local;
use serde::Serialize;
use tokio::sync::broadcast;

use liveroom_core::{
    EngineConfig, EngineStatus, LiveTransport, Notification, RefreshState, RefreshStatus, RoomId,
    RoomSummary, SyncEngine,
};

use crate::cli::{OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

use super::lives::{RoomRow, arrange};
use super::util::{Context, resolve_room};

#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum WatchEvent<'a> {
    Rooms {
        rooms: &'a [Arc<RoomSummary>],
    },
    Refresh {
        room: &'a RoomId,
        #[serde(flatten)]
        state: RefreshState,
    },
    Notice {
        #[serde(flatten)]
        notice: NoticeView<'a>,
    },
    Status {
        push_enabled: bool,
        poll_period_secs: u64,
        expanded: &'a [RoomId],
    },
}

#[derive(Debug, Serialize)]
struct NoticeView<'a> {
    level: String,
    room: Option<&'a RoomId>,
    message: &'a str,
}

struct Printer<'a> {
    ctx: &'a Context,
    /// Last printed status per expanded room.
    last: HashMap<RoomId, RefreshStatus>,
}

impl Printer<'_> {
    fn structured(&self) -> bool {
        !matches!(self.ctx.format, OutputFormat::Table | OutputFormat::Plain)
    }

    fn emit(&self, event: &WatchEvent<'_>, human: impl FnOnce() -> String) -> Result<(), CliError> {
        let line = if self.structured() {
            serde_json::to_string(event)?
        } else {
            format!("[{}] {}", Local::now().format("%H:%M:%S"), human())
        };
        self.ctx.print(&line);
        Ok(())
    }

    fn rooms(&self, rooms: &[Arc<RoomSummary>]) -> Result<(), CliError> {
        let rooms = arrange(rooms.iter().cloned(), None, self.ctx.config.sort);
        self.emit(&WatchEvent::Rooms { rooms: &rooms }, || {
            let rows: Vec<RoomRow> = rooms.iter().map(RoomRow::from).collect();
            format!("{} rooms\n{}", rooms.len(), output::render_table(&rows))
        })
    }

    /// Print rooms whose status changed since the last snapshot.
    fn refresh(&mut self, snapshot: &HashMap<RoomId, RefreshState>) -> Result<(), CliError> {
        self.last.retain(|room, _| snapshot.contains_key(room));
        let mut rooms: Vec<_> = snapshot.iter().collect();
        rooms.sort_by(|a, b| a.0.cmp(b.0));
        for (room, state) in rooms {
            if self.last.get(room) == Some(&state.status) {
                continue;
            }
            self.last.insert(room.clone(), state.status);
            let color = self.ctx.color;
            self.emit(
                &WatchEvent::Refresh {
                    room,
                    state: *state,
                },
                || {
                    format!(
                        "{room}: {} (next in {})",
                        output::status_label(state.status, color),
                        output::countdown_label(state.countdown_secs)
                    )
                },
            )?;
        }
        Ok(())
    }

    fn notice(&self, notice: &Notification) -> Result<(), CliError> {
        let view = NoticeView {
            level: notice.level.to_string(),
            room: notice.room.as_ref(),
            message: &notice.message,
        };
        let color = self.ctx.color;
        self.emit(&WatchEvent::Notice { notice: view }, || {
            let label = output::notice_label(notice.level, color);
            match notice.room {
                Some(ref room) => format!("{label} {room}: {}", notice.message),
                None => format!("{label}: {}", notice.message),
            }
        })
    }

    fn status(&self, status: &EngineStatus) -> Result<(), CliError> {
        self.emit(
            &WatchEvent::Status {
                push_enabled: status.push_enabled,
                poll_period_secs: status.poll_period.as_secs(),
                expanded: &status.expanded,
            },
            || {
                format!(
                    "push {}, polling every {}, {} subscriptions",
                    if status.push_enabled { "on" } else { "off" },
                    humantime::format_duration(status.poll_period),
                    status.open_subscriptions
                )
            },
        )
    }
}

pub async fn handle(
    transport: Arc<LiveTransport>,
    mut engine_config: EngineConfig,
    args: &WatchArgs,
    ctx: &Context,
) -> Result<(), CliError> {
    if args.push || args.no_push {
        engine_config.push_enabled = args.push;
        if args.save {
            liveroom_config::set_push_enabled(args.push)?;
        }
    }

    let mut rooms = Vec::with_capacity(args.rooms.len());
    for identifier in &args.rooms {
        rooms.push(resolve_room(transport.as_ref(), identifier).await?.id);
    }

    let engine = SyncEngine::spawn(Arc::clone(&transport), engine_config);
    let result = follow(&engine, &rooms, ctx).await;

    engine.dispose().await;
    transport.shutdown();
    result
}

async fn follow(engine: &SyncEngine, rooms: &[RoomId], ctx: &Context) -> Result<(), CliError> {
    let handle = engine.handle();
    let mut notices = handle.notifications();
    let mut states = handle.refresh_states();
    let mut status = handle.status();
    let mut list = handle.store().subscribe_rooms();

    for room in rooms {
        handle.expand(room.clone()).await?;
    }

    let mut printer = Printer {
        ctx,
        last: HashMap::new(),
    };
    printer.status(&status.borrow_and_update().clone())?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                tracing::info!("interrupted, shutting down");
                return Ok(());
            }

            Some(snapshot) = list.changed() => printer.rooms(&snapshot)?,

            Ok(()) = states.changed() => {
                let snapshot = Arc::clone(&states.borrow_and_update());
                printer.refresh(&snapshot)?;
            }

            Ok(()) = status.changed() => {
                let current = status.borrow_and_update().clone();
                printer.status(&current)?;
            }

            notice = notices.recv() => match notice {
                Ok(notice) => printer.notice(&notice)?,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "dropped notifications");
                }
                Err(broadcast::error::RecvError::Closed) => return Ok(()),
            },
        }
    }
}
