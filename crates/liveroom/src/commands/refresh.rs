//! `liveroom refresh`: force a refresh through the sync engine.
//!
//! The room is expanded so the reconciler tracks it, the refresh is
//! issued, and the command waits for the outcome notice and the
//! re-derived status that follows it.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};

use liveroom_core::{
    EngineConfig, LiveTransport, NoticeLevel, Notification, RefreshSnapshot, RefreshState,
    RefreshStatus, RoomId, SyncEngine,
};

use crate::cli::RoomArgs;
use crate::error::CliError;
use crate::output;

use super::util::{Context, resolve_room};

pub async fn handle(
    transport: Arc<LiveTransport>,
    engine_config: EngineConfig,
    args: &RoomArgs,
    ctx: &Context,
) -> Result<(), CliError> {
    let room = resolve_room(transport.as_ref(), &args.room).await?;

    let engine = SyncEngine::spawn(
        Arc::clone(&transport),
        EngineConfig {
            push_enabled: false,
            ..engine_config
        },
    );
    let handle = engine.handle().clone();
    let mut notices = handle.notifications();
    let mut states = handle.refresh_states();

    let outcome = tokio::time::timeout(ctx.timeout(), async {
        handle.expand(room.id.clone()).await?;
        let before = wait_for(&mut states, &room.id, |_| true).await?;
        tracing::debug!(room = %room.id, status = %before.status, "current refresh status");

        handle.force_refresh(room.id.clone()).await?;
        let notice = next_outcome(&mut notices, &room.id).await?;
        if notice.level == NoticeLevel::Error {
            return Err(CliError::RefreshRejected {
                message: notice.message,
            });
        }
        let after = wait_for(&mut states, &room.id, |s| s.status != RefreshStatus::Refreshing).await?;
        Ok::<_, CliError>((notice, after))
    })
    .await;

    engine.dispose().await;
    transport.shutdown();

    let (notice, state) = outcome.map_err(|_| CliError::Timeout {
        operation: format!("Refresh of '{}'", room.id),
    })??;

    let line = format!(
        "{} ({}): {} -> {} (next in {})",
        room.name,
        room.id,
        notice.message,
        output::status_label(state.status, ctx.color),
        output::countdown_label(state.countdown_secs),
    );
    let rendered = output::render_single(ctx.format, &state, |_| line.clone(), |s| s.status.to_string())?;
    ctx.print(&rendered);
    Ok(())
}

/// Wait until the room's refresh state satisfies `pred`.
async fn wait_for(
    states: &mut watch::Receiver<RefreshSnapshot>,
    room: &RoomId,
    pred: impl Fn(&RefreshState) -> bool,
) -> Result<RefreshState, CliError> {
    let snapshot = states
        .wait_for(|snap| snap.get(room).is_some_and(&pred))
        .await
        .map_err(|_| CliError::Internal("sync engine stopped unexpectedly".into()))?;
    snapshot
        .get(room)
        .copied()
        .ok_or_else(|| CliError::Internal("refresh state vanished".into()))
}

/// The first info or error notice about `room`; warnings are logged.
async fn next_outcome(
    notices: &mut broadcast::Receiver<Notification>,
    room: &RoomId,
) -> Result<Notification, CliError> {
    loop {
        match notices.recv().await {
            Ok(notice) if notice.room.as_ref() != Some(room) => {}
            Ok(notice) if notice.level == NoticeLevel::Warning => {
                tracing::warn!(room = %room, "{}", notice.message);
            }
            Ok(notice) => return Ok(notice),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "notice receiver lagged");
            }
            Err(broadcast::error::RecvError::Closed) => {
                return Err(CliError::Internal("sync engine stopped unexpectedly".into()));
            }
        }
    }
}
