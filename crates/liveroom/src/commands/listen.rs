//! `liveroom start` / `liveroom stop`: toggle monitoring of a room.

use liveroom_core::{LiveTransport, RoomSummary};

use crate::cli::RoomArgs;
use crate::error::CliError;
use crate::output;

use super::util::{Context, resolve_room};

pub async fn start(transport: &LiveTransport, args: &RoomArgs, ctx: &Context) -> Result<(), CliError> {
    let room = resolve_room(transport, &args.room).await?;
    let updated = RoomSummary::from(transport.start_listening(&room.id).await?);
    tracing::info!(room = %updated.id, "monitoring started");
    report(&updated, "monitoring started", ctx)
}

pub async fn stop(transport: &LiveTransport, args: &RoomArgs, ctx: &Context) -> Result<(), CliError> {
    let room = resolve_room(transport, &args.room).await?;
    let updated = RoomSummary::from(transport.stop_listening(&room.id).await?);
    tracing::info!(room = %updated.id, "monitoring stopped");
    report(&updated, "monitoring stopped", ctx)
}

fn report(room: &RoomSummary, action: &str, ctx: &Context) -> Result<(), CliError> {
    let rendered = output::render_single(
        ctx.format,
        room,
        |r| format!("{} ({}): {action}", r.name, r.id),
        |r| r.id.to_string(),
    )?;
    ctx.print(&rendered);
    Ok(())
}
