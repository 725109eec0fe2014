//! `liveroom show`: one room's detail, derived refresh status and logs.

use std::fmt::Write as _;

use serde::Serialize;

use liveroom_core::{RefreshStatus, RoomDetail, RoomSummary, Transport, derive_status};

use crate::cli::ShowArgs;
use crate::error::CliError;
use crate::output;

use super::util::{Context, resolve_room};

#[derive(Debug, Serialize)]
pub struct RoomView {
    pub room: RoomSummary,
    pub refresh_status: RefreshStatus,
    pub countdown_secs: i64,
    pub detail: RoomDetail,
    pub logs: Vec<String>,
}

impl RoomView {
    pub fn new(room: RoomSummary, detail: RoomDetail, logs: Vec<String>) -> Self {
        let (refresh_status, countdown_secs) = derive_status(
            detail.scheduler_status().as_ref(),
            detail.rate_limit_info().as_ref(),
            detail.platform_rate_limit(),
        );
        Self {
            room,
            refresh_status,
            countdown_secs,
            detail,
            logs,
        }
    }

    fn render_detail(&self, color: bool) -> String {
        let room = &self.room;
        let tags: Vec<String> = room.tags.iter().map(ToString::to_string).collect();
        let mut out = String::new();
        let _ = writeln!(out, "ID:         {}", room.id);
        let _ = writeln!(out, "Name:       {}", room.name);
        let _ = writeln!(out, "Room:       {}", room.room_name);
        let _ = writeln!(out, "Platform:   {}", room.platform);
        let _ = writeln!(out, "URL:        {}", room.live_url);
        let _ = writeln!(out, "Tags:       {}", tags.join(" "));
        let _ = writeln!(
            out,
            "Refresh:    {} (next in {})",
            output::status_label(self.refresh_status, color),
            output::countdown_label(self.countdown_secs)
        );
        if let Some(ref err) = room.last_error {
            let _ = writeln!(out, "Last error: {err}");
        }
        if !self.logs.is_empty() {
            let _ = writeln!(out, "\nLogs ({}):", self.logs.len());
            for line in &self.logs {
                let _ = writeln!(out, "  {line}");
            }
        }
        out.trim_end().to_owned()
    }
}

pub async fn handle<T: Transport>(
    transport: &T,
    args: &ShowArgs,
    ctx: &Context,
) -> Result<(), CliError> {
    let room = resolve_room(transport, &args.room).await?;
    let lines = args.lines.unwrap_or(ctx.config.log_lines);

    let detail = transport.live_detail(&room.id).await?;
    let logs = transport.live_logs(&room.id, lines).await?;
    let view = RoomView::new(room, detail, logs);

    let rendered = output::render_single(
        ctx.format,
        &view,
        |v| v.render_detail(ctx.color),
        |v| format!("{}\t{}\t{}", v.room.id, v.refresh_status, v.countdown_secs),
    )?;
    ctx.print(&rendered);
    Ok(())
}
