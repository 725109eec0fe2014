//! `liveroom add` / `liveroom remove`: manage the recorder's room list.

use std::sync::Arc;

use url::Url;

use liveroom_core::{LiveTransport, RoomSummary};

use crate::cli::{AddArgs, RemoveArgs};
use crate::error::CliError;
use crate::output;

use super::lives::RoomRow;
use super::util::{Context, resolve_room};

/// Trim and validate a room URL; a bare host gets `https://`.
pub fn normalize_room_url(raw: &str) -> Result<String, CliError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(CliError::Validation {
            field: "url".into(),
            reason: "room URL is empty".into(),
        });
    }

    let candidate = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_owned()
    } else {
        format!("https://{trimmed}")
    };
    let url = Url::parse(&candidate).map_err(|e| CliError::Validation {
        field: "url".into(),
        reason: format!("'{trimmed}': {e}"),
    })?;
    if url.host_str().is_none() {
        return Err(CliError::Validation {
            field: "url".into(),
            reason: format!("'{trimmed}' has no host"),
        });
    }
    Ok(url.into())
}

pub async fn add(transport: &LiveTransport, args: &AddArgs, ctx: &Context) -> Result<(), CliError> {
    let urls = args
        .urls
        .iter()
        .map(|raw| normalize_room_url(raw))
        .collect::<Result<Vec<_>, _>>()?;

    let added: Vec<Arc<RoomSummary>> = transport
        .add_lives(&urls, !args.no_listen)
        .await?
        .into_iter()
        .map(|live| Arc::new(RoomSummary::from(live)))
        .collect();

    if added.is_empty() {
        return Err(CliError::AddRejected {
            urls: urls.join(", "),
        });
    }
    if added.len() < urls.len() {
        tracing::warn!(
            requested = urls.len(),
            accepted = added.len(),
            "recorder skipped some room URLs"
        );
    }
    tracing::info!(count = added.len(), "rooms added");

    let rendered = output::render_list(ctx.format, &added, |r| RoomRow::from(r), |r| r.id.to_string())?;
    ctx.print(&rendered);
    Ok(())
}

pub async fn remove(
    transport: &LiveTransport,
    args: &RemoveArgs,
    ctx: &Context,
) -> Result<(), CliError> {
    let room = resolve_room(transport, &args.room).await?;
    transport.remove_live(&room.id, args.delete_files).await?;
    tracing::info!(room = %room.id, delete_files = args.delete_files, "room removed");

    let action = if args.delete_files {
        "removed with recordings"
    } else {
        "removed"
    };
    let rendered = output::render_single(
        ctx.format,
        &room,
        |r| format!("{} ({}): {action}", r.name, r.id),
        |r| r.id.to_string(),
    )?;
    ctx.print(&rendered);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn bare_host_gets_https() {
        assert_eq!(
            normalize_room_url("  live.bilibili.com/493 ").unwrap(),
            "https://live.bilibili.com/493"
        );
    }

    #[test]
    fn explicit_scheme_is_kept() {
        assert_eq!(
            normalize_room_url("http://live.douyin.com/1").unwrap(),
            "http://live.douyin.com/1"
        );
    }

    #[test]
    fn empty_url_is_rejected() {
        assert!(matches!(
            normalize_room_url("   "),
            Err(CliError::Validation { .. })
        ));
    }
}
