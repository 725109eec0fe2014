//! `liveroom lives`: the room list, filtered and sorted.

use std::str::FromStr;
use std::sync::Arc;

use tabled::Tabled;

use liveroom_core::{RoomSummary, RoomTag, SortColumn, SortOrder, SortState, Transport, sort_rooms};

use crate::cli::{LivesArgs, SortDirection, SortKey};
use crate::error::CliError;
use crate::output;

use super::util::Context;

#[derive(Tabled)]
pub struct RoomRow {
    #[tabled(rename = "ID")]
    pub id: String,
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "Room")]
    pub room_name: String,
    #[tabled(rename = "Platform")]
    pub platform: String,
    #[tabled(rename = "Tags")]
    pub tags: String,
    #[tabled(rename = "Error")]
    pub error: String,
}

impl From<&Arc<RoomSummary>> for RoomRow {
    fn from(room: &Arc<RoomSummary>) -> Self {
        Self {
            id: room.id.to_string(),
            name: room.name.clone(),
            room_name: room.room_name.clone(),
            platform: room.platform.clone(),
            tags: room
                .tags
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" "),
            error: room.last_error.clone().unwrap_or_default(),
        }
    }
}

fn sort_state(key: SortKey, direction: Option<SortDirection>) -> SortState {
    let column = match key {
        SortKey::Name => SortColumn::Name,
        SortKey::Address => SortColumn::Address,
        SortKey::Tags => SortColumn::Tags,
    };
    let order = match direction.unwrap_or(SortDirection::Ascend) {
        SortDirection::Ascend => SortOrder::Ascend,
        SortDirection::Descend => SortOrder::Descend,
    };
    SortState::new(column, order)
}

/// Apply the tag filter and the sort to a fetched list.
pub fn arrange(
    rooms: impl IntoIterator<Item = Arc<RoomSummary>>,
    tag: Option<RoomTag>,
    sort: SortState,
) -> Vec<Arc<RoomSummary>> {
    let mut rooms: Vec<_> = rooms
        .into_iter()
        .filter(|room| tag.is_none_or(|t| room.has_tag(t)))
        .collect();
    sort_rooms(&mut rooms, sort);
    rooms
}

pub async fn handle<T: Transport>(
    transport: &T,
    args: &LivesArgs,
    ctx: &Context,
) -> Result<(), CliError> {
    let tag = args
        .tag
        .as_deref()
        .map(|t| {
            RoomTag::from_str(t).map_err(|_| CliError::Validation {
                field: "tag".into(),
                reason: format!("unknown tag '{t}'"),
            })
        })
        .transpose()?;

    let sort = match args.sort {
        Some(key) => {
            let sort = sort_state(key, args.order);
            liveroom_config::set_sort(sort)?;
            sort
        }
        None => ctx.config.sort,
    };

    let lives = transport.list_lives().await?;
    let rooms = arrange(lives.into_iter().map(|l| Arc::new(RoomSummary::from(l))), tag, sort);
    tracing::debug!(count = rooms.len(), ?sort, "room list fetched");

    let rendered = output::render_list(ctx.format, &rooms, |r| RoomRow::from(r), |r| r.id.to_string())?;
    ctx.print(&rendered);
    Ok(())
}
