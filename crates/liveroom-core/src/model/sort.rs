use std::cmp::Ordering;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::RoomSummary;

/// Sortable column of the room list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SortColumn {
    Name,
    /// Platform name.
    Address,
    /// Recording priority.
    Tags,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SortOrder {
    Ascend,
    Descend,
}

/// Last-applied table sort, persisted between sessions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortState {
    #[serde(default)]
    pub column_key: Option<SortColumn>,
    #[serde(default)]
    pub order: Option<SortOrder>,
}

impl SortState {
    pub fn new(column_key: SortColumn, order: SortOrder) -> Self {
        Self {
            column_key: Some(column_key),
            order: Some(order),
        }
    }
}

/// Sort rooms in place. Stable; a missing column or order keeps list order.
pub fn sort_rooms(rooms: &mut [Arc<RoomSummary>], sort: SortState) {
    let (Some(column), Some(order)) = (sort.column_key, sort.order) else {
        return;
    };
    rooms.sort_by(|a, b| {
        let ord = compare(a, b, column);
        match order {
            SortOrder::Ascend => ord,
            SortOrder::Descend => ord.reverse(),
        }
    });
}

fn compare(a: &RoomSummary, b: &RoomSummary, column: SortColumn) -> Ordering {
    match column {
        SortColumn::Name => a.name.cmp(&b.name),
        SortColumn::Address => a.platform.cmp(&b.platform),
        SortColumn::Tags => a.recording_priority().cmp(&b.recording_priority()),
    }
}
