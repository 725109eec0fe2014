// ── Domain model ──
//
// Canonical types for rooms, their open-ended detail objects, and the
// derived refresh status. Wire shapes live in liveroom-api; conversion
// happens in `crate::convert`.

mod detail;
mod room;
mod sort;
mod status;

pub use detail::RoomDetail;
pub use room::{RoomId, RoomSummary, RoomTag};
pub use sort::{SortColumn, SortOrder, SortState, sort_rooms};
pub use status::{NO_COUNTDOWN, RefreshState, RefreshStatus, derive_status};
