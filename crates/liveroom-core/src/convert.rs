// ── API-to-domain type conversions ──
//
// Bridges raw `liveroom_api` response types into canonical domain types.

use liveroom_api::LiveSummary;

use crate::model::{RoomId, RoomSummary, RoomTag};

impl From<LiveSummary> for RoomSummary {
    fn from(live: LiveSummary) -> Self {
        let tags = RoomTag::derive(
            live.listening,
            live.recording,
            live.recording_preparing,
            live.initializing,
        );
        let name = match live.nick_name {
            Some(nick) if !nick.is_empty() => nick,
            _ => live.host_name,
        };

        RoomSummary {
            id: RoomId::from(live.id),
            name,
            room_name: live.room_name,
            live_url: live.live_url,
            platform: live.platform_cn_name,
            tags,
            listening: live.listening,
            last_error: live.last_error.filter(|e| !e.is_empty()),
        }
    }
}
