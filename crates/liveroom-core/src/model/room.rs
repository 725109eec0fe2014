use std::fmt;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Opaque, stable room identifier assigned by the recorder.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for RoomId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Status tag shown next to a room.
///
/// Labels are the recorder's own wording and double as the serialized form.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
pub enum RoomTag {
    #[serde(rename = "监控中")]
    #[strum(serialize = "监控中")]
    Listening,
    #[serde(rename = "已停止")]
    #[strum(serialize = "已停止")]
    Stopped,
    #[serde(rename = "录制中")]
    #[strum(serialize = "录制中")]
    Recording,
    #[serde(rename = "录制准备中")]
    #[strum(serialize = "录制准备中")]
    RecordingPreparing,
    #[serde(rename = "初始化")]
    #[strum(serialize = "初始化")]
    Initializing,
}

impl RoomTag {
    /// Rank used when sorting by tags: recording rooms first.
    pub fn recording_priority(self) -> u8 {
        match self {
            Self::Recording => 2,
            Self::RecordingPreparing => 1,
            Self::Listening | Self::Stopped | Self::Initializing => 0,
        }
    }

    /// Derive the tag set from a room's status flags.
    ///
    /// `recording` replaces the listening/stopped tag, `recording_preparing`
    /// only applies when not recording, and `initializing` is appended.
    pub fn derive(
        listening: bool,
        recording: bool,
        recording_preparing: bool,
        initializing: bool,
    ) -> IndexSet<RoomTag> {
        let mut tags = IndexSet::new();
        if recording {
            tags.insert(Self::Recording);
        } else if recording_preparing {
            tags.insert(Self::RecordingPreparing);
        } else if listening {
            tags.insert(Self::Listening);
        } else {
            tags.insert(Self::Stopped);
        }
        if initializing {
            tags.insert(Self::Initializing);
        }
        tags
    }
}

/// One row of the room list, replaced wholesale on every full pull.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomSummary {
    pub id: RoomId,
    /// Streamer nickname, falling back to the host name.
    pub name: String,
    pub room_name: String,
    pub live_url: String,
    /// Platform display name; the "address" sort column.
    pub platform: String,
    pub tags: IndexSet<RoomTag>,
    pub listening: bool,
    pub last_error: Option<String>,
}

impl RoomSummary {
    pub fn has_tag(&self, tag: RoomTag) -> bool {
        self.tags.contains(&tag)
    }

    /// Highest recording priority among this room's tags.
    pub fn recording_priority(&self) -> u8 {
        self.tags
            .iter()
            .map(|t| t.recording_priority())
            .max()
            .unwrap_or(0)
    }
}
