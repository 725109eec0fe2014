// ── Central entity store ──
//
// The room list is replaced wholesale and broadcast through a `watch`
// channel. Details are merged key by key; a merge for a room with no
// cached detail is dropped.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::{Map, Value};
use tokio::sync::watch;

use crate::model::{RoomDetail, RoomId, RoomSummary};
use crate::stream::{RoomSnapshot, RoomStream};

pub struct DataStore {
    rooms: watch::Sender<RoomSnapshot>,
    details: DashMap<RoomId, RoomDetail>,
    logs: DashMap<RoomId, VecDeque<String>>,
    max_log_lines: usize,
    /// Bumped on every detail or log mutation.
    version: watch::Sender<u64>,
    last_full_refresh: watch::Sender<Option<DateTime<Utc>>>,
    last_push_event: watch::Sender<Option<DateTime<Utc>>>,
}

impl DataStore {
    pub fn new(max_log_lines: usize) -> Self {
        let (rooms, _) = watch::channel(Arc::new(Vec::new()));
        let (version, _) = watch::channel(0);
        let (last_full_refresh, _) = watch::channel(None);
        let (last_push_event, _) = watch::channel(None);

        Self {
            rooms,
            details: DashMap::new(),
            logs: DashMap::new(),
            max_log_lines,
            version,
            last_full_refresh,
            last_push_event,
        }
    }

    // ── Room list ────────────────────────────────────────────────────

    /// Replace the whole room list.
    pub fn replace_list(&self, rooms: Vec<RoomSummary>) {
        let snapshot: RoomSnapshot = Arc::new(rooms.into_iter().map(Arc::new).collect());
        self.rooms.send_replace(snapshot);
        self.last_full_refresh.send_replace(Some(Utc::now()));
    }

    pub fn rooms_snapshot(&self) -> RoomSnapshot {
        self.rooms.borrow().clone()
    }

    pub fn room(&self, id: &RoomId) -> Option<Arc<RoomSummary>> {
        self.rooms.borrow().iter().find(|r| r.id == *id).cloned()
    }

    pub fn subscribe_rooms(&self) -> RoomStream {
        RoomStream::new(self.rooms.subscribe())
    }

    // ── Detail ───────────────────────────────────────────────────────

    /// Install an authoritative detail, replacing any cached one.
    pub fn replace_detail(&self, room: RoomId, detail: RoomDetail) {
        self.details.insert(room, detail);
        self.bump();
    }

    /// Shallow-merge into the cached detail.
    ///
    /// Returns `false` (and changes nothing) when no detail is cached.
    pub fn merge_detail(&self, room: &RoomId, partial: Map<String, Value>) -> bool {
        let merged = match self.details.get_mut(room) {
            Some(mut detail) => {
                detail.merge(partial);
                true
            }
            None => false,
        };
        if merged {
            self.bump();
        } else {
            tracing::trace!(room = %room, "merge without cached detail dropped");
        }
        merged
    }

    /// Merge a single top-level key.
    pub fn merge_key(&self, room: &RoomId, key: &str, value: Value) -> bool {
        let mut partial = Map::new();
        partial.insert(key.to_owned(), value);
        self.merge_detail(room, partial)
    }

    pub fn detail(&self, room: &RoomId) -> Option<RoomDetail> {
        self.details.get(room).map(|d| d.value().clone())
    }

    pub fn has_detail(&self, room: &RoomId) -> bool {
        self.details.contains_key(room)
    }

    // ── Logs ─────────────────────────────────────────────────────────

    /// Replace the log buffer, keeping only the newest lines.
    pub fn replace_logs(&self, room: RoomId, lines: Vec<String>) {
        let skip = lines.len().saturating_sub(self.max_log_lines);
        let buf: VecDeque<String> = lines.into_iter().skip(skip).collect();
        self.logs.insert(room, buf);
        self.bump();
    }

    /// Append a pushed line. Only rooms with a buffer accept lines.
    pub fn append_log(&self, room: &RoomId, line: String) -> bool {
        let appended = match self.logs.get_mut(room) {
            Some(mut buf) => {
                buf.push_back(line);
                while buf.len() > self.max_log_lines {
                    buf.pop_front();
                }
                true
            }
            None => false,
        };
        if appended {
            self.bump();
        }
        appended
    }

    pub fn logs(&self, room: &RoomId) -> Vec<String> {
        self.logs
            .get(room)
            .map(|buf| buf.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Open an empty log buffer so pushed lines are kept before the
    /// initial fetch lands.
    pub fn open_logs(&self, room: RoomId) {
        self.logs.entry(room).or_default();
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Drop everything cached for a collapsed room.
    pub fn remove_room(&self, room: &RoomId) {
        let had_detail = self.details.remove(room).is_some();
        let had_logs = self.logs.remove(room).is_some();
        if had_detail || had_logs {
            self.bump();
        }
    }

    /// Whether any per-room state remains for `room`.
    pub fn has_room_state(&self, room: &RoomId) -> bool {
        self.details.contains_key(room) || self.logs.contains_key(room)
    }

    pub fn clear_room_state(&self) {
        self.details.clear();
        self.logs.clear();
        self.bump();
    }

    // ── Metadata ─────────────────────────────────────────────────────

    pub fn subscribe_changes(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    pub fn last_full_refresh(&self) -> Option<DateTime<Utc>> {
        *self.last_full_refresh.borrow()
    }

    pub fn last_push_event(&self) -> Option<DateTime<Utc>> {
        *self.last_push_event.borrow()
    }

    pub(crate) fn mark_push_event(&self) {
        self.last_push_event.send_replace(Some(Utc::now()));
    }

    fn bump(&self) {
        self.version.send_modify(|v| *v = v.wrapping_add(1));
    }
}

impl Default for DataStore {
    fn default() -> Self {
        Self::new(500)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::RoomTag;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn summary(id: &str) -> RoomSummary {
        RoomSummary {
            id: RoomId::from(id),
            name: id.into(),
            room_name: String::new(),
            live_url: String::new(),
            platform: String::new(),
            tags: RoomTag::derive(false, false, false, false),
            listening: false,
            last_error: None,
        }
    }

    fn fields(v: Value) -> Map<String, Value> {
        v.as_object().unwrap().clone()
    }

    #[test]
    fn merge_without_detail_is_dropped() {
        let store = DataStore::default();
        let room = RoomId::from("r1");
        assert!(!store.merge_key(&room, "conn_stats", json!([])));
        assert!(!store.has_room_state(&room));
    }

    #[test]
    fn merge_touches_single_key() {
        let store = DataStore::default();
        let room = RoomId::from("r1");
        store.replace_detail(
            room.clone(),
            RoomDetail::new(fields(json!({"listening": true, "recorder_status": {"a": 1}}))),
        );
        assert!(store.merge_key(&room, "conn_stats", json!([{"id": 1}])));

        let detail = store.detail(&room).unwrap();
        assert!(detail.listening());
        assert_eq!(detail.get("recorder_status"), Some(&json!({"a": 1})));
        assert_eq!(detail.get("conn_stats"), Some(&json!([{"id": 1}])));
    }

    #[test]
    fn log_buffer_is_capped() {
        let store = DataStore::new(3);
        let room = RoomId::from("r1");
        store.replace_logs(room.clone(), (1..=5).map(|i| i.to_string()).collect());
        assert_eq!(store.logs(&room), vec!["3", "4", "5"]);

        assert!(store.append_log(&room, "6".into()));
        assert_eq!(store.logs(&room), vec!["4", "5", "6"]);
    }

    #[test]
    fn append_to_unknown_room_is_dropped() {
        let store = DataStore::default();
        assert!(!store.append_log(&RoomId::from("nope"), "line".into()));
    }

    #[test]
    fn remove_room_clears_detail_and_logs() {
        let store = DataStore::default();
        let room = RoomId::from("r1");
        store.replace_detail(room.clone(), RoomDetail::default());
        store.open_logs(room.clone());
        assert!(store.has_room_state(&room));

        store.remove_room(&room);
        assert!(!store.has_room_state(&room));
    }

    #[tokio::test]
    async fn replace_list_notifies_stream() {
        let store = DataStore::default();
        let mut stream = store.subscribe_rooms();
        assert!(stream.current().is_empty());

        store.replace_list(vec![summary("a"), summary("b")]);
        let snap = stream.changed().await.unwrap();
        assert_eq!(snap.len(), 2);
        assert!(store.room(&RoomId::from("b")).is_some());
        assert!(store.last_full_refresh().is_some());
    }
}
