// ── Engine state and reducers ──
//
// Everything the run loop mutates lives here. Each handler takes an input
// (command, push envelope, completion, tick) and returns effects. Async
// results are applied only if their generation is still the room's
// current expansion; anything else is stale and dropped silently.

use std::sync::Arc;
use std::time::Duration;

use liveroom_api::PushEnvelope;
use serde_json::Value;
use tokio::sync::mpsc;

use super::effects::{Completion, Effect, Notification, Request};
use super::{Command, EngineStatus};
use crate::config::EngineConfig;
use crate::error::CoreError;
use crate::event::{ListChangeKind, PushEvent, RateLimitPayload};
use crate::model::{RoomDetail, RoomId, RoomSummary};
use crate::reconciler::{Reconciler, RefreshSnapshot};
use crate::store::DataStore;
use crate::subscription::{Route, SubscriptionManager};
use crate::transport::PushSubscriber;

pub(crate) struct SyncState<S: ?Sized> {
    subs: SubscriptionManager<S>,
    reconciler: Reconciler,
    store: Arc<DataStore>,
    config: EngineConfig,
}

impl<S: PushSubscriber + ?Sized> SyncState<S> {
    pub(crate) fn new(
        transport: Arc<S>,
        inbox: mpsc::UnboundedSender<PushEnvelope>,
        store: Arc<DataStore>,
        config: EngineConfig,
    ) -> Self {
        Self {
            subs: SubscriptionManager::new(transport, inbox),
            reconciler: Reconciler::new(),
            store,
            config,
        }
    }

    pub(crate) fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(crate) fn subscribe_refresh(&self) -> tokio::sync::watch::Receiver<RefreshSnapshot> {
        self.reconciler.subscribe()
    }

    pub(crate) fn poll_period(&self) -> Duration {
        self.config.poll_period(self.subs.list_push_enabled())
    }

    pub(crate) fn status(&self) -> EngineStatus {
        let mut expanded: Vec<RoomId> = self.subs.expanded_rooms().cloned().collect();
        expanded.sort();
        EngineStatus {
            push_enabled: self.subs.list_push_enabled(),
            poll_period: self.poll_period(),
            expanded,
            open_subscriptions: self.subs.open_count(),
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Initial full pull, plus list push if configured.
    pub(crate) fn start(&mut self) -> Vec<Effect> {
        let mut effects = vec![Request::List.into()];
        if self.config.push_enabled {
            if let Err(e) = self.subs.set_list_push(true) {
                effects.push(Effect::Notify(Notification::warning(
                    None,
                    format!("Push disabled, falling back to polling: {e}"),
                )));
            }
        }
        effects
    }

    /// Release every subscription and drop all per-room state.
    pub(crate) fn teardown(&mut self) {
        self.subs.teardown();
        self.reconciler.clear();
        self.store.clear_room_state();
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub(crate) fn apply_command(&mut self, command: Command) -> Result<Vec<Effect>, CoreError> {
        match command {
            Command::Expand(room) => Ok(self.expand(&room)),
            Command::Collapse(room) => {
                self.collapse(&room);
                Ok(Vec::new())
            }
            Command::SetPushEnabled(enabled) => self.set_push_enabled(enabled),
            Command::ForceRefresh(room) => self.force_refresh(&room),
            Command::RefreshList => Ok(vec![Request::List.into()]),
        }
    }

    fn expand(&mut self, room: &RoomId) -> Vec<Effect> {
        let Some(expanded) = self.subs.expand(room) else {
            return Vec::new();
        };
        self.store.open_logs(room.clone());

        let generation = expanded.generation;
        let mut effects = vec![
            Request::Detail {
                room: room.clone(),
                generation,
            }
            .into(),
            Request::Logs {
                room: room.clone(),
                generation,
            }
            .into(),
        ];
        if let Some(e) = expanded.push_error {
            effects.push(Effect::Notify(Notification::warning(
                Some(room.clone()),
                format!("Live updates unavailable for this room: {e}"),
            )));
        }
        effects
    }

    fn collapse(&mut self, room: &RoomId) {
        self.subs.collapse(room);
        self.reconciler.remove(room);
        self.store.remove_room(room);
    }

    fn set_push_enabled(&mut self, enabled: bool) -> Result<Vec<Effect>, CoreError> {
        if self.subs.set_list_push(enabled)? {
            Ok(vec![Effect::ResetPollTimer(self.poll_period())])
        } else {
            Ok(Vec::new())
        }
    }

    fn force_refresh(&mut self, room: &RoomId) -> Result<Vec<Effect>, CoreError> {
        let generation = self
            .subs
            .generation(room)
            .ok_or_else(|| CoreError::RoomNotExpanded {
                id: room.to_string(),
            })?;
        self.reconciler.begin_force_refresh(room);
        Ok(vec![
            Request::ForceRefresh {
                room: room.clone(),
                generation,
            }
            .into(),
        ])
    }

    // ── Timers ───────────────────────────────────────────────────────

    pub(crate) fn on_tick(&mut self) -> usize {
        self.reconciler.tick()
    }

    // ── Push ─────────────────────────────────────────────────────────

    pub(crate) fn on_push(&mut self, envelope: &PushEnvelope) -> Vec<Effect> {
        self.store.mark_push_event();

        let Some(route) = self.subs.route(&envelope.subscription).cloned() else {
            tracing::trace!(subscription = %envelope.subscription, "push for closed subscription dropped");
            return Vec::new();
        };

        let event = match PushEvent::try_from(envelope.message.as_ref()) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, room = %envelope.message.room_id, "ignoring push event");
                return Vec::new();
            }
        };

        match route {
            Route::Room { room, generation } => self.on_room_event(room, generation, event),
            Route::List(topic) => {
                tracing::trace!(%topic, room = %envelope.message.room_id, "list push");
                self.on_shared_event(RoomId::from(envelope.message.room_id.as_str()), event)
            }
        }
    }

    fn on_room_event(&mut self, room: RoomId, generation: u64, event: PushEvent) -> Vec<Effect> {
        match event {
            PushEvent::Log(line) => {
                self.store.append_log(&room, line);
                Vec::new()
            }
            PushEvent::ConnStats(value) => {
                self.store.merge_key(&room, "conn_stats", value);
                Vec::new()
            }
            PushEvent::RecorderStatus(value) => {
                self.store.merge_key(&room, "recorder_status", value);
                Vec::new()
            }
            // The list-scoped subscriptions carry these while push is on.
            shared if self.subs.list_push_enabled() => {
                tracing::trace!(room = %room, generation, ?shared, "left to list subscription");
                Vec::new()
            }
            shared => self.on_shared_event(room, shared),
        }
    }

    /// Events that arrive on list subscriptions, or on a room subscription
    /// while list push is off.
    fn on_shared_event(&mut self, room: RoomId, event: PushEvent) -> Vec<Effect> {
        match event {
            PushEvent::LiveUpdate => {
                let mut effects = vec![Request::List.into()];
                if let Some(generation) = self.subs.generation(&room) {
                    effects.push(Request::Detail { room, generation }.into());
                }
                effects
            }
            PushEvent::ListChange(kind) => self.on_list_change(room, &kind),
            PushEvent::RateLimitUpdate(payload) => {
                self.on_rate_limit(&room, payload);
                Vec::new()
            }
            PushEvent::Log(_) | PushEvent::ConnStats(_) | PushEvent::RecorderStatus(_) => {
                Vec::new()
            }
        }
    }

    fn on_list_change(&mut self, room: RoomId, kind: &ListChangeKind) -> Vec<Effect> {
        let mut effects = vec![Request::List.into()];
        match self.subs.generation(&room) {
            Some(_) if *kind == ListChangeKind::RoomRemoved => {
                tracing::debug!(room = %room, "expanded room removed on server");
                self.collapse(&room);
            }
            Some(generation) if kind.affects_detail() => {
                effects.push(
                    Request::DelayedDetail {
                        room,
                        generation,
                        delay: self.config.listen_change_delay,
                    }
                    .into(),
                );
            }
            _ => {}
        }
        effects
    }

    /// Merge the payload into the cached detail and re-derive status.
    fn on_rate_limit(&mut self, room: &RoomId, payload: RateLimitPayload) {
        if payload.scheduler_status.is_none() && payload.rate_limit.is_none() {
            return;
        }
        if !self.subs.is_expanded(room) {
            return;
        }
        let Some(detail) = self.store.detail(room) else {
            return;
        };

        let mut partial = serde_json::Map::new();
        if let Some(status) = payload.scheduler_status {
            partial.insert("scheduler_status".into(), to_json(&status));
        }
        if let Some(info) = payload.rate_limit {
            partial.insert("rate_limit_info".into(), to_json(&info));
        }
        self.store.merge_detail(room, partial);

        // The pushed payload alone is authoritative; cached limiter info may be stale.
        self.reconciler.apply_authoritative(
            room,
            payload.scheduler_status.as_ref(),
            payload.rate_limit.as_ref(),
            detail.platform_rate_limit(),
        );
    }

    // ── Completions ──────────────────────────────────────────────────

    pub(crate) fn on_completion(&mut self, completion: Completion) -> Vec<Effect> {
        match completion {
            Completion::List(result) => self.on_list(result),
            Completion::Detail {
                room,
                generation,
                result,
            } => {
                if !self.is_current(&room, generation) {
                    return Vec::new();
                }
                self.on_detail(room, result)
            }
            Completion::Logs {
                room,
                generation,
                result,
            } => {
                if !self.is_current(&room, generation) {
                    return Vec::new();
                }
                match result {
                    Ok(lines) => self.store.replace_logs(room, lines),
                    Err(e) => tracing::warn!(room = %room, error = %e, "log fetch failed"),
                }
                Vec::new()
            }
            Completion::ForceRefresh {
                room,
                generation,
                result,
            } => {
                if !self.is_current(&room, generation) {
                    return Vec::new();
                }
                self.on_force_refresh(room, generation, result)
            }
            Completion::DelayElapsed { room, generation } => {
                if !self.is_current(&room, generation) {
                    return Vec::new();
                }
                vec![Request::Detail { room, generation }.into()]
            }
        }
    }

    fn on_list(&mut self, result: Result<Vec<liveroom_api::LiveSummary>, CoreError>) -> Vec<Effect> {
        match result {
            Ok(lives) => {
                let count = lives.len();
                self.store
                    .replace_list(lives.into_iter().map(RoomSummary::from).collect());
                tracing::debug!(count, "room list replaced");
                Vec::new()
            }
            Err(e) => {
                tracing::warn!(error = %e, "room list refresh failed");
                vec![Effect::Notify(Notification::warning(
                    None,
                    format!("Room list refresh failed: {e}"),
                ))]
            }
        }
    }

    fn on_detail(&mut self, room: RoomId, result: Result<RoomDetail, CoreError>) -> Vec<Effect> {
        match result {
            Ok(detail) => {
                self.reconciler.apply_detail(&room, &detail);
                self.store.replace_detail(room, detail);
                Vec::new()
            }
            Err(e) => {
                tracing::warn!(room = %room, error = %e, "detail fetch failed");
                self.reconciler.revert_force_refresh(&room);
                vec![Effect::Notify(Notification::warning(
                    Some(room),
                    format!("Room detail fetch failed: {e}"),
                ))]
            }
        }
    }

    fn on_force_refresh(
        &mut self,
        room: RoomId,
        generation: u64,
        result: Result<liveroom_api::ForceRefreshResponse, CoreError>,
    ) -> Vec<Effect> {
        let failure = match result {
            Ok(resp) if resp.success => {
                tracing::info!(room = %room, "force refresh accepted");
                return vec![
                    Effect::Notify(Notification::info(
                        Some(room.clone()),
                        resp.message.unwrap_or_else(|| "Refreshed".into()),
                    )),
                    Request::Detail { room, generation }.into(),
                ];
            }
            Ok(resp) => CoreError::ForceRefreshRejected {
                message: resp.message.unwrap_or_else(|| "unknown reason".into()),
            },
            Err(e) => e,
        };

        tracing::warn!(room = %room, error = %failure, "force refresh failed");
        self.reconciler.revert_force_refresh(&room);
        vec![Effect::Notify(Notification::error(
            Some(room),
            failure.to_string(),
        ))]
    }

    fn is_current(&self, room: &RoomId, generation: u64) -> bool {
        let current = self.subs.is_current(room, generation);
        if !current {
            tracing::trace!(room = %room, generation, "stale completion dropped");
        }
        current
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}
