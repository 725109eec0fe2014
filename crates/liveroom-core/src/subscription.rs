// ── Subscription manager ──
//
// Sole owner of the subscription-id table. Room-scoped subscriptions live
// exactly as long as a room is expanded; the three list-scoped ones live
// while global push is on. Every id handed out by the transport is
// released through `unsubscribe` with that same id.

use std::collections::HashMap;
use std::sync::Arc;

use liveroom_api::{PushEnvelope, SubscriptionFilter, SubscriptionId};
use strum::{Display, EnumIter, IntoEnumIterator};
use tokio::sync::mpsc;

use crate::error::CoreError;
use crate::event::names;
use crate::model::RoomId;
use crate::transport::PushSubscriber;

/// List-scoped push channels opened while global push is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum ListTopic {
    LiveUpdate,
    ListChange,
    RateLimitUpdate,
}

impl ListTopic {
    pub fn event_name(self) -> &'static str {
        match self {
            Self::LiveUpdate => names::LIVE_UPDATE,
            Self::ListChange => names::LIST_CHANGE,
            Self::RateLimitUpdate => names::RATE_LIMIT_UPDATE,
        }
    }
}

/// What a subscription id was opened for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Room { room: RoomId, generation: u64 },
    List(ListTopic),
}

/// Result of a fresh expansion.
#[derive(Debug)]
pub struct Expanded {
    /// Tag carried by every request issued for this expansion.
    pub generation: u64,
    /// Set when the room-scoped subscription could not be opened.
    pub push_error: Option<CoreError>,
}

#[derive(Debug)]
struct RoomEntry {
    generation: u64,
    subscription: Option<SubscriptionId>,
}

pub struct SubscriptionManager<S: ?Sized> {
    transport: Arc<S>,
    inbox: mpsc::UnboundedSender<PushEnvelope>,
    rooms: HashMap<RoomId, RoomEntry>,
    list: Vec<(ListTopic, SubscriptionId)>,
    routes: HashMap<SubscriptionId, Route>,
    next_generation: u64,
}

impl<S: PushSubscriber + ?Sized> SubscriptionManager<S> {
    pub fn new(transport: Arc<S>, inbox: mpsc::UnboundedSender<PushEnvelope>) -> Self {
        Self {
            transport,
            inbox,
            rooms: HashMap::new(),
            list: Vec::new(),
            routes: HashMap::new(),
            next_generation: 1,
        }
    }

    // ── Room scope ───────────────────────────────────────────────────

    /// Start observing `room`. Returns `None` if it already was.
    pub fn expand(&mut self, room: &RoomId) -> Option<Expanded> {
        if self.rooms.contains_key(room) {
            return None;
        }

        let generation = self.next_generation;
        self.next_generation += 1;

        let (subscription, push_error) = match self
            .transport
            .subscribe(SubscriptionFilter::room(room.as_str()), self.inbox.clone())
        {
            Ok(id) => {
                self.routes.insert(
                    id,
                    Route::Room {
                        room: room.clone(),
                        generation,
                    },
                );
                (Some(id), None)
            }
            Err(e) => {
                tracing::warn!(room = %room, error = %e, "room push subscription failed");
                (None, Some(e))
            }
        };

        self.rooms.insert(
            room.clone(),
            RoomEntry {
                generation,
                subscription,
            },
        );
        tracing::debug!(room = %room, generation, "room expanded");

        Some(Expanded {
            generation,
            push_error,
        })
    }

    /// Stop observing `room`. Returns `false` if it was not expanded.
    pub fn collapse(&mut self, room: &RoomId) -> bool {
        let Some(entry) = self.rooms.remove(room) else {
            return false;
        };
        if let Some(id) = entry.subscription {
            self.release(id);
        }
        tracing::debug!(room = %room, generation = entry.generation, "room collapsed");
        true
    }

    pub fn is_expanded(&self, room: &RoomId) -> bool {
        self.rooms.contains_key(room)
    }

    /// Whether `generation` is still the live expansion of `room`.
    pub fn is_current(&self, room: &RoomId, generation: u64) -> bool {
        self.rooms
            .get(room)
            .is_some_and(|entry| entry.generation == generation)
    }

    pub fn generation(&self, room: &RoomId) -> Option<u64> {
        self.rooms.get(room).map(|entry| entry.generation)
    }

    pub fn expanded_rooms(&self) -> impl Iterator<Item = &RoomId> {
        self.rooms.keys()
    }

    // ── List scope ───────────────────────────────────────────────────

    /// Open or close the list-scoped subscriptions.
    ///
    /// Returns whether anything changed. A partial failure while enabling
    /// rolls back the ones already opened and leaves push disabled.
    pub fn set_list_push(&mut self, enabled: bool) -> Result<bool, CoreError> {
        if enabled == self.list_push_enabled() {
            return Ok(false);
        }

        if !enabled {
            for (_, id) in std::mem::take(&mut self.list) {
                self.release(id);
            }
            tracing::info!("list push disabled");
            return Ok(true);
        }

        let mut opened = Vec::with_capacity(3);
        for topic in ListTopic::iter() {
            match self
                .transport
                .subscribe(SubscriptionFilter::all(topic.event_name()), self.inbox.clone())
            {
                Ok(id) => {
                    self.routes.insert(id, Route::List(topic));
                    opened.push((topic, id));
                }
                Err(e) => {
                    for (_, id) in opened {
                        self.release(id);
                    }
                    tracing::warn!(%topic, error = %e, "list push subscription failed");
                    return Err(e);
                }
            }
        }
        self.list = opened;
        tracing::info!("list push enabled");
        Ok(true)
    }

    pub fn list_push_enabled(&self) -> bool {
        !self.list.is_empty()
    }

    // ── Lookups ──────────────────────────────────────────────────────

    pub fn route(&self, id: &SubscriptionId) -> Option<&Route> {
        self.routes.get(id)
    }

    /// Subscriptions currently held, room- and list-scoped.
    pub fn open_count(&self) -> usize {
        self.routes.len()
    }

    /// Release every subscription and forget every room.
    pub fn teardown(&mut self) {
        let ids: Vec<SubscriptionId> = self.routes.keys().copied().collect();
        for id in ids {
            self.release(id);
        }
        self.rooms.clear();
        self.list.clear();
        tracing::debug!("subscriptions torn down");
    }

    fn release(&mut self, id: SubscriptionId) {
        self.routes.remove(&id);
        if !self.transport.unsubscribe(&id) {
            tracing::debug!(subscription = %id, "transport did not know subscription");
        }
    }
}
