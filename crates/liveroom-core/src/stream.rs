// ── Reactive room-list stream ──
//
// Subscription type for consuming room-list replacements from the DataStore.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::model::RoomSummary;

pub type RoomSnapshot = Arc<Vec<Arc<RoomSummary>>>;

/// A subscription to the room list.
///
/// Gives both point-in-time access and change notification via
/// [`changed`](Self::changed) or by converting into a `Stream`.
pub struct RoomStream {
    current: RoomSnapshot,
    receiver: watch::Receiver<RoomSnapshot>,
}

impl RoomStream {
    pub(crate) fn new(receiver: watch::Receiver<RoomSnapshot>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// Snapshot captured at creation or at the last `changed()`.
    pub fn current(&self) -> &RoomSnapshot {
        &self.current
    }

    /// Latest snapshot (may have changed since creation).
    pub fn latest(&self) -> RoomSnapshot {
        self.receiver.borrow().clone()
    }

    /// Wait for the next replacement.
    /// Returns `None` once the DataStore is dropped.
    pub async fn changed(&mut self) -> Option<RoomSnapshot> {
        self.receiver.changed().await.ok()?;
        let snap = self.receiver.borrow_and_update().clone();
        self.current = snap.clone();
        Some(snap)
    }

    pub fn into_stream(self) -> RoomWatchStream {
        RoomWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter yielding each new room-list snapshot.
pub struct RoomWatchStream {
    inner: WatchStream<RoomSnapshot>,
}

impl Stream for RoomWatchStream {
    type Item = RoomSnapshot;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexSet;
    use tokio_stream::StreamExt;

    use crate::model::RoomId;

    fn room(id: &str) -> Arc<RoomSummary> {
        Arc::new(RoomSummary {
            id: RoomId::from(id),
            name: id.into(),
            room_name: String::new(),
            live_url: String::new(),
            platform: String::new(),
            tags: IndexSet::new(),
            listening: false,
            last_error: None,
        })
    }

    #[tokio::test]
    async fn changed_updates_current() {
        let (tx, rx) = watch::channel(RoomSnapshot::default());
        let mut rooms = RoomStream::new(rx);
        assert!(rooms.current().is_empty());

        tx.send_replace(Arc::new(vec![room("a")]));
        let snap = rooms.changed().await.map(|s| s.len());
        assert_eq!(snap, Some(1));
        assert_eq!(rooms.current().len(), 1);

        drop(tx);
        assert!(rooms.changed().await.is_none());
    }

    #[tokio::test]
    async fn stream_yields_current_then_replacements() {
        let (tx, rx) = watch::channel(Arc::new(vec![room("a")]));
        let mut stream = RoomStream::new(rx).into_stream();
        assert_eq!(stream.next().await.map(|s| s.len()), Some(1));

        tx.send_replace(Arc::new(vec![room("a"), room("b")]));
        assert_eq!(stream.next().await.map(|s| s.len()), Some(2));
    }
}
