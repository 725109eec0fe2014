// ── Sync engine ──
//
// Owns the subscription manager, reconciler and store for one recorder.
// A single task serializes every mutation: commands from handles, push
// envelopes, request completions and both timers all funnel through one
// `select!` loop.

mod effects;
mod state;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;

pub use effects::{NoticeLevel, Notification};

use self::effects::{Completion, Effect, Request, spawn_request};
use self::state::SyncState;
use crate::config::EngineConfig;
use crate::error::CoreError;
use crate::model::{RefreshState, RoomId};
use crate::reconciler::RefreshSnapshot;
use crate::store::DataStore;
use crate::transport::Transport;

const COMMAND_CHANNEL_SIZE: usize = 64;
const NOTICE_CHANNEL_SIZE: usize = 64;

/// Observable engine settings, republished whenever they change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineStatus {
    pub push_enabled: bool,
    pub poll_period: Duration,
    /// Expanded rooms, sorted by id.
    pub expanded: Vec<RoomId>,
    /// Room- and list-scoped subscriptions currently held.
    pub open_subscriptions: usize,
}

pub(crate) enum Command {
    Expand(RoomId),
    Collapse(RoomId),
    SetPushEnabled(bool),
    ForceRefresh(RoomId),
    RefreshList,
}

struct CommandEnvelope {
    command: Command,
    reply: oneshot::Sender<Result<(), CoreError>>,
}

// ── SyncEngine ───────────────────────────────────────────────────────

/// A running sync engine. Dropping it stops the loop; [`dispose`](Self::dispose)
/// also waits until every subscription and timer is released.
pub struct SyncEngine {
    handle: EngineHandle,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl SyncEngine {
    /// Start the engine on the current Tokio runtime.
    ///
    /// Issues the initial full pull and, if configured, opens list push.
    pub fn spawn<T: Transport>(transport: Arc<T>, config: EngineConfig) -> Self {
        let store = Arc::new(DataStore::new(config.max_log_lines));
        let (push_tx, push_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
        let (notices, _) = broadcast::channel(NOTICE_CHANNEL_SIZE);

        let state = SyncState::new(Arc::clone(&transport), push_tx, Arc::clone(&store), config);
        let (status_tx, status_rx) = watch::channel(state.status());
        let refresh = state.subscribe_refresh();
        let cancel = CancellationToken::new();

        let task = tokio::spawn(run(
            state,
            transport,
            command_rx,
            push_rx,
            notices.clone(),
            status_tx,
            cancel.clone(),
        ));

        Self {
            handle: EngineHandle {
                commands: command_tx,
                store,
                refresh,
                status: status_rx,
                notices,
            },
            cancel,
            task: Some(task),
        }
    }

    pub fn handle(&self) -> &EngineHandle {
        &self.handle
    }

    /// Stop the loop, close every subscription and wait for it to finish.
    pub async fn dispose(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "sync engine task ended abnormally");
            }
        }
    }
}

impl Drop for SyncEngine {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ── EngineHandle ─────────────────────────────────────────────────────

/// Cloneable handle for driving and observing a [`SyncEngine`].
#[derive(Clone)]
pub struct EngineHandle {
    commands: mpsc::Sender<CommandEnvelope>,
    store: Arc<DataStore>,
    refresh: watch::Receiver<RefreshSnapshot>,
    status: watch::Receiver<EngineStatus>,
    notices: broadcast::Sender<Notification>,
}

impl EngineHandle {
    /// Start observing a room: fetch detail and logs, open its push channel.
    pub async fn expand(&self, room: impl Into<RoomId>) -> Result<(), CoreError> {
        self.send(Command::Expand(room.into())).await
    }

    /// Stop observing a room and drop everything cached for it.
    pub async fn collapse(&self, room: impl Into<RoomId>) -> Result<(), CoreError> {
        self.send(Command::Collapse(room.into())).await
    }

    pub async fn set_push_enabled(&self, enabled: bool) -> Result<(), CoreError> {
        self.send(Command::SetPushEnabled(enabled)).await
    }

    /// Ask the recorder to refresh an expanded room now.
    pub async fn force_refresh(&self, room: impl Into<RoomId>) -> Result<(), CoreError> {
        self.send(Command::ForceRefresh(room.into())).await
    }

    /// Trigger an out-of-band full pull.
    pub async fn refresh_list(&self) -> Result<(), CoreError> {
        self.send(Command::RefreshList).await
    }

    pub fn store(&self) -> &Arc<DataStore> {
        &self.store
    }

    pub fn refresh_state(&self, room: &RoomId) -> Option<RefreshState> {
        self.refresh.borrow().get(room).copied()
    }

    pub fn refresh_states(&self) -> watch::Receiver<RefreshSnapshot> {
        self.refresh.clone()
    }

    pub fn status(&self) -> watch::Receiver<EngineStatus> {
        self.status.clone()
    }

    pub fn notifications(&self) -> broadcast::Receiver<Notification> {
        self.notices.subscribe()
    }

    async fn send(&self, command: Command) -> Result<(), CoreError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(CommandEnvelope { command, reply })
            .await
            .map_err(|_| CoreError::EngineStopped)?;
        rx.await.map_err(|_| CoreError::EngineStopped)?
    }
}

// ── Run loop ─────────────────────────────────────────────────────────

/// Shortest timer period; `interval_at` rejects a zero period.
const MIN_TIMER_PERIOD: Duration = Duration::from_millis(1);

fn timer(period: Duration) -> Interval {
    let period = period.max(MIN_TIMER_PERIOD);
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn run<T: Transport>(
    mut state: SyncState<T>,
    transport: Arc<T>,
    mut commands: mpsc::Receiver<CommandEnvelope>,
    mut push: mpsc::UnboundedReceiver<liveroom_api::PushEnvelope>,
    notices: broadcast::Sender<Notification>,
    status: watch::Sender<EngineStatus>,
    cancel: CancellationToken,
) {
    let mut tasks: JoinSet<Completion> = JoinSet::new();
    let log_lines = state.config().log_lines;

    let initial = state.start();
    let mut tick = timer(state.config().tick_interval);
    let mut poll = timer(state.poll_period());
    tracing::info!(poll_period = ?state.poll_period(), "sync engine started");

    let mut pending = initial;
    loop {
        for effect in pending.drain(..) {
            match effect {
                Effect::Request(request) => {
                    spawn_request(request, &mut tasks, &transport, log_lines);
                }
                Effect::Notify(notice) => {
                    let _ = notices.send(notice);
                }
                Effect::ResetPollTimer(period) => {
                    tracing::debug!(?period, "poll timer replaced");
                    poll = timer(period);
                }
            }
        }
        status.send_if_modified(|current| {
            let next = state.status();
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });

        pending = tokio::select! {
            biased;

            () = cancel.cancelled() => break,

            Some(CommandEnvelope { command, reply }) = commands.recv() => {
                match state.apply_command(command) {
                    Ok(effects) => {
                        let _ = reply.send(Ok(()));
                        effects
                    }
                    Err(e) => {
                        if e.is_transport_failure() {
                            let _ = notices.send(Notification::warning(None, e.to_string()));
                        }
                        let _ = reply.send(Err(e));
                        Vec::new()
                    }
                }
            }

            Some(joined) = tasks.join_next() => match joined {
                Ok(completion) => state.on_completion(completion),
                Err(e) => {
                    tracing::warn!(error = %e, "request task failed");
                    Vec::new()
                }
            },

            Some(envelope) = push.recv() => state.on_push(&envelope),

            _ = tick.tick() => {
                state.on_tick();
                Vec::new()
            }

            _ = poll.tick() => {
                tracing::debug!("poll backstop");
                vec![Effect::Request(Request::List)]
            }
        };
    }

    state.teardown();
    tasks.shutdown().await;
    tracing::info!("sync engine stopped");
}
