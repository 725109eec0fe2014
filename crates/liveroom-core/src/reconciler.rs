// ── Refresh-status reconciler ──
//
// One `RefreshState` per expanded room. Authoritative payloads replace the
// state outright; the 1 Hz tick only counts down between them. Every
// mutation republishes the full map on a `watch` channel.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use liveroom_api::{RateLimitInfo, SchedulerStatus};
use tokio::sync::watch;

use crate::model::{NO_COUNTDOWN, RefreshState, RefreshStatus, RoomDetail, RoomId, derive_status};

pub type RefreshSnapshot = Arc<HashMap<RoomId, RefreshState>>;

pub struct Reconciler {
    states: HashMap<RoomId, RefreshState>,
    published: watch::Sender<RefreshSnapshot>,
}

impl Reconciler {
    pub fn new() -> Self {
        let (published, _) = watch::channel(Arc::new(HashMap::new()));
        Self {
            states: HashMap::new(),
            published,
        }
    }

    /// Replace the room's state with one derived from an authoritative payload.
    pub fn apply_authoritative(
        &mut self,
        room: &RoomId,
        scheduler: Option<&SchedulerStatus>,
        rate_limit: Option<&RateLimitInfo>,
        platform_rate_limit: Option<f64>,
    ) -> RefreshState {
        let (status, countdown) = derive_status(scheduler, rate_limit, platform_rate_limit);
        let state = RefreshState::new(status, countdown);
        self.states.insert(room.clone(), state);
        self.publish();
        tracing::trace!(room = %room, %status, countdown, "refresh state derived");
        state
    }

    /// Derive from a freshly fetched detail.
    pub fn apply_detail(&mut self, room: &RoomId, detail: &RoomDetail) -> RefreshState {
        self.apply_authoritative(
            room,
            detail.scheduler_status().as_ref(),
            detail.rate_limit_info().as_ref(),
            detail.platform_rate_limit(),
        )
    }

    /// Enter `refreshing`; ticks leave the room alone until it resolves.
    pub fn begin_force_refresh(&mut self, room: &RoomId) {
        self.states.insert(
            room.clone(),
            RefreshState::new(RefreshStatus::Refreshing, NO_COUNTDOWN),
        );
        self.publish();
    }

    /// Fall back to `(idle, 0)` after a failed force refresh.
    ///
    /// No-op unless the room is still `refreshing`: a newer authoritative
    /// update has already replaced the state otherwise.
    pub fn revert_force_refresh(&mut self, room: &RoomId) -> bool {
        match self.states.get_mut(room) {
            Some(state) if state.status == RefreshStatus::Refreshing => {
                *state = RefreshState::new(RefreshStatus::Idle, 0);
                self.publish();
                true
            }
            _ => false,
        }
    }

    /// Advance every countdown by one second. Returns the number of rooms changed.
    pub fn tick(&mut self) -> usize {
        let now = Utc::now();
        let mut changed = 0;
        for state in self.states.values_mut() {
            if !state.status.ticks() || state.countdown_secs < 0 {
                continue;
            }
            let before = (state.status, state.countdown_secs);
            if state.countdown_secs > 0 {
                state.countdown_secs -= 1;
            }
            if state.countdown_secs == 0 {
                state.status = RefreshStatus::Idle;
            }
            if before != (state.status, state.countdown_secs) {
                state.last_update = now;
                changed += 1;
            }
        }
        if changed > 0 {
            self.publish();
        }
        changed
    }

    pub fn remove(&mut self, room: &RoomId) -> bool {
        let removed = self.states.remove(room).is_some();
        if removed {
            self.publish();
        }
        removed
    }

    pub fn clear(&mut self) {
        if !self.states.is_empty() {
            self.states.clear();
            self.publish();
        }
    }

    pub fn get(&self, room: &RoomId) -> Option<RefreshState> {
        self.states.get(room).copied()
    }

    pub fn contains(&self, room: &RoomId) -> bool {
        self.states.contains_key(room)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn subscribe(&self) -> watch::Receiver<RefreshSnapshot> {
        self.published.subscribe()
    }

    fn publish(&self) {
        self.published.send_replace(Arc::new(self.states.clone()));
    }
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sched(secs: f64) -> SchedulerStatus {
        SchedulerStatus {
            scheduler_running: true,
            has_waiters: true,
            seconds_until_next_request: secs,
        }
    }

    fn limiter(next: f64) -> RateLimitInfo {
        RateLimitInfo {
            next_request_in_sec: Some(next),
            ..RateLimitInfo::default()
        }
    }

    fn pair(r: &Reconciler, room: &RoomId) -> (RefreshStatus, i64) {
        let s = r.get(room).unwrap();
        (s.status, s.countdown_secs)
    }

    #[test]
    fn ticks_count_down_to_idle() {
        let mut r = Reconciler::new();
        let room = RoomId::from("r1");
        r.apply_authoritative(&room, Some(&sched(3.0)), None, None);

        let mut seen = vec![pair(&r, &room)];
        for _ in 0..5 {
            r.tick();
            seen.push(pair(&r, &room));
        }
        assert_eq!(
            seen,
            vec![
                (RefreshStatus::WaitingInterval, 3),
                (RefreshStatus::WaitingInterval, 2),
                (RefreshStatus::WaitingInterval, 1),
                (RefreshStatus::Idle, 0),
                (RefreshStatus::Idle, 0),
                (RefreshStatus::Idle, 0),
            ]
        );
    }

    #[test]
    fn ticks_skip_no_schedule_and_refreshing() {
        let mut r = Reconciler::new();
        let a = RoomId::from("a");
        let b = RoomId::from("b");
        r.apply_authoritative(
            &a,
            Some(&SchedulerStatus {
                scheduler_running: false,
                ..sched(5.0)
            }),
            None,
            None,
        );
        r.begin_force_refresh(&b);

        assert_eq!(r.tick(), 0);
        assert_eq!(pair(&r, &a), (RefreshStatus::NoSchedule, NO_COUNTDOWN));
        assert_eq!(pair(&r, &b), (RefreshStatus::Refreshing, NO_COUNTDOWN));
    }

    #[test]
    fn authoritative_update_beats_interpolation() {
        let mut r = Reconciler::new();
        let room = RoomId::from("r1");
        r.apply_authoritative(&room, Some(&sched(10.0)), None, None);
        r.tick();
        r.tick();
        r.apply_authoritative(&room, Some(&sched(4.0)), Some(&limiter(4.0)), None);
        assert_eq!(pair(&r, &room), (RefreshStatus::WaitingRateLimit, 4));
    }

    #[test]
    fn force_refresh_failure_reverts_to_idle() {
        let mut r = Reconciler::new();
        let room = RoomId::from("r1");
        r.apply_authoritative(&room, Some(&sched(12.0)), Some(&limiter(12.0)), None);
        assert_eq!(pair(&r, &room), (RefreshStatus::WaitingRateLimit, 12));

        r.begin_force_refresh(&room);
        assert_eq!(pair(&r, &room).0, RefreshStatus::Refreshing);
        assert!(r.revert_force_refresh(&room));
        assert_eq!(pair(&r, &room), (RefreshStatus::Idle, 0));
    }

    #[test]
    fn revert_after_fresh_update_is_noop() {
        let mut r = Reconciler::new();
        let room = RoomId::from("r1");
        r.begin_force_refresh(&room);
        r.apply_authoritative(&room, Some(&sched(8.0)), None, None);
        assert!(!r.revert_force_refresh(&room));
        assert_eq!(pair(&r, &room), (RefreshStatus::WaitingInterval, 8));
    }

    #[test]
    fn remove_publishes_without_room() {
        let mut r = Reconciler::new();
        let rx = r.subscribe();
        let room = RoomId::from("r1");
        r.apply_authoritative(&room, None, None, None);
        assert!(rx.borrow().contains_key(&room));

        assert!(r.remove(&room));
        assert!(!rx.borrow().contains_key(&room));
        assert!(r.is_empty());
    }
}
