use chrono::{DateTime, Utc};
use liveroom_api::{RateLimitInfo, SchedulerStatus};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Countdown value meaning "no countdown applies".
pub const NO_COUNTDOWN: i64 = -1;

/// Minimum interval assumed when neither the limiter nor the room says.
const DEFAULT_MIN_INTERVAL_SECS: f64 = 20.0;

/// Where a room sits in the recorder's refresh cycle.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RefreshStatus {
    Idle,
    WaitingInterval,
    WaitingRateLimit,
    Refreshing,
    NoSchedule,
}

impl RefreshStatus {
    /// Whether the local 1 Hz tick may interpolate this status.
    pub fn ticks(self) -> bool {
        !matches!(self, Self::NoSchedule | Self::Refreshing)
    }
}

/// Refresh status of one expanded room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshState {
    pub status: RefreshStatus,
    /// Seconds to the next refresh, or [`NO_COUNTDOWN`].
    pub countdown_secs: i64,
    pub last_update: DateTime<Utc>,
}

impl RefreshState {
    pub fn new(status: RefreshStatus, countdown_secs: i64) -> Self {
        Self {
            status,
            countdown_secs,
            last_update: Utc::now(),
        }
    }
}

/// Derive `(status, countdown)` from an authoritative payload.
///
/// A scheduler status wins whenever present; otherwise the legacy
/// limiter-only rules apply with `platform_rate_limit` as the fallback
/// minimum interval.
pub fn derive_status(
    scheduler: Option<&SchedulerStatus>,
    rate_limit: Option<&RateLimitInfo>,
    platform_rate_limit: Option<f64>,
) -> (RefreshStatus, i64) {
    let limiter_wait = rate_limit
        .and_then(|r| r.next_request_in_sec)
        .unwrap_or(0.0);

    let Some(scheduler) = scheduler else {
        return derive_legacy(rate_limit, platform_rate_limit);
    };

    if !scheduler.scheduler_running || !scheduler.has_waiters {
        return (RefreshStatus::NoSchedule, NO_COUNTDOWN);
    }

    let secs = scheduler.seconds_until_next_request;
    if secs > 0.0 {
        let status = if limiter_wait > 0.0 {
            RefreshStatus::WaitingRateLimit
        } else {
            RefreshStatus::WaitingInterval
        };
        (status, ceil_secs(secs))
    } else if secs < 0.0 {
        (RefreshStatus::NoSchedule, NO_COUNTDOWN)
    } else if limiter_wait > 0.0 {
        (RefreshStatus::WaitingRateLimit, ceil_secs(limiter_wait))
    } else {
        (RefreshStatus::Idle, 0)
    }
}

fn derive_legacy(
    rate_limit: Option<&RateLimitInfo>,
    platform_rate_limit: Option<f64>,
) -> (RefreshStatus, i64) {
    let info = rate_limit.copied().unwrap_or_default();

    let next = ceil_secs(info.next_request_in_sec.unwrap_or(0.0));
    if next > 0 {
        return (RefreshStatus::WaitingRateLimit, next);
    }

    let min_interval = info
        .min_interval_sec
        .filter(|v| *v > 0.0)
        .or(platform_rate_limit.filter(|v| *v > 0.0))
        .unwrap_or(DEFAULT_MIN_INTERVAL_SECS);
    let waited = info.waited_seconds.unwrap_or(0.0).round();

    if waited < min_interval {
        (
            RefreshStatus::WaitingInterval,
            ceil_secs(min_interval - waited).max(0),
        )
    } else {
        (RefreshStatus::Idle, 0)
    }
}

#[allow(clippy::cast_possible_truncation)]
fn ceil_secs(secs: f64) -> i64 {
    if secs.is_finite() { secs.ceil() as i64 } else { 0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sched(running: bool, waiters: bool, secs: f64) -> SchedulerStatus {
        SchedulerStatus {
            scheduler_running: running,
            has_waiters: waiters,
            seconds_until_next_request: secs,
        }
    }

    fn limiter(waited: Option<f64>, next: Option<f64>, min: Option<f64>) -> RateLimitInfo {
        RateLimitInfo {
            waited_seconds: waited,
            next_request_in_sec: next,
            min_interval_sec: min,
        }
    }

    #[test]
    fn scheduled_slot_waits_interval() {
        let rl = limiter(None, Some(0.0), None);
        assert_eq!(
            derive_status(Some(&sched(true, true, 5.0)), Some(&rl), None),
            (RefreshStatus::WaitingInterval, 5)
        );
    }

    #[test]
    fn scheduled_slot_blocked_by_limiter() {
        let rl = limiter(None, Some(3.0), None);
        assert_eq!(
            derive_status(Some(&sched(true, true, 4.2)), Some(&rl), None),
            (RefreshStatus::WaitingRateLimit, 5)
        );
    }

    #[test]
    fn stopped_scheduler_ignores_limiter() {
        let rl = limiter(Some(1.0), Some(9.0), Some(30.0));
        assert_eq!(
            derive_status(Some(&sched(false, true, 5.0)), Some(&rl), None),
            (RefreshStatus::NoSchedule, NO_COUNTDOWN)
        );
        assert_eq!(
            derive_status(Some(&sched(true, false, 5.0)), None, None),
            (RefreshStatus::NoSchedule, NO_COUNTDOWN)
        );
    }

    #[test]
    fn due_slot_is_idle_or_rate_limited() {
        assert_eq!(
            derive_status(Some(&sched(true, true, 0.0)), None, None),
            (RefreshStatus::Idle, 0)
        );
        let rl = limiter(None, Some(1.5), None);
        assert_eq!(
            derive_status(Some(&sched(true, true, 0.0)), Some(&rl), None),
            (RefreshStatus::WaitingRateLimit, 2)
        );
    }

    #[test]
    fn negative_slot_is_no_schedule() {
        assert_eq!(
            derive_status(Some(&sched(true, true, -1.0)), None, None),
            (RefreshStatus::NoSchedule, NO_COUNTDOWN)
        );
    }

    #[test]
    fn legacy_limiter_wait() {
        let rl = limiter(Some(2.0), Some(6.3), Some(10.0));
        assert_eq!(
            derive_status(None, Some(&rl), None),
            (RefreshStatus::WaitingRateLimit, 7)
        );
    }

    #[test]
    fn legacy_interval_uses_platform_fallback() {
        let rl = limiter(Some(4.0), Some(0.0), None);
        assert_eq!(
            derive_status(None, Some(&rl), Some(15.0)),
            (RefreshStatus::WaitingInterval, 11)
        );
        // No platform limit either: 20 s default.
        assert_eq!(
            derive_status(None, Some(&rl), None),
            (RefreshStatus::WaitingInterval, 16)
        );
    }

    #[test]
    fn legacy_idle_when_interval_elapsed() {
        let rl = limiter(Some(30.0), None, Some(10.0));
        assert_eq!(derive_status(None, Some(&rl), None), (RefreshStatus::Idle, 0));
    }

    #[test]
    fn status_labels_are_snake_case() {
        assert_eq!(RefreshStatus::WaitingRateLimit.to_string(), "waiting_rate_limit");
        assert_eq!(
            serde_json::to_string(&RefreshStatus::NoSchedule).ok().as_deref(),
            Some("\"no_schedule\"")
        );
    }
}
