//! `RateTrack`: per-(domain, account_id) window counters (spec §3).

use std::time::{Duration, SystemTime, UNIX_EPOCH};

const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(3600);
const DAY: Duration = Duration::from_secs(86_400);

fn floor_to_boundary(now: SystemTime, window: Duration) -> SystemTime {
    let window_secs = window.as_secs();
    let epoch_secs = now
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs();
    let floored = (epoch_secs / window_secs) * window_secs;
    UNIX_EPOCH + Duration::from_secs(floored)
}

/// Per-(domain, account_id) accounting. Owned exclusively by the rate
/// limiter (spec §3 Ownership).
#[derive(Debug, Clone)]
pub struct RateTrack {
    pub minute_window_start: SystemTime,
    pub hour_window_start: SystemTime,
    pub day_window_start: SystemTime,
    pub sent_this_minute: u32,
    pub sent_this_hour: u32,
    pub sent_today: u32,
    pub failure_count_total: u64,
    pub consecutive_failures: u32,
    pub last_send_at: Option<SystemTime>,
    /// The `account_age_days` seen on the most recent `Check`, kept so the
    /// Monitor's utilization sampling (spec §4.G step 3) can resolve the
    /// right tier without the caller re-supplying the age out of band.
    pub account_age_days: i64,
}

impl RateTrack {
    #[must_use]
    pub fn new(now: SystemTime) -> Self {
        Self {
            minute_window_start: floor_to_boundary(now, MINUTE),
            hour_window_start: floor_to_boundary(now, HOUR),
            day_window_start: floor_to_boundary(now, DAY),
            sent_this_minute: 0,
            sent_this_hour: 0,
            sent_today: 0,
            failure_count_total: 0,
            consecutive_failures: 0,
            last_send_at: None,
            account_age_days: 0,
        }
    }

    /// Reset any window whose boundary has passed. Invariant: this runs
    /// before any subsequent check against the counters.
    pub fn reset_expired_windows(&mut self, now: SystemTime) {
        let minute_boundary = floor_to_boundary(now, MINUTE);
        if minute_boundary != self.minute_window_start {
            self.minute_window_start = minute_boundary;
            self.sent_this_minute = 0;
        }

        let hour_boundary = floor_to_boundary(now, HOUR);
        if hour_boundary != self.hour_window_start {
            self.hour_window_start = hour_boundary;
            self.sent_this_hour = 0;
        }

        let day_boundary = floor_to_boundary(now, DAY);
        if day_boundary != self.day_window_start {
            self.day_window_start = day_boundary;
            self.sent_today = 0;
        }
    }

    /// Milliseconds until the given window's current boundary expires.
    #[must_use]
    pub fn ms_until_minute_reset(&self, now: SystemTime) -> u64 {
        ms_until(self.minute_window_start + MINUTE, now)
    }

    #[must_use]
    pub fn ms_until_hour_reset(&self, now: SystemTime) -> u64 {
        ms_until(self.hour_window_start + HOUR, now)
    }

    #[must_use]
    pub fn ms_until_day_reset(&self, now: SystemTime) -> u64 {
        ms_until(self.day_window_start + DAY, now)
    }

    pub fn record_success(&mut self, now: SystemTime) {
        self.reset_expired_windows(now);
        self.sent_this_minute += 1;
        self.sent_this_hour += 1;
        self.sent_today += 1;
        self.consecutive_failures = 0;
        self.last_send_at = Some(now);
    }

    pub fn record_failure(&mut self) {
        self.failure_count_total += 1;
        self.consecutive_failures += 1;
    }
}

fn ms_until(deadline: SystemTime, now: SystemTime) -> u64 {
    deadline
        .duration_since(now)
        .unwrap_or(Duration::ZERO)
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}
