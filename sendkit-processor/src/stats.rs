//! Rolling processor stats (spec §4.G step 2): processed/succeeded/failed
//! counters plus a 60-second rolling window for throughput and error rate.

use std::{collections::VecDeque, time::SystemTime};

use serde::{Deserialize, Serialize};

const WINDOW: std::time::Duration = std::time::Duration::from_secs(60);

struct Sample {
    at: SystemTime,
    success: bool,
    latency_ms: u64,
}

/// Snapshot handed to the Monitor on its sampling tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProcessorStats {
    pub processed: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// Sends per second over the last 60s window.
    pub throughput_per_sec: f64,
    pub avg_latency_ms: f64,
    /// Failures / total over the last 60s window.
    pub error_rate: f64,
}

#[derive(Default)]
pub struct RollingStats {
    processed: u64,
    succeeded: u64,
    failed: u64,
    window: VecDeque<Sample>,
}

impl RollingStats {
    pub fn record(&mut self, now: SystemTime, success: bool, latency_ms: u64) {
        self.processed += 1;
        if success {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
        self.window.push_back(Sample {
            at: now,
            success,
            latency_ms,
        });
        self.prune(now);
    }

    fn prune(&mut self, now: SystemTime) {
        while let Some(front) = self.window.front() {
            match now.duration_since(front.at) {
                Ok(age) if age > WINDOW => {
                    self.window.pop_front();
                }
                _ => break,
            }
        }
    }

    #[must_use]
    pub fn snapshot(&self, now: SystemTime) -> ProcessorStats {
        // A read-only snapshot still prunes against `now` conceptually,
        // but we avoid mutating here; stale entries purge on the next
        // `record`. Callers sampling a live processor see at most one
        // window-length of staleness, matching the Monitor's own tick
        // cadence.
        let total = self.window.len();
        let errors = self.window.iter().filter(|s| !s.success).count();
        let avg_latency_ms = if total == 0 {
            0.0
        } else {
            self.window.iter().map(|s| s.latency_ms as f64).sum::<f64>() / total as f64
        };
        let error_rate = if total == 0 {
            0.0
        } else {
            errors as f64 / total as f64
        };
        let oldest_age_secs = self
            .window
            .front()
            .and_then(|s| now.duration_since(s.at).ok())
            .map_or(0.0, |d| d.as_secs_f64().max(1.0));
        let throughput_per_sec = if total == 0 { 0.0 } else { total as f64 / oldest_age_secs };

        ProcessorStats {
            processed: self.processed,
            succeeded: self.succeeded,
            failed: self.failed,
            throughput_per_sec,
            avg_latency_ms,
            error_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    #[test]
    fn error_rate_reflects_window_only() {
        let mut stats = RollingStats::default();
        let t0 = UNIX_EPOCH;
        for _ in 0..7 {
            stats.record(t0, true, 10);
        }
        stats.record(t0, false, 10);
        stats.record(t0, false, 10);
        stats.record(t0, false, 10);
        let snapshot = stats.snapshot(t0);
        assert_eq!(snapshot.processed, 10);
        assert!((snapshot.error_rate - 0.3).abs() < 1e-9);
    }

    #[test]
    fn entries_older_than_window_are_pruned_on_next_record() {
        let mut stats = RollingStats::default();
        let t0 = UNIX_EPOCH;
        stats.record(t0, false, 10);
        let t1 = t0 + Duration::from_secs(61);
        stats.record(t1, true, 10);
        let snapshot = stats.snapshot(t1);
        assert_eq!(snapshot.error_rate, 0.0);
        assert_eq!(snapshot.processed, 2);
    }
}
