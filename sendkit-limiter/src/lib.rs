//! Warm-up rate limiter (spec §4.C): per-(domain, account) token
//! accounting across minute/hour/day windows, a deterministic account-age
//! tier schedule, and a consecutive-failure circuit gate.
//!
//! Grounded on `empath_delivery::rate_limiter::RateLimiter`'s
//! `DashMap<Domain, Arc<parking_lot::Mutex<_>>>` per-key-lock
//! architecture; the bucket math itself is not reused since this spec
//! wants window counters, not a token bucket.

pub mod tiers;
pub mod track;

use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};

use dashmap::DashMap;
use parking_lot::Mutex;
use sendkit_common::Domain;
use serde::{Deserialize, Serialize};

pub use tiers::{default_tiers, tier_for, RateTier, TierRow};
pub use track::RateTrack;

/// Why a `Check` denied (or would have denied) a send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DenyReason {
    PerMinute,
    PerHour,
    PerDay,
    CircuitOpen,
}

/// Current counts, mirrored back on every `Decision` for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowCounts {
    pub minute: u32,
    pub hour: u32,
    pub day: u32,
}

/// Result of `Check`.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub allowed: bool,
    pub reason: Option<DenyReason>,
    pub retry_after_ms: Option<u64>,
    pub current: WindowCounts,
    pub limits: RateTier,
}

/// Emitted after every `Check`, once the decision has been handed back to
/// the caller.
#[derive(Debug, Clone)]
pub struct LimiterEvent {
    pub allowed: bool,
    pub domain: Domain,
    pub account_id: String,
    pub reason: Option<DenyReason>,
}

type Subscriber = Arc<dyn Fn(&LimiterEvent) + Send + Sync>;

/// Configuration (spec §6 options table, limiter-relevant subset).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimiterConfig {
    #[serde(default = "default_consecutive_failure_threshold")]
    pub consecutive_failure_threshold: u32,

    /// If `false`, a would-be denial downgrades to a warning and the send
    /// is permitted anyway (spec §6 `hard_limit`).
    #[serde(default = "default_hard_limit")]
    pub hard_limit: bool,

    /// Override of the default tier table (spec §6 `rate_tiers`). `None`
    /// keeps the built-in table from `tiers::default_tiers`.
    #[serde(default)]
    pub rate_tiers: Option<Vec<TierRowConfig>>,
}

/// Serializable mirror of `TierRow`/`RateTier` for config deserialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierRowConfig {
    pub min_age_days: i64,
    pub max_age_days: Option<i64>,
    pub per_day: u32,
    pub per_hour: u32,
    pub per_minute: u32,
    pub label: String,
}

const fn default_consecutive_failure_threshold() -> u32 {
    10
}

const fn default_hard_limit() -> bool {
    true
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            consecutive_failure_threshold: default_consecutive_failure_threshold(),
            hard_limit: default_hard_limit(),
            rate_tiers: None,
        }
    }
}

/// Key type for the per-(domain, account) state map.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TrackKey {
    domain: Domain,
    account_id: String,
}

/// The warm-up rate limiter.
pub struct TieredRateLimiter {
    config: RateLimiterConfig,
    tiers: Vec<TierRow>,
    tracks: DashMap<TrackKey, Arc<Mutex<RateTrack>>>,
    subscribers: Mutex<Vec<Subscriber>>,
}

impl TieredRateLimiter {
    #[must_use]
    pub fn new(config: RateLimiterConfig) -> Self {
        let tiers = config.rate_tiers.as_ref().map_or_else(default_tiers, |rows| {
            rows.iter()
                .map(|row| TierRow {
                    min_age_days: row.min_age_days,
                    max_age_days: row.max_age_days,
                    tier: RateTier {
                        per_day: row.per_day,
                        per_hour: row.per_hour,
                        per_minute: row.per_minute,
                        label: Arc::from(row.label.as_str()),
                    },
                })
                .collect()
        });

        Self {
            config,
            tiers,
            tracks: DashMap::new(),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Register a subscriber called after every `check` with the
    /// resulting event. Registration order is preserved for delivery.
    pub fn subscribe(&self, subscriber: impl Fn(&LimiterEvent) + Send + Sync + 'static) {
        self.subscribers.lock().push(Arc::new(subscriber));
    }

    fn get_track(&self, key: &TrackKey, now: SystemTime) -> Arc<Mutex<RateTrack>> {
        self.tracks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(RateTrack::new(now))))
            .clone()
    }

    fn emit(&self, event: LimiterEvent) {
        let subscribers = self.subscribers.lock();
        for subscriber in subscribers.iter() {
            subscriber(&event);
        }
    }

    /// `Check(domain, account_id, account_age_days)` (spec §4.C).
    pub fn check(
        &self,
        domain: &Domain,
        account_id: &str,
        account_age_days: i64,
        now: SystemTime,
    ) -> Decision {
        let key = TrackKey {
            domain: domain.clone(),
            account_id: account_id.to_string(),
        };
        let track = self.get_track(&key, now);
        let limits = tier_for(&self.tiers, account_age_days);

        let mut guard = track.lock();
        guard.account_age_days = account_age_days;
        guard.reset_expired_windows(now);

        let current = WindowCounts {
            minute: guard.sent_this_minute,
            hour: guard.sent_this_hour,
            day: guard.sent_today,
        };

        // Exact equality with a limit is a deny (spec §4.C Tie-breaks).
        let would_deny = if current.minute >= limits.per_minute {
            Some((DenyReason::PerMinute, guard.ms_until_minute_reset(now)))
        } else if current.hour >= limits.per_hour {
            Some((DenyReason::PerHour, guard.ms_until_hour_reset(now)))
        } else if current.day >= limits.per_day {
            Some((DenyReason::PerDay, guard.ms_until_day_reset(now)))
        } else if guard.consecutive_failures >= self.config.consecutive_failure_threshold {
            Some((DenyReason::CircuitOpen, 60_000))
        } else {
            None
        };
        drop(guard);

        let decision = match would_deny {
            Some((reason, retry_after_ms)) if self.config.hard_limit => Decision {
                allowed: false,
                reason: Some(reason),
                retry_after_ms: Some(retry_after_ms),
                current,
                limits,
            },
            Some((reason, _)) => Decision {
                allowed: true,
                reason: Some(reason),
                retry_after_ms: None,
                current,
                limits,
            },
            None => Decision {
                allowed: true,
                reason: None,
                retry_after_ms: None,
                current,
                limits,
            },
        };

        if !decision.allowed {
            tracing::debug!(
                %domain,
                account_id,
                reason = ?decision.reason,
                retry_after_ms = ?decision.retry_after_ms,
                "rate limiter denied send"
            );
        }

        self.emit(LimiterEvent {
            allowed: decision.allowed,
            domain: domain.clone(),
            account_id: account_id.to_string(),
            reason: decision.reason,
        });

        decision
    }

    /// `RecordSuccess(domain, account_id)`.
    pub fn record_success(&self, domain: &Domain, account_id: &str, now: SystemTime) {
        let key = TrackKey {
            domain: domain.clone(),
            account_id: account_id.to_string(),
        };
        let track = self.get_track(&key, now);
        track.lock().record_success(now);
    }

    /// `RecordFailure(domain, account_id)`.
    pub fn record_failure(&self, domain: &Domain, account_id: &str, now: SystemTime) {
        let key = TrackKey {
            domain: domain.clone(),
            account_id: account_id.to_string(),
        };
        let track = self.get_track(&key, now);
        track.lock().record_failure();
    }

    /// Snapshot every tracked `(domain, account_id)` for the Monitor
    /// (spec §4.G step 3): `{tier_label, sent_today, utilization}`.
    #[must_use]
    pub fn snapshot(&self) -> Vec<TrackSnapshot> {
        self.tracks
            .iter()
            .map(|entry| {
                let guard = entry.value().lock();
                TrackSnapshot {
                    domain: entry.key().domain.clone(),
                    account_id: entry.key().account_id.clone(),
                    sent_today: guard.sent_today,
                    consecutive_failures: guard.consecutive_failures,
                    account_age_days: guard.account_age_days,
                }
            })
            .collect()
    }

    #[must_use]
    pub fn tracked_entry_count(&self) -> usize {
        self.tracks.len()
    }

    /// The tier table in effect, for callers (the Monitor) resolving a
    /// `TrackSnapshot`'s tier without re-deriving the default table.
    #[must_use]
    pub fn tiers(&self) -> &[TierRow] {
        &self.tiers
    }
}

/// A read-only view of one tracked `(domain, account_id)`, for the
/// Monitor's utilization sampling.
#[derive(Debug, Clone)]
pub struct TrackSnapshot {
    pub domain: Domain,
    pub account_id: String,
    pub sent_today: u32,
    pub consecutive_failures: u32,
    pub account_age_days: i64,
}

impl TrackSnapshot {
    #[must_use]
    pub fn utilization(&self, tiers: &[TierRow]) -> f64 {
        let tier = tier_for(tiers, self.account_age_days);
        if tier.per_day == 0 {
            return 0.0;
        }
        f64::from(self.sent_today) / f64::from(tier.per_day)
    }

    #[must_use]
    pub fn tier_label(&self, tiers: &[TierRow]) -> std::sync::Arc<str> {
        tier_for(tiers, self.account_age_days).label
    }
}
