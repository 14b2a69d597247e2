//! The sampling loop itself (spec §4.G): one tick reads every other
//! component, evaluates alert rules, and refreshes aggregate health.
//!
//! Grounded on `empath_delivery::processor::DeliveryProcessor::serve`'s
//! periodic-timer-plus-shutdown `tokio::select!` shape, reused here for
//! the Monitor's own `tokio::time::interval`-equivalent tick (via the
//! injected `Sleeper`, so tests can drive ticks without real time).

use std::sync::Arc;

use parking_lot::Mutex;
use sendkit_common::{Clock, Sleeper, Signal};
use sendkit_limiter::TieredRateLimiter;
use sendkit_processor::Processor;
use sendkit_provider::Provider;
use sendkit_queue::{PriorityQueue, QueueStats};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::alerts::{Alert, AlertTable, Rule};
use crate::health::{aggregate, ComponentHealth, Status};

/// Configuration (spec §6 options table, monitor-relevant subset, plus
/// the alert thresholds spec §4.G fixes numerically).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,

    #[serde(default = "default_queue_depth_threshold")]
    pub queue_depth_threshold: u64,

    #[serde(default = "default_error_rate_threshold")]
    pub error_rate_threshold: f64,

    #[serde(default = "default_domain_utilization_threshold")]
    pub domain_utilization_threshold: f64,

    #[serde(default = "default_consecutive_failure_threshold")]
    pub consecutive_failure_threshold: u32,

    /// Rate-limiter health cap: "OK if tracked entries < cap" (spec §4.G
    /// step 5).
    #[serde(default = "default_tracked_entry_cap")]
    pub tracked_entry_cap: usize,
}

const fn default_sample_interval_ms() -> u64 {
    10_000
}
const fn default_queue_depth_threshold() -> u64 {
    1000
}
const fn default_error_rate_threshold() -> f64 {
    0.2
}
const fn default_domain_utilization_threshold() -> f64 {
    0.9
}
const fn default_consecutive_failure_threshold() -> u32 {
    10
}
const fn default_tracked_entry_cap() -> usize {
    100_000
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: default_sample_interval_ms(),
            queue_depth_threshold: default_queue_depth_threshold(),
            error_rate_threshold: default_error_rate_threshold(),
            domain_utilization_threshold: default_domain_utilization_threshold(),
            consecutive_failure_threshold: default_consecutive_failure_threshold(),
            tracked_entry_cap: default_tracked_entry_cap(),
        }
    }
}

/// One domain/account utilization reading (spec §4.G step 3).
#[derive(Debug, Clone, Serialize)]
pub struct DomainUtilization {
    pub domain: String,
    pub account_id: String,
    pub tier_label: String,
    pub sent_today: u32,
    pub utilization: f64,
}

/// A complete snapshot of one sample tick, for subscribers and the
/// `/health`/`/metrics` handlers.
#[derive(Debug, Clone, Serialize)]
pub struct Sample {
    pub queue_stats: [(&'static str, QueueStats); 3],
    pub dlq_depth: usize,
    pub processor: sendkit_processor::ProcessorStats,
    pub domain_utilization: Vec<DomainUtilization>,
    pub components: Vec<ComponentSnapshot>,
    pub aggregate_status: Status,
    pub active_alerts: Vec<Alert>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentSnapshot {
    pub component: &'static str,
    pub status: Status,
}

type Subscriber = Arc<dyn Fn(&Sample) + Send + Sync>;

/// The Queue Monitor.
pub struct Monitor {
    config: MonitorConfig,
    queue: Arc<PriorityQueue>,
    limiter: Arc<TieredRateLimiter>,
    processor: Arc<Processor>,
    provider: Arc<dyn Provider>,
    clock: Arc<dyn Clock>,
    sleeper: Arc<dyn Sleeper>,
    alerts: Mutex<AlertTable>,
    subscribers: Mutex<Vec<Subscriber>>,
}

impl Monitor {
    #[must_use]
    pub fn new(
        config: MonitorConfig,
        queue: Arc<PriorityQueue>,
        limiter: Arc<TieredRateLimiter>,
        processor: Arc<Processor>,
        provider: Arc<dyn Provider>,
        clock: Arc<dyn Clock>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self {
            config,
            queue,
            limiter,
            processor,
            provider,
            clock,
            sleeper,
            alerts: Mutex::new(AlertTable::default()),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn subscribe(&self, subscriber: impl Fn(&Sample) + Send + Sync + 'static) {
        self.subscribers.lock().push(Arc::new(subscriber));
    }

    /// One sampling tick (spec §4.G steps 1-5).
    pub async fn sample(&self) -> Sample {
        let now = self.clock.now();

        let queue_stats = [
            ("HIGH_PRIORITY", self.queue.stats(sendkit_common::QueueName::HighPriority, now).await),
            ("NORMAL", self.queue.stats(sendkit_common::QueueName::Normal, now).await),
            ("BULK", self.queue.stats(sendkit_common::QueueName::Bulk, now).await),
        ];
        let dlq_depth = self.queue.dlq_len().await;
        let processor_stats = self.processor.stats();
        let provider_health = self.provider.health().await;

        let tiers = self.limiter.tiers();
        let domain_utilization: Vec<DomainUtilization> = self
            .limiter
            .snapshot()
            .into_iter()
            .map(|track| DomainUtilization {
                domain: track.domain.to_string(),
                account_id: track.account_id.clone(),
                tier_label: track.tier_label(tiers).to_string(),
                sent_today: track.sent_today,
                utilization: track.utilization(tiers),
                })
            .collect();

        let max_consecutive_failures = self
            .limiter
            .snapshot()
            .iter()
            .map(|t| t.consecutive_failures)
            .max()
            .unwrap_or(0);

        let total_depth: u64 = queue_stats.iter().map(|(_, s)| (s.waiting + s.delayed) as u64).sum();
        let max_domain_utilization = domain_utilization.iter().map(|d| d.utilization).fold(0.0_f64, f64::max);

        {
            let mut alerts = self.alerts.lock();
            alerts.evaluate(
                "queue",
                Rule::QueueDepth,
                total_depth > self.config.queue_depth_threshold,
                format!("queue depth {total_depth}"),
                now,
            );
            alerts.evaluate(
                "processor",
                Rule::ErrorRate,
                processor_stats.error_rate > self.config.error_rate_threshold,
                format!("error rate {:.2}", processor_stats.error_rate),
                now,
            );
            alerts.evaluate(
                "limiter",
                Rule::DomainUtilization,
                max_domain_utilization > self.config.domain_utilization_threshold,
                format!("max utilization {max_domain_utilization:.2}"),
                now,
            );
            alerts.evaluate(
                "limiter",
                Rule::ConsecutiveFailures,
                max_consecutive_failures >= self.config.consecutive_failure_threshold,
                format!("max consecutive failures {max_consecutive_failures}"),
                now,
            );
            alerts.evaluate(
                "provider",
                Rule::ProviderHealth,
                !provider_health.healthy,
                "provider reported unhealthy".into(),
                now,
            );
        }

        let queue_status = Status::Healthy; // the queue answered; it's OK by construction.
        let limiter_status = if self.limiter.tracked_entry_count() < self.config.tracked_entry_cap {
            Status::Healthy
        } else {
            Status::Degraded
        };
        let processor_status = if processor_stats.error_rate < self.config.error_rate_threshold && provider_health.healthy {
            Status::Healthy
        } else {
            Status::Critical
        };

        let components = vec![
            ComponentSnapshot {
                component: "queue",
                status: queue_status,
            },
            ComponentSnapshot {
                component: "limiter",
                status: limiter_status,
            },
            ComponentSnapshot {
                component: "processor",
                status: processor_status,
            },
        ];

        let health_views: Vec<ComponentHealth> = components
            .iter()
            .map(|c| ComponentHealth {
                component: c.component,
                status: c.status,
                detail: None,
            })
            .collect();

        let sample = Sample {
            queue_stats,
            dlq_depth,
            processor: processor_stats,
            domain_utilization,
            aggregate_status: aggregate(&health_views),
            components,
            active_alerts: self.alerts.lock().active_alerts(),
        };

        let subscribers = self.subscribers.lock();
        for subscriber in subscribers.iter() {
            subscriber(&sample);
        }

        sample
    }

    /// The sampling loop: tick every `sample_interval_ms`, racing a
    /// shutdown broadcast the same way the Processor's `serve` does.
    pub async fn serve(self: Arc<Self>, mut shutdown: broadcast::Receiver<Signal>) {
        loop {
            tokio::select! {
                () = self.sleeper.sleep(std::time::Duration::from_millis(self.config.sample_interval_ms)) => {
                    self.sample().await;
                }
                signal = shutdown.recv() => {
                    if matches!(signal, Ok(Signal::Shutdown) | Err(_)) {
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sendkit_common::{FakeClock, FakeRandomness, NoopSleeper};
    use sendkit_healing::{SelfHealingConfig, SelfHealingEngine};
    use sendkit_limiter::RateLimiterConfig;
    use sendkit_processor::ProcessorConfig;
    use sendkit_provider::SimulatedProvider;
    use std::time::UNIX_EPOCH;

    fn monitor_with_provider(provider: Arc<dyn Provider>) -> Arc<Monitor> {
        let clock = Arc::new(FakeClock::new(UNIX_EPOCH));
        let queue = Arc::new(PriorityQueue::new());
        let limiter = Arc::new(TieredRateLimiter::new(RateLimiterConfig::default()));
        let healing = Arc::new(SelfHealingEngine::new(
            SelfHealingConfig::default(),
            Arc::new(FakeRandomness::new(vec![0.5])),
        ));
        let processor = Arc::new(Processor::new(
            queue.clone(),
            limiter.clone(),
            healing,
            provider.clone(),
            clock.clone(),
            Arc::new(NoopSleeper),
            ProcessorConfig::default(),
        ));

        Arc::new(Monitor::new(
            MonitorConfig::default(),
            queue,
            limiter,
            processor,
            provider,
            clock,
            Arc::new(NoopSleeper),
        ))
    }

    #[tokio::test]
    async fn empty_system_is_healthy_with_no_alerts() {
        let monitor = monitor_with_provider(Arc::new(SimulatedProvider::default()));
        let sample = monitor.sample().await;
        assert_eq!(sample.aggregate_status, Status::Healthy);
        assert!(sample.active_alerts.is_empty());
    }

    #[tokio::test]
    async fn unhealthy_provider_raises_critical_alert_and_resolves_on_recovery() {
        let provider = Arc::new(SimulatedProvider::default());
        provider.set_healthy(false);
        let monitor = monitor_with_provider(provider.clone());

        let sample = monitor.sample().await;
        assert_eq!(sample.aggregate_status, Status::Critical);
        assert!(sample.active_alerts.iter().any(|a| a.rule_id == "provider_health"));

        provider.set_healthy(true);
        let sample = monitor.sample().await;
        assert!(sample.active_alerts.iter().all(|a| a.rule_id != "provider_health"));
    }
}
