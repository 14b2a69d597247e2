//! Email Processor (spec §4.F): dequeues ready jobs, consults the rate
//! limiter, sends through the pluggable provider, updates the limiter on
//! success/failure, and routes retryable failures to the self-healing
//! engine.
//!
//! Grounded on `empath_delivery::processor::DeliveryProcessor::serve`'s
//! `tokio::select!` loop shape (timers raced against a shutdown branch);
//! `serve` here races a poll interval against a broadcast `Signal`
//! receiver instead of the teacher's scan/process/cleanup trio, since this
//! processor has a single poll-and-dispatch concern per worker.

pub mod stats;

use std::{sync::Arc, time::SystemTime};

use parking_lot::Mutex;
use sendkit_common::{Clock, EmailJob, ErrorKind, JobId, Sleeper, SendOutcome, Signal};
use sendkit_healing::{HealingAttempt, HealingDecision, SelfHealingEngine};
use sendkit_limiter::TieredRateLimiter;
use sendkit_provider::Provider;
use sendkit_queue::PriorityQueue;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

pub use stats::ProcessorStats;
use stats::RollingStats;

/// Configuration (spec §6 options table, processor-relevant subset).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ProcessorConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,

    #[serde(default = "default_provider_timeout_ms")]
    pub provider_timeout_ms: u64,

    /// How often an idle worker polls the queue when nothing is ready.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

const fn default_workers() -> usize {
    4
}

const fn default_provider_timeout_ms() -> u64 {
    30_000
}

const fn default_poll_interval_ms() -> u64 {
    50
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            provider_timeout_ms: default_provider_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

/// Per-job terminal or in-flight outcome, for subscribers and tests.
#[derive(Debug, Clone)]
pub enum ProcessEvent {
    /// Denied by the limiter; re-enqueued without consuming `attempts_made`.
    RateLimited { job_id: JobId, retry_after_ms: u64 },
    Succeeded { job_id: JobId, provider_message_id: String },
    /// Scheduled for a backoff retry by the self-healing engine.
    Retrying { job_id: JobId, attempt_number: u32, delay_ms: u64 },
    DeadLettered { job_id: JobId, reason: String },
    Escalated { job_id: JobId, history: Vec<HealingAttempt> },
    /// The send was cancelled mid-attempt; the job returns to the queue
    /// with `attempts_made` unchanged.
    Cancelled { job_id: JobId },
}

/// Result of one `ProcessJob` call, mirrored from the emitted event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    RateLimited,
    Succeeded,
    Retrying,
    DeadLettered,
    Escalated,
    Cancelled,
}

type Subscriber = Arc<dyn Fn(&ProcessEvent) + Send + Sync>;

fn error_kind_message(kind: ErrorKind, detail: Option<&str>) -> String {
    let label = match kind {
        ErrorKind::Timeout => "timeout",
        ErrorKind::RateLimitedByProvider => "rate_limited_by_provider",
        ErrorKind::Network => "network",
        ErrorKind::ResourceBusy => "resource_busy",
        ErrorKind::InvalidRecipient => "invalid_recipient",
        ErrorKind::Auth => "auth",
        ErrorKind::Unknown => "unknown",
    };
    detail.map_or_else(|| label.to_string(), |d| format!("{label}: {d}"))
}

/// The Processor: orchestrates Limiter -> Provider -> Self-Healing -> Queue.
pub struct Processor {
    queue: Arc<PriorityQueue>,
    limiter: Arc<TieredRateLimiter>,
    healing: Arc<SelfHealingEngine>,
    provider: Arc<dyn Provider>,
    clock: Arc<dyn Clock>,
    sleeper: Arc<dyn Sleeper>,
    config: ProcessorConfig,
    subscribers: Mutex<Vec<Subscriber>>,
    stats: Mutex<RollingStats>,
}

impl Processor {
    #[must_use]
    pub fn new(
        queue: Arc<PriorityQueue>,
        limiter: Arc<TieredRateLimiter>,
        healing: Arc<SelfHealingEngine>,
        provider: Arc<dyn Provider>,
        clock: Arc<dyn Clock>,
        sleeper: Arc<dyn Sleeper>,
        config: ProcessorConfig,
    ) -> Self {
        Self {
            queue,
            limiter,
            healing,
            provider,
            clock,
            sleeper,
            config,
            subscribers: Mutex::new(Vec::new()),
            stats: Mutex::new(RollingStats::default()),
        }
    }

    pub fn subscribe(&self, subscriber: impl Fn(&ProcessEvent) + Send + Sync + 'static) {
        self.subscribers.lock().push(Arc::new(subscriber));
    }

    fn emit(&self, event: ProcessEvent) -> ProcessOutcome {
        let outcome = match &event {
            ProcessEvent::RateLimited { .. } => ProcessOutcome::RateLimited,
            ProcessEvent::Succeeded { .. } => ProcessOutcome::Succeeded,
            ProcessEvent::Retrying { .. } => ProcessOutcome::Retrying,
            ProcessEvent::DeadLettered { .. } => ProcessOutcome::DeadLettered,
            ProcessEvent::Escalated { .. } => ProcessOutcome::Escalated,
            ProcessEvent::Cancelled { .. } => ProcessOutcome::Cancelled,
        };
        let subscribers = self.subscribers.lock();
        for subscriber in subscribers.iter() {
            subscriber(&event);
        }
        outcome
    }

    #[must_use]
    pub fn stats(&self) -> ProcessorStats {
        self.stats.lock().snapshot(self.clock.now())
    }

    /// `ProcessJob(job)` (spec §4.F Algorithm steps 1-4). Takes the job by
    /// value, since dequeue already removed it from the queue; this
    /// function is the only place that decides its fate next. `cancel`
    /// governs only the in-flight provider send (spec §5/§9): if it fires
    /// while the send is outstanding, the job returns to the queue with
    /// `attempts_made` untouched.
    pub async fn process_job(&self, mut job: EmailJob, cancel: &CancellationToken) -> ProcessOutcome {
        let now = self.clock.now();
        let domain = job.to.domain().clone();

        let decision = self.limiter.check(&domain, &job.account_id, job.account_age_days, now);

        if !decision.allowed {
            // Open Question decision #1: rate-limit denials never consume
            // attempts_made and never touch the self-healing engine.
            let retry_after_ms = decision.retry_after_ms.unwrap_or(60_000);
            job.scheduled_at = now + std::time::Duration::from_millis(retry_after_ms);
            let job_id = job.job_id;
            self.queue.enqueue(job).await;
            return self.emit(ProcessEvent::RateLimited { job_id, retry_after_ms });
        }

        let send_fut = tokio::time::timeout(
            std::time::Duration::from_millis(self.config.provider_timeout_ms),
            self.provider.send(&job),
        );

        let outcome = tokio::select! {
            result = send_fut => result.unwrap_or_else(|_| {
                SendOutcome::failure(ErrorKind::Timeout, "provider send timed out".into(), self.config.provider_timeout_ms)
            }),
            () = cancel.cancelled() => {
                let job_id = job.job_id;
                self.queue.enqueue(job).await;
                return self.emit(ProcessEvent::Cancelled { job_id });
            }
        };

        self.stats.lock().record(now, outcome.success, outcome.latency_ms);

        if outcome.success {
            self.limiter.record_success(&domain, &job.account_id, now);
            self.healing.on_success(&job.job_id.to_string());
            let job_id = job.job_id;
            let provider_message_id = outcome.provider_message_id.unwrap_or_default();
            return self.emit(ProcessEvent::Succeeded { job_id, provider_message_id });
        }

        self.limiter.record_failure(&domain, &job.account_id, now);
        let job_id = job.job_id;
        let message = error_kind_message(outcome.error_kind.unwrap_or(ErrorKind::Unknown), outcome.error_message.as_deref());

        if !outcome.retryable {
            self.queue.dead_letter(&job, message.clone(), now).await;
            return self.emit(ProcessEvent::DeadLettered { job_id, reason: message });
        }

        match self.healing.on_failure(&job_id.to_string(), &message, now) {
            HealingDecision::RetryAfter { delay_ms, attempt_number } => {
                job.prepare_retry(now + std::time::Duration::from_millis(delay_ms));
                self.queue.enqueue(job).await;
                self.emit(ProcessEvent::Retrying { job_id, attempt_number, delay_ms })
            }
            HealingDecision::Escalated { history } => {
                job.attempts_made += 1;
                self.queue.dead_letter(&job, "self-healing attempts exhausted".into(), now).await;
                self.emit(ProcessEvent::Escalated { job_id, history })
            }
        }
    }

    /// `Run(ctx)`: repeatedly `DequeueReady` then `ProcessJob`, racing a
    /// poll interval against shutdown — the teacher's `serve()`
    /// `tokio::select!` shape, reduced to this processor's single poll
    /// timer plus shutdown branch.
    pub async fn serve(self: Arc<Self>, mut shutdown: broadcast::Receiver<Signal>) {
        let cancel = CancellationToken::new();
        {
            let cancel = cancel.clone();
            let mut shutdown_rx = shutdown.resubscribe();
            tokio::spawn(async move {
                if matches!(shutdown_rx.recv().await, Ok(Signal::Shutdown) | Err(_)) {
                    cancel.cancel();
                }
            });
        }

        loop {
            let now = self.clock.now();
            match self.queue.dequeue_ready(now).await {
                Some(job) => {
                    self.process_job(job, &cancel).await;
                }
                None => {
                    tokio::select! {
                        () = self.sleeper.sleep(std::time::Duration::from_millis(self.config.poll_interval_ms)) => {}
                        signal = shutdown.recv() => {
                            if matches!(signal, Ok(Signal::Shutdown) | Err(_)) {
                                return;
                            }
                        }
                    }
                }
            }

            if matches!(shutdown.try_recv(), Ok(Signal::Shutdown)) {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sendkit_common::{FakeClock, FakeRandomness, NewEmailJob, NoopSleeper, Priority};
    use sendkit_healing::SelfHealingConfig;
    use sendkit_limiter::RateLimiterConfig;
    use sendkit_provider::{FailurePattern, LatencyDistribution, SimulatedProvider};
    use std::time::UNIX_EPOCH;

    fn job(to: &str, account_age_days: i64) -> EmailJob {
        EmailJob::new(NewEmailJob {
            to: to.into(),
            from: "sender@example.com".into(),
            subject: "hi".into(),
            body_text: Some("hello".into()),
            body_html: None,
            account_id: "acct-1".into(),
            account_age_days,
            priority: Priority::Normal,
            scheduled_at: UNIX_EPOCH,
            headers: None,
            campaign_id: None,
        })
        .unwrap()
    }

    fn processor(provider: SimulatedProvider, clock: FakeClock) -> Arc<Processor> {
        Arc::new(Processor::new(
            Arc::new(PriorityQueue::new()),
            Arc::new(TieredRateLimiter::new(RateLimiterConfig::default())),
            Arc::new(SelfHealingEngine::new(
                SelfHealingConfig::default(),
                Arc::new(FakeRandomness::new(vec![0.5])),
            )),
            Arc::new(provider),
            Arc::new(clock),
            Arc::new(NoopSleeper),
            ProcessorConfig::default(),
        ))
    }

    #[tokio::test]
    async fn successful_send_records_success_and_emits_event() {
        let clock = FakeClock::new(UNIX_EPOCH);
        let processor = processor(SimulatedProvider::default(), clock);
        let outcome = processor.process_job(job("clean@example.com", 40), &CancellationToken::new()).await;
        assert_eq!(outcome, ProcessOutcome::Succeeded);
        assert_eq!(processor.stats().succeeded, 1);
    }

    #[tokio::test]
    async fn rate_limited_job_is_requeued_without_consuming_attempts() {
        let clock = FakeClock::new(UNIX_EPOCH);
        let processor = processor(SimulatedProvider::default(), clock);

        // Day-1 accounts cap at 2/minute; exhaust it first.
        for _ in 0..2 {
            let outcome = processor.process_job(job("a@example.com", 1), &CancellationToken::new()).await;
            assert_eq!(outcome, ProcessOutcome::Succeeded);
        }

        let outcome = processor.process_job(job("a@example.com", 1), &CancellationToken::new()).await;
        assert_eq!(outcome, ProcessOutcome::RateLimited);
        assert_eq!(processor.queue.total_depth().await, 1);

        let requeued = processor.queue.dequeue_ready(UNIX_EPOCH + std::time::Duration::from_secs(61)).await;
        assert!(requeued.is_some());
        assert_eq!(requeued.unwrap().attempts_made, 0);
    }

    #[tokio::test]
    async fn retryable_failure_schedules_backoff_retry() {
        let provider = SimulatedProvider::new(
            vec![FailurePattern {
                local_part_contains: "flaky".into(),
                error_kind: ErrorKind::Unknown,
            }],
            LatencyDistribution::default(),
        );
        let clock = FakeClock::new(UNIX_EPOCH);
        let processor = processor(provider, clock);

        let outcome = processor.process_job(job("flaky@example.com", 40), &CancellationToken::new()).await;
        assert_eq!(outcome, ProcessOutcome::Retrying);
        assert_eq!(processor.queue.total_depth().await, 1);
    }

    #[tokio::test]
    async fn non_retryable_failure_goes_straight_to_dlq() {
        let provider = SimulatedProvider::new(
            vec![FailurePattern {
                local_part_contains: "bounce".into(),
                error_kind: ErrorKind::InvalidRecipient,
            }],
            LatencyDistribution::default(),
        );
        let clock = FakeClock::new(UNIX_EPOCH);
        let processor = processor(provider, clock);

        let outcome = processor.process_job(job("bounce@example.com", 40), &CancellationToken::new()).await;
        assert_eq!(outcome, ProcessOutcome::DeadLettered);
        assert_eq!(processor.queue.dlq_len().await, 1);
    }

    #[tokio::test]
    async fn escalation_after_three_failures_dead_letters() {
        let provider = SimulatedProvider::new(
            vec![FailurePattern {
                local_part_contains: "dead".into(),
                error_kind: ErrorKind::Unknown,
            }],
            LatencyDistribution::default(),
        );
        let clock = FakeClock::new(UNIX_EPOCH);
        let processor = processor(provider, clock);

        // Retries preserve the original job_id (prepare_retry never
        // changes it), so re-dequeue the same job across attempts rather
        // than constructing a fresh one each time.
        let mut current = job("dead@example.com", 40);
        let mut last = None;
        for attempt in 0..3u64 {
            last = Some(processor.process_job(current.clone(), &CancellationToken::new()).await);
            if attempt < 2 {
                let far_future = UNIX_EPOCH + std::time::Duration::from_secs(3600 * (attempt + 1));
                current = processor.queue.dequeue_ready(far_future).await.expect("retry still queued");
            }
        }
        assert_eq!(last, Some(ProcessOutcome::Escalated));
        assert_eq!(processor.queue.dlq_len().await, 1);
    }

    #[tokio::test]
    async fn cancelled_mid_attempt_requeues_with_attempts_unchanged() {
        let clock = FakeClock::new(UNIX_EPOCH);
        let processor = processor(SimulatedProvider::default(), clock);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = processor.process_job(job("clean@example.com", 40), &cancel).await;
        assert_eq!(outcome, ProcessOutcome::Cancelled);
        assert_eq!(processor.queue.total_depth().await, 1);

        let requeued = processor.queue.dequeue_ready(UNIX_EPOCH).await.expect("job requeued");
        assert_eq!(requeued.attempts_made, 0);
    }
}
