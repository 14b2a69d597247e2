//! Priority email queue (spec §4.D): three named FIFO-with-schedule
//! queues ordered by `(scheduled_at, enqueue_seq)`, plus a dead-letter
//! queue.
//!
//! Grounded on `empath_delivery::queue::DeliveryQueue`'s
//! `Arc<tokio::sync::RwLock<_>>` ownership style, generalized from a flat
//! `HashMap` into three ordered `BTreeMap`s since the teacher has no
//! priority concept to borrow directly.

use std::{
    collections::BTreeMap,
    sync::atomic::{AtomicU64, Ordering},
    time::SystemTime,
};

use sendkit_common::{EmailJob, JobId, QueueName};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Ordering key within a single queue: earliest `scheduled_at` first,
/// ties broken by insertion order.
type OrderKey = (SystemTime, u64);

#[derive(Default)]
struct SingleQueue {
    jobs: BTreeMap<OrderKey, EmailJob>,
    paused: bool,
}

impl SingleQueue {
    fn waiting_and_delayed(&self, now: SystemTime) -> (usize, usize) {
        let waiting = self
            .jobs
            .keys()
            .filter(|(scheduled_at, _)| *scheduled_at <= now)
            .count();
        (waiting, self.jobs.len() - waiting)
    }

    fn pop_ready(&mut self, now: SystemTime) -> Option<EmailJob> {
        if self.paused {
            return None;
        }
        let key = *self
            .jobs
            .iter()
            .find(|(key, _)| key.0 <= now)
            .map(|(key, _)| key)?;
        self.jobs.remove(&key)
    }
}

/// A dead-lettered job: terminal parking for jobs the Processor marks as
/// undeliverable. Never re-dequeued, but countable and exportable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetter {
    pub job_id: JobId,
    pub reason: String,
    pub parked_at: SystemTime,
}

/// `Stats(queue) -> {waiting, delayed, paused}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub waiting: usize,
    pub delayed: usize,
    pub paused: bool,
}

struct QueueState {
    high_priority: SingleQueue,
    normal: SingleQueue,
    bulk: SingleQueue,
    dlq: Vec<DeadLetter>,
}

impl QueueState {
    fn queue_mut(&mut self, name: QueueName) -> &mut SingleQueue {
        match name {
            QueueName::HighPriority => &mut self.high_priority,
            QueueName::Normal => &mut self.normal,
            QueueName::Bulk => &mut self.bulk,
        }
    }

    fn queue(&self, name: QueueName) -> &SingleQueue {
        match name {
            QueueName::HighPriority => &self.high_priority,
            QueueName::Normal => &self.normal,
            QueueName::Bulk => &self.bulk,
        }
    }
}

/// The three-queue-plus-DLQ priority structure.
pub struct PriorityQueue {
    state: RwLock<QueueState>,
    enqueue_seq: AtomicU64,
}

impl Default for PriorityQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl PriorityQueue {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RwLock::new(QueueState {
                high_priority: SingleQueue::default(),
                normal: SingleQueue::default(),
                bulk: SingleQueue::default(),
                dlq: Vec::new(),
            }),
            enqueue_seq: AtomicU64::new(0),
        }
    }

    /// `Enqueue(job)`: routes by priority to the matching queue.
    pub async fn enqueue(&self, job: EmailJob) {
        let seq = self.enqueue_seq.fetch_add(1, Ordering::Relaxed);
        let queue_name = job.queue_name();
        let scheduled_at = job.scheduled_at;
        let mut state = self.state.write().await;
        state.queue_mut(queue_name).jobs.insert((scheduled_at, seq), job);
    }

    /// `DequeueReady(now) -> job?`: strict priority across HIGH, NORMAL,
    /// BULK; FIFO by `(scheduled_at, enqueue_seq)` within a queue.
    pub async fn dequeue_ready(&self, now: SystemTime) -> Option<EmailJob> {
        let mut state = self.state.write().await;
        for name in QueueName::ORDER {
            if let Some(job) = state.queue_mut(name).pop_ready(now) {
                return Some(job);
            }
        }
        None
    }

    pub async fn stats(&self, name: QueueName, now: SystemTime) -> QueueStats {
        let state = self.state.read().await;
        let queue = state.queue(name);
        let (waiting, delayed) = queue.waiting_and_delayed(now);
        QueueStats {
            waiting,
            delayed,
            paused: queue.paused,
        }
    }

    pub async fn pause(&self, name: QueueName) {
        self.state.write().await.queue_mut(name).paused = true;
    }

    pub async fn resume(&self, name: QueueName) {
        self.state.write().await.queue_mut(name).paused = false;
    }

    /// Park a job in the dead-letter queue. Never re-dequeued.
    pub async fn dead_letter(&self, job: &EmailJob, reason: impl Into<String>, now: SystemTime) {
        let mut state = self.state.write().await;
        state.dlq.push(DeadLetter {
            job_id: job.job_id,
            reason: reason.into(),
            parked_at: now,
        });
        tracing::warn!(job_id = %job.job_id, "job dead-lettered");
    }

    pub async fn dlq_len(&self) -> usize {
        self.state.read().await.dlq.len()
    }

    pub async fn dlq_snapshot(&self) -> Vec<DeadLetter> {
        self.state.read().await.dlq.clone()
    }

    /// Total depth across all three live queues (ready + delayed), for
    /// the Monitor's `queue_depth` sample.
    pub async fn total_depth(&self) -> usize {
        let state = self.state.read().await;
        state.high_priority.jobs.len() + state.normal.jobs.len() + state.bulk.jobs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sendkit_common::{NewEmailJob, Priority};
    use std::time::{Duration, UNIX_EPOCH};

    fn job(priority: Priority, scheduled_at: SystemTime) -> EmailJob {
        EmailJob::new(NewEmailJob {
            to: "a@example.com".into(),
            from: "b@example.com".into(),
            subject: "hi".into(),
            body_text: Some("hello".into()),
            body_html: None,
            account_id: "acct-1".into(),
            account_age_days: 10,
            priority,
            scheduled_at,
            headers: None,
            campaign_id: None,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn strict_priority_across_queues() {
        let queue = PriorityQueue::new();
        let t0 = UNIX_EPOCH;
        queue.enqueue(job(Priority::Low, t0)).await;
        queue.enqueue(job(Priority::High, t0 + Duration::from_secs(1))).await;

        // BULK was enqueued first but HIGH must dequeue first regardless.
        let first = queue.dequeue_ready(t0 + Duration::from_secs(10)).await.unwrap();
        assert_eq!(first.queue_name(), QueueName::HighPriority);
    }

    #[tokio::test]
    async fn fifo_within_a_queue_by_scheduled_at() {
        let queue = PriorityQueue::new();
        let t0 = UNIX_EPOCH;
        let earlier = job(Priority::Normal, t0);
        let earlier_id = earlier.job_id;
        queue.enqueue(job(Priority::Normal, t0 + Duration::from_secs(5))).await;
        queue.enqueue(earlier).await;

        let first = queue.dequeue_ready(t0 + Duration::from_secs(100)).await.unwrap();
        assert_eq!(first.job_id, earlier_id);
    }

    #[tokio::test]
    async fn not_ready_jobs_are_not_dequeued() {
        let queue = PriorityQueue::new();
        let t0 = UNIX_EPOCH;
        queue.enqueue(job(Priority::Normal, t0 + Duration::from_secs(100))).await;
        assert!(queue.dequeue_ready(t0).await.is_none());
        assert!(queue.dequeue_ready(t0 + Duration::from_secs(101)).await.is_some());
    }

    #[tokio::test]
    async fn pause_suppresses_dequeue_without_dropping_jobs() {
        let queue = PriorityQueue::new();
        let t0 = UNIX_EPOCH;
        queue.enqueue(job(Priority::Normal, t0)).await;
        queue.pause(QueueName::Normal).await;
        assert!(queue.dequeue_ready(t0).await.is_none());

        let stats = queue.stats(QueueName::Normal, t0).await;
        assert_eq!(stats.waiting, 1);
        assert!(stats.paused);

        queue.resume(QueueName::Normal).await;
        assert!(queue.dequeue_ready(t0).await.is_some());
    }

    #[tokio::test]
    async fn dead_lettered_jobs_are_countable_and_never_dequeued() {
        let queue = PriorityQueue::new();
        let t0 = UNIX_EPOCH;
        let job = job(Priority::Normal, t0);
        queue.dead_letter(&job, "retries exhausted", t0).await;
        assert_eq!(queue.dlq_len().await, 1);
        assert_eq!(queue.total_depth().await, 0);
    }
}
