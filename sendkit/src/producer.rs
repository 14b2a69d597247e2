//! Producer API (spec §6): the only in-process surface callers use to
//! submit jobs and inspect/control queue state.

use std::sync::Arc;

use sendkit_common::{JobId, NewEmailJob, QueueName};
use sendkit_queue::PriorityQueue;

use crate::container::ServiceContainer;
use crate::persistence::Persistence;

/// `Enqueue(EmailJob) -> {id, queue_name}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnqueueAck {
    pub id: JobId,
    pub queue_name: QueueName,
}

/// `Stats(queue_name) -> {waiting, delayed, paused, dlq}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProducerStats {
    pub waiting: usize,
    pub delayed: usize,
    pub paused: bool,
    pub dlq: usize,
}

/// Thin facade over the [`PriorityQueue`] that matches the Producer API's
/// shape exactly, so a caller embedding `sendkit` never reaches into the
/// queue crate directly.
pub struct Producer {
    queue: Arc<PriorityQueue>,
    persistence: Arc<dyn Persistence>,
}

impl Producer {
    #[must_use]
    pub fn new(container: &ServiceContainer) -> Self {
        Self {
            queue: container.queue.clone(),
            persistence: container.persistence.clone(),
        }
    }

    /// Validates and enqueues a job. Validation errors surface
    /// synchronously; nothing about send-time failure is visible here
    /// (spec §7 Propagation). The job is durably appended to the `jobs`
    /// log before it lands on the queue, so a restart's `recover()` can
    /// replay it (spec §6).
    pub async fn enqueue(&self, params: NewEmailJob, now: std::time::SystemTime) -> Result<EnqueueAck, sendkit_common::SendkitError> {
        let job = sendkit_common::EmailJob::new(params)?;
        let id = job.job_id;
        let queue_name = job.queue_name();
        let _ = now;
        self.persistence.append_job(&job).await;
        self.queue.enqueue(job).await;
        Ok(EnqueueAck { id, queue_name })
    }

    pub async fn stats(&self, queue_name: QueueName, now: std::time::SystemTime) -> ProducerStats {
        let stats = self.queue.stats(queue_name, now).await;
        ProducerStats {
            waiting: stats.waiting,
            delayed: stats.delayed,
            paused: stats.paused,
            dlq: self.queue.dlq_len().await,
        }
    }

    pub async fn pause(&self, queue_name: QueueName) {
        self.queue.pause(queue_name).await;
    }

    pub async fn resume(&self, queue_name: QueueName) {
        self.queue.resume(queue_name).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sendkit_common::Priority;
    use std::time::SystemTime;

    fn params(priority: Priority) -> NewEmailJob {
        NewEmailJob {
            to: "a@example.com".into(),
            from: "b@example.com".into(),
            subject: "hi".into(),
            body_text: Some("hello".into()),
            body_html: None,
            account_id: "acct-1".into(),
            account_age_days: 10,
            priority,
            scheduled_at: SystemTime::now(),
            headers: None,
            campaign_id: None,
        }
    }

    #[tokio::test]
    async fn enqueue_routes_to_the_priority_queue_and_reports_waiting() {
        let container = ServiceContainer::default();
        let producer = Producer::new(&container);
        let now = SystemTime::now();

        let ack = producer.enqueue(params(Priority::High), now).await.unwrap();
        assert_eq!(ack.queue_name, QueueName::HighPriority);

        let stats = producer.stats(QueueName::HighPriority, now).await;
        assert_eq!(stats.waiting, 1);
        assert_eq!(stats.dlq, 0);
    }

    #[tokio::test]
    async fn pause_then_resume_round_trips() {
        let container = ServiceContainer::default();
        let producer = Producer::new(&container);
        let now = SystemTime::now();

        producer.enqueue(params(Priority::Normal), now).await.unwrap();
        producer.pause(QueueName::Normal).await;
        let stats = producer.stats(QueueName::Normal, now).await;
        assert!(stats.paused);

        producer.resume(QueueName::Normal).await;
        let stats = producer.stats(QueueName::Normal, now).await;
        assert!(!stats.paused);
    }

    #[tokio::test]
    async fn invalid_job_is_rejected_synchronously() {
        let container = ServiceContainer::default();
        let producer = Producer::new(&container);
        let mut bad = params(Priority::Normal);
        bad.subject = String::new();
        let result = producer.enqueue(bad, SystemTime::now()).await;
        assert!(result.is_err());
    }
}
