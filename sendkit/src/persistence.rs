//! Persisted state layout (spec §6): three append-only logs — `jobs`,
//! `attempts`, `alerts` — keyed by monotonic sequence numbers. Recovery
//! replays the logs and re-enqueues any job whose last attempt wasn't
//! terminal.
//!
//! Persistence is a port; only an in-memory reference implementation
//! ships here (Open Question decision, see DESIGN.md) — a durable,
//! file-backed log is out of scope.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use sendkit_common::{EmailJob, JobId};

/// Whether an attempt ended the job's story (no further retry will
/// happen) or left it in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptTerminal {
    Succeeded,
    DeadLettered,
    InFlight,
}

/// One row of the `attempts` log.
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    pub seq: u64,
    pub job_id: JobId,
    pub attempt_number: u32,
    pub terminal: AttemptTerminal,
}

/// One row of the `alerts` log.
#[derive(Debug, Clone)]
pub struct AlertRecord {
    pub seq: u64,
    pub component: String,
    pub rule_id: &'static str,
    pub message: String,
}

/// The append-only logs a production deployment would persist to disk.
/// Implementations must make `append_*` durable before returning, and
/// `recover` must reflect every previously-durable append.
#[async_trait::async_trait]
pub trait Persistence: Send + Sync {
    async fn append_job(&self, job: &EmailJob);
    async fn append_attempt(&self, record: AttemptRecord);
    async fn append_alert(&self, record: AlertRecord);

    /// Replays the `jobs` and `attempts` logs and returns every job whose
    /// most recent attempt is not terminal — the set a fresh process
    /// should re-enqueue on startup.
    async fn recover(&self) -> Vec<EmailJob>;
}

#[derive(Default)]
struct Logs {
    jobs: Vec<EmailJob>,
    attempts: Vec<AttemptRecord>,
    alerts: Vec<AlertRecord>,
}

/// Reference implementation: everything lives in memory and is lost on
/// restart. Exercises the exact recovery semantics the log format
/// promises, without a file format to version.
#[derive(Default)]
pub struct InMemoryPersistence {
    logs: Mutex<Logs>,
    next_seq: AtomicU64,
}

impl InMemoryPersistence {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn next_seq(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::Relaxed)
    }
}

#[async_trait::async_trait]
impl Persistence for InMemoryPersistence {
    async fn append_job(&self, job: &EmailJob) {
        self.logs.lock().jobs.push(job.clone());
    }

    async fn append_attempt(&self, mut record: AttemptRecord) {
        record.seq = self.next_seq();
        self.logs.lock().attempts.push(record);
    }

    async fn append_alert(&self, mut record: AlertRecord) {
        record.seq = self.next_seq();
        self.logs.lock().alerts.push(record);
    }

    async fn recover(&self) -> Vec<EmailJob> {
        let logs = self.logs.lock();

        let mut last_job_by_id: HashMap<JobId, &EmailJob> = HashMap::new();
        for job in &logs.jobs {
            last_job_by_id.insert(job.job_id, job);
        }

        let mut last_terminal_by_id: HashMap<JobId, AttemptTerminal> = HashMap::new();
        for attempt in &logs.attempts {
            last_terminal_by_id.insert(attempt.job_id, attempt.terminal);
        }

        last_job_by_id
            .into_iter()
            .filter(|(job_id, _)| !matches!(last_terminal_by_id.get(job_id), Some(AttemptTerminal::Succeeded | AttemptTerminal::DeadLettered)))
            .map(|(_, job)| job.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sendkit_common::{NewEmailJob, Priority};
    use std::time::SystemTime;

    fn job() -> EmailJob {
        EmailJob::new(NewEmailJob {
            to: "a@example.com".into(),
            from: "b@example.com".into(),
            subject: "hi".into(),
            body_text: Some("hello".into()),
            body_html: None,
            account_id: "acct-1".into(),
            account_age_days: 10,
            priority: Priority::Normal,
            scheduled_at: SystemTime::now(),
            headers: None,
            campaign_id: None,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn job_with_no_terminal_attempt_is_recovered() {
        let persistence = InMemoryPersistence::new();
        let job = job();
        persistence.append_job(&job).await;

        let recovered = persistence.recover().await;
        assert_eq!(recovered.len(), 1);
        assert_eq!(recovered[0].job_id, job.job_id);
    }

    #[tokio::test]
    async fn job_with_a_terminal_attempt_is_not_recovered() {
        let persistence = InMemoryPersistence::new();
        let job = job();
        persistence.append_job(&job).await;
        persistence
            .append_attempt(AttemptRecord {
                seq: 0,
                job_id: job.job_id,
                attempt_number: 1,
                terminal: AttemptTerminal::Succeeded,
            })
            .await;

        assert!(persistence.recover().await.is_empty());
    }

    #[tokio::test]
    async fn in_flight_attempt_leaves_the_job_recoverable() {
        let persistence = InMemoryPersistence::new();
        let job = job();
        persistence.append_job(&job).await;
        persistence
            .append_attempt(AttemptRecord {
                seq: 0,
                job_id: job.job_id,
                attempt_number: 1,
                terminal: AttemptTerminal::InFlight,
            })
            .await;

        assert_eq!(persistence.recover().await.len(), 1);
    }
}
