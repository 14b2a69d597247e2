//! The core data model: `EmailJob`, `SendOutcome`, and the priority →
//! queue mapping.

use std::{
    fmt::{self, Display},
    time::SystemTime,
};

use serde::{Deserialize, Serialize};

use crate::{address::Address, error::JobValidationError};

/// Unique, orderable job identifier.
///
/// Grounded on `empath_spool::SpooledMessageId`'s ULID wrapper: sortable by
/// creation time, compact, and collision-resistant without a central
/// sequence allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JobId(ulid::Ulid);

impl JobId {
    #[must_use]
    pub fn generate() -> Self {
        Self(ulid::Ulid::new())
    }
}

impl Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for JobId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for JobId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse::<ulid::Ulid>()
            .map(Self)
            .map_err(serde::de::Error::custom)
    }
}

/// Job priority. `critical`/`high` route to `HIGH_PRIORITY`, `normal` to
/// `NORMAL`, `low` to `BULK` (spec invariant iv).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    Normal,
    Low,
}

/// The three named priority queues, plus the dead-letter queue as a
/// non-dequeueable fourth bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueueName {
    HighPriority,
    Normal,
    Bulk,
}

impl QueueName {
    /// Strict dequeue order: HIGH, then NORMAL, then BULK.
    pub const ORDER: [Self; 3] = [Self::HighPriority, Self::Normal, Self::Bulk];
}

impl From<Priority> for QueueName {
    fn from(priority: Priority) -> Self {
        match priority {
            Priority::Critical | Priority::High => Self::HighPriority,
            Priority::Normal => Self::Normal,
            Priority::Low => Self::Bulk,
        }
    }
}

impl Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::HighPriority => "HIGH_PRIORITY",
            Self::Normal => "NORMAL",
            Self::Bulk => "BULK",
        };
        write!(f, "{s}")
    }
}

/// An immutable(-ish) job descriptor. The only fields mutated after
/// construction are `attempts_made` and `scheduled_at`, both only by
/// appending a retry (spec §3 Lifecycle).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailJob {
    pub job_id: JobId,
    pub to: Address,
    pub from: Address,
    pub subject: String,
    pub body_text: Option<String>,
    pub body_html: Option<String>,
    pub account_id: String,
    pub account_age_days: i64,
    pub priority: Priority,
    pub scheduled_at: SystemTime,
    pub headers: Option<Vec<(String, String)>>,
    pub campaign_id: Option<String>,
    pub attempts_made: u32,
}

/// Construction parameters for a new job, mirroring the fields a producer
/// supplies (everything but `job_id` and `attempts_made`, which the
/// pipeline owns).
pub struct NewEmailJob {
    pub to: String,
    pub from: String,
    pub subject: String,
    pub body_text: Option<String>,
    pub body_html: Option<String>,
    pub account_id: String,
    pub account_age_days: i64,
    pub priority: Priority,
    pub scheduled_at: SystemTime,
    pub headers: Option<Vec<(String, String)>>,
    pub campaign_id: Option<String>,
}

impl EmailJob {
    /// Validate and construct a new job. Surfaces `JOB_VALIDATION`
    /// synchronously, per spec §7.
    pub fn new(params: NewEmailJob) -> Result<Self, JobValidationError> {
        let to = Address::parse(&params.to)?;
        let from = Address::parse(&params.from)?;

        if params.subject.is_empty() {
            return Err(JobValidationError::EmptySubject);
        }

        let has_text = params.body_text.as_deref().is_some_and(|s| !s.is_empty());
        let has_html = params.body_html.as_deref().is_some_and(|s| !s.is_empty());
        if has_text == has_html {
            return Err(JobValidationError::BodyExclusivity);
        }

        Ok(Self {
            job_id: JobId::generate(),
            to,
            from,
            subject: params.subject,
            body_text: params.body_text,
            body_html: params.body_html,
            account_id: params.account_id,
            account_age_days: params.account_age_days,
            priority: params.priority,
            scheduled_at: params.scheduled_at,
            headers: params.headers,
            campaign_id: params.campaign_id,
            attempts_made: 0,
        })
    }

    #[must_use]
    pub fn queue_name(&self) -> QueueName {
        self.priority.into()
    }

    /// Rewrite `scheduled_at` and bump `attempts_made` ahead of a retry.
    pub fn prepare_retry(&mut self, scheduled_at: SystemTime) {
        self.attempts_made += 1;
        self.scheduled_at = scheduled_at;
    }
}

/// The fixed provider error taxonomy surfaced per send attempt (spec §4.A).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Timeout,
    RateLimitedByProvider,
    Network,
    ResourceBusy,
    InvalidRecipient,
    Auth,
    Unknown,
}

impl ErrorKind {
    /// All kinds but `InvalidRecipient` and `Auth` are retryable.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        !matches!(self, Self::InvalidRecipient | Self::Auth)
    }
}

/// Produced per send attempt by a `Provider`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendOutcome {
    pub success: bool,
    pub provider_message_id: Option<String>,
    pub latency_ms: u64,
    pub error_kind: Option<ErrorKind>,
    pub error_message: Option<String>,
    pub retryable: bool,
}

impl SendOutcome {
    #[must_use]
    pub fn success(provider_message_id: String, latency_ms: u64) -> Self {
        Self {
            success: true,
            provider_message_id: Some(provider_message_id),
            latency_ms,
            error_kind: None,
            error_message: None,
            retryable: false,
        }
    }

    #[must_use]
    pub fn failure(error_kind: ErrorKind, error_message: String, latency_ms: u64) -> Self {
        let retryable = error_kind.is_retryable();
        Self {
            success: false,
            provider_message_id: None,
            latency_ms,
            error_kind: Some(error_kind),
            error_message: Some(error_message),
            retryable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_params() -> NewEmailJob {
        NewEmailJob {
            to: "a@example.com".into(),
            from: "b@example.com".into(),
            subject: "hi".into(),
            body_text: Some("hello".into()),
            body_html: None,
            account_id: "acct-new".into(),
            account_age_days: 1,
            priority: Priority::Normal,
            scheduled_at: SystemTime::now(),
            headers: None,
            campaign_id: None,
        }
    }

    #[test]
    fn valid_job_constructs() {
        let job = EmailJob::new(valid_params()).unwrap();
        assert_eq!(job.attempts_made, 0);
        assert_eq!(job.queue_name(), QueueName::Normal);
    }

    #[test]
    fn rejects_both_bodies_set() {
        let mut params = valid_params();
        params.body_html = Some("<p>hi</p>".into());
        assert!(matches!(
            EmailJob::new(params),
            Err(JobValidationError::BodyExclusivity)
        ));
    }

    #[test]
    fn rejects_neither_body_set() {
        let mut params = valid_params();
        params.body_text = None;
        assert!(matches!(
            EmailJob::new(params),
            Err(JobValidationError::BodyExclusivity)
        ));
    }

    #[test]
    fn rejects_empty_subject() {
        let mut params = valid_params();
        params.subject = String::new();
        assert!(matches!(
            EmailJob::new(params),
            Err(JobValidationError::EmptySubject)
        ));
    }

    #[test]
    fn priority_maps_to_expected_queue() {
        assert_eq!(QueueName::from(Priority::Critical), QueueName::HighPriority);
        assert_eq!(QueueName::from(Priority::High), QueueName::HighPriority);
        assert_eq!(QueueName::from(Priority::Normal), QueueName::Normal);
        assert_eq!(QueueName::from(Priority::Low), QueueName::Bulk);
    }

    #[test]
    fn retry_bumps_attempts_and_rewrites_schedule() {
        let mut job = EmailJob::new(valid_params()).unwrap();
        let later = SystemTime::now() + std::time::Duration::from_secs(60);
        job.prepare_retry(later);
        assert_eq!(job.attempts_made, 1);
        assert_eq!(job.scheduled_at, later);
    }
}
