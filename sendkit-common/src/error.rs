//! Error taxonomy shared across the pipeline.
//!
//! Kinds correspond to the error kinds named in the error handling design:
//! `RATE_LIMITED`, `PROVIDER_*`, `QUEUE_PAUSED`, `JOB_VALIDATION`,
//! `CANCELLED`. Layered with `#[from]` the way `empath-delivery::error`
//! wraps `PermanentError`/`TemporaryError`/`SystemError`.

use thiserror::Error;

use crate::job::ErrorKind;

/// Errors raised synchronously from `Enqueue` when an `EmailJob` fails
/// construction invariants.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JobValidationError {
    #[error("address does not parse as local@domain: {address}")]
    InvalidAddress { address: String },

    #[error("subject must be non-empty")]
    EmptySubject,

    #[error("exactly one of body_text/body_html must be set")]
    BodyExclusivity,
}

/// Top-level error surface, unifying every subsystem's error enum behind
/// one type the way `empath_delivery::error::DeliveryError` wraps
/// `Permanent`/`Temporary`/`System`. Wraps [`ErrorKind`] rather than a
/// second provider-error taxonomy, since `ErrorKind` is already the enum
/// `SendOutcome`/`Provider`/`Processor` carry end to end.
#[derive(Debug, Error)]
pub enum SendkitError {
    #[error("job validation failed: {0}")]
    JobValidation(#[from] JobValidationError),

    #[error("rate limited: retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("provider error: {0:?}")]
    Provider(ErrorKind),

    #[error("queue is paused")]
    QueuePaused,

    #[error("operation cancelled")]
    Cancelled,
}

impl SendkitError {
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Provider(kind) => kind.is_retryable(),
            Self::RateLimited { .. } => true,
            Self::JobValidation(_) | Self::QueuePaused | Self::Cancelled => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_recipient_and_auth_are_not_retryable() {
        assert!(!SendkitError::Provider(ErrorKind::InvalidRecipient).is_retryable());
        assert!(!SendkitError::Provider(ErrorKind::Auth).is_retryable());
    }

    #[test]
    fn everything_else_is_retryable() {
        for kind in [
            ErrorKind::Timeout,
            ErrorKind::RateLimitedByProvider,
            ErrorKind::Network,
            ErrorKind::ResourceBusy,
            ErrorKind::Unknown,
        ] {
            assert!(SendkitError::Provider(kind).is_retryable());
        }
    }

    #[test]
    fn rate_limited_and_job_validation_convert_via_from() {
        let err: SendkitError = JobValidationError::EmptySubject.into();
        assert!(matches!(err, SendkitError::JobValidation(JobValidationError::EmptySubject)));
    }
}
