//! Advisory action classification (spec §4.E). Recorded on the event but
//! never changes the backoff curve.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    RetryWithBackoff,
    RetryAfterRateLimit,
    RetryNetwork,
    WaitForResource,
    RetryDefault,
}

/// Classify an error message into one of the advisory actions.
#[must_use]
pub fn classify(error_message: &str) -> Action {
    let lower = error_message.to_lowercase();
    if lower.contains("rate") {
        Action::RetryAfterRateLimit
    } else if lower.contains("network") || lower.contains("connection") {
        Action::RetryNetwork
    } else if lower.contains("busy") || lower.contains("resource") {
        Action::WaitForResource
    } else if lower.contains("timeout") {
        Action::RetryWithBackoff
    } else {
        Action::RetryDefault
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_patterns() {
        assert_eq!(classify("rate limited by provider"), Action::RetryAfterRateLimit);
        assert_eq!(classify("network unreachable"), Action::RetryNetwork);
        assert_eq!(classify("connection reset"), Action::RetryNetwork);
        assert_eq!(classify("resource busy"), Action::WaitForResource);
        assert_eq!(classify("request timeout"), Action::RetryWithBackoff);
        assert_eq!(classify("totally unknown"), Action::RetryDefault);
    }
}
