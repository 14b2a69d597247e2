//! Alert model and the idempotent-by-`(component, rule_id)` active-alert
//! table (spec §3 `Alert`, §4.G alert rules).

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// Alert severity. Ordered so `max` picks the worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// One active or resolved alert. Uniqueness key is `(component, rule_id)`
/// — a recurring condition updates the existing alert rather than
/// duplicating it.
#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    pub id: u64,
    pub rule_id: &'static str,
    pub severity: Severity,
    pub component: String,
    pub message: String,
    pub raised_at: SystemTime,
    pub resolved_at: Option<SystemTime>,
}

/// The five fixed alert rules (spec §4.G), each carrying a stable
/// `rule_id` used both as the dedup key and in the text export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    QueueDepth,
    ErrorRate,
    DomainUtilization,
    ConsecutiveFailures,
    ProviderHealth,
}

impl Rule {
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::QueueDepth => "queue_depth",
            Self::ErrorRate => "error_rate",
            Self::DomainUtilization => "domain_utilization",
            Self::ConsecutiveFailures => "consecutive_failures",
            Self::ProviderHealth => "provider_health",
        }
    }

    #[must_use]
    pub const fn severity(self) -> Severity {
        match self {
            Self::QueueDepth | Self::DomainUtilization => Severity::Warning,
            Self::ErrorRate | Self::ConsecutiveFailures | Self::ProviderHealth => Severity::Critical,
        }
    }
}

/// Holds every active alert, keyed by `(component, rule_id)`. A rule that
/// keeps firing leaves `raised_at` untouched; a rule that stops firing
/// resolves and removes its alert on the next evaluation.
#[derive(Default)]
pub struct AlertTable {
    active: std::collections::HashMap<(String, &'static str), Alert>,
    next_id: u64,
    resolved_log: Vec<Alert>,
}

impl AlertTable {
    /// Called once per `(component, rule)` per sample tick with whether
    /// the rule's condition currently holds.
    pub fn evaluate(&mut self, component: &str, rule: Rule, firing: bool, message: String, now: SystemTime) {
        let key = (component.to_string(), rule.id());
        match (self.active.get_mut(&key), firing) {
            (Some(existing), true) => {
                // Still firing: raised_at is untouched, only the message
                // is refreshed so operators see current detail.
                existing.message = message;
            }
            (None, true) => {
                self.next_id += 1;
                self.active.insert(
                    key,
                    Alert {
                        id: self.next_id,
                        rule_id: rule.id(),
                        severity: rule.severity(),
                        component: component.to_string(),
                        message,
                        raised_at: now,
                        resolved_at: None,
                    },
                );
            }
            (Some(_), false) => {
                if let Some(mut alert) = self.active.remove(&key) {
                    alert.resolved_at = Some(now);
                    self.resolved_log.push(alert);
                }
            }
            (None, false) => {}
        }
    }

    #[must_use]
    pub fn active_alerts(&self) -> Vec<Alert> {
        self.active.values().cloned().collect()
    }

    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::UNIX_EPOCH;

    #[test]
    fn repeated_firing_keeps_one_alert_with_unchanged_raised_at() {
        let mut table = AlertTable::default();
        table.evaluate("processor", Rule::ErrorRate, true, "0.3".into(), UNIX_EPOCH);
        let first_raised = table.active_alerts()[0].raised_at;

        let later = UNIX_EPOCH + std::time::Duration::from_secs(30);
        table.evaluate("processor", Rule::ErrorRate, true, "0.35".into(), later);

        assert_eq!(table.active_count(), 1);
        assert_eq!(table.active_alerts()[0].raised_at, first_raised);
    }

    #[test]
    fn clearing_condition_resolves_and_removes() {
        let mut table = AlertTable::default();
        table.evaluate("processor", Rule::ErrorRate, true, "0.3".into(), UNIX_EPOCH);
        table.evaluate("processor", Rule::ErrorRate, false, String::new(), UNIX_EPOCH);
        assert_eq!(table.active_count(), 0);
    }
}
