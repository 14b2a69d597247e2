//! Component health checks and aggregate status (spec §4.G step 5).
//!
//! Grounded on `empath_health::checker::HealthChecker`'s atomics-plus-
//! aggregate-status shape, adapted from a fixed four-component liveness
//! check to the three named components this spec samples.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Unknown,
    Healthy,
    Degraded,
    Critical,
}

/// One component's health, as read by the sampler.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub component: &'static str,
    pub status: Status,
    pub detail: Option<String>,
}

/// `critical` if any component is critical; else `degraded` if any is
/// degraded; else `healthy` if the list is non-empty; else `unknown`.
#[must_use]
pub fn aggregate(components: &[ComponentHealth]) -> Status {
    if components.is_empty() {
        return Status::Unknown;
    }
    components
        .iter()
        .map(|c| c.status)
        .max()
        .unwrap_or(Status::Unknown)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn component(status: Status) -> ComponentHealth {
        ComponentHealth {
            component: "test",
            status,
            detail: None,
        }
    }

    #[test]
    fn empty_list_is_unknown() {
        assert_eq!(aggregate(&[]), Status::Unknown);
    }

    #[test]
    fn any_critical_dominates() {
        let components = vec![component(Status::Healthy), component(Status::Critical), component(Status::Degraded)];
        assert_eq!(aggregate(&components), Status::Critical);
    }

    #[test]
    fn degraded_beats_healthy_when_no_critical() {
        let components = vec![component(Status::Healthy), component(Status::Degraded)];
        assert_eq!(aggregate(&components), Status::Degraded);
    }

    #[test]
    fn all_healthy_is_healthy() {
        let components = vec![component(Status::Healthy), component(Status::Healthy)];
        assert_eq!(aggregate(&components), Status::Healthy);
    }
}
