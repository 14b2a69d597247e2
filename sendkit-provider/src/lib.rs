//! Provider Port (spec §4.A): the abstract "send one email" operation plus
//! a cheap health probe, and a simulated provider usable in tests and demo
//! deployments without a real outbound transport.

use std::time::{Duration, Instant};

use sendkit_common::{EmailJob, ErrorKind, SendOutcome};

/// A health probe result, polled by the Monitor on its sampling tick —
/// never on the send hot path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthProbe {
    pub healthy: bool,
    pub latency_ms: u64,
}

/// Abstract outbound transport. Implementations must be idempotent under
/// `job.job_id`: two calls with the same id may not produce two real
/// deliveries.
#[async_trait::async_trait]
pub trait Provider: Send + Sync {
    async fn send(&self, job: &EmailJob) -> SendOutcome;

    async fn health(&self) -> HealthProbe;
}

/// Deterministic failure rule: a provider configured with this pattern
/// fails every send whose `to` local part contains `pattern`.
#[derive(Debug, Clone)]
pub struct FailurePattern {
    pub local_part_contains: String,
    pub error_kind: ErrorKind,
}

/// A latency distribution the simulated provider draws success/failure
/// latency from. `min_ms`/`max_ms` bound a uniform draw.
#[derive(Debug, Clone, Copy)]
pub struct LatencyDistribution {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl Default for LatencyDistribution {
    fn default() -> Self {
        Self {
            min_ms: 5,
            max_ms: 50,
        }
    }
}

impl LatencyDistribution {
    fn sample(self) -> u64 {
        if self.max_ms <= self.min_ms {
            return self.min_ms;
        }
        rand::Rng::gen_range(&mut rand::thread_rng(), self.min_ms..self.max_ms)
    }
}

/// A provider whose sends never leave the process: it fails deterministically
/// for configured `to` local-part patterns and otherwise succeeds with a
/// latency drawn from `latency`. Part of the testable surface (spec §6).
pub struct SimulatedProvider {
    failure_patterns: Vec<FailurePattern>,
    latency: LatencyDistribution,
    healthy: parking_lot::RwLock<bool>,
}

impl SimulatedProvider {
    #[must_use]
    pub fn new(failure_patterns: Vec<FailurePattern>, latency: LatencyDistribution) -> Self {
        Self {
            failure_patterns,
            latency,
            healthy: parking_lot::RwLock::new(true),
        }
    }

    /// Force the next `health()` calls to report unhealthy, for driving
    /// the Monitor's `provider_health.healthy == false` alert rule in
    /// tests.
    pub fn set_healthy(&self, healthy: bool) {
        *self.healthy.write() = healthy;
    }

    fn matching_failure(&self, job: &EmailJob) -> Option<&FailurePattern> {
        let local_part = job.to.as_str().split('@').next().unwrap_or_default();
        self.failure_patterns
            .iter()
            .find(|p| local_part.contains(&p.local_part_contains))
    }
}

impl Default for SimulatedProvider {
    fn default() -> Self {
        Self::new(Vec::new(), LatencyDistribution::default())
    }
}

#[async_trait::async_trait]
impl Provider for SimulatedProvider {
    async fn send(&self, job: &EmailJob) -> SendOutcome {
        let start = Instant::now();
        let latency_ms = self.latency.sample();
        // Cap the real sleep so the test suite stays fast; the *reported*
        // latency still reflects the sampled distribution.
        tokio::time::sleep(Duration::from_millis(latency_ms.min(5))).await;
        let _ = start.elapsed();

        if let Some(pattern) = self.matching_failure(job) {
            tracing::debug!(job_id = %job.job_id, kind = ?pattern.error_kind, "simulated provider failure");
            return SendOutcome::failure(
                pattern.error_kind,
                format!("simulated failure matching '{}'", pattern.local_part_contains),
                latency_ms,
            );
        }

        SendOutcome::success(format!("sim-{}", job.job_id), latency_ms)
    }

    async fn health(&self) -> HealthProbe {
        HealthProbe {
            healthy: *self.healthy.read(),
            latency_ms: 1,
        }
    }
}
