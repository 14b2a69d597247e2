//! The single options struct (spec §6), loadable from TOML via the
//! `toml` crate, exactly as `empath`'s `Cargo.toml` wiring already
//! depends on `toml` for its own RON/TOML-adjacent config loading.
//! Every field is defaulted, so an empty file is a valid configuration.

use sendkit_guard::GuardConfig;
use sendkit_healing::SelfHealingConfig;
use sendkit_limiter::{RateLimiterConfig, TierRowConfig};
use sendkit_monitor::MonitorConfig;
use sendkit_processor::ProcessorConfig;
use serde::{Deserialize, Serialize};

/// Recognized fields (spec §6 options table), plus the ambient additions
/// (`monitor_listen_address`, `guard`) this expansion carries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Options {
    #[serde(default = "default_workers")]
    pub workers: usize,

    #[serde(default = "default_provider_timeout_ms")]
    pub provider_timeout_ms: u64,

    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_hard_limit")]
    pub hard_limit: bool,

    #[serde(default = "default_consecutive_failure_threshold")]
    pub consecutive_failure_threshold: u32,

    #[serde(default)]
    pub rate_tiers: Option<Vec<TierRowConfig>>,

    #[serde(default = "default_monitor_listen_address")]
    pub monitor_listen_address: String,

    #[serde(default)]
    pub guard: GuardConfig,
}

const fn default_workers() -> usize {
    4
}
const fn default_provider_timeout_ms() -> u64 {
    30_000
}
const fn default_sample_interval_ms() -> u64 {
    10_000
}
const fn default_base_delay_ms() -> u64 {
    100
}
const fn default_max_delay_ms() -> u64 {
    86_400_000
}
const fn default_backoff_multiplier() -> f64 {
    2.0
}
const fn default_max_attempts() -> u32 {
    3
}
const fn default_hard_limit() -> bool {
    true
}
const fn default_consecutive_failure_threshold() -> u32 {
    10
}
fn default_monitor_listen_address() -> String {
    "127.0.0.1:9095".to_string()
}

impl Default for Options {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            provider_timeout_ms: default_provider_timeout_ms(),
            sample_interval_ms: default_sample_interval_ms(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            max_attempts: default_max_attempts(),
            hard_limit: default_hard_limit(),
            consecutive_failure_threshold: default_consecutive_failure_threshold(),
            rate_tiers: None,
            monitor_listen_address: default_monitor_listen_address(),
            guard: GuardConfig::default(),
        }
    }
}

impl Options {
    /// Parse from TOML text; every field missing falls back to its
    /// default, so `Options::from_toml("")` is valid.
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    #[must_use]
    pub fn healing_config(&self) -> SelfHealingConfig {
        SelfHealingConfig {
            base_delay_ms: self.base_delay_ms,
            max_delay_ms: self.max_delay_ms,
            max_attempts: self.max_attempts,
            backoff_multiplier: self.backoff_multiplier,
        }
    }

    #[must_use]
    pub fn limiter_config(&self) -> RateLimiterConfig {
        RateLimiterConfig {
            consecutive_failure_threshold: self.consecutive_failure_threshold,
            hard_limit: self.hard_limit,
            rate_tiers: self.rate_tiers.clone(),
        }
    }

    #[must_use]
    pub fn processor_config(&self) -> ProcessorConfig {
        ProcessorConfig {
            workers: self.workers,
            provider_timeout_ms: self.provider_timeout_ms,
            ..ProcessorConfig::default()
        }
    }

    #[must_use]
    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            sample_interval_ms: self.sample_interval_ms,
            consecutive_failure_threshold: self.consecutive_failure_threshold,
            ..MonitorConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_is_a_valid_config() {
        let options = Options::from_toml("").unwrap();
        assert_eq!(options.workers, 4);
        assert!(options.hard_limit);
    }

    #[test]
    fn overrides_apply_and_unspecified_fields_default() {
        let options = Options::from_toml("workers = 8\nhard_limit = false\n").unwrap();
        assert_eq!(options.workers, 8);
        assert!(!options.hard_limit);
        assert_eq!(options.max_attempts, 3);
    }
}
