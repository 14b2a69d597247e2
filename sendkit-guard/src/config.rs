use serde::{Deserialize, Serialize};

/// Tuning knobs for pattern mining and prediction (spec §4.H).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardConfig {
    /// A group needs at least this many historical tasks before it is
    /// allowed to become a pattern; smaller groups are noise.
    #[serde(default = "default_min_group_size")]
    pub min_group_size: usize,

    /// Predictions scoring below this confidence are dropped.
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,

    /// Predictions are sorted by confidence descending and truncated
    /// here.
    #[serde(default = "default_max_predictions")]
    pub max_predictions: usize,
}

const fn default_min_group_size() -> usize {
    3
}
const fn default_min_confidence() -> f64 {
    0.3
}
const fn default_max_predictions() -> usize {
    10
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            min_group_size: default_min_group_size(),
            min_confidence: default_min_confidence(),
            max_predictions: default_max_predictions(),
        }
    }
}
