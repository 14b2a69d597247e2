//! Data types for the Predictive Guard (spec §4.H): historical task
//! traces in, mined [`BlockerPattern`]s and ranked [`PredictedBlocker`]s
//! out.

use sendkit_common::Priority;
use serde::{Deserialize, Serialize};

/// A completed or in-flight task, as seen in a historical trace.
/// `blocked_at`/`unblocked_at` are epoch milliseconds; a task that was
/// never blocked leaves both `None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoricalTask {
    pub task_id: String,
    pub status: String,
    pub priority: Priority,
    pub assignee: Option<String>,
    pub tags: Vec<String>,
    pub blocked_at: Option<u64>,
    pub unblocked_at: Option<u64>,
    pub estimated_hours: Option<f64>,
    pub actual_hours: Option<f64>,
    pub created_at: u64,
}

impl HistoricalTask {
    /// Wall-clock gap the task spent blocked, if it has both endpoints.
    #[must_use]
    pub fn block_duration_ms(&self) -> Option<u64> {
        match (self.blocked_at, self.unblocked_at) {
            (Some(start), Some(end)) if end >= start => Some(end - start),
            _ => None,
        }
    }
}

/// A task not yet resolved, to be checked against mined patterns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentTask {
    pub task_id: String,
    pub priority: Priority,
    pub assignee: Option<String>,
    pub tags: Vec<String>,
}

/// Comparison applied by a [`Condition`] against a task's field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Equals,
    Contains,
}

/// One factor contributing to a [`BlockerPattern`]'s signature, e.g.
/// `{field: "priority", operator: Equals, value: "critical"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub operator: Operator,
    pub value: String,
}

impl Condition {
    #[must_use]
    pub fn matches(&self, task: &CurrentTask) -> bool {
        match self.field.as_str() {
            "priority" => priority_label(task.priority) == self.value,
            "tag" => match self.operator {
                Operator::Contains | Operator::Equals => task.tags.iter().any(|t| t == &self.value),
            },
            "assignee" => {
                let present = if task.assignee.is_some() { "present" } else { "absent" };
                present == self.value
            }
            _ => false,
        }
    }
}

/// Severity of a mined pattern, derived from how often it recurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Weight applied in the confidence formula (spec §4.H).
    #[must_use]
    pub fn weight(self) -> f64 {
        match self {
            Self::Low => 0.25,
            Self::Medium => 0.5,
            Self::High => 0.75,
            Self::Critical => 1.0,
        }
    }

    #[must_use]
    pub fn from_frequency(frequency: f64) -> Self {
        if frequency > 0.75 {
            Self::Critical
        } else if frequency > 0.5 {
            Self::High
        } else if frequency > 0.25 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// A recurring blocker signature mined from historical tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockerPattern {
    pub id: String,
    pub name: String,
    pub severity: Severity,
    pub conditions: Vec<Condition>,
    /// Share of the matching group's tasks that actually got blocked,
    /// in `[0, 1]`.
    pub frequency: f64,
    pub avg_resolution_time_ms: u64,
    pub occurrence_count: u32,
}

/// A forward prediction that a current task will hit a mined pattern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictedBlocker {
    pub task_id: String,
    pub pattern_id: String,
    pub confidence: f64,
    pub predicted_block_time_ms: u64,
    pub contributing_factors: Vec<String>,
    pub recommended_action: String,
    pub mitigation_tasks: Vec<String>,
}

pub(crate) fn priority_label(priority: Priority) -> &'static str {
    match priority {
        Priority::Critical => "critical",
        Priority::High => "high",
        Priority::Normal => "normal",
        Priority::Low => "low",
    }
}
