//! Pattern mining and prediction (spec §4.H).
//!
//! No teacher counterpart exists for self-governance over a task
//! backlog; the grouping-by-signature-then-score shape is grounded on
//! the frequency/confidence aggregation used across the pack's
//! self-healing and scheduler sketches (e.g. `self_healing.rs`'s
//! failure-pattern frequency tracking), adapted here to task blockers.

use std::collections::BTreeMap;

use sendkit_common::Priority;

use crate::config::GuardConfig;
use crate::model::{priority_label, BlockerPattern, Condition, CurrentTask, HistoricalTask, Operator, PredictedBlocker, Severity};

/// Grouping key: priority, sorted tag set, and whether the task had an
/// assignee at all. Coarse enough to recur, fine enough to be useful.
type GroupKey = (Priority, Vec<String>, bool);

fn group_key(task: &HistoricalTask) -> GroupKey {
    let mut tags = task.tags.clone();
    tags.sort();
    tags.dedup();
    (task.priority, tags, task.assignee.is_some())
}

fn group_conditions(key: &GroupKey) -> Vec<Condition> {
    let (priority, tags, has_assignee) = key;
    let mut conditions = vec![Condition {
        field: "priority".into(),
        operator: Operator::Equals,
        value: priority_label(*priority).to_string(),
    }];
    for tag in tags {
        conditions.push(Condition {
            field: "tag".into(),
            operator: Operator::Contains,
            value: tag.clone(),
        });
    }
    conditions.push(Condition {
        field: "assignee".into(),
        operator: Operator::Equals,
        value: if *has_assignee { "present" } else { "absent" }.into(),
    });
    conditions
}

fn group_name(key: &GroupKey) -> String {
    let (priority, tags, has_assignee) = key;
    let tag_part = if tags.is_empty() { "no tags".to_string() } else { tags.join(",") };
    let assignee_part = if *has_assignee { "assigned" } else { "unassigned" };
    format!("{} priority / {tag_part} / {assignee_part}", priority_label(*priority))
}

fn stable_id(key: &GroupKey) -> String {
    let (priority, tags, has_assignee) = key;
    format!("{}-{}-{}", priority_label(*priority), tags.join("+"), if *has_assignee { "assigned" } else { "unassigned" })
}

/// Groups `tasks` by priority/tags/assignee-presence and turns any
/// group with enough blocked occurrences into a [`BlockerPattern`].
#[must_use]
pub fn mine_patterns(tasks: &[HistoricalTask], config: &GuardConfig) -> Vec<BlockerPattern> {
    let mut groups: BTreeMap<GroupKey, Vec<&HistoricalTask>> = BTreeMap::new();
    for task in tasks {
        groups.entry(group_key(task)).or_default().push(task);
    }

    let mut patterns = Vec::new();
    for (key, members) in groups {
        if members.len() < config.min_group_size {
            continue;
        }

        let blocked_durations: Vec<u64> = members.iter().filter_map(|t| t.block_duration_ms()).collect();
        if blocked_durations.is_empty() {
            continue;
        }

        let frequency = blocked_durations.len() as f64 / members.len() as f64;
        let avg_resolution_time_ms = blocked_durations.iter().sum::<u64>() / blocked_durations.len() as u64;

        patterns.push(BlockerPattern {
            id: stable_id(&key),
            name: group_name(&key),
            severity: Severity::from_frequency(frequency),
            conditions: group_conditions(&key),
            frequency,
            avg_resolution_time_ms,
            occurrence_count: blocked_durations.len() as u32,
        });
    }

    patterns
}

fn recommended_action(pattern: &BlockerPattern) -> String {
    if pattern.conditions.iter().any(|c| c.field == "assignee" && c.value == "absent") {
        format!("Assign an owner before work starts on tasks matching \"{}\"", pattern.name)
    } else if pattern.severity >= Severity::High {
        format!("Review dependency readiness before starting tasks matching \"{}\"", pattern.name)
    } else {
        format!("Monitor tasks matching \"{}\" for early blocker signs", pattern.name)
    }
}

fn mitigation_tasks(pattern: &BlockerPattern) -> Vec<String> {
    let mut tasks = vec![format!("Review blocker history for pattern \"{}\"", pattern.name)];
    if pattern.conditions.iter().any(|c| c.field == "assignee" && c.value == "absent") {
        tasks.push("Assign an owner".to_string());
    }
    for condition in &pattern.conditions {
        if condition.field == "tag" {
            tasks.push(format!("Check open dependencies tagged \"{}\"", condition.value));
        }
    }
    tasks
}

/// Scores `current_tasks` against mined `patterns`, drops anything
/// below `min_confidence`, sorts by confidence descending, and
/// truncates to `max_predictions` (spec §4.H).
#[must_use]
pub fn predict(patterns: &[BlockerPattern], current_tasks: &[CurrentTask], config: &GuardConfig) -> Vec<PredictedBlocker> {
    let mut predictions = Vec::new();

    for task in current_tasks {
        for pattern in patterns {
            if pattern.conditions.is_empty() {
                continue;
            }

            let matched: Vec<&Condition> = pattern.conditions.iter().filter(|c| c.matches(task)).collect();
            if matched.is_empty() {
                continue;
            }

            let factor_match_ratio = matched.len() as f64 / pattern.conditions.len() as f64;
            let mut confidence = pattern.frequency * pattern.severity.weight() * factor_match_ratio;
            if task.priority == Priority::Critical {
                confidence += 0.1;
            }
            confidence = confidence.clamp(0.0, 1.0);

            if confidence < config.min_confidence {
                continue;
            }

            predictions.push(PredictedBlocker {
                task_id: task.task_id.clone(),
                pattern_id: pattern.id.clone(),
                confidence,
                predicted_block_time_ms: pattern.avg_resolution_time_ms,
                contributing_factors: matched.iter().map(|c| format!("{}:{}", c.field, c.value)).collect(),
                recommended_action: recommended_action(pattern),
                mitigation_tasks: mitigation_tasks(pattern),
            });
        }
    }

    predictions.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap_or(std::cmp::Ordering::Equal));
    predictions.truncate(config.max_predictions);
    predictions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str, priority: Priority, tags: &[&str], assignee: Option<&str>, blocked_ms: Option<(u64, u64)>) -> HistoricalTask {
        HistoricalTask {
            task_id: id.to_string(),
            status: "done".to_string(),
            priority,
            assignee: assignee.map(str::to_string),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            blocked_at: blocked_ms.map(|(s, _)| s),
            unblocked_at: blocked_ms.map(|(_, e)| e),
            estimated_hours: None,
            actual_hours: None,
            created_at: 0,
        }
    }

    #[test]
    fn group_with_no_blocked_tasks_yields_no_pattern() {
        let tasks = vec![
            task("1", Priority::Normal, &["infra"], Some("alice"), None),
            task("2", Priority::Normal, &["infra"], Some("alice"), None),
            task("3", Priority::Normal, &["infra"], Some("alice"), None),
        ];
        let patterns = mine_patterns(&tasks, &GuardConfig::default());
        assert!(patterns.is_empty());
    }

    #[test]
    fn recurring_unassigned_blocks_become_a_high_frequency_pattern() {
        let tasks = vec![
            task("1", Priority::High, &["billing"], None, Some((0, 3_600_000))),
            task("2", Priority::High, &["billing"], None, Some((0, 7_200_000))),
            task("3", Priority::High, &["billing"], None, Some((0, 1_800_000))),
            task("4", Priority::High, &["billing"], None, None),
        ];
        let patterns = mine_patterns(&tasks, &GuardConfig::default());
        assert_eq!(patterns.len(), 1);
        let pattern = &patterns[0];
        assert_eq!(pattern.occurrence_count, 3);
        assert!((pattern.frequency - 0.75).abs() < 1e-9);
        assert_eq!(pattern.avg_resolution_time_ms, (3_600_000 + 7_200_000 + 1_800_000) / 3);
        assert!(pattern.conditions.iter().any(|c| c.field == "assignee" && c.value == "absent"));
    }

    #[test]
    fn groups_smaller_than_min_size_are_ignored() {
        let tasks = vec![
            task("1", Priority::Low, &["docs"], Some("bob"), Some((0, 1000))),
            task("2", Priority::Low, &["docs"], Some("bob"), Some((0, 1000))),
        ];
        let patterns = mine_patterns(&tasks, &GuardConfig::default());
        assert!(patterns.is_empty());
    }

    #[test]
    fn prediction_scores_critical_priority_with_a_boost_and_sorts_descending() {
        let pattern = BlockerPattern {
            id: "p1".into(),
            name: "test pattern".into(),
            severity: Severity::High,
            conditions: vec![
                Condition { field: "priority".into(), operator: Operator::Equals, value: "critical".into() },
                Condition { field: "assignee".into(), operator: Operator::Equals, value: "absent".into() },
            ],
            frequency: 0.8,
            avg_resolution_time_ms: 5000,
            occurrence_count: 4,
        };
        let current = vec![
            CurrentTask { task_id: "t-crit".into(), priority: Priority::Critical, assignee: None, tags: vec![] },
            CurrentTask { task_id: "t-normal".into(), priority: Priority::Normal, assignee: None, tags: vec![] },
        ];
        let config = GuardConfig { min_confidence: 0.0, ..GuardConfig::default() };
        let predictions = predict(std::slice::from_ref(&pattern), &current, &config);

        assert_eq!(predictions.len(), 2);
        assert_eq!(predictions[0].task_id, "t-crit");
        assert!(predictions[0].confidence >= predictions[1].confidence);
        let expected_normal = (0.8_f64 * 0.75 * 1.0).clamp(0.0, 1.0);
        assert!((predictions[1].confidence - expected_normal).abs() < 1e-9);
    }

    #[test]
    fn low_confidence_predictions_are_dropped_and_truncation_is_honored() {
        let pattern = BlockerPattern {
            id: "p1".into(),
            name: "weak".into(),
            severity: Severity::Low,
            conditions: vec![Condition { field: "priority".into(), operator: Operator::Equals, value: "normal".into() }],
            frequency: 0.1,
            avg_resolution_time_ms: 1000,
            occurrence_count: 1,
        };
        let current: Vec<CurrentTask> = (0..5)
            .map(|i| CurrentTask { task_id: format!("t{i}"), priority: Priority::Normal, assignee: None, tags: vec![] })
            .collect();
        let config = GuardConfig { min_confidence: 0.5, max_predictions: 2, ..GuardConfig::default() };
        let predictions = predict(std::slice::from_ref(&pattern), &current, &config);
        assert!(predictions.is_empty());

        let config = GuardConfig { min_confidence: 0.0, max_predictions: 2, ..GuardConfig::default() };
        let predictions = predict(std::slice::from_ref(&pattern), &current, &config);
        assert_eq!(predictions.len(), 2);
    }
}
