//! Self-healing engine (spec §4.E): a per-task_id retry/recovery state
//! machine with exponential backoff + jitter, a hard attempt cap, and
//! operator escalation.
//!
//! The backoff formula is grounded on
//! `empath_delivery::policy::retry::RetryPolicy`, adapted: `max_attempts`
//! default changed 25→3 and jitter changed from a fixed nudge on the
//! final timestamp to a uniform `[0.8, 1.2]` multiplicative factor on the
//! delay itself. The per-task_id state machine and event taxonomy have no
//! direct teacher file; they are scaled down from the general
//! orchestrator/subscriber shape used across the pack's self-healing
//! sketches.

pub mod action;
pub mod config;

use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::SystemTime,
};

use dashmap::DashMap;
use parking_lot::Mutex;
use sendkit_common::Randomness;
use serde::{Deserialize, Serialize};

pub use action::{classify, Action};
pub use config::SelfHealingConfig;

/// Terminal outcome of one attempt, as recorded on a `HealingAttempt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttemptOutcome {
    Succeeded,
    Failed,
    Escalated,
}

/// One recorded attempt (spec §3 `HealingAttempt`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealingAttempt {
    pub attempt_id: u64,
    pub task_id: String,
    pub attempt_number: u32,
    pub started_at: SystemTime,
    pub action: Action,
    pub outcome: AttemptOutcome,
    pub delay_ms_before: u64,
}

/// Event taxonomy (spec §4.E).
#[derive(Debug, Clone)]
pub enum HealingEvent {
    Started { task_id: String },
    Retrying { task_id: String, attempt: u32 },
    Failed { task_id: String, attempt: u32 },
    Succeeded { task_id: String },
    Escalated { task_id: String, history: Vec<HealingAttempt> },
}

/// What the caller should do next after reporting a failure.
#[derive(Debug, Clone)]
pub enum HealingDecision {
    /// Re-enqueue after `delay_ms`, this is attempt number `attempt_number`.
    RetryAfter { delay_ms: u64, attempt_number: u32 },
    /// Attempt budget exhausted; `on_escalate` has already been called.
    Escalated { history: Vec<HealingAttempt> },
}

type EventSubscriber = Arc<dyn Fn(&HealingEvent) + Send + Sync>;
type EscalateCallback = Arc<dyn Fn(&str, &[HealingAttempt]) + Send + Sync>;

#[derive(Default)]
struct TaskState {
    attempt_number: u32,
    history: Vec<HealingAttempt>,
}

/// The self-healing engine. One instance is shared by every worker.
pub struct SelfHealingEngine {
    config: SelfHealingConfig,
    randomness: Arc<dyn Randomness>,
    states: DashMap<String, TaskState>,
    subscribers: Mutex<Vec<EventSubscriber>>,
    on_escalate: Mutex<Option<EscalateCallback>>,
    attempt_seq: AtomicU64,
}

impl SelfHealingEngine {
    #[must_use]
    pub fn new(config: SelfHealingConfig, randomness: Arc<dyn Randomness>) -> Self {
        Self {
            config,
            randomness,
            states: DashMap::new(),
            subscribers: Mutex::new(Vec::new()),
            on_escalate: Mutex::new(None),
            attempt_seq: AtomicU64::new(0),
        }
    }

    /// Register `on_escalate`; replaces any previously registered hook.
    pub fn on_escalate(&self, callback: impl Fn(&str, &[HealingAttempt]) + Send + Sync + 'static) {
        *self.on_escalate.lock() = Some(Arc::new(callback));
    }

    /// Register an event subscriber. Subscribers run in registration
    /// order; a panicking subscriber is caught and logged, the rest still
    /// fire.
    pub fn on_event(&self, subscriber: impl Fn(&HealingEvent) + Send + Sync + 'static) {
        self.subscribers.lock().push(Arc::new(subscriber));
    }

    fn emit(&self, event: &HealingEvent) {
        let subscribers = self.subscribers.lock();
        for subscriber in subscribers.iter() {
            let result = catch_unwind(AssertUnwindSafe(|| subscriber(event)));
            if result.is_err() {
                tracing::error!("self-healing event subscriber panicked; isolating and continuing");
            }
        }
    }

    /// `delay(attempt) = min(base * multiplier^(attempt-1), max) * jitter`,
    /// `jitter` uniform in `[0.8, 1.2]`, rounded to integer ms.
    fn compute_delay(&self, attempt_number: u32) -> u64 {
        let expected = (self.config.base_delay_ms as f64
            * self
                .config
                .backoff_multiplier
                .powi(i32::try_from(attempt_number).unwrap_or(i32::MAX) - 1))
        .min(self.config.max_delay_ms as f64);

        let jitter = 0.8 + self.randomness.next_f64() * 0.4;
        (expected * jitter).round() as u64
    }

    /// `on_failure(task_id, error_message)`: the `monitor(task_id, error)`
    /// trigger of the state machine. Transitions `idle`/`attempting(n)` to
    /// `attempting(n+1)` or `escalated`.
    pub fn on_failure(&self, task_id: &str, error_message: &str, now: SystemTime) -> HealingDecision {
        let action = classify(error_message);
        let mut entry = self.states.entry(task_id.to_string()).or_default();

        if entry.attempt_number == 0 {
            self.emit(&HealingEvent::Started {
                task_id: task_id.to_string(),
            });
        }

        entry.attempt_number += 1;
        let attempt_number = entry.attempt_number;
        let attempt_id = self.attempt_seq.fetch_add(1, Ordering::Relaxed);
        let is_final = attempt_number >= self.config.max_attempts;
        let delay_ms = if is_final { 0 } else { self.compute_delay(attempt_number) };

        // Spec §8 scenario 3 orders `retrying(n)` ahead of `failed` for
        // every attempt, including the final one that escalates.
        self.emit(&HealingEvent::Retrying {
            task_id: task_id.to_string(),
            attempt: attempt_number,
        });

        entry.history.push(HealingAttempt {
            attempt_id,
            task_id: task_id.to_string(),
            attempt_number,
            started_at: now,
            action,
            outcome: if is_final { AttemptOutcome::Escalated } else { AttemptOutcome::Failed },
            delay_ms_before: delay_ms,
        });

        self.emit(&HealingEvent::Failed {
            task_id: task_id.to_string(),
            attempt: attempt_number,
        });

        if is_final {
            let history = entry.history.clone();
            drop(entry);

            // on_escalate must not throw; isolate a panic the same way
            // event subscribers are isolated.
            if let Some(callback) = self.on_escalate.lock().clone() {
                let result = catch_unwind(AssertUnwindSafe(|| callback(task_id, &history)));
                if result.is_err() {
                    tracing::error!(task_id, "on_escalate callback panicked");
                }
            }

            self.emit(&HealingEvent::Escalated {
                task_id: task_id.to_string(),
                history: history.clone(),
            });

            HealingDecision::Escalated { history }
        } else {
            HealingDecision::RetryAfter {
                delay_ms,
                attempt_number,
            }
        }
    }

    /// `attempting(n) -> succeeded`: clears per-task history.
    pub fn on_success(&self, task_id: &str) {
        self.states.remove(task_id);
        self.emit(&HealingEvent::Succeeded {
            task_id: task_id.to_string(),
        });
    }

    #[must_use]
    pub fn history_len(&self, task_id: &str) -> usize {
        self.states
            .get(task_id)
            .map_or(0, |entry| entry.history.len())
    }
}
