//! Service container (SPEC_FULL §9): one `Arc` holding every subsystem,
//! cloned into each worker task the way the teacher's
//! `DeliveryProcessor` is shared across its own workers.

use std::sync::Arc;

use sendkit_common::{Clock, Randomness, Sleeper, SystemClock, SystemRandomness, TokioSleeper};
use sendkit_healing::SelfHealingEngine;
use sendkit_limiter::TieredRateLimiter;
use sendkit_monitor::Monitor;
use sendkit_processor::Processor;
use sendkit_provider::{Provider, SimulatedProvider};
use sendkit_queue::PriorityQueue;

use crate::config::Options;
use crate::persistence::{InMemoryPersistence, Persistence};

/// Everything a worker, the monitor loop, and the HTTP surface need, all
/// behind one `Arc` so `main.rs` only clones a pointer per task.
pub struct ServiceContainer {
    pub queue: Arc<PriorityQueue>,
    pub limiter: Arc<TieredRateLimiter>,
    pub healing: Arc<SelfHealingEngine>,
    pub processor: Arc<Processor>,
    pub monitor: Arc<Monitor>,
    pub provider: Arc<dyn Provider>,
    pub persistence: Arc<dyn Persistence>,
    pub options: Options,
}

impl ServiceContainer {
    /// Build the production container: real clock, real tokio sleeper,
    /// real randomness, a [`SimulatedProvider`] as the default outbound
    /// transport until a real one is plugged in.
    #[must_use]
    pub fn new(options: Options, provider: Arc<dyn Provider>) -> Self {
        Self::build(options, provider, Arc::new(SystemClock), Arc::new(TokioSleeper), Arc::new(SystemRandomness))
    }

    /// Test-only constructor: lets the caller supply fake time, a noop
    /// sleeper, and deterministic randomness. Nothing in `main.rs` calls
    /// this.
    #[must_use]
    pub fn for_test(
        options: Options,
        provider: Arc<dyn Provider>,
        clock: Arc<dyn Clock>,
        sleeper: Arc<dyn Sleeper>,
        randomness: Arc<dyn Randomness>,
    ) -> Self {
        Self::build(options, provider, clock, sleeper, randomness)
    }

    fn build(
        options: Options,
        provider: Arc<dyn Provider>,
        clock: Arc<dyn Clock>,
        sleeper: Arc<dyn Sleeper>,
        randomness: Arc<dyn Randomness>,
    ) -> Self {
        let queue = Arc::new(PriorityQueue::new());
        let limiter = Arc::new(TieredRateLimiter::new(options.limiter_config()));
        let healing = Arc::new(SelfHealingEngine::new(options.healing_config(), randomness));

        let processor = Arc::new(Processor::new(
            queue.clone(),
            limiter.clone(),
            healing.clone(),
            provider.clone(),
            clock.clone(),
            sleeper.clone(),
            options.processor_config(),
        ));

        let monitor = Arc::new(Monitor::new(
            options.monitor_config(),
            queue.clone(),
            limiter.clone(),
            processor.clone(),
            provider.clone(),
            clock,
            sleeper,
        ));

        Self {
            queue,
            limiter,
            healing,
            processor,
            monitor,
            provider,
            persistence: Arc::new(InMemoryPersistence::new()),
            options,
        }
    }
}

impl Default for ServiceContainer {
    fn default() -> Self {
        Self::new(Options::default(), Arc::new(SimulatedProvider::default()))
    }
}
