//! Clock and Sleeper ports (spec §4.B, §9).
//!
//! No component reads `SystemTime::now()`/`tokio::time::sleep` directly;
//! everything goes through these traits so tests can fake elapsed time
//! instead of racing real timers.

use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};

/// Injectable wall clock.
pub trait Clock: Send + Sync {
    fn now(&self) -> SystemTime;
}

/// Injectable sleep, standing in for the source's ad-hoc `setTimeout`
/// jitter (spec §9).
#[async_trait::async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Production clock backed by `SystemTime`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Production sleeper backed by `tokio::time::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait::async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Test clock advanced manually; `now()` never changes on its own.
#[derive(Debug, Clone)]
pub struct FakeClock {
    inner: Arc<parking_lot::Mutex<SystemTime>>,
}

impl FakeClock {
    #[must_use]
    pub fn new(start: SystemTime) -> Self {
        Self {
            inner: Arc::new(parking_lot::Mutex::new(start)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut t = self.inner.lock();
        *t += by;
    }
}

impl Clock for FakeClock {
    fn now(&self) -> SystemTime {
        *self.inner.lock()
    }
}

/// Test sleeper that returns immediately; pair with `FakeClock::advance`
/// to move time without actually waiting in test suites.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSleeper;

#[async_trait::async_trait]
impl Sleeper for NoopSleeper {
    async fn sleep(&self, _duration: Duration) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_clock_only_advances_when_told() {
        let start = SystemTime::UNIX_EPOCH;
        let clock = FakeClock::new(start);
        assert_eq!(clock.now(), start);
        clock.advance(Duration::from_secs(60));
        assert_eq!(clock.now(), start + Duration::from_secs(60));
    }

    #[tokio::test]
    async fn noop_sleeper_returns_immediately() {
        let sleeper = NoopSleeper;
        sleeper.sleep(Duration::from_secs(3600)).await;
    }
}
