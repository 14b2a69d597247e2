//! Randomness port (spec §9), replacing the source's `Math.random`.
//!
//! Backoff jitter and the simulated provider's latency draw both go
//! through this trait so tests can supply a deterministic sequence
//! instead of depending on actual entropy.

use std::sync::Arc;

use parking_lot::Mutex;
use rand::Rng;

/// Returns a float in `[0, 1)` on every call.
pub trait Randomness: Send + Sync {
    fn next_f64(&self) -> f64;
}

/// Production randomness backed by the thread-local RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRandomness;

impl Randomness for SystemRandomness {
    fn next_f64(&self) -> f64 {
        rand::thread_rng().gen_range(0.0..1.0)
    }
}

/// Test randomness that replays a fixed sequence, cycling once exhausted.
#[derive(Debug, Clone)]
pub struct FakeRandomness {
    sequence: Arc<Vec<f64>>,
    cursor: Arc<Mutex<usize>>,
}

impl FakeRandomness {
    /// # Panics
    /// Panics if `sequence` is empty; a fake source with nothing to
    /// replay is a test authoring bug, not a runtime condition.
    #[must_use]
    pub fn new(sequence: Vec<f64>) -> Self {
        assert!(!sequence.is_empty(), "FakeRandomness needs at least one value");
        Self {
            sequence: Arc::new(sequence),
            cursor: Arc::new(Mutex::new(0)),
        }
    }
}

impl Randomness for FakeRandomness {
    fn next_f64(&self) -> f64 {
        let mut cursor = self.cursor.lock();
        let value = self.sequence[*cursor % self.sequence.len()];
        *cursor += 1;
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replays_sequence_and_then_cycles() {
        let rnd = FakeRandomness::new(vec![0.1, 0.5, 0.9]);
        assert_eq!(rnd.next_f64(), 0.1);
        assert_eq!(rnd.next_f64(), 0.5);
        assert_eq!(rnd.next_f64(), 0.9);
        assert_eq!(rnd.next_f64(), 0.1);
    }

    #[test]
    fn system_randomness_stays_in_unit_interval() {
        let rnd = SystemRandomness;
        for _ in 0..100 {
            let v = rnd.next_f64();
            assert!((0.0..1.0).contains(&v));
        }
    }
}
