//! Jittered sleep between sync cycles.

use std::time::Duration;

use rand::Rng;

/// Exponentially distributed sleeps with a hard ceiling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SleepPolicy {
    mean_secs: f64,
    cap_secs: f64,
}

impl SleepPolicy {
    pub fn new(mean_secs: f64, cap_secs: f64) -> Self {
        Self {
            mean_secs,
            cap_secs,
        }
    }

    pub fn mean(&self) -> Duration {
        Duration::from_secs_f64(self.mean_secs)
    }

    /// One draw of `min(Exp(1/mean), cap)` from `rng`.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let u: f64 = rng.gen();
        let secs = -self.mean_secs * (1.0 - u).ln();
        Duration::from_secs_f64(secs.clamp(0.0, self.cap_secs))
    }

    pub fn next_sleep(&self) -> Duration {
        self.sample(&mut rand::thread_rng())
    }
}
