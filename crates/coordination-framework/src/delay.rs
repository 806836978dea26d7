//! # Delay Sources
//!
//! Protocols model "this takes a while" (thinking, eating, cutting hair) by asking
//! a [`Delay`] to pause for some duration within a [`WorkRange`]. The delay source
//! is injected per run, so the same coordination logic runs with real random
//! timing in the binary and with no timing at all in tests.
//!
//! | Source          | Behavior                                               |
//! |-----------------|--------------------------------------------------------|
//! | [`NoDelay`]     | Yields to the scheduler, never sleeps                  |
//! | [`FixedDelay`]  | Sleeps the same duration every time                    |
//! | [`RandomDelay`] | Sleeps uniformly within the range, optionally seeded   |

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Inclusive range of simulated work duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkRange {
    pub min: Duration,
    pub max: Duration,
}

impl WorkRange {
    /// Builds a range, swapping the bounds if they are given in the wrong order.
    pub fn new(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    pub fn millis(min: u64, max: u64) -> Self {
        Self::new(Duration::from_millis(min), Duration::from_millis(max))
    }

    pub const fn zero() -> Self {
        Self {
            min: Duration::ZERO,
            max: Duration::ZERO,
        }
    }
}

/// Pluggable source of simulated work time.
#[async_trait]
pub trait Delay: Send + Sync {
    async fn pause(&self, range: WorkRange);
}

/// Never sleeps. Still yields, so actors interleave instead of running to completion.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDelay;

#[async_trait]
impl Delay for NoDelay {
    async fn pause(&self, _range: WorkRange) {
        tokio::task::yield_now().await;
    }
}

/// Sleeps the same duration regardless of the requested range.
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay(pub Duration);

#[async_trait]
impl Delay for FixedDelay {
    async fn pause(&self, _range: WorkRange) {
        tokio::time::sleep(self.0).await;
    }
}

/// Sleeps a uniformly random duration within the requested range.
pub struct RandomDelay {
    rng: Mutex<StdRng>,
}

impl RandomDelay {
    /// Seeded sources produce the same sequence of durations on every run.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng: Mutex::new(rng),
        }
    }

    fn sample(&self, range: WorkRange) -> Duration {
        if range.min == range.max {
            return range.min;
        }
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        rng.gen_range(range.min..=range.max)
    }
}

#[async_trait]
impl Delay for RandomDelay {
    async fn pause(&self, range: WorkRange) {
        let wait = self.sample(range);
        if wait.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_bounds_are_normalized() {
        let range = WorkRange::millis(500, 100);
        assert_eq!(range.min, Duration::from_millis(100));
        assert_eq!(range.max, Duration::from_millis(500));
    }

    #[test]
    fn random_samples_stay_in_range() {
        let delay = RandomDelay::new(Some(7));
        let range = WorkRange::millis(100, 500);
        for _ in 0..200 {
            let d = delay.sample(range);
            assert!(d >= range.min && d <= range.max, "{d:?} out of range");
        }
    }

    #[test]
    fn seeded_sources_repeat() {
        let a = RandomDelay::new(Some(42));
        let b = RandomDelay::new(Some(42));
        let range = WorkRange::millis(0, 1000);
        let xs: Vec<_> = (0..10).map(|_| a.sample(range)).collect();
        let ys: Vec<_> = (0..10).map(|_| b.sample(range)).collect();
        assert_eq!(xs, ys);
    }

    #[tokio::test(start_paused = true)]
    async fn fixed_delay_sleeps() {
        let start = tokio::time::Instant::now();
        FixedDelay(Duration::from_millis(250))
            .pause(WorkRange::zero())
            .await;
        assert!(start.elapsed() >= Duration::from_millis(250));
    }
}
