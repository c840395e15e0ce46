//! Request pacing per upstream host
//!
//! Several upstreams block bursty traffic, so the pipeline is paced: before
//! every remote call group the limiter for that host is awaited. Each call
//! reserves the next slot under a short mutex (no lock is ever held across
//! an await), so one limiter can be shared by concurrent workers without
//! raising the total request rate.

use std::sync::Mutex;
use std::time::Duration;

use rand::Rng;
use tokio::time::{sleep_until, Instant};
use tracing::trace;

/// An inclusive delay range between consecutive requests to one host.
///
/// Cooperative hosts take sub-second to a-few-seconds ranges; adversarial
/// hosts take minutes-wide ones. A degenerate range (min == max) is a fixed
/// delay.
#[derive(Debug, Clone, Copy)]
pub struct DelayRange {
    min: Duration,
    max: Duration,
}

impl DelayRange {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            min,
            max: max.max(min),
        }
    }

    pub fn fixed(delay: Duration) -> Self {
        Self::new(delay, delay)
    }

    /// Draw one delay uniformly from the range.
    fn sample(&self) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        let millis = rand::thread_rng().gen_range(self.min.as_millis()..=self.max.as_millis());
        Duration::from_millis(millis as u64)
    }
}

/// Fixed-delay-with-jitter limiter for one upstream host.
pub struct RateLimiter {
    range: DelayRange,
    next_slot: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(range: DelayRange) -> Self {
        Self {
            range,
            next_slot: Mutex::new(None),
        }
    }

    /// Wait for this host's next request slot.
    ///
    /// The first call proceeds immediately; every call schedules the slot
    /// after it a sampled delay further out.
    pub async fn pace(&self) {
        let wake = {
            let mut slot = self
                .next_slot
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let now = Instant::now();
            let wake = slot.map_or(now, |at| at.max(now));
            *slot = Some(wake + self.range.sample());
            wake
        };

        let wait = wake.saturating_duration_since(Instant::now());
        if !wait.is_zero() {
            trace!(wait_ms = wait.as_millis() as u64, "pacing before request");
        }
        sleep_until(wake).await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_first_call_is_immediate() {
        let limiter = RateLimiter::new(DelayRange::fixed(Duration::from_secs(2)));
        let started = Instant::now();
        limiter.pace().await;
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_consecutive_calls_are_spaced() {
        let limiter = RateLimiter::new(DelayRange::fixed(Duration::from_secs(2)));
        let started = Instant::now();
        limiter.pace().await;
        limiter.pace().await;
        limiter.pace().await;
        // two full delays between three calls (virtual clock, no real sleep)
        assert_eq!(started.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_jittered_delay_stays_in_range() {
        let range = DelayRange::new(Duration::from_millis(500), Duration::from_millis(1500));
        let limiter = RateLimiter::new(range);
        let started = Instant::now();
        limiter.pace().await;
        limiter.pace().await;
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(500));
        assert!(elapsed <= Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shared_limiter_serializes_concurrent_callers() {
        use std::sync::Arc;

        let limiter = Arc::new(RateLimiter::new(DelayRange::fixed(Duration::from_secs(1))));
        let started = Instant::now();

        let tasks: Vec<_> = (0..3)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                tokio::spawn(async move { limiter.pace().await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(started.elapsed(), Duration::from_secs(2));
    }
}
