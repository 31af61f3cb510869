//! Timed retry with exponential backoff
//!
//! `poll_until` re-runs a check until it yields a value or the next sleep
//! would cross the deadline. It never sleeps past the deadline and never
//! issues a check after it.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, sleep};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PollConfig {
    /// Delay after the first unsuccessful check
    pub interval: Duration,
    /// Growth factor applied to the delay after each check
    pub multiplier: f64,
    pub max_interval: Duration,
    /// Total budget measured from the first check
    pub deadline: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            multiplier: 1.5,
            max_interval: Duration::from_secs(60),
            deadline: Duration::from_secs(30 * 60),
        }
    }
}

impl PollConfig {
    pub fn new(interval: Duration, deadline: Duration) -> Self {
        Self {
            interval,
            multiplier: 1.0,
            max_interval: interval,
            deadline,
        }
    }

    pub fn with_backoff(mut self, multiplier: f64, max_interval: Duration) -> Self {
        self.multiplier = multiplier;
        self.max_interval = max_interval;
        self
    }

    /// Sleep taken after the `attempt`-th (zero based) unsuccessful check.
    /// Never exceeds the larger of `interval` and `max_interval`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let ceiling = self.max_interval.max(self.interval);
        let factor = self.multiplier.max(1.0).powi(attempt.min(i32::MAX as u32) as i32);
        let secs = self.interval.as_secs_f64() * factor;
        Duration::try_from_secs_f64(secs)
            .map(|delay| delay.min(ceiling))
            .unwrap_or(ceiling)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollResult<T> {
    Ready(T),
    TimedOut { attempts: u32, elapsed: Duration },
}

/// Run `check` until it returns `Some`, an error, or the deadline is reached
pub async fn poll_until<T, F, Fut>(config: &PollConfig, mut check: F) -> Result<PollResult<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let started = Instant::now();
    let mut attempt: u32 = 0;

    loop {
        if let Some(value) = check().await? {
            return Ok(PollResult::Ready(value));
        }

        let delay = config.delay_for_attempt(attempt);
        attempt += 1;
        let elapsed = started.elapsed();

        if elapsed.saturating_add(delay) > config.deadline {
            tracing::debug!(
                "Giving up after {} checks ({:?} elapsed, next wait {:?})",
                attempt,
                elapsed,
                delay
            );
            return Ok(PollResult::TimedOut {
                attempts: attempt,
                elapsed,
            });
        }

        sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CloudError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_delay_calculation() {
        let config = PollConfig::new(Duration::from_secs(1), Duration::from_secs(600))
            .with_backoff(2.0, Duration::from_secs(10));

        assert_eq!(config.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(config.delay_for_attempt(2), Duration::from_secs(4));
        assert_eq!(config.delay_for_attempt(3), Duration::from_secs(8));
        assert_eq!(config.delay_for_attempt(4), Duration::from_secs(10)); // capped at max
    }

    #[test]
    fn test_huge_values_saturate_instead_of_panicking() {
        let config = PollConfig::new(Duration::from_secs(10), Duration::MAX)
            .with_backoff(f64::MAX, Duration::MAX);
        assert_eq!(config.delay_for_attempt(0), Duration::from_secs(10));
        assert_eq!(config.delay_for_attempt(u32::MAX), Duration::MAX);

        let capped = PollConfig::new(Duration::from_secs(10), Duration::from_secs(600))
            .with_backoff(1.5, Duration::from_secs(60));
        assert_eq!(capped.delay_for_attempt(10_000), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_max_delay_times_out_without_overflow() {
        let config = PollConfig::new(Duration::MAX, Duration::from_secs(60));
        let result: PollResult<()> = poll_until(&config, || async { Ok(None) }).await.unwrap();
        assert!(matches!(result, PollResult::TimedOut { attempts: 1, .. }));
    }

    #[test]
    fn test_fixed_interval() {
        let config = PollConfig::new(Duration::from_secs(5), Duration::from_secs(60));
        assert_eq!(config.delay_for_attempt(7), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_on_third_check() {
        let calls = AtomicU32::new(0);
        let config = PollConfig::new(Duration::from_secs(5), Duration::from_secs(60));

        let result = poll_until(&config, || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move { Ok((n == 3).then_some(n)) }
        })
        .await
        .unwrap();

        assert_eq!(result, PollResult::Ready(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_shorter_than_interval_checks_once() {
        let calls = AtomicU32::new(0);
        let config = PollConfig::new(Duration::from_secs(10), Duration::from_secs(1));

        let result: PollResult<()> = poll_until(&config, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(None) }
        })
        .await
        .unwrap();

        assert!(matches!(result, PollResult::TimedOut { attempts: 1, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_checks_past_deadline() {
        let calls = AtomicU32::new(0);
        let config = PollConfig::new(Duration::from_secs(10), Duration::from_secs(35));

        let result: PollResult<()> = poll_until(&config, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(None) }
        })
        .await
        .unwrap();

        // checks at 0s, 10s, 20s, 30s; a fifth at 40s would cross 35s
        assert!(matches!(result, PollResult::TimedOut { attempts: 4, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_check_error_propagates() {
        let config = PollConfig::default();
        let result: Result<PollResult<()>> =
            poll_until(&config, || async { Err(CloudError::Api("throttled".into())) }).await;
        assert!(matches!(result, Err(CloudError::Api(_))));
    }
}
