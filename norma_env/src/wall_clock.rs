//! Production clock following real time, backed by Tokio.

use crate::clock::Clock;
use crate::error::EnvError;
use crate::time::Time;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::time::Instant;

/// Wall-clock implementation used when running scenarios for real evaluations.
///
/// Time is the real time elapsed since construction (or the last restart).
/// `sleep_until` suspends for the remaining real duration with no correction
/// beyond the host scheduler's own jitter.
///
/// The clock reads `tokio::time::Instant`, so it follows a paused Tokio
/// clock in tests.
#[derive(Debug, Clone)]
pub struct WallClock {
    /// Instant corresponding to `t = 0`
    start: Arc<Mutex<Instant>>,
}

impl WallClock {
    /// Creates a new WallClock starting now.
    pub fn new() -> Self {
        Self {
            start: Arc::new(Mutex::new(Instant::now())),
        }
    }

    /// Creates an Arc-wrapped clock for sharing across tasks.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn start(&self) -> Instant {
        *self.start.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for WallClock {
    fn now(&self) -> Time {
        Time::from(self.start().elapsed())
    }

    fn restart(&self) {
        *self.start.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = Instant::now();
    }

    async fn sleep_until(&self, deadline: Time) -> Result<(), EnvError> {
        if deadline <= self.now() {
            return Ok(());
        }
        let target = self
            .start()
            .checked_add(deadline.to_duration())
            .ok_or_else(|| EnvError::InvalidDeadline(deadline.to_string()))?;
        tokio::time::sleep_until(target).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_wall_clock_time() {
        let clock = WallClock::new();
        let t1 = clock.now();
        clock.sleep_until(t1 + Duration::from_millis(10)).await.unwrap();
        let t2 = clock.now();

        assert!(t2 > t1);
        assert!(t2 - t1 >= Time::from_millis(10));
    }

    #[tokio::test]
    async fn test_wall_clock_sleep_accuracy() {
        let clock = WallClock::new();
        let start = clock.now();
        clock.sleep_until(start + Duration::from_millis(50)).await.unwrap();
        let error = (clock.now() - (start + Duration::from_millis(50))).as_nanos().abs();

        // Host scheduler jitter only
        assert!(error < Time::from_millis(10).as_nanos() * 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wall_clock_follows_paused_time() {
        let clock = WallClock::new();
        clock.sleep_until(Time::from_secs(5)).await.unwrap();
        let now = clock.now();
        assert!(now >= Time::from_secs(5));
        assert!(now < Time::from_secs(5) + Duration::from_millis(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wall_clock_past_deadline_returns_immediately() {
        let clock = WallClock::new();
        tokio::time::advance(Duration::from_secs(2)).await;
        clock.sleep_until(Time::from_secs(1)).await.unwrap();
        assert_eq!(clock.now(), Time::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wall_clock_restart() {
        let clock = WallClock::new();
        tokio::time::advance(Duration::from_secs(3)).await;
        clock.restart();
        assert_eq!(clock.now(), Time::ZERO);
    }

    #[tokio::test]
    async fn test_wall_clock_monotonic() {
        let clock = WallClock::new();
        let mut last = clock.now();
        for _ in 0..100 {
            let now = clock.now();
            assert!(now >= last);
            last = now;
        }
    }
}
