//! Simulated clock for deterministic scenario runs.

use crate::clock::Clock;
use crate::error::EnvError;
use crate::time::Time;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// A simulated clock that never suspends execution.
///
/// `now()` reports the latest deadline passed to `sleep_until`; sleeping
/// simply moves time forward. Sleeping to an earlier time is a no-op, so time
/// never runs backwards. Scenario runs against this clock are deterministic
/// and complete instantly, which makes it the clock of choice for tests and
/// dry runs.
///
/// Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct SimClock {
    /// Current virtual time
    now: Arc<Mutex<Time>>,
}

impl SimClock {
    /// Creates a new SimClock at `t = 0`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an Arc-wrapped clock for sharing.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn time(&self) -> std::sync::MutexGuard<'_, Time> {
        // A poisoned lock still holds a valid time value.
        self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Clock for SimClock {
    fn now(&self) -> Time {
        *self.time()
    }

    fn restart(&self) {
        *self.time() = Time::ZERO;
    }

    async fn sleep_until(&self, deadline: Time) -> Result<(), EnvError> {
        let mut now = self.time();
        if *now < deadline {
            *now = deadline;
        }
        Ok(())
    }
}
