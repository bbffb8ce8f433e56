//! Core clock trait for scenario execution.

use crate::error::EnvError;
use crate::time::Time;
use async_trait::async_trait;
use std::time::Duration;

/// The central interface for time during a scenario run.
///
/// The executor run loop and the load controllers only ever talk to time
/// through this trait, which lets the same scenario run deterministically in
/// tests and in real time during evaluations.
///
/// # Implementations
///
/// - **Simulation**: `SimClock` - never suspends, jumps to each deadline
/// - **Production**: `WallClock` - wraps `tokio::time`
///
/// # Monotonicity
///
/// `now()` must never decrease between two calls on the same instance, and
/// after `sleep_until(t)` returns, `now() >= t` holds (up to scheduler jitter
/// for the wall clock).
#[async_trait]
pub trait Clock: Send + Sync + 'static {
    /// Returns the current scenario time.
    ///
    /// This is not necessarily related to any real-world time; it is the
    /// progress of time as defined by the implementation.
    fn now(&self) -> Time;

    /// Resets the clock so that the current instant becomes `t = 0`.
    ///
    /// Used right before a run loop starts, as network setup may have taken
    /// a considerable amount of time.
    fn restart(&self);

    /// Suspends the caller until `now() >= deadline`.
    ///
    /// Returns immediately if the deadline already passed.
    async fn sleep_until(&self, deadline: Time) -> Result<(), EnvError>;

    /// Returns how far the clock is past the given time (zero if not yet reached).
    fn delay(&self, time: Time) -> Duration {
        (self.now() - time).to_duration()
    }
}
