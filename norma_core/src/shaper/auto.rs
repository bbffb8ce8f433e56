use super::Shaper;
use crate::load::LoadInfoSource;
use norma_env::Time;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Interval between two rate adjustments.
pub const CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// Additive-increase / multiplicative-decrease rate control.
///
/// The backlog `sent - received` of the application is the overload signal.
/// Once per [`CHECK_INTERVAL`] the rate is adjusted: a backlog above twice the
/// current rate multiplies it by `1 - decrease`, anything else adds
/// `increase`. The rate starts at zero.
pub struct AutoShaper {
    increase: f64,
    decrease: f64,
    rate: f64,
    last_check: Time,
    info: Option<Arc<dyn LoadInfoSource>>,
}

impl AutoShaper {
    pub fn new(increase: f64, decrease: f64) -> Self {
        Self {
            increase,
            decrease,
            rate: 0.0,
            last_check: Time::ZERO,
            info: None,
        }
    }

    /// Starts from a given rate instead of zero.
    pub fn with_rate(mut self, rate: f64) -> Self {
        self.rate = rate;
        self
    }

    /// Current rate in Tx/s.
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Applies one adjustment per whole check interval elapsed since the last one.
    pub fn observe(&mut self, now: Time) {
        let interval = CHECK_INTERVAL.as_nanos() as i64;
        let elapsed = (now - self.last_check).as_nanos();
        if elapsed < interval {
            return;
        }
        let steps = elapsed / interval;
        self.last_check = self.last_check + Time::from_nanos(steps * interval);

        let backlog = self.backlog();
        for _ in 0..steps {
            if backlog as f64 > 2.0 * self.rate {
                self.rate *= 1.0 - self.decrease;
            } else {
                self.rate += self.increase;
            }
        }
    }

    /// Sent but not yet received transactions; zero when unknown.
    fn backlog(&self) -> u64 {
        let Some(info) = &self.info else {
            return 0;
        };
        let sent = match info.sent_transactions() {
            Ok(sent) => sent,
            Err(e) => {
                warn!("Failed to fetch number of sent transactions: {}", e);
                return 0;
            }
        };
        let received = match info.received_transactions() {
            Ok(received) => received,
            Err(e) => {
                warn!("Failed to fetch number of received transactions: {}", e);
                return 0;
            }
        };
        sent.saturating_sub(received)
    }
}

impl std::fmt::Debug for AutoShaper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutoShaper")
            .field("increase", &self.increase)
            .field("decrease", &self.decrease)
            .field("rate", &self.rate)
            .field("last_check", &self.last_check)
            .finish()
    }
}

impl Shaper for AutoShaper {
    fn start(&mut self, info: Arc<dyn LoadInfoSource>) {
        self.info = Some(info);
    }

    fn messages_in_interval(&mut self, from: Time, to: Time) -> f64 {
        self.observe(from);
        (self.rate * (to - from).as_secs_f64()).max(0.0)
    }
}
