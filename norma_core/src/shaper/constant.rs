use super::Shaper;
use norma_env::Time;
use std::time::Duration;

/// Sends messages at a fixed rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantShaper {
    /// Tx/s
    rate: f64,
}

impl ConstantShaper {
    pub fn new(rate: f64) -> Self {
        Self { rate }
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }
}

impl Shaper for ConstantShaper {
    fn messages_in_interval(&mut self, from: Time, to: Time) -> f64 {
        (self.rate * (to - from).as_secs_f64()).max(0.0)
    }

    fn next_wait_time(&mut self, _at: Time, credit: f64) -> Duration {
        if credit >= 1.0 {
            return Duration::ZERO;
        }
        if self.rate <= 0.0 {
            return super::WAIT_HORIZON;
        }
        let seconds = (1.0 - credit) / self.rate;
        if seconds >= super::WAIT_HORIZON.as_secs_f64() {
            return super::WAIT_HORIZON;
        }
        // Whole microseconds, rounded up; the epsilon absorbs float noise.
        let micros = (seconds * 1e6 - 1e-6).ceil().max(0.0) as u64;
        Duration::from_micros(micros)
    }
}
