use super::Shaper;
use norma_env::Time;

/// Sends messages at a rate changing linearly over time, `f(t) = start + increment * t`.
///
/// Periods where `f(t) < 0` produce no messages: the count is the integral
/// of `f` over the part of the interval where it is non-negative.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlopeShaper {
    /// Tx/s at t = 0
    start: f64,
    /// Tx/s added per second
    increment: f64,
}

impl SlopeShaper {
    pub fn new(start: f64, increment: f64) -> Self {
        Self { start, increment }
    }

    /// Instantaneous rate, clipped at zero.
    pub fn rate_at(&self, t: Time) -> f64 {
        (self.start + self.increment * t.as_secs_f64()).max(0.0)
    }

    /// Antiderivative of the unclipped rate.
    fn integral(&self, t: f64) -> f64 {
        self.start * t + self.increment * t * t / 2.0
    }
}

impl Shaper for SlopeShaper {
    fn messages_in_interval(&mut self, from: Time, to: Time) -> f64 {
        let mut a = from.as_secs_f64();
        let mut b = to.as_secs_f64();

        if self.increment == 0.0 {
            return if self.start >= 0.0 { self.start * (b - a).max(0.0) } else { 0.0 };
        }

        // Clip the interval to where the rate is non-negative.
        let zero = -self.start / self.increment;
        if self.increment > 0.0 {
            a = a.max(zero);
        } else {
            b = b.min(zero);
        }
        if a >= b {
            return 0.0;
        }
        self.integral(b) - self.integral(a)
    }
}
