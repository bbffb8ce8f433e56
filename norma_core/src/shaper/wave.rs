use super::Shaper;
use norma_env::Time;
use std::f64::consts::PI;

/// Sends messages at a rate oscillating between a minimum and a maximum.
///
/// The rate is `f(t) = min + (1 - cos(2πt/p)) / 2 * (max - min)`: it starts at
/// `min`, peaks at `max` after half a period and returns to `min` after a full
/// period. Counts use the closed-form integral, so they are exact for any
/// interval length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaveShaper {
    min: f64,
    max: f64,
    /// Seconds
    period: f64,
}

impl WaveShaper {
    pub fn new(min: f64, max: f64, period: f64) -> Self {
        Self { min, max, period }
    }

    /// Instantaneous rate in Tx/s.
    pub fn rate_at(&self, t: Time) -> f64 {
        let x = t.as_secs_f64();
        self.min + (1.0 - (2.0 * PI * x / self.period).cos()) / 2.0 * (self.max - self.min)
    }

    fn integral(&self, x: f64) -> f64 {
        let (a, b, p) = (self.min, self.max, self.period);
        (x * (a + b)) / 2.0 + (p * (a - b) * (2.0 * PI * x / p).sin()) / (4.0 * PI)
    }
}

impl Shaper for WaveShaper {
    fn messages_in_interval(&mut self, from: Time, to: Time) -> f64 {
        if self.period <= 0.0 {
            return 0.0;
        }
        self.integral(to.as_secs_f64()) - self.integral(from.as_secs_f64())
    }
}
