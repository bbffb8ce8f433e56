//! Traffic shapers: turning a declarative rate into emission decisions.
//!
//! Every shaper offers two views of the same traffic profile:
//!
//! - a **count view**, [`Shaper::messages_in_interval`], the (fractional)
//!   number of messages due within `[from, to)`,
//! - a **wait view**, [`Shaper::next_wait_time`], how long the pacing loop
//!   may sleep before at least one whole message is due.
//!
//! All times are offsets since the application started producing load.
//! The default wait view is derived from the count view by bisection, so a
//! new shape only needs to describe its count.
//!
//! | Variant                   | Rate                                  |
//! |---------------------------|---------------------------------------|
//! | [`ConstantShaper`]        | `r`                                   |
//! | [`LinearShaper`]          | event-counted ramp                    |
//! | [`SlopeShaper`]           | `f0 + k*t`, clipped at zero           |
//! | [`WaveShaper`]            | `min + (1-cos(2πt/p))/2 * (max-min)`  |
//! | [`AutoShaper`]            | AIMD on the sent/received backlog     |

mod auto;
mod constant;
mod linear;
mod slope;
mod wave;

pub use auto::AutoShaper;
pub use constant::ConstantShaper;
pub use linear::LinearShaper;
pub use slope::SlopeShaper;
pub use wave::WaveShaper;

use crate::load::LoadInfoSource;
use crate::scenario::Rate;
use norma_env::Time;
use std::sync::Arc;
use std::time::Duration;

/// Longest wait a shaper ever asks for.
pub const WAIT_HORIZON: Duration = Duration::from_secs(1);

/// Resolution of the bisection in the default wait view.
const WAIT_RESOLUTION: Duration = Duration::from_micros(1);

/// A traffic profile bound to one application.
pub trait Shaper: Send + 'static {
    /// Binds the load-info source. Called once, before the first query.
    fn start(&mut self, _info: Arc<dyn LoadInfoSource>) {}

    /// Number of messages due within `[from, to)`.
    fn messages_in_interval(&mut self, from: Time, to: Time) -> f64;

    /// Smallest wait `w` such that `credit + messages_in_interval(at, at + w) >= 1`,
    /// or [`WAIT_HORIZON`] when nothing is due earlier.
    fn next_wait_time(&mut self, at: Time, credit: f64) -> Duration {
        if credit >= 1.0 {
            return Duration::ZERO;
        }
        let needed = 1.0 - credit;
        if self.messages_in_interval(at, at + WAIT_HORIZON) < needed {
            return WAIT_HORIZON;
        }

        let mut lo = Duration::ZERO;
        let mut hi = WAIT_HORIZON;
        while hi - lo > WAIT_RESOLUTION {
            let mid = lo + (hi - lo) / 2;
            if self.messages_in_interval(at, at + mid) >= needed {
                hi = mid;
            } else {
                lo = mid;
            }
        }
        hi
    }
}

/// Builds the shaper for a scenario rate. A rate without any shape sends nothing.
pub fn from_rate(rate: &Rate) -> Box<dyn Shaper> {
    if let Some(constant) = rate.constant {
        return Box::new(ConstantShaper::new(constant));
    }
    if let Some(ramp) = rate.linear {
        return Box::new(LinearShaper::new(ramp.start, ramp.increment));
    }
    if let Some(ramp) = rate.slope {
        return Box::new(SlopeShaper::new(ramp.start, ramp.increment));
    }
    if let Some(wave) = rate.wave {
        return Box::new(WaveShaper::new(wave.min(), wave.max, wave.period));
    }
    if let Some(auto) = rate.auto {
        return Box::new(AutoShaper::new(auto.increase(), auto.decrease()));
    }
    Box::new(ConstantShaper::new(0.0))
}
