use super::{Shaper, WAIT_HORIZON};
use norma_env::Time;
use std::time::Duration;

const SECOND: Duration = Duration::from_secs(1);

/// Sends messages with an event-counted, linearly increasing frequency.
///
/// Emission instants are the running sums of a wait sequence. The first waits
/// are `1/start` apart; whenever the waits issued at the current frequency add
/// up to a full second, the frequency grows by `increment` and the interval is
/// recomputed, rounded to microseconds. A start frequency `<= 0` is replaced
/// by 1, and a frequency that drops to `<= 0` stops emission for good.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearShaper {
    frequency: f64,
    increment: f64,
    interval: Duration,
    /// Sum of waits issued at the current frequency
    tick: Duration,
    /// Next emission instant, `None` once emission stopped
    next: Option<Time>,
}

impl LinearShaper {
    pub fn new(start: f64, increment: f64) -> Self {
        let frequency = if start <= 0.0 { 1.0 } else { start };
        let mut shaper = Self {
            frequency,
            increment,
            interval: interval_for(frequency),
            tick: Duration::ZERO,
            next: Some(Time::ZERO),
        };
        shaper.advance();
        shaper
    }

    /// Current frequency in Tx/s.
    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    /// Moves `next` to the following emission instant.
    fn advance(&mut self) {
        let Some(current) = self.next else {
            return;
        };
        if self.tick >= SECOND {
            self.frequency += self.increment;
            if self.frequency <= 0.0 {
                self.next = None;
                return;
            }
            self.interval = interval_for(self.frequency);
            self.tick = Duration::ZERO;
        }
        self.tick += self.interval;
        self.next = Some(current + self.interval);
    }
}

/// `1/frequency` rounded to the nearest microsecond, never zero.
fn interval_for(frequency: f64) -> Duration {
    let micros = (1e6 / frequency).round().max(1.0) as u64;
    Duration::from_micros(micros)
}

impl Shaper for LinearShaper {
    fn messages_in_interval(&mut self, from: Time, to: Time) -> f64 {
        let mut count = 0u64;
        while let Some(next) = self.next {
            if next >= to {
                break;
            }
            if next >= from {
                count += 1;
            }
            self.advance();
        }
        count as f64
    }

    fn next_wait_time(&mut self, at: Time, credit: f64) -> Duration {
        if credit >= 1.0 {
            return Duration::ZERO;
        }
        match self.next {
            // One nanosecond past the instant so that `[at, at + wait)` contains it.
            Some(next) if next >= at => {
                ((next - at).to_duration() + Duration::from_nanos(1)).min(WAIT_HORIZON)
            }
            Some(_) => Duration::ZERO,
            None => WAIT_HORIZON,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instants_follow_wait_sequence() {
        // 2 Tx/s for one second, then 4 Tx/s, then 6 Tx/s
        let mut shaper = LinearShaper::new(2.0, 2.0);
        assert_eq!(shaper.messages_in_interval(Time::ZERO, Time::from_millis(500)), 0.0);
        let ms = Time::from_millis;
        assert_eq!(shaper.messages_in_interval(ms(500), ms(1001)), 2.0);
        assert_eq!(shaper.messages_in_interval(ms(1001), ms(2001)), 4.0);
        assert_eq!(shaper.frequency(), 6.0);
    }

    #[test]
    fn test_count_over_several_seconds() {
        let mut shaper = LinearShaper::new(2.0, 2.0);
        // 0.5, 1.0 | 1.25, 1.5, 1.75 (2.0 excluded)
        assert_eq!(shaper.messages_in_interval(Time::ZERO, Time::from_secs(2)), 5.0);
    }

    #[test]
    fn test_non_positive_start_means_one() {
        let mut shaper = LinearShaper::new(0.0, 0.0);
        assert_eq!(shaper.frequency(), 1.0);
        assert_eq!(shaper.messages_in_interval(Time::ZERO, Time::from_millis(10_500)), 10.0);
    }

    #[test]
    fn test_interval_rounded_to_micros() {
        let mut shaper = LinearShaper::new(3.0, 0.0);
        let wait = shaper.next_wait_time(Time::ZERO, 0.0);
        assert_eq!(wait, Duration::from_micros(333_333) + Duration::from_nanos(1));
    }

    #[test]
    fn test_wait_points_to_next_instant() {
        let mut shaper = LinearShaper::new(4.0, 0.0);
        let wait = shaper.next_wait_time(Time::ZERO, 0.0);
        assert_eq!(shaper.messages_in_interval(Time::ZERO, Time::ZERO + wait), 1.0);
        assert_eq!(
            shaper.next_wait_time(Time::from_millis(350), 0.0),
            Duration::from_millis(150) + Duration::from_nanos(1)
        );
        assert_eq!(shaper.next_wait_time(Time::ZERO, 1.0), Duration::ZERO);
    }

    #[test]
    fn test_falling_frequency_stops() {
        let mut shaper = LinearShaper::new(2.0, -2.0);
        assert_eq!(shaper.messages_in_interval(Time::ZERO, Time::from_secs(10)), 2.0);
        assert_eq!(shaper.next_wait_time(Time::from_secs(10), 0.0), WAIT_HORIZON);
    }

    #[test]
    fn test_drive_matches_instants() {
        let mut shaper = LinearShaper::new(5.0, 5.0);
        // 5 + 10 + 15 messages, the last one a few micros after t = 3s
        let sent = crate::shaper::tests::drive(&mut shaper, Time::from_millis(3_010));
        assert_eq!(sent, 30);
    }
}
