//! Injectable time source
//!
//! Input dwell times, pacing delays, cooldowns and the watchdog rate limit
//! all read time through [`Clock`], so tests can run whole episodes on a
//! [`ManualClock`] without sleeping.

use std::time::{Duration, Instant};

/// Convert configured seconds to a [`Duration`], rounded to the microsecond.
///
/// Negative and NaN inputs map to zero.
pub fn secs(seconds: f64) -> Duration {
    Duration::from_micros((seconds.max(0.0) * 1e6).round() as u64)
}

/// Monotonic time source with blocking sleep
pub trait Clock {
    /// Time elapsed since the clock was created
    fn now(&self) -> Duration;

    /// Block the calling thread for `duration`
    fn sleep(&mut self, duration: Duration);
}

/// Wall-clock time backed by [`Instant`] and [`std::thread::sleep`]
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Create a clock whose epoch is "now"
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&mut self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// Simulated clock: sleeping advances time instantly
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Duration,
    slept: Duration,
}

impl ManualClock {
    /// Create a clock at time zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a clock at an arbitrary time
    pub fn at(now: Duration) -> Self {
        Self { now, slept: Duration::ZERO }
    }

    /// Move time forward without counting it as sleep
    pub fn advance(&mut self, duration: Duration) {
        self.now += duration;
    }

    /// Jump to an absolute time (never backwards)
    pub fn set(&mut self, now: Duration) {
        self.now = self.now.max(now);
    }

    /// Total time spent in [`Clock::sleep`]
    pub fn total_slept(&self) -> Duration {
        self.slept
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now
    }

    fn sleep(&mut self, duration: Duration) {
        self.now += duration;
        self.slept += duration;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_sleep_advances() {
        let mut clock = ManualClock::new();
        clock.sleep(Duration::from_millis(300));
        clock.advance(Duration::from_secs(1));
        assert_eq!(clock.now(), Duration::from_millis(1300));
        assert_eq!(clock.total_slept(), Duration::from_millis(300));
    }

    #[test]
    fn test_manual_clock_set_is_monotonic() {
        let mut clock = ManualClock::at(Duration::from_secs(10));
        clock.set(Duration::from_secs(5));
        assert_eq!(clock.now(), Duration::from_secs(10));
        clock.set(Duration::from_secs(50));
        assert_eq!(clock.now(), Duration::from_secs(50));
    }

    #[test]
    fn test_secs_rounds_to_micros() {
        assert_eq!(secs(0.3), Duration::from_millis(300));
        assert_eq!(secs(0.01), Duration::from_millis(10));
        assert_eq!(secs(-1.0), Duration::ZERO);
        assert_eq!(secs(f64::NAN), Duration::ZERO);
    }

    #[test]
    fn test_system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
