//! Non-blocking periodic callback timer
//!
//! Meant to be polled from every iteration of a cooperative main loop. The
//! caller supplies the current time, so the timer itself never reads a
//! clock and never blocks.
//!
//! After firing, the timer rebases to the `now` it was polled with rather
//! than advancing by exactly one interval. Late polls are therefore not
//! compensated and the schedule drifts by however late each poll was.

use embassy_time::{Duration, Instant};

pub struct PeriodicTimer<F> {
    interval: Duration,
    last_fire: Instant,
    action: F,
}

impl<F: FnMut()> PeriodicTimer<F> {
    /// Create a timer whose reference point is the zero instant.
    ///
    /// Call [`PeriodicTimer::reset`] right after construction to avoid an
    /// immediate fire when the clock is already past one interval.
    pub fn new(interval: Duration, action: F) -> Self {
        Self {
            interval,
            last_fire: Instant::from_ticks(0),
            action,
        }
    }

    /// Fire the action if at least one interval elapsed since the last fire.
    ///
    /// Returns whether the action ran. A `now` earlier than the last fire
    /// never fires.
    pub fn poll(&mut self, now: Instant) -> bool {
        match now.checked_duration_since(self.last_fire) {
            Some(elapsed) if elapsed >= self.interval => {
                self.last_fire = now;
                (self.action)();
                true
            }
            _ => false,
        }
    }

    /// Change the interval used by subsequent polls. Never fires.
    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn last_fire(&self) -> Instant {
        self.last_fire
    }

    /// Rebase the reference point to `now` without firing.
    pub fn reset(&mut self, now: Instant) {
        self.last_fire = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    fn at(ms: u64) -> Instant {
        Instant::from_millis(ms)
    }

    #[test]
    fn test_fires_once_per_interval() {
        let fired = Cell::new(0);
        let mut timer = PeriodicTimer::new(Duration::from_millis(1000), || {
            fired.set(fired.get() + 1)
        });

        assert!(!timer.poll(at(0)));
        assert_eq!(fired.get(), 0);

        assert!(timer.poll(at(1000)));
        assert_eq!(fired.get(), 1);

        assert!(!timer.poll(at(1000)));
        assert!(!timer.poll(at(1999)));
        assert_eq!(fired.get(), 1);

        assert!(timer.poll(at(2000)));
        assert_eq!(fired.get(), 2);
    }

    #[test]
    fn test_reset_then_poll_same_instant_never_fires() {
        let fired = Cell::new(0);
        let mut timer = PeriodicTimer::new(Duration::from_millis(1000), || {
            fired.set(fired.get() + 1)
        });

        timer.reset(at(5000));
        assert!(!timer.poll(at(5000)));
        assert_eq!(fired.get(), 0);
        assert!(timer.poll(at(6000)));
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn test_late_poll_rebases_and_drifts() {
        let mut timer = PeriodicTimer::new(Duration::from_millis(1000), || {});

        assert!(timer.poll(at(1300)));
        assert_eq!(timer.last_fire(), at(1300));
        // A drift-free schedule would fire at 2000; this one waits until 2300
        assert!(!timer.poll(at(2000)));
        assert!(timer.poll(at(2300)));
    }

    #[test]
    fn test_missed_ticks_fire_only_once() {
        let fired = Cell::new(0);
        let mut timer = PeriodicTimer::new(Duration::from_millis(100), || {
            fired.set(fired.get() + 1)
        });

        assert!(timer.poll(at(10_000)));
        assert!(!timer.poll(at(10_050)));
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn test_set_interval_does_not_fire_retroactively() {
        let fired = Cell::new(0);
        let mut timer = PeriodicTimer::new(Duration::from_millis(1000), || {
            fired.set(fired.get() + 1)
        });
        timer.reset(at(1000));

        timer.set_interval(Duration::from_millis(200));
        assert_eq!(fired.get(), 0);
        assert_eq!(timer.interval(), Duration::from_millis(200));

        assert!(!timer.poll(at(1100)));
        assert!(timer.poll(at(1200)));
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn test_clock_behind_last_fire_never_fires() {
        let mut timer = PeriodicTimer::new(Duration::from_millis(10), || {});
        timer.reset(at(500));
        assert!(!timer.poll(at(100)));
    }

    #[test]
    fn test_zero_interval_fires_every_poll() {
        let fired = Cell::new(0);
        let mut timer = PeriodicTimer::new(Duration::from_millis(0), || fired.set(fired.get() + 1));
        timer.poll(at(0));
        timer.poll(at(0));
        assert_eq!(fired.get(), 2);
    }
}
