//! Monotonic millisecond time base.
//!
//! Microcontroller firmware counts milliseconds since boot in a 32-bit
//! register that wraps roughly every 49.7 days. [`Instant`] models that
//! counter directly and keeps all wraparound arithmetic in one place, so
//! the rest of the crate only ever compares elapsed durations.

use std::cell::Cell;
use std::time::Duration;

/// A point on the device's millisecond counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Instant(u32);

impl Instant {
    /// Create an instant from a raw millisecond counter value.
    pub const fn from_millis(millis: u32) -> Self {
        Self(millis)
    }

    /// Raw millisecond counter value.
    pub const fn as_millis(self) -> u32 {
        self.0
    }

    /// Time elapsed from `earlier` to `self`.
    ///
    /// Uses wrapping subtraction, so the result stays correct across a
    /// counter rollover as long as the real gap is shorter than one full
    /// counter period.
    pub fn duration_since(self, earlier: Instant) -> Duration {
        Duration::from_millis(u64::from(self.0.wrapping_sub(earlier.0)))
    }

    /// The instant `duration` after `self`, wrapping like the hardware counter.
    pub fn wrapping_add(self, duration: Duration) -> Instant {
        Instant(self.0.wrapping_add(duration_to_millis(duration)))
    }
}

/// Clamp a duration to the 32-bit millisecond range of the counter.
pub fn duration_to_millis(duration: Duration) -> u32 {
    u32::try_from(duration.as_millis()).unwrap_or(u32::MAX)
}

/// Source of the current [`Instant`].
pub trait Clock {
    fn now(&self) -> Instant;
}

/// A clock that only moves when told to.
///
/// Used by tests and by the host simulator to drive the super-loop
/// deterministically.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<u32>,
}

impl ManualClock {
    pub fn new(start: Instant) -> Self {
        Self {
            now: Cell::new(start.as_millis()),
        }
    }

    /// Jump to an absolute instant.
    pub fn set(&self, instant: Instant) {
        self.now.set(instant.as_millis());
    }

    /// Move forward by `duration`.
    pub fn advance(&self, duration: Duration) {
        let next = Instant(self.now.get()).wrapping_add(duration);
        self.now.set(next.as_millis());
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        Instant(self.now.get())
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

/// Wall-clock backed counter for hosted targets.
#[derive(Debug)]
pub struct SystemClock {
    boot: std::time::Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            boot: std::time::Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        // Truncation reproduces the wrapping hardware counter.
        Instant(self.boot.elapsed().as_millis() as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_since() {
        let a = Instant::from_millis(1_000);
        let b = Instant::from_millis(1_250);
        assert_eq!(b.duration_since(a), Duration::from_millis(250));
    }

    #[test]
    fn test_duration_since_across_rollover() {
        let before = Instant::from_millis(u32::MAX - 99);
        let after = before.wrapping_add(Duration::from_millis(300));
        assert_eq!(after.as_millis(), 200);
        assert_eq!(after.duration_since(before), Duration::from_millis(300));
    }

    #[test]
    fn test_manual_clock_advance() {
        let clock = ManualClock::new(Instant::from_millis(10));
        clock.advance(Duration::from_millis(5));
        assert_eq!(clock.now(), Instant::from_millis(15));

        clock.set(Instant::from_millis(3));
        assert_eq!(clock.now(), Instant::from_millis(3));
    }

    #[test]
    fn test_duration_to_millis_saturates() {
        assert_eq!(duration_to_millis(Duration::from_secs(u64::MAX)), u32::MAX);
        assert_eq!(duration_to_millis(Duration::from_millis(42)), 42);
    }
}
