//! Bounded reconnect policy.
//!
//! A reconnect cycle allows `retry_count` attempts spaced `retry` apart.
//! Once they are used up, no attempt is made until `timeout` has passed
//! since the first attempt of the cycle; then a new cycle begins.

use std::time::Duration;

use greenhouse_core::{Instant, Timer, TimingConfig};
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    retry: Timer,
    window: Timer,
    max_attempts: u8,
    attempts: u8,
    in_cycle: bool,
}

impl ReconnectPolicy {
    pub fn new(retry: Duration, timeout: Duration, max_attempts: u8) -> Self {
        Self {
            retry: Timer::new(retry),
            window: Timer::new(timeout),
            max_attempts: max_attempts.max(1),
            attempts: 0,
            in_cycle: false,
        }
    }

    pub fn from_timing(timing: &TimingConfig) -> Self {
        Self::new(
            timing.reconnect_retry(),
            timing.reconnect_timeout(),
            timing.reconnect_retry_count,
        )
    }

    /// Adopt new timing without interrupting the current cycle.
    pub fn set_timing(&mut self, timing: &TimingConfig) {
        self.retry.set_duration(timing.reconnect_retry());
        self.window.set_duration(timing.reconnect_timeout());
        self.max_attempts = timing.reconnect_retry_count.max(1);
    }

    /// Whether an attempt should be made at `now`. A `true` answer counts
    /// as an attempt.
    pub fn poll(&mut self, now: Instant) -> bool {
        if !self.in_cycle {
            self.begin_cycle(now);
        } else if self.attempts < self.max_attempts {
            if !self.retry.has_elapsed(now) {
                return false;
            }
        } else {
            if !self.window.has_elapsed(now) {
                return false;
            }
            info!(
                attempts = self.attempts,
                "reconnect window elapsed, starting a new cycle"
            );
            self.begin_cycle(now);
        }

        self.attempts += 1;
        self.retry.restart(now);
        debug!(attempt = self.attempts, of = self.max_attempts, "reconnect attempt");
        true
    }

    /// The session is up; the next loss starts a fresh cycle.
    pub fn reset(&mut self) {
        self.in_cycle = false;
        self.attempts = 0;
    }

    /// Attempts made in the current cycle.
    pub fn attempts(&self) -> u8 {
        self.attempts
    }

    pub fn is_exhausted(&self) -> bool {
        self.in_cycle && self.attempts >= self.max_attempts
    }

    fn begin_cycle(&mut self, now: Instant) {
        self.in_cycle = true;
        self.attempts = 0;
        self.window.restart(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(ms: u32) -> Instant {
        Instant::from_millis(ms)
    }

    fn policy() -> ReconnectPolicy {
        ReconnectPolicy::from_timing(&TimingConfig::default())
    }

    fn attempts_between(policy: &mut ReconnectPolicy, from: u32, to: u32) -> Vec<u32> {
        (from..to).filter(|ms| policy.poll(at(*ms))).collect()
    }

    #[test]
    fn test_three_attempts_then_wait_for_window() {
        let mut p = policy();
        assert_eq!(attempts_between(&mut p, 0, 10_000), vec![0, 1000, 2000]);
        assert!(p.is_exhausted());
        assert_eq!(attempts_between(&mut p, 10_000, 12_001), vec![10_000, 11_000, 12_000]);
    }

    #[test]
    fn test_reset_starts_fresh_cycle() {
        let mut p = policy();
        assert!(p.poll(at(0)));
        assert!(!p.poll(at(500)));
        p.reset();
        assert!(p.poll(at(600)));
        assert_eq!(p.attempts(), 1);
    }

    #[test]
    fn test_late_poll_still_attempts() {
        let mut p = policy();
        assert!(p.poll(at(0)));
        assert!(p.poll(at(4000)));
        assert!(!p.poll(at(4999)));
        assert!(p.poll(at(5000)));
        // Exhausted; the window still counts from the cycle start.
        assert!(!p.poll(at(9999)));
        assert!(p.poll(at(10_000)));
    }
}
