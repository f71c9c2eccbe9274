//! Countdown timers for the cooperative super-loop.
//!
//! A [`Timer`] never suspends anything. It records when it was started and
//! answers "has at least `duration` passed?" against an [`Instant`] supplied
//! by the caller, so a late check still fires instead of being skipped.

use std::time::Duration;

use crate::clock::Instant;

/// A single restartable countdown.
///
/// Once [`Timer::fire`] has reported an expiry it keeps returning `false`
/// until the timer is restarted, so a timer can never fire twice for the
/// same interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timer {
    duration: Duration,
    started_at: Option<Instant>,
    fired: bool,
}

impl Timer {
    /// Create a timer that has not been started yet.
    ///
    /// An unstarted timer reports itself as elapsed: a periodic action
    /// guarded by it runs on the first check instead of never.
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            started_at: None,
            fired: false,
        }
    }

    /// Create a timer already running from `now`.
    pub fn started(duration: Duration, now: Instant) -> Self {
        let mut timer = Self::new(duration);
        timer.restart(now);
        timer
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Change the configured duration without touching the start instant.
    pub fn set_duration(&mut self, duration: Duration) {
        self.duration = duration;
    }

    pub fn started_at(&self) -> Option<Instant> {
        self.started_at
    }

    pub fn is_started(&self) -> bool {
        self.started_at.is_some()
    }

    /// Start counting from `now`, clearing any previous expiry.
    pub fn restart(&mut self, now: Instant) {
        self.started_at = Some(now);
        self.fired = false;
    }

    /// Whether at least `duration` has passed since the last restart.
    ///
    /// Pure query: calling it any number of times at the same instant gives
    /// the same answer. An unstarted timer counts as elapsed.
    pub fn has_elapsed(&self, now: Instant) -> bool {
        match self.started_at {
            None => true,
            Some(_) if self.fired => true,
            Some(start) => now.duration_since(start) >= self.duration,
        }
    }

    /// Report an expiry exactly once per started interval.
    ///
    /// Returns `true` the first time it is called after the duration has
    /// elapsed and `false` afterwards until [`Timer::restart`] is called.
    pub fn fire(&mut self, now: Instant) -> bool {
        if self.fired || !self.has_elapsed(now) {
            return false;
        }
        if self.started_at.is_none() {
            tracing::debug!("timer checked before start, treating as elapsed");
        }
        self.fired = true;
        true
    }

    /// Time left until expiry, zero once elapsed.
    pub fn remaining(&self, now: Instant) -> Duration {
        match self.started_at {
            Some(start) if !self.fired => self
                .duration
                .saturating_sub(now.duration_since(start)),
            _ => Duration::ZERO,
        }
    }
}
