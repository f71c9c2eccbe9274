//! Relay timer state machine.
//!
//! Each relay toggles on its own [`Timer`]. External commands are queued
//! with [`RelayBoard::command`] and applied at the start of the next
//! [`RelayBoard::service`], before timers are checked, so within one
//! service a relay is changed either by a command or by its timer, never
//! by both.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::clock::Instant;
use crate::model::{ConfigRecord, RelayConfig};
use crate::store::Event;
use crate::timer::Timer;

/// Writes relay outputs to hardware.
pub trait RelayDriver {
    fn set_output(&mut self, port: u8, on: bool);
}

impl<D: RelayDriver + ?Sized> RelayDriver for Box<D> {
    fn set_output(&mut self, port: u8, on: bool) {
        (**self).set_output(port, on)
    }
}

/// Errors reported by [`RelayBoard`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    #[error("no relay on port {0}")]
    UnknownPort(u8),
}

/// Live state of one relay.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayState {
    pub port: u8,
    pub name: String,
    pub output: bool,
    pub timer: Timer,
}

/// What caused an output change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeCause {
    Timer,
    Command,
}

/// An output change made during [`RelayBoard::service`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayChange {
    pub port: u8,
    pub output: bool,
    pub cause: ChangeCause,
}

/// The set of timed relays and the driver behind them.
#[derive(Debug)]
pub struct RelayBoard<D> {
    driver: D,
    relays: Vec<RelayState>,
    pending: Vec<(u8, bool)>,
}

impl<D: RelayDriver> RelayBoard<D> {
    pub fn new(driver: D) -> Self {
        Self {
            driver,
            relays: Vec::new(),
            pending: Vec::new(),
        }
    }

    /// Discard all relay state and recreate it from `relays`.
    ///
    /// Every relay starts OFF with its timer running from `now`. Queued
    /// commands for ports that no longer exist are dropped.
    pub fn rebuild(&mut self, relays: &[RelayConfig], now: Instant) {
        self.relays.clear();
        for config in relays {
            if self.relays.iter().any(|r| r.port == config.port) {
                warn!(port = config.port, name = %config.name, "duplicate relay port, skipping");
                continue;
            }
            self.driver.set_output(config.port, false);
            self.relays.push(RelayState {
                port: config.port,
                name: config.name.clone(),
                output: false,
                timer: Timer::started(config.interval(), now),
            });
        }
        let relays = &self.relays;
        self.pending
            .retain(|(port, _)| relays.iter().any(|r| r.port == *port));
        info!(count = self.relays.len(), "relay board rebuilt");
    }

    /// React to a committed configuration change.
    pub fn update(&mut self, event: Event, config: &ConfigRecord, now: Instant) {
        if event == Event::RelaysChanged {
            self.rebuild(&config.relays, now);
        }
    }

    /// Queue an explicit output change for the next service.
    ///
    /// The relay's timer is not touched: its next fire still happens at the
    /// previously scheduled instant.
    pub fn command(&mut self, port: u8, on: bool) -> Result<(), RelayError> {
        if self.get(port).is_none() {
            return Err(RelayError::UnknownPort(port));
        }
        self.pending.push((port, on));
        Ok(())
    }

    /// Apply queued commands, then toggle every relay whose timer fired.
    pub fn service(&mut self, now: Instant) -> Vec<RelayChange> {
        let mut changes = Vec::new();

        for (port, on) in std::mem::take(&mut self.pending) {
            let Some(relay) = self.relays.iter_mut().find(|r| r.port == port) else {
                continue;
            };
            if relay.output == on {
                continue;
            }
            relay.output = on;
            self.driver.set_output(port, on);
            debug!(port, on, "relay set by command");
            changes.push(RelayChange {
                port,
                output: on,
                cause: ChangeCause::Command,
            });
        }

        for relay in &mut self.relays {
            if changes.iter().any(|c| c.port == relay.port) {
                // Fire is deferred to the next service.
                continue;
            }
            if relay.timer.fire(now) {
                relay.output = !relay.output;
                self.driver.set_output(relay.port, relay.output);
                relay.timer.restart(now);
                debug!(port = relay.port, on = relay.output, "relay toggled by timer");
                changes.push(RelayChange {
                    port: relay.port,
                    output: relay.output,
                    cause: ChangeCause::Timer,
                });
            }
        }

        changes
    }

    pub fn relays(&self) -> &[RelayState] {
        &self.relays
    }

    pub fn get(&self, port: u8) -> Option<&RelayState> {
        self.relays.iter().find(|r| r.port == port)
    }

    pub fn output(&self, port: u8) -> Option<bool> {
        self.get(port).map(|r| r.output)
    }

    /// Time until the relay on `port` next toggles by itself.
    pub fn next_fire_in(&self, port: u8, now: Instant) -> Option<Duration> {
        self.get(port).map(|r| r.timer.remaining(now))
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct RecordingDriver {
        writes: Vec<(u8, bool)>,
    }

    impl RelayDriver for RecordingDriver {
        fn set_output(&mut self, port: u8, on: bool) {
            self.writes.push((port, on));
        }
    }

    fn at(ms: u32) -> Instant {
        Instant::from_millis(ms)
    }

    fn board(relays: &[RelayConfig]) -> RelayBoard<RecordingDriver> {
        let mut board = RelayBoard::new(RecordingDriver::default());
        board.rebuild(relays, at(0));
        board.driver_mut().writes.clear();
        board
    }

    #[test]
    fn test_relay_toggles_and_rearms_from_fire_instant() {
        let mut board = board(&[RelayConfig::new(0, "pump", 1000)]);
        assert_eq!(board.output(0), Some(false));

        assert!(board.service(at(999)).is_empty());

        let changes = board.service(at(1000));
        assert_eq!(
            changes,
            vec![RelayChange {
                port: 0,
                output: true,
                cause: ChangeCause::Timer
            }]
        );
        assert_eq!(board.driver().writes, vec![(0, true)]);
        assert_eq!(board.get(0).unwrap().timer.started_at(), Some(at(1000)));

        assert!(board.service(at(1999)).is_empty());
        assert_eq!(board.output(0), Some(true));

        board.service(at(2000));
        assert_eq!(board.output(0), Some(false));
    }

    #[test]
    fn test_late_service_rearms_from_late_instant() {
        let mut board = board(&[RelayConfig::new(0, "pump", 1000)]);
        assert_eq!(board.service(at(1500)).len(), 1);
        assert!(board.service(at(2000)).is_empty());
        assert_eq!(board.service(at(2500)).len(), 1);
    }

    #[test]
    fn test_command_does_not_reset_relay_timer() {
        let mut board = board(&[RelayConfig::new(0, "light", 1000)]);

        board.command(0, true).unwrap();
        let changes = board.service(at(400));
        assert_eq!(changes[0].cause, ChangeCause::Command);
        assert_eq!(board.output(0), Some(true));

        // The natural fire still happens at the original instant and toggles
        // away from the commanded state.
        let changes = board.service(at(1000));
        assert_eq!(changes[0].cause, ChangeCause::Timer);
        assert_eq!(board.output(0), Some(false));
    }

    #[test]
    fn test_command_and_fire_never_share_a_service() {
        let mut board = board(&[RelayConfig::new(0, "light", 1000)]);

        board.command(0, true).unwrap();
        let changes = board.service(at(1000));
        assert_eq!(
            changes,
            vec![RelayChange {
                port: 0,
                output: true,
                cause: ChangeCause::Command
            }]
        );

        // The deferred fire happens on the next service.
        let changes = board.service(at(1001));
        assert_eq!(changes[0].cause, ChangeCause::Timer);
        assert_eq!(board.output(0), Some(false));
    }

    #[test]
    fn test_command_matching_output_changes_nothing() {
        let mut board = board(&[RelayConfig::new(0, "light", 1000)]);
        board.command(0, false).unwrap();
        assert!(board.service(at(10)).is_empty());
        assert!(board.driver().writes.is_empty());
    }

    #[test]
    fn test_command_unknown_port() {
        let mut board = board(&[RelayConfig::new(0, "light", 1000)]);
        assert_eq!(board.command(9, true), Err(RelayError::UnknownPort(9)));
    }

    #[test]
    fn test_rebuild_discards_removed_relays() {
        let mut board = board(&[
            RelayConfig::new(0, "pump", 1000),
            RelayConfig::new(1, "light", 1000),
        ]);
        board.service(at(1000));
        board.command(0, true).unwrap();

        board.rebuild(&[RelayConfig::new(1, "light", 1000)], at(1200));

        assert_eq!(board.relays().len(), 1);
        let relay = &board.relays()[0];
        assert_eq!(relay.port, 1);
        assert!(!relay.output);
        assert_eq!(relay.timer.started_at(), Some(at(1200)));
        assert!(board.service(at(1300)).is_empty());
    }

    #[test]
    fn test_rebuild_skips_duplicate_ports() {
        let board = board(&[
            RelayConfig::new(2, "pump", 1000),
            RelayConfig::new(2, "again", 500),
        ]);
        assert_eq!(board.relays().len(), 1);
        assert_eq!(board.relays()[0].name, "pump");
    }

    #[test]
    fn test_update_ignores_unrelated_events() {
        let mut board = board(&[RelayConfig::new(0, "pump", 1000)]);
        let config = ConfigRecord::default();

        board.update(Event::ConfigChanged, &config, at(10));
        assert_eq!(board.relays().len(), 1);

        board.update(Event::RelaysChanged, &config, at(10));
        assert!(board.relays().is_empty());
    }

    #[test]
    fn test_next_fire_in() {
        let mut board = board(&[RelayConfig::new(0, "pump", 1000)]);
        assert_eq!(board.next_fire_in(0, at(250)), Some(Duration::from_millis(750)));
        board.service(at(1000));
        assert_eq!(board.next_fire_in(0, at(1000)), Some(Duration::from_millis(1000)));
        assert_eq!(board.next_fire_in(4, at(0)), None);
    }
}
