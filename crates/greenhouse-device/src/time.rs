//! Wall-clock time stamps.
//!
//! [`TimeStampSensor`] synchronises with a [`TimeSource`] on its own timer
//! and extrapolates between syncs from the loop's monotonic instant.

use chrono::{DateTime, NaiveDateTime, Utc};
use greenhouse_core::{ConfigRecord, Instant, Timer, TimingConfig};
use greenhouse_protocol::Reading;
use tracing::{info, warn};

use crate::collaborators::{Sensor, SensorDescriptor, SensorError, TimeSource};

pub const DAY_STAMP_FORMAT: &str = "%Y-%m-%d";
pub const TIME_STAMP_FORMAT: &str = "%H:%M:%S";

pub struct TimeStampSensor<S> {
    source: S,
    sync: Timer,
    offset_s: i32,
    /// Unix seconds at the last successful sync, and when it happened.
    base: Option<(i64, Instant)>,
}

impl<S: TimeSource> TimeStampSensor<S> {
    pub fn new(source: S, timing: &TimingConfig) -> Self {
        Self {
            source,
            sync: Timer::new(timing.time_sync()),
            offset_s: timing.time_zone_offset_s,
            base: None,
        }
    }

    pub fn set_timing(&mut self, timing: &TimingConfig) {
        self.sync.set_duration(timing.time_sync());
        self.offset_s = timing.time_zone_offset_s;
    }

    /// Local date and time at `now`, once synchronised.
    pub fn local_time(&mut self, now: Instant) -> Option<NaiveDateTime> {
        self.sync_if_due(now);
        let (epoch, synced_at) = self.base?;
        let elapsed = i64::try_from(now.duration_since(synced_at).as_secs()).ok()?;
        let local = epoch
            .checked_add(elapsed)?
            .checked_add(i64::from(self.offset_s))?;
        DateTime::<Utc>::from_timestamp(local, 0).map(|utc| utc.naive_utc())
    }

    /// `YYYY-MM-DD`
    pub fn day_stamp(&mut self, now: Instant) -> Option<String> {
        self.local_time(now)
            .map(|t| t.format(DAY_STAMP_FORMAT).to_string())
    }

    /// `HH:MM:SS`
    pub fn time_stamp(&mut self, now: Instant) -> Option<String> {
        self.local_time(now)
            .map(|t| t.format(TIME_STAMP_FORMAT).to_string())
    }

    fn sync_if_due(&mut self, now: Instant) {
        if !self.sync.fire(now) {
            return;
        }
        self.sync.restart(now);
        match self.source.epoch_seconds() {
            Ok(epoch) => {
                info!(epoch, "time synchronised");
                self.base = Some((epoch, now));
            }
            Err(error) => warn!(%error, "time sync failed, keeping previous base"),
        }
    }
}

impl<S: TimeSource> Sensor for TimeStampSensor<S> {
    fn descriptor(&self) -> SensorDescriptor {
        SensorDescriptor::sensor("Time Stamp")
    }

    fn read(&mut self, now: Instant) -> Result<Reading, SensorError> {
        self.time_stamp(now)
            .map(Reading::Text)
            .ok_or_else(|| SensorError::Unavailable("time not synchronised".into()))
    }

    fn configure(&mut self, config: &ConfigRecord) {
        self.set_timing(&config.timing);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 2024-05-01T12:00:00Z
    const MAY_DAY_NOON: i64 = 1_714_564_800;

    struct Ntp {
        answers: Vec<Result<i64, SensorError>>,
        calls: usize,
    }

    impl TimeSource for Ntp {
        fn epoch_seconds(&mut self) -> Result<i64, SensorError> {
            self.calls += 1;
            if self.answers.is_empty() {
                Err(SensorError::Unavailable("no answer".into()))
            } else {
                self.answers.remove(0)
            }
        }
    }

    fn sensor(answers: Vec<Result<i64, SensorError>>) -> TimeStampSensor<Ntp> {
        TimeStampSensor::new(Ntp { answers, calls: 0 }, &TimingConfig::default())
    }

    fn at(ms: u32) -> Instant {
        Instant::from_millis(ms)
    }

    #[test]
    fn test_stamps_after_sync() {
        let mut s = sensor(vec![Ok(MAY_DAY_NOON)]);
        assert_eq!(s.day_stamp(at(0)).as_deref(), Some("2024-05-01"));
        assert_eq!(s.time_stamp(at(61_500)).as_deref(), Some("12:01:01"));
        assert_eq!(s.source.calls, 1);
    }

    #[test]
    fn test_time_zone_offset() {
        let timing = TimingConfig {
            time_zone_offset_s: 2 * 3600,
            ..TimingConfig::default()
        };
        let mut s = TimeStampSensor::new(
            Ntp {
                answers: vec![Ok(MAY_DAY_NOON)],
                calls: 0,
            },
            &timing,
        );
        assert_eq!(s.time_stamp(at(0)).as_deref(), Some("14:00:00"));
    }

    #[test]
    fn test_out_of_range_epoch_is_unavailable() {
        let timing = TimingConfig {
            time_zone_offset_s: 3600,
            ..TimingConfig::default()
        };
        let mut s = TimeStampSensor::new(
            Ntp {
                answers: vec![Ok(i64::MAX)],
                calls: 0,
            },
            &timing,
        );
        assert_eq!(s.local_time(at(0)), None);
        assert!(matches!(s.read(at(5_000)), Err(SensorError::Unavailable(_))));
    }

    #[test]
    fn test_unsynchronised_read_fails() {
        let mut s = sensor(vec![]);
        assert!(matches!(s.read(at(0)), Err(SensorError::Unavailable(_))));
    }

    #[test]
    fn test_resync_on_own_timer() {
        let mut s = sensor(vec![Ok(MAY_DAY_NOON), Ok(MAY_DAY_NOON + 7200)]);
        s.read(at(0)).unwrap();
        s.read(at(3_599_999)).unwrap();
        assert_eq!(s.source.calls, 1);

        let value = s.read(at(3_600_000)).unwrap();
        assert_eq!(s.source.calls, 2);
        assert_eq!(value, Reading::Text("14:00:00".into()));
    }

    #[test]
    fn test_failed_resync_keeps_previous_base() {
        let mut s = sensor(vec![Ok(MAY_DAY_NOON)]);
        s.read(at(0)).unwrap();
        let value = s.read(at(3_600_000)).unwrap();
        assert_eq!(value, Reading::Text("13:00:00".into()));
    }
}
