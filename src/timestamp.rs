use crate::pps::ioctl;

use chrono::DateTime;
use chrono::Utc;

use std::time::Duration;
use std::time::SystemTime;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TimestampKind {
    /// Time decoded from the receiver's sentences.
    InBand,
    /// A kernel PPS edge.
    Pps,
}

/// A timestamp to be sent to (or read from) NTP.
///
/// A timestamp includes both a "real" value and a "clock" value.
///
/// The "real" value is the time the receiver says it is, for a PPS edge the top of the second
/// the edge marks.
///
/// The "clock" value is the time of the system clock when the real time was observed.  It may
/// be different than the real time if the system clock and the receiver are not synchronized.
#[derive(Clone, Debug, PartialEq)]
pub struct Timestamp {
    /// Device the timestamp was read from
    pub device: String,
    /// Kind of device the timestamp was read from
    pub kind: TimestampKind,
    /// Precision of the timestamp as a power of two seconds.
    pub precision: i32,
    /// Nonzero if a leap second is coming
    pub leap: i32,
    pub real_sec: i64,
    pub real_nsec: u32,
    pub clock_sec: i64,
    pub clock_nsec: u32,
}

impl Default for Timestamp {
    fn default() -> Self {
        Timestamp {
            device: String::new(),
            kind: TimestampKind::InBand,
            precision: -1,
            leap: 0,
            real_sec: 0,
            real_nsec: 0,
            clock_sec: 0,
            clock_nsec: 0,
        }
    }
}

/// The system clock as seconds and nanoseconds since the Unix epoch.
pub fn now() -> (i64, u32) {
    let now = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or(Duration::ZERO);

    (now.as_secs() as i64, now.subsec_nanos())
}

impl Timestamp {
    /// In-band receiver time `real`, observed at system time `clock`.
    ///
    /// NMEA time is only good to the serial line latency, so the precision is a coarse -1.
    pub fn in_band(device: &str, real: &DateTime<Utc>, clock: (i64, u32)) -> Self {
        Timestamp {
            device: device.to_string(),
            kind: TimestampKind::InBand,
            precision: -1,
            leap: 0,
            real_sec: real.timestamp(),
            real_nsec: real.timestamp_subsec_nanos(),
            clock_sec: clock.0,
            clock_nsec: clock.1,
        }
    }

    /// Label a kernel PPS edge with the second it marks.
    ///
    /// The edge is the start of the second after the most recent in-band time, which must have
    /// arrived within the last two seconds of system time or the edge can't be labelled.
    pub fn from_pps_edge(
        device: &str,
        precision: i32,
        edge: &ioctl::data,
        in_band: Option<&Timestamp>,
    ) -> Option<Self> {
        let assert = &edge.info.assert_tu;
        let in_band = in_band?;

        let elapsed = (assert.sec - in_band.clock_sec) as f64
            + (assert.nsec as f64 - in_band.clock_nsec as f64) / 1e9;

        if !(0.0..2.0).contains(&elapsed) {
            return None;
        }

        Some(Timestamp {
            device: device.to_string(),
            kind: TimestampKind::Pps,
            precision,
            leap: in_band.leap,
            real_sec: in_band.real_sec + elapsed.round().max(1.0) as i64,
            real_nsec: 0,
            clock_sec: assert.sec,
            clock_nsec: assert.nsec.max(0) as u32,
        })
    }

    /// Real minus clock, in seconds.
    pub fn offset(&self) -> f64 {
        (self.real_sec - self.clock_sec) as f64
            + (self.real_nsec as f64 - self.clock_nsec as f64) / 1e9
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::TimeZone;

    fn edge(sec: i64, nsec: i32) -> ioctl::data {
        let mut data = ioctl::data::default();
        data.info.assert_tu.sec = sec;
        data.info.assert_tu.nsec = nsec;
        data
    }

    #[test]
    fn test_in_band() {
        let real = Utc.ymd(2024, 1, 2).and_hms_milli(3, 4, 5, 0);
        let ts = Timestamp::in_band("/dev/gps0", &real, (1704164645, 250_000_000));

        assert_eq!(TimestampKind::InBand, ts.kind);
        assert_eq!(1704164645, ts.real_sec);
        assert_eq!(-1, ts.precision);
        assert_approx_eq!(-0.25, ts.offset());
    }

    #[test]
    fn test_from_pps_edge() {
        let real = Utc.ymd(2024, 1, 2).and_hms_milli(3, 4, 5, 0);
        let in_band = Timestamp::in_band("/dev/gps0", &real, (1704164645, 300_000_000));

        let ts = Timestamp::from_pps_edge("/dev/pps0", -20, &edge(1704164646, 1_000), Some(&in_band))
            .unwrap();

        assert_eq!(TimestampKind::Pps, ts.kind);
        assert_eq!(1704164646, ts.real_sec);
        assert_eq!(0, ts.real_nsec);
        assert_eq!(1_000, ts.clock_nsec);
        assert_eq!(-20, ts.precision);
    }

    #[test]
    fn test_from_pps_edge_stale() {
        let real = Utc.ymd(2024, 1, 2).and_hms_milli(3, 4, 5, 0);
        let in_band = Timestamp::in_band("/dev/gps0", &real, (1704164645, 300_000_000));

        assert!(Timestamp::from_pps_edge("/dev/pps0", -20, &edge(1704164650, 0), Some(&in_band))
            .is_none());
        assert!(Timestamp::from_pps_edge("/dev/pps0", -20, &edge(1704164646, 0), None).is_none());
    }
}
