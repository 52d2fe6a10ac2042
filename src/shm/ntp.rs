use crate::shm::Segment;
use crate::shm::ShmError;
use crate::timestamp::Timestamp;

use std::convert::TryInto;
use std::sync::atomic::compiler_fence;
use std::sync::atomic::Ordering;

use tracing::trace;

use volatile_register::RW;

/// Key of NTP SHM unit 0, `NTP0`.
pub const NTPD_BASE: i32 = 0x4e54_5030;

/// Units ntpd's SHM driver can address.
pub const MAX_UNITS: i32 = 256;

/// The ntpd refclock 28 segment.
#[repr(C)]
pub struct Time {
    pub mode: RW<i32>,
    pub count: RW<i32>,
    pub clock_sec: RW<i32>,
    pub clock_usec: RW<i32>,
    pub receive_sec: RW<i32>,
    pub receive_usec: RW<i32>,
    pub leap: RW<i32>,
    pub precision: RW<i32>,
    pub nsamples: RW<i32>,
    pub valid: RW<i32>,
    pub clock_nsec: RW<u32>,
    pub receive_nsec: RW<u32>,
    _dummy: [u8; 8],
}

macro_rules! write {
    ($time: ident, $field:ident) => {
        write!($time, $field, $field)
    };
    ($time: ident, $field:ident, $value:expr) => {
        (*$time).$field.write($value)
    };
}

macro_rules! update {
    ($time: ident, $field:ident, $ex:expr) => {
        (*$time).$field.modify($ex)
    };
}

macro_rules! read {
    ($time: ident, $field:ident) => {
        (*$time).$field.read()
    };
}

/// One read of an NTP segment.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Sample {
    pub mode: i32,
    pub count: i32,
    pub clock_sec: i32,
    pub clock_usec: i32,
    pub receive_sec: i32,
    pub receive_usec: i32,
    pub leap: i32,
    pub precision: i32,
    pub nsamples: i32,
    pub valid: i32,
    pub clock_nsec: u32,
    pub receive_nsec: u32,
}

/// A refclock segment for one NTP unit.
///
/// ntpd's "clock" is the reference time and its "receive" time is the system clock, so a
/// [`Timestamp`]'s real time lands in the clock fields.
pub struct NtpSegment {
    pub unit: i32,
    segment: Segment<Time>,
}

impl NtpSegment {
    /// Units 0 and 1 are only readable by root.
    pub fn attach(unit: i32) -> Result<Self, ShmError> {
        if !(0..MAX_UNITS).contains(&unit) {
            return Err(ShmError::InvalidUnit(unit));
        }

        let permissions = if unit <= 1 { 0o600 } else { 0o666 };

        let segment = Segment::attach(NTPD_BASE + unit, permissions, true)?;

        let ntp = NtpSegment { unit, segment };
        let time = ntp.segment.as_ptr();

        unsafe {
            write!(time, mode, 1);
            write!(time, nsamples, 3);
        }

        Ok(ntp)
    }

    /// Attach an existing unit without creating it.
    pub fn open(unit: i32) -> Result<Self, ShmError> {
        if !(0..MAX_UNITS).contains(&unit) {
            return Err(ShmError::InvalidUnit(unit));
        }

        let segment = Segment::attach(NTPD_BASE + unit, 0, false)?;

        Ok(NtpSegment { unit, segment })
    }

    /// Publish with the mode 1 protocol, `valid` is cleared and `count` bumped around the write.
    pub fn write(&self, ts: &Timestamp) {
        let time = self.segment.as_ptr();

        let clock_sec = ts.real_sec.try_into().unwrap_or(i32::MAX);
        let clock_nsec = ts.real_nsec;
        let clock_usec = (clock_nsec / 1000) as i32;

        let receive_sec = ts.clock_sec.try_into().unwrap_or(i32::MAX);
        let receive_nsec = ts.clock_nsec;
        let receive_usec = (receive_nsec / 1000) as i32;

        let leap = ts.leap;
        let precision = ts.precision;
        let count;

        unsafe {
            write!(time, valid, 0);
            update!(time, count, |c| c.wrapping_add(1));

            compiler_fence(Ordering::SeqCst);

            write!(time, clock_sec);
            write!(time, clock_usec);
            write!(time, receive_sec);
            write!(time, receive_usec);
            write!(time, leap);
            write!(time, precision);
            write!(time, clock_nsec);
            write!(time, receive_nsec);

            compiler_fence(Ordering::SeqCst);

            update!(time, count, |c| c.wrapping_add(1));
            write!(time, valid, 1);

            count = read!(time, count);
        }

        trace!(
            "set NTP unit {} count {}: {}.{:09}",
            self.unit,
            count,
            ts.real_sec,
            ts.real_nsec
        );
    }

    /// Read a sample newer than `last_count`.
    ///
    /// In mode 1 ntpd resets valid and bumps count after reading, so valid can't be trusted
    /// while reading.  A count that differs from `last_count` and doesn't change during the
    /// read gives a consistent sample.
    pub fn read(&self, last_count: i32) -> Option<Sample> {
        let time = self.segment.as_ptr();

        let sample = unsafe {
            let count_before = read!(time, count);

            if count_before == last_count {
                return None;
            }

            compiler_fence(Ordering::SeqCst);

            let sample = Sample {
                mode: read!(time, mode),
                count: count_before,
                clock_sec: read!(time, clock_sec),
                clock_usec: read!(time, clock_usec),
                receive_sec: read!(time, receive_sec),
                receive_usec: read!(time, receive_usec),
                leap: read!(time, leap),
                precision: read!(time, precision),
                nsamples: read!(time, nsamples),
                valid: read!(time, valid),
                clock_nsec: read!(time, clock_nsec),
                receive_nsec: read!(time, receive_nsec),
            };

            compiler_fence(Ordering::SeqCst);

            if read!(time, count) != count_before {
                trace!("raced a writer on NTP unit {}", self.unit);
                return None;
            }

            sample
        };

        Some(sample)
    }
}

impl Sample {
    /// The sample as a timestamp from `device`.
    pub fn timestamp(&self, device: &str) -> Timestamp {
        let clock_nsec = if self.clock_nsec > 0 {
            self.clock_nsec
        } else {
            self.clock_usec.max(0) as u32 * 1000
        };

        let receive_nsec = if self.receive_nsec > 0 {
            self.receive_nsec
        } else {
            self.receive_usec.max(0) as u32 * 1000
        };

        Timestamp {
            device: device.to_string(),
            precision: self.precision,
            leap: self.leap,
            real_sec: self.clock_sec as i64,
            real_nsec: clock_nsec,
            clock_sec: self.receive_sec as i64,
            clock_nsec: receive_nsec,
            ..Timestamp::default()
        }
    }
}
