use crate::gps::context::GPS_EPOCH;
use crate::gps::context::SECS_PER_WEEK;
use crate::gps::Context;

use chrono::DateTime;
use chrono::Datelike;
use chrono::Duration;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use chrono::TimeZone;
use chrono::Timelike;
use chrono::Utc;

use tracing::info;
use tracing::warn;

/// Unix time of the 18th leap second, 2017-01-01.
const LEAP_18_EPOCH: i64 = 1_483_228_800;

/// Rolling calendar record assembled from partial time and date fields.
///
/// `year == 0` means no sentence has supplied a year yet.  `day` may run one past the end
/// of the month after a midnight wrap, it is normalized when resolved.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct DateRecord {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
    pub nanosecond: u32,
}

/// A decoded `hhmmss[.sss]` field.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Hhmmss {
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
    pub nanosecond: u32,
}

impl Hhmmss {
    /// Seconds since midnight, used to detect epoch changes.
    pub fn seconds_of_day(&self) -> f64 {
        (self.hour * 3600 + self.minute * 60 + self.second) as f64 + self.nanosecond as f64 * 1e-9
    }
}

fn two_digits(s: &str) -> Option<u32> {
    s.get(0..2)?.parse().ok()
}

/// Decode `hhmmss[.sss]`, the first six characters must be digits.
pub fn decode_hhmmss(field: &str) -> Option<Hhmmss> {
    let bytes = field.as_bytes();

    if bytes.len() < 6 || !bytes[..6].iter().all(u8::is_ascii_digit) {
        return None;
    }

    let hour = two_digits(&field[0..2])?;
    let minute = two_digits(&field[2..4])?;
    let second = two_digits(&field[4..6])?;

    let nanosecond = match field[6..].strip_prefix('.') {
        Some(fraction) => {
            let digits: String = fraction.chars().take_while(|c| c.is_ascii_digit()).take(9).collect();

            if digits.is_empty() {
                0
            } else {
                let value: u32 = digits.parse().ok()?;
                value * 10u32.pow(9 - digits.len() as u32)
            }
        }
        None => 0,
    };

    Some(Hhmmss {
        hour,
        minute,
        second,
        nanosecond,
    })
}

/// Decode a `ddmmyy` field into `(day, month, yy)`.
pub fn decode_ddmmyy(field: &str) -> Option<(u32, u32, i32)> {
    let bytes = field.as_bytes();

    if bytes.len() != 6 || !bytes.iter().all(u8::is_ascii_digit) {
        return None;
    }

    let day = two_digits(&field[0..2])?;
    let month = two_digits(&field[2..4])?;
    let yy = two_digits(&field[4..6])? as i32;

    if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return None;
    }

    Some((day, month, yy))
}

impl DateRecord {
    /// Merge a time of day, a decreasing hour means midnight passed.
    pub fn merge_hhmmss(&mut self, time: Hhmmss) {
        if time.hour < self.hour {
            self.day += 1;
        }

        self.hour = time.hour;
        self.minute = time.minute;
        self.second = time.second;
        self.nanosecond = time.nanosecond;
    }

    pub fn merge_date(&mut self, year: i32, month: u32, day: u32) {
        self.year = year;
        self.month = month;
        self.day = day;
    }

    pub fn has_year(&self) -> bool {
        self.year != 0
    }

    pub fn clear(&mut self) {
        *self = DateRecord::default();
    }

    /// Seconds since the Unix epoch, `None` when the record does not make a date.
    pub fn to_unix(&self) -> Option<i64> {
        let first = NaiveDate::from_ymd_opt(self.year, self.month, 1)?;
        let date = first + Duration::days(self.day as i64 - 1);
        let seconds = date.and_hms_opt(0, 0, 0)?.timestamp();

        Some(seconds + (self.hour * 3600 + self.minute * 60 + self.second) as i64)
    }

    fn set_from(&mut self, time: &DateTime<Utc>) {
        self.year = time.year();
        self.month = time.month();
        self.day = time.day();
        self.hour = time.hour();
        self.minute = time.minute();
        self.second = time.second();
    }
}

/// Resolve the rolling date record into UTC.
///
/// A leap second count of 18 or more is impossible before 2017, so such a time is a
/// receiver that missed a 10-bit week rollover and is moved forward 1024 weeks.
pub fn utc_resolve(context: &Context, date: &mut DateRecord) -> Option<DateTime<Utc>> {
    let mut seconds = date.to_unix()?;

    if seconds < 0 {
        warn!("resolved time {} is before 1970, ignored", seconds);
        return None;
    }

    if context.start_time >= GPS_EPOCH && context.leap_seconds > 17 && seconds < LEAP_18_EPOCH {
        let old = seconds;
        seconds += 1024 * SECS_PER_WEEK;

        let corrected = Utc.timestamp_opt(seconds, 0).single()?;
        date.set_from(&corrected);

        warn!(
            "WKRO bug: leap second {} inconsistent with {}, corrected to {} ({})",
            context.leap_seconds,
            old,
            seconds,
            iso8601(&corrected)
        );
    }

    Utc.timestamp_opt(seconds, date.nanosecond).single()
}

/// UTC from a GPS week and time of week, detecting week rollovers while running.
pub fn gpstime_resolve(context: &mut Context, week: u32, tow: f64) -> Option<DateTime<Utc>> {
    if (week as i64) < (context.gps_week & 0x3ff) as i64 {
        context.rollovers += 1;
        info!("GPS week {} 10-bit rollover detected, rollovers {}", week, context.rollovers);
    }

    let mut week = week as i64;

    if week < 1024 {
        week += context.rollovers as i64 * 1024;
    }

    context.gps_week = week as u16;

    let whole = tow.trunc() as i64;
    let nanos = ((tow - tow.trunc()) * 1e9).round() as u32;

    let mut seconds = GPS_EPOCH + week * SECS_PER_WEEK + whole - context.leap_seconds as i64;

    if seconds < 0 {
        seconds += 1024 * SECS_PER_WEEK;
    }

    Utc.timestamp_opt(seconds, nanos.min(999_999_999)).single()
}

/// ISO-8601 UTC with millisecond precision, `2024-05-26T01:08:00.000Z`.
pub fn iso8601(time: &DateTime<Utc>) -> String {
    time.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Parse the output of [`iso8601`], any fraction length is accepted.
pub fn parse_iso8601(input: &str) -> Option<DateTime<Utc>> {
    let input = input.strip_suffix('Z')?;

    NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Seconds and nanoseconds since the Unix epoch, as `(real_sec, real_nsec)` in `TOFF`.
pub fn split(time: &DateTime<Utc>) -> (i64, u32) {
    (time.timestamp(), time.timestamp_subsec_nanos())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_hhmmss() {
        let t = decode_hhmmss("123519.25").unwrap();

        assert_eq!(12, t.hour);
        assert_eq!(35, t.minute);
        assert_eq!(19, t.second);
        assert_eq!(250_000_000, t.nanosecond);

        assert_eq!(0, decode_hhmmss("123519").unwrap().nanosecond);
        assert_eq!(123_000_000, decode_hhmmss("000000.123").unwrap().nanosecond);
        assert_eq!(None, decode_hhmmss("12351"));
        assert_eq!(None, decode_hhmmss("12a519"));
        assert_eq!(None, decode_hhmmss(""));
    }

    #[test]
    fn test_decode_ddmmyy() {
        assert_eq!(Some((23, 3, 94)), decode_ddmmyy("230394"));
        assert_eq!(None, decode_ddmmyy("2303944"));
        assert_eq!(None, decode_ddmmyy("231394"));
        assert_eq!(None, decode_ddmmyy("000394"));
        assert_eq!(None, decode_ddmmyy("-10394"));
    }

    #[test]
    fn test_merge_hhmmss_midnight() {
        let mut date = DateRecord {
            year: 2020,
            month: 5,
            day: 31,
            hour: 23,
            minute: 59,
            second: 59,
            nanosecond: 0,
        };

        date.merge_hhmmss(decode_hhmmss("000000.00").unwrap());

        assert_eq!(32, date.day);

        let context = Context {
            start_time: 0,
            ..Context::default()
        };

        let time = utc_resolve(&context, &mut date).unwrap();

        assert_eq!("2020-06-01T00:00:00.000Z", iso8601(&time));
    }

    #[test]
    fn test_utc_resolve_rollover() {
        let context = Context {
            start_time: 1_600_000_000,
            leap_seconds: 18,
            ..Context::default()
        };

        let mut date = DateRecord {
            year: 2000,
            month: 1,
            day: 1,
            ..DateRecord::default()
        };

        let time = utc_resolve(&context, &mut date).unwrap();

        assert_eq!(946_684_800 + 619_315_200, time.timestamp());
        assert_eq!(2019, date.year);
    }

    #[test]
    fn test_gpstime_resolve() {
        let mut context = Context {
            leap_seconds: 18,
            rollovers: 2,
            ..Context::default()
        };

        // week 256 after two rollovers is week 2304, 2024-03-03
        let time = gpstime_resolve(&mut context, 256, 86_418.5).unwrap();

        assert_eq!("2024-03-04T00:00:00.500Z", iso8601(&time));
    }

    #[test]
    fn test_iso8601_round_trip() {
        let time = Utc.timestamp_opt(764_426_119, 120_000_000).single().unwrap();
        let text = iso8601(&time);

        assert_eq!("1994-03-23T12:35:19.120Z", text);
        assert_eq!(Some(time), parse_iso8601(&text));
        assert_eq!(None, parse_iso8601("1994-03-23T12:35:19.120"));
    }
}
