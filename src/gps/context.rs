use chrono::Datelike;
use chrono::Utc;

use tracing::info;
use tracing::warn;

/// GPS epoch, 1980-01-06T00:00:00Z, in Unix seconds.
pub const GPS_EPOCH: i64 = 315_964_800;

pub const SECS_PER_WEEK: i64 = 604_800;

/// Fixes a receiver must report before its time is trusted for clock disciplining.
pub const NTP_MIN_FIXES: u32 = 3;

/// Leap seconds known when this was built.
pub const BUILD_LEAPSECONDS: i32 = 18;

/// Time-keeping state shared by everything a device decodes.
///
/// Each device task owns a copy seeded from the daemon settings, so decoders take it by
/// `&mut` without locking.
#[derive(Clone, Debug)]
pub struct Context {
    /// First year of the current century, 2000 for 2000-2099.
    pub century: i32,
    pub century_valid: bool,
    /// Last two-digit year seen in a ddmmyy field, for wrap detection.
    pub last_yy: Option<i32>,
    /// Count of 10-bit GPS week rollovers.
    pub rollovers: i32,
    pub gps_week: u16,
    pub leap_seconds: i32,
    pub leap_valid: bool,
    /// Unix time the daemon started, used for the rollover sanity checks.
    pub start_time: i64,
    /// Trust receiver time before it has a fix.
    pub battery_rtc: bool,
    /// Never reconfigure receivers.
    pub passive: bool,
    /// Never write to devices.
    pub readonly: bool,
    /// Pinned serial speed, disables baud hunting.
    pub fixed_port_speed: Option<u32>,
    /// Pinned serial framing such as `8N1`.
    pub fixed_port_framing: Option<String>,
    /// Consecutive good fixes.
    pub fixcnt: u32,
}

impl Default for Context {
    fn default() -> Self {
        let now = Utc::now();

        Context {
            century: now.year() - now.year() % 100,
            century_valid: false,
            last_yy: None,
            rollovers: ((now.timestamp() - GPS_EPOCH) / SECS_PER_WEEK / 1024) as i32,
            gps_week: 0,
            leap_seconds: BUILD_LEAPSECONDS,
            leap_valid: false,
            start_time: now.timestamp(),
            battery_rtc: false,
            passive: false,
            readonly: false,
            fixed_port_speed: None,
            fixed_port_framing: None,
            fixcnt: 0,
        }
    }
}

impl Context {
    /// A context pinned to `year`, as set by a `# Date:` comment in a log replay.
    pub fn set_year(&mut self, year: i32) {
        self.century = year - year % 100;
        self.start_time = 0;
        self.last_yy = None;

        info!("century set to {} from replayed log", self.century);
    }

    /// Adopt a century seen in a four-digit year.
    pub fn century_update(&mut self, century: i32) {
        self.century_valid = true;

        if century > self.century {
            warn!("century rollover detected");
            self.century = century;
        } else if self.start_time >= GPS_EPOCH && century < self.century {
            warn!("ZDA year less than clock year, probable GPS week rollover lossage");
            self.century_valid = false;
        }
    }

    /// Full year for a two-digit year from a ddmmyy field.
    ///
    /// A 99 to 00 transition advances the century.  Years at or after 2080 step back a
    /// century so 32-bit clocks stay in range.
    pub fn resolve_year(&mut self, yy: i32) -> i32 {
        if yy == 0 && self.last_yy == Some(99) {
            self.century += 100;
            warn!("two-digit year wrapped, century now {}", self.century);
        }

        self.last_yy = Some(yy);

        let year = self.century + yy;

        if year >= 2080 {
            year - 100
        } else {
            year
        }
    }

    /// Record a leap second count reported by the receiver.
    pub fn set_leap_seconds(&mut self, leap_seconds: i32) {
        if leap_seconds != self.leap_seconds {
            info!("leap seconds now {}", leap_seconds);
        }

        self.leap_seconds = leap_seconds;
        self.leap_valid = true;
    }
}
