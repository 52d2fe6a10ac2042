use crate::gps::ChangedMask;

use chrono::DateTime;
use chrono::Utc;

use serde::Serialize;
use serde::Serializer;

/// Fix dimension.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Mode {
    NotSeen = 0,
    NoFix = 1,
    Fix2D = 2,
    Fix3D = 3,
}

impl Default for Mode {
    fn default() -> Self {
        Mode::NotSeen
    }
}

impl Serialize for Mode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

/// Fix quality, ordered so a merge can only upgrade it.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Status {
    Unknown = 0,
    Gps = 1,
    Dgps = 2,
    RtkFix = 3,
    RtkFloat = 4,
    DeadReckoning = 5,
    GnssDr = 6,
    Time = 7,
    Simulated = 8,
    PpsFix = 9,
}

impl Default for Status {
    fn default() -> Self {
        Status::Unknown
    }
}

impl Serialize for Status {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

impl Status {
    /// Status from an NMEA 2.3 FAA mode indicator.
    pub fn from_faa(mode: &str) -> Status {
        match mode.chars().next() {
            None | Some('N') | Some('O') | Some('V') => Status::Unknown,
            Some('D') | Some('P') => Status::Dgps,
            Some('E') => Status::DeadReckoning,
            Some('F') => Status::RtkFloat,
            Some('M') => Status::Time,
            Some('R') => Status::RtkFix,
            Some('S') => Status::Simulated,
            Some(_) => Status::Gps,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Ecef {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
    pub p_acc: Option<f64>,
    pub vx: Option<f64>,
    pub vy: Option<f64>,
    pub vz: Option<f64>,
    pub v_acc: Option<f64>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Ned {
    pub rel_pos_n: Option<f64>,
    pub rel_pos_e: Option<f64>,
    pub rel_pos_d: Option<f64>,
    pub rel_pos_h: Option<f64>,
    pub rel_pos_l: Option<f64>,
    pub vel_n: Option<f64>,
    pub vel_e: Option<f64>,
    pub vel_d: Option<f64>,
}

/// RTK baseline between this receiver and its base or moving base.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Baseline {
    pub status: Status,
    pub east: Option<f64>,
    pub north: Option<f64>,
    pub up: Option<f64>,
    pub length: Option<f64>,
    pub course: Option<f64>,
    pub ratio: Option<f64>,
}

impl Baseline {
    pub fn is_empty(&self) -> bool {
        *self == Baseline::default()
    }
}

/// A bag of independently optional measurements.
///
/// Every numeric field is either a finite value or `None`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Fix {
    pub time: Option<DateTime<Utc>>,
    pub mode: Mode,
    pub status: Status,

    pub ept: Option<f64>,
    pub latitude: Option<f64>,
    pub epy: Option<f64>,
    pub longitude: Option<f64>,
    pub epx: Option<f64>,
    pub alt_hae: Option<f64>,
    pub alt_msl: Option<f64>,
    pub epv: Option<f64>,
    pub track: Option<f64>,
    pub epd: Option<f64>,
    pub speed: Option<f64>,
    pub eps: Option<f64>,
    pub climb: Option<f64>,
    pub epc: Option<f64>,
    pub eph: Option<f64>,
    pub sep: Option<f64>,
    pub magnetic_track: Option<f64>,
    pub magnetic_var: Option<f64>,
    pub geoid_sep: Option<f64>,
    pub depth: Option<f64>,

    pub dgps_age: Option<f64>,
    pub dgps_station: Option<i32>,
    pub datum: Option<String>,

    pub wanglem: Option<f64>,
    pub wangler: Option<f64>,
    pub wanglet: Option<f64>,
    pub wspeedr: Option<f64>,
    pub wspeedt: Option<f64>,
    pub wtemp: Option<f64>,

    pub ecef: Ecef,
    pub ned: Ned,
    pub base: Baseline,
}

/// `Some(v)` only for finite values.
pub fn finite(v: f64) -> Option<f64> {
    if v.is_finite() {
        Some(v)
    } else {
        None
    }
}

fn take(to: &mut Option<f64>, from: Option<f64>) {
    if from.is_some() {
        *to = from;
    }
}

impl Fix {
    pub fn clear(&mut self) {
        *self = Fix::default();
    }

    /// Merge the parts of `from` named by `transfer` into this fix.
    ///
    /// Present values never become missing and the status only moves up.
    pub fn merge(&mut self, transfer: ChangedMask, from: &Fix) {
        if transfer.contains(ChangedMask::TIME) && from.time.is_some() {
            self.time = from.time;
        }

        if transfer.contains(ChangedMask::LATLON) && from.latitude.is_some() && from.longitude.is_some() {
            self.latitude = from.latitude;
            self.longitude = from.longitude;
        }

        if transfer.contains(ChangedMask::MODE) {
            self.mode = from.mode;
        }

        if transfer.contains(ChangedMask::STATUS) && self.status < from.status {
            self.status = from.status;
        }

        if transfer.contains(ChangedMask::ALTITUDE) {
            take(&mut self.alt_hae, from.alt_hae);
            take(&mut self.alt_msl, from.alt_msl);
            take(&mut self.depth, from.depth);
        }

        if transfer.contains(ChangedMask::TRACK) {
            take(&mut self.track, from.track);
        }

        if transfer.contains(ChangedMask::MAGNETIC_TRACK) {
            take(&mut self.magnetic_track, from.magnetic_track);
            take(&mut self.magnetic_var, from.magnetic_var);
        }

        if transfer.contains(ChangedMask::SPEED) {
            take(&mut self.speed, from.speed);
        }

        if transfer.contains(ChangedMask::CLIMB) {
            take(&mut self.climb, from.climb);
        }

        if transfer.contains(ChangedMask::TIMERR) {
            take(&mut self.ept, from.ept);
        }

        if from.epx.is_some() && from.epy.is_some() {
            self.epx = from.epx;
            self.epy = from.epy;
        }

        take(&mut self.epd, from.epd);
        take(&mut self.eph, from.eph);
        take(&mut self.eps, from.eps);
        take(&mut self.sep, from.sep);
        take(&mut self.geoid_sep, from.geoid_sep);
        take(&mut self.epv, from.epv);

        if transfer.contains(ChangedMask::ECEF) {
            self.ecef.x = from.ecef.x;
            self.ecef.y = from.ecef.y;
            self.ecef.z = from.ecef.z;
            self.ecef.p_acc = from.ecef.p_acc;
        }

        if transfer.contains(ChangedMask::VECEF) {
            self.ecef.vx = from.ecef.vx;
            self.ecef.vy = from.ecef.vy;
            self.ecef.vz = from.ecef.vz;
            self.ecef.v_acc = from.ecef.v_acc;
        }

        if transfer.contains(ChangedMask::NED) {
            self.ned.rel_pos_n = from.ned.rel_pos_n;
            self.ned.rel_pos_e = from.ned.rel_pos_e;
            self.ned.rel_pos_d = from.ned.rel_pos_d;

            if from.ned.rel_pos_h.is_some() && from.ned.rel_pos_l.is_some() {
                self.ned.rel_pos_h = from.ned.rel_pos_h;
                self.ned.rel_pos_l = from.ned.rel_pos_l;
            }
        }

        if transfer.contains(ChangedMask::VNED) {
            self.ned.vel_n = from.ned.vel_n;
            self.ned.vel_e = from.ned.vel_e;
            self.ned.vel_d = from.ned.vel_d;
        }

        if from.datum.is_some() {
            self.datum = from.datum.clone();
        }

        // both, or neither
        if from.dgps_age.is_some() && from.dgps_station.is_some() {
            self.dgps_age = from.dgps_age;
            self.dgps_station = from.dgps_station;
        }

        if transfer.contains(ChangedMask::NAVDATA) {
            take(&mut self.wanglem, from.wanglem);
            take(&mut self.wangler, from.wangler);
            take(&mut self.wanglet, from.wanglet);
            take(&mut self.wspeedr, from.wspeedr);
            take(&mut self.wspeedt, from.wspeedt);
        }

        take(&mut self.wtemp, from.wtemp);

        if !from.base.is_empty() {
            self.base = from.base.clone();
        }
    }

    pub fn has_altitude(&self) -> bool {
        self.alt_hae.is_some() || self.alt_msl.is_some()
    }
}

/// Attitude and environmental sensors, reported as `ATT`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Attitude {
    pub time: Option<DateTime<Utc>>,
    pub heading: Option<f64>,
    pub mheading: Option<f64>,
    pub pitch: Option<f64>,
    pub roll: Option<f64>,
    pub yaw: Option<f64>,
    pub rot: Option<f64>,
    pub dip: Option<f64>,
    pub mag_x: Option<f64>,
    pub mag_y: Option<f64>,
    pub mag_z: Option<f64>,
    pub temp: Option<f64>,
    pub depth: Option<f64>,
    pub mag_st: Option<char>,
    pub pitch_st: Option<char>,
    pub roll_st: Option<char>,
    pub base: Baseline,
}

impl Attitude {
    pub fn clear(&mut self) {
        *self = Attitude::default();
    }
}

/// Pseudorange noise statistics, reported as `GST`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Gst {
    pub utctime: Option<DateTime<Utc>>,
    pub rms_deviation: Option<f64>,
    pub smajor_deviation: Option<f64>,
    pub sminor_deviation: Option<f64>,
    pub smajor_orientation: Option<f64>,
    pub lat_err_deviation: Option<f64>,
    pub lon_err_deviation: Option<f64>,
    pub alt_err_deviation: Option<f64>,
}

/// Disciplined oscillator state from a GPSDO.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Oscillator {
    pub running: bool,
    pub reference: bool,
    pub disciplined: bool,
    pub delta: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_faa() {
        assert_eq!(Status::Unknown, Status::from_faa(""));
        assert_eq!(Status::Unknown, Status::from_faa("N"));
        assert_eq!(Status::Gps, Status::from_faa("A"));
        assert_eq!(Status::Dgps, Status::from_faa("D"));
        assert_eq!(Status::RtkFix, Status::from_faa("R"));
        assert_eq!(Status::RtkFloat, Status::from_faa("FF"));
        assert_eq!(Status::DeadReckoning, Status::from_faa("E"));
    }

    #[test]
    fn test_merge_status_upgrades_only() {
        let mut to = Fix {
            status: Status::Dgps,
            ..Fix::default()
        };

        let from = Fix {
            status: Status::Gps,
            ..Fix::default()
        };

        to.merge(ChangedMask::STATUS, &from);
        assert_eq!(Status::Dgps, to.status);

        let from = Fix {
            status: Status::RtkFix,
            ..Fix::default()
        };

        to.merge(ChangedMask::STATUS, &from);
        assert_eq!(Status::RtkFix, to.status);
    }

    #[test]
    fn test_merge_keeps_present_values() {
        let mut to = Fix {
            alt_msl: Some(545.4),
            speed: Some(1.5),
            ..Fix::default()
        };

        let from = Fix {
            alt_hae: Some(592.3),
            ..Fix::default()
        };

        to.merge(ChangedMask::ALTITUDE | ChangedMask::SPEED, &from);

        assert_eq!(Some(545.4), to.alt_msl);
        assert_eq!(Some(592.3), to.alt_hae);
        assert_eq!(Some(1.5), to.speed);
    }

    #[test]
    fn test_merge_ignores_untransferred() {
        let mut to = Fix::default();

        let from = Fix {
            latitude: Some(48.1),
            longitude: Some(11.5),
            mode: Mode::Fix2D,
            ..Fix::default()
        };

        to.merge(ChangedMask::ONLINE, &from);
        assert_eq!(None, to.latitude);
        assert_eq!(Mode::NotSeen, to.mode);

        to.merge(ChangedMask::LATLON | ChangedMask::MODE, &from);
        assert_eq!(Some(48.1), to.latitude);
        assert_eq!(Mode::Fix2D, to.mode);
    }
}
