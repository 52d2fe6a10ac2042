use crate::gps::time::iso8601;
use crate::gps::Attitude;
use crate::gps::Baseline;
use crate::gps::ChangedMask;
use crate::gps::Mode;
use crate::gps::Session;
use crate::gps::Status;
use crate::timestamp::Timestamp;

use chrono::DateTime;
use chrono::Utc;

use serde::Serialize;
use serde::Serializer;

pub const PROTO_MAJOR: u32 = 3;
pub const PROTO_MINOR: u32 = 15;

fn time(time: &Option<DateTime<Utc>>) -> Option<String> {
    time.filter(|t| t.timestamp() >= 0).map(|t| iso8601(&t))
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename = "VERSION", tag = "class")]
pub struct Version {
    pub release: String,
    pub rev: String,
    pub proto_major: u32,
    pub proto_minor: u32,
}

impl Default for Version {
    fn default() -> Self {
        Version {
            release: env!("CARGO_PKG_VERSION").to_string(),
            rev: env!("CARGO_PKG_VERSION").to_string(),
            proto_major: PROTO_MAJOR,
            proto_minor: PROTO_MINOR,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename = "ERROR", tag = "class")]
pub struct ErrorMessage {
    pub message: String,
}

impl ErrorMessage {
    pub fn new(message: impl Into<String>) -> Self {
        ErrorMessage {
            message: message.into(),
        }
    }

    pub fn unrecognized(request: &str) -> Self {
        ErrorMessage::new(format!("Unrecognized request '{}'", request.trim_end()))
    }

    pub fn no_such_device(path: &str) -> Self {
        ErrorMessage::new(format!("No such device as {}", path))
    }
}

/// When a device was opened, or 0 once it has been closed.
#[derive(Clone, Debug, PartialEq)]
pub enum Activated {
    At(DateTime<Utc>),
    Off,
}

impl Serialize for Activated {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Activated::At(time) => serializer.serialize_str(&iso8601(time)),
            Activated::Off => serializer.serialize_u8(0),
        }
    }
}

/// Remove `user:password@` from a URI.
pub fn obfuscate_uri(uri: &str) -> String {
    let scheme_end = match uri.find("://") {
        Some(offset) => offset + 3,
        None => return uri.to_string(),
    };

    match uri[scheme_end..].rfind('@') {
        Some(at) => format!("{}{}", &uri[..scheme_end], &uri[scheme_end + at + 1..]),
        None => uri.to_string(),
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename = "DEVICE", tag = "class")]
pub struct DeviceInfo {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtype1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub readonly: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activated: Option<Activated>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub native: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bps: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parity: Option<char>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stopbits: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cycle: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mincycle: Option<f64>,
}

impl DeviceInfo {
    pub fn new(path: &str) -> Self {
        DeviceInfo {
            path: obfuscate_uri(path),
            ..DeviceInfo::default()
        }
    }

    /// The notice sent to watchers when a device closes.
    pub fn deactivated(path: &str) -> Self {
        DeviceInfo {
            activated: Some(Activated::Off),
            ..DeviceInfo::new(path)
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.activated, Some(Activated::At(_)))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename = "DEVICES", tag = "class")]
pub struct Devices {
    pub devices: Vec<DeviceInfo>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BaseReport {
    #[serde(rename = "baseS")]
    pub status: Status,
    #[serde(rename = "baseE", skip_serializing_if = "Option::is_none")]
    pub east: Option<f64>,
    #[serde(rename = "baseN", skip_serializing_if = "Option::is_none")]
    pub north: Option<f64>,
    #[serde(rename = "baseU", skip_serializing_if = "Option::is_none")]
    pub up: Option<f64>,
    #[serde(rename = "baseL", skip_serializing_if = "Option::is_none")]
    pub length: Option<f64>,
    #[serde(rename = "baseC", skip_serializing_if = "Option::is_none")]
    pub course: Option<f64>,
}

impl BaseReport {
    fn new(base: &Baseline) -> Option<Self> {
        if base.status == Status::Unknown {
            return None;
        }

        Some(BaseReport {
            status: base.status,
            east: base.east,
            north: base.north,
            up: base.up,
            length: base.length,
            course: base.course,
        })
    }
}

/// Time, position, velocity.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename = "TPV", tag = "class")]
pub struct Tpv {
    pub device: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    pub mode: Mode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leapseconds: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ept: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lon: Option<f64>,
    #[serde(rename = "altHAE", skip_serializing_if = "Option::is_none")]
    pub alt_hae: Option<f64>,
    #[serde(rename = "altMSL", skip_serializing_if = "Option::is_none")]
    pub alt_msl: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub epx: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub epy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub epv: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub magtrack: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub magvar: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub climb: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub epd: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eps: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub epc: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ecefx: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ecefy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ecefz: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ecefvx: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ecefvy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ecefvz: Option<f64>,
    #[serde(rename = "relN", skip_serializing_if = "Option::is_none")]
    pub rel_n: Option<f64>,
    #[serde(rename = "relE", skip_serializing_if = "Option::is_none")]
    pub rel_e: Option<f64>,
    #[serde(rename = "relD", skip_serializing_if = "Option::is_none")]
    pub rel_d: Option<f64>,
    #[serde(rename = "velN", skip_serializing_if = "Option::is_none")]
    pub vel_n: Option<f64>,
    #[serde(rename = "velE", skip_serializing_if = "Option::is_none")]
    pub vel_e: Option<f64>,
    #[serde(rename = "velD", skip_serializing_if = "Option::is_none")]
    pub vel_d: Option<f64>,
    #[serde(rename = "geoidSep", skip_serializing_if = "Option::is_none")]
    pub geoid_sep: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eph: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sep: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datum: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth: Option<f64>,
    #[serde(rename = "dgpsAge", skip_serializing_if = "Option::is_none")]
    pub dgps_age: Option<f64>,
    #[serde(rename = "dgpsSta", skip_serializing_if = "Option::is_none")]
    pub dgps_station: Option<i32>,
    #[serde(rename = "dgpsRatio", skip_serializing_if = "Option::is_none")]
    pub dgps_ratio: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wanglem: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wangler: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wanglet: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wspeedr: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wspeedt: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wtemp: Option<f64>,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub base: Option<BaseReport>,
}

impl Tpv {
    /// The running fix of `session`.  Wind fields are only included when `changed` has
    /// `NAVDATA`.
    pub fn new(session: &Session, changed: ChangedMask) -> Self {
        let fix = &session.fix;

        let mut tpv = Tpv {
            device: obfuscate_uri(&session.path),
            status: Some(fix.status).filter(|status| *status >= Status::Dgps),
            mode: fix.mode,
            time: time(&fix.time),
            leapseconds: Some(session.context.leap_seconds).filter(|_| session.context.leap_valid),
            ..Tpv::default()
        };

        if tpv.time.is_some() {
            tpv.ept = fix.ept;
        }

        if fix.mode >= Mode::Fix2D {
            tpv.lat = fix.latitude;
            tpv.lon = fix.longitude;
            tpv.alt_hae = fix.alt_hae;
            tpv.alt_msl = fix.alt_msl;
            tpv.epx = fix.epx;
            tpv.epy = fix.epy;
            tpv.epv = fix.epv;
            tpv.track = fix.track;
            tpv.magtrack = fix.magnetic_track;
            tpv.magvar = fix.magnetic_var;
            tpv.speed = fix.speed;
            tpv.epd = fix.epd;
            tpv.eps = fix.eps;
            tpv.eph = fix.eph;
            tpv.sep = fix.sep;
            tpv.datum = fix.datum.clone();
            tpv.depth = fix.depth;
            tpv.dgps_age = fix.dgps_age;
            tpv.dgps_station = fix.dgps_station;
            tpv.dgps_ratio = fix.base.ratio;

            if fix.mode >= Mode::Fix3D {
                tpv.climb = fix.climb;
                tpv.epc = fix.epc;
                tpv.ecefx = fix.ecef.x;
                tpv.ecefy = fix.ecef.y;
                tpv.ecefz = fix.ecef.z;
                tpv.ecefvx = fix.ecef.vx;
                tpv.ecefvy = fix.ecef.vy;
                tpv.ecefvz = fix.ecef.vz;

                if fix.ned.rel_pos_n.is_some() && fix.ned.rel_pos_e.is_some() {
                    tpv.rel_n = fix.ned.rel_pos_n;
                    tpv.rel_e = fix.ned.rel_pos_e;
                    tpv.rel_d = fix.ned.rel_pos_d;
                }

                if fix.ned.vel_n.is_some() && fix.ned.vel_e.is_some() {
                    tpv.vel_n = fix.ned.vel_n;
                    tpv.vel_e = fix.ned.vel_e;
                    tpv.vel_d = fix.ned.vel_d;
                }

                tpv.geoid_sep = fix.geoid_sep;
            }
        }

        if changed.contains(ChangedMask::NAVDATA) {
            tpv.wanglem = fix.wanglem;
            tpv.wangler = fix.wangler;
            tpv.wanglet = fix.wanglet;
            tpv.wspeedr = fix.wspeedr;
            tpv.wspeedt = fix.wspeedt;
        }

        tpv.wtemp = fix.wtemp;
        tpv.base = BaseReport::new(&fix.base);

        tpv
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SkySatellite {
    #[serde(rename = "PRN")]
    pub prn: i16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gnssid: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub svid: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sigid: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub az: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub el: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pr: Option<f64>,
    #[serde(rename = "prRes", skip_serializing_if = "Option::is_none")]
    pub pr_res: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qual: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ss: Option<f64>,
    pub used: bool,
}

/// Satellites in view and dilution of precision.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename = "SKY", tag = "class")]
pub struct Sky {
    pub device: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gdop: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hdop: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdop: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tdop: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xdop: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ydop: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vdop: Option<f64>,
    #[serde(rename = "nSat", skip_serializing_if = "Option::is_none")]
    pub n_sat: Option<usize>,
    #[serde(rename = "uSat", skip_serializing_if = "Option::is_none")]
    pub u_sat: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub satellites: Vec<SkySatellite>,
}

impl Sky {
    /// `None` when there is nothing to say.
    pub fn new(session: &Session) -> Option<Self> {
        let dop = &session.dop;

        let mut sky = Sky {
            device: obfuscate_uri(&session.path),
            time: time(&session.skyview.time),
            gdop: dop.gdop,
            hdop: dop.hdop,
            pdop: dop.pdop,
            tdop: dop.tdop,
            xdop: dop.xdop,
            ydop: dop.ydop,
            vdop: dop.vdop,
            ..Sky::default()
        };

        sky.satellites = session
            .skyview
            .satellites
            .iter()
            .filter(|satellite| satellite.prn != 0)
            .map(|satellite| SkySatellite {
                prn: satellite.prn,
                gnssid: Some(satellite.gnss_id).filter(|_| satellite.sv_id != 0),
                svid: Some(satellite.sv_id).filter(|svid| *svid != 0),
                sigid: Some(satellite.sig_id).filter(|sigid| *sigid != 0),
                az: satellite.azimuth.filter(|az| (0.0..360.0).contains(az)),
                el: satellite.elevation.filter(|el| el.abs() <= 90.0),
                pr: satellite.pr,
                pr_res: satellite.pr_res,
                qual: satellite.quality,
                ss: satellite.ss,
                used: satellite.used,
            })
            .collect();

        if sky.satellites.is_empty() {
            if session.nmea.gga_sats_used > 0 {
                sky.u_sat = Some(session.nmea.gga_sats_used as usize);
            }
        } else {
            sky.n_sat = Some(sky.satellites.len());
            sky.u_sat = Some(sky.satellites.iter().filter(|s| s.used).count());
        }

        if session.dop.is_empty() && sky.n_sat.is_none() && sky.u_sat.is_none() {
            return None;
        }

        Some(sky)
    }
}

/// Pseudorange noise statistics.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename = "GST", tag = "class")]
pub struct Gst {
    pub device: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub major: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minor: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orient: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lon: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt: Option<f64>,
}

impl Gst {
    /// `None` when the receiver sent no noise statistics.
    pub fn new(session: &Session) -> Option<Self> {
        let gst = &session.gst;

        let report = Gst {
            device: obfuscate_uri(&session.path),
            time: time(&gst.utctime),
            rms: gst.rms_deviation,
            major: gst.smajor_deviation,
            minor: gst.sminor_deviation,
            orient: gst.smajor_orientation,
            lat: gst.lat_err_deviation,
            lon: gst.lon_err_deviation,
            alt: gst.alt_err_deviation,
        };

        let empty = Gst {
            device: report.device.clone(),
            time: report.time.clone(),
            ..Gst::default()
        };

        if report == empty {
            None
        } else {
            Some(report)
        }
    }
}

/// Attitude and environment.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename = "ATT", tag = "class")]
pub struct Att {
    pub device: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mag_st: Option<char>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mheading: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pitch: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pitch_st: Option<char>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yaw: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roll: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roll_st: Option<char>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rot: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dip: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mag_x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mag_y: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mag_z: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth: Option<f64>,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub base: Option<BaseReport>,
}

impl Att {
    pub fn new(path: &str, attitude: &Attitude) -> Self {
        Att {
            device: obfuscate_uri(path),
            time: time(&attitude.time),
            heading: attitude.heading,
            mag_st: attitude.mag_st.filter(|_| attitude.heading.is_some()),
            mheading: attitude.mheading,
            pitch: attitude.pitch,
            pitch_st: attitude.pitch_st.filter(|_| attitude.pitch.is_some()),
            yaw: attitude.yaw,
            roll: attitude.roll,
            roll_st: attitude.roll_st.filter(|_| attitude.roll.is_some()),
            rot: attitude.rot,
            dip: attitude.dip,
            mag_x: attitude.mag_x,
            mag_y: attitude.mag_y,
            mag_z: attitude.mag_z,
            temp: attitude.temp,
            depth: attitude.depth,
            base: BaseReport::new(&attitude.base),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename = "OSC", tag = "class")]
pub struct Osc {
    pub device: String,
    pub running: bool,
    pub reference: bool,
    pub disciplined: bool,
    pub delta: i64,
}

impl Osc {
    pub fn new(session: &Session) -> Self {
        let oscillator = &session.oscillator;

        Osc {
            device: obfuscate_uri(&session.path),
            running: oscillator.running,
            reference: oscillator.reference,
            disciplined: oscillator.disciplined,
            delta: oscillator.delta,
        }
    }
}

/// An RTCM3 message header, the body hex encoded.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename = "RTCM3", tag = "class")]
pub struct Rtcm3 {
    pub device: String,
    #[serde(rename = "type")]
    pub message_type: u16,
    pub length: usize,
    pub data: String,
}

impl Rtcm3 {
    /// `None` for runts.
    pub fn new(session: &Session) -> Option<Self> {
        let message = session.rtcm3.as_ref()?;

        if message.message_type == 0 || message.length == 0 {
            return None;
        }

        Some(Rtcm3 {
            device: obfuscate_uri(&session.path),
            message_type: message.message_type,
            length: message.length,
            data: hexdump(&message.data),
        })
    }
}

/// Lowercase hex, two digits a byte.
pub fn hexdump(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{:02x}", byte)).collect()
}

/// Offset between the receiver's time and the system clock.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename = "TOFF", tag = "class")]
pub struct Toff {
    pub device: String,
    pub real_sec: i64,
    pub real_nsec: u32,
    pub clock_sec: i64,
    pub clock_nsec: u32,
    pub precision: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shm: Option<String>,
}

impl Toff {
    pub fn new(timestamp: &Timestamp, unit: Option<i32>) -> Self {
        Toff {
            device: obfuscate_uri(&timestamp.device),
            real_sec: timestamp.real_sec,
            real_nsec: timestamp.real_nsec,
            clock_sec: timestamp.clock_sec,
            clock_nsec: timestamp.clock_nsec,
            precision: timestamp.precision,
            shm: unit.map(|unit| format!("NTP{}", unit)),
        }
    }
}

/// A PPS edge, the same shape as `TOFF`.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename = "PPS", tag = "class")]
pub struct Pps {
    pub device: String,
    pub real_sec: i64,
    pub real_nsec: u32,
    pub clock_sec: i64,
    pub clock_nsec: u32,
    pub precision: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shm: Option<String>,
}

impl Pps {
    pub fn new(timestamp: &Timestamp, unit: Option<i32>) -> Self {
        Pps {
            device: obfuscate_uri(&timestamp.device),
            real_sec: timestamp.real_sec,
            real_nsec: timestamp.real_nsec,
            clock_sec: timestamp.clock_sec,
            clock_nsec: timestamp.clock_nsec,
            precision: timestamp.precision,
            shm: unit.map(|unit| format!("NTP{}", unit)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename = "POLL", tag = "class")]
pub struct Poll {
    pub time: String,
    pub active: usize,
    pub tpv: Vec<Tpv>,
    pub gst: Vec<Gst>,
    pub sky: Vec<Sky>,
}

impl Poll {
    pub fn new(now: &DateTime<Utc>) -> Self {
        Poll {
            time: iso8601(now),
            active: 0,
            tpv: vec![],
            gst: vec![],
            sky: vec![],
        }
    }
}
