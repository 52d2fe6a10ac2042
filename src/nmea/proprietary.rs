//! Vendor sentences: Garmin, Magellan, MediaTek, SiRF, Skytraq, Ashtech and True North.

use crate::gps::gnss;
use crate::gps::time::gpstime_resolve;
use crate::gps::time::utc_resolve;
use crate::gps::ChangedMask;
use crate::gps::Driver;
use crate::gps::Mode;
use crate::gps::Satellite;
use crate::gps::Session;
use crate::gps::Status;
use crate::gps::CEP50_SIGMA;
use crate::gps::GPSD_CONFIDENCE;
use crate::nmea::nautical::SKYTRAQ_PROBE;
use crate::nmea::nmeaid_to_prn;
use crate::nmea::Sentence;

use tracing::debug;
use tracing::info;
use tracing::warn;

fn starts_with_digit(field: &str) -> bool {
    field.chars().next().map(|c| c.is_ascii_digit()).unwrap_or(false)
}

/// Time in field `hhmmss` and date in field `ddmmyy`, both required.  Registers the epoch.
fn time_and_date(s: &Sentence<'_>, session: &mut Session, hhmmss: usize, ddmmyy: usize) -> ChangedMask {
    if s.is_empty(hhmmss) || s.is_empty(ddmmyy) {
        return ChangedMask::empty();
    }

    let context = &mut session.context;

    if session
        .nmea
        .merge_time_and_date(context, s.field(hhmmss), s.field(ddmmyy))
    {
        ChangedMask::TIME
    } else {
        ChangedMask::empty()
    }
}

/// `$PGRME`, Garmin estimated error, scaled from CEP50 to our confidence.
pub fn pgrme(s: &Sentence<'_>, session: &mut Session) -> ChangedMask {
    if s.char(2) != Some('M') || s.char(4) != Some('M') || s.char(6) != Some('M') {
        return ChangedMask::ONLINE;
    }

    let scale = GPSD_CONFIDENCE / CEP50_SIGMA;
    let newdata = &mut session.newdata;

    let horizontal = s.float(1).map(|e| e * std::f64::consts::FRAC_1_SQRT_2 * scale);

    newdata.epx = horizontal;
    newdata.epy = horizontal;
    newdata.epv = s.float(3).map(|e| e * scale);
    newdata.sep = s.float(5).map(|e| e * scale);

    ChangedMask::HERR | ChangedMask::VERR
}

/// `$PGRMF`, Garmin GPS fix data with GPS week and leap seconds.
pub fn pgrmf(s: &Sentence<'_>, session: &mut Session) -> ChangedMask {
    let mut mask = ChangedMask::ONLINE;

    if starts_with_digit(s.field(5)) {
        session.context.set_leap_seconds(s.atoi(5) as i32);
    }

    if starts_with_digit(s.field(1)) && starts_with_digit(s.field(2)) && session.context.leap_seconds > 0 {
        let week = s.atoi(1) as u32;
        let tow = s.atoi(2) as f64;

        session.newdata.time = gpstime_resolve(&mut session.context, week, tow);
        mask |= ChangedMask::TIME;
    } else if session.nmea.merge_hhmmss(s.field(4)).is_some() {
        let context = &mut session.context;

        if session.nmea.merge_ddmmyy(context, s.field(3)) {
            mask |= ChangedMask::TIME;
        }
    }

    if s.char(10) != Some('A') {
        return mask;
    }

    if let Some((latitude, longitude)) = s.lat_lon(6) {
        session.newdata.latitude = Some(latitude);
        session.newdata.longitude = Some(longitude);
        mask |= ChangedMask::LATLON;
    }

    let mode = match s.char(11) {
        Some('0') => Some(Mode::NoFix),
        Some('1') => Some(Mode::Fix2D),
        Some('2') => Some(Mode::Fix3D),
        _ => None,
    };

    if let Some(mode) = mode {
        session.newdata.mode = mode;
        mask |= ChangedMask::MODE;
    }

    // km/h
    session.newdata.speed = s.float(12).map(|kph| kph / 3.6);
    session.newdata.track = s.float(13);
    mask |= ChangedMask::SPEED | ChangedMask::TRACK;

    if let Some(pdop) = s.float(14) {
        session.dop.pdop = Some(pdop);
        mask |= ChangedMask::DOP;
    }

    if let Some(tdop) = s.float(15) {
        session.dop.tdop = Some(tdop);
        mask |= ChangedMask::DOP;
    }

    mask
}

/// `$PGRMM`, Garmin map datum.
pub fn pgrmm(s: &Sentence<'_>, session: &mut Session) -> ChangedMask {
    if !s.is_empty(1) {
        session.newdata.datum = Some(s.field(1).to_string());
    }

    ChangedMask::ONLINE
}

/// `$PGRMT`, Garmin sensor status, carries the product name.
pub fn pgrmt(s: &Sentence<'_>, session: &mut Session) -> ChangedMask {
    session.subtype = s.field(1).to_string();

    ChangedMask::ONLINE
}

/// `$PGRMV`, Garmin 3D velocity.
pub fn pgrmv(s: &Sentence<'_>, session: &mut Session) -> ChangedMask {
    match (s.float(1), s.float(2), s.float(3)) {
        (Some(east), Some(north), Some(up)) => {
            let ned = &mut session.newdata.ned;

            ned.vel_e = Some(east);
            ned.vel_n = Some(north);
            ned.vel_d = Some(-up);

            ChangedMask::ONLINE | ChangedMask::VNED
        }
        _ => ChangedMask::ONLINE,
    }
}

/// `$PGRMZ`, Garmin altitude in feet.
pub fn pgrmz(s: &Sentence<'_>, session: &mut Session) -> ChangedMask {
    let mut mask = ChangedMask::ONLINE;

    if s.char(2) == Some('f') && !s.is_empty(1) {
        session.newdata.alt_msl = Some(s.atoi(1) as f64 * crate::nmea::FEET_TO_METERS);
        mask |= ChangedMask::ALTITUDE;
    }

    let mode = match s.char(3) {
        Some('1') => Some(Mode::NoFix),
        Some('2') => Some(Mode::Fix2D),
        Some('3') => Some(Mode::Fix3D),
        _ => None,
    };

    if let Some(mode) = mode {
        session.newdata.mode = mode;
        mask |= ChangedMask::MODE;
    }

    mask
}

/// `$PMGNST`, Magellan status.
pub fn pmgnst(s: &Sentence<'_>, session: &mut Session) -> ChangedMask {
    session.newdata.mode = if s.char(4) == Some('T') {
        match s.atoi(3) {
            2 => Mode::Fix2D,
            3 => Mode::Fix3D,
            _ => Mode::NoFix,
        }
    } else {
        Mode::NoFix
    };

    ChangedMask::ONLINE | ChangedMask::MODE
}

/// `$PMTK001`, MediaTek command acknowledgement.
pub fn pmtk001(s: &Sentence<'_>, _session: &mut Session) -> ChangedMask {
    let reason = match s.atoi(2) {
        3 => {
            debug!("MTK ACK: {}", s.field(1));
            return ChangedMask::ONLINE;
        }
        0 => "invalid",
        1 => "unsupported",
        2 => "valid but failed",
        _ => "unknown",
    };

    warn!("MTK NACK: {}, reason: {}", s.field(1), reason);

    ChangedMask::ONLINE
}

/// `$PMTK424`, MediaTek PPS settings.  Narrow pulses are widened to something a kernel sees.
pub fn pmtk424(s: &Sentence<'_>, session: &mut Session) -> ChangedMask {
    if s.atoi(5) < 127_875 {
        session.queue_nmea("$PMTK324,0,0,1,0,127875");
    }

    ChangedMask::ONLINE
}

/// `$PMTK705`, MediaTek firmware release.
pub fn pmtk705(s: &Sentence<'_>, session: &mut Session) -> ChangedMask {
    session.subtype = if s.count() == 4 {
        format!("{},{},{}", s.field(1), s.field(2), s.field(3))
    } else {
        format!("{},{},{},{}", s.field(1), s.field(2), s.field(3), s.field(4))
    };

    // Quectel answers this with its own version
    if session.subtype1.is_empty() && !session.nmea.version_queried {
        session.nmea.version_queried = true;
        session.queue_nmea("$PQVERNO,R");
    }

    info!("MTK firmware {}", session.subtype);

    ChangedMask::ONLINE
}

/// `$PSRFEPE`, SiRF estimated position errors.
pub fn psrfepe(s: &Sentence<'_>, session: &mut Session) -> ChangedMask {
    let mut mask = ChangedMask::STATUS;

    if let Some(time) = session.nmea.merge_hhmmss(s.field(1)) {
        session.nmea.register_fractional_time(Some(time));

        if session.nmea.date.has_year() {
            mask |= ChangedMask::TIME;
        }
    }

    if s.char(2) != Some('A') {
        return mask;
    }

    if let Some(hdop) = s.float(3) {
        session.dop.hdop = Some(hdop);
        mask |= ChangedMask::DOP;
    }

    let newdata = &mut session.newdata;

    if let Some(eph) = s.float(4) {
        newdata.eph = Some(eph);
        mask |= ChangedMask::HERR;
    }

    if let Some(epv) = s.float(5) {
        newdata.epv = Some(epv);
        mask |= ChangedMask::VERR;
    }

    newdata.eps = s.float(6);
    newdata.epd = s.float(7);

    mask
}

fn probe_skytraq(session: &mut Session) {
    if session.driver != Driver::Skytraq {
        session.queue_bytes(SKYTRAQ_PROBE);
    }
}

/// `$PSTI,030`, Skytraq recommended minimum 3D GNSS data.
pub fn psti030(s: &Sentence<'_>, session: &mut Session) -> ChangedMask {
    let mut mask = ChangedMask::ONLINE;

    probe_skytraq(session);

    if s.char(3) == Some('V') || s.char(13) == Some('N') {
        session.newdata.status = Status::Unknown;
        session.newdata.mode = Mode::NoFix;
        return mask | ChangedMask::MODE | ChangedMask::STATUS;
    }

    if s.char(3) != Some('A') {
        return mask;
    }

    mask |= time_and_date(s, session, 2, 12);

    let newdata = &mut session.newdata;

    if let Some((latitude, longitude)) = s.lat_lon(4) {
        newdata.latitude = Some(latitude);
        newdata.longitude = Some(longitude);
        newdata.mode = Mode::Fix2D;
        mask |= ChangedMask::LATLON;

        if let Some(alt_msl) = s.float(8) {
            newdata.alt_msl = Some(alt_msl);
            newdata.mode = Mode::Fix3D;
            mask |= ChangedMask::ALTITUDE;
        }

        mask |= ChangedMask::MODE;
    }

    newdata.ned.vel_e = s.float(9);
    newdata.ned.vel_n = s.float(10);
    newdata.ned.vel_d = s.float(11).map(|up| -up);

    let age = s.float(14).unwrap_or(0.0);
    let ratio = s.float(15).unwrap_or(0.0);

    if age + ratio > 0.05 {
        newdata.dgps_age = Some(age);
        newdata.base.ratio = Some(ratio);
    }

    newdata.status = Status::from_faa(s.field(13));

    if matches!(newdata.status, Status::RtkFix | Status::RtkFloat) {
        newdata.base.status = newdata.status;
    }

    mask | ChangedMask::VNED | ChangedMask::STATUS
}

/// `$PSTI,032`, Skytraq RTK baseline.
pub fn psti032(s: &Sentence<'_>, session: &mut Session) -> ChangedMask {
    if s.char(4) != Some('A') {
        return ChangedMask::ONLINE;
    }

    let mask = ChangedMask::ONLINE | time_and_date(s, session, 2, 3);

    let base = &mut session.newdata.base;

    base.status = match s.char(5) {
        Some('F') | Some('O') => Status::RtkFloat,
        Some('R') => Status::RtkFix,
        _ => return mask,
    };

    base.east = s.float(6);
    base.north = s.float(7);
    base.up = s.float(8);
    base.length = s.float(9);
    base.course = s.float(10);

    mask
}

/// `$PSTI,033`, Skytraq RTK raw measurement monitoring, cycle slips are logged.
pub fn psti033(s: &Sentence<'_>, session: &mut Session) -> ChangedMask {
    if s.char(4) != Some('2') || !matches!(s.char(5), Some('B') | Some('R')) {
        return ChangedMask::ONLINE;
    }

    let mask = ChangedMask::ONLINE | time_and_date(s, session, 2, 3);

    debug!(
        "Skytraq RTK receiver {} slips: total {} L1 {} L2 {} B1 {} B2 {} E1 {} E5b {} G1 {} G2 {}",
        s.field(5),
        s.atoi(6),
        s.atoi(7),
        s.atoi(8),
        s.atoi(13),
        s.atoi(14),
        s.atoi(18),
        s.atoi(19),
        s.atoi(23),
        s.atoi(24)
    );

    mask
}

/// `$PSTI,035`, Skytraq RTK baseline to a moving base.
pub fn psti035(s: &Sentence<'_>, session: &mut Session) -> ChangedMask {
    let mut mask = ChangedMask::ONLINE | time_and_date(s, session, 2, 3);

    let base = &mut session.attitude.base;

    if s.char(4) != Some('A') {
        base.status = Status::Unknown;
        return mask;
    }

    match s.char(5) {
        Some('F') => base.status = Status::RtkFloat,
        Some('R') => base.status = Status::RtkFix,
        _ => {}
    }

    base.east = s.float(6);
    base.north = s.float(7);
    base.up = s.float(8);
    base.length = s.float(9);
    base.course = s.float(10);
    mask |= ChangedMask::ATTITUDE;

    mask
}

/// `$PSTI,036`, Skytraq heading, pitch and roll.
pub fn psti036(s: &Sentence<'_>, session: &mut Session) -> ChangedMask {
    let mask = ChangedMask::ONLINE | time_and_date(s, session, 2, 3);

    if s.is_empty(7) || s.char(7) == Some('N') {
        return mask;
    }

    let mut date = session.nmea.date;
    let attitude = &mut session.attitude;

    attitude.time = utc_resolve(&session.context, &mut date);
    attitude.heading = s.float(4);
    attitude.pitch = s.float(5);
    attitude.roll = s.float(6);

    mask | ChangedMask::ATTITUDE
}

/// `$PASHR`, Ashtech, several sentences selected by field 1, or an OxTS attitude report.
pub fn pashr(s: &Sentence<'_>, session: &mut Session) -> ChangedMask {
    match s.field(1) {
        "ACK" | "MCA" | "NAK" | "PBN" => ChangedMask::ONLINE,
        "POS" => pashr_pos(s, session),
        "RID" => {
            session.subtype = format!("{} ver {}", s.field(2), s.field(3));
            info!("Ashtech receiver {}", session.subtype);

            ChangedMask::ONLINE
        }
        "SAT" => pashr_sat(s, session),
        _ if s.field(3) == "T" => {
            // OxTS, the time is merged but not published
            session.nmea.merge_hhmmss(s.field(1));

            let attitude = &mut session.attitude;

            attitude.heading = s.float(2);
            attitude.roll = s.float(4);
            attitude.pitch = s.float(5);

            ChangedMask::ONLINE
        }
        _ => ChangedMask::ONLINE,
    }
}

fn pashr_pos(s: &Sentence<'_>, session: &mut Session) -> ChangedMask {
    let mut mask = ChangedMask::ONLINE | ChangedMask::MODE | ChangedMask::STATUS | ChangedMask::CLEAR;

    if s.is_empty(2) {
        session.newdata.status = Status::Unknown;
        session.newdata.mode = Mode::NoFix;
        return mask;
    }

    session.newdata.mode = Mode::Fix3D;
    session.newdata.status = if s.atoi(2) >= 1 {
        Status::Dgps
    } else {
        Status::Gps
    };

    session.nmea.gga_sats_used = s.atoi(3);

    if let Some(time) = session.nmea.merge_hhmmss(s.field(4)) {
        session.nmea.register_fractional_time(Some(time));
        mask |= ChangedMask::TIME;
    }

    let newdata = &mut session.newdata;

    if let Some((latitude, longitude)) = s.lat_lon(5) {
        newdata.latitude = Some(latitude);
        newdata.longitude = Some(longitude);
        mask |= ChangedMask::LATLON;

        if let Some(alt_hae) = s.float(9) {
            newdata.alt_hae = Some(alt_hae);
            mask |= ChangedMask::ALTITUDE;
        }
    }

    newdata.track = s.float(11);
    newdata.speed = s.float(12).map(|kph| kph / 3.6);
    newdata.climb = s.float(13);
    mask |= ChangedMask::SPEED | ChangedMask::TRACK | ChangedMask::CLIMB;

    let dop = &mut session.dop;

    for (n, value) in [
        (14, &mut dop.pdop),
        (15, &mut dop.hdop),
        (16, &mut dop.vdop),
        (17, &mut dop.tdop),
    ] {
        if let Some(v) = s.float(n) {
            *value = Some(v);
            mask |= ChangedMask::DOP;
        }
    }

    mask
}

fn pashr_sat(s: &Sentence<'_>, session: &mut Session) -> ChangedMask {
    let visible = s.atoi(2).max(0) as usize;

    session.skyview.clear();

    for i in 0..visible {
        if session.skyview.is_full() {
            break;
        }

        let n = 3 + i * 5;
        let id = nmeaid_to_prn(s.tag(), s.atoi(n) as i32, 0);

        session.skyview.satellites.push(Satellite {
            prn: s.atoi(n) as i16,
            gnss_id: if id.prn > 0 { id.gnss_id } else { gnss::GPS },
            sv_id: id.sv_id,
            azimuth: Some(s.atoi(n + 1) as f64),
            elevation: Some(s.atoi(n + 2) as f64),
            ss: s.float(n + 3),
            used: s.char(n + 4) == Some('U'),
            ..Satellite::default()
        });
    }

    session.satellites_used = session.skyview.used();

    ChangedMask::ONLINE | ChangedMask::SATELLITE | ChangedMask::USED
}

/// `$PTNTA`, True North GPSDO status.
pub fn ptnta(s: &Sentence<'_>, session: &mut Session) -> ChangedMask {
    if s.field(3) != "T4" {
        return ChangedMask::ONLINE;
    }

    let quality = s.atoi(2);
    let delta = s.atoi(4);
    let fine = s.atoi(5);
    let status = s.atoi(6);

    let oscillator = &mut session.oscillator;

    oscillator.running = quality > 0;
    oscillator.reference = matches!(s.char(4), Some(c) if c != '?');

    oscillator.delta = if !oscillator.reference {
        0
    } else if delta < 500 {
        fine
    } else if delta < 500_000_000 {
        delta
    } else {
        1_000_000_000 - delta
    };

    oscillator.disciplined = quality == 2 && status == 3;

    ChangedMask::ONLINE | ChangedMask::OSCILLATOR
}

/// `$PTNTHTM`, True North heading, pitch and roll with magnetometer status.
pub fn ptnthtm(s: &Sentence<'_>, session: &mut Session) -> ChangedMask {
    let attitude = &mut session.attitude;

    attitude.heading = s.float(1);
    attitude.mag_st = s.char(2);
    attitude.pitch = s.float(3);
    attitude.pitch_st = s.char(4);
    attitude.roll = s.float(5);
    attitude.roll_st = s.char(6);
    attitude.dip = s.float(7);
    attitude.mag_x = s.float(8);

    ChangedMask::ONLINE | ChangedMask::ATTITUDE
}
