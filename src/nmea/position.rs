//! Position, velocity and time sentences.

use crate::gps::geoid::wgs84_separation;
use crate::gps::time::decode_hhmmss;
use crate::gps::time::utc_resolve;
use crate::gps::ChangedMask;
use crate::gps::Gst;
use crate::gps::Mode;
use crate::gps::Session;
use crate::gps::Status;
use crate::nmea::field;
use crate::nmea::Sentence;
use crate::nmea::KNOTS_TO_MPS;

use tracing::debug;
use tracing::trace;
use tracing::warn;

/// DOPs outside this range are vendor "invalid" markers.
pub(crate) fn valid_dop(dop: Option<f64>) -> Option<f64> {
    dop.filter(|d| (0.01..=89.99).contains(d))
}

fn gga_status(quality: i64) -> Option<Status> {
    match quality {
        0 => Some(Status::Unknown),
        1 => Some(Status::Gps),
        2 => Some(Status::Dgps),
        3 => Some(Status::PpsFix),
        4 => Some(Status::RtkFix),
        5 => Some(Status::RtkFloat),
        6 => Some(Status::DeadReckoning),
        // manual input, surveyed
        7 => Some(Status::Time),
        8 => Some(Status::Simulated),
        _ => None,
    }
}

/// Merge `hhmmss` from field `n` and register it as this sentence's epoch.  Returns
/// `TIME` when a year is known to go with it.
fn time_of_day(s: &Sentence<'_>, session: &mut Session, n: usize) -> ChangedMask {
    if s.is_empty(n) {
        return ChangedMask::empty();
    }

    match session.nmea.merge_hhmmss(s.field(n)) {
        Some(time) => {
            session.nmea.register_fractional_time(Some(time));

            if session.nmea.date.has_year() {
                ChangedMask::TIME
            } else {
                debug!("{} time unusable until a year is known", s.tag());
                ChangedMask::empty()
            }
        }
        None => ChangedMask::empty(),
    }
}

/// `$GPGGA`, Global Positioning System Fix Data.
pub fn gga(s: &Sentence<'_>, session: &mut Session) -> ChangedMask {
    let mut mask = ChangedMask::ONLINE;

    let talker = s.talker();
    let last_last = session.nmea.last_gga_talker;
    session.nmea.last_gga_talker = talker;

    let quality = s.int(6).unwrap_or(-1);

    if quality == 0 && s.is_empty(1) {
        // no time and no fix, force a report so the cycle does not starve
        session.nmea.date.clear();
        session.cycle_end_reliable = false;
        mask |= ChangedMask::REPORT | ChangedMask::TIME;
    }

    if let Some(status) = gga_status(quality) {
        session.newdata.status = status;
        mask |= ChangedMask::STATUS;
    }

    // some receivers keep repeating the last GGA after losing lock
    session.nmea.latch_mode = if last_last.is_some() && last_last != talker {
        false
    } else {
        !s.is_empty(1) && s.field(1) == session.nmea.last_gga_timestamp
    };

    let latched = session.nmea.latch_mode;

    if latched {
        session.newdata.status = Status::Unknown;
        session.newdata.mode = Mode::NoFix;
        mask |= ChangedMask::MODE | ChangedMask::STATUS;

        debug!("{} latch mode, timestamp {} repeated", s.tag(), s.field(1));
    } else {
        session.nmea.last_gga_timestamp = s.field(1).to_string();
    }

    let sats_used = s.atoi(7);
    session.nmea.gga_sats_used = sats_used;

    mask |= time_of_day(s, session, 1);

    let mut mode = Mode::NoFix;

    if let Some((latitude, longitude)) = s.lat_lon(2) {
        let newdata = &mut session.newdata;

        newdata.latitude = Some(latitude);
        newdata.longitude = Some(longitude);
        mask |= ChangedMask::LATLON;
        mode = Mode::Fix2D;

        newdata.geoid_sep = s
            .float(11)
            .or_else(|| Some(wgs84_separation(latitude, longitude)));

        // MSL, the error model fills in HAE
        if let Some(alt_msl) = s.float(9) {
            newdata.alt_msl = Some(alt_msl);
            mask |= ChangedMask::ALTITUDE;

            if sats_used >= 4 {
                mode = Mode::Fix3D;
            }
        }

        if sats_used < 3 {
            mode = Mode::NoFix;
        }
    }

    if !latched {
        session.newdata.mode = mode;
    }

    mask |= ChangedMask::MODE;

    if let Some(hdop) = valid_dop(s.float(8)) {
        session.dop.hdop = Some(hdop);
        mask |= ChangedMask::DOP;
    }

    if !s.is_empty(13) && !s.is_empty(14) {
        let age = s.float(13).unwrap_or(0.0);
        let station = s.atoi(14);

        // some receivers send 0 age and 0 station without DGPS
        if age > 0.09 || station > 0 {
            session.newdata.dgps_age = Some(age);
            session.newdata.dgps_station = Some(station as i32);
        }
    }

    mask
}

/// `$GPRMC`, Recommended Minimum Specific GNSS Data.
pub fn rmc(s: &Sentence<'_>, session: &mut Session) -> ChangedMask {
    let mut mask = ChangedMask::ONLINE;

    match s.char(2) {
        Some('A') => {
            if !s.is_empty(1) && s.count() > 9 && !s.is_empty(9) {
                let context = &mut session.context;

                if session.nmea.merge_time_and_date(context, s.field(1), s.field(9)) {
                    mask |= ChangedMask::TIME;
                }
            }

            match s.lat_lon(3) {
                Some((latitude, longitude)) => {
                    let newdata = &mut session.newdata;

                    newdata.latitude = Some(latitude);
                    newdata.longitude = Some(longitude);
                    newdata.status = Status::Gps;
                    mask |= ChangedMask::LATLON;

                    newdata.mode = if session.lastfix.mode == Mode::Fix3D {
                        Mode::Fix3D
                    } else {
                        Mode::Fix2D
                    };

                    if session.satellites_used > 3 || session.fix.has_altitude() {
                        newdata.mode = Mode::Fix3D;
                    }
                }
                None => {
                    session.newdata.status = Status::Unknown;
                    session.newdata.mode = Mode::NoFix;
                }
            }

            if let Some(speed) = s.float(7) {
                session.newdata.speed = Some(speed * KNOTS_TO_MPS);
                mask |= ChangedMask::SPEED;
            }

            if let Some(track) = s.float(8) {
                session.newdata.track = Some(track);
                mask |= ChangedMask::TRACK;
            }

            if !s.is_empty(10) && !s.is_empty(11) {
                // 0.0 means "not computed" on several receivers
                let variation = field::east_west_value(s.field(10), s.field(11))
                    .filter(|v| v.abs() > 0.09);

                session.newdata.magnetic_var = variation;

                if variation.is_some() {
                    mask |= ChangedMask::MAGNETIC_TRACK;
                }
            }

            if s.count() > 12 && !s.is_empty(12) {
                session.newdata.status = Status::from_faa(s.field(12));
            }
        }
        _ => {
            session.newdata.mode = Mode::NoFix;

            if s.is_empty(1) || s.is_empty(9) {
                session.nmea.date.clear();
                session.cycle_end_reliable = false;
                mask |= ChangedMask::REPORT | ChangedMask::TIME;
            }
        }
    }

    mask | ChangedMask::STATUS | ChangedMask::MODE
}

/// `$GPGLL`, Geographic Position, latitude and longitude.
pub fn gll(s: &Sentence<'_>, session: &mut Session) -> ChangedMask {
    let mut mask = ChangedMask::ONLINE;

    let time = time_of_day(s, session, 5);

    if !time.is_empty() {
        mask = time;
    }

    let not_valid = s.count() >= 8 && s.char(7) == Some('N');

    let position = match s.char(6) {
        Some('A') if !not_valid => s.lat_lon(1),
        _ => None,
    };

    match position {
        Some((latitude, longitude)) => {
            let newdata = &mut session.newdata;

            newdata.latitude = Some(latitude);
            newdata.longitude = Some(longitude);
            mask |= ChangedMask::LATLON;

            newdata.status = if s.count() >= 8 {
                Status::from_faa(s.field(7))
            } else {
                Status::Gps
            };

            newdata.mode = if session.fix.has_altitude() || session.satellites_used > 3 {
                Mode::Fix3D
            } else if session.fix.mode < Mode::Fix2D || !session.oldfix.has_altitude() {
                Mode::Fix2D
            } else {
                session.fix.mode
            };
        }
        None => {
            session.newdata.status = Status::Unknown;
            session.newdata.mode = Mode::NoFix;
        }
    }

    mask | ChangedMask::STATUS | ChangedMask::MODE
}

/// `$GNGNS`, GNSS fix data.
pub fn gns(s: &Sentence<'_>, session: &mut Session) -> ChangedMask {
    let mut mask = ChangedMask::ONLINE;

    let time = time_of_day(s, session, 1);

    if !time.is_empty() {
        mask = time;
    }

    // only the first constellation's mode is used
    let faa = s.char(6);

    if faa.is_none() || faa == Some('N') {
        session.newdata.mode = Mode::NoFix;
        return mask | ChangedMask::MODE;
    }

    // NMEA 4.1 navigational status, unsafe or not valid
    if matches!(s.char(13), Some('U') | Some('V')) {
        return mask;
    }

    let sats_used = s.atoi(7);
    session.nmea.gga_sats_used = sats_used;

    match s.lat_lon(2) {
        Some((latitude, longitude)) => {
            let newdata = &mut session.newdata;

            newdata.latitude = Some(latitude);
            newdata.longitude = Some(longitude);
            newdata.mode = Mode::Fix2D;
            mask |= ChangedMask::LATLON;

            if let Some(alt_msl) = s.float(9) {
                newdata.alt_msl = Some(alt_msl);
                mask |= ChangedMask::ALTITUDE;

                if sats_used > 3 {
                    newdata.mode = Mode::Fix3D;
                }
            }

            if let Some(geoid_sep) = s.float(10) {
                newdata.geoid_sep = Some(geoid_sep);
            }
        }
        None => {
            session.newdata.mode = Mode::NoFix;
            mask |= ChangedMask::MODE;
        }
    }

    if let Some(hdop) = s.float(8) {
        session.dop.hdop = Some(hdop);
        mask |= ChangedMask::DOP;
    }

    session.newdata.status = Status::from_faa(s.field(6));
    mask |= ChangedMask::MODE | ChangedMask::STATUS;

    if !s.is_empty(11) && !s.is_empty(12) {
        session.newdata.dgps_age = s.float(11);
        session.newdata.dgps_station = Some(s.atoi(12) as i32);
    }

    mask
}

/// `$GPVTG`, Course Over Ground and Ground Speed.
pub fn vtg(s: &Sentence<'_>, session: &mut Session) -> ChangedMask {
    if s.is_empty(1) || s.is_empty(5) {
        return ChangedMask::ONLINE;
    }

    // estimated or not valid
    if s.count() > 9 && matches!(s.char(9), Some('E') | Some('N')) {
        return ChangedMask::ONLINE;
    }

    let mut mask = ChangedMask::ONLINE;

    if let Some(track) = s.float(1) {
        session.newdata.track = Some(track);
        mask |= ChangedMask::TRACK;
    }

    if let Some(magnetic_track) = s.float(3) {
        session.newdata.magnetic_track = Some(magnetic_track);
        mask |= ChangedMask::MAGNETIC_TRACK;
    }

    if let Some(speed) = s.float(5) {
        session.newdata.speed = Some(speed * KNOTS_TO_MPS);
        mask |= ChangedMask::SPEED;
    }

    mask
}

/// `$GPZDA`, Time and Date, the authoritative century.
pub fn zda(s: &Sentence<'_>, session: &mut Session) -> ChangedMask {
    if (1..=4).any(|n| s.is_empty(n)) {
        warn!("ZDA fields are empty");
        return ChangedMask::ONLINE;
    }

    let time = match session.nmea.merge_hhmmss(s.field(1)) {
        Some(time) => time,
        None => return ChangedMask::ONLINE,
    };

    let year = s.atoi(4) as i32;
    let month = s.atoi(3);
    let day = s.atoi(2);

    if !(1900..=2200).contains(&year) {
        warn!("malformed ZDA year {}", s.field(4));
        return ChangedMask::ONLINE;
    }

    if !(1..=12).contains(&month) {
        warn!("malformed ZDA month {}", s.field(3));
        return ChangedMask::ONLINE;
    }

    if !(1..=31).contains(&day) {
        warn!("malformed ZDA day {}", s.field(2));
        return ChangedMask::ONLINE;
    }

    session.context.century_update(year - year % 100);
    session.nmea.date.merge_date(year, month as u32, day as u32);
    session.nmea.register_fractional_time(Some(time));

    ChangedMask::TIME
}

/// `$GPGBS`, GNSS Satellite Fault Detection.
pub fn gbs(s: &Sentence<'_>, session: &mut Session) -> ChangedMask {
    let time = match decode_hhmmss(s.field(1)) {
        Some(time) => time,
        None => return ChangedMask::ONLINE,
    };

    session.nmea.register_fractional_time(Some(time));

    let date = &session.nmea.date;

    // the errors belong to the fix with the same time
    if date.hour != time.hour || date.minute != time.minute || date.second != time.second {
        trace!("GBS time {} does not match the current fix", s.field(1));
        return ChangedMask::ONLINE;
    }

    let newdata = &mut session.newdata;

    newdata.epy = s.float(2);
    newdata.epx = s.float(3);
    newdata.epv = s.float(4);

    ChangedMask::HERR | ChangedMask::VERR
}

/// `$GPGST`, GNSS Pseudorange Noise Statistics.
///
/// The time is that of the matching GGA, not a new epoch, so it is not registered.
pub fn gst(s: &Sentence<'_>, session: &mut Session) -> ChangedMask {
    let mut gst = Gst::default();

    if session.nmea.date.has_year() {
        if let Some(time) = decode_hhmmss(s.field(1)) {
            let mut date = session.nmea.date;

            date.merge_hhmmss(time);
            gst.utctime = utc_resolve(&session.context, &mut date);
        }
    }

    gst.rms_deviation = s.float(2);
    gst.smajor_deviation = s.float(3);
    gst.sminor_deviation = s.float(4);
    gst.smajor_orientation = s.float(5);
    gst.lat_err_deviation = s.float(6);
    gst.lon_err_deviation = s.float(7);
    gst.alt_err_deviation = s.float(8);

    session.gst = gst;

    ChangedMask::GST | ChangedMask::ONLINE
}
