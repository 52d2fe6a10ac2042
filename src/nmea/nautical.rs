//! Marine instrument sentences: depth, heading, wind, water and transducers.

use crate::gps::ChangedMask;
use crate::gps::Driver;
use crate::gps::Session;
use crate::nmea::field;
use crate::nmea::Sentence;
use crate::nmea::FATHOMS_TO_METERS;
use crate::nmea::FEET_TO_METERS;
use crate::nmea::KNOTS_TO_MPS;

use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

/// Skytraq query software version, answered with a binary message that identifies the chip.
pub(crate) const SKYTRAQ_PROBE: &[u8] = b"\xA0\xA1\x00\x02\x02\x01\x03\x0D\x0A";

fn heading(s: &Sentence<'_>, n: usize) -> Option<f64> {
    s.float(n).filter(|h| (0.0..=360.0).contains(h))
}

/// `$SDDBT`, Depth Below Transducer, in whichever unit is present.
pub fn dbt(s: &Sentence<'_>, session: &mut Session) -> ChangedMask {
    let depth = s
        .float(3)
        .or_else(|| s.float(1).map(|feet| feet * FEET_TO_METERS))
        .or_else(|| s.float(5).map(|fathoms| fathoms * FATHOMS_TO_METERS));

    match depth {
        Some(depth) => {
            session.newdata.depth = Some(depth);
            ChangedMask::ONLINE | ChangedMask::ALTITUDE
        }
        None => ChangedMask::ONLINE,
    }
}

/// `$SDDPT`, Depth of Water.
pub fn dpt(s: &Sentence<'_>, session: &mut Session) -> ChangedMask {
    let mut depth = match s.float(1) {
        Some(depth) => depth,
        None => return ChangedMask::ONLINE,
    };

    // a negative offset is transducer to keel
    let offset = s.float(2).unwrap_or(0.0);

    if offset < 0.0 {
        depth -= offset;
    }

    session.newdata.depth = Some(depth);

    ChangedMask::ONLINE | ChangedMask::ALTITUDE
}

/// `$GPDTM`, Datum Reference.
pub fn dtm(s: &Sentence<'_>, session: &mut Session) -> ChangedMask {
    let code = s.field(1);

    if code.is_empty() {
        return ChangedMask::ONLINE;
    }

    let datum = match code {
        "W84" => "WGS84",
        "W72" => "WGS72",
        "S85" => "SGS85",
        "P90" => "PE90",
        "999" => "User Defined",
        other => other,
    };

    session.newdata.datum = Some(datum.to_string());

    ChangedMask::ONLINE
}

/// `$HCHDG`, Heading, Deviation and Variation.
pub fn hdg(s: &Sentence<'_>, session: &mut Session) -> ChangedMask {
    let mut mask = ChangedMask::ONLINE;

    let mut sensor = match heading(s, 1) {
        Some(sensor) => sensor,
        None => return mask,
    };

    if !s.is_empty(2) {
        let deviation = match heading(s, 2) {
            Some(deviation) => deviation,
            None => return mask,
        };

        match s.char(3) {
            Some('E') => sensor += deviation,
            Some('W') => sensor -= deviation,
            _ => {}
        }
    }

    session.newdata.magnetic_track = Some(sensor.rem_euclid(360.0));
    mask |= ChangedMask::MAGNETIC_TRACK;

    if !s.is_empty(4) && !s.is_empty(5) {
        session.newdata.magnetic_var = field::east_west_value(s.field(4), s.field(5));
    }

    mask
}

/// `$HCHDM`, Heading, Magnetic.
pub fn hdm(s: &Sentence<'_>, session: &mut Session) -> ChangedMask {
    match s.float(1) {
        Some(mheading) => {
            session.attitude.mheading = Some(mheading);
            ChangedMask::ONLINE | ChangedMask::ATTITUDE
        }
        None => ChangedMask::ONLINE,
    }
}

/// `$HEHDT`, Heading, True.
pub fn hdt(s: &Sentence<'_>, session: &mut Session) -> ChangedMask {
    match heading(s, 1) {
        Some(heading) => {
            session.attitude.heading = Some(heading);
            ChangedMask::ONLINE | ChangedMask::ATTITUDE
        }
        None => ChangedMask::ONLINE,
    }
}

/// `$YXMTW`, Mean Temperature of Water, Celsius only.
pub fn mtw(s: &Sentence<'_>, session: &mut Session) -> ChangedMask {
    if s.char(2) == Some('C') {
        session.newdata.wtemp = s.float(1);
    }

    ChangedMask::ONLINE
}

/// `$WIMWD`, Wind Direction and Speed, true.
pub fn mwd(s: &Sentence<'_>, session: &mut Session) -> ChangedMask {
    let newdata = &mut session.newdata;

    newdata.wanglet = s.float(1);
    newdata.wanglem = s.float(3);
    newdata.wspeedt = s.float(7);

    ChangedMask::ONLINE | ChangedMask::NAVDATA
}

/// `$WIMWV`, Wind Speed and Angle.  Only relative wind in knots is used.
pub fn mwv(s: &Sentence<'_>, session: &mut Session) -> ChangedMask {
    if s.char(2) != Some('R') || s.char(4) != Some('N') || s.char(5) != Some('A') {
        return ChangedMask::ONLINE;
    }

    session.newdata.wangler = s.float(1);
    session.newdata.wspeedr = s.float(3).map(|knots| knots * KNOTS_TO_MPS);

    ChangedMask::ONLINE | ChangedMask::NAVDATA
}

/// `$HEROT`, Rate of Turn, degrees per minute.
pub fn rot(s: &Sentence<'_>, session: &mut Session) -> ChangedMask {
    match (s.float(1), s.char(2)) {
        (Some(rot), Some('A')) => {
            session.attitude.rot = Some(rot);
            ChangedMask::ONLINE | ChangedMask::ATTITUDE
        }
        _ => ChangedMask::ONLINE,
    }
}

/// `$GNTHS`, True Heading and Status.
pub fn ths(s: &Sentence<'_>, session: &mut Session) -> ChangedMask {
    if s.is_empty(1) || s.is_empty(2) || s.char(2) == Some('V') {
        return ChangedMask::ONLINE;
    }

    match heading(s, 1) {
        Some(heading) => {
            session.attitude.heading = Some(heading);
            ChangedMask::ONLINE | ChangedMask::ATTITUDE
        }
        None => ChangedMask::ONLINE,
    }
}

/// `$HCXDR`, Transducer Measurements, in groups of four fields.
pub fn xdr(s: &Sentence<'_>, session: &mut Session) -> ChangedMask {
    let mut mask = ChangedMask::ONLINE;

    for i in 0..s.count() / 4 {
        let j = i * 4;

        let data = match s.float(j + 2) {
            Some(data) => data,
            None => continue,
        };

        let attitude = &mut session.attitude;

        let target = match (s.char(j + 1), s.field(j + 4)) {
            (Some('A'), "PTCH") | (Some('A'), "PITCH") if s.char(j + 3) == Some('D') => {
                &mut attitude.pitch
            }
            (Some('A'), "ROLL") if s.char(j + 3) == Some('D') => &mut attitude.roll,
            // unknown scale
            (Some('G'), "MAGX") => &mut attitude.mag_x,
            (Some('G'), "MAGY") => &mut attitude.mag_y,
            (Some('G'), "MAGZ") => &mut attitude.mag_z,
            _ => {
                debug!(
                    "XDR {} {} {} {} ignored",
                    s.field(j + 1),
                    s.field(j + 2),
                    s.field(j + 3),
                    s.field(j + 4)
                );
                continue;
            }
        };

        *target = Some(data);
        mask |= ChangedMask::ATTITUDE;
    }

    mask
}

/// `$GPTXT`, Text Transmission, logged and otherwise ignored.
pub fn txt(s: &Sentence<'_>, _session: &mut Session) -> ChangedMask {
    if s.count() != 5 {
        return ChangedMask::ONLINE;
    }

    let text = s.field(4);

    match s.atoi(3) {
        0 => error!("receiver error: {}", text),
        1 => warn!("receiver warning: {}", text),
        2 => info!("receiver notice: {}", text),
        7 => info!("receiver user message: {}", text),
        _ => info!("receiver message: {}", text),
    }

    ChangedMask::ONLINE
}

/// `$STI`, Skytraq.  Probes for the binary protocol until the driver is bound.
pub fn sti(s: &Sentence<'_>, session: &mut Session) -> ChangedMask {
    if session.driver != Driver::Skytraq {
        session.queue_bytes(SKYTRAQ_PROBE);
    }

    if s.field(1) == "IC" {
        error!("Skytraq STI,IC,{}", s.field(2));
    } else {
        debug!("Skytraq STI,{} not decoded", s.field(1));
    }

    ChangedMask::ONLINE
}
