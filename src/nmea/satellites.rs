//! Satellites in use and in view.

use crate::gps::ChangedMask;
use crate::gps::Mode;
use crate::gps::Satellite;
use crate::gps::Session;
use crate::gps::MAXCHANNELS;
use crate::nmea::field;
use crate::nmea::nmeaid_to_prn;
use crate::nmea::position::valid_dop;
use crate::nmea::satellite_id::signal_id;
use crate::nmea::Seen;
use crate::nmea::Sentence;

use tracing::debug;
use tracing::error;
use tracing::trace;
use tracing::warn;

/// `$GPGSA`, GNSS DOP and Active Satellites.
///
/// Receivers split the active set over several GSAs per cycle, by talker (`GPGSA` then
/// `GLGSA`) or all as `GNGSA`.  Those accumulate, a repeated `GP` talker or any GSA not
/// directly after another GSA starts over.
pub fn gsa(s: &Sentence<'_>, session: &mut Session) -> ChangedMask {
    let mut mask = ChangedMask::ONLINE;

    let talker = s.talker();
    let last_last = session.nmea.last_gsa_talker;

    if session.nmea.latch_mode {
        debug!("{} after a non-advancing GGA timestamp ignored", s.tag());
    } else {
        let mode = s.atoi(2);

        // Antaris sends E for dead reckoning
        if (1..=3).contains(&mode) {
            session.newdata.mode = match mode {
                1 => Mode::NoFix,
                2 => Mode::Fix2D,
                _ => Mode::Fix3D,
            };
            mask = ChangedMask::MODE;
        }

        let mut system_id = 0;

        if s.count() > 19 {
            warn!("{} has too many fields, {}", s.tag(), s.count());
        } else {
            let dop = &mut session.dop;

            if let Some(pdop) = valid_dop(s.float(15)) {
                dop.pdop = Some(pdop);
                mask |= ChangedMask::DOP;
            }

            if let Some(hdop) = valid_dop(s.float(16)) {
                dop.hdop = Some(hdop);
                mask |= ChangedMask::DOP;
            }

            if let Some(vdop) = valid_dop(s.float(17)) {
                dop.vdop = Some(vdop);
                mask |= ChangedMask::DOP;
            }

            if s.count() == 19 && !s.is_empty(18) {
                if s.field(18).contains('.') {
                    // SiRF TriG
                    warn!("{} has an illegal system id {}", s.tag(), s.field(18));
                } else {
                    system_id = s.atoi(18) as u8;
                }
            }
        }

        let state = &mut session.nmea;

        if state.last_gsa_talker.is_none()
            || (state.last_gsa_talker == talker && talker != Some('N') && talker != Some('Q'))
        {
            trace!("{} starts a new active satellite set", s.tag());
            state.sats_used.clear();
        }

        state.last_gsa_talker = talker;

        match talker {
            Some('A') => {
                system_id = 3;
                state.seen_gsa |= Seen::GA;
            }
            Some('B') | Some('D') => {
                system_id = 4;
                state.seen_gsa |= Seen::BD;
            }
            Some('I') => {
                system_id = 6;
                state.seen_gsa |= Seen::GI;
            }
            Some('L') => {
                system_id = 2;
                state.seen_gsa |= Seen::GL;
            }
            // the system id from field 18, if any
            Some('N') => state.seen_gsa |= Seen::GN,
            Some('P') => {
                system_id = 1;
                state.seen_gsa |= Seen::GP;
            }
            // Quectel $PQGSA carries BeiDou or QZSS in field 18
            Some('Q') if s.tag().starts_with('P') && system_id != 0 => {}
            Some('Q') | Some('Z') => {
                system_id = 5;
                state.seen_gsa |= Seen::QZ;
            }
            _ => {}
        }

        // tag, mode, fix type and three DOPs
        for n in 3..(s.count().saturating_sub(3)) {
            let satnum = s.field(n);

            if satnum.is_empty() {
                continue;
            }

            // PDOP, past the satellites
            if satnum.contains('.') {
                break;
            }

            let satnum = field::int_or_zero(satnum);

            if !(1..=600).contains(&satnum) {
                continue;
            }

            let id = nmeaid_to_prn(s.tag(), satnum as i32, system_id);

            if id.prn <= 0 {
                continue;
            }

            if state.sats_used.len() >= MAXCHANNELS {
                error!("{} too many satellites used", s.tag());
                break;
            }

            // often in both $GPGSA and $GNGSA
            if !state.sats_used.contains(&id.prn) {
                state.sats_used.push(id.prn);
            }
        }

        session.satellites_used = state.sats_used.len();
        mask |= ChangedMask::USED;

        trace!(
            "{} mode {:?} used {}",
            s.tag(),
            session.newdata.mode,
            session.satellites_used
        );
    }

    if session.nmea.seen_gsa.any_non_gps() && talker == Some('P') {
        mask = ChangedMask::ONLINE;
    } else if last_last != Some('N') && talker == Some('N') {
        // some receivers send a single GNGSA, always ship its mode
        mask = ChangedMask::ONLINE | ChangedMask::MODE;
    }

    mask
}

/// `$GPGSV`, GNSS Satellites in View, paginated.
pub fn gsv(s: &Sentence<'_>, session: &mut Session) -> ChangedMask {
    let count = s.count();

    if count <= 3 {
        warn!("{} malformed, {} fields", s.tag(), count);
        session.skyview.clear();
        return ChangedMask::ONLINE;
    }

    let mut nmea_signal = 0;
    let mut system_id = 0;

    match count % 4 {
        0 => {}
        // NMEA 4.10 signal id
        1 => nmea_signal = field::hex_digit(s.field(count - 1)).unwrap_or(0),
        // Quectel $PQGSV, signal id then system id
        2 => {
            nmea_signal = field::hex_digit(s.field(count - 2)).unwrap_or(0);
            system_id = s.atoi(count - 1) as u8;

            if !(4..=5).contains(&system_id) {
                warn!("{} has an invalid system id {}", s.tag(), s.field(count - 1));
                return ChangedMask::ONLINE;
            }
        }
        _ => {
            warn!("{} malformed, {} fields", s.tag(), count);
            session.skyview.clear();
            return ChangedMask::ONLINE;
        }
    }

    let state = &mut session.nmea;

    state.await_parts = s.atoi(1);
    state.part = s.atoi(2);

    if state.part < 1 {
        warn!("{} malformed, part {}", s.tag(), s.field(2));
        session.skyview.clear();
        return ChangedMask::ONLINE;
    }

    // a new set, unless another constellation follows the last one
    if state.part == 1 && state.last_gsv_talker.is_none() {
        trace!("{} starts a new skyview", s.tag());
        session.skyview.clear();
    }

    let talker = s.talker();
    state.last_gsv_talker = talker;

    match talker {
        Some('A') => {
            system_id = 3;
            state.seen_gsv |= Seen::GA;
        }
        Some('B') | Some('D') => {
            system_id = 4;
            state.seen_gsv |= Seen::BD;
        }
        Some('I') => {
            system_id = 6;
            state.seen_gsv |= Seen::GI;
        }
        Some('L') => {
            system_id = 2;
            state.seen_gsv |= Seen::GL;
        }
        Some('N') => state.seen_gsv |= Seen::GN,
        Some('P') => state.seen_gsv |= Seen::GP,
        Some('Q') if s.tag().starts_with('P') && system_id != 0 => {
            if system_id == 4 {
                state.seen_gsv |= Seen::BD;
            } else {
                state.seen_gsv |= Seen::QZ;
            }
        }
        Some('Q') | Some('Z') => {
            system_id = 5;
            state.seen_gsv |= Seen::QZ;
        }
        _ => warn!("{} has an unknown talker", s.tag()),
    }

    let sig_id = if nmea_signal != 0 {
        signal_id(system_id, nmea_signal)
    } else {
        0
    };

    let mut n = 4;

    while n < count / 4 * 4 {
        if session.skyview.is_full() {
            error!("{} too many satellites in view", s.tag());
            session.skyview.clear();
            break;
        }

        let svid = s.atoi(n);

        if svid == 0 {
            n += 4;
            continue;
        }

        let id = nmeaid_to_prn(s.tag(), svid as i32, system_id);

        let ss = s.atoi(n + 3) as f64;
        let used = id.prn > 0 && ss > 0.0 && state.sats_used.contains(&id.prn);

        session.skyview.satellites.push(Satellite {
            prn: id.prn,
            gnss_id: id.gnss_id,
            sv_id: id.sv_id,
            sig_id,
            elevation: Some(s.atoi(n + 1) as f64),
            azimuth: Some(s.atoi(n + 2) as f64),
            ss: Some(ss),
            used,
            ..Satellite::default()
        });

        n += 4;
    }

    if !state.seen_gsv.any_non_gps()
        && state.part == state.await_parts
        && s.atoi(3) != session.skyview.visible() as i64
    {
        warn!(
            "{} claims {} satellites in view, {} decoded",
            s.tag(),
            s.atoi(3),
            session.skyview.visible()
        );
    }

    if state.part < state.await_parts {
        trace!("{} partial skyview, {} of {}", s.tag(), state.part, state.await_parts);
        state.gsx_more = true;
        return ChangedMask::ONLINE;
    }

    state.gsx_more = false;

    // SiRFstarII with no satellites sends all azimuths zero
    if session
        .skyview
        .satellites
        .iter()
        .all(|satellite| satellite.azimuth.unwrap_or(0.0) == 0.0)
    {
        warn!("{} skyview with no azimuths discarded", s.tag());
        session.skyview.clear();
        return ChangedMask::ONLINE;
    }

    session.skyview.time = None;

    // other constellations follow GPS, wait for the last of them
    if state.seen_gsv.any_non_gps() && talker == Some('P') && state.end_gsv_talker != Some('P') {
        trace!("{} is not the last talker of the skyview", s.tag());
        return ChangedMask::ONLINE;
    }

    ChangedMask::SATELLITE
}
