//! Translation of NMEA satellite numbers into constellation, satellite and extended PRN.
//!
//! NMEA 4.0 and earlier squeeze every constellation into one number space and vendors
//! disagree on the ranges.  NMEA 4.10 adds an explicit system id which, when present, is
//! authoritative.

use crate::gps::gnss;

/// A translated satellite id.  `prn == 0` means the satellite cannot be identified.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SatelliteId {
    pub prn: i16,
    pub gnss_id: u8,
    pub sv_id: u8,
}

impl SatelliteId {
    fn new(prn: i32, gnss_id: u8, sv_id: i32) -> SatelliteId {
        SatelliteId {
            prn: prn as i16,
            gnss_id,
            sv_id: sv_id as u8,
        }
    }

    fn unknown() -> SatelliteId {
        SatelliteId::default()
    }
}

/// NMEA 4.10 system id carried by a talker, 0 when the talker does not name one.
pub fn talker_system_id(talker: char) -> u8 {
    match talker {
        'P' => 1,
        'L' => 2,
        'A' => 3,
        'B' | 'D' => 4,
        'Q' | 'Z' => 5,
        'I' => 6,
        _ => 0,
    }
}

/// Translate `satnum` as sent by `tag` (`GPGSV`, `BDGSA`, ...).
///
/// `system_id` is the NMEA 4.10 system id, 0 when the sentence did not carry one.
pub fn nmeaid_to_prn(tag: &str, satnum: i32, system_id: u8) -> SatelliteId {
    if satnum < 1 {
        return SatelliteId::unknown();
    }

    if system_id > 0 {
        return by_system_id(satnum, system_id);
    }

    if satnum <= 32 {
        return match tag.get(0..2) {
            Some("GA") => SatelliteId::new(300 + satnum, gnss::GALILEO, satnum),
            Some("GB") | Some("BD") | Some("PQ") => {
                SatelliteId::new(400 + satnum, gnss::BEIDOU, satnum)
            }
            Some("GI") => SatelliteId::new(500 + satnum, gnss::IRNSS, satnum),
            Some("GL") => SatelliteId::new(64 + satnum, gnss::GLONASS, satnum),
            Some("GQ") | Some("QZ") => SatelliteId::new(192 + satnum, gnss::QZSS, satnum),
            _ => SatelliteId::new(satnum, gnss::GPS, satnum),
        };
    }

    by_range(satnum)
}

// NMEA 4.0 number ranges
fn by_range(n: i32) -> SatelliteId {
    match n {
        33..=64 => SatelliteId::new(n, gnss::SBAS, n + 87),
        65..=96 => SatelliteId::new(n, gnss::GLONASS, n - 64),
        120..=158 => SatelliteId::new(n, gnss::SBAS, n),
        173..=182 => SatelliteId::new(n, gnss::IMES, n - 172),
        193..=197 => SatelliteId::new(n, gnss::QZSS, n - 192),
        // SiRF BeiDou, shifted into the 400 range
        201..=237 => SatelliteId::new(n + 200, gnss::BEIDOU, n - 200),
        301..=356 => SatelliteId::new(n, gnss::GALILEO, n - 300),
        401..=437 => SatelliteId::new(n, gnss::BEIDOU, n - 400),
        501..=518 => SatelliteId::new(n, gnss::IRNSS, n - 500),
        901..=918 => SatelliteId::new(n, gnss::IRNSS, n - 900),
        _ => SatelliteId::unknown(),
    }
}

fn by_system_id(n: i32, system_id: u8) -> SatelliteId {
    match system_id {
        // GPS, with vendors squatting other systems in its ranges; the PRN is kept
        1 => match n {
            1..=32 => SatelliteId::new(n, gnss::GPS, n),
            33..=64 => SatelliteId::new(n, gnss::SBAS, n + 87),
            101..=136 => SatelliteId::new(n, gnss::GALILEO, n - 100),
            152..=157 => SatelliteId::new(n, gnss::SBAS, n),
            193..=199 => SatelliteId::new(n, gnss::QZSS, n - 192),
            201..=264 => SatelliteId::new(n, gnss::BEIDOU, n - 200),
            _ => SatelliteId::unknown(),
        },
        2 => {
            let sv = if n < 64 { n } else { n - 64 };
            SatelliteId::new(64 + sv, gnss::GLONASS, sv)
        }
        3 => {
            let sv = match n {
                101..=199 => n - 100,
                301..=399 => n - 300,
                _ => n,
            };
            SatelliteId::new(300 + sv, gnss::GALILEO, sv)
        }
        4 => {
            let sv = match n {
                201..=299 => n - 200,
                401..=499 => n - 400,
                _ => n,
            };
            SatelliteId::new(400 + sv, gnss::BEIDOU, sv)
        }
        5 => {
            let sv = if n < 100 { n } else { n - 192 };
            SatelliteId::new(192 + sv, gnss::QZSS, sv)
        }
        6 => SatelliteId::new(500 + n, gnss::IRNSS, n),
        _ => SatelliteId::unknown(),
    }
}

/// NMEA 4.10 signal ids, by system id row and NMEA signal id column, as u-blox signal ids.
/// 99 is a signal with no u-blox equivalent.
const SIGNAL_IDS: [[u8; 12]; 7] = [
    [0, 0, 99, 99, 99, 4, 3, 6, 7, 99, 99, 99],
    [0, 4, 99, 99, 99, 4, 3, 6, 7, 99, 99, 99],
    [0, 0, 99, 2, 99, 99, 99, 99, 99, 99, 99, 99],
    [0, 3, 5, 99, 10, 8, 0, 4, 99, 99, 99, 99],
    [0, 0, 2, 5, 0, 7, 99, 99, 4, 99, 99, 2],
    [0, 0, 99, 99, 1, 4, 5, 8, 9, 99, 99, 99],
    [0, 0, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99],
];

/// u-blox signal id for an NMEA system id and signal id, 0 when unknown.
pub fn signal_id(system_id: u8, nmea_signal: u8) -> u8 {
    let id = SIGNAL_IDS
        .get(system_id as usize)
        .and_then(|row| row.get(nmea_signal as usize))
        .copied()
        .unwrap_or(0);

    if id == 99 {
        0
    } else {
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gps() {
        assert_eq!(SatelliteId::new(5, gnss::GPS, 5), nmeaid_to_prn("GPGSV", 5, 0));
        assert_eq!(SatelliteId::new(5, gnss::GPS, 5), nmeaid_to_prn("GPGSV", 5, 1));
    }

    #[test]
    fn test_talker_overrides() {
        assert_eq!(SatelliteId::new(305, gnss::GALILEO, 5), nmeaid_to_prn("GAGSV", 5, 0));
        assert_eq!(SatelliteId::new(405, gnss::BEIDOU, 5), nmeaid_to_prn("BDGSV", 5, 0));
        assert_eq!(SatelliteId::new(405, gnss::BEIDOU, 5), nmeaid_to_prn("PQGSA", 5, 0));
        assert_eq!(SatelliteId::new(69, gnss::GLONASS, 5), nmeaid_to_prn("GLGSV", 5, 0));
        assert_eq!(SatelliteId::new(197, gnss::QZSS, 5), nmeaid_to_prn("GQGSV", 5, 0));
        assert_eq!(SatelliteId::new(505, gnss::IRNSS, 5), nmeaid_to_prn("GIGSV", 5, 0));
    }

    #[test]
    fn test_ranges() {
        assert_eq!(SatelliteId::new(46, gnss::SBAS, 133), nmeaid_to_prn("GPGSV", 46, 0));
        assert_eq!(SatelliteId::new(70, gnss::GLONASS, 6), nmeaid_to_prn("GNGSA", 70, 0));
        assert_eq!(SatelliteId::new(131, gnss::SBAS, 131), nmeaid_to_prn("GPGSV", 131, 0));
        assert_eq!(SatelliteId::new(175, gnss::IMES, 3), nmeaid_to_prn("GPGSV", 175, 0));
        assert_eq!(SatelliteId::new(194, gnss::QZSS, 2), nmeaid_to_prn("GPGSV", 194, 0));
        assert_eq!(SatelliteId::new(414, gnss::BEIDOU, 14), nmeaid_to_prn("GPGSA", 214, 0));
        assert_eq!(SatelliteId::new(305, gnss::GALILEO, 5), nmeaid_to_prn("GNGSV", 305, 0));
        assert_eq!(SatelliteId::new(405, gnss::BEIDOU, 5), nmeaid_to_prn("GNGSV", 405, 0));
    }

    #[test]
    fn test_unknown() {
        assert_eq!(0, nmeaid_to_prn("GPGSV", 0, 0).prn);
        assert_eq!(0, nmeaid_to_prn("GPGSV", -3, 0).prn);
        assert_eq!(0, nmeaid_to_prn("GPGSV", 100, 0).prn);
        assert_eq!(0, nmeaid_to_prn("GPGSV", 250, 0).prn);
        assert_eq!(0, nmeaid_to_prn("GPGSV", 5, 9).prn);
    }

    #[test]
    fn test_system_id() {
        assert_eq!(SatelliteId::new(214, gnss::BEIDOU, 14), nmeaid_to_prn("GPGSA", 214, 1));
        assert_eq!(SatelliteId::new(82, gnss::GLONASS, 18), nmeaid_to_prn("GNGSA", 82, 2));
        assert_eq!(SatelliteId::new(307, gnss::GALILEO, 7), nmeaid_to_prn("GNGSA", 7, 3));
        assert_eq!(SatelliteId::new(413, gnss::BEIDOU, 13), nmeaid_to_prn("GNGSA", 13, 4));
        assert_eq!(SatelliteId::new(413, gnss::BEIDOU, 13), nmeaid_to_prn("GNGSA", 213, 4));
        assert_eq!(SatelliteId::new(194, gnss::QZSS, 2), nmeaid_to_prn("GNGSV", 194, 5));
    }

    fn assert_refeed_stable(tag: &str, satnum: i32, system_id: u8) {
        let first = nmeaid_to_prn(tag, satnum, system_id);

        if first.prn == 0 {
            return;
        }

        let second = nmeaid_to_prn("GNGSV", first.prn as i32, 0);

        assert_eq!(
            (first.gnss_id, first.sv_id),
            (second.gnss_id, second.sv_id),
            "{} {} system {} became {:?} then {:?}",
            tag,
            satnum,
            system_id,
            first,
            second
        );
        assert_eq!(second, nmeaid_to_prn("GNGSV", second.prn as i32, 0));
    }

    #[test]
    fn test_translation_idempotent() {
        for tag in ["GPGSV", "GLGSV", "GAGSV", "GBGSV", "BDGSV", "PQGSA"] {
            for satnum in 1..=32 {
                assert_refeed_stable(tag, satnum, 0);
            }
        }

        for satnum in 1..=5 {
            assert_refeed_stable("GQGSV", satnum, 0);
            assert_refeed_stable("QZGSV", satnum, 0);
            assert_refeed_stable("GNGSV", satnum, 5);
        }

        for satnum in 1..=18 {
            assert_refeed_stable("GIGSV", satnum, 0);
            assert_refeed_stable("GNGSV", satnum, 6);
        }

        for satnum in 1..=1000 {
            assert_refeed_stable("GNGSV", satnum, 0);
        }

        for system_id in 2..=4 {
            for satnum in 1..=32 {
                assert_refeed_stable("GNGSA", satnum, system_id);
            }
        }

        // 101..136 under system 1 is a vendor numbering outside NMEA and keeps its PRN
        for satnum in (1..=64).chain(152..=157).chain(193..=197).chain(201..=237) {
            assert_refeed_stable("GPGSA", satnum, 1);
        }
    }

    #[test]
    fn test_signal_id() {
        assert_eq!(4, signal_id(1, 1));
        assert_eq!(3, signal_id(1, 6));
        assert_eq!(0, signal_id(1, 2));
        assert_eq!(5, signal_id(3, 2));
        assert_eq!(0, signal_id(9, 1));
        assert_eq!(0, signal_id(1, 15));
    }

    #[test]
    fn test_talker_system_id() {
        assert_eq!(1, talker_system_id('P'));
        assert_eq!(4, talker_system_id('D'));
        assert_eq!(0, talker_system_id('N'));
    }
}
