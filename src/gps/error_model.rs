//! Error estimates for receivers that report DOPs but no errors of their own.

use crate::gps::Dop;
use crate::gps::Fix;
use crate::gps::Status;

/// Scale from a CEP50 radius to one sigma.
pub const CEP50_SIGMA: f64 = 1.18;

/// Scale from one sigma to the 95% confidence errors reported to clients.
pub const GPSD_CONFIDENCE: f64 = 2.45;

// user equivalent range errors in meters, 95% confidence
const H_UERE_NO_DGPS: f64 = 15.0;
const H_UERE_WITH_DGPS: f64 = 3.75;
const V_UERE_NO_DGPS: f64 = 23.0;
const V_UERE_WITH_DGPS: f64 = 5.75;
const P_UERE_NO_DGPS: f64 = 19.0;
const P_UERE_WITH_DGPS: f64 = 4.75;

/// Time error when the receiver gives none, half of the 10 ms NMEA resolution.
const DEFAULT_EPT: f64 = 0.005;

/// Fill the missing error fields of `fix` from `dop`, and whichever altitude the geoid
/// separation gives.
pub fn fill_errors(fix: &mut Fix, dop: &Dop) {
    if let Some(geoid_sep) = fix.geoid_sep {
        match (fix.alt_hae, fix.alt_msl) {
            (None, Some(alt_msl)) => fix.alt_hae = Some(alt_msl + geoid_sep),
            (Some(alt_hae), None) => fix.alt_msl = Some(alt_hae - geoid_sep),
            _ => {}
        }
    }

    let dgps = fix.status >= Status::Dgps && fix.status <= Status::RtkFloat;

    let (h_uere, v_uere, p_uere) = if dgps {
        (H_UERE_WITH_DGPS, V_UERE_WITH_DGPS, P_UERE_WITH_DGPS)
    } else {
        (H_UERE_NO_DGPS, V_UERE_NO_DGPS, P_UERE_NO_DGPS)
    };

    if fix.time.is_some() && fix.ept.is_none() {
        fix.ept = Some(DEFAULT_EPT);
    }

    if fix.epx.is_none() {
        fix.epx = dop.xdop.map(|xdop| xdop * h_uere);
    }

    if fix.epy.is_none() {
        fix.epy = dop.ydop.map(|ydop| ydop * h_uere);
    }

    if fix.eph.is_none() {
        fix.eph = match (fix.epx, fix.epy) {
            (Some(epx), Some(epy)) => Some(epx.hypot(epy)),
            _ => dop.hdop.map(|hdop| hdop * p_uere),
        };
    }

    if fix.epv.is_none() && fix.mode >= crate::gps::Mode::Fix3D {
        fix.epv = dop.vdop.map(|vdop| vdop * v_uere);
    }

    if fix.sep.is_none() {
        fix.sep = dop.pdop.map(|pdop| pdop * p_uere);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gps::Mode;

    #[test]
    fn test_fill_errors() {
        let mut fix = Fix {
            mode: Mode::Fix3D,
            status: Status::Gps,
            ..Fix::default()
        };

        let dop = Dop {
            hdop: Some(0.9),
            vdop: Some(1.5),
            pdop: Some(1.8),
            ..Dop::default()
        };

        fill_errors(&mut fix, &dop);

        assert_approx_eq!(17.1, fix.eph.unwrap());
        assert_approx_eq!(34.5, fix.epv.unwrap());
        assert_approx_eq!(34.2, fix.sep.unwrap());
        assert!(fix.epx.is_none());
        assert!(fix.ept.is_none());
    }

    #[test]
    fn test_fill_altitude() {
        let mut fix = Fix {
            alt_msl: Some(545.4),
            geoid_sep: Some(46.9),
            ..Fix::default()
        };

        fill_errors(&mut fix, &Dop::default());

        assert_approx_eq!(592.3, fix.alt_hae.unwrap());
    }

    #[test]
    fn test_fill_errors_keeps_reported() {
        let mut fix = Fix {
            mode: Mode::Fix2D,
            status: Status::Dgps,
            eph: Some(2.0),
            epv: Some(3.0),
            ..Fix::default()
        };

        let dop = Dop {
            xdop: Some(1.0),
            ydop: Some(2.0),
            hdop: Some(5.0),
            vdop: Some(5.0),
            ..Dop::default()
        };

        fill_errors(&mut fix, &dop);

        assert_approx_eq!(2.0, fix.eph.unwrap());
        assert_approx_eq!(3.0, fix.epv.unwrap());
        assert_approx_eq!(3.75, fix.epx.unwrap());
        assert_approx_eq!(7.5, fix.epy.unwrap());
    }
}
