use crate::gps::ChangedMask;
use crate::gps::Context;
use crate::gps::Mode;
use crate::gps::Session;
use crate::gps::Status;
use crate::nmea::*;

use chrono::prelude::*;

fn session() -> Session {
    Session::new("test", Context::default())
}

// a context that never applies the week rollover correction
fn replay_session() -> Session {
    let context = Context {
        start_time: 0,
        ..Context::default()
    };

    Session::new("test", context)
}

#[test]
fn test_gga() {
    let mut session = session();

    let mask = parse(
        "$GPGGA,123519.00,4807.038,N,01131.324,E,1,08,0.9,545.4,M,46.9,M,,*6C",
        &mut session,
    );

    assert!(mask.contains(ChangedMask::LATLON | ChangedMask::ALTITUDE | ChangedMask::MODE));
    assert!(mask.contains(ChangedMask::STATUS | ChangedMask::DOP | ChangedMask::EPOCH));
    // no year yet
    assert!(!mask.contains(ChangedMask::TIME));

    let newdata = &session.newdata;

    assert_eq!(Mode::Fix3D, newdata.mode);
    assert_eq!(Status::Gps, newdata.status);
    assert_approx_eq!(48.1173, newdata.latitude.unwrap());
    assert_approx_eq!(545.4, newdata.alt_msl.unwrap());
    assert_eq!(8, session.nmea.gga_sats_used);
    assert!(newdata.dgps_age.is_none());
}

#[test]
fn test_gga_no_fix() {
    let mut session = session();

    let mask = parse("$GPGGA,,,,,,0,00,99.99,,,,,,*48", &mut session);

    assert!(mask.contains(ChangedMask::REPORT | ChangedMask::TIME));
    assert_eq!(Status::Unknown, session.newdata.status);
    assert_eq!(Mode::NoFix, session.newdata.mode);
    assert!(session.dop.hdop.is_none());
}

#[test]
fn test_rmc_void() {
    let mut session = session();

    let mask = parse("$GPRMC,,V,,,,,,,,,,N*53", &mut session);

    assert!(mask.contains(ChangedMask::REPORT | ChangedMask::TIME | ChangedMask::MODE));
    assert_eq!(Mode::NoFix, session.newdata.mode);
    assert!(session.newdata.time.is_none());
}

#[test]
fn test_rmc_century_wrap() {
    let mut session = replay_session();

    parse(
        "$GPRMC,235959.00,A,4807.038,N,01131.324,E,0.0,0.0,311299,,,A",
        &mut session,
    );
    assert_eq!(2000, session.context.century);

    parse(
        "$GPRMC,000000.00,A,4807.038,N,01131.324,E,0.0,0.0,010100,,,A",
        &mut session,
    );
    assert_eq!(2100, session.context.century);
}

#[test]
fn test_rmc_year_clamp() {
    let mut session = replay_session();

    parse(
        "$GPRMC,120000.00,A,4807.038,N,01131.324,E,0.0,0.0,010180,,,A",
        &mut session,
    );

    assert_eq!(1980, session.newdata.time.unwrap().year());
}

#[test]
fn test_gll() {
    let mut session = session();

    let mask = parse("$GPGLL,4807.038,N,01131.324,E,123519.00,A,A*63", &mut session);

    assert!(mask.contains(ChangedMask::LATLON | ChangedMask::MODE));
    assert_eq!(Mode::Fix2D, session.newdata.mode);
    assert_eq!(Status::Gps, session.newdata.status);
    assert_approx_eq!(11.5220667, session.newdata.longitude.unwrap());
}

#[test]
fn test_vtg() {
    let mut session = session();

    let mask = parse("$GPVTG,84.4,T,,M,22.4,N,41.5,K,A*31", &mut session);

    assert!(mask.contains(ChangedMask::SPEED | ChangedMask::TRACK));
    assert!(!mask.contains(ChangedMask::LATLON));
    assert_approx_eq!(84.4, session.newdata.track.unwrap());
    assert_approx_eq!(22.4 * KNOTS_TO_MPS, session.newdata.speed.unwrap());
}

#[test]
fn test_zda() {
    let mut session = replay_session();

    let mask = parse("$GPZDA,201530.00,04,07,2002,00,00*60", &mut session);

    assert!(mask.contains(ChangedMask::TIME | ChangedMask::NTPTIME));
    assert_eq!(
        Some(Utc.ymd(2002, 7, 4).and_hms(20, 15, 30)),
        session.newdata.time
    );
    assert!(session.context.century_valid);
}

#[test]
fn test_zda_bad_month() {
    let mut session = replay_session();

    let mask = parse("$GPZDA,201530.00,04,13,2002,00,00", &mut session);

    assert_eq!(ChangedMask::ONLINE, mask);
    assert!(session.newdata.time.is_none());
}

#[test]
fn test_gst() {
    let mut session = session();

    let mask = parse(
        "$GPGST,123519.00,2.5,3.0,2.0,45.0,1.5,1.2,2.2*6A",
        &mut session,
    );

    assert!(mask.contains(ChangedMask::GST));

    let gst = &session.gst;

    assert_approx_eq!(2.5, gst.rms_deviation.unwrap());
    assert_approx_eq!(45.0, gst.smajor_orientation.unwrap());
    assert_approx_eq!(2.2, gst.alt_err_deviation.unwrap());
    // no year to anchor the time of day
    assert!(gst.utctime.is_none());
}

#[test]
fn test_gsa() {
    let mut session = session();

    let mask = parse("$GPGSA,A,3,04,05,,,,,,,,,,,2.5,1.3,2.1*35", &mut session);

    assert!(mask.contains(ChangedMask::MODE | ChangedMask::DOP | ChangedMask::USED));
    assert_eq!(Mode::Fix3D, session.newdata.mode);
    assert_eq!(2, session.satellites_used);
    assert_approx_eq!(2.5, session.dop.pdop.unwrap());
    assert_approx_eq!(1.3, session.dop.hdop.unwrap());
    assert_approx_eq!(2.1, session.dop.vdop.unwrap());
}

#[test]
fn test_gsa_accumulates_constellations() {
    let mut session = session();

    parse(
        "$GNGSA,A,3,04,05,09,,,,,,,,,,1.8,1.0,1.5,1*35",
        &mut session,
    );
    assert_eq!(3, session.satellites_used);

    parse(
        "$GNGSA,A,3,65,66,,,,,,,,,,,1.8,1.0,1.5,2*3D",
        &mut session,
    );
    assert_eq!(5, session.satellites_used);
    assert_eq!(vec![4, 5, 9, 65, 66], session.nmea.sats_used);

    // anything else ends the burst, the next one starts over
    parse("$GPVTG,84.4,T,,M,22.4,N,41.5,K,A*31", &mut session);
    assert!(session.nmea.last_gsa_talker.is_none());

    parse(
        "$GNGSA,A,3,65,66,,,,,,,,,,,1.8,1.0,1.5,2*3D",
        &mut session,
    );
    assert_eq!(2, session.satellites_used);
}

#[test]
fn test_gsv_no_wait_after_last_part() {
    let mut session = session();

    let mask = parse(
        "$GPGSV,2,1,08,04,45,045,40,05,30,090,38,09,60,135,42,12,15,180,30*75",
        &mut session,
    );

    assert!(!mask.contains(ChangedMask::SATELLITE));
    assert!(session.nmea.gsx_more);

    let mask = parse(
        "$GPGSV,2,2,08,16,20,225,35,18,40,270,41,22,55,315,44,24,10,030,28*73",
        &mut session,
    );

    assert!(mask.contains(ChangedMask::SATELLITE));
    assert!(!session.nmea.gsx_more);
    assert_eq!(8, session.skyview.visible());
}

#[test]
fn test_dbt() {
    let mut session = session();

    let mask = parse("$SDDBT,10.0,f,3.0,M,1.6,F*33", &mut session);

    assert!(mask.contains(ChangedMask::ALTITUDE));
    assert_approx_eq!(3.0, session.newdata.depth.unwrap());

    let mut session = self::session();

    parse("$SDDBT,10.0,f,,M,,F*37", &mut session);

    assert_approx_eq!(3.048, session.newdata.depth.unwrap());
}

#[test]
fn test_hdg() {
    let mut session = session();

    let mask = parse("$HCHDG,101.1,2.0,E,3.1,W*51", &mut session);

    assert!(mask.contains(ChangedMask::MAGNETIC_TRACK));
    assert_approx_eq!(103.1, session.newdata.magnetic_track.unwrap());
    assert_approx_eq!(-3.1, session.newdata.magnetic_var.unwrap());
}

#[test]
fn test_hdt() {
    let mut session = session();

    let mask = parse("$HEHDT,274.07,T*19", &mut session);

    assert!(mask.contains(ChangedMask::ATTITUDE));
    assert_approx_eq!(274.07, session.attitude.heading.unwrap());
}

#[test]
fn test_dtm() {
    let mut session = session();

    parse("$GPDTM,W84,,0.0,N,0.0,E,0.0,W84*6F", &mut session);

    assert_eq!(Some("WGS84".to_string()), session.newdata.datum);
}

#[test]
fn test_txt() {
    let mut session = session();

    assert_eq!(
        ChangedMask::ONLINE,
        parse("$GPTXT,01,01,02,ANTSTATUS=OK*3B", &mut session)
    );
}

#[test]
fn test_pgrme() {
    let mut session = session();

    let mask = parse("$PGRME,15.0,M,45.0,M,25.0,M*1C", &mut session);

    assert!(mask.contains(ChangedMask::HERR | ChangedMask::VERR));
    assert_approx_eq!(22.0222, session.newdata.epx.unwrap(), 0.001);
    assert_approx_eq!(22.0222, session.newdata.epy.unwrap(), 0.001);
    assert_approx_eq!(93.4322, session.newdata.epv.unwrap(), 0.001);
    assert_approx_eq!(51.9068, session.newdata.sep.unwrap(), 0.001);
}

#[test]
fn test_pgrme_wrong_units() {
    let mut session = session();

    let mask = parse("$PGRME,15.0,F,45.0,M,25.0,M", &mut session);

    assert_eq!(ChangedMask::ONLINE, mask);
    assert!(session.newdata.epx.is_none());
}

#[test]
fn test_pgrmz() {
    let mut session = session();

    let mask = parse("$PGRMZ,1494,f,3*23", &mut session);

    assert!(mask.contains(ChangedMask::ALTITUDE | ChangedMask::MODE));
    assert_approx_eq!(455.3712, session.newdata.alt_msl.unwrap());
    assert_eq!(Mode::Fix3D, session.newdata.mode);
}

#[test]
fn test_pmtk001() {
    let mut session = session();

    assert_eq!(ChangedMask::ONLINE, parse("$PMTK001,604,3*32", &mut session));
    assert_eq!(ChangedMask::ONLINE, parse("$PMTK001,604,1", &mut session));
}

#[test]
fn test_pmtk424_widens_pulse() {
    let mut session = session();

    parse("$PMTK424,0,0,1,0,100000*1C", &mut session);

    let outbound = session.take_outbound();

    assert_eq!(1, outbound.len());
    assert!(outbound[0].starts_with(b"$PMTK324,0,0,1,0,127875*"));
}

#[test]
fn test_pmtk705() {
    let mut session = session();

    parse("$PMTK705,AXN_5.1.7_3333_20150611,0018,MAVEN,1.0*7C", &mut session);

    assert_eq!("AXN_5.1.7_3333_20150611,0018,MAVEN,1.0", session.subtype);
    assert!(session.nmea.version_queried);

    let outbound = session.take_outbound();
    assert!(outbound[0].starts_with(b"$PQVERNO,R*"));

    // asked only once
    parse("$PMTK705,AXN_5.1.7_3333_20150611,0018,MAVEN,1.0*7C", &mut session);
    assert!(session.take_outbound().is_empty());
}

#[test]
fn test_ptnta() {
    let mut session = session();

    let mask = parse("$PTNTA,20000101000000,2,T4,,,3,1,0*3D", &mut session);

    assert!(mask.contains(ChangedMask::OSCILLATOR));

    let oscillator = &session.oscillator;

    assert!(oscillator.running);
    assert!(!oscillator.reference);
    assert!(oscillator.disciplined);
    assert_eq!(0, oscillator.delta);
}

#[test]
fn test_unknown_sentence() {
    let mut session = session();

    assert_eq!(ChangedMask::ONLINE, parse("$GPXYZ,1,2,3", &mut session));
    assert!(!session.nmea.cycle_continue);
}

#[test]
fn test_overlong_sentence() {
    let mut session = session();

    let long = format!("$GPTXT,01,01,02,{}", "x".repeat(200));

    assert_eq!(ChangedMask::ONLINE, parse(&long, &mut session));
}
