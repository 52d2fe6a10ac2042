use crate::gps::Context;
use crate::gps::Mode;
use crate::gps::Session;
use crate::shm::*;

fn session() -> Session {
    let mut session = Session::new("/dev/ttyUSB0", Context::default());

    session.fix.mode = Mode::Fix3D;
    session.fix.latitude = Some(48.1173);
    session.fix.longitude = Some(11.5220667);
    session.satellites_used = 5;

    session
}

#[test]
fn test_export_record() {
    let record = ExportRecord::from_session(&session(), 12.5);

    assert_eq!(SHM_PSEUDO_FD, record.gps_fd);
    assert_eq!("/dev/ttyUSB0", record.path());
    assert_eq!(3, record.mode);
    assert_approx_eq!(48.1173, record.latitude);
    assert!(record.alt_hae.is_nan());
    assert_eq!(5, record.satellites_used);
    assert_eq!(0, record.satellites_visible);
}

#[test]
fn test_export_bookends() {
    let mut export = ShmExport::create(libc::IPC_PRIVATE).unwrap();

    assert!(export.reader().read().is_none());

    let record = ExportRecord::from_session(&session(), 1.0);

    export.update(&record);

    let (tick, read) = export.reader().read().unwrap();

    assert_eq!(1, tick);
    assert_eq!("/dev/ttyUSB0", read.path());
    assert_approx_eq!(11.5220667, read.longitude);

    export.update(&record);

    assert_eq!(2, export.reader().read().unwrap().0);
}

#[test]
fn test_export_concurrent_reader() {
    const UPDATES: i32 = 20_000;

    // a key of our own, the reader attaches before the export marks it for removal
    let key = 0x4753_0000 | (std::process::id() & 0xffff) as i32;
    let segment = Segment::<Layout>::attach(key, 0o600, true).unwrap();
    let mut export = ShmExport::create(key).unwrap();

    std::thread::scope(|scope| {
        scope.spawn(|| {
            let reader = ShmReader::new(&segment);
            let mut last = 0;

            while last < UPDATES {
                let (tick, record) = match reader.read() {
                    Some(snapshot) => snapshot,
                    None => continue,
                };

                assert!(tick >= last, "tick went from {} to {}", last, tick);
                assert_eq!(tick as f64, record.online);
                assert_eq!(record.online, record.latitude);
                assert_eq!(-record.online, record.longitude);
                assert_eq!(tick, record.satellites_used);

                last = tick;
            }
        });

        let mut record = ExportRecord::from_session(&session(), 0.0);

        for i in 1..=UPDATES {
            record.online = i as f64;
            record.latitude = i as f64;
            record.longitude = -(i as f64);
            record.satellites_used = i;

            export.update(&record);
        }
    });
}

#[test]
fn test_ntp_segment_invalid_unit() {
    assert!(matches!(
        NtpSegment::attach(-1),
        Err(ShmError::InvalidUnit(-1))
    ));
    assert!(matches!(
        NtpSegment::open(256),
        Err(ShmError::InvalidUnit(256))
    ));
}

#[test]
fn test_sample_timestamp() {
    let sample = Sample {
        count: 4,
        clock_sec: 1_700_000_000,
        clock_usec: 250_000,
        receive_sec: 1_700_000_000,
        receive_usec: 250_100,
        receive_nsec: 250_100_123,
        precision: -20,
        ..Sample::default()
    };

    let ts = sample.timestamp("shm://2");

    assert_eq!(1_700_000_000, ts.real_sec);
    assert_eq!(250_000_000, ts.real_nsec);
    assert_eq!(250_100_123, ts.clock_nsec);
    assert_eq!(-20, ts.precision);
    assert_eq!("shm://2", ts.device);
}
