use crate::gps::Fix;
use crate::gps::Session;
use crate::gps::MAXCHANNELS;
use crate::shm::Segment;
use crate::shm::ShmError;

use serde::Serialize;

use std::sync::atomic::fence;
use std::sync::atomic::Ordering;

use tracing::debug;
use tracing::trace;

use volatile_register::RW;

/// Stands in for the file descriptor of an exported snapshot.
pub const SHM_PSEUDO_FD: i32 = -1;

/// Reads attempted before giving up on a segment being rewritten.
pub const MAX_READ_ATTEMPTS: usize = 8;

const PATH_MAX: usize = 128;

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[repr(C)]
pub struct ExportSatellite {
    pub prn: i16,
    pub gnss_id: u8,
    pub sv_id: u8,
    pub used: u8,
    pub elevation: f64,
    pub azimuth: f64,
    pub ss: f64,
}

impl Default for ExportSatellite {
    fn default() -> Self {
        ExportSatellite {
            prn: 0,
            gnss_id: 0,
            sv_id: 0,
            used: 0,
            elevation: f64::NAN,
            azimuth: f64::NAN,
            ss: f64::NAN,
        }
    }
}

/// A device's state as exported.  Missing values are NaN.
#[derive(Clone, Copy, Debug, PartialEq)]
#[repr(C)]
pub struct ExportRecord {
    pub gps_fd: i32,
    pub online: f64,
    pub path: [u8; PATH_MAX],
    pub mode: i32,
    pub status: i32,
    pub time_sec: i64,
    pub time_nsec: i64,
    pub ept: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub alt_hae: f64,
    pub alt_msl: f64,
    pub eph: f64,
    pub epv: f64,
    pub track: f64,
    pub speed: f64,
    pub climb: f64,
    pub hdop: f64,
    pub vdop: f64,
    pub pdop: f64,
    pub satellites_visible: i32,
    pub satellites_used: i32,
    pub satellites: [ExportSatellite; MAXCHANNELS],
}

impl Default for ExportRecord {
    fn default() -> Self {
        ExportRecord {
            gps_fd: SHM_PSEUDO_FD,
            online: 0.0,
            path: [0; PATH_MAX],
            mode: 0,
            status: 0,
            time_sec: 0,
            time_nsec: 0,
            ept: f64::NAN,
            latitude: f64::NAN,
            longitude: f64::NAN,
            alt_hae: f64::NAN,
            alt_msl: f64::NAN,
            eph: f64::NAN,
            epv: f64::NAN,
            track: f64::NAN,
            speed: f64::NAN,
            climb: f64::NAN,
            hdop: f64::NAN,
            vdop: f64::NAN,
            pdop: f64::NAN,
            satellites_visible: 0,
            satellites_used: 0,
            satellites: [ExportSatellite::default(); MAXCHANNELS],
        }
    }
}

fn nan(value: Option<f64>) -> f64 {
    value.unwrap_or(f64::NAN)
}

impl ExportRecord {
    pub fn from_session(session: &Session, online: f64) -> Self {
        let fix: &Fix = &session.fix;

        let mut record = ExportRecord {
            online,
            mode: fix.mode as i32,
            status: fix.status as i32,
            ept: nan(fix.ept),
            latitude: nan(fix.latitude),
            longitude: nan(fix.longitude),
            alt_hae: nan(fix.alt_hae),
            alt_msl: nan(fix.alt_msl),
            eph: nan(fix.eph),
            epv: nan(fix.epv),
            track: nan(fix.track),
            speed: nan(fix.speed),
            climb: nan(fix.climb),
            hdop: nan(session.dop.hdop),
            vdop: nan(session.dop.vdop),
            pdop: nan(session.dop.pdop),
            satellites_visible: session.skyview.visible() as i32,
            satellites_used: session.satellites_used as i32,
            ..ExportRecord::default()
        };

        if let Some(time) = fix.time {
            record.time_sec = time.timestamp();
            record.time_nsec = time.timestamp_subsec_nanos() as i64;
        }

        let path = session.path.as_bytes();
        let len = path.len().min(PATH_MAX - 1);
        record.path[..len].copy_from_slice(&path[..len]);

        for (to, from) in record
            .satellites
            .iter_mut()
            .zip(session.skyview.satellites.iter())
        {
            *to = ExportSatellite {
                prn: from.prn,
                gnss_id: from.gnss_id,
                sv_id: from.sv_id,
                used: from.used as u8,
                elevation: nan(from.elevation),
                azimuth: nan(from.azimuth),
                ss: nan(from.ss),
            };
        }

        record
    }

    pub fn path(&self) -> String {
        let end = self.path.iter().position(|b| *b == 0).unwrap_or(PATH_MAX);

        String::from_utf8_lossy(&self.path[..end]).into_owned()
    }
}

/// The exported segment, two bookends around one record.
#[repr(C)]
pub struct Layout {
    pub bookend1: RW<i32>,
    _padding: i32,
    pub payload: RW<ExportRecord>,
    pub bookend2: RW<i32>,
}

/// Single writer of the export segment.
pub struct ShmExport {
    segment: Segment<Layout>,
    tick: i32,
}

impl ShmExport {
    /// Create the segment world-readable, it is destroyed when the last process detaches.
    pub fn create(key: i32) -> Result<Self, ShmError> {
        let segment = Segment::attach(key, 0o666, true)?;

        segment.remove_on_detach();

        debug!("SHM export on key {:#x} segment {}", key, segment.id);

        Ok(ShmExport { segment, tick: 0 })
    }

    /// Publish `record`, second bookend first so a concurrent reader sees a mismatch.
    pub fn update(&mut self, record: &ExportRecord) {
        let layout = self.segment.as_ptr();

        self.tick = self.tick.wrapping_add(1);

        let mut record = *record;
        record.gps_fd = SHM_PSEUDO_FD;

        unsafe {
            (*layout).bookend2.write(self.tick);
            fence(Ordering::SeqCst);
            (*layout).payload.write(record);
            fence(Ordering::SeqCst);
            (*layout).bookend1.write(self.tick);
        }

        trace!("SHM export tick {}", self.tick);
    }

    pub fn reader(&self) -> ShmReader<'_> {
        ShmReader {
            layout: self.segment.as_ptr(),
            _segment: std::marker::PhantomData,
        }
    }
}

/// Lock-free reader of an export segment.
pub struct ShmReader<'a> {
    layout: *mut Layout,
    _segment: std::marker::PhantomData<&'a Segment<Layout>>,
}

impl<'a> ShmReader<'a> {
    pub fn new(segment: &'a Segment<Layout>) -> Self {
        ShmReader {
            layout: segment.as_ptr(),
            _segment: std::marker::PhantomData,
        }
    }

    /// A snapshot whose bookends agreed before and after it was copied.
    ///
    /// Returns the tick and record, `None` if no consistent copy was seen in
    /// [`MAX_READ_ATTEMPTS`] tries or nothing was ever published.
    pub fn read(&self) -> Option<(i32, ExportRecord)> {
        let layout = self.layout;

        for _ in 0..MAX_READ_ATTEMPTS {
            unsafe {
                let before1 = (*layout).bookend1.read();
                let before2 = (*layout).bookend2.read();
                fence(Ordering::SeqCst);
                let record = (*layout).payload.read();
                fence(Ordering::SeqCst);
                let after1 = (*layout).bookend1.read();
                let after2 = (*layout).bookend2.read();

                if before1 == before2 && before1 == after1 && after1 == after2 {
                    if before1 == 0 {
                        return None;
                    }

                    return Some((before1, record));
                }
            }

            std::hint::spin_loop();
        }

        None
    }
}
