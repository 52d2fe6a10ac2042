use crate::gps::ChangedMask;
use crate::gps::Mode;
use crate::gps::Session;
use crate::gps::NTP_MIN_FIXES;
use crate::gpsd::json::encode;
use crate::gpsd::Att;
use crate::gpsd::Gst;
use crate::gpsd::Osc;
use crate::gpsd::Publication;
use crate::gpsd::Rtcm3;
use crate::gpsd::Sky;
use crate::gpsd::Toff;
use crate::gpsd::Tpv;
use crate::packet::Packet;
use crate::packet::PacketType;
use crate::shm::ExportRecord;
use crate::timestamp::Timestamp;

use bytes::Bytes;

use tracing::trace;

/// Fixes a DGPSIP server waits for before it is told where we are.
pub const CASTER_MIN_FIXES: u32 = 10;

/// A position good enough to pick DGPS corrections with.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CasterFix {
    pub lat: f64,
    pub lon: f64,
    pub alt: f64,
}

/// What one packet means outside its device.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Report {
    pub publication: Publication,
    /// Receiver time worth handing to NTP.
    pub in_band: Option<Timestamp>,
    /// A fresh snapshot for the SHM export.
    pub export: Option<ExportRecord>,
    /// RTCM corrections for the other receivers.
    pub corrections: Option<Bytes>,
    pub caster_fix: Option<CasterFix>,
}

/// Turns a session's change masks into reports.
#[derive(Clone, Debug, Default)]
pub struct Reporter {
    /// Changes held back until the cycle is reported.
    pending: ChangedMask,
    /// Second of the last in-band time shipped.
    last_toff: Option<i64>,
    /// NTP unit in-band time is written to, named in `TOFF`.
    pub ntp_unit: Option<i32>,
    /// When the device was activated, for the SHM export.
    pub online: f64,
}

impl Reporter {
    pub fn new(ntp_unit: Option<i32>, online: f64) -> Self {
        Reporter {
            ntp_unit,
            online,
            ..Reporter::default()
        }
    }

    /// Build the report for `packet`, which changed `changed` in `session`.
    ///
    /// `clock` is the system time the packet was read at.
    pub fn report(
        &mut self,
        session: &mut Session,
        packet: Packet,
        mut changed: ChangedMask,
        clock: (i64, u32),
    ) -> Report {
        let mut report = Report {
            publication: Publication::new(&session.path),
            ..Report::default()
        };

        if changed.contains(ChangedMask::CLEAR) {
            session.ship_to_ntpd = false;
        }

        if changed.contains(ChangedMask::NTPTIME) {
            session.ship_to_ntpd = true;
        }

        report.in_band = self.in_band(session, changed, clock);

        if let Some(in_band) = &report.in_band {
            report.publication.toff = Some(encode(&Toff::new(in_band, self.ntp_unit)));
        }

        if changed.contains(ChangedMask::RTCM3) {
            report.corrections = Some(packet.bytes.clone());
        }

        if changed.intersects(
            ChangedMask::ATTITUDE
                | ChangedMask::GST
                | ChangedMask::DOP
                | ChangedMask::REPORT
                | ChangedMask::SATELLITE
                | ChangedMask::RTCM3,
        ) {
            report.export = Some(ExportRecord::from_session(session, self.online));
        }

        if !changed.intersects(ChangedMask::PASSTHROUGH | ChangedMask::REPORT) {
            self.pending |= changed;
        } else {
            changed |= self.pending;
            self.pending = ChangedMask::empty();
        }

        if changed.contains(ChangedMask::REPORT)
            && session.fix.mode == Mode::Fix3D
            && session.context.fixcnt > CASTER_MIN_FIXES
        {
            report.caster_fix = caster_fix(session);
        }

        if changed.contains(ChangedMask::PASSTHROUGH) && packet.kind == PacketType::Json {
            report.publication.passthrough = Some(packet.bytes.clone());
        } else if !changed.data().is_empty() || changed.contains(ChangedMask::REPORT) {
            reports(&mut report.publication, session, changed);
        }

        report.publication.packet = Some(packet);

        report
    }

    /// In-band time goes to NTP once a second, only after enough fixes that the receiver's
    /// clock can be trusted, and only from cycles whose time was marked good.
    fn in_band(&mut self, session: &Session, changed: ChangedMask, clock: (i64, u32)) -> Option<Timestamp> {
        if !changed.contains(ChangedMask::TIME) || !session.ship_to_ntpd {
            return None;
        }

        let context = &session.context;

        if context.fixcnt <= NTP_MIN_FIXES && !context.battery_rtc {
            trace!("{} only {} fixes, no time for NTP", session.path, context.fixcnt);
            return None;
        }

        let time = session.newdata.time.filter(|time| time.timestamp() > 0)?;

        if self.last_toff == Some(time.timestamp()) {
            return None;
        }

        self.last_toff = Some(time.timestamp());

        Some(Timestamp::in_band(&session.path, &time, clock))
    }
}

fn caster_fix(session: &Session) -> Option<CasterFix> {
    let fix = &session.fix;

    Some(CasterFix {
        lat: fix.latitude?,
        lon: fix.longitude?,
        alt: fix.alt_msl.unwrap_or(0.0),
    })
}

fn reports(publication: &mut Publication, session: &Session, changed: ChangedMask) {
    if changed.contains(ChangedMask::REPORT) {
        let tpv = Tpv::new(session, changed);
        publication.reports.push(encode(&tpv));
        publication.tpv = Some(tpv);

        if changed.contains(ChangedMask::ATTITUDE) {
            publication
                .reports
                .push(encode(&Att::new(&session.path, &session.attitude)));
        }
    }

    if changed.contains(ChangedMask::GST) {
        if let Some(gst) = Gst::new(session) {
            publication.reports.push(encode(&gst));
            publication.gst = Some(gst);
        }
    }

    if changed.intersects(ChangedMask::DOP | ChangedMask::SATELLITE) {
        if let Some(sky) = Sky::new(session) {
            publication.reports.push(encode(&sky));
            publication.sky = Some(sky);
        }
    }

    if changed.contains(ChangedMask::OSCILLATOR) {
        publication.reports.push(encode(&Osc::new(session)));
    }

    if changed.contains(ChangedMask::RTCM3) {
        if let Some(rtcm3) = Rtcm3::new(session) {
            publication.reports.push(encode(&rtcm3));
        }
    }
}
