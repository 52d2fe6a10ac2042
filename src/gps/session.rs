use crate::gps::driver::Rtcm3Message;
use crate::gps::error_model::fill_errors;
use crate::gps::Attitude;
use crate::gps::ChangedMask;
use crate::gps::Context;
use crate::gps::Dop;
use crate::gps::Driver;
use crate::gps::Fix;
use crate::gps::Gst;
use crate::gps::Mode;
use crate::gps::Oscillator;
use crate::gps::Skyview;
use crate::nmea;
use crate::packet::checksum::nmea_add_checksum;
use crate::packet::Packet;
use crate::packet::PacketType;

use bytes::Bytes;

use tracing::debug;
use tracing::info;
use tracing::trace;

/// Everything decoded from one device.
///
/// A session is owned by the device task.  [`handle`](Session::handle) applies one lexed
/// packet and returns the mask the publication path acts on.
#[derive(Clone, Debug)]
pub struct Session {
    pub path: String,
    pub context: Context,
    pub driver: Driver,
    pub packet_type: Option<PacketType>,
    /// Product and firmware reported by the receiver.
    pub subtype: String,
    pub subtype1: String,

    pub nmea: nmea::State,
    pub cycle_end_reliable: bool,

    /// Values decoded from the current packet.
    pub newdata: Fix,
    /// The running fix of this cycle.
    pub fix: Fix,
    /// The last fix with a time.
    pub lastfix: Fix,
    /// The last fix of at least 2D.
    pub oldfix: Fix,

    pub skyview: Skyview,
    pub dop: Dop,
    pub satellites_used: usize,
    pub attitude: Attitude,
    pub gst: Gst,
    pub oscillator: Oscillator,
    pub rtcm3: Option<Rtcm3Message>,

    /// A report was published since the last epoch latch.
    pub reported: bool,
    /// The fix last published this cycle.
    pub reported_fix: Option<Fix>,

    /// In-band time may be handed to NTP.
    pub ship_to_ntpd: bool,

    outbound: Vec<Bytes>,
}

impl Session {
    pub fn new(path: &str, context: Context) -> Self {
        Session {
            path: path.to_string(),
            context,
            driver: Driver::Unknown,
            packet_type: None,
            subtype: String::new(),
            subtype1: String::new(),
            nmea: nmea::State::new(nmea::tags()),
            cycle_end_reliable: false,
            newdata: Fix::default(),
            fix: Fix::default(),
            lastfix: Fix::default(),
            oldfix: Fix::default(),
            skyview: Skyview::default(),
            dop: Dop::default(),
            satellites_used: 0,
            attitude: Attitude::default(),
            gst: Gst::default(),
            oscillator: Oscillator::default(),
            rtcm3: None,
            reported: false,
            reported_fix: None,
            ship_to_ntpd: true,
            outbound: vec![],
        }
    }

    /// Queue an NMEA command for the receiver, the checksum is added.
    pub fn queue_nmea(&mut self, sentence: &str) {
        self.queue_bytes(nmea_add_checksum(sentence).as_bytes());
    }

    /// Queue raw bytes for the receiver.  Dropped on read-only devices.
    pub fn queue_bytes(&mut self, bytes: &[u8]) {
        if self.context.readonly {
            trace!("{} is read-only, {} bytes not written", self.path, bytes.len());
            return;
        }

        self.outbound.push(Bytes::copy_from_slice(bytes));
    }

    /// Commands waiting to be written to the receiver.
    pub fn take_outbound(&mut self) -> Vec<Bytes> {
        std::mem::take(&mut self.outbound)
    }

    /// Forget the decoded state after the device closes, learned cycle enders included.
    pub fn reset(&mut self) {
        let path = std::mem::take(&mut self.path);
        let context = self.context.clone();

        *self = Session::new(&path, context);
    }

    /// Apply one packet, returning what changed.
    pub fn handle(&mut self, packet: &Packet) -> ChangedMask {
        self.newdata = Fix::default();

        if packet.kind == PacketType::Comment {
            self.comment(packet);
            return ChangedMask::ONLINE;
        }

        let mut mask = ChangedMask::empty();

        let driver = self.driver.rebind(packet);

        if driver != self.driver {
            info!("{} driver {} bound, was {}", self.path, driver, self.driver);

            self.driver = driver;
            mask |= ChangedMask::DRIVER;

            if !self.context.passive {
                for command in driver.init_commands() {
                    self.queue_bytes(&command);
                }
            }
        }

        self.packet_type = Some(packet.kind);

        mask |= driver.parse_input(packet, self);

        // until the cycle ender is learned every new position is worth a report
        if !self.cycle_end_reliable
            && mask.intersects(ChangedMask::ATTITUDE | ChangedMask::LATLON | ChangedMask::MODE)
        {
            mask |= ChangedMask::REPORT;
        }

        if mask.contains(ChangedMask::EPOCH) {
            self.reported = false;
        }

        if mask.contains(ChangedMask::CLEAR) {
            self.attitude.clear();

            if !mask.contains(ChangedMask::DOP) {
                self.dop.clear();
            }

            self.fix.clear();
            self.reported_fix = None;
        }

        self.fix.merge(mask, &self.newdata);

        if mask.contains(ChangedMask::SATELLITE) && self.skyview.visible() > 0 {
            mask |= self.dop.fill(&self.skyview);
        }

        fill_errors(&mut self.fix, &self.dop);

        if mask.contains(ChangedMask::MODE) {
            if self.fix.mode >= Mode::Fix2D {
                self.context.fixcnt = self.context.fixcnt.saturating_add(1);
            } else {
                self.context.fixcnt = 0;
            }
        }

        if mask.contains(ChangedMask::TIME) && self.fix.time.is_some() {
            self.lastfix = self.fix.clone();
        }

        if self.fix.mode >= Mode::Fix2D {
            self.oldfix = self.fix.clone();
        }

        if mask.contains(ChangedMask::REPORT) {
            self.suppress_duplicate(&mut mask);
        }

        trace!("{} {} changed {}", self.path, packet.kind, mask);

        mask
    }

    // at most one report per epoch, and never the same fix twice in one cycle
    fn suppress_duplicate(&mut self, mask: &mut ChangedMask) {
        if self.reported || self.reported_fix.as_ref() == Some(&self.fix) {
            trace!("{} duplicate report suppressed", self.path);
            mask.remove(ChangedMask::REPORT);
            return;
        }

        self.reported = true;
        self.reported_fix = Some(self.fix.clone());
    }

    fn comment(&mut self, packet: &Packet) {
        let text = match packet.text() {
            Some(text) => text,
            None => return,
        };

        let date = match text.strip_prefix("# Date:") {
            Some(date) => date.trim(),
            None => return,
        };

        match date.get(0..4).and_then(|year| year.parse::<i32>().ok()) {
            Some(year) => self.context.set_year(year),
            None => debug!("{} malformed date comment {:?}", self.path, text),
        }
    }
}
