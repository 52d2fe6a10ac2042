use super::response::hexdump;
use super::response::Gst;
use super::response::Sky;
use super::response::Tpv;
use super::watch::Watch;

use crate::packet::Packet;

use bytes::Bytes;
use bytes::BytesMut;

/// Everything one device packet produced for subscribers, serialized once.
///
/// [`lines_for`](Publication::lines_for) picks what a single watch policy receives.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Publication {
    pub device: String,
    /// The packet itself, for raw and NMEA watchers.
    pub packet: Option<Packet>,
    /// A JSON object from a remote daemon, forwarded instead of everything else.
    pub passthrough: Option<Bytes>,
    /// `DEVICE` notice after a driver change.
    pub notice: Option<Bytes>,
    /// TPV, ATT, GST, SKY, OSC and RTCM3 lines for JSON watchers.
    pub reports: Vec<Bytes>,
    pub toff: Option<Bytes>,
    pub pps: Option<Bytes>,

    /// Latest objects kept for `?POLL`.
    pub tpv: Option<Tpv>,
    pub sky: Option<Sky>,
    pub gst: Option<Gst>,
}

impl Publication {
    pub fn new(device: &str) -> Self {
        Publication {
            device: device.to_string(),
            ..Publication::default()
        }
    }

    /// Nothing for any subscriber.
    pub fn is_empty(&self) -> bool {
        self.packet.is_none()
            && self.passthrough.is_none()
            && self.notice.is_none()
            && self.reports.is_empty()
            && self.toff.is_none()
            && self.pps.is_none()
    }

    /// The lines a subscriber with `policy` receives, in order.
    pub fn lines_for(&self, policy: &Watch) -> Vec<Bytes> {
        let mut lines = vec![];

        if !policy.subscribed(&self.device) {
            return lines;
        }

        if policy.json {
            lines.extend(self.notice.iter().cloned());
        }

        if let Some(passthrough) = &self.passthrough {
            lines.push(passthrough.clone());
            return lines;
        }

        if let Some(packet) = &self.packet {
            lines.extend(raw_report(policy, packet));
        }

        if policy.json {
            lines.extend(self.reports.iter().cloned());
        }

        if policy.timing {
            lines.extend(self.toff.iter().cloned());
        }

        if policy.pps {
            lines.extend(self.pps.iter().cloned());
        }

        lines
    }
}

/// Text packets verbatim for raw or NMEA watchers, binary packets verbatim at raw 2 and hex
/// dumped at raw 1.
fn raw_report(policy: &Watch, packet: &Packet) -> Option<Bytes> {
    if packet.kind.is_text() && policy.wants_packets() {
        return Some(packet.bytes.clone());
    }

    match policy.raw {
        0 => None,
        1 => {
            let mut line = BytesMut::from(hexdump(&packet.bytes).as_bytes());
            line.extend_from_slice(b"\r\n");

            Some(line.freeze())
        }
        _ => Some(packet.bytes.clone()),
    }
}
