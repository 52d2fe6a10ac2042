use crate::gps::time::parse_iso8601;
use crate::gps::ChangedMask;
use crate::gps::Mode;
use crate::gps::Session;
use crate::gps::Status;
use crate::nmea;
use crate::nmea::command;
use crate::nmea::command::GarminSensorConfig;
use crate::nmea::command::MtkQueryRelease;
use crate::nmea::command::MtkSetBaud;
use crate::nmea::command::MtkSetFixInterval;
use crate::nmea::command::MtkSetNmeaOutput;
use crate::nmea::command::UbxConfig;
use crate::nmea::command::UbxPort;
use crate::nmea::command::UbxProtocols;
use crate::nmea::command::UbxRate;
use crate::packet::Packet;
use crate::packet::PacketType;

use bytes::Bytes;

use serde::Serialize;
use serde_json::Value;

use std::fmt;

use tracing::debug;
use tracing::error;
use tracing::trace;

/// Decoder bound to a device.
///
/// The registry order is the binding preference for a packet type, vendor NMEA dialects are
/// only reached by promotion from `Generic` when a proprietary sentence shows up.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Driver {
    Unknown,
    Generic,
    Mtk3301,
    UbloxNmea,
    Garmin,
    Skytraq,
    Ashtech,
    Rtcm3,
    Json,
    Ubx,
    Sirf,
}

pub const REGISTRY: [Driver; 11] = [
    Driver::Unknown,
    Driver::Generic,
    Driver::Mtk3301,
    Driver::UbloxNmea,
    Driver::Garmin,
    Driver::Skytraq,
    Driver::Ashtech,
    Driver::Rtcm3,
    Driver::Json,
    Driver::Ubx,
    Driver::Sirf,
];

impl Default for Driver {
    fn default() -> Self {
        Driver::Unknown
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

fn sentence<T: Serialize>(command: &T) -> Option<Bytes> {
    match command::to_sentence(command) {
        Ok(sentence) => Some(Bytes::from(sentence)),
        Err(e) => {
            error!("unable to build receiver command: {}", e);
            None
        }
    }
}

impl Driver {
    pub fn type_name(&self) -> &'static str {
        match self {
            Driver::Unknown => "Unknown",
            Driver::Generic => "NMEA0183",
            Driver::Mtk3301 => "MTK-3301",
            Driver::UbloxNmea => "u-blox NMEA",
            Driver::Garmin => "Garmin NMEA",
            Driver::Skytraq => "Skytraq",
            Driver::Ashtech => "Ashtech",
            Driver::Rtcm3 => "RTCM104V3",
            Driver::Json => "JSON slave driver",
            Driver::Ubx => "u-blox",
            Driver::Sirf => "SiRF",
        }
    }

    pub fn packet_type(&self) -> PacketType {
        match self {
            Driver::Unknown => PacketType::Comment,
            Driver::Generic
            | Driver::Mtk3301
            | Driver::UbloxNmea
            | Driver::Garmin
            | Driver::Skytraq
            | Driver::Ashtech => PacketType::Nmea,
            Driver::Rtcm3 => PacketType::Rtcm3,
            Driver::Json => PacketType::Json,
            Driver::Ubx => PacketType::Ubx,
            Driver::Sirf => PacketType::Sirf,
        }
    }

    /// Proprietary sentence prefix that promotes a generic NMEA binding to this driver.
    pub fn trigger(&self) -> Option<&'static str> {
        match self {
            Driver::Mtk3301 => Some("$PMTK"),
            Driver::UbloxNmea => Some("$PUBX"),
            Driver::Garmin => Some("$PGRM"),
            Driver::Skytraq => Some("$PSTI"),
            Driver::Ashtech => Some("$PASH"),
            _ => None,
        }
    }

    /// Decodes NMEA, natively or alongside its binary protocol.
    pub fn speaks_nmea(&self) -> bool {
        matches!(
            self,
            Driver::Generic
                | Driver::Mtk3301
                | Driver::UbloxNmea
                | Driver::Garmin
                | Driver::Skytraq
                | Driver::Ashtech
                | Driver::Ubx
                | Driver::Sirf
        )
    }

    /// Accepts RTCM corrections from other devices.
    pub fn rtcm_writer(&self) -> bool {
        self.speaks_nmea()
    }

    /// Shortest reporting cycle in seconds.
    pub fn min_cycle(&self) -> f64 {
        match self {
            Driver::Mtk3301 => 0.1,
            Driver::UbloxNmea | Driver::Ubx => 0.25,
            _ => 1.0,
        }
    }

    /// The binding for `packet`, given the current one.
    ///
    /// Every NMEA sentence is checked against the vendor triggers, the first one included, and
    /// a match switches to that vendor.  A driver that doesn't speak NMEA falls back to generic
    /// NMEA, one that does is never downgraded.  A binary packet type the current driver can't
    /// decode rebinds to the first registry entry for it.  Comments never change the binding.
    pub fn rebind(&self, packet: &Packet) -> Driver {
        match packet.kind {
            PacketType::Comment => *self,
            PacketType::Nmea | PacketType::Ais => {
                let current = if self.speaks_nmea() {
                    *self
                } else {
                    Driver::Generic
                };

                packet
                    .text()
                    .and_then(|text| {
                        REGISTRY.iter().find(|driver| {
                            matches!(driver.trigger(), Some(trigger) if text.starts_with(trigger))
                        })
                    })
                    .copied()
                    .unwrap_or(current)
            }
            kind if kind == self.packet_type() => *self,
            kind => REGISTRY
                .iter()
                .find(|driver| driver.packet_type() == kind)
                .copied()
                .unwrap_or(*self),
        }
    }

    /// Sentences that put a freshly bound receiver into the state the decoder wants.
    pub fn init_commands(&self) -> Vec<Bytes> {
        match self {
            Driver::Mtk3301 => [
                sentence(&MtkSetNmeaOutput::standard()),
                sentence(&MtkQueryRelease {}),
            ]
            .into_iter()
            .flatten()
            .collect(),
            Driver::UbloxNmea => [
                ("GGA", true),
                ("GSA", true),
                ("GSV", true),
                ("RMC", true),
                ("ZDA", true),
                ("GLL", false),
                ("VTG", false),
            ]
            .iter()
            .filter_map(|(message, enabled)| sentence(&UbxRate::uart1(message, *enabled)))
            .collect(),
            Driver::Ashtech => vec![Bytes::from(crate::packet::checksum::nmea_add_checksum(
                "$PASHQ,RID",
            ))],
            _ => vec![],
        }
    }

    /// Command changing the receiver line speed, `None` when the driver can't.
    pub fn speed_command(&self, speed: u32, parity: char, stopbits: u8) -> Option<Bytes> {
        match self {
            Driver::Mtk3301 if parity == 'N' && stopbits == 1 => {
                sentence(&MtkSetBaud { baudrate: speed })
            }
            Driver::UbloxNmea if parity == 'N' && stopbits == 1 => sentence(&UbxConfig {
                port: UbxPort::Usart1,
                in_proto: UbxProtocols::UBX | UbxProtocols::NMEA | UbxProtocols::RTCM2,
                out_proto: UbxProtocols::NMEA,
                baudrate: speed,
                autobauding: false,
            }),
            Driver::Garmin => GarminSensorConfig::speed(speed).and_then(|c| sentence(&c)),
            _ => None,
        }
    }

    /// Command switching between NMEA and the native binary protocol.
    pub fn mode_command(&self, native: bool, speed: u32) -> Option<Bytes> {
        match self {
            Driver::UbloxNmea | Driver::Ubx => {
                let out_proto = if native {
                    UbxProtocols::UBX
                } else {
                    UbxProtocols::NMEA
                };

                sentence(&UbxConfig {
                    port: UbxPort::Usart1,
                    in_proto: UbxProtocols::UBX | UbxProtocols::NMEA | UbxProtocols::RTCM2,
                    out_proto,
                    baudrate: speed,
                    autobauding: false,
                })
            }
            _ => None,
        }
    }

    /// Command changing the reporting cycle, in seconds.
    pub fn rate_command(&self, cycle: f64) -> Option<Bytes> {
        match self {
            Driver::Mtk3301 if cycle >= self.min_cycle() => sentence(&MtkSetFixInterval {
                interval: (cycle * 1000.0).round() as u32,
            }),
            _ => None,
        }
    }

    /// Decode one packet into `session`.
    pub fn parse_input(&self, packet: &Packet, session: &mut Session) -> ChangedMask {
        match packet.kind {
            PacketType::Nmea if self.speaks_nmea() => match packet.text() {
                Some(text) => nmea::parse(text, session),
                None => ChangedMask::ONLINE,
            },
            PacketType::Rtcm3 => rtcm3(packet, session),
            PacketType::Json => json(packet, session),
            // vendor binary decoding is left to external drivers
            kind => {
                trace!("{} packet of {} bytes not decoded", kind, packet.len());
                ChangedMask::ONLINE
            }
        }
    }
}

/// Header of an RTCM3 message, the body is forwarded undecoded.
#[derive(Clone, Debug, PartialEq)]
pub struct Rtcm3Message {
    pub message_type: u16,
    pub length: usize,
    pub data: Bytes,
}

fn rtcm3(packet: &Packet, session: &mut Session) -> ChangedMask {
    let bytes = &packet.bytes;

    if bytes.len() < 6 {
        return ChangedMask::ONLINE;
    }

    let length = (((bytes[1] & 0x03) as usize) << 8) | bytes[2] as usize;
    let message_type = ((bytes[3] as u16) << 4) | (bytes[4] as u16 >> 4);

    debug!("RTCM3 message type {} length {}", message_type, length);

    session.rtcm3 = Some(Rtcm3Message {
        message_type,
        length,
        data: packet.bytes.clone(),
    });

    ChangedMask::ONLINE | ChangedMask::RTCM3
}

fn status_from_json(status: i64) -> Status {
    match status {
        1 => Status::Gps,
        2 => Status::Dgps,
        3 => Status::RtkFix,
        4 => Status::RtkFloat,
        5 => Status::DeadReckoning,
        6 => Status::GnssDr,
        7 => Status::Time,
        8 => Status::Simulated,
        9 => Status::PpsFix,
        _ => Status::Unknown,
    }
}

// a remote daemon's reports are relayed, TPV is also decoded for time service
fn json(packet: &Packet, session: &mut Session) -> ChangedMask {
    let mask = ChangedMask::ONLINE | ChangedMask::PASSTHROUGH;

    let value: Value = match serde_json::from_slice(&packet.bytes) {
        Ok(value) => value,
        Err(e) => {
            debug!("unparseable JSON from remote daemon: {}", e);
            return ChangedMask::ONLINE;
        }
    };

    if value["class"] != "TPV" {
        return mask;
    }

    let mut mask = mask;
    let newdata = &mut session.newdata;

    if let Some(time) = value["time"].as_str().and_then(parse_iso8601) {
        newdata.time = Some(time);
        mask |= ChangedMask::TIME | ChangedMask::NTPTIME;
    }

    if let Some(mode) = value["mode"].as_i64() {
        newdata.mode = match mode {
            1 => Mode::NoFix,
            2 => Mode::Fix2D,
            3 => Mode::Fix3D,
            _ => Mode::NotSeen,
        };
        mask |= ChangedMask::MODE;
    }

    if let Some(status) = value["status"].as_i64() {
        newdata.status = status_from_json(status);
        mask |= ChangedMask::STATUS;
    }

    if let (Some(lat), Some(lon)) = (value["lat"].as_f64(), value["lon"].as_f64()) {
        newdata.latitude = Some(lat);
        newdata.longitude = Some(lon);
        mask |= ChangedMask::LATLON;
    }

    newdata.alt_hae = value["altHAE"].as_f64();
    newdata.alt_msl = value["altMSL"].as_f64();

    if newdata.has_altitude() {
        mask |= ChangedMask::ALTITUDE;
    }

    for (key, target, bit) in [
        ("speed", &mut newdata.speed, ChangedMask::SPEED),
        ("track", &mut newdata.track, ChangedMask::TRACK),
        ("climb", &mut newdata.climb, ChangedMask::CLIMB),
    ] {
        if let Some(v) = value[key].as_f64() {
            *target = Some(v);
            mask |= bit;
        }
    }

    mask
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nmea(text: &str) -> Packet {
        Packet {
            kind: PacketType::Nmea,
            bytes: Bytes::from(format!("{}\r\n", text)),
        }
    }

    #[test]
    fn test_rebind_first_packet() {
        let packet = nmea("$GPGGA,,,,,,0,,,,,,,,*66");

        assert_eq!(Driver::Generic, Driver::Unknown.rebind(&packet));

        let packet = Packet {
            kind: PacketType::Rtcm3,
            bytes: Bytes::from_static(b"\xd3\x00\x00\x47\xea\x4b"),
        };

        assert_eq!(Driver::Rtcm3, Driver::Unknown.rebind(&packet));

        let packet = nmea("$PMTK001,604,3*32");

        assert_eq!(Driver::Mtk3301, Driver::Unknown.rebind(&packet));
    }

    #[test]
    fn test_rebind_promotion() {
        let packet = nmea("$PMTK001,604,3*32");

        assert_eq!(Driver::Mtk3301, Driver::Generic.rebind(&packet));

        let packet = nmea("$PGRMT,GPS 15x-W software ver. 2.90,,,,,,,,*67");

        assert_eq!(Driver::Garmin, Driver::Generic.rebind(&packet));
    }

    #[test]
    fn test_rebind_no_downgrade() {
        let packet = nmea("$GPGGA,,,,,,0,,,,,,,,*66");

        assert_eq!(Driver::Mtk3301, Driver::Mtk3301.rebind(&packet));

        let packet = Packet {
            kind: PacketType::Rtcm3,
            bytes: Bytes::from_static(b"\xd3\x00\x00\x47\xea\x4b"),
        };

        assert_eq!(Driver::Rtcm3, Driver::Mtk3301.rebind(&packet));
    }

    #[test]
    fn test_rebind_vendor_switch() {
        let packet = nmea("$PGRMT,GPS 15x-W software ver. 2.90,,,,,,,,*67");

        assert_eq!(Driver::Garmin, Driver::Mtk3301.rebind(&packet));
        assert_eq!(Driver::Garmin, Driver::Garmin.rebind(&packet));
    }

    #[test]
    fn test_rebind_comment() {
        let packet = Packet {
            kind: PacketType::Comment,
            bytes: Bytes::from_static(b"# Date: 2019-04-01\n"),
        };

        assert_eq!(Driver::Garmin, Driver::Garmin.rebind(&packet));
    }

    #[test]
    fn test_capabilities() {
        assert!(Driver::Generic.speed_command(9600, 'N', 1).is_none());
        assert!(Driver::Mtk3301.speed_command(9600, 'E', 1).is_none());

        assert_eq!(
            Bytes::from("$PMTK251,38400*27\r\n"),
            Driver::Mtk3301.speed_command(38400, 'N', 1).unwrap()
        );

        assert_eq!(
            Bytes::from("$PMTK220,200*2C\r\n"),
            Driver::Mtk3301.rate_command(0.2).unwrap()
        );

        assert!(Driver::Mtk3301.mode_command(true, 9600).is_none());
        assert!(Driver::UbloxNmea.mode_command(true, 9600).is_some());

        assert!(Driver::Generic.rtcm_writer());
        assert!(!Driver::Rtcm3.rtcm_writer());
    }

    #[test]
    fn test_init_commands() {
        assert!(Driver::Generic.init_commands().is_empty());

        let init = Driver::Mtk3301.init_commands();

        assert_eq!(2, init.len());
        assert!(init[0].starts_with(b"$PMTK314,"));
        assert_eq!(Bytes::from("$PMTK605*31\r\n"), init[1]);

        assert_eq!(7, Driver::UbloxNmea.init_commands().len());
    }
}
