pub mod checksum;
mod codec;
mod lexer;

pub use codec::Codec;
pub use lexer::Lexer;
pub use lexer::Statistics;
pub use lexer::MAX_PACKET_LENGTH;
pub use lexer::NMEA_MAX;
pub use lexer::NMEA_STRICT_MAX;
pub use lexer::RTCM3_MAX;

use bytes::Bytes;

use std::fmt;

/// Protocol family of a lexed frame.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum PacketType {
    Nmea,
    Ais,
    Comment,
    Json,
    Ubx,
    Sirf,
    Skytraq,
    Rtcm3,
}

impl PacketType {
    /// Text families are forwarded verbatim to raw and NMEA watchers.
    pub fn is_text(&self) -> bool {
        matches!(
            self,
            PacketType::Nmea | PacketType::Ais | PacketType::Comment | PacketType::Json
        )
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PacketType::Nmea => "NMEA",
            PacketType::Ais => "AIVDM",
            PacketType::Comment => "comment",
            PacketType::Json => "JSON",
            PacketType::Ubx => "UBX",
            PacketType::Sirf => "SiRF",
            PacketType::Skytraq => "Skytraq",
            PacketType::Rtcm3 => "RTCM3",
        };

        write!(f, "{}", name)
    }
}

/// One complete frame with its raw bytes, line ending included.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Packet {
    pub kind: PacketType,
    pub bytes: Bytes,
}

impl Packet {
    /// The frame as text without its line ending, for text families only.
    pub fn text(&self) -> Option<&str> {
        if !self.kind.is_text() {
            return None;
        }

        std::str::from_utf8(&self.bytes)
            .ok()
            .map(|t| t.trim_end_matches(|c| c == '\r' || c == '\n'))
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
