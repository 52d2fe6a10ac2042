use crate::packet::checksum;
use crate::packet::Packet;
use crate::packet::PacketType;

use bytes::Buf;
use bytes::BytesMut;

use nom::bytes::streaming::tag;
use nom::bytes::streaming::take;
use nom::bytes::streaming::take_till;
use nom::bytes::streaming::take_while;
use nom::bytes::streaming::take_while_m_n;
use nom::combinator::map_res;
use nom::combinator::opt;
use nom::number::streaming::be_u16;
use nom::number::streaming::le_u16;
use nom::number::streaming::u8 as byte;
use nom::sequence::preceded;
use nom::Err;
use nom::IResult;

use std::collections::HashMap;

use tracing::debug;
use tracing::trace;

/// Longest NMEA sentence accepted in lenient mode, lead character through line ending.
pub const NMEA_MAX: usize = 130;
/// Longest NMEA sentence allowed by the standard.
pub const NMEA_STRICT_MAX: usize = 82;
/// No frame of any family may be longer than this.
pub const MAX_PACKET_LENGTH: usize = 9216;
/// Largest RTCM 3 message relayed.  A frame is at most 3 header bytes, 1023 payload bytes and a
/// 3 byte CRC, so every well formed frame fits.
pub const RTCM3_MAX: usize = 1040;

const UBX_SYNC: &[u8] = &[0xb5, 0x62];
const SIRF_LEAD: &[u8] = &[0xa0, 0xa2];
const SIRF_TRAIL: &[u8] = &[0xb0, 0xb3];
const SKYTRAQ_LEAD: &[u8] = &[0xa0, 0xa1];
const SKYTRAQ_TRAIL: &[u8] = &[0x0d, 0x0a];
const RTCM3_PREAMBLE: &[u8] = &[0xd3];

/// Outcome of running one recognizer against the head of the buffer.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Recognized {
    Accept(usize),
    Incomplete,
    Reject,
}

/// What the lexer should do with the head of its buffer.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Scan {
    Packet(PacketType, usize),
    Skip,
    NeedMore,
}

type Recognizer = fn(&[u8], bool) -> Recognized;

const RECOGNIZERS: [(PacketType, Recognizer); 8] = [
    (PacketType::Nmea, recognize_nmea),
    (PacketType::Ais, recognize_ais),
    (PacketType::Comment, recognize_comment),
    (PacketType::Json, recognize_json),
    (PacketType::Ubx, recognize_ubx),
    (PacketType::Sirf, recognize_sirf),
    (PacketType::Skytraq, recognize_skytraq),
    (PacketType::Rtcm3, recognize_rtcm3),
];

/// Run every recognizer over the head of `input`.
///
/// The shortest accepted frame wins, that is the frame a byte-at-a-time state machine would
/// have completed first.  When no recognizer accepts but one is still live the caller must wait
/// for more input.  When every recognizer rejects the head byte is garbage.
pub(crate) fn scan(input: &[u8], strict: bool) -> Scan {
    if input.is_empty() {
        return Scan::NeedMore;
    }

    let mut best: Option<(PacketType, usize)> = None;
    let mut live = false;

    for (kind, recognizer) in RECOGNIZERS.iter() {
        match recognizer(input, strict) {
            Recognized::Accept(length) => match best {
                Some((_, l)) if l <= length => (),
                _ => best = Some((*kind, length)),
            },
            Recognized::Incomplete => live = true,
            Recognized::Reject => (),
        }
    }

    match best {
        Some((kind, length)) => Scan::Packet(kind, length),
        None if live && input.len() < MAX_PACKET_LENGTH => Scan::NeedMore,
        None => Scan::Skip,
    }
}

/// Convert a streaming parse into a recognizer outcome.
///
/// `valid` checks the trailer of a complete frame; `max` bounds how long a partial frame may
/// stay live.
fn outcome<T>(
    input: &[u8],
    max: usize,
    result: IResult<&[u8], T, ()>,
    valid: impl Fn(&[u8], T) -> bool,
) -> Recognized {
    match result {
        Ok((rest, value)) => {
            let length = input.len() - rest.len();

            if length <= max && valid(&input[..length], value) {
                Recognized::Accept(length)
            } else {
                Recognized::Reject
            }
        }
        Err(Err::Incomplete(_)) if input.len() < max => Recognized::Incomplete,
        Err(_) => Recognized::Reject,
    }
}

fn is_printable(c: u8) -> bool {
    (0x20..=0x7e).contains(&c)
}

fn hex_byte(input: &[u8]) -> IResult<&[u8], u8, ()> {
    map_res(
        take_while_m_n(2, 2, |c: u8| c.is_ascii_hexdigit()),
        |h: &[u8]| u8::from_str_radix(std::str::from_utf8(h).map_err(|_| ())?, 16).map_err(|_| ()),
    )(input)
}

fn line_end(input: &[u8]) -> IResult<&[u8], &[u8], ()> {
    preceded(opt(tag(b"\r")), tag(b"\n"))(input)
}

fn sentence<'a>(lead: &'static [u8], input: &'a [u8]) -> IResult<&'a [u8], (&'a [u8], Option<u8>), ()> {
    let (rest, _) = tag(lead)(input)?;
    let (rest, body) = take_while(|c| is_printable(c) && c != b'*' && c != b'$')(rest)?;
    let (rest, given) = opt(preceded(tag(b"*"), hex_byte))(rest)?;
    let (rest, _) = line_end(rest)?;

    Ok((rest, (body, given)))
}

fn nmea_limit(strict: bool) -> usize {
    if strict {
        NMEA_STRICT_MAX
    } else {
        NMEA_MAX
    }
}

fn checksum_matches(body: &[u8], given: Option<u8>) -> bool {
    match given {
        Some(given) => given == checksum::nmea_checksum(body),
        None => true,
    }
}

fn recognize_nmea(input: &[u8], strict: bool) -> Recognized {
    outcome(input, nmea_limit(strict), sentence(b"$", input), |_, (body, given)| {
        checksum_matches(body, given)
    })
}

fn recognize_ais(input: &[u8], strict: bool) -> Recognized {
    outcome(input, nmea_limit(strict), sentence(b"!", input), |_, (body, given)| {
        checksum_matches(body, given)
    })
}

fn recognize_comment(input: &[u8], _strict: bool) -> Recognized {
    let result = preceded(
        tag(b"#"),
        preceded(take_while(|c| is_printable(c) || c == b'\t'), line_end),
    )(input);

    outcome(input, MAX_PACKET_LENGTH, result, |_, _| true)
}

fn recognize_json(input: &[u8], _strict: bool) -> Recognized {
    let result = preceded(
        tag(b"{"),
        preceded(
            take_till(|c: u8| c == b'\n' || (c < 0x20 && c != b'\r' && c != b'\t')),
            tag(b"\n"),
        ),
    )(input);

    outcome(input, MAX_PACKET_LENGTH, result, |frame, _| {
        let line = frame.strip_suffix(b"\n").unwrap_or(frame);
        let line = line.strip_suffix(b"\r").unwrap_or(line);

        line.ends_with(b"}")
    })
}

/// Payload length from a binary header, rejected at once when the frame could never fit.
fn payload_length(length: u16, overhead: usize) -> Result<usize, Err<()>> {
    let length = length as usize;

    if length + overhead > MAX_PACKET_LENGTH {
        return Err(Err::Error(()));
    }

    Ok(length)
}

fn ubx_frame(input: &[u8]) -> IResult<&[u8], (u8, u8), ()> {
    let (rest, _) = tag(UBX_SYNC)(input)?;
    let (rest, _) = take(2usize)(rest)?;
    let (rest, length) = le_u16(rest)?;
    let length = payload_length(length, 8)?;
    let (rest, _) = take(length)(rest)?;
    let (rest, ck_a) = byte(rest)?;
    let (rest, ck_b) = byte(rest)?;

    Ok((rest, (ck_a, ck_b)))
}

fn recognize_ubx(input: &[u8], _strict: bool) -> Recognized {
    outcome(input, MAX_PACKET_LENGTH, ubx_frame(input), |frame, given| {
        checksum::fletcher8(&frame[2..frame.len() - 2]) == given
    })
}

fn sirf_frame(input: &[u8]) -> IResult<&[u8], u16, ()> {
    let (rest, _) = tag(SIRF_LEAD)(input)?;
    let (rest, length) = be_u16(rest)?;
    let length = payload_length(length & 0x7fff, 8)?;
    let (rest, _) = take(length)(rest)?;
    let (rest, sum) = be_u16(rest)?;
    let (rest, _) = tag(SIRF_TRAIL)(rest)?;

    Ok((rest, sum))
}

fn recognize_sirf(input: &[u8], _strict: bool) -> Recognized {
    outcome(input, MAX_PACKET_LENGTH, sirf_frame(input), |frame, given| {
        checksum::sirf_checksum(&frame[4..frame.len() - 4]) == given
    })
}

fn skytraq_frame(input: &[u8]) -> IResult<&[u8], u8, ()> {
    let (rest, _) = tag(SKYTRAQ_LEAD)(input)?;
    let (rest, length) = be_u16(rest)?;
    let length = payload_length(length, 7)?;
    let (rest, _) = take(length)(rest)?;
    let (rest, sum) = byte(rest)?;
    let (rest, _) = tag(SKYTRAQ_TRAIL)(rest)?;

    Ok((rest, sum))
}

fn recognize_skytraq(input: &[u8], _strict: bool) -> Recognized {
    outcome(input, MAX_PACKET_LENGTH, skytraq_frame(input), |frame, given| {
        frame.len() > 7 && checksum::xor_sum(&frame[4..frame.len() - 3]) == given
    })
}

fn rtcm3_frame(input: &[u8]) -> IResult<&[u8], u32, ()> {
    let (rest, _) = tag(RTCM3_PREAMBLE)(input)?;
    let (rest, header) = be_u16(rest)?;

    // the six bits above the length are reserved and always zero
    if header & 0xfc00 != 0 {
        return Err(Err::Error(()));
    }

    let (rest, _) = take((header & 0x03ff) as usize)(rest)?;
    let (rest, crc) = take(3usize)(rest)?;
    let crc = crc.iter().fold(0u32, |c, b| (c << 8) | *b as u32);

    Ok((rest, crc))
}

fn recognize_rtcm3(input: &[u8], _strict: bool) -> Recognized {
    outcome(input, RTCM3_MAX, rtcm3_frame(input), |frame, given| {
        checksum::crc24q(&frame[..frame.len() - 3]) == given
    })
}

/// Packet counters kept per device.
#[derive(Clone, Debug, Default)]
pub struct Statistics {
    pub good: HashMap<PacketType, u64>,
    pub bad: u64,
    pub chars: u64,
}

/// Per-device input buffer that splits a byte stream into frames.
///
/// Bytes are appended with [`feed`](Lexer::feed) and complete frames are taken, in input order,
/// with [`next_packet`](Lexer::next_packet).  Garbage is discarded one byte at a time so every
/// call makes progress.
#[derive(Debug, Default)]
pub struct Lexer {
    buffer: BytesMut,
    strict: bool,
    statistics: Statistics,
}

impl Lexer {
    pub fn new() -> Self {
        Lexer {
            buffer: BytesMut::with_capacity(MAX_PACKET_LENGTH),
            strict: false,
            statistics: Statistics::default(),
        }
    }

    /// Reject NMEA sentences longer than the standard's 82 characters.
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    pub fn feed(&mut self, bytes: &[u8]) {
        self.statistics.chars += bytes.len() as u64;
        self.buffer.extend_from_slice(bytes);
    }

    pub fn next_packet(&mut self) -> Option<Packet> {
        loop {
            match scan(&self.buffer, self.strict) {
                Scan::Packet(kind, length) => {
                    let bytes = self.buffer.split_to(length).freeze();

                    *self.statistics.good.entry(kind).or_insert(0) += 1;
                    trace!("lexed {:?} packet of {} bytes", kind, length);

                    return Some(Packet { kind, bytes });
                }
                Scan::Skip => {
                    if self.statistics.bad % 1000 == 0 {
                        debug!(
                            "discarding byte {:#04x}, {} bad bytes so far",
                            self.buffer[0], self.statistics.bad
                        );
                    }

                    self.buffer.advance(1);
                    self.statistics.bad += 1;
                }
                Scan::NeedMore => return None,
            }
        }
    }

    /// Bytes waiting for the rest of their frame.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Drop buffered input, used after a line speed change.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    pub fn statistics(&self) -> &Statistics {
        &self.statistics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recognize_nmea() {
        let sentence = b"$GPGGA,123519.00,4807.038,N,01131.324,E,1,08,0.9,545.4,M,46.9,M,,*6C\r\n";

        assert_eq!(Recognized::Accept(sentence.len()), recognize_nmea(sentence, false));
        assert_eq!(Recognized::Incomplete, recognize_nmea(&sentence[..20], false));
        assert_eq!(Recognized::Accept(sentence.len()), recognize_nmea(sentence, true));
        assert_eq!(Recognized::Reject, recognize_nmea(b"$GPTXT,01*00\r\n", false));
        assert_eq!(Recognized::Reject, recognize_nmea(b"#comment\n", false));
    }

    #[test]
    fn test_recognize_nmea_length() {
        let long = format!("$GPTXT,01,01,02,{}\r\n", "x".repeat(80));

        assert_eq!(Recognized::Accept(long.len()), recognize_nmea(long.as_bytes(), false));
        assert_eq!(Recognized::Reject, recognize_nmea(long.as_bytes(), true));

        let overlong = format!("$GPTXT,01,01,02,{}\r\n", "x".repeat(200));

        assert_eq!(Recognized::Reject, recognize_nmea(overlong.as_bytes(), false));
    }

    #[test]
    fn test_recognize_nmea_without_checksum() {
        assert_eq!(Recognized::Accept(14), recognize_nmea(b"$STI,030,1,2\r\n", false));
        assert_eq!(Recognized::Accept(13), recognize_nmea(b"$STI,030,1,2\n", false));
    }

    #[test]
    fn test_recognize_nmea_restart() {
        assert_eq!(Recognized::Reject, recognize_nmea(b"$GPGGA,12$GPRMC\r\n", false));
    }

    #[test]
    fn test_recognize_comment() {
        assert_eq!(Recognized::Accept(20), recognize_comment(b"# Date: 2020-01-01\r\n", false));
    }

    #[test]
    fn test_recognize_json() {
        let json = b"{\"class\":\"VERSION\"}\r\n";

        assert_eq!(Recognized::Accept(json.len()), recognize_json(json, false));
        assert_eq!(Recognized::Reject, recognize_json(b"{\"class\"\r\n", false));
    }

    #[test]
    fn test_recognize_ubx() {
        let ack = [0xb5, 0x62, 0x05, 0x01, 0x02, 0x00, 0x06, 0x01, 0x0f, 0x38];

        assert_eq!(Recognized::Accept(10), recognize_ubx(&ack, false));
        assert_eq!(Recognized::Incomplete, recognize_ubx(&ack[..7], false));

        let mut bad = ack;
        bad[9] = 0;

        assert_eq!(Recognized::Reject, recognize_ubx(&bad, false));
    }

    #[test]
    fn test_recognize_rtcm3() {
        let mut frame = vec![0xd3, 0x00, 0x02, 0x3e, 0xd0];
        let crc = checksum::crc24q(&frame);
        frame.extend_from_slice(&[(crc >> 16) as u8, (crc >> 8) as u8, crc as u8]);

        assert_eq!(Recognized::Accept(8), recognize_rtcm3(&frame, false));

        frame[7] ^= 0xff;

        assert_eq!(Recognized::Reject, recognize_rtcm3(&frame, false));
    }

    #[test]
    fn test_recognize_rtcm3_longest() {
        let mut frame = vec![0xd3, 0x03, 0xff];
        frame.extend(std::iter::repeat(0x55).take(1023));
        let crc = checksum::crc24q(&frame);
        frame.extend_from_slice(&[(crc >> 16) as u8, (crc >> 8) as u8, crc as u8]);

        assert_eq!(Recognized::Accept(1029), recognize_rtcm3(&frame, false));
        assert_eq!(Recognized::Incomplete, recognize_rtcm3(&frame[..1028], false));
    }

    #[test]
    fn test_recognize_impossible_length() {
        assert_eq!(Recognized::Reject, recognize_ubx(&[0xb5, 0x62, 0x01, 0x07, 0xff, 0xff], false));
        assert_eq!(Recognized::Reject, recognize_sirf(&[0xa0, 0xa2, 0x7f, 0xff], false));
        assert_eq!(Recognized::Reject, recognize_skytraq(&[0xa0, 0xa1, 0xff, 0xff], false));

        assert_eq!(Recognized::Incomplete, recognize_ubx(&[0xb5, 0x62, 0x01, 0x07, 0x00, 0x10], false));
    }

    #[test]
    fn test_recognize_skytraq() {
        let frame = [0xa0, 0xa1, 0x00, 0x02, 0x83, 0x02, 0x81, 0x0d, 0x0a];

        assert_eq!(Recognized::Accept(9), recognize_skytraq(&frame, false));
        assert_eq!(Recognized::Reject, recognize_sirf(&frame, false));
    }

    #[test]
    fn test_scan() {
        assert_eq!(Scan::NeedMore, scan(b"", false));
        assert_eq!(Scan::Skip, scan(b"xyz", false));
        assert_eq!(Scan::NeedMore, scan(b"$GP", false));
        assert_eq!(Scan::Packet(PacketType::Comment, 4), scan(b"#hi\n", false));
    }
}
