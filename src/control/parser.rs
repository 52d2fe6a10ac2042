use super::ControlError;

use bytes::Bytes;

use nom::branch::alt;
use nom::bytes::complete::tag;
use nom::bytes::complete::take_while1;
use nom::bytes::complete::take_while_m_n;
use nom::character::complete::char;
use nom::combinator::all_consuming;
use nom::combinator::map;
use nom::combinator::map_res;
use nom::combinator::value;
use nom::error::FromExternalError;
use nom::error::ParseError;
use nom::multi::many1;
use nom::sequence::preceded;
use nom::sequence::separated_pair;
use nom::IResult;

use std::num::ParseIntError;

/// One control socket command.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ControlCommand {
    /// `+path`
    Add(String),
    /// `-path`
    Remove(String),
    /// `!path=text` or `&path=hex`
    Write { path: String, data: Bytes },
    /// `?devices`
    Devices,
}

fn word<'a, E: ParseError<&'a str>>(input: &'a str) -> IResult<&'a str, &'a str, E> {
    take_while1(|c: char| c.is_ascii_graphic())(input)
}

fn path<'a, E: ParseError<&'a str>>(input: &'a str) -> IResult<&'a str, String, E> {
    map(take_while1(|c: char| c.is_ascii_graphic() && c != '='), str::to_string)(input)
}

fn hex_byte<'a, E>(input: &'a str) -> IResult<&'a str, u8, E>
where
    E: ParseError<&'a str> + FromExternalError<&'a str, ParseIntError>,
{
    map_res(
        take_while_m_n(2, 2, |c: char| c.is_ascii_hexdigit()),
        |pair| u8::from_str_radix(pair, 16),
    )(input)
}

fn add<'a, E: ParseError<&'a str>>(input: &'a str) -> IResult<&'a str, ControlCommand, E> {
    map(preceded(char('+'), word), |path| ControlCommand::Add(path.to_string()))(input)
}

fn remove<'a, E: ParseError<&'a str>>(input: &'a str) -> IResult<&'a str, ControlCommand, E> {
    map(preceded(char('-'), word), |path| ControlCommand::Remove(path.to_string()))(input)
}

fn write_text<'a, E: ParseError<&'a str>>(input: &'a str) -> IResult<&'a str, ControlCommand, E> {
    map(
        preceded(char('!'), separated_pair(path, char('='), word)),
        |(path, text)| ControlCommand::Write {
            path,
            data: Bytes::copy_from_slice(text.as_bytes()),
        },
    )(input)
}

fn write_hex<'a, E>(input: &'a str) -> IResult<&'a str, ControlCommand, E>
where
    E: ParseError<&'a str> + FromExternalError<&'a str, ParseIntError>,
{
    map(
        preceded(char('&'), separated_pair(path, char('='), many1(hex_byte))),
        |(path, data)| ControlCommand::Write {
            path,
            data: Bytes::from(data),
        },
    )(input)
}

fn devices<'a, E: ParseError<&'a str>>(input: &'a str) -> IResult<&'a str, ControlCommand, E> {
    value(ControlCommand::Devices, tag("?devices"))(input)
}

/// Parse one control line, the line ending is ignored.
pub fn parse(line: &str) -> Result<ControlCommand, ControlError> {
    let line = line.trim_end();

    all_consuming(alt((add, remove, write_text, write_hex, devices)))(line)
        .map(|(_, command)| command)
        .map_err(|_: nom::Err<()>| ControlError::Malformed(line.to_string()))
}

/// Decode a hex string, two digits a byte.  `None` when it is empty, odd length, or not hex.
pub fn unhex(hex: &str) -> Option<Bytes> {
    let bytes: IResult<&str, Vec<u8>, ()> = all_consuming(many1(hex_byte))(hex);

    bytes.ok().map(|(_, bytes)| Bytes::from(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_remove() {
        assert_eq!(
            ControlCommand::Add("/dev/ttyUSB0".to_string()),
            parse("+/dev/ttyUSB0\n").unwrap()
        );
        assert_eq!(
            ControlCommand::Remove("tcp://example:2947".to_string()),
            parse("-tcp://example:2947\r\n").unwrap()
        );
        assert!(parse("+").is_err());
        assert!(parse("+/dev/tty USB0").is_err());
    }

    #[test]
    fn test_write_text() {
        assert_eq!(
            ControlCommand::Write {
                path: "/dev/ttyUSB0".to_string(),
                data: Bytes::from_static(b"$PMTK605*31"),
            },
            parse("!/dev/ttyUSB0=$PMTK605*31\n").unwrap()
        );
        assert!(parse("!/dev/ttyUSB0").is_err());
        assert!(parse("!/dev/ttyUSB0=").is_err());
    }

    #[test]
    fn test_write_hex() {
        assert_eq!(
            ControlCommand::Write {
                path: "/dev/ttyACM0".to_string(),
                data: Bytes::from_static(&[0xb5, 0x62, 0x06, 0x04]),
            },
            parse("&/dev/ttyACM0=b5620604\n").unwrap()
        );
        assert!(parse("&/dev/ttyACM0=b56").is_err());
        assert!(parse("&/dev/ttyACM0=zz").is_err());
    }

    #[test]
    fn test_devices() {
        assert_eq!(ControlCommand::Devices, parse("?devices\n").unwrap());
        assert!(parse("?DEVICES").is_err());
        assert!(parse("").is_err());
    }

    #[test]
    fn test_unhex() {
        assert_eq!(Some(Bytes::from_static(&[0x0a, 0xff])), unhex("0aFF"));
        assert_eq!(None, unhex(""));
        assert_eq!(None, unhex("abc"));
        assert_eq!(None, unhex("0g"));
    }
}
