use super::UriError;

use crate::configuration::GPS_PATH_MAX;

use nom::branch::alt;
use nom::bytes::complete::take_until;
use nom::bytes::complete::take_while;
use nom::bytes::complete::take_while1;
use nom::character::complete::char;
use nom::combinator::eof;
use nom::combinator::opt;
use nom::combinator::rest;
use nom::combinator::verify;
use nom::error::ParseError;
use nom::sequence::delimited;
use nom::sequence::preceded;
use nom::sequence::terminated;
use nom::IResult;

use std::fmt;

pub const DEFAULT_GPSD_PORT: u16 = 2947;
pub const DEFAULT_NTRIP_PORT: u16 = 2101;
pub const DEFAULT_DGPSIP_PORT: u16 = 2101;

/// Where a device's bytes come from.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Source {
    /// A local tty.
    Serial(String),
    /// A bare kernel PPS device, `/dev/pps*`.
    Pps(String),
    Tcp { host: String, port: u16 },
    /// Datagrams received on a local address.
    Udp { host: String, port: u16 },
    /// Another daemon, optionally a single one of its devices.
    Gpsd {
        host: String,
        port: u16,
        device: Option<String>,
    },
    Ntrip(Mountpoint),
    Dgpsip { host: String, port: u16 },
    /// An NTP refclock segment read as a time source.
    Shm(i32),
}

/// An NTRIP caster stream.
#[derive(Clone, Eq, PartialEq)]
pub struct Mountpoint {
    pub host: String,
    pub port: u16,
    pub mountpoint: String,
    /// `user:password`
    pub credentials: Option<String>,
}

impl fmt::Debug for Mountpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mountpoint")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("mountpoint", &self.mountpoint)
            .field("credentials", &self.credentials.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Source {
    /// A real file is opened, everything else is a socket or shared memory.
    pub fn is_serial(&self) -> bool {
        matches!(self, Source::Serial(_))
    }

    /// Sources that are reconnected after they hang up.
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            Source::Tcp { .. }
                | Source::Udp { .. }
                | Source::Gpsd { .. }
                | Source::Ntrip(_)
                | Source::Dgpsip { .. }
        )
    }

    /// Nothing but PPS edges, in-band time must come from a sibling.
    pub fn is_pps(&self) -> bool {
        matches!(self, Source::Pps(_))
    }

    pub fn is_dgpsip(&self) -> bool {
        matches!(self, Source::Dgpsip { .. })
    }

    /// Commands can be written back to this source.
    pub fn is_writable(&self) -> bool {
        matches!(
            self,
            Source::Serial(_) | Source::Tcp { .. } | Source::Dgpsip { .. }
        )
    }
}

/// `host`, `[ipv6]`, then optional `:port` and `:device`.
struct Destination<'a> {
    host: &'a str,
    port: Option<&'a str>,
    device: Option<&'a str>,
}

fn host<'a, E: ParseError<&'a str>>(input: &'a str) -> IResult<&'a str, &'a str, E> {
    alt((
        delimited(char('['), take_until("]"), char(']')),
        take_while1(|c: char| c != ':' && c != '/' && c != '['),
    ))(input)
}

fn port<'a, E: ParseError<&'a str>>(input: &'a str) -> IResult<&'a str, &'a str, E> {
    preceded(char(':'), take_while(|c: char| c != ':' && c != '/'))(input)
}

fn device<'a, E: ParseError<&'a str>>(input: &'a str) -> IResult<&'a str, &'a str, E> {
    preceded(char(':'), verify(rest, |device: &str| !device.is_empty()))(input)
}

fn destination<'a, E: ParseError<&'a str>>(input: &'a str) -> IResult<&'a str, Destination<'a>, E> {
    let (input, host) = host(input)?;
    let (input, port) = opt(port)(input)?;
    let (input, device) = opt(device)(input)?;

    // a trailing slash is accepted and ignored
    let (input, _) = terminated(opt(char('/')), eof)(input)?;

    Ok((
        input,
        Destination {
            host,
            port: port.filter(|port| !port.is_empty()),
            device,
        },
    ))
}

fn parse_destination<'a>(path: &str, input: &'a str) -> Result<Destination<'a>, UriError> {
    destination::<()>(input)
        .map(|(_, destination)| destination)
        .map_err(|_| UriError::Malformed(path.to_string()))
}

fn parse_port(path: &str, port: Option<&str>, default: Option<u16>) -> Result<u16, UriError> {
    match (port, default) {
        (Some(port), _) => port
            .parse::<u16>()
            .ok()
            .filter(|port| *port != 0)
            .ok_or_else(|| UriError::InvalidPort(path.to_string())),
        (None, Some(default)) => Ok(default),
        (None, None) => Err(UriError::MissingPort(path.to_string())),
    }
}

/// `[user:password@]host[:port]/mountpoint`, the password may contain `@`.
fn parse_ntrip(path: &str, input: &str) -> Result<Source, UriError> {
    let (credentials, input) = match input.rfind('@') {
        Some(at) => (Some(input[..at].to_string()), &input[at + 1..]),
        None => (None, input),
    };

    let (caster, mountpoint) = match input.find('/') {
        Some(slash) => (&input[..slash], &input[slash + 1..]),
        None => (input, ""),
    };

    if mountpoint.is_empty() {
        return Err(UriError::MissingMountpoint(path.to_string()));
    }

    let destination = parse_destination(path, caster)?;

    Ok(Source::Ntrip(Mountpoint {
        host: destination.host.to_string(),
        port: parse_port(path, destination.port, Some(DEFAULT_NTRIP_PORT))?,
        mountpoint: mountpoint.to_string(),
        credentials,
    }))
}

/// Classify a device path.  Anything without a scheme is a local device.
pub fn parse(path: &str) -> Result<Source, UriError> {
    if path.len() > GPS_PATH_MAX {
        return Err(UriError::TooLong(path.to_string(), GPS_PATH_MAX));
    }

    let (scheme, input) = match path.split_once("://") {
        Some(split) => split,
        None if path.starts_with("/dev/pps") => return Ok(Source::Pps(path.to_string())),
        None if path.is_empty() => return Err(UriError::Malformed(path.to_string())),
        None => return Ok(Source::Serial(path.to_string())),
    };

    match scheme {
        "tcp" => {
            let destination = parse_destination(path, input)?;

            Ok(Source::Tcp {
                host: destination.host.to_string(),
                port: parse_port(path, destination.port, None)?,
            })
        }
        "udp" => {
            let destination = parse_destination(path, input)?;

            Ok(Source::Udp {
                host: destination.host.to_string(),
                port: parse_port(path, destination.port, None)?,
            })
        }
        "gpsd" => {
            let destination = parse_destination(path, input)?;

            Ok(Source::Gpsd {
                host: destination.host.to_string(),
                port: parse_port(path, destination.port, Some(DEFAULT_GPSD_PORT))?,
                device: destination.device.map(str::to_string),
            })
        }
        "dgpsip" => {
            let destination = parse_destination(path, input)?;

            Ok(Source::Dgpsip {
                host: destination.host.to_string(),
                port: parse_port(path, destination.port, Some(DEFAULT_DGPSIP_PORT))?,
            })
        }
        "ntrip" => parse_ntrip(path, input),
        "shm" => input
            .trim_end_matches('/')
            .parse::<i32>()
            .map(Source::Shm)
            .map_err(|_| UriError::Malformed(path.to_string())),
        _ => Err(UriError::UnknownScheme(path.to_string())),
    }
}
