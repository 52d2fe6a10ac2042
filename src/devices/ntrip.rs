//! The NTRIP client handshake.

use super::uri::Mountpoint;
use super::DeviceError;

use bytes::Buf;
use bytes::BytesMut;

use nom::branch::alt;
use nom::bytes::complete::tag;
use nom::character::complete::digit1;
use nom::character::complete::space1;
use nom::combinator::value;
use nom::sequence::tuple;
use nom::IResult;

use tokio::io::AsyncRead;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWrite;
use tokio::io::AsyncWriteExt;

use tracing::debug;

/// Longest response header accepted from a caster.
pub const HEADER_MAX: usize = 4096;

/// How the caster accepted the request.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Status {
    /// NTRIP 1.0, corrections follow the status line.
    Icy,
    /// NTRIP 2.0, corrections follow the header block.
    Http,
}

fn status_line(input: &str) -> IResult<&str, Status, ()> {
    alt((
        value(Status::Icy, tag("ICY 200")),
        value(
            Status::Http,
            tuple((tag("HTTP/1."), digit1, space1, tag("200"))),
        ),
    ))(input)
}

/// `None` for anything but a successful status line.
pub fn status(line: &str) -> Option<Status> {
    status_line(line).ok().map(|(_, status)| status)
}

const BASE64: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Standard padded base64, for Basic authorization.
pub fn base64(input: &[u8]) -> String {
    let mut encoded = String::with_capacity((input.len() + 2) / 3 * 4);

    for chunk in input.chunks(3) {
        let b = [
            chunk[0],
            chunk.get(1).copied().unwrap_or(0),
            chunk.get(2).copied().unwrap_or(0),
        ];
        let n = (b[0] as u32) << 16 | (b[1] as u32) << 8 | b[2] as u32;

        for i in 0..4 {
            if i <= chunk.len() {
                encoded.push(BASE64[(n >> (18 - 6 * i) & 0x3f) as usize] as char);
            } else {
                encoded.push('=');
            }
        }
    }

    encoded
}

/// The stream request for `mountpoint`.
pub fn request(mountpoint: &Mountpoint) -> String {
    let mut request = format!(
        "GET /{} HTTP/1.1\r\n\
         Ntrip-Version: Ntrip/2.0\r\n\
         User-Agent: NTRIP gpsmux/{}\r\n\
         Host: {}\r\n\
         Accept: rtk/rtcm, dgps/rtcm\r\n",
        mountpoint.mountpoint,
        env!("CARGO_PKG_VERSION"),
        mountpoint.host,
    );

    if let Some(credentials) = &mountpoint.credentials {
        request.push_str(&format!(
            "Authorization: Basic {}\r\n",
            base64(credentials.as_bytes())
        ));
    }

    request.push_str("Connection: close\r\n\r\n");

    request
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Request `mountpoint` and read the caster's reply.
///
/// Returns any correction bytes that arrived with the header.
pub async fn handshake<S>(stream: &mut S, mountpoint: &Mountpoint) -> Result<BytesMut, DeviceError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let caster = format!("{}:{}", mountpoint.host, mountpoint.port);
    let io_error = |source| DeviceError::Io {
        path: caster.clone(),
        source,
    };
    let refused = |status: String| DeviceError::Ntrip {
        caster: caster.clone(),
        mountpoint: mountpoint.mountpoint.clone(),
        status,
    };

    stream
        .write_all(request(mountpoint).as_bytes())
        .await
        .map_err(io_error)?;

    let mut buffer = BytesMut::with_capacity(1024);

    loop {
        if let Some(end) = find(&buffer, b"\r\n") {
            let line = String::from_utf8_lossy(&buffer[..end]).into_owned();

            match status(&line) {
                Some(Status::Icy) => {
                    debug!("{} accepted {} ({})", caster, mountpoint.mountpoint, line);
                    buffer.advance(end + 2);
                    return Ok(buffer);
                }
                Some(Status::Http) => {
                    if let Some(header_end) = find(&buffer, b"\r\n\r\n") {
                        debug!("{} accepted {} ({})", caster, mountpoint.mountpoint, line);
                        buffer.advance(header_end + 4);
                        return Ok(buffer);
                    }
                }
                None => return Err(refused(line)),
            }
        }

        if buffer.len() > HEADER_MAX {
            return Err(refused("response header too long".to_string()));
        }

        let read = stream.read_buf(&mut buffer).await.map_err(io_error)?;

        if read == 0 {
            return Err(refused("connection closed".to_string()));
        }
    }
}
