use super::json::lossless_text;
use super::parser;
use super::parser::Command;

use bytes::Buf;
use bytes::BufMut;
use bytes::Bytes;
use bytes::BytesMut;

use std::cmp;
use std::io;

use thiserror::Error;

use tokio_util::codec::Decoder;
use tokio_util::codec::Encoder;

use tracing::trace;

/// Longest accepted request line.
pub const GPS_JSON_COMMAND_MAX: usize = 80;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("client I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("write to client timed out")]
    Timeout,
}

/// Request lines in, response lines out.
///
/// A line longer than the limit yields a single `Error` and is discarded through its newline.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Codec {
    next_index: usize,
    max_length: usize,
    is_discarding: bool,
}

impl Codec {
    pub fn new() -> Codec {
        Codec {
            next_index: 0,
            max_length: GPS_JSON_COMMAND_MAX,
            is_discarding: false,
        }
    }
}

fn unrecognized(line: &[u8]) -> Vec<Command> {
    vec![Command::Error(format!(
        "Unrecognized request '{}'",
        lossless_text(line).trim_end()
    ))]
}

impl Decoder for Codec {
    type Item = Vec<Command>;
    type Error = CodecError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Vec<Command>>, CodecError> {
        loop {
            let read_to = cmp::min(self.max_length + 1, buf.len());

            let newline_offset = buf[self.next_index..read_to]
                .iter()
                .position(|b| *b == b'\n');

            match (self.is_discarding, newline_offset) {
                (true, Some(offset)) => {
                    buf.advance(offset + self.next_index + 1);
                    self.is_discarding = false;
                    self.next_index = 0;
                }
                (true, None) => {
                    buf.advance(read_to);
                    self.next_index = 0;

                    if buf.is_empty() {
                        return Ok(None);
                    }
                }
                (false, Some(offset)) => {
                    let newline_index = offset + self.next_index;
                    self.next_index = 0;
                    let line = buf.split_to(newline_index + 1);

                    let commands = match std::str::from_utf8(&line) {
                        Ok(line) => parser::parse(line),
                        Err(_) => unrecognized(&line),
                    };

                    trace!("received {:?}", commands);

                    return Ok(Some(commands));
                }
                (false, None) if buf.len() > self.max_length => {
                    self.is_discarding = true;
                    self.next_index = 0;

                    return Ok(Some(unrecognized(&buf[..self.max_length])));
                }
                (false, None) => {
                    self.next_index = read_to;
                    return Ok(None);
                }
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Vec<Command>>, CodecError> {
        if let Some(commands) = self.decode(buf)? {
            return Ok(Some(commands));
        }

        if buf.is_empty() || self.is_discarding {
            buf.clear();
            return Ok(None);
        }

        // a final request without a newline
        self.next_index = 0;
        let line = buf.split();

        let commands = match std::str::from_utf8(&line) {
            Ok(line) => parser::parse(line),
            Err(_) => unrecognized(&line),
        };

        Ok(Some(commands))
    }
}

impl Encoder<Bytes> for Codec {
    type Error = CodecError;

    fn encode(&mut self, line: Bytes, buf: &mut BytesMut) -> Result<(), CodecError> {
        buf.reserve(line.len());
        buf.put(line);

        Ok(())
    }
}

impl Default for Codec {
    fn default() -> Self {
        Self::new()
    }
}
