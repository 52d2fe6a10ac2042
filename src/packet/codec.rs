use crate::packet::Lexer;
use crate::packet::Packet;

use bytes::Bytes;
use bytes::BytesMut;

use std::io;

use tokio_util::codec::Decoder;
use tokio_util::codec::Encoder;

use tracing::trace;

/// Frames a device byte stream into packets and writes raw bytes back to the device.
#[derive(Debug, Default)]
pub struct Codec {
    lexer: Lexer,
}

impl Codec {
    pub fn new() -> Self {
        Codec {
            lexer: Lexer::new(),
        }
    }

    pub fn lexer(&self) -> &Lexer {
        &self.lexer
    }

    pub fn lexer_mut(&mut self) -> &mut Lexer {
        &mut self.lexer
    }
}

impl Decoder for Codec {
    type Item = Packet;
    type Error = io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Packet>, io::Error> {
        if !buf.is_empty() {
            let input = buf.split();
            self.lexer.feed(&input);
        }

        Ok(self.lexer.next_packet())
    }
}

impl Encoder<Bytes> for Codec {
    type Error = io::Error;

    fn encode(&mut self, bytes: Bytes, buf: &mut BytesMut) -> Result<(), io::Error> {
        trace!("writing {} bytes to device", bytes.len());

        buf.extend_from_slice(&bytes);

        Ok(())
    }
}
