#![no_main]
use libfuzzer_sys::fuzz_target;

use gpsmux::gps::Context;
use gpsmux::gps::Session;
use gpsmux::packet::Lexer;
use gpsmux::packet::MAX_PACKET_LENGTH;

// The first byte picks the chunk size, the rest is the device input.
fuzz_target!(|input: &[u8]| {
    let (chunk, input) = match input.split_first() {
        Some((chunk, input)) => (usize::from(*chunk).max(1), input),
        None => return,
    };

    let mut lexer = Lexer::new();
    let mut session = Session::new("fuzz", Context::default());
    let mut lexed = 0;

    for bytes in input.chunks(chunk) {
        lexer.feed(bytes);

        while let Some(packet) = lexer.next_packet() {
            assert!(!packet.is_empty());
            lexed += packet.len();

            session.handle(&packet);
        }

        assert!(lexer.buffered() < MAX_PACKET_LENGTH);
    }

    let skipped = lexer.statistics().bad as usize;

    assert_eq!(input.len(), lexed + skipped + lexer.buffered());
});
