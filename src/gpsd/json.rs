use bytes::Bytes;

use serde::Serialize;

use serde_json::ser::Formatter;
use serde_json::Serializer;

use std::io;

use tracing::error;

/// First of the 256 private use code points that stand in for bytes of malformed UTF-8.
const RAW_BYTE_BASE: u32 = 0x10ff00;

/// Client text as a `String` without losing malformed UTF-8.
///
/// Well formed sequences are kept, every byte of a malformed one becomes a code point in
/// U+10FF00..U+10FFFF that [`GpsdFormatter`] writes back out as `\u00XX`.
pub fn lossless_text(mut bytes: &[u8]) -> String {
    let mut text = String::with_capacity(bytes.len());

    loop {
        match std::str::from_utf8(bytes) {
            Ok(valid) => {
                text.push_str(valid);
                return text;
            }
            Err(e) => {
                let (valid, rest) = bytes.split_at(e.valid_up_to());

                // valid_up_to marks a well formed prefix
                text.push_str(std::str::from_utf8(valid).unwrap_or_default());

                let bad = e.error_len().unwrap_or(rest.len());

                for byte in &rest[..bad] {
                    text.extend(char::from_u32(RAW_BYTE_BASE + *byte as u32));
                }

                bytes = &rest[bad..];
            }
        }
    }
}

fn raw_byte(c: char) -> Option<u8> {
    (c as u32)
        .checked_sub(RAW_BYTE_BASE)
        .and_then(|offset| u8::try_from(offset).ok())
}

/// Compact JSON with DEL and malformed UTF-8 escaped.
///
/// serde_json already escapes `"`, `\` and the C0 controls.  DEL becomes `\u007f` and the
/// stand-ins produced by [`lossless_text`] become `\u00XX`, one per original byte.
#[derive(Clone, Copy, Debug, Default)]
pub struct GpsdFormatter;

impl Formatter for GpsdFormatter {
    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let mut start = 0;

        for (i, c) in fragment.char_indices() {
            let escaped = match (c, raw_byte(c)) {
                ('\u{7f}', _) => 0x7f,
                (_, Some(byte)) => byte,
                _ => continue,
            };

            writer.write_all(fragment[start..i].as_bytes())?;
            write!(writer, "\\u{:04x}", escaped)?;
            start = i + c.len_utf8();
        }

        writer.write_all(fragment[start..].as_bytes())
    }
}

/// Serialize `value` as one protocol line ending in CR LF.
pub fn to_line<T: Serialize>(value: &T) -> Result<Bytes, serde_json::Error> {
    let mut buf = Vec::with_capacity(256);

    {
        let mut serializer = Serializer::with_formatter(&mut buf, GpsdFormatter);
        value.serialize(&mut serializer)?;
    }

    buf.extend_from_slice(b"\r\n");

    Ok(Bytes::from(buf))
}

/// Like [`to_line`] but an unserializable value becomes an `ERROR` line.
pub fn encode<T: Serialize>(value: &T) -> Bytes {
    match to_line(value) {
        Ok(line) => line,
        Err(e) => {
            error!("unable to serialize response: {}", e);

            Bytes::from_static(b"{\"class\":\"ERROR\",\"message\":\"internal error\"}\r\n")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_to_line() {
        let line = to_line(&json!({"class": "VERSION"})).unwrap();

        assert_eq!(&b"{\"class\":\"VERSION\"}\r\n"[..], &line[..]);
    }

    #[test]
    fn test_escapes() {
        let line = to_line(&json!("a\"b\\c\u{1}d\u{7f}e")).unwrap();

        assert_eq!("\"a\\\"b\\\\c\\u0001d\\u007fe\"\r\n", std::str::from_utf8(&line).unwrap());
    }

    #[test]
    fn test_utf8_passes_through() {
        let line = to_line(&json!("Zürich")).unwrap();

        assert_eq!("\"Zürich\"\r\n", std::str::from_utf8(&line).unwrap());
    }

    #[test]
    fn test_malformed_utf8_escaped_per_byte() {
        let text = lossless_text(b"a\xffb\xc3\xa9c\xe2\x82");

        assert_eq!(7, text.chars().count());

        let line = to_line(&json!(text)).unwrap();

        assert_eq!(
            "\"a\\u00ffb\u{e9}c\\u00e2\\u0082\"\r\n",
            std::str::from_utf8(&line).unwrap()
        );
    }

    #[test]
    fn test_lossless_text_valid() {
        assert_eq!("Zürich", lossless_text("Zürich".as_bytes()));
    }
}
