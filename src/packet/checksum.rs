/// XOR of the sentence bytes between the leading `$` or `!` and the `*`.
///
/// A leading `$`/`!` is skipped and the sum stops at the first `*` so whole sentences and bare
/// bodies both work.
pub fn nmea_checksum(sentence: &[u8]) -> u8 {
    let body = match sentence.first() {
        Some(b'$') | Some(b'!') => &sentence[1..],
        _ => sentence,
    };

    body.iter().take_while(|b| **b != b'*').fold(0, |c, b| c ^ b)
}

/// Terminate `sentence` with `*HH\r\n`.
///
/// Any existing checksum or line ending is replaced.  A missing `$` is added.
pub fn nmea_add_checksum(sentence: &str) -> String {
    let body = sentence.trim_end_matches(|c| c == '\r' || c == '\n');
    let body = match body.find('*') {
        Some(star) => &body[..star],
        None => body,
    };

    let lead = if body.starts_with('$') || body.starts_with('!') {
        ""
    } else {
        "$"
    };

    let checksum = nmea_checksum(body.as_bytes());

    format!("{}{}*{:02X}\r\n", lead, body, checksum)
}

/// CRC-16/CCITT-FALSE, polynomial 0x1021 seeded with 0xFFFF.
pub fn crc16_ccitt(data: &[u8]) -> u16 {
    data.iter().fold(0xffff, |crc, b| {
        let mut crc = crc ^ ((*b as u16) << 8);

        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
        }

        crc
    })
}

/// 8-bit Fletcher checksum used by u-blox UBX frames, returns `(ck_a, ck_b)`.
pub fn fletcher8(data: &[u8]) -> (u8, u8) {
    data.iter().fold((0u8, 0u8), |(a, b), x| {
        let a = a.wrapping_add(*x);

        (a, b.wrapping_add(a))
    })
}

/// CRC-24Q as used by RTCM 3 and SBAS.
pub fn crc24q(data: &[u8]) -> u32 {
    const POLYNOMIAL: u32 = 0x0186_4cfb;

    data.iter().fold(0, |crc, b| {
        let mut crc = crc ^ ((*b as u32) << 16);

        for _ in 0..8 {
            crc <<= 1;

            if crc & 0x0100_0000 != 0 {
                crc ^= POLYNOMIAL;
            }
        }

        crc & 0x00ff_ffff
    })
}

/// XOR of every byte, used by Skytraq binary frames.
pub fn xor_sum(data: &[u8]) -> u8 {
    data.iter().fold(0, |c, b| c ^ b)
}

/// SiRF binary checksum, the 15-bit sum of the payload.
pub fn sirf_checksum(data: &[u8]) -> u16 {
    data.iter().fold(0u16, |c, b| c.wrapping_add(*b as u16)) & 0x7fff
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nmea_checksum() {
        let sentence = b"$GPGGA,123519.00,4807.038,N,01131.324,E,1,08,0.9,545.4,M,46.9,M,,*6C";

        assert_eq!(0x6c, nmea_checksum(sentence));
        assert_eq!(0x6c, nmea_checksum(&sentence[1..]));
    }

    #[test]
    fn test_nmea_add_checksum() {
        assert_eq!("$PMTK220,1000*1F\r\n", nmea_add_checksum("PMTK220,1000"));
        assert_eq!("$PMTK220,1000*1F\r\n", nmea_add_checksum("$PMTK220,1000*00\r\n"));
    }

    #[test]
    fn test_crc16_ccitt() {
        assert_eq!(0x29b1, crc16_ccitt(b"123456789"));
    }

    #[test]
    fn test_fletcher8() {
        assert_eq!((0x0f, 0x38), fletcher8(&[0x05, 0x01, 0x02, 0x00, 0x06, 0x01]));
    }

    #[test]
    fn test_crc24q() {
        assert_eq!(0xcde703, crc24q(b"123456789"));
        assert_eq!(0, crc24q(b""));
    }

    #[test]
    fn test_sirf_checksum() {
        assert_eq!(0x7fff & (0xff * 200), sirf_checksum(&[0xff; 200]));
    }
}
