#![forbid(unsafe_code)]

//! CRC-32 (ISO-HDLC, the zip/gzip polynomial) with an explicit running value.
//!
//! The running value is always a finished CRC, so `update` can be chained and
//! `update(init(), data) == checksum(data)`.

use crc::{Crc, CRC_32_ISO_HDLC};

////////////////////////////////////////////////////////////////////////////////

static CRC: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// CRC of the empty message.
pub fn init() -> u32 {
    CRC.checksum(&[])
}

pub fn update(crc: u32, data: &[u8]) -> u32 {
    if data.is_empty() {
        return crc;
    }
    // The digest register for a reflected algorithm holds the bit-reversed
    // initial value, and the output is the register xor'ed with xorout.
    let register = crc ^ CRC_32_ISO_HDLC.xorout;
    let mut digest = CRC.digest_with_initial(register.reverse_bits());
    digest.update(data);
    digest.finalize()
}

pub fn checksum(data: &[u8]) -> u32 {
    update(init(), data)
}

////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_values() {
        assert_eq!(init(), 0);
        assert_eq!(checksum(b""), 0);
        assert_eq!(checksum(b"123456789"), 0xcbf4_3926);
        assert_eq!(checksum(b"Hello, World!"), 0xec4a_c3d0);
        assert_eq!(checksum(b"aabaabaabaabaab\n"), 0x1237_bd2f);
    }

    #[test]
    fn chained_updates() {
        let data = b"The quick brown fox jumps over the lazy dog";
        for split in 0..=data.len() {
            let (head, tail) = data.split_at(split);
            assert_eq!(update(update(init(), head), tail), checksum(data));
        }
    }

    #[test]
    fn byte_at_a_time() {
        let data: Vec<u8> = (0..=255).collect();
        let crc = data.iter().fold(init(), |crc, b| update(crc, &[*b]));
        assert_eq!(crc, checksum(&data));
    }
}
