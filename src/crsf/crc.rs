//! # Frame Checksum
//!
//! CRC-8/DVB-S2 (polynomial 0xD5, init 0x00, no reflection), the
//! checksum CRSF frames carry. It covers the type byte and the payload,
//! never the sync or length bytes.

const CRC8_POLY: u8 = 0xD5;

/// Lookup table built at compile time, one entry per input byte
const CRC8_TABLE: [u8; 256] = {
    let mut table = [0u8; 256];
    let mut i = 0;

    while i < 256 {
        table[i] = crc8_byte(i as u8);
        i += 1;
    }

    table
};

/// Checksum of a single byte against a zero running value
const fn crc8_byte(byte: u8) -> u8 {
    let mut crc = byte;
    let mut bit = 0;

    while bit < 8 {
        crc = if crc & 0x80 != 0 {
            (crc << 1) ^ CRC8_POLY
        } else {
            crc << 1
        };
        bit += 1;
    }

    crc
}

/// Checksum of `data` (for a CRSF frame: type byte followed by the
/// payload).
pub fn crc8_dvb_s2(data: &[u8]) -> u8 {
    data.iter()
        .fold(0, |crc, &byte| CRC8_TABLE[(crc ^ byte) as usize])
}

/// Bitwise reference, kept to validate the table in tests
#[allow(dead_code)]
fn crc8_dvb_s2_slow(data: &[u8]) -> u8 {
    data.iter().fold(0, |crc, &byte| crc8_byte(crc ^ byte))
}
