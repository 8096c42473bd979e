//! # CRSF Frame Codec
//!
//! Stateless encode/decode of individual CRSF frames against a byte
//! buffer. Transport and resynchronization concerns live in
//! [`crate::crsf::framer`].

use super::crc::crc8_dvb_s2;
use super::protocol::*;
use crate::error::FrameError;

/// Decode one CRSF frame from the start of `buf`.
///
/// # Arguments
///
/// * `buf` - Raw bytes; the frame must start at offset 0
///
/// # Returns
///
/// * `Ok((frame, consumed))` - The decoded frame and the number of bytes
///   it occupied on the wire
///
/// # Errors
///
/// * `FrameError::Incomplete` - fewer bytes available than a full frame;
///   not a stream error, the caller should wait for more data
/// * `FrameError::BadSync` - first byte is not 0xC8
/// * `FrameError::BadLength` - length byte outside 2..=62
/// * `FrameError::CrcMismatch` - checksum over type + payload failed
pub fn decode(buf: &[u8]) -> Result<(CrsfFrame, usize), FrameError> {
    // Need sync + length before anything else can be judged
    if buf.len() < 2 {
        return Err(FrameError::Incomplete);
    }

    if buf[0] != CRSF_SYNC_BYTE {
        return Err(FrameError::BadSync(buf[0]));
    }

    let length = buf[1];
    if !(CRSF_MIN_FRAME_LENGTH..=CRSF_MAX_FRAME_LENGTH).contains(&length) {
        return Err(FrameError::BadLength(length));
    }

    // Total wire size: sync(1) + length(1) + [length bytes]
    let total = 2 + length as usize;
    if buf.len() < total {
        return Err(FrameError::Incomplete);
    }

    let found = buf[total - 1];
    let expected = crc8_dvb_s2(&buf[2..total - 1]);
    if expected != found {
        return Err(FrameError::CrcMismatch { expected, found });
    }

    let frame_type = FrameType::from(buf[2]);
    let payload = buf[3..total - 1].to_vec();

    Ok((CrsfFrame::new(frame_type, payload)?, total))
}

/// Encode a CRSF frame into its wire representation.
///
/// Deterministic and always CRC-correct.
///
/// # Arguments
///
/// * `frame` - Frame to encode
///
/// # Returns
///
/// * `Vec<u8>` - Complete frame: sync + length + type + payload + crc
///
/// # Errors
///
/// Returns `FrameError::PayloadTooLarge` if the payload exceeds 60 bytes.
pub fn encode(frame: &CrsfFrame) -> Result<Vec<u8>, FrameError> {
    if frame.payload.len() > CRSF_MAX_PAYLOAD_SIZE {
        return Err(FrameError::PayloadTooLarge(frame.payload.len()));
    }

    let mut out = Vec::with_capacity(4 + frame.payload.len());
    out.push(CRSF_SYNC_BYTE);
    out.push(frame.length());
    out.push(frame.frame_type.to_u8());
    out.extend_from_slice(&frame.payload);

    // CRC covers type + payload
    let crc = crc8_dvb_s2(&out[2..]);
    out.push(crc);

    Ok(out)
}
