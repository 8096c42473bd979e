//! # RC Channel Packing
//!
//! The 16-channel RC control vector carried in a CRSF channels frame,
//! with bit-contiguous 11-bit packing and unpacking.

use super::protocol::*;
use crate::error::FrameError;

/// Ordered set of 16 RC channel values, each 11 bits (0-2047).
///
/// Out-of-range values from a feeding source are clamped on
/// construction, never rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelSet {
    values: [u16; CRSF_NUM_CHANNELS],
}

impl ChannelSet {
    /// Build a channel set, clamping every value to the 11-bit range.
    pub fn new(mut values: [u16; CRSF_NUM_CHANNELS]) -> Self {
        for value in values.iter_mut() {
            *value = (*value).min(CRSF_CHANNEL_VALUE_MAX);
        }
        Self { values }
    }

    /// All channels at the CRSF mid-point (992, i.e. sticks centered)
    pub fn centered() -> Self {
        Self {
            values: [CRSF_TICKS_MID; CRSF_NUM_CHANNELS],
        }
    }

    /// Value of one channel
    pub fn get(&self, index: usize) -> u16 {
        self.values[index]
    }

    /// All channel values
    pub fn values(&self) -> &[u16; CRSF_NUM_CHANNELS] {
        &self.values
    }

    /// Pack the 16 channels into the 22-byte RC channels payload.
    ///
    /// Channels are packed as a continuous bitstream, LSB first:
    ///
    /// ```text
    /// Byte 0: Ch1[0:7]
    /// Byte 1: Ch1[8:10] | Ch2[0:4]
    /// Byte 2: Ch2[5:10] | Ch3[0:1]
    /// ...
    /// ```
    pub fn pack(&self) -> [u8; CRSF_RC_CHANNELS_PAYLOAD_SIZE] {
        let mut payload = [0u8; CRSF_RC_CHANNELS_PAYLOAD_SIZE];
        let mut bit_index = 0;

        for &channel in self.values.iter() {
            for bit in 0..11 {
                if (channel >> bit) & 1 == 1 {
                    payload[bit_index / 8] |= 1 << (bit_index % 8);
                }
                bit_index += 1;
            }
        }

        payload
    }

    /// Unpack a 22-byte RC channels payload. Exact inverse of [`pack`].
    ///
    /// # Errors
    ///
    /// Returns `FrameError::TruncatedPayload` if fewer than 22 bytes are
    /// given.
    ///
    /// [`pack`]: ChannelSet::pack
    pub fn unpack(payload: &[u8]) -> Result<Self, FrameError> {
        if payload.len() < CRSF_RC_CHANNELS_PAYLOAD_SIZE {
            return Err(FrameError::TruncatedPayload {
                kind: "RC channels",
                len: payload.len(),
            });
        }

        let mut values = [0u16; CRSF_NUM_CHANNELS];
        let mut bit_index = 0;

        for value in values.iter_mut() {
            for bit in 0..11 {
                if (payload[bit_index / 8] >> (bit_index % 8)) & 1 == 1 {
                    *value |= 1 << bit;
                }
                bit_index += 1;
            }
        }

        Ok(Self { values })
    }

    /// Wrap the packed payload in an RC channels frame
    pub fn to_frame(&self) -> CrsfFrame {
        // 22-byte payload is always within the frame ceiling
        CrsfFrame {
            frame_type: FrameType::RcChannelsPacked,
            payload: self.pack().to_vec(),
        }
    }
}

impl Default for ChannelSet {
    fn default() -> Self {
        Self::centered()
    }
}
