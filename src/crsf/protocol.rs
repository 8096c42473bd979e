//! # CRSF Protocol Constants and Types
//!
//! Core protocol definitions shared by the codec, framer and translator.

use crate::error::FrameError;

/// CRSF frame sync byte (always 0xC8)
pub const CRSF_SYNC_BYTE: u8 = 0xC8;

/// Maximum CRSF payload size.
/// Frame structure: sync(1) + length(1) + type(1) + payload(N) + crc(1).
/// Maximum frame size is 64 bytes, so max payload = 64 - 4 = 60 bytes.
pub const CRSF_MAX_PAYLOAD_SIZE: usize = 60;

/// Smallest value the length byte may carry (type + crc, empty payload)
pub const CRSF_MIN_FRAME_LENGTH: u8 = 2;

/// Largest value the length byte may carry (type + 60-byte payload + crc)
pub const CRSF_MAX_FRAME_LENGTH: u8 = 62;

/// RC channels payload size (22 bytes for 16 channels × 11 bits)
pub const CRSF_RC_CHANNELS_PAYLOAD_SIZE: usize = 22;

/// Number of RC channels
pub const CRSF_NUM_CHANNELS: usize = 16;

/// Channel value ceiling (11-bit: 0-2047)
pub const CRSF_CHANNEL_VALUE_MAX: u16 = 2047;

/// Low end of the usable channel range ("ticks", corresponds to 988us)
pub const CRSF_TICKS_MIN: u16 = 172;

/// Channel mid-point (corresponds to 1500us)
pub const CRSF_TICKS_MID: u16 = 992;

/// High end of the usable channel range (corresponds to 2012us)
pub const CRSF_TICKS_MAX: u16 = 1811;

/// CRSF frame type identifiers.
///
/// Only the kinds this bridge produces or consumes are enumerated;
/// everything else is carried as `Unknown` and never interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    /// GPS position, speed, heading, altitude (0x02)
    Gps,
    /// Vertical speed (0x07)
    Vario,
    /// Battery voltage, current, capacity (0x08)
    BatterySensor,
    /// Barometric altitude (0x09)
    BaroAltitude,
    /// Airspeed (0x0A)
    Airspeed,
    /// Motor/rotor RPM (0x0C)
    Rpm,
    /// Link statistics from the radio (0x14)
    LinkStatistics,
    /// Packed RC channels (0x16)
    RcChannelsPacked,
    /// Attitude euler angles (0x1E)
    Attitude,
    /// Flight mode text (0x21)
    FlightMode,
    /// Any frame type this bridge does not interpret
    Unknown(u8),
}

impl FrameType {
    /// Wire value of this frame type
    pub fn to_u8(self) -> u8 {
        match self {
            FrameType::Gps => 0x02,
            FrameType::Vario => 0x07,
            FrameType::BatterySensor => 0x08,
            FrameType::BaroAltitude => 0x09,
            FrameType::Airspeed => 0x0A,
            FrameType::Rpm => 0x0C,
            FrameType::LinkStatistics => 0x14,
            FrameType::RcChannelsPacked => 0x16,
            FrameType::Attitude => 0x1E,
            FrameType::FlightMode => 0x21,
            FrameType::Unknown(value) => value,
        }
    }
}

impl From<u8> for FrameType {
    fn from(value: u8) -> Self {
        match value {
            0x02 => FrameType::Gps,
            0x07 => FrameType::Vario,
            0x08 => FrameType::BatterySensor,
            0x09 => FrameType::BaroAltitude,
            0x0A => FrameType::Airspeed,
            0x0C => FrameType::Rpm,
            0x14 => FrameType::LinkStatistics,
            0x16 => FrameType::RcChannelsPacked,
            0x1E => FrameType::Attitude,
            0x21 => FrameType::FlightMode,
            other => FrameType::Unknown(other),
        }
    }
}

/// One CRSF protocol unit.
///
/// Constructed either by decoding wire bytes or by encoding a typed
/// record; immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrsfFrame {
    /// Frame type
    pub frame_type: FrameType,

    /// Payload data
    pub payload: Vec<u8>,
}

impl CrsfFrame {
    /// Create a new CRSF frame.
    ///
    /// # Arguments
    ///
    /// * `frame_type` - Frame type
    /// * `payload` - Payload data (max 60 bytes)
    ///
    /// # Errors
    ///
    /// Returns `FrameError::PayloadTooLarge` if the payload exceeds
    /// `CRSF_MAX_PAYLOAD_SIZE`.
    pub fn new(frame_type: FrameType, payload: Vec<u8>) -> Result<Self, FrameError> {
        if payload.len() > CRSF_MAX_PAYLOAD_SIZE {
            return Err(FrameError::PayloadTooLarge(payload.len()));
        }

        Ok(Self {
            frame_type,
            payload,
        })
    }

    /// Value of the frame's length byte (type + payload + crc).
    ///
    /// Cannot overflow since the payload is validated to be at most 60 bytes.
    pub fn length(&self) -> u8 {
        (1 + self.payload.len() + 1) as u8
    }
}
