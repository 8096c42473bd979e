//! # Error Types
//!
//! Custom error types for Liftoff Bridge using `thiserror`.

use thiserror::Error;

/// Frame-level errors produced by the CRSF codec and stream framer.
///
/// `Incomplete` is not a stream failure: it only means the caller has to
/// wait for more bytes before retrying the decode. `BadSync`, `BadLength`
/// and `CrcMismatch` indicate corruption the framer recovers from by
/// scanning forward.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Not enough bytes available to decode a complete frame yet
    #[error("incomplete frame, waiting for more bytes")]
    Incomplete,

    /// First byte is not the CRSF sync byte (0xC8)
    #[error("invalid sync byte: 0x{0:02X}")]
    BadSync(u8),

    /// Length byte outside the valid 2..=62 range
    #[error("invalid frame length: {0}")]
    BadLength(u8),

    /// CRC over type + payload does not match the trailing CRC byte
    #[error("CRC mismatch: expected 0x{expected:02X}, got 0x{found:02X}")]
    CrcMismatch { expected: u8, found: u8 },

    /// Payload exceeds the CRSF maximum (60 bytes)
    #[error("payload size {0} exceeds maximum 60 bytes")]
    PayloadTooLarge(usize),

    /// A known frame type carried a payload shorter than its fixed layout
    #[error("truncated {kind} payload: {len} bytes")]
    TruncatedPayload { kind: &'static str, len: usize },
}

/// Main error type for Liftoff Bridge
#[derive(Debug, Error)]
pub enum BridgeError {
    /// CRSF frame errors
    #[error("CRSF frame error: {0}")]
    Frame(#[from] FrameError),

    /// Simulator telemetry stream errors
    #[error("simulator telemetry error: {0}")]
    SimTelemetry(String),

    /// Serial transport errors
    #[error("serial error: {0}")]
    Serial(String),

    /// No radio serial device could be opened
    #[error("no radio serial device found (tried: {0})")]
    SerialPortNotFound(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Liftoff Bridge
pub type Result<T> = std::result::Result<T, BridgeError>;
