//! # CRSF Protocol Module
//!
//! Implementation of the Crossfire (CRSF) wire protocol used between FPV
//! radio hardware and this bridge.
//!
//! This module handles:
//! - Frame encoding/decoding with CRC8-DVB-S2 validation
//! - Resynchronizing stream framing over lossy byte streams
//! - RC channels packing (16 channels, 11-bit resolution)

pub mod channels;
pub mod codec;
pub mod crc;
pub mod framer;
pub mod protocol;
