//! # Liftoff Bridge
//!
//! Bridge between a CRSF radio link (ExpressLRS/Crossfire handset) and
//! the Liftoff FPV simulator: RC channel frames from the radio become
//! simulator control datagrams, and simulator telemetry comes back as
//! CRSF telemetry frames for the handset's screen.
//!
//! The crate is split along the data path:
//!
//! - [`crsf`]: frame codec, CRC, channel packing and stream framing
//! - [`telemetry`]: CRSF telemetry records and the Liftoff UDP format
//! - [`translate`]: pure conversions between the two domains
//! - [`transport`]: serial or UDP link to the radio hardware
//! - [`bridge`]: the full-duplex bridge loop with failsafe
//! - [`hub`]: optional broker fanning telemetry out to many consumers
//! - [`config`]: TOML configuration for both binaries

pub mod bridge;
pub mod config;
pub mod crsf;
pub mod error;
pub mod hub;
pub mod telemetry;
pub mod translate;
pub mod transport;
