//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::crsf::channels::ChannelSet;
use crate::crsf::protocol::{CRSF_NUM_CHANNELS, CRSF_TICKS_MID};
use crate::error::{BridgeError, Result};
use crate::telemetry::liftoff::StreamAttribute;
use crate::translate::GeoReference;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub radio: RadioConfig,

    #[serde(default)]
    pub simulator: SimulatorConfig,

    #[serde(default)]
    pub failsafe: FailsafeConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,

    #[serde(default)]
    pub hub: HubConfig,
}

/// Which transport carries the raw CRSF byte stream
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RadioTransportKind {
    /// Direct serial device (ELRS module over USB)
    Serial,
    /// UDP tunnel from a host that owns the serial port
    Udp,
}

/// Radio-side transport configuration
#[derive(Debug, Deserialize, Clone)]
pub struct RadioConfig {
    #[serde(default = "default_radio_transport")]
    pub transport: RadioTransportKind,

    /// Serial device path; empty means auto-detect
    #[serde(default)]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Bind address for the UDP tunnel transport
    #[serde(default = "default_radio_udp_bind")]
    pub udp_bind: String,

    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,

    /// Reconnect attempts before giving up; 0 means retry forever
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,

    /// Interval between link statistics log lines
    #[serde(default = "default_stats_interval_ms")]
    pub stats_interval_ms: u64,
}

/// Simulator-side socket configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SimulatorConfig {
    /// Destination for decoded control data (type + payload datagrams)
    #[serde(default = "default_control_addr")]
    pub control_addr: String,

    /// Bind address for the simulator's telemetry egress
    #[serde(default = "default_sim_telemetry_bind")]
    pub telemetry_bind: String,

    /// When set, subscribe to a telemetry hub at this address instead of
    /// receiving directly from the simulator
    #[serde(default)]
    pub router_addr: Option<String>,

    /// Keepalive re-registration interval when subscribed to a hub
    #[serde(default = "default_keepalive_interval_ms")]
    pub keepalive_interval_ms: u64,

    /// Attribute order of the simulator's telemetry stream
    #[serde(default = "default_stream_format")]
    pub stream_format: Vec<StreamAttribute>,
}

/// Failsafe behavior on control timeout
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum FailsafePolicy {
    /// Re-send the last known-good channel set
    HoldLast,
    /// Send the configured failsafe channel values
    Preset,
}

/// Failsafe configuration
#[derive(Debug, Deserialize, Clone)]
pub struct FailsafeConfig {
    #[serde(default = "default_failsafe_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_failsafe_policy")]
    pub policy: FailsafePolicy,

    /// Channel values to emit under the `preset` policy (16 values)
    #[serde(default = "default_failsafe_channels")]
    pub channels: Vec<u16>,
}

/// Telemetry translation configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    /// Minimum spacing between telemetry bursts toward the radio
    #[serde(default = "default_telemetry_interval_ms")]
    pub interval_ms: u64,

    /// Latitude anchor for the simulator's local coordinates
    #[serde(default)]
    pub base_latitude: f64,

    /// Longitude anchor for the simulator's local coordinates
    #[serde(default)]
    pub base_longitude: f64,
}

/// Wire format of hub broadcast datagrams
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BroadcastFormat {
    /// Forward the simulator's native datagram untouched
    Raw,
    /// Translate and re-encode as CRSF frames for direct radio playback
    Crsf,
}

/// Telemetry hub configuration
#[derive(Debug, Deserialize, Clone)]
pub struct HubConfig {
    /// Bind address for the upstream telemetry ingest socket
    #[serde(default = "default_hub_telemetry_bind")]
    pub telemetry_bind: String,

    /// Bind address for the subscriber command socket
    #[serde(default = "default_hub_command_bind")]
    pub command_bind: String,

    #[serde(default = "default_broadcast_format")]
    pub broadcast_format: BroadcastFormat,
}

// Default value functions
fn default_radio_transport() -> RadioTransportKind { RadioTransportKind::Serial }
fn default_baud_rate() -> u32 { 420_000 }
fn default_radio_udp_bind() -> String { "0.0.0.0:9006".to_string() }
fn default_reconnect_interval_ms() -> u64 { 1000 }
fn default_max_reconnect_attempts() -> u32 { 10 }
fn default_stats_interval_ms() -> u64 { 1000 }

fn default_control_addr() -> String { "127.0.0.1:9005".to_string() }
fn default_sim_telemetry_bind() -> String { "0.0.0.0:9001".to_string() }
fn default_keepalive_interval_ms() -> u64 { 10_000 }
fn default_stream_format() -> Vec<StreamAttribute> {
    vec![
        StreamAttribute::Timestamp,
        StreamAttribute::Position,
        StreamAttribute::Attitude,
        StreamAttribute::Velocity,
        StreamAttribute::Battery,
        StreamAttribute::MotorRpm,
    ]
}

fn default_failsafe_timeout_ms() -> u64 { 500 }
fn default_failsafe_policy() -> FailsafePolicy { FailsafePolicy::Preset }
fn default_failsafe_channels() -> Vec<u16> { vec![CRSF_TICKS_MID; CRSF_NUM_CHANNELS] }

fn default_telemetry_interval_ms() -> u64 { 100 }

fn default_hub_telemetry_bind() -> String { "0.0.0.0:9001".to_string() }
fn default_hub_command_bind() -> String { "0.0.0.0:9003".to_string() }
fn default_broadcast_format() -> BroadcastFormat { BroadcastFormat::Raw }

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            transport: default_radio_transport(),
            port: String::new(),
            baud_rate: default_baud_rate(),
            udp_bind: default_radio_udp_bind(),
            reconnect_interval_ms: default_reconnect_interval_ms(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            stats_interval_ms: default_stats_interval_ms(),
        }
    }
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            control_addr: default_control_addr(),
            telemetry_bind: default_sim_telemetry_bind(),
            router_addr: None,
            keepalive_interval_ms: default_keepalive_interval_ms(),
            stream_format: default_stream_format(),
        }
    }
}

impl Default for FailsafeConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_failsafe_timeout_ms(),
            policy: default_failsafe_policy(),
            channels: default_failsafe_channels(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_telemetry_interval_ms(),
            base_latitude: 0.0,
            base_longitude: 0.0,
        }
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            telemetry_bind: default_hub_telemetry_bind(),
            command_bind: default_hub_command_bind(),
            broadcast_format: default_broadcast_format(),
        }
    }
}

impl FailsafeConfig {
    /// The configured failsafe values as a channel set.
    ///
    /// `validate()` has already enforced exactly 16 values.
    pub fn channel_set(&self) -> ChannelSet {
        let mut values = [CRSF_TICKS_MID; CRSF_NUM_CHANNELS];
        for (slot, &value) in values.iter_mut().zip(self.channels.iter()) {
            *slot = value;
        }
        ChannelSet::new(values)
    }
}

impl TelemetryConfig {
    /// Geographic anchor derived from the base coordinates
    pub fn geo_reference(&self) -> GeoReference {
        GeoReference {
            latitude: self.base_latitude,
            longitude: self.base_longitude,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, TOML parsing fails or
    /// validation fails.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` when given, otherwise fall back to the built-in
    /// defaults.
    pub fn load_or_default(path: Option<&str>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        fn check_addr(field: &str, value: &str) -> Result<()> {
            if value.parse::<std::net::SocketAddr>().is_err() {
                return Err(BridgeError::Config(toml::de::Error::custom(format!(
                    "{} is not a valid socket address: {}",
                    field, value
                ))));
            }
            Ok(())
        }

        check_addr("radio.udp_bind", &self.radio.udp_bind)?;
        check_addr("simulator.control_addr", &self.simulator.control_addr)?;
        check_addr("simulator.telemetry_bind", &self.simulator.telemetry_bind)?;
        if let Some(router_addr) = &self.simulator.router_addr {
            check_addr("simulator.router_addr", router_addr)?;
        }
        check_addr("hub.telemetry_bind", &self.hub.telemetry_bind)?;
        check_addr("hub.command_bind", &self.hub.command_bind)?;

        if self.radio.reconnect_interval_ms == 0 || self.radio.reconnect_interval_ms > 60_000 {
            return Err(BridgeError::Config(toml::de::Error::custom(
                "reconnect_interval_ms must be between 1 and 60000",
            )));
        }

        if self.failsafe.timeout_ms == 0 || self.failsafe.timeout_ms > 60_000 {
            return Err(BridgeError::Config(toml::de::Error::custom(
                "failsafe timeout_ms must be between 1 and 60000",
            )));
        }

        if self.failsafe.channels.len() != CRSF_NUM_CHANNELS {
            return Err(BridgeError::Config(toml::de::Error::custom(format!(
                "failsafe channels must have exactly {} values, got {}",
                CRSF_NUM_CHANNELS,
                self.failsafe.channels.len()
            ))));
        }

        if self.telemetry.interval_ms == 0 || self.telemetry.interval_ms > 60_000 {
            return Err(BridgeError::Config(toml::de::Error::custom(
                "telemetry interval_ms must be between 1 and 60000",
            )));
        }

        if self.simulator.stream_format.is_empty() {
            return Err(BridgeError::Config(toml::de::Error::custom(
                "simulator stream_format cannot be empty",
            )));
        }

        Ok(())
    }
}
