//! # Telemetry Records
//!
//! Typed representation of CRSF telemetry payloads and their fixed
//! big-endian wire layouts.
//!
//! Every kind this bridge produces or consumes is enumerated in
//! [`TelemetryRecord`]; anything else is carried opaquely as
//! [`TelemetryRecord::Unknown`] and never interpreted.

pub mod liftoff;

use crate::crsf::protocol::{CrsfFrame, FrameType};
use crate::error::FrameError;

/// GPS payload size (0x02)
pub const GPS_PAYLOAD_SIZE: usize = 15;

/// Vario payload size (0x07)
pub const VARIO_PAYLOAD_SIZE: usize = 2;

/// Battery sensor payload size (0x08)
pub const BATTERY_PAYLOAD_SIZE: usize = 8;

/// Barometric altitude payload size (0x09)
pub const BARO_ALTITUDE_PAYLOAD_SIZE: usize = 3;

/// Airspeed payload size (0x0A)
pub const AIRSPEED_PAYLOAD_SIZE: usize = 2;

/// Link statistics payload size (0x14)
pub const LINK_STATS_PAYLOAD_SIZE: usize = 10;

/// Attitude payload size (0x1E)
pub const ATTITUDE_PAYLOAD_SIZE: usize = 6;

/// Maximum RPM values in one frame (1 source byte + 19 × 3 bytes)
pub const RPM_MAX_VALUES: usize = 19;

/// Link statistics telemetry data (sent by the radio, not the drone)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkStatistics {
    /// Uplink RSSI (antenna 1) in -dBm
    pub uplink_rssi_1: u8,
    /// Uplink RSSI (antenna 2) in -dBm (diversity)
    pub uplink_rssi_2: u8,
    /// Uplink link quality (0-100%)
    pub uplink_lq: u8,
    /// Uplink SNR in dB
    pub uplink_snr: i8,
    /// Active antenna (0 or 1)
    pub active_antenna: u8,
    /// RF mode / packet rate
    pub rf_mode: u8,
    /// Uplink TX power in mW (encoded)
    pub uplink_tx_power: u8,
    /// Downlink RSSI in -dBm
    pub downlink_rssi: u8,
    /// Downlink link quality (0-100%)
    pub downlink_lq: u8,
    /// Downlink SNR in dB
    pub downlink_snr: i8,
}

/// One decoded telemetry value, tagged by kind.
///
/// Scale factors follow the CRSF wire layouts: degrees ×1e7 for GPS
/// coordinates, km/h ×10 for speeds, degrees ×100 for heading, radians
/// ×1e4 for attitude angles, deci-volts/deci-amps for battery.
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryRecord {
    /// GPS fix (0x02)
    Gps {
        /// Latitude in degrees
        latitude: f64,
        /// Longitude in degrees
        longitude: f64,
        /// Ground speed in km/h
        ground_speed: f32,
        /// Heading in degrees (0-360)
        heading: f32,
        /// Altitude in meters
        altitude: i16,
        /// Number of satellites
        satellites: u8,
    },

    /// Vertical speed (0x07)
    Vario {
        /// Vertical speed in cm/s
        vertical_speed: i16,
    },

    /// Battery sensor (0x08)
    BatterySensor {
        /// Battery voltage in volts
        voltage: f32,
        /// Current draw in amperes
        current: f32,
        /// Capacity used in mAh
        capacity_used: u32,
        /// Battery remaining percentage (0-100%)
        remaining_percent: u8,
    },

    /// Barometric altitude (0x09)
    BaroAltitude {
        /// Altitude above the starting point in meters
        altitude: f32,
    },

    /// Airspeed (0x0A)
    Airspeed {
        /// Airspeed in km/h
        speed: f32,
    },

    /// Motor RPM telemetry (0x0C)
    Rpm {
        /// Source identifier
        source_id: u8,
        /// One RPM value per motor
        values: Vec<u32>,
    },

    /// Link statistics (0x14)
    LinkStatistics(LinkStatistics),

    /// Attitude euler angles (0x1E)
    Attitude {
        /// Pitch in radians
        pitch: f32,
        /// Roll in radians
        roll: f32,
        /// Yaw in radians
        yaw: f32,
    },

    /// Flight mode label (0x21)
    FlightMode(String),

    /// Unrecognized kind, payload passed through untouched
    Unknown {
        /// Wire frame type
        frame_type: u8,
        /// Raw payload bytes
        payload: Vec<u8>,
    },
}

impl TelemetryRecord {
    /// CRSF frame type this record encodes to
    pub fn frame_type(&self) -> FrameType {
        match self {
            TelemetryRecord::Gps { .. } => FrameType::Gps,
            TelemetryRecord::Vario { .. } => FrameType::Vario,
            TelemetryRecord::BatterySensor { .. } => FrameType::BatterySensor,
            TelemetryRecord::BaroAltitude { .. } => FrameType::BaroAltitude,
            TelemetryRecord::Airspeed { .. } => FrameType::Airspeed,
            TelemetryRecord::Rpm { .. } => FrameType::Rpm,
            TelemetryRecord::LinkStatistics(_) => FrameType::LinkStatistics,
            TelemetryRecord::Attitude { .. } => FrameType::Attitude,
            TelemetryRecord::FlightMode(_) => FrameType::FlightMode,
            TelemetryRecord::Unknown { frame_type, .. } => FrameType::Unknown(*frame_type),
        }
    }

    /// Encode this record into a CRSF frame.
    ///
    /// # Errors
    ///
    /// Returns `FrameError::PayloadTooLarge` if the encoded payload
    /// exceeds the CRSF ceiling (possible for oversized flight-mode
    /// strings or RPM lists).
    pub fn to_frame(&self) -> Result<CrsfFrame, FrameError> {
        CrsfFrame::new(self.frame_type(), self.encode_payload())
    }

    /// Build the wire payload for this record
    fn encode_payload(&self) -> Vec<u8> {
        match self {
            TelemetryRecord::Gps {
                latitude,
                longitude,
                ground_speed,
                heading,
                altitude,
                satellites,
            } => {
                let mut payload = Vec::with_capacity(GPS_PAYLOAD_SIZE);
                payload.extend_from_slice(&((latitude * 1e7) as i32).to_be_bytes());
                payload.extend_from_slice(&((longitude * 1e7) as i32).to_be_bytes());
                payload.extend_from_slice(&((ground_speed * 10.0) as u16).to_be_bytes());
                payload.extend_from_slice(&((heading * 100.0) as u16).to_be_bytes());
                payload.extend_from_slice(&((*altitude as i32 + 1000) as u16).to_be_bytes());
                payload.push(*satellites);
                payload
            }

            TelemetryRecord::Vario { vertical_speed } => vertical_speed.to_be_bytes().to_vec(),

            TelemetryRecord::BatterySensor {
                voltage,
                current,
                capacity_used,
                remaining_percent,
            } => {
                let mut payload = Vec::with_capacity(BATTERY_PAYLOAD_SIZE);
                payload.extend_from_slice(&((voltage * 10.0) as i16).to_be_bytes());
                payload.extend_from_slice(&((current * 10.0) as i16).to_be_bytes());
                payload.extend_from_slice(&capacity_used.to_be_bytes()[1..]);
                payload.push(*remaining_percent);
                payload
            }

            TelemetryRecord::BaroAltitude { altitude } => {
                // Packed form: MSB clear = decimeters with a 10000dm
                // offset; MSB set = whole meters without offset.
                let dm = (altitude * 10.0) as i32 + 10_000;
                let packed: u16 = if dm < 0 {
                    0
                } else if dm > 0x7FFF {
                    0x8000 | (*altitude as u16).min(0x7FFF)
                } else {
                    dm as u16
                };
                let mut payload = packed.to_be_bytes().to_vec();
                payload.push(0); // vertical speed: log-scale field, unused
                payload
            }

            TelemetryRecord::Airspeed { speed } => {
                ((speed * 10.0) as u16).to_be_bytes().to_vec()
            }

            TelemetryRecord::Rpm { source_id, values } => {
                let mut payload = Vec::with_capacity(1 + values.len() * 3);
                payload.push(*source_id);
                for value in values.iter().take(RPM_MAX_VALUES) {
                    payload.extend_from_slice(&value.to_be_bytes()[1..]);
                }
                payload
            }

            TelemetryRecord::LinkStatistics(stats) => vec![
                stats.uplink_rssi_1,
                stats.uplink_rssi_2,
                stats.uplink_lq,
                stats.uplink_snr as u8,
                stats.active_antenna,
                stats.rf_mode,
                stats.uplink_tx_power,
                stats.downlink_rssi,
                stats.downlink_lq,
                stats.downlink_snr as u8,
            ],

            TelemetryRecord::Attitude { pitch, roll, yaw } => {
                let mut payload = Vec::with_capacity(ATTITUDE_PAYLOAD_SIZE);
                payload.extend_from_slice(&((pitch * 1e4) as i16).to_be_bytes());
                payload.extend_from_slice(&((roll * 1e4) as i16).to_be_bytes());
                payload.extend_from_slice(&((yaw * 1e4) as i16).to_be_bytes());
                payload
            }

            TelemetryRecord::FlightMode(mode) => {
                let mut payload = mode.as_bytes().to_vec();
                payload.push(0); // NUL terminator
                payload
            }

            TelemetryRecord::Unknown { payload, .. } => payload.clone(),
        }
    }

    /// Decode a CRSF frame into a telemetry record.
    ///
    /// Unrecognized frame types come back as [`TelemetryRecord::Unknown`].
    ///
    /// # Errors
    ///
    /// Returns `FrameError::TruncatedPayload` when a known kind carries
    /// fewer bytes than its fixed layout; callers drop the record.
    pub fn from_frame(frame: &CrsfFrame) -> Result<Self, FrameError> {
        let payload = frame.payload.as_slice();

        match frame.frame_type {
            FrameType::Gps => {
                let p = checked(payload, GPS_PAYLOAD_SIZE, "GPS")?;
                Ok(TelemetryRecord::Gps {
                    latitude: i32::from_be_bytes([p[0], p[1], p[2], p[3]]) as f64 / 1e7,
                    longitude: i32::from_be_bytes([p[4], p[5], p[6], p[7]]) as f64 / 1e7,
                    ground_speed: u16::from_be_bytes([p[8], p[9]]) as f32 / 10.0,
                    heading: u16::from_be_bytes([p[10], p[11]]) as f32 / 100.0,
                    altitude: (u16::from_be_bytes([p[12], p[13]]) as i32 - 1000) as i16,
                    satellites: p[14],
                })
            }

            FrameType::Vario => {
                let p = checked(payload, VARIO_PAYLOAD_SIZE, "vario")?;
                Ok(TelemetryRecord::Vario {
                    vertical_speed: i16::from_be_bytes([p[0], p[1]]),
                })
            }

            FrameType::BatterySensor => {
                let p = checked(payload, BATTERY_PAYLOAD_SIZE, "battery")?;
                Ok(TelemetryRecord::BatterySensor {
                    voltage: i16::from_be_bytes([p[0], p[1]]) as f32 / 10.0,
                    current: i16::from_be_bytes([p[2], p[3]]) as f32 / 10.0,
                    capacity_used: u32::from_be_bytes([0, p[4], p[5], p[6]]),
                    remaining_percent: p[7],
                })
            }

            FrameType::BaroAltitude => {
                let p = checked(payload, BARO_ALTITUDE_PAYLOAD_SIZE, "baro altitude")?;
                let raw = u16::from_be_bytes([p[0], p[1]]);
                let altitude = if raw & 0x8000 != 0 {
                    (raw & 0x7FFF) as f32
                } else {
                    (raw as f32 - 10_000.0) / 10.0
                };
                Ok(TelemetryRecord::BaroAltitude { altitude })
            }

            FrameType::Airspeed => {
                let p = checked(payload, AIRSPEED_PAYLOAD_SIZE, "airspeed")?;
                Ok(TelemetryRecord::Airspeed {
                    speed: u16::from_be_bytes([p[0], p[1]]) as f32 / 10.0,
                })
            }

            FrameType::Rpm => {
                if payload.is_empty() {
                    return Err(FrameError::TruncatedPayload {
                        kind: "RPM",
                        len: 0,
                    });
                }
                let values = payload[1..]
                    .chunks_exact(3)
                    .map(|c| u32::from_be_bytes([0, c[0], c[1], c[2]]))
                    .collect();
                Ok(TelemetryRecord::Rpm {
                    source_id: payload[0],
                    values,
                })
            }

            FrameType::LinkStatistics => {
                let p = checked(payload, LINK_STATS_PAYLOAD_SIZE, "link statistics")?;
                Ok(TelemetryRecord::LinkStatistics(LinkStatistics {
                    uplink_rssi_1: p[0],
                    uplink_rssi_2: p[1],
                    uplink_lq: p[2],
                    uplink_snr: p[3] as i8,
                    active_antenna: p[4],
                    rf_mode: p[5],
                    uplink_tx_power: p[6],
                    downlink_rssi: p[7],
                    downlink_lq: p[8],
                    downlink_snr: p[9] as i8,
                }))
            }

            FrameType::Attitude => {
                let p = checked(payload, ATTITUDE_PAYLOAD_SIZE, "attitude")?;
                Ok(TelemetryRecord::Attitude {
                    pitch: i16::from_be_bytes([p[0], p[1]]) as f32 / 1e4,
                    roll: i16::from_be_bytes([p[2], p[3]]) as f32 / 1e4,
                    yaw: i16::from_be_bytes([p[4], p[5]]) as f32 / 1e4,
                })
            }

            FrameType::FlightMode => {
                let text = payload.split(|&b| b == 0).next().unwrap_or(&[]);
                Ok(TelemetryRecord::FlightMode(
                    String::from_utf8_lossy(text).into_owned(),
                ))
            }

            FrameType::RcChannelsPacked | FrameType::Unknown(_) => Ok(TelemetryRecord::Unknown {
                frame_type: frame.frame_type.to_u8(),
                payload: payload.to_vec(),
            }),
        }
    }
}

/// Require a fixed payload size for a known kind
fn checked<'a>(
    payload: &'a [u8],
    size: usize,
    kind: &'static str,
) -> Result<&'a [u8], FrameError> {
    if payload.len() < size {
        return Err(FrameError::TruncatedPayload {
            kind,
            len: payload.len(),
        });
    }
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gps_round_trip() {
        let record = TelemetryRecord::Gps {
            latitude: 37.7749,
            longitude: -122.4194,
            ground_speed: 25.5,
            heading: 90.0,
            altitude: 100,
            satellites: 12,
        };

        let frame = record.to_frame().unwrap();
        assert_eq!(frame.frame_type, FrameType::Gps);
        assert_eq!(frame.payload.len(), GPS_PAYLOAD_SIZE);

        match TelemetryRecord::from_frame(&frame).unwrap() {
            TelemetryRecord::Gps {
                latitude,
                longitude,
                ground_speed,
                heading,
                altitude,
                satellites,
            } => {
                assert!((latitude - 37.7749).abs() < 1e-6);
                assert!((longitude + 122.4194).abs() < 1e-6);
                assert!((ground_speed - 25.5).abs() < 0.1);
                assert!((heading - 90.0).abs() < 0.01);
                assert_eq!(altitude, 100);
                assert_eq!(satellites, 12);
            }
            other => panic!("expected GPS record, got {:?}", other),
        }
    }

    #[test]
    fn test_gps_negative_altitude() {
        let record = TelemetryRecord::Gps {
            latitude: 0.0,
            longitude: 0.0,
            ground_speed: 0.0,
            heading: 0.0,
            altitude: -50,
            satellites: 1,
        };

        let frame = record.to_frame().unwrap();
        match TelemetryRecord::from_frame(&frame).unwrap() {
            TelemetryRecord::Gps { altitude, .. } => assert_eq!(altitude, -50),
            other => panic!("expected GPS record, got {:?}", other),
        }
    }

    #[test]
    fn test_battery_round_trip() {
        let record = TelemetryRecord::BatterySensor {
            voltage: 16.8,
            current: 12.5,
            capacity_used: 1000,
            remaining_percent: 75,
        };

        let frame = record.to_frame().unwrap();
        assert_eq!(frame.payload.len(), BATTERY_PAYLOAD_SIZE);

        match TelemetryRecord::from_frame(&frame).unwrap() {
            TelemetryRecord::BatterySensor {
                voltage,
                current,
                capacity_used,
                remaining_percent,
            } => {
                assert!((voltage - 16.8).abs() < 0.1);
                assert!((current - 12.5).abs() < 0.1);
                assert_eq!(capacity_used, 1000);
                assert_eq!(remaining_percent, 75);
            }
            other => panic!("expected battery record, got {:?}", other),
        }
    }

    #[test]
    fn test_vario_negative_speed() {
        let record = TelemetryRecord::Vario {
            vertical_speed: -320,
        };
        let frame = record.to_frame().unwrap();
        assert_eq!(TelemetryRecord::from_frame(&frame).unwrap(), record);
    }

    #[test]
    fn test_baro_altitude_decimeter_range() {
        let record = TelemetryRecord::BaroAltitude { altitude: 123.4 };
        let frame = record.to_frame().unwrap();
        assert_eq!(frame.payload.len(), BARO_ALTITUDE_PAYLOAD_SIZE);

        match TelemetryRecord::from_frame(&frame).unwrap() {
            TelemetryRecord::BaroAltitude { altitude } => {
                assert!((altitude - 123.4).abs() < 0.1);
            }
            other => panic!("expected baro record, got {:?}", other),
        }
    }

    #[test]
    fn test_baro_altitude_meter_fallback() {
        // Beyond the decimeter window the meter encoding takes over
        let record = TelemetryRecord::BaroAltitude { altitude: 5000.0 };
        let frame = record.to_frame().unwrap();

        match TelemetryRecord::from_frame(&frame).unwrap() {
            TelemetryRecord::BaroAltitude { altitude } => {
                assert!((altitude - 5000.0).abs() < 1.0);
            }
            other => panic!("expected baro record, got {:?}", other),
        }
    }

    #[test]
    fn test_baro_altitude_below_window_clamps() {
        let record = TelemetryRecord::BaroAltitude { altitude: -2000.0 };
        let frame = record.to_frame().unwrap();
        assert_eq!(frame.payload[..2], [0x00, 0x00]);
    }

    #[test]
    fn test_attitude_round_trip() {
        let record = TelemetryRecord::Attitude {
            pitch: 0.1,
            roll: -0.5,
            yaw: 1.2,
        };

        let frame = record.to_frame().unwrap();
        assert_eq!(frame.payload.len(), ATTITUDE_PAYLOAD_SIZE);

        match TelemetryRecord::from_frame(&frame).unwrap() {
            TelemetryRecord::Attitude { pitch, roll, yaw } => {
                assert!((pitch - 0.1).abs() < 1e-3);
                assert!((roll + 0.5).abs() < 1e-3);
                assert!((yaw - 1.2).abs() < 1e-3);
            }
            other => panic!("expected attitude record, got {:?}", other),
        }
    }

    #[test]
    fn test_flight_mode_round_trip() {
        let record = TelemetryRecord::FlightMode("ACRO".to_string());
        let frame = record.to_frame().unwrap();

        // NUL-terminated on the wire
        assert_eq!(frame.payload, b"ACRO\0");
        assert_eq!(TelemetryRecord::from_frame(&frame).unwrap(), record);
    }

    #[test]
    fn test_flight_mode_too_long_rejected() {
        let record = TelemetryRecord::FlightMode("X".repeat(64));
        assert_eq!(record.to_frame(), Err(FrameError::PayloadTooLarge(65)));
    }

    #[test]
    fn test_rpm_round_trip() {
        let record = TelemetryRecord::Rpm {
            source_id: 0,
            values: vec![12000, 11850, 12100, 11990],
        };

        let frame = record.to_frame().unwrap();
        assert_eq!(frame.payload.len(), 1 + 4 * 3);
        assert_eq!(TelemetryRecord::from_frame(&frame).unwrap(), record);
    }

    #[test]
    fn test_link_statistics_round_trip() {
        let record = TelemetryRecord::LinkStatistics(LinkStatistics {
            uplink_rssi_1: 100,
            uplink_rssi_2: 95,
            uplink_lq: 80,
            uplink_snr: 10,
            active_antenna: 0,
            rf_mode: 6,
            uplink_tx_power: 20,
            downlink_rssi: 90,
            downlink_lq: 85,
            downlink_snr: -3,
        });

        let frame = record.to_frame().unwrap();
        assert_eq!(frame.payload.len(), LINK_STATS_PAYLOAD_SIZE);
        assert_eq!(TelemetryRecord::from_frame(&frame).unwrap(), record);
    }

    #[test]
    fn test_unknown_kind_passes_through() {
        let frame = CrsfFrame::new(FrameType::Unknown(0x3A), vec![1, 2, 3]).unwrap();

        let record = TelemetryRecord::from_frame(&frame).unwrap();
        assert_eq!(
            record,
            TelemetryRecord::Unknown {
                frame_type: 0x3A,
                payload: vec![1, 2, 3],
            }
        );

        // Opaque payload survives re-encoding untouched
        assert_eq!(record.to_frame().unwrap().payload, vec![1, 2, 3]);
    }

    #[test]
    fn test_truncated_payload_rejected() {
        let frame = CrsfFrame::new(FrameType::Gps, vec![0u8; 10]).unwrap();
        assert_eq!(
            TelemetryRecord::from_frame(&frame),
            Err(FrameError::TruncatedPayload {
                kind: "GPS",
                len: 10
            })
        );
    }
}
