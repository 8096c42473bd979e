//! # Liftoff Telemetry Stream
//!
//! Parser for the UDP telemetry datagrams emitted by the Liftoff
//! simulator: a configurable sequence of little-endian `f32` fields,
//! described by a JSON `StreamFormat` list matching the simulator's own
//! telemetry configuration file.

use serde::Deserialize;

use crate::error::{BridgeError, Result};

/// One attribute of the Liftoff telemetry stream.
///
/// Names mirror the simulator's stream-format configuration exactly;
/// grouped attributes carry several floats, scalar attributes one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum StreamAttribute {
    Timestamp,
    Position,
    PositionX,
    PositionY,
    PositionZ,
    Attitude,
    AttitudeX,
    AttitudeY,
    AttitudeZ,
    AttitudeW,
    Velocity,
    SpeedX,
    SpeedY,
    SpeedZ,
    Gyro,
    GyroPitch,
    GyroRoll,
    GyroYaw,
    Input,
    InputThrottle,
    InputYaw,
    InputPitch,
    InputRoll,
    Battery,
    BatteryPercentage,
    BatteryVoltage,
    #[serde(rename = "MotorRPM")]
    MotorRpm,
}

/// Ordered list of attributes present in each telemetry datagram
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamFormat {
    attributes: Vec<StreamAttribute>,
}

/// JSON shape of the simulator's stream description
#[derive(Debug, Deserialize)]
struct StreamDescription {
    #[serde(rename = "StreamFormat")]
    stream_format: Vec<StreamAttribute>,
}

impl StreamFormat {
    /// Format from an explicit attribute list
    pub fn new(attributes: Vec<StreamAttribute>) -> Self {
        Self { attributes }
    }

    /// Parse the JSON description the simulator tooling distributes,
    /// e.g. `{"StreamFormat": ["Timestamp", "Position", ...]}`.
    pub fn from_description(json: &str) -> Result<Self> {
        let description: StreamDescription = serde_json::from_str(json)
            .map_err(|e| BridgeError::SimTelemetry(format!("bad stream description: {}", e)))?;
        Ok(Self::new(description.stream_format))
    }

    /// Attributes in wire order
    pub fn attributes(&self) -> &[StreamAttribute] {
        &self.attributes
    }

    /// Parse one telemetry datagram into a [`SimTelemetry`] record.
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::SimTelemetry` if the datagram is shorter
    /// than the format requires.
    pub fn parse(&self, datagram: &[u8]) -> Result<SimTelemetry> {
        let mut cursor = Cursor {
            data: datagram,
            pos: 0,
        };
        let mut record = SimTelemetry::default();

        for &attr in &self.attributes {
            match attr {
                StreamAttribute::Timestamp => record.timestamp = Some(cursor.read_f32()?),

                StreamAttribute::Position => record.position = Some(cursor.read_array()?),
                StreamAttribute::PositionX => record.position_mut()[0] = cursor.read_f32()?,
                StreamAttribute::PositionY => record.position_mut()[1] = cursor.read_f32()?,
                StreamAttribute::PositionZ => record.position_mut()[2] = cursor.read_f32()?,

                StreamAttribute::Attitude => record.attitude = Some(cursor.read_array()?),
                StreamAttribute::AttitudeX => record.attitude_mut()[0] = cursor.read_f32()?,
                StreamAttribute::AttitudeY => record.attitude_mut()[1] = cursor.read_f32()?,
                StreamAttribute::AttitudeZ => record.attitude_mut()[2] = cursor.read_f32()?,
                StreamAttribute::AttitudeW => record.attitude_mut()[3] = cursor.read_f32()?,

                StreamAttribute::Velocity => record.velocity = Some(cursor.read_array()?),
                StreamAttribute::SpeedX => record.velocity_mut()[0] = cursor.read_f32()?,
                StreamAttribute::SpeedY => record.velocity_mut()[1] = cursor.read_f32()?,
                StreamAttribute::SpeedZ => record.velocity_mut()[2] = cursor.read_f32()?,

                StreamAttribute::Gyro => record.gyro = Some(cursor.read_array()?),
                StreamAttribute::GyroPitch => record.gyro_mut()[0] = cursor.read_f32()?,
                StreamAttribute::GyroRoll => record.gyro_mut()[1] = cursor.read_f32()?,
                StreamAttribute::GyroYaw => record.gyro_mut()[2] = cursor.read_f32()?,

                StreamAttribute::Input => record.input = Some(cursor.read_array()?),
                StreamAttribute::InputThrottle => record.input_mut()[0] = cursor.read_f32()?,
                StreamAttribute::InputYaw => record.input_mut()[1] = cursor.read_f32()?,
                StreamAttribute::InputPitch => record.input_mut()[2] = cursor.read_f32()?,
                StreamAttribute::InputRoll => record.input_mut()[3] = cursor.read_f32()?,

                StreamAttribute::Battery => record.battery = Some(cursor.read_array()?),
                StreamAttribute::BatteryPercentage => {
                    record.battery_mut()[0] = cursor.read_f32()?
                }
                StreamAttribute::BatteryVoltage => record.battery_mut()[1] = cursor.read_f32()?,

                StreamAttribute::MotorRpm => {
                    // Dynamic group: one count byte followed by that
                    // many floats
                    let count = cursor.read_u8()? as usize;
                    let mut values = Vec::with_capacity(count);
                    for _ in 0..count {
                        values.push(cursor.read_f32()?);
                    }
                    record.motor_rpm = Some(values);
                }
            }
        }

        Ok(record)
    }
}

/// One parsed Liftoff telemetry record.
///
/// Only the fields present in the stream format are populated; the
/// translator drops whatever has no CRSF counterpart.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimTelemetry {
    /// Seconds since the simulation started
    pub timestamp: Option<f32>,
    /// World position, Unity axes (x east, y up, z north), meters
    pub position: Option<[f32; 3]>,
    /// Attitude quaternion (x, y, z, w)
    pub attitude: Option<[f32; 4]>,
    /// Velocity vector in m/s
    pub velocity: Option<[f32; 3]>,
    /// Angular rates (pitch, roll, yaw)
    pub gyro: Option<[f32; 3]>,
    /// Pilot input (throttle, yaw, pitch, roll)
    pub input: Option<[f32; 4]>,
    /// Battery state (percentage 0-1, voltage)
    pub battery: Option<[f32; 2]>,
    /// Per-motor RPM
    pub motor_rpm: Option<Vec<f32>>,
}

macro_rules! group_accessor {
    ($name:ident, $field:ident, $len:expr) => {
        fn $name(&mut self) -> &mut [f32; $len] {
            self.$field.get_or_insert([0.0; $len])
        }
    };
}

impl SimTelemetry {
    group_accessor!(position_mut, position, 3);
    group_accessor!(attitude_mut, attitude, 4);
    group_accessor!(velocity_mut, velocity, 3);
    group_accessor!(gyro_mut, gyro, 3);
    group_accessor!(input_mut, input, 4);
    group_accessor!(battery_mut, battery, 2);
}

/// Byte cursor over one datagram
struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl Cursor<'_> {
    fn read_u8(&mut self) -> Result<u8> {
        let byte = *self
            .data
            .get(self.pos)
            .ok_or_else(|| BridgeError::SimTelemetry("datagram truncated".to_string()))?;
        self.pos += 1;
        Ok(byte)
    }

    fn read_f32(&mut self) -> Result<f32> {
        let bytes = self
            .data
            .get(self.pos..self.pos + 4)
            .ok_or_else(|| BridgeError::SimTelemetry("datagram truncated".to_string()))?;
        self.pos += 4;
        Ok(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_array<const N: usize>(&mut self) -> Result<[f32; N]> {
        let mut out = [0.0f32; N];
        for value in out.iter_mut() {
            *value = self.read_f32()?;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_f32(buf: &mut Vec<u8>, value: f32) {
        buf.extend_from_slice(&value.to_le_bytes());
    }

    fn full_format() -> StreamFormat {
        StreamFormat::new(vec![
            StreamAttribute::Timestamp,
            StreamAttribute::Position,
            StreamAttribute::Attitude,
            StreamAttribute::Velocity,
            StreamAttribute::Battery,
            StreamAttribute::MotorRpm,
        ])
    }

    fn full_datagram() -> Vec<u8> {
        let mut data = Vec::new();
        push_f32(&mut data, 12.5); // Timestamp
        for v in [10.0, 25.0, -40.0] {
            push_f32(&mut data, v); // Position
        }
        for v in [0.0, 0.0, 0.0, 1.0] {
            push_f32(&mut data, v); // Attitude
        }
        for v in [3.0, -1.0, 4.0] {
            push_f32(&mut data, v); // Velocity
        }
        for v in [0.85, 16.4] {
            push_f32(&mut data, v); // Battery
        }
        data.push(4); // MotorRPM count
        for v in [12000.0, 11900.0, 12100.0, 11800.0] {
            push_f32(&mut data, v);
        }
        data
    }

    #[test]
    fn test_parse_full_record() {
        let record = full_format().parse(&full_datagram()).unwrap();

        assert_eq!(record.timestamp, Some(12.5));
        assert_eq!(record.position, Some([10.0, 25.0, -40.0]));
        assert_eq!(record.attitude, Some([0.0, 0.0, 0.0, 1.0]));
        assert_eq!(record.velocity, Some([3.0, -1.0, 4.0]));
        assert_eq!(record.battery, Some([0.85, 16.4]));
        assert_eq!(
            record.motor_rpm,
            Some(vec![12000.0, 11900.0, 12100.0, 11800.0])
        );
        assert_eq!(record.gyro, None);
        assert_eq!(record.input, None);
    }

    #[test]
    fn test_parse_scalar_attributes() {
        let format = StreamFormat::new(vec![
            StreamAttribute::PositionX,
            StreamAttribute::PositionY,
            StreamAttribute::BatteryVoltage,
        ]);

        let mut data = Vec::new();
        push_f32(&mut data, 1.0);
        push_f32(&mut data, 2.0);
        push_f32(&mut data, 15.2);

        let record = format.parse(&data).unwrap();
        assert_eq!(record.position, Some([1.0, 2.0, 0.0]));
        assert_eq!(record.battery, Some([0.0, 15.2]));
    }

    #[test]
    fn test_parse_truncated_datagram() {
        let result = full_format().parse(&full_datagram()[..10]);
        assert!(matches!(result, Err(BridgeError::SimTelemetry(_))));
    }

    #[test]
    fn test_parse_empty_motor_rpm() {
        let format = StreamFormat::new(vec![StreamAttribute::MotorRpm]);
        let record = format.parse(&[0u8]).unwrap();
        assert_eq!(record.motor_rpm, Some(vec![]));
    }

    #[test]
    fn test_from_description() {
        let json = r#"{"StreamFormat": ["Timestamp", "Position", "Attitude", "Velocity", "Battery", "MotorRPM"]}"#;
        let format = StreamFormat::from_description(json).unwrap();
        assert_eq!(format, full_format());
    }

    #[test]
    fn test_from_description_unknown_attribute() {
        let json = r#"{"StreamFormat": ["Position", "WarpDrive"]}"#;
        assert!(StreamFormat::from_description(json).is_err());
    }
}
