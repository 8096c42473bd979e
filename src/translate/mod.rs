//! # Channel/Telemetry Translator
//!
//! Pure conversions between the CRSF domain and the simulator domain:
//! channel value rescaling in one direction, Liftoff telemetry records
//! into CRSF telemetry records in the other.
//!
//! All functions are total; out-of-range inputs are clamped, and
//! simulator fields with no CRSF counterpart are dropped silently.

pub mod geo;

use crate::crsf::protocol::{CRSF_TICKS_MAX, CRSF_TICKS_MID, CRSF_TICKS_MIN};
use crate::telemetry::liftoff::SimTelemetry;
use crate::telemetry::TelemetryRecord;

/// Ticks above center at full deflection (1811 - 992)
const TICKS_SPAN_HIGH: f32 = (CRSF_TICKS_MAX - CRSF_TICKS_MID) as f32;

/// Ticks below center at full deflection (992 - 172)
const TICKS_SPAN_LOW: f32 = (CRSF_TICKS_MID - CRSF_TICKS_MIN) as f32;

/// Geographic anchor for the simulator's local coordinate frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoReference {
    /// Base latitude in degrees
    pub latitude: f64,
    /// Base longitude in degrees
    pub longitude: f64,
}

impl Default for GeoReference {
    fn default() -> Self {
        Self {
            latitude: 0.0,
            longitude: 0.0,
        }
    }
}

/// Convert a CRSF channel value ("ticks") to pulse microseconds.
///
/// 992 ticks = 1500us, 8 ticks = 5us.
pub fn ticks_to_microseconds(ticks: u16) -> f32 {
    (ticks as f32 - CRSF_TICKS_MID as f32) * 5.0 / 8.0 + 1500.0
}

/// Convert pulse microseconds to CRSF ticks, clamped to the 11-bit range
pub fn microseconds_to_ticks(us: f32) -> u16 {
    ((us - 1500.0) * 8.0 / 5.0 + CRSF_TICKS_MID as f32)
        .round()
        .clamp(0.0, 2047.0) as u16
}

/// Rescale a CRSF channel value to the simulator's -1..1 control range.
///
/// The usable CRSF range is 172-1811 with 992 as center; values outside
/// it saturate at full deflection.
pub fn ticks_to_normalized(ticks: u16) -> f32 {
    let offset = ticks as f32 - CRSF_TICKS_MID as f32;
    let scaled = if offset >= 0.0 {
        offset / TICKS_SPAN_HIGH
    } else {
        offset / TICKS_SPAN_LOW
    };
    scaled.clamp(-1.0, 1.0)
}

/// Rescale a -1..1 control value to CRSF ticks. Inverse of
/// [`ticks_to_normalized`] within rounding tolerance.
pub fn normalized_to_ticks(value: f32) -> u16 {
    let value = value.clamp(-1.0, 1.0);
    let span = if value >= 0.0 {
        TICKS_SPAN_HIGH
    } else {
        TICKS_SPAN_LOW
    };
    (CRSF_TICKS_MID as f32 + value * span).round() as u16
}

/// Translate one simulator telemetry record into CRSF telemetry records.
///
/// Each output record only appears when its source fields are present in
/// the stream; Timestamp, Gyro and Input have no CRSF counterpart and
/// are dropped.
pub fn sim_to_records(sim: &SimTelemetry, base: GeoReference) -> Vec<TelemetryRecord> {
    let mut records = Vec::new();

    if let Some(position) = sim.position {
        let (longitude, latitude, altitude) =
            geo::gps_from_position(position, (base.longitude, base.latitude));

        let ground_speed = sim
            .velocity
            .map(|v| (v[0] * v[0] + v[2] * v[2]).sqrt() * 3.6)
            .unwrap_or(0.0);

        let heading = sim
            .attitude
            .map(|q| {
                let deg = geo::quat_to_heading(q[0], q[1], q[2], q[3]).to_degrees();
                // Wire heading is unsigned 0-360
                if deg < 0.0 {
                    deg + 360.0
                } else {
                    deg
                }
            })
            .unwrap_or(0.0);

        records.push(TelemetryRecord::Gps {
            latitude,
            longitude,
            ground_speed,
            heading,
            altitude: altitude.clamp(i16::MIN as f64, i16::MAX as f64) as i16,
            satellites: 1,
        });

        records.push(TelemetryRecord::BaroAltitude {
            altitude: altitude as f32,
        });
    }

    if let Some(battery) = sim.battery {
        records.push(TelemetryRecord::BatterySensor {
            voltage: battery[1],
            current: 0.0,
            capacity_used: 0,
            remaining_percent: (battery[0] * 100.0).round().clamp(0.0, 100.0) as u8,
        });
    }

    if let Some(velocity) = sim.velocity {
        records.push(TelemetryRecord::Vario {
            vertical_speed: (velocity[1] * 100.0).clamp(i16::MIN as f32, i16::MAX as f32) as i16,
        });

        let airspeed =
            (velocity[0] * velocity[0] + velocity[1] * velocity[1] + velocity[2] * velocity[2])
                .sqrt()
                * 3.6;
        records.push(TelemetryRecord::Airspeed { speed: airspeed });
    }

    if let Some(attitude) = sim.attitude {
        let (roll, pitch, yaw) =
            geo::quat_to_eulers(attitude[0], attitude[1], attitude[2], attitude[3]);
        records.push(TelemetryRecord::Attitude { pitch, roll, yaw });
    }

    if let Some(motor_rpm) = &sim.motor_rpm {
        records.push(TelemetryRecord::Rpm {
            source_id: 0,
            values: motor_rpm.iter().map(|&rpm| rpm.max(0.0) as u32).collect(),
        });
    }

    records
}
