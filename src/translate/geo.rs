//! # Geo Conversions
//!
//! Mapping simulator world coordinates and attitude quaternions onto the
//! geographic quantities CRSF telemetry carries.

/// Degrees of latitude per meter, flat local-tangent approximation
const METERS_PER_DEGREE: f64 = 111_111.0;

/// Convert a simulator world position to (longitude, latitude, altitude).
///
/// Uses the quick flat-earth estimate: 111,111 m per degree of latitude
/// and 111,111 · cos(latitude) m per degree of longitude, anchored at
/// `base` = (longitude, latitude) in degrees. Good for displacements of a
/// few kilometers away from the poles, which is all a simulator map
/// needs.
///
/// Simulator axes are Unity's: x east, y up, z north.
pub fn gps_from_position(position: [f32; 3], base: (f64, f64)) -> (f64, f64, f64) {
    let east = position[0] as f64;
    let north = position[2] as f64;

    let latitude = base.1 + north / METERS_PER_DEGREE;
    let longitude = base.0 + east / (METERS_PER_DEGREE * latitude.to_radians().cos());
    let altitude = position[1] as f64;

    (longitude, latitude, altitude)
}

/// Heading in the XZ plane from an attitude quaternion, in radians.
///
/// Range is -pi..pi with 0 pointing north (+z); callers normalize to
/// 0..360 degrees for the wire.
pub fn quat_to_heading(q0: f32, q1: f32, q2: f32, q3: f32) -> f32 {
    (2.0 * ((q2 * q0) + (q3 * q1))).atan2(q3 * q3 + q2 * q2 - q0 * q0 - q1 * q1)
}

/// Euler angles (roll, pitch, yaw) in radians from an attitude
/// quaternion.
///
/// The simulator quaternion is y-up; it is swapped into the z-up IMU
/// convention flight controllers use before extracting the angles.
pub fn quat_to_eulers(qx: f32, qy: f32, qz: f32, qw: f32) -> (f32, f32, f32) {
    // y-up to z-up swap
    let (qx, qy, qz, qw) = (qx, qz, qy, -qw);

    let m00 = 1.0 - 2.0 * qy * qy - 2.0 * qz * qz;
    let m10 = 2.0 * (qx * qy + qw * qz);
    let m20 = 2.0 * (qx * qz - qw * qy);
    let m21 = 2.0 * (qy * qz + qw * qx);
    let m22 = 1.0 - 2.0 * qx * qx - 2.0 * qy * qy;

    let roll = m21.atan2(m22);
    let pitch = std::f32::consts::FRAC_PI_2 - (-m20).clamp(-1.0, 1.0).acos();
    let yaw = -m10.atan2(m00);

    (roll, pitch, yaw)
}
