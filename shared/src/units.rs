//! Physical unit conversions and small angle helpers.
//!
//! Everything here is a plain function over `f32`; the pipeline runs at
//! 208 Hz and these sit on the hot path, so there is no wrapper type layer.
//!
//! Sign conventions used across the workspace:
//! - Body frame is NED-like: x forward, y right wing, z down.
//! - Accelerometers report specific force in g; level flight reads
//!   `(0, 0, -1)`.
//! - Gyro rates are deg/s at the sensor boundary, rad/s inside the EKF.

/// Standard gravity (m/s^2).
pub const GRAVITY_MPS2: f32 = 9.80665;

/// Knots per meter-per-second.
const KTS_PER_MPS: f32 = 1.94384;

/// Feet per meter.
const FT_PER_M: f32 = 3.28084;

/// Millibars per PSI.
const MB_PER_PSI: f32 = 68.9476;

pub fn deg2rad(deg: f32) -> f32 {
    deg.to_radians()
}

pub fn rad2deg(rad: f32) -> f32 {
    rad.to_degrees()
}

pub fn kts2mps(kts: f32) -> f32 {
    kts / KTS_PER_MPS
}

pub fn mps2kts(mps: f32) -> f32 {
    mps * KTS_PER_MPS
}

pub fn ft2m(ft: f32) -> f32 {
    ft / FT_PER_M
}

pub fn m2ft(m: f32) -> f32 {
    m * FT_PER_M
}

/// Acceleration in g to m/s^2.
pub fn g2mps2(g: f32) -> f32 {
    g * GRAVITY_MPS2
}

/// Acceleration in m/s^2 to g.
pub fn mps2g(mps2: f32) -> f32 {
    mps2 / GRAVITY_MPS2
}

pub fn psi2mb(psi: f32) -> f32 {
    psi * MB_PER_PSI
}

/// Linear map of `x` from `[in_min, in_max]` to `[out_min, out_max]`.
///
/// No clamping: values outside the input range extrapolate, matching the
/// behavior the tone advisor and volume mapping rely on.
pub fn map_range(x: f32, in_min: f32, in_max: f32, out_min: f32, out_max: f32) -> f32 {
    (x - in_min) * (out_max - out_min) / (in_max - in_min) + out_min
}

/// Pitch angle (degrees) from a body-frame specific-force triple in g.
///
/// Level flight `(0, 0, -1)` gives 0; a nose-up attitude puts a positive
/// component on the forward axis.
pub fn accel_pitch_deg(fwd_g: f32, lat_g: f32, vert_g: f32) -> f32 {
    rad2deg(fwd_g.atan2((lat_g * lat_g + vert_g * vert_g).sqrt()))
}

/// Roll angle (degrees) from a body-frame specific-force triple in g.
///
/// Matches the attitude-filter measurement model: a right bank of φ reads
/// `lat = -sin(φ)`, `vert = -cos(φ)` and returns +φ.
pub fn accel_roll_deg(_fwd_g: f32, lat_g: f32, vert_g: f32) -> f32 {
    rad2deg((-lat_g).atan2(-vert_g))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_angle_round_trip() {
        assert_relative_eq!(rad2deg(deg2rad(123.4)), 123.4, epsilon = 1e-4);
        assert_relative_eq!(deg2rad(180.0), std::f32::consts::PI, epsilon = 1e-6);
    }

    #[test]
    fn test_speed_conversions() {
        // 100 kts is about 51.44 m/s
        assert_relative_eq!(kts2mps(100.0), 51.4446, epsilon = 0.001);
        assert_relative_eq!(mps2kts(kts2mps(88.0)), 88.0, epsilon = 1e-4);
    }

    #[test]
    fn test_length_conversions() {
        assert_relative_eq!(ft2m(1000.0), 304.8, epsilon = 0.01);
        assert_relative_eq!(m2ft(ft2m(5500.0)), 5500.0, epsilon = 0.01);
    }

    #[test]
    fn test_accel_conversions() {
        assert_relative_eq!(g2mps2(1.0), GRAVITY_MPS2);
        assert_relative_eq!(mps2g(g2mps2(2.5)), 2.5, epsilon = 1e-6);
    }

    #[test]
    fn test_pressure_conversion() {
        // 14.696 PSI is one standard atmosphere, 1013.25 mbar
        assert_relative_eq!(psi2mb(14.696), 1013.25, epsilon = 0.5);
    }

    #[test]
    fn test_map_range() {
        assert_relative_eq!(map_range(5.0, 0.0, 10.0, 0.0, 100.0), 50.0);
        assert_relative_eq!(map_range(13.84, 13.84, 16.48, 1.5, 6.2), 1.5);
        assert_relative_eq!(map_range(16.48, 13.84, 16.48, 1.5, 6.2), 6.2);
        // Extrapolates outside the input range
        assert_relative_eq!(map_range(20.0, 0.0, 10.0, 0.0, 1.0), 2.0);
    }

    #[test]
    fn test_accel_attitude_level() {
        assert_relative_eq!(accel_pitch_deg(0.0, 0.0, -1.0), 0.0);
        assert_relative_eq!(accel_roll_deg(0.0, 0.0, -1.0), 0.0);
    }

    #[test]
    fn test_accel_attitude_pitched() {
        let theta = deg2rad(10.0);
        let pitch = accel_pitch_deg(theta.sin(), 0.0, -theta.cos());
        assert_relative_eq!(pitch, 10.0, epsilon = 1e-3);
    }

    #[test]
    fn test_accel_attitude_banked() {
        let phi = deg2rad(20.0);
        let roll = accel_roll_deg(0.0, -phi.sin(), -phi.cos());
        assert_relative_eq!(roll, 20.0, epsilon = 1e-3);
    }
}
