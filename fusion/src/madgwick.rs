//! Quaternion attitude filter (Madgwick-style gradient descent).
//!
//! Alternative roll/pitch backend to the EKF. The quaternion is the
//! aerospace body-to-earth attitude quaternion; gyro rates integrate the
//! quaternion kinematics and each cycle takes one gradient-descent step of
//! the attitude error toward the measured gravity direction.
//!
//! Conventions match the rest of the workspace: body NED (x forward,
//! y right, z down), accelerometers report specific force so level flight
//! reads `(0, 0, -1)` in any consistent unit (the vector is normalized).
//! Gyro inputs are deg/s.

use shared::units::{deg2rad, rad2deg};

/// Default filter gain. Larger values trust the accelerometers more.
const DEFAULT_BETA: f32 = 0.1;

/// Gradient-descent attitude filter.
#[derive(Debug, Clone)]
pub struct Madgwick {
    beta: f32,
    /// Attitude quaternion (w, x, y, z), body to earth.
    q: [f32; 4],
    /// Integration step, seconds. Updated per cycle when the caller has a
    /// measured dt.
    dt: f32,
}

impl Default for Madgwick {
    fn default() -> Self {
        Self {
            beta: DEFAULT_BETA,
            q: [1.0, 0.0, 0.0, 0.0],
            dt: 1.0 / 208.0,
        }
    }
}

impl Madgwick {
    pub fn new(beta: f32) -> Self {
        Self {
            beta,
            ..Default::default()
        }
    }

    /// Initialize from the sample rate and an accelerometer-derived
    /// attitude, degrees. Yaw starts at zero; there is no magnetometer.
    pub fn begin(&mut self, sample_hz: f32, pitch_deg: f32, roll_deg: f32) {
        self.dt = 1.0 / sample_hz;
        let half_theta = deg2rad(pitch_deg) / 2.0;
        let half_phi = deg2rad(roll_deg) / 2.0;
        let (st, ct) = (half_theta.sin(), half_theta.cos());
        let (sp, cp) = (half_phi.sin(), half_phi.cos());
        // q = qy(theta) * qx(phi), psi = 0
        self.q = [ct * cp, ct * sp, st * cp, -st * sp];
    }

    /// Override the integration step with a measured dt for this cycle.
    pub fn set_delta_time(&mut self, dt: f32) {
        if dt.is_finite() && dt > 0.0 {
            self.dt = dt;
        }
    }

    /// One fusion step. Gyro in deg/s, accelerometer in any consistent unit
    /// (normalized internally). A zero accelerometer vector bypasses the
    /// gradient correction for this cycle (gyro-only integration).
    pub fn update_imu(&mut self, gx_dps: f32, gy_dps: f32, gz_dps: f32, ax: f32, ay: f32, az: f32) {
        let gx = deg2rad(gx_dps);
        let gy = deg2rad(gy_dps);
        let gz = deg2rad(gz_dps);

        let [q0, q1, q2, q3] = self.q;

        // Rate of change from gyros: q_dot = 0.5 * q x omega
        let mut dq0 = 0.5 * (-q1 * gx - q2 * gy - q3 * gz);
        let mut dq1 = 0.5 * (q0 * gx + q2 * gz - q3 * gy);
        let mut dq2 = 0.5 * (q0 * gy - q1 * gz + q3 * gx);
        let mut dq3 = 0.5 * (q0 * gz + q1 * gy - q2 * gx);

        let norm_sq = ax * ax + ay * ay + az * az;
        if norm_sq > 0.0 {
            let inv_norm = 1.0 / norm_sq.sqrt();
            let ax = ax * inv_norm;
            let ay = ay * inv_norm;
            let az = az * inv_norm;

            // Objective: predicted gravity direction in the body frame minus
            // the measurement. With the body-to-earth quaternion, gravity
            // (specific force at rest) maps to the negated third row of the
            // rotation matrix:
            //   v = (-2(q1 q3 - q0 q2), -2(q2 q3 + q0 q1), 2(q1^2 + q2^2) - 1)
            let f1 = -2.0 * (q1 * q3 - q0 * q2) - ax;
            let f2 = -2.0 * (q2 * q3 + q0 * q1) - ay;
            let f3 = 2.0 * (q1 * q1 + q2 * q2) - 1.0 - az;

            // Gradient = J^T f with the Jacobian of v w.r.t. q.
            let mut s0 = 2.0 * q2 * f1 - 2.0 * q1 * f2;
            let mut s1 = -2.0 * q3 * f1 - 2.0 * q0 * f2 + 4.0 * q1 * f3;
            let mut s2 = 2.0 * q0 * f1 - 2.0 * q3 * f2 + 4.0 * q2 * f3;
            let mut s3 = -2.0 * q1 * f1 - 2.0 * q2 * f2;

            let grad_norm = (s0 * s0 + s1 * s1 + s2 * s2 + s3 * s3).sqrt();
            if grad_norm > 0.0 {
                let inv = 1.0 / grad_norm;
                s0 *= inv;
                s1 *= inv;
                s2 *= inv;
                s3 *= inv;

                dq0 -= self.beta * s0;
                dq1 -= self.beta * s1;
                dq2 -= self.beta * s2;
                dq3 -= self.beta * s3;
            }
        }

        self.q[0] = q0 + dq0 * self.dt;
        self.q[1] = q1 + dq1 * self.dt;
        self.q[2] = q2 + dq2 * self.dt;
        self.q[3] = q3 + dq3 * self.dt;

        let inv_norm = 1.0
            / (self.q[0] * self.q[0]
                + self.q[1] * self.q[1]
                + self.q[2] * self.q[2]
                + self.q[3] * self.q[3])
                .sqrt();
        for c in &mut self.q {
            *c *= inv_norm;
        }
    }

    pub fn pitch_rad(&self) -> f32 {
        let [q0, q1, q2, q3] = self.q;
        (2.0 * (q0 * q2 - q1 * q3)).clamp(-1.0, 1.0).asin()
    }

    pub fn roll_rad(&self) -> f32 {
        let [q0, q1, q2, q3] = self.q;
        (2.0 * (q2 * q3 + q0 * q1)).atan2(1.0 - 2.0 * (q1 * q1 + q2 * q2))
    }

    pub fn pitch_deg(&self) -> f32 {
        rad2deg(self.pitch_rad())
    }

    pub fn roll_deg(&self) -> f32 {
        rad2deg(self.roll_rad())
    }

    /// Quaternion components (w, x, y, z) for earth-frame projections.
    pub fn quaternion(&self) -> (f32, f32, f32, f32) {
        (self.q[0], self.q[1], self.q[2], self.q[3])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const SAMPLE_HZ: f32 = 208.0;

    #[test]
    fn test_level_initialization() {
        let mut m = Madgwick::default();
        m.begin(SAMPLE_HZ, 0.0, 0.0);
        assert_relative_eq!(m.pitch_deg(), 0.0, epsilon = 1e-3);
        assert_relative_eq!(m.roll_deg(), 0.0, epsilon = 1e-3);
    }

    #[test]
    fn test_pitched_initialization() {
        let mut m = Madgwick::default();
        m.begin(SAMPLE_HZ, 5.0, 0.0);
        assert_relative_eq!(m.pitch_deg(), 5.0, epsilon = 1e-3);
        assert_relative_eq!(m.roll_deg(), 0.0, epsilon = 1e-3);
    }

    #[test]
    fn test_banked_initialization() {
        let mut m = Madgwick::default();
        m.begin(SAMPLE_HZ, 0.0, -12.0);
        assert_relative_eq!(m.roll_deg(), -12.0, epsilon = 1e-3);
    }

    #[test]
    fn test_level_flight_stability() {
        let mut m = Madgwick::default();
        m.begin(SAMPLE_HZ, 0.0, 0.0);
        for _ in 0..208 {
            m.update_imu(0.0, 0.0, 0.0, 0.0, 0.0, -1.0);
        }
        assert_relative_eq!(m.pitch_deg(), 0.0, epsilon = 0.01);
        assert_relative_eq!(m.roll_deg(), 0.0, epsilon = 0.01);
    }

    #[test]
    fn test_level_convergence_from_offset() {
        // Start 5 degrees off with level gravity; the gradient step pulls
        // the estimate back to level.
        let mut m = Madgwick::default();
        m.begin(SAMPLE_HZ, 5.0, 0.0);
        for _ in 0..(208 * 5) {
            m.update_imu(0.0, 0.0, 0.0, 0.0, 0.0, -1.0);
        }
        assert_relative_eq!(m.pitch_deg(), 0.0, epsilon = 0.1);
    }

    #[test]
    fn test_pitch_rate_integration() {
        // 10 deg/s nose-up for 3 s while gravity tilts consistently toward
        // 30 degrees.
        let mut m = Madgwick::default();
        m.begin(SAMPLE_HZ, 0.0, 0.0);

        let iterations = (SAMPLE_HZ * 3.0) as usize;
        for i in 0..iterations {
            let pitch_rad = (i as f32 / iterations as f32) * deg2rad(30.0);
            let ax = pitch_rad.sin();
            let az = -pitch_rad.cos();
            m.update_imu(0.0, 10.0, 0.0, ax, 0.0, az);
        }

        assert!(
            (m.pitch_deg() - 30.0).abs() < 2.5,
            "pitch {} not near 30",
            m.pitch_deg()
        );
        assert!(m.pitch_deg() > 0.0);
    }

    #[test]
    fn test_roll_rate_integration() {
        let mut m = Madgwick::default();
        m.begin(SAMPLE_HZ, 0.0, 0.0);

        let iterations = (SAMPLE_HZ * 2.0) as usize;
        for i in 0..iterations {
            let roll_rad = (i as f32 / iterations as f32) * deg2rad(30.0);
            let ay = -roll_rad.sin();
            let az = -roll_rad.cos();
            m.update_imu(15.0, 0.0, 0.0, 0.0, ay, az);
        }

        assert!(
            (m.roll_deg() - 30.0).abs() < 2.5,
            "roll {} not near 30",
            m.roll_deg()
        );
    }

    #[test]
    fn test_quaternion_remains_normalized() {
        let mut m = Madgwick::default();
        m.begin(SAMPLE_HZ, 10.0, 5.0);
        for i in 0..5000 {
            let phase = i as f32 / 50.0;
            m.update_imu(
                10.0 * phase.sin(),
                5.0 * phase.cos(),
                2.0,
                0.1,
                -0.2,
                -0.98,
            );
        }
        let (w, x, y, z) = m.quaternion();
        let magnitude = (w * w + x * x + y * y + z * z).sqrt();
        assert_relative_eq!(magnitude, 1.0, epsilon = 1e-3);
    }

    #[test]
    fn test_zero_acceleration_bypasses_correction() {
        let mut m = Madgwick::default();
        m.begin(SAMPLE_HZ, 0.0, 0.0);
        // Freefall: gyro-only integration, no NaN
        m.update_imu(5.0, 0.0, 0.0, 0.0, 0.0, 0.0);
        assert!(m.pitch_deg().is_finite());
        assert!(m.roll_deg().is_finite());
        // Pure gyro integration over 1 s at 5 deg/s rolls about 5 degrees
        for _ in 0..207 {
            m.update_imu(5.0, 0.0, 0.0, 0.0, 0.0, 0.0);
        }
        assert_relative_eq!(m.roll_deg(), 5.0, epsilon = 0.2);
    }

    #[test]
    fn test_high_g_stability() {
        // 2g pull: stronger gravity vector, same direction, still level.
        let mut m = Madgwick::default();
        m.begin(SAMPLE_HZ, 0.0, 0.0);
        for _ in 0..208 {
            m.update_imu(0.0, 0.0, 0.0, 0.0, 0.0, -2.0);
        }
        assert_relative_eq!(m.pitch_deg(), 0.0, epsilon = 0.01);
        assert_relative_eq!(m.roll_deg(), 0.0, epsilon = 0.01);
    }

    #[test]
    fn test_radian_accessors_consistent() {
        let mut m = Madgwick::default();
        m.begin(SAMPLE_HZ, 0.0, 0.0);
        for _ in 0..500 {
            m.update_imu(0.0, 5.0, 0.0, 0.1, 0.0, -0.995);
        }
        assert_relative_eq!(
            m.pitch_deg(),
            rad2deg(m.pitch_rad()),
            epsilon = 1e-4
        );
    }

    #[test]
    fn test_set_delta_time_rejects_invalid() {
        let mut m = Madgwick::default();
        m.begin(SAMPLE_HZ, 0.0, 0.0);
        m.set_delta_time(-1.0);
        m.set_delta_time(f32::NAN);
        m.update_imu(0.0, 0.0, 0.0, 0.0, 0.0, -1.0);
        assert!(m.pitch_deg().is_finite());
    }
}
