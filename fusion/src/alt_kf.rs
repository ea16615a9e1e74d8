//! Linear Kalman filter for the vertical channel.
//!
//! Fuses barometric pressure altitude with earth-referenced vertical
//! acceleration into smooth altitude and vertical-speed (VSI) estimates.
//! Runs at IMU rate (~208 Hz).
//!
//! State `x = [z, v_z, b_a]`: altitude (m), vertical velocity (m/s,
//! up positive), and accelerometer bias (m/s^2). Acceleration enters as a
//! control input with the bias subtracted; the altimeter is the single
//! measurement.

use nalgebra::{Matrix3, Vector3};

/// Vertical-channel Kalman filter.
#[derive(Debug, Clone)]
pub struct AltKf {
    /// State estimate [z, v_z, b_a].
    x: Vector3<f32>,
    /// Estimate covariance.
    p: Matrix3<f32>,
    /// Altimeter measurement variance (m^2).
    z_variance: f32,
    /// Vertical acceleration process variance ((m/s^2)^2).
    accel_variance: f32,
    /// Accelerometer bias drift variance per step ((m/s^2)^2).
    bias_variance: f32,
}

impl AltKf {
    /// Production tuning from the flight pipeline.
    pub fn new_production(initial_alt_m: f32) -> Self {
        Self::new(0.79078, 26.0638, 1e-11, initial_alt_m, 0.0, 0.0)
    }

    pub fn new(
        z_variance: f32,
        accel_variance: f32,
        bias_variance: f32,
        initial_alt_m: f32,
        initial_vsi_mps: f32,
        initial_bias_mps2: f32,
    ) -> Self {
        Self {
            x: Vector3::new(initial_alt_m, initial_vsi_mps, initial_bias_mps2),
            p: Matrix3::from_diagonal(&Vector3::new(1.0, 1.0, 1e-6)),
            z_variance,
            accel_variance,
            bias_variance,
        }
    }

    /// Reset state and covariance, keeping the noise tuning.
    pub fn configure(&mut self, initial_alt_m: f32, initial_vsi_mps: f32, initial_bias_mps2: f32) {
        self.x = Vector3::new(initial_alt_m, initial_vsi_mps, initial_bias_mps2);
        self.p = Matrix3::from_diagonal(&Vector3::new(1.0, 1.0, 1e-6));
    }

    /// One predict + correct cycle.
    ///
    /// `z_meas_m` is pressure altitude in meters, `accel_up_mps2` the
    /// earth-vertical acceleration (up positive, gravity removed). A
    /// non-positive dt skips the prediction and only applies the
    /// measurement, so a stalled clock cannot produce NaN.
    ///
    /// Returns `(altitude_m, vsi_mps)`.
    pub fn update(&mut self, z_meas_m: f32, accel_up_mps2: f32, dt: f32) -> (f32, f32) {
        if dt > 0.0 && dt.is_finite() {
            self.predict(accel_up_mps2, dt);
        }
        self.correct(z_meas_m);
        (self.x[0], self.x[1])
    }

    pub fn altitude_m(&self) -> f32 {
        self.x[0]
    }

    pub fn vsi_mps(&self) -> f32 {
        self.x[1]
    }

    pub fn accel_bias_mps2(&self) -> f32 {
        self.x[2]
    }

    fn predict(&mut self, accel_up_mps2: f32, dt: f32) {
        let a = accel_up_mps2 - self.x[2];

        // Constant-velocity model driven by the acceleration input:
        //   z  <- z + v dt + a dt^2 / 2
        //   v  <- v + a dt
        //   b  <- b
        self.x[0] += self.x[1] * dt + 0.5 * a * dt * dt;
        self.x[1] += a * dt;

        let f = Matrix3::new(
            1.0, dt, -0.5 * dt * dt, //
            0.0, 1.0, -dt, //
            0.0, 0.0, 1.0,
        );

        // Process noise: white acceleration through the kinematics, plus an
        // independent random walk on the bias state.
        let g = Vector3::new(0.5 * dt * dt, dt, 0.0);
        let mut q = g * g.transpose() * self.accel_variance;
        q[(2, 2)] += self.bias_variance;

        self.p = f * self.p * f.transpose() + q;
        self.p = (self.p + self.p.transpose()) * 0.5;
    }

    fn correct(&mut self, z_meas_m: f32) {
        // H = [1 0 0]; the innovation covariance is scalar.
        let y = z_meas_m - self.x[0];
        let s = self.p[(0, 0)] + self.z_variance;
        if s <= 0.0 {
            return;
        }
        let k = self.p.column(0) / s;

        self.x += k * y;

        let mut ikh = Matrix3::identity();
        ikh[(0, 0)] -= k[0];
        ikh[(1, 0)] = -k[1];
        ikh[(2, 0)] = -k[2];
        self.p = ikh * self.p;
        self.p = (self.p + self.p.transpose()) * 0.5;
    }
}
