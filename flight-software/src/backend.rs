//! Attitude backend selection.
//!
//! The device runs one of two roll/pitch estimators, chosen at
//! configuration time: the Madgwick quaternion filter or the six-state
//! EKF. The enum gives the pipeline a uniform surface; dispatch is a
//! one-time match at scheduler start, not a per-call trait object.

use crate::config::{AttitudeConfig, BackendKind};
use fusion::ekf6::{Ekf6, Ekf6Measurements};
use fusion::madgwick::Madgwick;
use shared::units::{deg2rad, g2mps2, rad2deg};

/// Per-cycle inputs common to both backends.
#[derive(Debug, Clone, Copy, Default)]
pub struct BackendInputs {
    /// Installation-corrected rates, deg/s: roll, pitch, yaw.
    pub rates_dps: [f32; 3],
    /// Compensated accelerations, g: forward, lateral, vertical.
    pub accel_comp_g: [f32; 3],
    /// Flight path angle from the previous cycle, radians.
    pub gamma_rad: f32,
    /// Integration step, seconds.
    pub dt: f32,
}

/// The selected attitude estimator.
#[derive(Debug, Clone)]
pub enum AttitudeBackend {
    Madgwick(Madgwick),
    Ekf6(Ekf6),
}

impl AttitudeBackend {
    pub fn from_config(config: &AttitudeConfig) -> Self {
        match config.backend {
            BackendKind::Madgwick => AttitudeBackend::Madgwick(Madgwick::new(config.madgwick_beta)),
            BackendKind::Ekf6 => AttitudeBackend::Ekf6(Ekf6::new(config.ekf)),
        }
    }

    /// Initialize from an accelerometer-derived attitude, degrees.
    pub fn init(&mut self, pitch_deg: f32, roll_deg: f32, sample_hz: f32) {
        match self {
            AttitudeBackend::Madgwick(m) => m.begin(sample_hz, pitch_deg, roll_deg),
            AttitudeBackend::Ekf6(ekf) => ekf.init(deg2rad(roll_deg), deg2rad(pitch_deg)),
        }
    }

    /// One estimation cycle.
    pub fn update(&mut self, inputs: &BackendInputs) {
        match self {
            AttitudeBackend::Madgwick(m) => {
                m.set_delta_time(inputs.dt);
                m.update_imu(
                    inputs.rates_dps[0],
                    inputs.rates_dps[1],
                    inputs.rates_dps[2],
                    inputs.accel_comp_g[0],
                    inputs.accel_comp_g[1],
                    inputs.accel_comp_g[2],
                );
            }
            AttitudeBackend::Ekf6(ekf) => {
                let meas = Ekf6Measurements {
                    ax: g2mps2(inputs.accel_comp_g[0]),
                    ay: g2mps2(inputs.accel_comp_g[1]),
                    az: g2mps2(inputs.accel_comp_g[2]),
                    p: deg2rad(inputs.rates_dps[0]),
                    q: deg2rad(inputs.rates_dps[1]),
                    r: deg2rad(inputs.rates_dps[2]),
                    gamma: inputs.gamma_rad,
                };
                ekf.update(&meas, inputs.dt);
            }
        }
    }

    pub fn pitch_deg(&self) -> f32 {
        match self {
            AttitudeBackend::Madgwick(m) => m.pitch_deg(),
            AttitudeBackend::Ekf6(ekf) => ekf.state().theta_deg(),
        }
    }

    pub fn roll_deg(&self) -> f32 {
        match self {
            AttitudeBackend::Madgwick(m) => m.roll_deg(),
            AttitudeBackend::Ekf6(ekf) => ekf.state().phi_deg(),
        }
    }

    /// Derived AOA, degrees. The EKF estimates alpha directly; the
    /// Madgwick path derives it from pitch minus flight path.
    pub fn derived_aoa_deg(&self, flight_path_deg: f32) -> f32 {
        match self {
            AttitudeBackend::Madgwick(m) => m.pitch_deg() - flight_path_deg,
            AttitudeBackend::Ekf6(ekf) => ekf.state().alpha_deg(),
        }
    }

    /// Earth-referenced vertical acceleration in g (up positive, gravity
    /// removed), projected from the installation-corrected accelerations.
    pub fn earth_vertical_g(&self, accel_corr_g: [f32; 3]) -> f32 {
        let [af, al, av] = accel_corr_g;
        match self {
            AttitudeBackend::Madgwick(m) => {
                let (q0, q1, q2, q3) = m.quaternion();
                // Third row of the body-to-earth rotation, negated for the
                // specific-force convention.
                -(2.0 * (q1 * q3 - q0 * q2) * af
                    + 2.0 * (q2 * q3 + q0 * q1) * al
                    + (1.0 - 2.0 * (q1 * q1 + q2 * q2)) * av)
                    - 1.0
            }
            AttitudeBackend::Ekf6(ekf) => {
                let s = ekf.state();
                let (sph, cph) = s.phi.sin_cos();
                let (sth, cth) = s.theta.sin_cos();
                -(-sth * af + sph * cth * al + cph * cth * av) - 1.0
            }
        }
    }

    /// Pitch/yaw rates for centripetal compensation. The EKF subtracts its
    /// previous-cycle bias estimates; Madgwick uses the raw corrected
    /// rates.
    pub fn compensation_rates_dps(&self, pitch_rate_dps: f32, yaw_rate_dps: f32) -> (f32, f32) {
        match self {
            AttitudeBackend::Madgwick(_) => (pitch_rate_dps, yaw_rate_dps),
            AttitudeBackend::Ekf6(ekf) => {
                let s = ekf.state();
                (
                    pitch_rate_dps - rad2deg(s.bq),
                    yaw_rate_dps - rad2deg(s.br),
                )
            }
        }
    }

    /// Forward the alpha-covariance reset to the EKF; no-op for Madgwick.
    pub fn reset_alpha_cov(&mut self) {
        if let AttitudeBackend::Ekf6(ekf) = self {
            ekf.reset_alpha_cov();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn config(kind: BackendKind) -> AttitudeConfig {
        AttitudeConfig {
            backend: kind,
            ..Default::default()
        }
    }

    #[test]
    fn test_both_backends_agree_on_level() {
        for kind in [BackendKind::Madgwick, BackendKind::Ekf6] {
            let mut backend = AttitudeBackend::from_config(&config(kind));
            backend.init(0.0, 0.0, 208.0);
            let inputs = BackendInputs {
                accel_comp_g: [0.0, 0.0, -1.0],
                dt: 1.0 / 208.0,
                ..Default::default()
            };
            for _ in 0..1000 {
                backend.update(&inputs);
            }
            assert_relative_eq!(backend.pitch_deg(), 0.0, epsilon = 0.05);
            assert_relative_eq!(backend.roll_deg(), 0.0, epsilon = 0.05);
        }
    }

    #[test]
    fn test_both_backends_track_static_pitch() {
        let theta = 10.0f32.to_radians();
        for kind in [BackendKind::Madgwick, BackendKind::Ekf6] {
            let mut backend = AttitudeBackend::from_config(&config(kind));
            backend.init(0.0, 0.0, 208.0);
            let inputs = BackendInputs {
                accel_comp_g: [theta.sin(), 0.0, -theta.cos()],
                dt: 1.0 / 208.0,
                ..Default::default()
            };
            for _ in 0..(208 * 5) {
                backend.update(&inputs);
            }
            assert_relative_eq!(backend.pitch_deg(), 10.0, epsilon = 0.3);
        }
    }

    #[test]
    fn test_earth_vertical_g_level() {
        for kind in [BackendKind::Madgwick, BackendKind::Ekf6] {
            let mut backend = AttitudeBackend::from_config(&config(kind));
            backend.init(0.0, 0.0, 208.0);
            let g = backend.earth_vertical_g([0.0, 0.0, -1.0]);
            assert_relative_eq!(g, 0.0, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_earth_vertical_g_pitched() {
        // A pitched airframe still reads zero earth-vertical acceleration
        // in unaccelerated flight.
        let theta = 15.0f32.to_radians();
        let mut backend = AttitudeBackend::from_config(&config(BackendKind::Ekf6));
        backend.init(15.0, 0.0, 208.0);
        let accel = [theta.sin(), 0.0, -theta.cos()];
        let g = backend.earth_vertical_g(accel);
        assert_relative_eq!(g, 0.0, epsilon = 1e-3);
    }

    #[test]
    fn test_compensation_rates_madgwick_passthrough() {
        let backend = AttitudeBackend::from_config(&config(BackendKind::Madgwick));
        assert_eq!(backend.compensation_rates_dps(3.0, -2.0), (3.0, -2.0));
    }

    #[test]
    fn test_derived_aoa_madgwick_is_pitch_minus_gamma() {
        let mut backend = AttitudeBackend::from_config(&config(BackendKind::Madgwick));
        backend.init(8.0, 0.0, 208.0);
        assert_relative_eq!(backend.derived_aoa_deg(3.0), 5.0, epsilon = 0.01);
    }
}
