//! Fused-output snapshot shared between the sensor tasks, the tone advisor,
//! and telemetry.

use serde::{Deserialize, Serialize};

/// One consistent view of the fused sensor state.
///
/// The pressure task refreshes the airdata fields at ~50 Hz and the IMU task
/// refreshes the attitude fields at ~208 Hz; readers clone the whole struct
/// under the snapshot lock and never observe a torn value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorSnapshot {
    /// Indicated airspeed, knots.
    pub ias_kts: f32,
    /// True airspeed, m/s.
    pub tas_mps: f32,
    /// Pressure altitude, feet.
    pub palt_ft: f32,
    /// Static pressure, millibars (bias-corrected).
    pub p_static_mbar: f32,
    /// Kalman-filtered altitude, meters.
    pub kalman_alt_m: f32,
    /// Kalman-filtered vertical speed, m/s.
    pub kalman_vsi_mps: f32,
    /// Calibrated angle of attack, degrees.
    pub aoa_deg: f32,
    /// Coefficient of pressure feeding the AOA curve.
    pub cp: f32,
    /// Roll estimate, degrees.
    pub phi_deg: f32,
    /// Pitch estimate, degrees.
    pub theta_deg: f32,
    /// Flight path angle, degrees.
    pub gamma_deg: f32,
    /// AOA derived from attitude and flight path, degrees.
    pub derived_aoa_deg: f32,

    /// Installation-corrected accelerations, g.
    pub accel_fwd_corr_g: f32,
    pub accel_lat_corr_g: f32,
    pub accel_vert_corr_g: f32,
    /// Corrected and smoothed accelerations, g.
    pub accel_fwd_smooth_g: f32,
    pub accel_lat_smooth_g: f32,
    pub accel_vert_smooth_g: f32,
    /// Corrected, smoothed, and motion-compensated accelerations, g.
    pub accel_fwd_comp_g: f32,
    pub accel_lat_comp_g: f32,
    pub accel_vert_comp_g: f32,

    /// Smoothed installation-corrected gyro rates, deg/s.
    pub gyro_roll_dps: f32,
    pub gyro_pitch_dps: f32,
    pub gyro_yaw_dps: f32,

    /// Airspeed derivative (deceleration), kts/s.
    pub decel_rate_kts_s: f32,

    /// Raw flap sensor position.
    pub flap_position: i32,
    /// Index into the per-flap configuration table.
    pub flap_index: usize,
    /// Outside air temperature, Celsius, when a valid source exists.
    pub oat_c: Option<f32>,

    /// Microsecond timestamp of the last IAS update, for the TAS-derivative
    /// cadence tracking in the attitude pipeline.
    pub ias_update_us: u64,
}

impl Default for SensorSnapshot {
    fn default() -> Self {
        Self {
            ias_kts: 0.0,
            tas_mps: 0.0,
            palt_ft: 0.0,
            p_static_mbar: 0.0,
            kalman_alt_m: 0.0,
            kalman_vsi_mps: 0.0,
            aoa_deg: 0.0,
            cp: 0.0,
            phi_deg: 0.0,
            theta_deg: 0.0,
            gamma_deg: 0.0,
            derived_aoa_deg: 0.0,
            accel_fwd_corr_g: 0.0,
            accel_lat_corr_g: 0.0,
            accel_vert_corr_g: -1.0,
            accel_fwd_smooth_g: 0.0,
            accel_lat_smooth_g: 0.0,
            accel_vert_smooth_g: -1.0,
            accel_fwd_comp_g: 0.0,
            accel_lat_comp_g: 0.0,
            accel_vert_comp_g: -1.0,
            gyro_roll_dps: 0.0,
            gyro_pitch_dps: 0.0,
            gyro_yaw_dps: 0.0,
            decel_rate_kts_s: 0.0,
            flap_position: 0,
            flap_index: 0,
            oat_c: None,
            ias_update_us: 0,
        }
    }
}
