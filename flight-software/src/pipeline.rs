//! Per-cycle attitude and vertical-channel pipeline.
//!
//! Runs at IMU cadence. Each cycle:
//!
//! 1. rotate the raw IMU triples through the installation bias angles,
//! 2. smooth the accelerometers (one-pole EMA) and remove non-gravitational
//!    components (TAS-dot forward, centripetal lateral/vertical),
//! 3. update the selected attitude backend,
//! 4. project earth-vertical acceleration and update the altitude/VSI
//!    Kalman filter,
//! 5. derive flight path angle and AOA.
//!
//! True airspeed and its derivative are computed here from the airdata
//! snapshot because compensation needs them at IMU cadence even though IAS
//! only updates at the pressure cadence.

use crate::backend::{AttitudeBackend, BackendInputs};
use crate::config::{AttitudeConfig, RateConfig};
use crate::sensors::ImuSample;
use airdata::airspeed::{tas_mps, TasDotSmoother};
use fusion::alt_kf::AltKf;
use shared::smoothing::{Ema, RunningAverage};
use shared::units::{
    accel_pitch_deg, accel_roll_deg, deg2rad, ft2m, g2mps2, mps2g, rad2deg,
};

/// Accelerometer EMA coefficient.
const ACCEL_SMOOTHING_ALPHA: f32 = 0.060899;

/// IAS below this is "not alive": VSI is forced to zero and the first
/// transition above it resets the EKF alpha covariance.
const IAS_ALIVE_KTS: f32 = 25.0;

/// Airdata inputs sampled from the shared snapshot each IMU cycle.
#[derive(Debug, Clone, Copy, Default)]
pub struct AirInputs {
    pub ias_kts: f32,
    pub palt_ft: f32,
    /// Microsecond timestamp of the last IAS update.
    pub ias_update_us: u64,
    /// Validated OAT, if a source is configured and in range.
    pub oat_c: Option<f32>,
}

/// Outputs refreshed every IMU cycle.
#[derive(Debug, Clone, Copy, Default)]
pub struct AttitudeOutputs {
    pub phi_deg: f32,
    pub theta_deg: f32,
    pub gamma_deg: f32,
    pub derived_aoa_deg: f32,
    pub tas_mps: f32,
    pub kalman_alt_m: f32,
    pub kalman_vsi_mps: f32,
    pub earth_vertical_g: f32,

    pub accel_fwd_corr_g: f32,
    pub accel_lat_corr_g: f32,
    pub accel_vert_corr_g: f32,
    pub accel_fwd_smooth_g: f32,
    pub accel_lat_smooth_g: f32,
    pub accel_vert_smooth_g: f32,
    pub accel_fwd_comp_g: f32,
    pub accel_lat_comp_g: f32,
    pub accel_vert_comp_g: f32,

    pub gyro_roll_dps: f32,
    pub gyro_pitch_dps: f32,
    pub gyro_yaw_dps: f32,
}

/// The IMU-side estimator owned by the AHRS task.
pub struct AttitudeEstimator {
    backend: AttitudeBackend,
    imu_dt_nominal: f32,
    imu_rate_hz: f32,

    // Installation bias rotation, precomputed (yaw bias is zero by
    // definition and folded into the expressions).
    sin_pitch_bias: f32,
    cos_pitch_bias: f32,
    sin_roll_bias: f32,
    cos_roll_bias: f32,

    gyro_roll_avg: RunningAverage,
    gyro_pitch_avg: RunningAverage,
    gyro_yaw_avg: RunningAverage,

    accel_fwd: Ema,
    accel_lat: Ema,
    accel_vert: Ema,

    tasdot: TasDotSmoother,
    alt_kf: AltKf,

    ias_was_below_alive: bool,
    outputs: AttitudeOutputs,
}

impl AttitudeEstimator {
    pub fn new(config: &AttitudeConfig, rates: &RateConfig) -> Self {
        let pitch_bias_rad = deg2rad(config.pitch_bias_deg);
        let roll_bias_rad = deg2rad(config.roll_bias_deg);
        let imu_rate_hz = rates.imu_hz as f32;
        let window = config.gyro_smoothing_samples.max(1);

        Self {
            backend: AttitudeBackend::from_config(config),
            imu_dt_nominal: 1.0 / imu_rate_hz,
            imu_rate_hz,
            sin_pitch_bias: pitch_bias_rad.sin(),
            cos_pitch_bias: pitch_bias_rad.cos(),
            sin_roll_bias: roll_bias_rad.sin(),
            cos_roll_bias: roll_bias_rad.cos(),
            gyro_roll_avg: RunningAverage::new(window),
            gyro_pitch_avg: RunningAverage::new(window),
            gyro_yaw_avg: RunningAverage::new(window),
            accel_fwd: Ema::new(ACCEL_SMOOTHING_ALPHA, 0.0),
            accel_lat: Ema::new(ACCEL_SMOOTHING_ALPHA, 0.0),
            accel_vert: Ema::new(ACCEL_SMOOTHING_ALPHA, -1.0),
            tasdot: TasDotSmoother::new(imu_rate_hz, rates.pressure_hz as f32),
            alt_kf: AltKf::new_production(0.0),
            ias_was_below_alive: true,
            outputs: AttitudeOutputs::default(),
        }
    }

    /// Initialize the backend and altitude filter from a first sensor
    /// reading taken while the aircraft is at rest.
    pub fn init(&mut self, first_sample: &ImuSample, palt_ft: f32) {
        let (af, al, av) = self.rotate_accel(first_sample);
        let pitch0 = accel_pitch_deg(af, al, av);
        let roll0 = accel_roll_deg(af, al, av);
        self.backend.init(pitch0, roll0, self.imu_rate_hz);
        self.accel_fwd.reset(af);
        self.accel_lat.reset(al);
        self.accel_vert.reset(av);
        self.alt_kf.configure(ft2m(palt_ft), 0.0, 0.0);
        self.outputs.phi_deg = roll0;
        self.outputs.theta_deg = pitch0;
    }

    /// One pipeline cycle. `dt` is the measured IMU period; non-positive
    /// or non-finite values fall back to the nominal period.
    pub fn update(&mut self, imu: &ImuSample, air: &AirInputs, dt: f32) -> AttitudeOutputs {
        let dt = if dt.is_finite() && dt > 0.0 {
            dt
        } else {
            self.imu_dt_nominal
        };

        // True airspeed for compensation; OAT already validated upstream.
        let tas = tas_mps(air.ias_kts, air.palt_ft, air.oat_c);
        let tas_dot_mps2 = self.tasdot.update(tas, air.ias_update_us);

        // Installation-corrected rates and accelerations.
        let (gyro_roll, gyro_pitch, gyro_yaw) = self.rotate_gyro(imu);
        let (accel_fwd_corr, accel_lat_corr, accel_vert_corr) = self.rotate_accel(imu);

        // Smoothed gyro channels for telemetry and housekeeping; the
        // attitude filters consume the unsmoothed rates.
        self.gyro_roll_avg.add(gyro_roll);
        self.gyro_pitch_avg.add(gyro_pitch);
        self.gyro_yaw_avg.add(gyro_yaw);

        // Non-gravitational components in g. Centripetal terms use the
        // backend's bias-corrected rates when it has them.
        let (pitch_rate_comp, yaw_rate_comp) =
            self.backend.compensation_rates_dps(gyro_pitch, gyro_yaw);
        let fwd_factor = mps2g(tas_dot_mps2);
        let lat_factor = mps2g(deg2rad(tas * yaw_rate_comp));
        let vert_factor = mps2g(deg2rad(tas * pitch_rate_comp));

        let fwd_smooth = self.accel_fwd.update(accel_fwd_corr);
        let lat_smooth = self.accel_lat.update(accel_lat_corr);
        let vert_smooth = self.accel_vert.update(accel_vert_corr);

        let fwd_comp = fwd_smooth - fwd_factor;
        let lat_comp = lat_smooth - lat_factor;
        let vert_comp = vert_smooth + vert_factor;

        // Attitude update with the previous cycle's flight path angle.
        let inputs = BackendInputs {
            rates_dps: [gyro_roll, gyro_pitch, gyro_yaw],
            accel_comp_g: [fwd_comp, lat_comp, vert_comp],
            gamma_rad: deg2rad(self.outputs.gamma_deg),
            dt,
        };
        self.backend.update(&inputs);

        let phi_deg = self.backend.roll_deg();
        let theta_deg = self.backend.pitch_deg();

        // Vertical channel.
        let earth_vertical_g =
            self.backend
                .earth_vertical_g([accel_fwd_corr, accel_lat_corr, accel_vert_corr]);
        let (alt_m, mut vsi_mps) =
            self.alt_kf
                .update(ft2m(air.palt_ft), g2mps2(earth_vertical_g), dt);

        // Airspeed-alive gating: hold VSI at zero on the ground, and give
        // the EKF a fresh alpha covariance the first time IAS comes alive.
        if air.ias_kts < IAS_ALIVE_KTS {
            vsi_mps = 0.0;
            self.ias_was_below_alive = true;
        } else if self.ias_was_below_alive {
            self.backend.reset_alpha_cov();
            self.ias_was_below_alive = false;
        }

        // Flight path and derived AOA.
        let gamma_deg = if air.ias_kts > 0.0 && tas > 0.0 {
            rad2deg((vsi_mps / tas).clamp(-1.0, 1.0).asin())
        } else {
            0.0
        };
        let derived_aoa_deg = self.backend.derived_aoa_deg(gamma_deg);

        self.outputs = AttitudeOutputs {
            phi_deg,
            theta_deg,
            gamma_deg,
            derived_aoa_deg,
            tas_mps: tas,
            kalman_alt_m: alt_m,
            kalman_vsi_mps: vsi_mps,
            earth_vertical_g,
            accel_fwd_corr_g: accel_fwd_corr,
            accel_lat_corr_g: accel_lat_corr,
            accel_vert_corr_g: accel_vert_corr,
            accel_fwd_smooth_g: fwd_smooth,
            accel_lat_smooth_g: lat_smooth,
            accel_vert_smooth_g: vert_smooth,
            accel_fwd_comp_g: fwd_comp,
            accel_lat_comp_g: lat_comp,
            accel_vert_comp_g: vert_comp,
            gyro_roll_dps: self.gyro_roll_avg.average(),
            gyro_pitch_dps: self.gyro_pitch_avg.average(),
            gyro_yaw_dps: self.gyro_yaw_avg.average(),
        };
        self.outputs
    }

    pub fn outputs(&self) -> &AttitudeOutputs {
        &self.outputs
    }

    /// Rotate raw gyro rates through the installation bias angles
    /// (rotation matrix with yaw bias zero baked in).
    fn rotate_gyro(&self, imu: &ImuSample) -> (f32, f32, f32) {
        let (sp, cp) = (self.sin_pitch_bias, self.cos_pitch_bias);
        let (sr, cr) = (self.sin_roll_bias, self.cos_roll_bias);

        let roll = imu.gx_dps * cp + imu.gy_dps * (sr * sp) + imu.gz_dps * (cr * sp);
        let pitch = imu.gy_dps * cr - imu.gz_dps * sr;
        let yaw = -imu.gx_dps * sp + imu.gy_dps * (sr * cp) + imu.gz_dps * (cp * cr);
        (roll, pitch, yaw)
    }

    /// Rotate raw accelerations through the installation bias angles.
    fn rotate_accel(&self, imu: &ImuSample) -> (f32, f32, f32) {
        let (sp, cp) = (self.sin_pitch_bias, self.cos_pitch_bias);
        let (sr, cr) = (self.sin_roll_bias, self.cos_roll_bias);

        let vert = -imu.ax_g * sp + imu.ay_g * (sr * cp) + imu.az_g * (cr * cp);
        let lat = imu.ay_g * cr - imu.az_g * sr;
        let fwd = imu.ax_g * cp + imu.ay_g * (sr * sp) + imu.az_g * (cr * sp);
        (fwd, lat, vert)
    }
}
