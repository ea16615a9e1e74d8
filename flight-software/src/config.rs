//! Device configuration.
//!
//! Loaded once at startup (JSON), validated, and shared read-only with the
//! tasks. Defaults carry the production tuning so a missing file still
//! yields a flyable configuration for bench work.

use crate::errors::ConfigError;
use advisor::tone::ToneThresholds;
use airdata::curve::QuadraticCurve;
use fusion::ekf6::Ekf6Config;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Attitude filter backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendKind {
    Madgwick,
    Ekf6,
}

/// Which OAT source feeds TAS, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OatSource {
    None,
    Internal,
    Efis,
}

/// Attitude estimation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttitudeConfig {
    pub backend: BackendKind,
    /// Installation pitch bias, degrees.
    pub pitch_bias_deg: f32,
    /// Installation roll bias, degrees.
    pub roll_bias_deg: f32,
    /// Window for the smoothed gyro telemetry channels.
    pub gyro_smoothing_samples: usize,
    /// Madgwick filter gain.
    pub madgwick_beta: f32,
    pub ekf: Ekf6Config,
}

impl Default for AttitudeConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Ekf6,
            pitch_bias_deg: 0.0,
            roll_bias_deg: 0.0,
            gyro_smoothing_samples: 20,
            madgwick_beta: 0.1,
            ekf: Ekf6Config::default(),
        }
    }
}

/// Airdata (pressure-side) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AirdataConfig {
    /// AOA lag window, samples at the pressure cadence.
    pub aoa_lag_samples: usize,
    /// Median despike window for the pressure ports.
    pub pressure_median_window: usize,
    /// Port biases in raw counts / millibars, from sensor calibration.
    pub pfwd_bias_counts: f32,
    pub p45_bias_counts: f32,
    pub p_static_bias_mbar: f32,
    /// Optional CAS correction applied to IAS.
    pub cas_curve: QuadraticCurve,
    pub oat_source: OatSource,
}

impl Default for AirdataConfig {
    fn default() -> Self {
        Self {
            aoa_lag_samples: 20,
            pressure_median_window: 15,
            pfwd_bias_counts: 0.0,
            p45_bias_counts: 0.0,
            p_static_bias_mbar: 0.0,
            cas_curve: QuadraticCurve::disabled(),
            oat_source: OatSource::Internal,
        }
    }
}

/// Per-flap thresholds and calibration curve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlapSetting {
    /// Flap position this entry covers (degrees of flap, sensor units).
    pub position: i32,
    /// L/Dmax AOA, degrees.
    pub ldmax_aoa_deg: f32,
    /// Fast edge of the on-speed band, degrees.
    pub onspeed_fast_aoa_deg: f32,
    /// Slow edge of the on-speed band, degrees.
    pub onspeed_slow_aoa_deg: f32,
    /// Stall warning AOA, degrees.
    pub stall_warn_aoa_deg: f32,
    /// Cp-to-AOA calibration for this flap setting.
    pub curve: QuadraticCurve,
    /// Working Cp range seen during calibration, for telemetry sanity.
    pub cp_min: f32,
    pub cp_max: f32,
}

impl FlapSetting {
    pub fn thresholds(&self) -> ToneThresholds {
        ToneThresholds {
            ldmax: self.ldmax_aoa_deg,
            onspeed_fast: self.onspeed_fast_aoa_deg,
            onspeed_slow: self.onspeed_slow_aoa_deg,
            stall_warn: self.stall_warn_aoa_deg,
        }
    }
}

impl Default for FlapSetting {
    fn default() -> Self {
        // Clean-configuration values from a calibrated RV-4 install.
        Self {
            position: 0,
            ldmax_aoa_deg: 8.03,
            onspeed_fast_aoa_deg: 11.25,
            onspeed_slow_aoa_deg: 13.84,
            stall_warn_aoa_deg: 16.48,
            curve: QuadraticCurve::new(0.0, 18.0, 0.0),
            cp_min: 0.0,
            cp_max: 1.2,
        }
    }
}

/// Audio and alert configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// No tones at or below this IAS (taxi), knots.
    pub mute_under_ias_kts: f32,
    pub vno_kts: f32,
    pub vno_chime_enabled: bool,
    /// Seconds between Vno chimes.
    pub vno_chime_interval_s: u32,
    pub over_g_warning_enabled: bool,
    pub load_limit_positive_g: f32,
    pub load_limit_negative_g: f32,
    pub audio_3d_enabled: bool,
    pub volume_control_enabled: bool,
    pub default_volume_percent: i32,
    /// Volume knob calibration endpoints, raw ADC.
    pub volume_low_analog: f32,
    pub volume_high_analog: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            mute_under_ias_kts: 25.0,
            vno_kts: 180.0,
            vno_chime_enabled: true,
            vno_chime_interval_s: 5,
            over_g_warning_enabled: true,
            load_limit_positive_g: 4.4,
            load_limit_negative_g: -1.76,
            audio_3d_enabled: false,
            volume_control_enabled: false,
            default_volume_percent: 80,
            volume_low_analog: 0.0,
            volume_high_analog: 4095.0,
        }
    }
}

/// Task rates, Hz.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateConfig {
    pub imu_hz: u32,
    pub pressure_hz: u32,
    pub housekeeping_hz: u32,
}

impl Default for RateConfig {
    fn default() -> Self {
        Self {
            imu_hz: 208,
            pressure_hz: 50,
            housekeeping_hz: 10,
        }
    }
}

/// Top-level device configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub attitude: AttitudeConfig,
    pub airdata: AirdataConfig,
    pub flaps: Vec<FlapSetting>,
    pub audio: AudioConfig,
    pub rates: RateConfig,
}

impl DeviceConfig {
    /// A single-flap default configuration.
    pub fn with_default_flap() -> Self {
        Self {
            flaps: vec![FlapSetting::default()],
            ..Default::default()
        }
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config: DeviceConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Clamp the flap index into the configured table.
    pub fn flap(&self, index: usize) -> &FlapSetting {
        let idx = index.min(self.flaps.len().saturating_sub(1));
        &self.flaps[idx]
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.flaps.is_empty() {
            return Err(ConfigError::InvalidFlaps("no flap settings".into()));
        }
        for (i, f) in self.flaps.iter().enumerate() {
            // Thresholds must escalate; the full-flap case may collapse the
            // pulsed-low region with ldmax >= onspeed_fast.
            if !(f.onspeed_fast_aoa_deg < f.onspeed_slow_aoa_deg
                && f.onspeed_slow_aoa_deg < f.stall_warn_aoa_deg)
            {
                return Err(ConfigError::InvalidFlaps(format!(
                    "flap {i}: thresholds not monotone: fast {} slow {} stall {}",
                    f.onspeed_fast_aoa_deg, f.onspeed_slow_aoa_deg, f.stall_warn_aoa_deg
                )));
            }
        }
        if self.rates.imu_hz == 0 || self.rates.pressure_hz == 0 || self.rates.housekeeping_hz == 0
        {
            return Err(ConfigError::InvalidRates("rates must be non-zero".into()));
        }
        Ok(())
    }
}
