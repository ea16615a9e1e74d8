//! Indicated and true airspeed.
//!
//! IAS comes from pitot dynamic pressure at sea-level standard density;
//! TAS corrects for density altitude using OAT when a valid source exists,
//! falling back to the 2 % per 1000 ft approximation otherwise. The TAS
//! derivative feeds the accelerometer compensation and is smoothed with a
//! variable-rate EMA because IAS updates at the pressure cadence while the
//! consumer runs at IMU cadence.

use crate::curve::QuadraticCurve;
use shared::units::kts2mps;

/// Sea-level standard air density, kg/m^3.
const RHO_SL: f32 = 1.225;

/// m/s to knots.
const MPS_TO_KTS: f32 = 1.94384;

/// ISA temperature lapse, Kelvin per foot.
const TEMP_RATE_K_PER_FT: f32 = 0.00198119993;

const KELVIN: f32 = 273.15;

/// Target smoothing coefficient for TAS_dot, calibrated at the IMU rate.
const TASDOT_ALPHA_REF: f32 = 0.0179;

/// IAS in knots from dynamic pressure in Pascals.
///
/// Negative dynamic pressure (static port seeing more than the pitot, e.g.
/// tail-on wind during taxi) clamps to zero.
pub fn ias_kts_from_dynamic_pressure(pfwd_pascals: f32) -> f32 {
    if pfwd_pascals > 0.0 {
        (2.0 * pfwd_pascals / RHO_SL).sqrt() * MPS_TO_KTS
    } else {
        0.0
    }
}

/// Apply the CAS correction curve when enabled; identity otherwise.
pub fn cas_correct(ias_kts: f32, curve: &QuadraticCurve) -> f32 {
    if curve.enabled {
        curve.evaluate(ias_kts)
    } else {
        ias_kts
    }
}

/// Density altitude in feet from pressure altitude and OAT.
pub fn density_altitude_ft(palt_ft: f32, oat_c: f32) -> f32 {
    let isa_temp_k = 15.0 - TEMP_RATE_K_PER_FT * palt_ft + KELVIN;
    let oat_k = oat_c + KELVIN;
    palt_ft + (isa_temp_k / TEMP_RATE_K_PER_FT) * (1.0 - (isa_temp_k / oat_k).powf(0.234969))
}

/// TAS in m/s from IAS, pressure altitude, and an optional OAT.
///
/// OAT readings outside (-100, 100) Celsius are treated as invalid by the
/// caller; passing `None` selects the altitude-only approximation.
pub fn tas_mps(ias_kts: f32, palt_ft: f32, oat_c: Option<f32>) -> f32 {
    match oat_c {
        Some(oat) => {
            let da = density_altitude_ft(palt_ft, oat);
            kts2mps(ias_kts / (1.0 - 6.8755856e-6 * da).powf(2.12794))
        }
        None => kts2mps(ias_kts * (1.0 + palt_ft / 1000.0 * 0.02)),
    }
}

/// Variable-rate EMA for the TAS derivative.
///
/// The smoothing target `alpha_ref` is calibrated at the IMU period; when a
/// new IAS sample arrives after `dt_ias` seconds the effective coefficient
/// becomes
///
/// ```text
/// alpha = dt_ias / (dt_imu * (1/alpha_ref - 1) + dt_ias)
/// ```
///
/// so the filter time constant is independent of the update cadence.
#[derive(Debug, Clone)]
pub struct TasDotSmoother {
    /// Nominal IMU period, seconds.
    dt_imu: f32,
    /// Fallback IAS period when the measured delta is unusable, seconds.
    dt_ias_nominal: f32,
    prev_tas_mps: f32,
    smoothed_mps2: f32,
    last_update_us: u64,
}

impl TasDotSmoother {
    pub fn new(imu_rate_hz: f32, ias_rate_hz: f32) -> Self {
        Self {
            dt_imu: 1.0 / imu_rate_hz,
            dt_ias_nominal: 1.0 / ias_rate_hz,
            prev_tas_mps: 0.0,
            smoothed_mps2: 0.0,
            last_update_us: 0,
        }
    }

    /// Current smoothed TAS derivative, m/s^2.
    pub fn value_mps2(&self) -> f32 {
        self.smoothed_mps2
    }

    /// Feed the current TAS and the microsecond timestamp of the latest IAS
    /// update. Only a changed timestamp advances the filter, so this is safe
    /// to call at IMU cadence.
    pub fn update(&mut self, tas_mps: f32, ias_update_us: u64) -> f32 {
        if ias_update_us == self.last_update_us {
            return self.smoothed_mps2;
        }

        if self.last_update_us == 0 {
            // First sample: establish the baseline, no derivative yet.
            self.last_update_us = ias_update_us;
            self.prev_tas_mps = tas_mps;
            self.smoothed_mps2 = 0.0;
            return 0.0;
        }

        let mut dt_ias = (ias_update_us.wrapping_sub(self.last_update_us)) as f32 * 1e-6;
        self.last_update_us = ias_update_us;
        if !dt_ias.is_finite() || dt_ias <= 0.0 {
            dt_ias = self.dt_ias_nominal;
        }

        let tas_diff = tas_mps - self.prev_tas_mps;
        self.prev_tas_mps = tas_mps;

        let tau = self.dt_imu * (1.0 / TASDOT_ALPHA_REF - 1.0);
        let alpha = dt_ias / (tau + dt_ias);
        let tas_dot = tas_diff / dt_ias;
        self.smoothed_mps2 = alpha * tas_dot + (1.0 - alpha) * self.smoothed_mps2;
        self.smoothed_mps2
    }
}
