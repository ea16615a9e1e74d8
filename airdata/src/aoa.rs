//! Coefficient-of-pressure AOA calculation.
//!
//! The probe exposes a pitot (forward) port and a 45-degree port. The
//! dimensionless coefficient of pressure
//!
//! ```text
//! Cp = (P_fwd - P_45) / P_fwd
//! ```
//!
//! maps to AOA through the active flap setting's quadratic calibration
//! curve. The published AOA is a lag-window running average of the raw
//! curve output.

use crate::curve::QuadraticCurve;
use shared::smoothing::RunningAverage;

/// P_fwd at or below this floor reuses the previous Cp rather than dividing
/// by a vanishing dynamic pressure.
const PFWD_FLOOR: f32 = 0.01;

/// Default lag window (samples at the pressure cadence).
const DEFAULT_LAG_SAMPLES: usize = 20;

/// Result of one AOA evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AoaResult {
    /// Lagged, calibrated AOA in degrees.
    pub aoa_deg: f32,
    /// Coefficient of pressure feeding the curve (also published for
    /// telemetry and calibration capture).
    pub cp: f32,
}

/// Stateful Cp/AOA evaluator.
#[derive(Debug, Clone)]
pub struct AoaCalculator {
    lag: RunningAverage,
    prev_cp: f32,
    prev_aoa_deg: f32,
}

impl Default for AoaCalculator {
    fn default() -> Self {
        Self::new(DEFAULT_LAG_SAMPLES)
    }
}

impl AoaCalculator {
    pub fn new(lag_samples: usize) -> Self {
        Self {
            lag: RunningAverage::new(lag_samples.max(1)),
            prev_cp: 0.0,
            prev_aoa_deg: 0.0,
        }
    }

    /// Reconfigure the lag window (from the `aoa_lag` config value).
    pub fn set_samples(&mut self, lag_samples: usize) {
        self.lag.set_capacity(lag_samples.max(1));
    }

    /// Evaluate one smoothed pressure pair against the active flap curve.
    ///
    /// `pfwd` and `p45` are the median+average smoothed port values in raw
    /// counts (bias already subtracted upstream). A disabled curve holds the
    /// previously published AOA so the upstream source stays in control.
    pub fn calculate(&mut self, pfwd: f32, p45: f32, curve: &QuadraticCurve) -> AoaResult {
        let cp = if pfwd > PFWD_FLOOR {
            (pfwd - p45) / pfwd
        } else {
            self.prev_cp
        };
        self.prev_cp = cp;

        if curve.enabled {
            let raw_aoa = curve.evaluate(cp);
            self.lag.add(raw_aoa);
            self.prev_aoa_deg = self.lag.average();
        }

        AoaResult {
            aoa_deg: self.prev_aoa_deg,
            cp,
        }
    }

    /// Clear the lag window and held values (used when switching flap
    /// curves during calibration).
    pub fn reset(&mut self) {
        self.lag.clear();
        self.prev_cp = 0.0;
        self.prev_aoa_deg = 0.0;
    }
}
