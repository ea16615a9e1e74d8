//! Quadratic calibration curve `y = a2 x^2 + a1 x + a0`.
//!
//! Two places use this shape: the per-flap Cp-to-AOA calibration and the
//! optional CAS correction applied to IAS. Curves are produced by the
//! calibration wizard and loaded from configuration; a disabled curve means
//! the caller falls through to its upstream value.

use serde::{Deserialize, Serialize};

/// Quadratic curve with an enable flag.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuadraticCurve {
    pub a2: f32,
    pub a1: f32,
    pub a0: f32,
    pub enabled: bool,
}

impl QuadraticCurve {
    pub fn new(a2: f32, a1: f32, a0: f32) -> Self {
        Self {
            a2,
            a1,
            a0,
            enabled: true,
        }
    }

    pub fn disabled() -> Self {
        Self {
            a2: 0.0,
            a1: 0.0,
            a0: 0.0,
            enabled: false,
        }
    }

    pub fn evaluate(&self, x: f32) -> f32 {
        (self.a2 * x + self.a1) * x + self.a0
    }
}

impl Default for QuadraticCurve {
    fn default() -> Self {
        Self::disabled()
    }
}
