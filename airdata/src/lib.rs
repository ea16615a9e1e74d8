//! Air-data computations: coefficient-of-pressure AOA, indicated and true
//! airspeed, density altitude, pressure altitude, and the TAS-derivative
//! smoother feeding accelerometer compensation.

pub mod airspeed;
pub mod altitude;
pub mod aoa;
pub mod curve;

pub use airspeed::{ias_kts_from_dynamic_pressure, tas_mps, TasDotSmoother};
pub use altitude::pressure_altitude_ft;
pub use aoa::{AoaCalculator, AoaResult};
pub use curve::QuadraticCurve;
