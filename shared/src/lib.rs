//! Shared building blocks for the AOA advisory fusion stack.
//!
//! This crate holds the pieces every other crate leans on: physical unit
//! conversions, the smoothing primitives used by the sensor pipeline
//! (running average, running median, one-pole EMA), and the fused-output
//! snapshot type published to the advisor and telemetry consumers.

pub mod smoothing;
pub mod snapshot;
pub mod units;

pub use smoothing::{Ema, RunningAverage, RunningMedian};
pub use snapshot::SensorSnapshot;
