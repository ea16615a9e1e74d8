//! Flight-software composition for the AOA advisory device.
//!
//! Wires the estimation filters (`fusion`), air-data math (`airdata`), and
//! advisory logic (`advisor`) into three periodic tasks sharing a sensor
//! bus:
//!
//! - IMU/AHRS at the IMU rate (nominal 208 Hz)
//! - pressure/AOA at 50 Hz
//! - housekeeping at 10 Hz
//!
//! Hardware is reached only through the traits in [`sensors`], so the same
//! pipeline runs against real drivers, mocks in tests, and the synthetic
//! flight in `fusion_sim`.

pub mod airdata_task;
pub mod backend;
pub mod config;
pub mod errors;
pub mod housekeeping;
pub mod pipeline;
pub mod scheduler;
pub mod sensors;
pub mod state;

pub use config::DeviceConfig;
pub use errors::{ConfigError, SensorError};
pub use pipeline::{AirInputs, AttitudeEstimator, AttitudeOutputs};
pub use scheduler::{Scheduler, TaskContext};
pub use state::SharedState;
