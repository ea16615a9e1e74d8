//! State-estimation filters for the AOA advisory core.
//!
//! Four estimators run against the 208 Hz IMU stream:
//!
//! - [`Ekf6`]: six-state extended Kalman filter for roll, pitch, angle of
//!   attack, and the three gyro biases.
//! - [`Madgwick`]: quaternion gradient-descent attitude filter, the
//!   alternative roll/pitch backend.
//! - [`AltKf`]: linear altitude/VSI Kalman filter fusing pressure altitude
//!   with earth-vertical acceleration.
//! - [`SgDerivative`]: Savitzky-Golay first-derivative filter used for the
//!   airspeed-derivative (deceleration) channel.

pub mod alt_kf;
pub mod ekf6;
pub mod madgwick;
pub mod savgol;

pub use alt_kf::AltKf;
pub use ekf6::{Ekf6, Ekf6Config, Ekf6Measurements, Ekf6State};
pub use madgwick::Madgwick;
pub use savgol::SgDerivative;
