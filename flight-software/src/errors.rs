use thiserror::Error;

/// Errors surfaced by sensor collaborators.
///
/// All of these are treated as transient by the task loops: the cycle is
/// skipped with a rate-limited warning and filter state persists.
#[derive(Error, Debug)]
pub enum SensorError {
    #[error("sensor bus error: {0}")]
    Bus(String),

    #[error("sensor not responding: {0}")]
    NotResponding(String),

    #[error("reading out of range: {0}")]
    OutOfRange(f32),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for sensor operations.
pub type SensorResult<T> = Result<T, SensorError>;

/// Configuration loading/validation errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid flap table: {0}")]
    InvalidFlaps(String),

    #[error("invalid rate configuration: {0}")]
    InvalidRates(String),
}
