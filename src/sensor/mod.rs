//! Sensor abstraction for telemetry readings
//!
//! The agent publishes one temperature reading per telemetry tick. The
//! [`Sensor`] trait keeps the reading source swappable; field units wire in
//! real hardware behind it, while [`SimulatedSensor`] serves bench setups
//! and tests.

pub mod simulated;

pub use simulated::SimulatedSensor;

use thiserror::Error;

/// Sensor read errors
#[derive(Debug, Error)]
pub enum SensorError {
    #[error("Sensor read failed: {message}")]
    ReadFailed { message: String },
}

/// Source of temperature readings for the telemetry loop
#[async_trait::async_trait]
pub trait Sensor: Send + Sync {
    /// Take one reading in degrees Celsius
    async fn read_value(&mut self) -> Result<f64, SensorError>;
}
