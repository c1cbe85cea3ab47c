//! Simulated temperature sensor
//!
//! Produces a bounded random walk so telemetry looks like a real ambient
//! probe instead of white noise.

use super::{Sensor, SensorError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const MIN_TEMPERATURE: f64 = 10.0;
const MAX_TEMPERATURE: f64 = 35.0;
const MAX_STEP: f64 = 0.25;

/// Random-walk temperature source
pub struct SimulatedSensor {
    rng: StdRng,
    current: f64,
}

impl SimulatedSensor {
    pub fn new() -> Self {
        Self::with_start(21.5)
    }

    /// Start the walk from a specific temperature
    pub fn with_start(start: f64) -> Self {
        SimulatedSensor {
            rng: StdRng::from_entropy(),
            current: start.clamp(MIN_TEMPERATURE, MAX_TEMPERATURE),
        }
    }
}

impl Default for SimulatedSensor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Sensor for SimulatedSensor {
    async fn read_value(&mut self) -> Result<f64, SensorError> {
        let step = self.rng.gen_range(-MAX_STEP..=MAX_STEP);
        self.current = (self.current + step).clamp(MIN_TEMPERATURE, MAX_TEMPERATURE);
        Ok(self.current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_readings_stay_within_bounds() {
        let mut sensor = SimulatedSensor::new();

        for _ in 0..1000 {
            let value = sensor.read_value().await.unwrap();
            assert!(
                (MIN_TEMPERATURE..=MAX_TEMPERATURE).contains(&value),
                "Reading {value} escaped the sensor range"
            );
        }
    }

    #[tokio::test]
    async fn test_readings_move_gradually() {
        let mut sensor = SimulatedSensor::with_start(20.0);

        let mut previous = sensor.read_value().await.unwrap();
        for _ in 0..100 {
            let value = sensor.read_value().await.unwrap();
            assert!(
                (value - previous).abs() <= MAX_STEP + f64::EPSILON,
                "Step from {previous} to {value} exceeds the walk bound"
            );
            previous = value;
        }
    }

    #[tokio::test]
    async fn test_start_temperature_is_clamped() {
        let mut sensor = SimulatedSensor::with_start(500.0);
        let value = sensor.read_value().await.unwrap();
        assert!(value <= MAX_TEMPERATURE + MAX_STEP);
    }
}
