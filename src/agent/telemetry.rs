//! Telemetry reading construction
//!
//! Builds the periodic telemetry payload. Field order matters on the
//! wire (`random` before `temperature`), so the struct declaration order
//! is the serialization order.

use rand::Rng;
use serde::Serialize;

/// One telemetry sample published per tick
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryReading {
    pub random: u8,
    pub temperature: f64,
}

impl TelemetryReading {
    /// Combine a sensor temperature with a fresh random value in `[0, 100)`.
    pub fn sample<R: Rng>(rng: &mut R, temperature: f64) -> Self {
        Self {
            random: rng.gen_range(0..100),
            temperature,
        }
    }

    pub fn to_payload(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}
