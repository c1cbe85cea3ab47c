//! Observability for the field agent
//!
//! Structured logging configured from the environment. Logs are the only
//! observability surface this device exposes; everything else would have
//! to travel over the same constrained uplink as the telemetry itself.

pub mod logging;

// Re-export for convenience
pub use logging::{init_default_logging, init_logging, LogFormat};
