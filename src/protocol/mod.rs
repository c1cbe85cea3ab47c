//! Wire protocol types for the device's broker session
//!
//! Topic grammar for the attribute, telemetry, and firmware-chunk families,
//! plus the firmware descriptor payloads carried on them.

pub mod firmware;
pub mod topics;

pub use firmware::*;
pub use topics::*;
