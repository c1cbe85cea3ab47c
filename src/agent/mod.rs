//! Agent core for the field device
//!
//! This module implements the firmware discovery, chunk transfer, install,
//! and process handoff flow around the periodic telemetry loop.

pub mod attributes;
pub mod identity;
pub mod installer;
pub mod state;
pub mod supervisor;
pub mod telemetry;
pub mod transfer;

pub use attributes::*;
pub use identity::*;
pub use installer::*;
pub use state::*;
pub use supervisor::*;
pub use telemetry::*;
pub use transfer::*;
