//! Utils Module - Helper Functions & Shared Utilities
//!
//! Constants, call-data decoding and telemetry used across the crate.

pub mod constants;
pub mod decoder;
pub mod telemetry;

pub use constants::*;
pub use decoder::*;
pub use telemetry::*;
