//! Models Module - Data Structures & Configuration
//!
//! Single source of truth for data types, signals, errors and configuration.

pub mod config;
pub mod errors;
pub mod signals;
pub mod types;

pub use config::*;
pub use errors::*;
pub use signals::*;
pub use types::*;
