//! Providers Module - Signal Source Implementations
//!
//! Local engines and registries behind the collector's source traits.

pub mod memory;
pub mod simulator;

pub use memory::*;
pub use simulator::*;
