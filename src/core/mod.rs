//! Core Module - Firewall Pipeline
//!
//! Signal collection, scoring, batch analysis and the admission state machine.

pub mod admission;
pub mod analyzer;
pub mod batch;
pub mod clock;
pub mod collector;
pub mod risk_score;
pub mod settlement;
pub mod sources;

pub use admission::*;
pub use analyzer::*;
pub use batch::*;
pub use clock::*;
pub use collector::*;
pub use risk_score::*;
pub use settlement::*;
pub use sources::*;
