//! RusterShield Library
//!
//! Pre-execution transaction firewall. Every transaction is scored before it
//! reaches the chain:
//! - Four risk signals (simulation, reputation, contract profile, code audit)
//!   gathered concurrently under per-source and total deadlines
//! - Unavailable signals degrade to neutral defaults instead of failing
//! - Additive 0-100 scoring with a per-term breakdown
//! - Time-gated admission: execute, quarantine, or block with refund

pub mod api;
pub mod core;
pub mod models;
pub mod providers;
pub mod utils;

pub use crate::core::{
    AdmissionController, BatchCoordinator, RiskScorer, SignalCollector, TransactionAnalyzer,
};
pub use models::{
    AdmissionId, AdmissionState, AppError, AppResult, FirewallConfig, PendingAdmission,
    RiskAssessment, RiskLevel, SignalSet, Transaction,
};
pub use utils::{TelemetryCollector, TelemetryStats, ThreatType};
