//! Signal source capabilities
//!
//! The collector only depends on these traits. Implementations may be remote
//! services, local engines or test fakes; each call may fail or hang and the
//! collector is responsible for bounding it.

use alloy_primitives::{Address, Bytes};
use async_trait::async_trait;

use crate::models::errors::AppResult;
use crate::models::signals::{AuditReport, ContractProfile, ReputationReport, SimulationOutcome};
use crate::models::types::Transaction;

/// Dry-run execution of a transaction
#[async_trait]
pub trait Simulator: Send + Sync {
    async fn simulate(&self, tx: &Transaction) -> AppResult<SimulationOutcome>;
}

/// Address reputation / blacklist
#[async_trait]
pub trait ReputationLookup: Send + Sync {
    async fn lookup_reputation(&self, address: Address) -> AppResult<ReputationReport>;
}

/// On-chain account metadata
#[async_trait]
pub trait ContractProfiler: Send + Sync {
    async fn profile_contract(&self, address: Address) -> AppResult<ContractProfile>;
}

/// Code-level audit of the called contract
#[async_trait]
pub trait CodeAuditor: Send + Sync {
    async fn audit_code(&self, address: Address, call_data: &Bytes) -> AppResult<AuditReport>;
}
