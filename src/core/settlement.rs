//! Settlement: invoking the target and returning escrowed value

use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use tracing::info;

use crate::models::errors::{AppError, AppResult};
use crate::models::types::{AdmissionId, CallOutcome, PendingAdmission};
use crate::utils::constants::wei_to_eth;

#[async_trait]
pub trait Settlement: Send + Sync {
    /// Invoke the admission's target with its payload and value.
    /// Err means the call could not be attempted at all.
    async fn execute(&self, admission: &PendingAdmission) -> AppResult<CallOutcome>;

    /// Return escrowed value to its sender
    async fn refund(&self, sender: Address, value: U256) -> AppResult<()>;
}

/// One settled call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutedCall {
    pub admission_id: AdmissionId,
    pub target: Address,
    pub value: U256,
    pub outcome: CallOutcome,
}

/// In-memory settlement that records every call and refund.
/// Targets marked as reverting produce a failed call outcome.
#[derive(Debug, Default)]
pub struct RecordingSettlement {
    calls: Mutex<Vec<ExecutedCall>>,
    refunds: Mutex<Vec<(Address, U256)>>,
    reverting: DashMap<Address, String>,
    unreachable: Mutex<HashSet<Address>>,
    refunds_failing: AtomicBool,
}

impl RecordingSettlement {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls to `target` will revert with `reason`
    pub fn revert_calls_to(&self, target: Address, reason: impl Into<String>) {
        self.reverting.insert(target, reason.into());
    }

    /// Calls to `target` cannot be attempted
    pub fn make_unreachable(&self, target: Address) {
        self.unreachable.guard().insert(target);
    }

    /// Every later refund is rejected
    pub fn fail_refunds(&self) {
        self.refunds_failing.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<ExecutedCall> {
        self.calls.guard().clone()
    }

    pub fn refunds(&self) -> Vec<(Address, U256)> {
        self.refunds.guard().clone()
    }

    pub fn execution_count(&self, id: &AdmissionId) -> usize {
        self.calls
            .guard()
            .iter()
            .filter(|c| &c.admission_id == id)
            .count()
    }

    pub fn total_refunded(&self) -> U256 {
        self.refunds
            .guard()
            .iter()
            .fold(U256::ZERO, |acc, (_, value)| acc.saturating_add(*value))
    }
}

trait Guarded<T> {
    fn guard(&self) -> MutexGuard<'_, T>;
}

impl<T> Guarded<T> for Mutex<T> {
    fn guard(&self) -> MutexGuard<'_, T> {
        self.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Settlement for RecordingSettlement {
    async fn execute(&self, admission: &PendingAdmission) -> AppResult<CallOutcome> {
        if self.unreachable.guard().contains(&admission.target) {
            return Err(AppError::settlement_failed(format!(
                "target {} unreachable",
                admission.target
            )));
        }

        let outcome = match self.reverting.get(&admission.target) {
            Some(reason) => CallOutcome::failed(reason.value().clone()),
            None => CallOutcome::succeeded(),
        };

        info!(
            "📤 Executed {} -> {} ({:.4} ETH): {}",
            admission.id,
            admission.target,
            wei_to_eth(admission.value),
            if outcome.success { "ok" } else { "reverted" }
        );

        self.calls.guard().push(ExecutedCall {
            admission_id: admission.id,
            target: admission.target,
            value: admission.value,
            outcome: outcome.clone(),
        });
        Ok(outcome)
    }

    async fn refund(&self, sender: Address, value: U256) -> AppResult<()> {
        if self.refunds_failing.load(Ordering::SeqCst) {
            return Err(AppError::settlement_failed(format!(
                "refund to {} rejected",
                sender
            )));
        }
        info!("↩️  Refunded {:.4} ETH to {}", wei_to_eth(value), sender);
        self.refunds.guard().push((sender, value));
        Ok(())
    }
}
