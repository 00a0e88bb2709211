//! Signal Collector
//!
//! Fans one transaction out to the four signal sources concurrently and always
//! returns a complete [`SignalSet`]. Every branch goes through [`gather`], which
//! bounds the call by its own sub-deadline and by the shared overall deadline,
//! validates the payload, and substitutes the conservative default on any
//! failure. Collection never returns an error.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::core::clock::{Clock, SystemClock};
use crate::core::sources::{CodeAuditor, ContractProfiler, ReputationLookup, Simulator};
use crate::models::config::CollectorConfig;
use crate::models::errors::AppResult;
use crate::models::signals::{DefaultReason, Signal, SignalPayload, SignalSet, SignalSourceKind};
use crate::models::types::Transaction;

/// Bound one source call and map every failure mode to `Signal::Defaulted`.
///
/// The branch is cut off at whichever comes first: its own sub-deadline
/// (`TimedOut`) or the overall `deadline` (`DeadlineExceeded`). A future that
/// is cut off is dropped, so its eventual result is discarded.
pub async fn gather<T, F>(
    kind: SignalSourceKind,
    sub_timeout: Duration,
    deadline: Instant,
    gas_limit: u64,
    task: F,
) -> Signal<T>
where
    T: SignalPayload,
    F: Future<Output = AppResult<T>>,
{
    let sub_deadline = Instant::now() + sub_timeout;
    let (limit, expiry) = if sub_deadline <= deadline {
        (sub_deadline, DefaultReason::TimedOut)
    } else {
        (deadline, DefaultReason::DeadlineExceeded)
    };

    let signal = match tokio::time::timeout_at(limit, task).await {
        Ok(Ok(value)) => match value.validate(gas_limit) {
            Ok(()) => Signal::Present(value),
            Err(msg) => Signal::Defaulted(DefaultReason::Malformed(msg)),
        },
        Ok(Err(e)) => Signal::Defaulted(DefaultReason::Failed(e.to_string())),
        Err(_) => Signal::Defaulted(expiry),
    };

    match signal.default_reason() {
        Some(DefaultReason::Skipped) | None => debug!(source = %kind, "signal collected"),
        Some(reason) => warn!(
            source = %kind,
            reason = %reason,
            code = reason.error_code().map_or("none", |c| c.as_str()),
            "⚠️ signal defaulted"
        ),
    }
    signal
}

/// Runs all four sources for one transaction
pub struct SignalCollector {
    simulator: Arc<dyn Simulator>,
    reputation: Arc<dyn ReputationLookup>,
    profiler: Arc<dyn ContractProfiler>,
    auditor: Arc<dyn CodeAuditor>,
    config: CollectorConfig,
    clock: Arc<dyn Clock>,
}

impl SignalCollector {
    pub fn new(
        simulator: Arc<dyn Simulator>,
        reputation: Arc<dyn ReputationLookup>,
        profiler: Arc<dyn ContractProfiler>,
        auditor: Arc<dyn CodeAuditor>,
        config: CollectorConfig,
    ) -> Self {
        Self {
            simulator,
            reputation,
            profiler,
            auditor,
            config,
            clock: Arc::new(SystemClock),
        }
    }

    /// Stamp signal sets from `clock`; share it with the admission controller
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    /// Collect with the configured overall deadline
    pub async fn collect(&self, tx: &Transaction) -> SignalSet {
        self.collect_within(tx, self.config.total_deadline).await
    }

    /// Collect with an explicit overall deadline budget
    pub async fn collect_within(&self, tx: &Transaction, budget: Duration) -> SignalSet {
        let deadline = Instant::now() + budget;
        let collected_at = self.clock.now();
        let target = tx.to;

        let simulation = gather(
            SignalSourceKind::Simulation,
            self.config.timeout_for(SignalSourceKind::Simulation),
            deadline,
            tx.gas_limit,
            self.simulator.simulate(tx),
        );
        let reputation = gather(
            SignalSourceKind::Reputation,
            self.config.timeout_for(SignalSourceKind::Reputation),
            deadline,
            tx.gas_limit,
            self.reputation.lookup_reputation(target),
        );
        let profile = gather(
            SignalSourceKind::ContractProfile,
            self.config.timeout_for(SignalSourceKind::ContractProfile),
            deadline,
            tx.gas_limit,
            self.profiler.profile_contract(target),
        );
        let audit = async {
            // Audit only applies to contract calls
            if !tx.is_contract_call() {
                return Signal::Defaulted(DefaultReason::Skipped);
            }
            gather(
                SignalSourceKind::CodeAudit,
                self.config.timeout_for(SignalSourceKind::CodeAudit),
                deadline,
                tx.gas_limit,
                self.auditor.audit_code(target, &tx.data),
            )
            .await
        };

        let (simulation, reputation, profile, audit) =
            tokio::join!(simulation, reputation, profile, audit);

        SignalSet {
            simulation,
            reputation,
            profile,
            audit,
            collected_at,
        }
    }
}
