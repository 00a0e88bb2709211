//! Admission Controller
//!
//! Turns a risk assessment into an enforced outcome:
//!
//! ```text
//!              score >= critical or listed
//!  Submitted ───────────────────────────────▶ Blocked   (refund)
//!      │  score >= high
//!      ├────────────────▶ Quarantined ──release, still risky──▶ Blocked (refund)
//!      │                      │  │
//!      │                      │  └──operator, re-check >= high──▶ Blocked (refund)
//!      │                      └──release, clean──▶ Executed
//!      └─────────────────────────────────────────▶ Executed  (call target)
//! ```
//!
//! Each admission lives behind its own async mutex, so transitions for one id
//! never interleave and a terminal state is observed by every later caller.
//! Reads are served from the last committed copy and never wait on a
//! transition that is still re-analyzing.

use alloy_primitives::{keccak256, Address, U256};
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::core::analyzer::TransactionAnalyzer;
use crate::core::clock::Clock;
use crate::core::settlement::Settlement;
use crate::models::config::FirewallConfig;
use crate::models::errors::{AppError, AppResult, ErrorCode};
use crate::models::types::{
    AdmissionId, AdmissionState, BatchSubmission, CallOutcome, PendingAdmission, SubmissionReceipt,
    Transaction,
};
use crate::utils::constants::wei_to_eth;

type AdmissionCell = Arc<Mutex<PendingAdmission>>;

/// Counters exposed through `stats()`
#[derive(Default)]
struct ControllerStats {
    submitted: AtomicU64,
    executed: AtomicU64,
    quarantined: AtomicU64,
    blocked: AtomicU64,
    refunds: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ControllerSnapshot {
    pub submitted: u64,
    pub executed: u64,
    pub quarantined_total: u64,
    pub quarantined_pending: usize,
    pub blocked: u64,
    pub refunds: u64,
}

pub struct AdmissionController {
    analyzer: Arc<TransactionAnalyzer>,
    settlement: Arc<dyn Settlement>,
    clock: Arc<dyn Clock>,
    config: FirewallConfig,
    quarantine_period: chrono::Duration,
    admissions: DashMap<AdmissionId, AdmissionCell>,
    /// Last committed copy of each admission
    records: DashMap<AdmissionId, PendingAdmission>,
    /// Quarantined ids and the time they become releasable
    quarantine_index: DashMap<AdmissionId, DateTime<Utc>>,
    threats_blocked: DashMap<Address, u64>,
    nonce: AtomicU64,
    stats: ControllerStats,
}

impl AdmissionController {
    pub fn new(
        analyzer: Arc<TransactionAnalyzer>,
        settlement: Arc<dyn Settlement>,
        clock: Arc<dyn Clock>,
        config: FirewallConfig,
    ) -> Self {
        let quarantine_period = chrono::Duration::from_std(config.quarantine_period)
            .unwrap_or_else(|_| chrono::Duration::days(36_500));
        Self {
            analyzer,
            settlement,
            clock,
            config,
            quarantine_period,
            admissions: DashMap::new(),
            records: DashMap::new(),
            quarantine_index: DashMap::new(),
            threats_blocked: DashMap::new(),
            nonce: AtomicU64::new(0),
            stats: ControllerStats::default(),
        }
    }

    pub fn config(&self) -> &FirewallConfig {
        &self.config
    }

    // ============================================
    // SUBMISSION
    // ============================================

    /// SubmitForAdmission
    pub async fn submit(&self, tx: Transaction) -> AppResult<SubmissionReceipt> {
        let analysis = self.analyzer.analyze_detailed(&tx).await;
        let assessment = analysis.assessment;
        let blacklisted = analysis.signals.target_listed();

        let nonce = self.nonce.fetch_add(1, Ordering::SeqCst);
        let submitted_at = self.clock.now();
        let id = admission_id(&tx, nonce, submitted_at);

        let admission = PendingAdmission {
            id,
            sender: tx.from,
            target: tx.to,
            payload: tx.data.clone(),
            value: tx.value,
            submitted_at,
            state: AdmissionState::Submitted,
            risk_score_at_submission: assessment.score,
            nonce,
            transaction: tx,
            resolved_at: None,
            resolution: None,
            call_outcome: None,
            refunded: false,
        };

        let cell: AdmissionCell = Arc::new(Mutex::new(admission));
        let mut guard = cell.lock().await;
        match self.admissions.entry(id) {
            Entry::Occupied(_) => {
                warn!("⚠️ Admission id collision {}", id);
                return Err(AppError::new(
                    ErrorCode::AdmissionConflict,
                    format!("Admission {} already exists", id),
                ));
            }
            Entry::Vacant(slot) => {
                slot.insert(Arc::clone(&cell));
            }
        }
        self.stats.submitted.fetch_add(1, Ordering::Relaxed);

        let thresholds = &self.config.thresholds;
        if assessment.score >= thresholds.critical || blacklisted {
            let reason = if blacklisted {
                "target blacklisted at submission".to_string()
            } else {
                format!("score {} at submission", assessment.score)
            };
            self.block(&mut guard, reason).await;
        } else if assessment.score >= thresholds.high {
            self.quarantine(&mut guard);
        } else {
            self.execute(&mut guard, "cleared at submission").await;
        }
        self.publish(&guard);

        Ok(SubmissionReceipt {
            admission_id: id,
            initial_state: guard.state,
            assessment,
        })
    }

    /// Validate the batch as a whole, then submit each item in order
    pub async fn submit_batch(
        &self,
        batch: BatchSubmission,
    ) -> AppResult<Vec<AppResult<SubmissionReceipt>>> {
        let len = batch.targets.len();
        if len == 0 {
            return Err(AppError::batch_empty());
        }
        if len > self.config.max_batch_size {
            return Err(AppError::batch_too_large(len, self.config.max_batch_size));
        }
        if batch.payloads.len() != len || batch.values.len() != len {
            return Err(AppError::batch_mismatch(format!(
                "targets={} payloads={} values={}",
                len,
                batch.payloads.len(),
                batch.values.len()
            )));
        }

        let total = batch
            .values
            .iter()
            .try_fold(U256::ZERO, |acc, v| acc.checked_add(*v))
            .ok_or_else(|| AppError::batch_mismatch("value sum overflows"))?;
        if total != batch.attached_value {
            return Err(AppError::batch_mismatch(format!(
                "values sum to {} wei but {} wei attached",
                total, batch.attached_value
            )));
        }

        info!("📦 Admitting batch of {} from {}", len, batch.sender);

        let mut receipts = Vec::with_capacity(len);
        for tx in batch.transactions() {
            receipts.push(self.submit(tx).await);
        }
        Ok(receipts)
    }

    // ============================================
    // QUARANTINE EXITS
    // ============================================

    /// ReleaseQuarantine: re-check a quarantined admission whose timer has elapsed
    pub async fn release(&self, id: AdmissionId) -> AppResult<PendingAdmission> {
        let cell = self.cell(&id)?;
        let mut guard = cell.lock().await;
        Self::ensure_quarantined(&guard)?;

        let now = self.clock.now();
        let release_at = self.release_time(guard.submitted_at);
        if now < release_at {
            let remaining = (release_at - now).num_seconds().max(1);
            warn!("⏳ Early release of {} rejected ({}s left)", id, remaining);
            return Err(AppError::quarantine_active(remaining));
        }

        let recheck = self.analyzer.analyze_detailed(&guard.transaction).await;
        let blacklisted = recheck.signals.target_listed();
        let score = recheck.assessment.score;

        if blacklisted || score >= self.config.thresholds.critical {
            let reason = if blacklisted {
                "target blacklisted during quarantine".to_string()
            } else {
                format!("score {} on release", score)
            };
            self.block(&mut guard, reason).await;
        } else {
            self.execute(&mut guard, "released after quarantine").await;
        }

        self.publish(&guard);
        Ok(guard.clone())
    }

    /// Operator early exit: block a quarantined admission whose re-checked score is still high
    pub async fn force_block(
        &self,
        id: AdmissionId,
        operator: Address,
    ) -> AppResult<PendingAdmission> {
        if !self.config.is_operator(&operator) {
            warn!("🚫 {} is not an operator", operator);
            return Err(AppError::unauthorized(format!(
                "{} is not an operator",
                operator
            )));
        }

        let cell = self.cell(&id)?;
        let mut guard = cell.lock().await;
        Self::ensure_quarantined(&guard)?;

        let recheck = self.analyzer.analyze(&guard.transaction).await;
        if recheck.score < self.config.thresholds.high {
            warn!(
                "⚠️ Force block of {} refused: re-checked score {}",
                id, recheck.score
            );
            return Err(AppError::new(
                ErrorCode::NotEscalated,
                format!(
                    "Re-checked score {} is below high threshold {}",
                    recheck.score, self.config.thresholds.high
                ),
            ));
        }

        self.block(
            &mut guard,
            format!("forced by operator {} (score {})", operator, recheck.score),
        )
        .await;
        self.publish(&guard);
        Ok(guard.clone())
    }

    // ============================================
    // QUERIES
    // ============================================

    /// GetAdmission
    pub fn get_admission(&self, id: AdmissionId) -> AppResult<PendingAdmission> {
        self.records
            .get(&id)
            .map(|record| record.value().clone())
            .ok_or_else(|| AppError::admission_not_found(id))
    }

    /// Quarantined ids releasable at `now`, earliest first
    pub fn due_for_release(&self, now: DateTime<Utc>) -> Vec<AdmissionId> {
        let mut due: Vec<_> = self
            .quarantine_index
            .iter()
            .filter(|entry| *entry.value() <= now)
            .map(|entry| (*entry.value(), *entry.key()))
            .collect();
        due.sort();
        due.into_iter().map(|(_, id)| id).collect()
    }

    pub fn threats_blocked(&self, sender: &Address) -> u64 {
        self.threats_blocked
            .get(sender)
            .map(|count| *count)
            .unwrap_or(0)
    }

    pub fn stats(&self) -> ControllerSnapshot {
        ControllerSnapshot {
            submitted: self.stats.submitted.load(Ordering::Relaxed),
            executed: self.stats.executed.load(Ordering::Relaxed),
            quarantined_total: self.stats.quarantined.load(Ordering::Relaxed),
            quarantined_pending: self.quarantine_index.len(),
            blocked: self.stats.blocked.load(Ordering::Relaxed),
            refunds: self.stats.refunds.load(Ordering::Relaxed),
        }
    }

    // ============================================
    // TRANSITIONS
    // ============================================

    fn cell(&self, id: &AdmissionId) -> AppResult<AdmissionCell> {
        self.admissions
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| AppError::admission_not_found(id))
    }

    fn publish(&self, admission: &PendingAdmission) {
        self.records.insert(admission.id, admission.clone());
    }

    fn ensure_quarantined(admission: &PendingAdmission) -> AppResult<()> {
        if admission.state.is_terminal() {
            warn!("⚠️ {} is already {}", admission.id, admission.state);
            return Err(AppError::admission_finalized(admission.id, admission.state));
        }
        if admission.state != AdmissionState::Quarantined {
            return Err(AppError::new(
                ErrorCode::AdmissionConflict,
                format!("Admission {} is {}", admission.id, admission.state),
            ));
        }
        Ok(())
    }

    fn release_time(&self, submitted_at: DateTime<Utc>) -> DateTime<Utc> {
        submitted_at
            .checked_add_signed(self.quarantine_period)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    fn quarantine(&self, admission: &mut PendingAdmission) {
        let release_at = self.release_time(admission.submitted_at);
        admission.state = AdmissionState::Quarantined;
        self.quarantine_index.insert(admission.id, release_at);
        self.stats.quarantined.fetch_add(1, Ordering::Relaxed);
        self.analyzer
            .telemetry()
            .record_admission(AdmissionState::Quarantined, U256::ZERO);

        info!(
            "🔒 Quarantined {} (score {}, {:.4} ETH escrowed) until {}",
            admission.id,
            admission.risk_score_at_submission,
            wei_to_eth(admission.value),
            release_at
        );
    }

    /// Terminal block: refund escrow and credit the sender
    async fn block(&self, admission: &mut PendingAdmission, reason: String) {
        admission.state = AdmissionState::Blocked;
        admission.resolved_at = Some(self.clock.now());
        self.quarantine_index.remove(&admission.id);

        if admission.value > U256::ZERO {
            match self.settlement.refund(admission.sender, admission.value).await {
                Ok(()) => {
                    admission.refunded = true;
                    self.stats.refunds.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => error!("❌ Refund for {} failed: {}", admission.id, e),
            }
        }

        *self.threats_blocked.entry(admission.sender).or_insert(0) += 1;
        self.stats.blocked.fetch_add(1, Ordering::Relaxed);
        let refunded = if admission.refunded {
            admission.value
        } else {
            U256::ZERO
        };
        self.analyzer
            .telemetry()
            .record_admission(AdmissionState::Blocked, refunded);

        info!("⛔ Blocked {}: {}", admission.id, reason);
        admission.resolution = Some(reason);
    }

    /// Terminal execute: invoke the target; a failed call does not change the decision
    async fn execute(&self, admission: &mut PendingAdmission, reason: &str) {
        admission.state = AdmissionState::Executed;
        admission.resolved_at = Some(self.clock.now());
        self.quarantine_index.remove(&admission.id);

        let outcome = match self.settlement.execute(admission).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("❌ Execution of {} failed: {}", admission.id, e);
                CallOutcome::failed(e.to_string())
            }
        };
        if !outcome.success {
            warn!(
                "⚠️ Call for {} failed: {}",
                admission.id,
                outcome.error.as_deref().unwrap_or("unknown")
            );
        }
        admission.call_outcome = Some(outcome);

        self.stats.executed.fetch_add(1, Ordering::Relaxed);
        self.analyzer
            .telemetry()
            .record_admission(AdmissionState::Executed, U256::ZERO);

        info!("✅ Executed {}: {}", admission.id, reason);
        admission.resolution = Some(reason.to_string());
    }
}

/// keccak256(sender ‖ target ‖ data ‖ value ‖ nonce ‖ timestamp)
fn admission_id(tx: &Transaction, nonce: u64, at: DateTime<Utc>) -> AdmissionId {
    let mut preimage = Vec::with_capacity(20 + 20 + tx.data.len() + 32 + 8 + 8);
    preimage.extend_from_slice(tx.from.as_slice());
    preimage.extend_from_slice(tx.to.as_slice());
    preimage.extend_from_slice(&tx.data);
    preimage.extend_from_slice(&tx.value.to_be_bytes::<32>());
    preimage.extend_from_slice(&nonce.to_be_bytes());
    preimage.extend_from_slice(&at.timestamp_millis().to_be_bytes());
    keccak256(&preimage)
}
