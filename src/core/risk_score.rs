//! Risk Scoring Module
//!
//! Additive 0-100 scoring over a complete signal set. Every term is evaluated
//! independently, summed, and clamped once at the end. Warnings are collected
//! per condition and emitted in a fixed priority order regardless of which
//! term produced them first.

use tracing::debug;

use crate::models::config::RiskThresholds;
use crate::models::signals::{ListingCategory, SignalSet};
use crate::models::types::{
    Recommendation, RiskAssessment, RiskLevel, ScoreFactor, Transaction, Warning, WarningKind,
};
use crate::utils::constants::*;
use crate::utils::decoder::{ApprovalDecoder, ApprovalGrant};

/// Position of a warning in the emitted list
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum WarningSlot {
    Scam,
    Honeypot,
    UnlimitedApproval,
    SuspiciousCode,
    NewContract,
}

/// Accumulates score terms and warnings for one transaction
struct AssessmentBuilder {
    factors: Vec<ScoreFactor>,
    warnings: Vec<(WarningSlot, Warning)>,
}

impl AssessmentBuilder {
    fn new() -> Self {
        Self {
            factors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn add(&mut self, name: &str, points: u32, reason: String) {
        if points == 0 {
            return;
        }
        debug!(term = name, points, "score term");
        self.factors.push(ScoreFactor {
            name: name.to_string(),
            points,
            reason,
        });
    }

    fn warn(&mut self, slot: WarningSlot, warning: Warning) {
        self.warnings.push((slot, warning));
    }

    /// Raw sum before clamping
    fn total(&self) -> u32 {
        self.factors.iter().map(|f| f.points).sum()
    }

    fn into_parts(mut self) -> (Vec<ScoreFactor>, Vec<Warning>) {
        self.warnings.sort_by_key(|(slot, _)| *slot);
        let warnings = self.warnings.into_iter().map(|(_, w)| w).collect();
        (self.factors, warnings)
    }
}

/// Pure scorer: same transaction and signals always give the same assessment
#[derive(Debug, Clone, Default)]
pub struct RiskScorer {
    thresholds: RiskThresholds,
}

impl RiskScorer {
    pub fn new(thresholds: RiskThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &RiskThresholds {
        &self.thresholds
    }

    /// Score a transaction against its collected signals. Never fails.
    pub fn score(&self, tx: &Transaction, signals: &SignalSet) -> RiskAssessment {
        let mut builder = AssessmentBuilder::new();

        self.reputation_term(&mut builder, signals);
        self.audit_terms(&mut builder, signals);
        self.approval_term(&mut builder, tx);
        self.contract_age_term(&mut builder, signals);
        self.simulation_term(&mut builder, signals);
        self.gas_term(&mut builder, tx, signals);
        self.transaction_term(&mut builder, tx);

        let raw = builder.total();
        let score = raw.min(MAX_RISK_SCORE) as u8;
        let (breakdown, warnings) = builder.into_parts();

        let level = self.level_for(score);
        let recommendation = self.recommendation_for(score, &warnings);
        let defaulted_sources = signals.defaulted_sources();
        let explanation = explain(score, level, recommendation, &warnings, defaulted_sources.len());

        debug!(raw, score, level = %level, recommendation = %recommendation, "assessment built");

        RiskAssessment {
            score,
            level,
            warnings,
            recommendation,
            explanation,
            breakdown,
            defaulted_sources,
            skipped_sources: signals.skipped_sources(),
        }
    }

    /// Map a capped score to its level
    pub fn level_for(&self, score: u8) -> RiskLevel {
        if score >= self.thresholds.critical {
            RiskLevel::Critical
        } else if score >= self.thresholds.high {
            RiskLevel::High
        } else if score >= self.thresholds.medium {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    fn recommendation_for(&self, score: u8, warnings: &[Warning]) -> Recommendation {
        let critical_warning = warnings.iter().any(|w| w.severity == RiskLevel::Critical);
        if critical_warning || score >= self.thresholds.critical {
            Recommendation::Block
        } else if score >= self.thresholds.medium {
            Recommendation::Caution
        } else {
            Recommendation::Proceed
        }
    }

    // ============================================
    // TERMS
    // ============================================

    fn reputation_term(&self, builder: &mut AssessmentBuilder, signals: &SignalSet) {
        let report = signals.reputation.resolve();
        if !report.is_listed {
            return;
        }

        builder.add(
            "known_scam",
            SCORE_KNOWN_SCAM,
            "Target address is on the scam list".to_string(),
        );

        let kind = match report.category {
            Some(ListingCategory::Phishing) => WarningKind::Phishing,
            _ => WarningKind::ScamAddress,
        };
        let severity = report.listed_risk_level.unwrap_or(RiskLevel::Critical);
        builder.warn(
            WarningSlot::Scam,
            Warning {
                kind,
                severity,
                message: "Recipient is a known scam address".to_string(),
                details: format!(
                    "Reputation source lists this address ({} risk). Funds sent here are unlikely to be recovered.",
                    severity
                ),
            },
        );
    }

    fn audit_terms(&self, builder: &mut AssessmentBuilder, signals: &SignalSet) {
        let audit = signals.audit.resolve();

        if !audit.risk_factors.is_empty() {
            builder.add(
                "audit_findings",
                SCORE_AUDIT_FINDINGS,
                format!("{} risk factor(s) reported", audit.risk_factors.len()),
            );

            let severity = if audit.risk_score >= AUDIT_CRITICAL_RISK {
                RiskLevel::Critical
            } else if audit.risk_score >= AUDIT_HIGH_RISK {
                RiskLevel::High
            } else {
                RiskLevel::Medium
            };
            builder.warn(
                WarningSlot::SuspiciousCode,
                Warning {
                    kind: WarningKind::SuspiciousCode,
                    severity,
                    message: "Contract code shows suspicious patterns".to_string(),
                    details: format!(
                        "Audit confidence {:.0}%: {}",
                        audit.confidence * 100.0,
                        audit.risk_factors.join("; ")
                    ),
                },
            );
        }

        builder.add(
            "audit_risk",
            u32::from(audit.risk_score),
            format!("Audit risk sub-score {}", audit.risk_score),
        );
    }

    fn approval_term(&self, builder: &mut AssessmentBuilder, tx: &Transaction) {
        let Some(grant) = ApprovalDecoder::unlimited_approval(&tx.data) else {
            return;
        };

        let (reason, details) = match &grant {
            ApprovalGrant::Allowance { spender, .. } => (
                "approve() with max uint256 allowance".to_string(),
                format!("Spender {} could move the entire token balance at any time.", spender),
            ),
            ApprovalGrant::Operator { operator, .. } => (
                "setApprovalForAll(true)".to_string(),
                format!("Operator {} could transfer every token in the collection.", operator),
            ),
        };

        builder.add("unlimited_approval", SCORE_UNLIMITED_APPROVAL, reason);
        builder.warn(
            WarningSlot::UnlimitedApproval,
            Warning {
                kind: WarningKind::UnlimitedApproval,
                severity: RiskLevel::High,
                message: "Transaction grants an unlimited approval".to_string(),
                details,
            },
        );
    }

    fn contract_age_term(&self, builder: &mut AssessmentBuilder, signals: &SignalSet) {
        let profile = signals.profile.resolve();
        if !profile.is_new_unverified(signals.collected_at, NEW_CONTRACT_AGE_DAYS) {
            return;
        }

        let age_days = profile
            .created_at
            .map(|created| signals.collected_at.signed_duration_since(created).num_days())
            .unwrap_or_default();

        builder.add(
            "new_contract",
            SCORE_NEW_CONTRACT,
            format!("Unverified contract deployed {} day(s) ago", age_days),
        );
        builder.warn(
            WarningSlot::NewContract,
            Warning {
                kind: WarningKind::RugPull,
                severity: RiskLevel::Medium,
                message: "Target is a newly deployed, unverified contract".to_string(),
                details: format!(
                    "Deployed {} day(s) ago without verified source. New contracts carry elevated rug-pull risk.",
                    age_days
                ),
            },
        );
    }

    fn simulation_term(&self, builder: &mut AssessmentBuilder, signals: &SignalSet) {
        let outcome = signals.simulation.resolve();
        if outcome.success {
            return;
        }

        let revert = outcome
            .revert_reason
            .unwrap_or_else(|| "no reason given".to_string());
        builder.add(
            "simulation_failed",
            SCORE_SIMULATION_FAILED,
            format!("Simulation reverted: {}", revert),
        );
        builder.warn(
            WarningSlot::Honeypot,
            Warning {
                kind: WarningKind::Honeypot,
                severity: RiskLevel::High,
                message: "Transaction fails in simulation".to_string(),
                details: format!(
                    "Dry run reverted ({}). Funds may be trapped or the call may always fail.",
                    revert
                ),
            },
        );
    }

    fn gas_term(&self, builder: &mut AssessmentBuilder, tx: &Transaction, signals: &SignalSet) {
        let gas_used = signals.simulation.resolve().gas_used;

        if gas_used > GAS_VERY_HIGH {
            builder.add(
                "gas_very_high",
                SCORE_GAS_VERY_HIGH,
                format!("{} gas used (> {})", gas_used, GAS_VERY_HIGH),
            );
        } else if gas_used > GAS_HIGH {
            builder.add(
                "gas_high",
                SCORE_GAS_HIGH,
                format!("{} gas used (> {})", gas_used, GAS_HIGH),
            );
        } else if tx.data.len() > NON_TRIVIAL_CALLDATA_LEN && gas_used < GAS_SUSPICIOUSLY_LOW {
            builder.add(
                "gas_suspiciously_low",
                SCORE_GAS_SUSPICIOUSLY_LOW,
                format!(
                    "{} bytes of call data but only {} gas used",
                    tx.data.len(),
                    gas_used
                ),
            );
        }
    }

    fn transaction_term(&self, builder: &mut AssessmentBuilder, tx: &Transaction) {
        if tx.value > eth_to_wei(VALUE_VERY_LARGE_ETH) {
            builder.add(
                "value_very_large",
                SCORE_VALUE_VERY_LARGE,
                format!("{:.2} ETH transferred", wei_to_eth(tx.value)),
            );
        } else if tx.value > eth_to_wei(VALUE_LARGE_ETH) {
            builder.add(
                "value_large",
                SCORE_VALUE_LARGE,
                format!("{:.2} ETH transferred", wei_to_eth(tx.value)),
            );
        }

        if tx.data.len() > LARGE_CALLDATA_LEN {
            builder.add(
                "large_calldata",
                SCORE_LARGE_CALLDATA,
                format!("{} bytes of call data", tx.data.len()),
            );
        }

        if ApprovalDecoder::is_sensitive_call(&tx.data) {
            builder.add(
                "sensitive_selector",
                SCORE_SENSITIVE_SELECTOR,
                "Calls transfer / approve / setApprovalForAll".to_string(),
            );
        }
    }
}

/// Human-readable summary, distinct from the numeric score
fn explain(
    score: u8,
    level: RiskLevel,
    recommendation: Recommendation,
    warnings: &[Warning],
    defaulted: usize,
) -> String {
    let action = match recommendation {
        Recommendation::Proceed => "No significant risk indicators found.",
        Recommendation::Caution => "Review the warnings before signing.",
        Recommendation::Block => "DO NOT PROCEED. High likelihood of loss.",
    };

    let mut text = format!("{} {} risk ({}/100). {}", level.emoji(), level, score, action);

    if let Some(top) = warnings.first() {
        text.push_str(&format!(" Main concern: {}.", top.message));
        if warnings.len() > 1 {
            text.push_str(&format!(" {} more warning(s).", warnings.len() - 1));
        }
    }

    if defaulted > 0 {
        text.push_str(&format!(
            " {} of 4 signal sources were unavailable; assessment is less informed.",
            defaulted
        ));
    }

    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::signals::{
        AuditReport, ContractProfile, DefaultReason, ReputationReport, Signal, SignalSourceKind,
        SimulationOutcome,
    };
    use alloy_primitives::{Address, U256};
    use chrono::Utc;

    fn clean_signals() -> SignalSet {
        SignalSet {
            simulation: Signal::Present(SimulationOutcome::default()),
            reputation: Signal::Present(ReputationReport::default()),
            profile: Signal::Present(ContractProfile::default()),
            audit: Signal::Defaulted(DefaultReason::Skipped),
            collected_at: Utc::now(),
        }
    }

    fn transfer_tx(eth: u64) -> Transaction {
        Transaction::new(Address::repeat_byte(0x01), Address::repeat_byte(0x02))
            .with_value(eth_to_wei(eth))
    }

    fn approve_max_tx() -> Transaction {
        Transaction::new(Address::repeat_byte(0x01), Address::repeat_byte(0x02))
            .with_data(ApprovalDecoder::encode_approve(Address::repeat_byte(0x33), U256::MAX))
            .with_gas_limit(100_000)
    }

    #[test]
    fn test_plain_transfer_is_safe() {
        let assessment = RiskScorer::default().score(&transfer_tx(1), &clean_signals());

        assert_eq!(assessment.score, 0);
        assert_eq!(assessment.level, RiskLevel::Low);
        assert_eq!(assessment.recommendation, Recommendation::Proceed);
        assert!(assessment.warnings.is_empty());
        assert!(assessment.defaulted_sources.is_empty());
        assert_eq!(assessment.skipped_sources, vec![SignalSourceKind::CodeAudit]);
        assert!(!assessment.explanation.contains("unavailable"));
    }

    #[test]
    fn test_listed_large_transfer_blocks() {
        let tx = Transaction::new(Address::repeat_byte(0x01), Address::ZERO)
            .with_value(eth_to_wei(100));
        let mut signals = clean_signals();
        signals.reputation = Signal::Present(ReputationReport::listed(RiskLevel::Critical));

        let assessment = RiskScorer::default().score(&tx, &signals);

        assert!(assessment.score >= 90);
        assert_eq!(assessment.level, RiskLevel::Critical);
        assert_eq!(assessment.recommendation, Recommendation::Block);
        assert!(assessment.has_warning(WarningKind::ScamAddress));
    }

    #[test]
    fn test_unlimited_approval_flagged() {
        let assessment = RiskScorer::default().score(&approve_max_tx(), &clean_signals());

        assert!(assessment.has_warning(WarningKind::UnlimitedApproval));
        // 40 approval + 5 selector + 15 low gas for non-trivial data
        assert_eq!(assessment.score, 60);
        assert!(assessment.recommendation >= Recommendation::Caution);
    }

    #[test]
    fn test_limited_approval_not_flagged() {
        let tx = Transaction::new(Address::repeat_byte(0x01), Address::repeat_byte(0x02))
            .with_data(ApprovalDecoder::encode_approve(
                Address::repeat_byte(0x33),
                U256::from(1_000u64),
            ));
        let assessment = RiskScorer::default().score(&tx, &clean_signals());
        assert!(!assessment.has_warning(WarningKind::UnlimitedApproval));
    }

    #[test]
    fn test_set_approval_for_all() {
        let granted = Transaction::new(Address::repeat_byte(0x01), Address::repeat_byte(0x02))
            .with_data(ApprovalDecoder::encode_set_approval_for_all(
                Address::repeat_byte(0x44),
                true,
            ));
        let revoked = granted.clone().with_data(
            ApprovalDecoder::encode_set_approval_for_all(Address::repeat_byte(0x44), false),
        );

        let scorer = RiskScorer::default();
        assert!(scorer
            .score(&granted, &clean_signals())
            .has_warning(WarningKind::UnlimitedApproval));
        assert!(!scorer
            .score(&revoked, &clean_signals())
            .has_warning(WarningKind::UnlimitedApproval));
    }

    #[test]
    fn test_warning_order_is_fixed() {
        let mut signals = clean_signals();
        signals.reputation = Signal::Present(ReputationReport::listed(RiskLevel::High));
        signals.simulation = Signal::Present(SimulationOutcome {
            success: false,
            gas_used: 40_000,
            revert_reason: None,
        });
        signals.audit = Signal::Present(AuditReport {
            risk_score: 10,
            risk_factors: vec!["hidden mint".to_string()],
            confidence: 0.7,
        });

        let assessment = RiskScorer::default().score(&approve_max_tx(), &signals);
        let kinds: Vec<_> = assessment.warnings.iter().map(|w| w.kind).collect();

        assert_eq!(
            kinds,
            vec![
                WarningKind::ScamAddress,
                WarningKind::Honeypot,
                WarningKind::UnlimitedApproval,
                WarningKind::SuspiciousCode,
            ]
        );
        assert_eq!(assessment.score, 100);
    }

    #[test]
    fn test_all_defaulted_equals_baseline() {
        let tx = transfer_tx(50);
        let signals = SignalSet::all_defaulted(DefaultReason::DeadlineExceeded, Utc::now());

        let assessment = RiskScorer::default().score(&tx, &signals);

        assert_eq!(assessment.score, 10);
        assert!(assessment.warnings.is_empty());
        assert_eq!(assessment.defaulted_sources.len(), 4);
        assert!(assessment.explanation.contains("4 of 4"));
    }

    #[test]
    fn test_new_unverified_contract_warning() {
        let mut signals = clean_signals();
        signals.profile = Signal::Present(ContractProfile {
            is_contract: true,
            created_at: Some(signals.collected_at - chrono::Duration::days(1)),
            verified: false,
        });

        let assessment = RiskScorer::default().score(&transfer_tx(1), &signals);

        assert_eq!(assessment.score, 30);
        assert_eq!(assessment.warnings.len(), 1);
        assert_eq!(assessment.warnings[0].kind, WarningKind::RugPull);
        assert_eq!(assessment.warnings[0].severity, RiskLevel::Medium);
    }

    #[test]
    fn test_audit_severity_and_critical_block() {
        let mut signals = clean_signals();
        signals.audit = Signal::Present(AuditReport {
            risk_score: 85,
            risk_factors: vec!["selfdestruct reachable".to_string()],
            confidence: 0.9,
        });

        let assessment = RiskScorer::default().score(&transfer_tx(1), &signals);

        // 60 findings + 85 raw, clamped once
        assert_eq!(assessment.score, 100);
        assert_eq!(assessment.warnings[0].severity, RiskLevel::Critical);
        assert_eq!(assessment.recommendation, Recommendation::Block);
    }

    #[test]
    fn test_critical_warning_blocks_below_threshold() {
        let mut signals = clean_signals();
        signals.reputation = Signal::Present(ReputationReport::listed(RiskLevel::Critical));
        let scorer = RiskScorer::new(RiskThresholds {
            critical: 95,
            high: 80,
            medium: 60,
        });

        let assessment = scorer.score(&transfer_tx(1), &signals);
        assert_eq!(assessment.score, 90);
        assert_eq!(assessment.level, RiskLevel::High);
        assert_eq!(assessment.recommendation, Recommendation::Block);
    }

    #[test]
    fn test_gas_terms() {
        let scorer = RiskScorer::default();
        let tx = transfer_tx(0).with_gas_limit(1_000_000);

        let mut signals = clean_signals();
        signals.simulation = Signal::Present(SimulationOutcome {
            success: true,
            gas_used: 600_000,
            revert_reason: None,
        });
        assert_eq!(scorer.score(&tx, &signals).score, 20);

        signals.simulation = Signal::Present(SimulationOutcome {
            success: true,
            gas_used: 250_000,
            revert_reason: None,
        });
        assert_eq!(scorer.score(&tx, &signals).score, 10);
    }

    #[test]
    fn test_transaction_terms() {
        let scorer = RiskScorer::default();
        let signals = clean_signals();

        assert_eq!(scorer.score(&transfer_tx(10), &signals).score, 0);
        assert_eq!(scorer.score(&transfer_tx(11), &signals).score, 10);
        assert_eq!(scorer.score(&transfer_tx(101), &signals).score, 20);

        let big = transfer_tx(0).with_data(vec![0u8; 1001]);
        // large data + low gas for non-trivial data
        assert_eq!(scorer.score(&big, &signals).score, 30);
    }

    #[test]
    fn test_score_bounds_and_block_at_critical() {
        let scorer = RiskScorer::default();
        for score in 0..=100u8 {
            let level = scorer.level_for(score);
            if score >= 90 {
                assert_eq!(level, RiskLevel::Critical);
                assert_eq!(scorer.recommendation_for(score, &[]), Recommendation::Block);
            }
        }
        assert_eq!(scorer.level_for(74), RiskLevel::Medium);
        assert_eq!(scorer.level_for(75), RiskLevel::High);
        assert_eq!(scorer.level_for(49), RiskLevel::Low);
    }

    #[test]
    fn test_scoring_is_deterministic() {
        let scorer = RiskScorer::default();
        let signals = clean_signals();
        let tx = approve_max_tx();
        assert_eq!(scorer.score(&tx, &signals), scorer.score(&tx, &signals));
    }
}
