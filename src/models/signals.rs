//! Signal data model
//!
//! One typed value per signal source, wrapped in [`Signal`] so a failed or
//! timed-out source is still represented by exactly one entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::errors::ErrorCode;
use crate::models::types::RiskLevel;
use crate::utils::constants::MINIMAL_TX_GAS;

/// The four independent signal sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalSourceKind {
    Simulation,
    Reputation,
    ContractProfile,
    CodeAudit,
}

impl SignalSourceKind {
    pub const ALL: [SignalSourceKind; 4] = [
        Self::Simulation,
        Self::Reputation,
        Self::ContractProfile,
        Self::CodeAudit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simulation => "simulation",
            Self::Reputation => "reputation",
            Self::ContractProfile => "contract_profile",
            Self::CodeAudit => "code_audit",
        }
    }
}

impl fmt::Display for SignalSourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a source contributed its default instead of a value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DefaultReason {
    /// Source returned an error
    Failed(String),
    /// Source exceeded its own sub-deadline
    TimedOut,
    /// Source was still running when the overall deadline elapsed
    DeadlineExceeded,
    /// Source returned data that fails validation
    Malformed(String),
    /// Source does not apply to this transaction
    Skipped,
}

impl DefaultReason {
    /// Error code for reasons caused by the source's own output
    pub fn error_code(&self) -> Option<ErrorCode> {
        match self {
            Self::Failed(_) => Some(ErrorCode::SourceFailed),
            Self::Malformed(_) => Some(ErrorCode::SignalMalformed),
            _ => None,
        }
    }
}

impl fmt::Display for DefaultReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed(msg) => write!(f, "failed: {}", msg),
            Self::TimedOut => f.write_str("timed out"),
            Self::DeadlineExceeded => f.write_str("overall deadline exceeded"),
            Self::Malformed(msg) => write!(f, "malformed: {}", msg),
            Self::Skipped => f.write_str("skipped"),
        }
    }
}

/// A collected signal: the source's value, or a marker that its default applies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Signal<T> {
    Present(T),
    Defaulted(DefaultReason),
}

impl<T: Clone + Default> Signal<T> {
    /// Value to score with. Defaulted signals resolve to the conservative default.
    pub fn resolve(&self) -> T {
        match self {
            Self::Present(value) => value.clone(),
            Self::Defaulted(_) => T::default(),
        }
    }
}

impl<T> Signal<T> {
    pub fn is_defaulted(&self) -> bool {
        matches!(self, Self::Defaulted(_))
    }

    pub fn default_reason(&self) -> Option<&DefaultReason> {
        match self {
            Self::Present(_) => None,
            Self::Defaulted(reason) => Some(reason),
        }
    }
}

/// Validation applied to every value a source returns
pub trait SignalPayload {
    /// Err(message) marks the value malformed
    fn validate(&self, gas_limit: u64) -> Result<(), String>;
}

// ============================================
// SIGNAL VALUES
// ============================================

/// Simulate(transaction)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationOutcome {
    pub success: bool,
    pub gas_used: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revert_reason: Option<String>,
}

/// Default: succeeds with minimal gas
impl Default for SimulationOutcome {
    fn default() -> Self {
        Self {
            success: true,
            gas_used: MINIMAL_TX_GAS,
            revert_reason: None,
        }
    }
}

impl SignalPayload for SimulationOutcome {
    fn validate(&self, gas_limit: u64) -> Result<(), String> {
        if self.gas_used > gas_limit {
            return Err(format!(
                "gas used {} exceeds gas limit {}",
                self.gas_used, gas_limit
            ));
        }
        Ok(())
    }
}

/// Why an address is listed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListingCategory {
    Scam,
    Phishing,
}

/// LookupReputation(address). Default: not listed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReputationReport {
    pub is_listed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listed_risk_level: Option<RiskLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<ListingCategory>,
}

impl ReputationReport {
    pub fn listed(level: RiskLevel) -> Self {
        Self {
            is_listed: true,
            listed_risk_level: Some(level),
            category: Some(ListingCategory::Scam),
        }
    }
}

impl SignalPayload for ReputationReport {
    fn validate(&self, _gas_limit: u64) -> Result<(), String> {
        Ok(())
    }
}

/// ProfileContract(address). Default: not a contract, so never "new".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractProfile {
    pub is_contract: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    pub verified: bool,
}

impl ContractProfile {
    /// Unverified contract younger than `max_age_days` at `now`
    pub fn is_new_unverified(&self, now: DateTime<Utc>, max_age_days: i64) -> bool {
        if !self.is_contract || self.verified {
            return false;
        }
        match self.created_at {
            Some(created) => now.signed_duration_since(created) < chrono::Duration::days(max_age_days),
            None => false,
        }
    }
}

impl SignalPayload for ContractProfile {
    fn validate(&self, _gas_limit: u64) -> Result<(), String> {
        if !self.is_contract && self.created_at.is_some() {
            return Err("creation time reported for a non-contract account".to_string());
        }
        Ok(())
    }
}

/// AuditCode(address, callData). Default: zero risk, zero confidence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditReport {
    /// 0-100
    pub risk_score: u8,
    pub risk_factors: Vec<String>,
    /// 0.0-1.0
    pub confidence: f64,
}

impl SignalPayload for AuditReport {
    fn validate(&self, _gas_limit: u64) -> Result<(), String> {
        if self.risk_score > 100 {
            return Err(format!("risk score {} above 100", self.risk_score));
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(format!("confidence {} outside [0, 1]", self.confidence));
        }
        Ok(())
    }
}

// ============================================
// SIGNAL SET
// ============================================

/// Complete, defaulted signal set for one transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalSet {
    pub simulation: Signal<SimulationOutcome>,
    pub reputation: Signal<ReputationReport>,
    pub profile: Signal<ContractProfile>,
    pub audit: Signal<AuditReport>,
    /// Reference time for age arithmetic
    pub collected_at: DateTime<Utc>,
}

impl SignalSet {
    /// Every source defaulted for the same reason
    pub fn all_defaulted(reason: DefaultReason, collected_at: DateTime<Utc>) -> Self {
        Self {
            simulation: Signal::Defaulted(reason.clone()),
            reputation: Signal::Defaulted(reason.clone()),
            profile: Signal::Defaulted(reason.clone()),
            audit: Signal::Defaulted(reason),
            collected_at,
        }
    }

    /// Sources that were queried but fell back to their default
    pub fn defaulted_sources(&self) -> Vec<SignalSourceKind> {
        self.sources_where(|reason| *reason != DefaultReason::Skipped)
    }

    /// Sources not applicable to this transaction
    pub fn skipped_sources(&self) -> Vec<SignalSourceKind> {
        self.sources_where(|reason| *reason == DefaultReason::Skipped)
    }

    /// Every queried source defaulted
    pub fn is_fully_defaulted(&self) -> bool {
        let defaulted = self.defaulted_sources().len();
        defaulted > 0 && defaulted + self.skipped_sources().len() == SignalSourceKind::ALL.len()
    }

    fn sources_where(&self, pred: impl Fn(&DefaultReason) -> bool) -> Vec<SignalSourceKind> {
        [
            (SignalSourceKind::Simulation, self.simulation.default_reason()),
            (SignalSourceKind::Reputation, self.reputation.default_reason()),
            (SignalSourceKind::ContractProfile, self.profile.default_reason()),
            (SignalSourceKind::CodeAudit, self.audit.default_reason()),
        ]
        .into_iter()
        .filter(|(_, reason)| reason.is_some_and(&pred))
        .map(|(kind, _)| kind)
        .collect()
    }

    /// Current blacklist status as observed during this collection
    pub fn target_listed(&self) -> bool {
        self.reputation.resolve().is_listed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_conservative_literals() {
        let sim = Signal::<SimulationOutcome>::Defaulted(DefaultReason::TimedOut).resolve();
        assert!(sim.success);
        assert_eq!(sim.gas_used, MINIMAL_TX_GAS);

        let rep = Signal::<ReputationReport>::Defaulted(DefaultReason::Skipped).resolve();
        assert!(!rep.is_listed);

        let audit = Signal::<AuditReport>::Defaulted(DefaultReason::Skipped).resolve();
        assert_eq!(audit.risk_score, 0);
        assert_eq!(audit.confidence, 0.0);
    }

    #[test]
    fn test_new_unverified_contract() {
        let now = Utc::now();
        let young = ContractProfile {
            is_contract: true,
            created_at: Some(now - chrono::Duration::days(2)),
            verified: false,
        };
        assert!(young.is_new_unverified(now, 7));

        let verified = ContractProfile {
            verified: true,
            ..young.clone()
        };
        assert!(!verified.is_new_unverified(now, 7));

        let old = ContractProfile {
            created_at: Some(now - chrono::Duration::days(30)),
            ..young
        };
        assert!(!old.is_new_unverified(now, 7));
    }

    #[test]
    fn test_malformed_payloads() {
        let audit = AuditReport {
            risk_score: 150,
            risk_factors: vec![],
            confidence: 0.5,
        };
        assert!(audit.validate(0).is_err());

        let audit = AuditReport {
            risk_score: 10,
            risk_factors: vec![],
            confidence: 1.5,
        };
        assert!(audit.validate(0).is_err());

        let sim = SimulationOutcome {
            success: true,
            gas_used: 50_000,
            revert_reason: None,
        };
        assert!(sim.validate(21_000).is_err());
        assert!(sim.validate(60_000).is_ok());
    }

    #[test]
    fn test_defaulted_sources() {
        let set = SignalSet::all_defaulted(DefaultReason::TimedOut, Utc::now());
        assert!(set.is_fully_defaulted());
        assert!(!set.target_listed());
    }

    #[test]
    fn test_skipped_source_is_not_unavailable() {
        let mut set = SignalSet::all_defaulted(DefaultReason::TimedOut, Utc::now());
        set.audit = Signal::Defaulted(DefaultReason::Skipped);

        assert_eq!(set.defaulted_sources().len(), 3);
        assert_eq!(set.skipped_sources(), vec![SignalSourceKind::CodeAudit]);
        assert!(set.is_fully_defaulted());

        set.simulation = Signal::Present(SimulationOutcome::default());
        set.reputation = Signal::Present(ReputationReport::default());
        set.profile = Signal::Present(ContractProfile::default());
        assert!(set.defaulted_sources().is_empty());
        assert!(!set.is_fully_defaulted());
    }

    #[test]
    fn test_default_reason_error_codes() {
        assert_eq!(
            DefaultReason::Malformed("gas".into()).error_code(),
            Some(ErrorCode::SignalMalformed)
        );
        assert_eq!(
            DefaultReason::Failed("rpc".into()).error_code(),
            Some(ErrorCode::SourceFailed)
        );
        assert_eq!(DefaultReason::TimedOut.error_code(), None);
        assert_eq!(
            ErrorCode::SignalMalformed.as_str(),
            "SIGNAL_MALFORMED"
        );
    }
}
