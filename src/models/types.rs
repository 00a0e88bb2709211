//! Type definitions for the transaction firewall
//! Core data structures shared by the analysis pipeline and admission controller

use alloy_primitives::{Address, Bytes, B256, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::models::errors::{AppError, AppResult};
use crate::models::signals::SignalSourceKind;

// ============================================
// TRANSACTION
// ============================================

/// Immutable transaction under assessment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub from: Address,
    pub to: Address,
    /// Value in wei
    pub value: U256,
    pub data: Bytes,
    pub gas_limit: u64,
    /// Gas price in wei
    pub gas_price: u128,
    pub nonce: u64,
    pub chain_id: u64,
}

impl Transaction {
    /// Plain transfer with zero value and mainnet defaults
    pub fn new(from: Address, to: Address) -> Self {
        Self {
            from,
            to,
            value: U256::ZERO,
            data: Bytes::new(),
            gas_limit: 21_000,
            gas_price: 20_000_000_000,
            nonce: 0,
            chain_id: 1,
        }
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    pub fn with_data(mut self, data: impl Into<Bytes>) -> Self {
        self.data = data.into();
        self
    }

    pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = gas_limit;
        self
    }

    pub fn with_nonce(mut self, nonce: u64) -> Self {
        self.nonce = nonce;
        self
    }

    /// Call data carries at least a function selector
    pub fn is_contract_call(&self) -> bool {
        self.data.len() >= crate::utils::constants::SELECTOR_LEN
    }
}

/// Transaction as received from a transport (all numeric fields as strings)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub from: String,
    pub to: String,
    /// Wei, decimal or 0x-hex
    #[serde(default)]
    pub value: String,
    /// 0x-prefixed hex call data
    #[serde(default)]
    pub data: String,
    #[serde(default)]
    pub gas_limit: String,
    #[serde(default)]
    pub gas_price: String,
    #[serde(default)]
    pub nonce: u64,
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
}

fn default_chain_id() -> u64 {
    1
}

impl TryFrom<TransactionRequest> for Transaction {
    type Error = AppError;

    fn try_from(req: TransactionRequest) -> AppResult<Self> {
        let from = parse_address("from", &req.from)?;
        let to = parse_address("to", &req.to)?;
        let value = parse_u256("value", &req.value)?;
        let data = parse_call_data(&req.data)?;
        let gas_limit = parse_integer::<u64>("gas_limit", &req.gas_limit, 21_000)?;
        let gas_price = parse_integer::<u128>("gas_price", &req.gas_price, 0)?;

        Ok(Self {
            from,
            to,
            value,
            data,
            gas_limit,
            gas_price,
            nonce: req.nonce,
            chain_id: req.chain_id,
        })
    }
}

fn parse_address(field: &str, raw: &str) -> AppResult<Address> {
    let raw = raw.trim();
    if raw.len() != 42 || !raw.starts_with("0x") {
        return Err(AppError::invalid_address(format!(
            "{} must be a 0x-prefixed 20-byte address",
            field
        )));
    }
    Address::from_str(raw)
        .map_err(|e| AppError::invalid_address(format!("{}: {}", field, e)))
}

fn parse_u256(field: &str, raw: &str) -> AppResult<U256> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(U256::ZERO);
    }
    if raw.starts_with('-') {
        return Err(AppError::invalid_amount(format!("{} cannot be negative", field)));
    }
    U256::from_str(raw)
        .map_err(|e| AppError::invalid_amount(format!("{} '{}': {}", field, raw, e)))
}

fn parse_integer<T>(field: &str, raw: &str, default: T) -> AppResult<T>
where
    T: TryFrom<U256>,
{
    if raw.trim().is_empty() {
        return Ok(default);
    }
    let wide = parse_u256(field, raw)?;
    T::try_from(wide).map_err(|_| AppError::invalid_amount(format!("{} is out of range", field)))
}

fn parse_call_data(raw: &str) -> AppResult<Bytes> {
    let raw = raw.trim();
    let hex_str = raw.strip_prefix("0x").unwrap_or(raw);
    hex::decode(hex_str)
        .map(Bytes::from)
        .map_err(|e| AppError::invalid_call_data(format!("data: {}", e)))
}

// ============================================
// RISK CLASSIFICATION
// ============================================

/// Risk level classification (also used as warning severity)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

/// Warning severity shares the risk level scale
pub type Severity = RiskLevel;

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            RiskLevel::Low => "✅",
            RiskLevel::Medium => "🟠",
            RiskLevel::High => "🔴",
            RiskLevel::Critical => "💀",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse action derived from an assessment
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Recommendation {
    Proceed,
    Caution,
    Block,
}

impl Recommendation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Proceed => "PROCEED",
            Self::Caution => "CAUTION",
            Self::Block => "BLOCK",
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Warning categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WarningKind {
    ScamAddress,
    Honeypot,
    RugPull,
    Phishing,
    SuspiciousCode,
    UnlimitedApproval,
}

impl WarningKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ScamAddress => "scam_address",
            Self::Honeypot => "honeypot",
            Self::RugPull => "rug_pull",
            Self::Phishing => "phishing",
            Self::SuspiciousCode => "suspicious_code",
            Self::UnlimitedApproval => "unlimited_approval",
        }
    }
}

/// A single human-readable finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    pub kind: WarningKind,
    pub severity: Severity,
    pub message: String,
    pub details: String,
}

/// Individual factor contributing to the score
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreFactor {
    pub name: String,
    pub points: u32,
    pub reason: String,
}

/// Result of scoring one transaction. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// 0-100 after capping
    pub score: u8,
    pub level: RiskLevel,
    /// Fixed priority order
    pub warnings: Vec<Warning>,
    pub recommendation: Recommendation,
    pub explanation: String,
    /// Non-zero terms in evaluation order
    pub breakdown: Vec<ScoreFactor>,
    /// Sources that were queried but contributed only their default
    pub defaulted_sources: Vec<SignalSourceKind>,
    /// Sources that do not apply to this transaction
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped_sources: Vec<SignalSourceKind>,
}

impl RiskAssessment {
    /// Substitute used when a batch item fails outright
    pub fn failsafe(reason: impl Into<String>) -> Self {
        Self {
            score: 50,
            level: RiskLevel::Medium,
            warnings: Vec::new(),
            recommendation: Recommendation::Caution,
            explanation: format!(
                "🟠 Analysis unavailable ({}). Review manually before proceeding.",
                reason.into()
            ),
            breakdown: Vec::new(),
            defaulted_sources: SignalSourceKind::ALL.to_vec(),
            skipped_sources: Vec::new(),
        }
    }

    pub fn has_warning(&self, kind: WarningKind) -> bool {
        self.warnings.iter().any(|w| w.kind == kind)
    }
}

// ============================================
// ADMISSION
// ============================================

/// Content-derived admission identifier
pub type AdmissionId = B256;

/// Admission lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdmissionState {
    /// Transient, never stored
    Submitted,
    Quarantined,
    Executed,
    Blocked,
}

impl AdmissionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Executed | Self::Blocked)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "SUBMITTED",
            Self::Quarantined => "QUARANTINED",
            Self::Executed => "EXECUTED",
            Self::Blocked => "BLOCKED",
        }
    }
}

impl fmt::Display for AdmissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of invoking the target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CallOutcome {
    pub fn succeeded() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Admission record owned by the controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAdmission {
    pub id: AdmissionId,
    pub sender: Address,
    pub target: Address,
    pub payload: Bytes,
    pub value: U256,
    pub submitted_at: DateTime<Utc>,
    pub state: AdmissionState,
    pub risk_score_at_submission: u8,
    /// Controller nonce mixed into the id
    pub nonce: u64,
    /// Full transaction, re-analyzed at release
    pub transaction: Transaction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_outcome: Option<CallOutcome>,
    pub refunded: bool,
}

impl PendingAdmission {
    /// Value currently held by the controller
    pub fn escrowed_value(&self) -> U256 {
        if self.state == AdmissionState::Quarantined {
            self.value
        } else {
            U256::ZERO
        }
    }
}

/// Returned by SubmitForAdmission
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionReceipt {
    pub admission_id: AdmissionId,
    pub initial_state: AdmissionState,
    pub assessment: RiskAssessment,
}

/// Parallel arrays of calls from one sender, paid for by a single attached value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSubmission {
    pub sender: Address,
    pub targets: Vec<Address>,
    pub payloads: Vec<Bytes>,
    pub values: Vec<U256>,
    /// Must equal the sum of `values`
    pub attached_value: U256,
    /// Applied to every item
    pub gas_limit: u64,
    /// Nonce of the first item; later items increment from it
    pub nonce: u64,
}

impl BatchSubmission {
    /// Item transactions. Callers must check lengths first.
    pub fn transactions(&self) -> Vec<Transaction> {
        self.targets
            .iter()
            .zip(&self.payloads)
            .zip(&self.values)
            .enumerate()
            .map(|(i, ((target, payload), value))| {
                Transaction::new(self.sender, *target)
                    .with_data(payload.clone())
                    .with_value(*value)
                    .with_gas_limit(self.gas_limit)
                    .with_nonce(self.nonce.saturating_add(i as u64))
            })
            .collect()
    }
}

/// Transport form of [`BatchSubmission`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchSubmissionRequest {
    pub sender: String,
    pub targets: Vec<String>,
    #[serde(default)]
    pub payloads: Vec<String>,
    #[serde(default)]
    pub values: Vec<String>,
    #[serde(default)]
    pub attached_value: String,
    #[serde(default)]
    pub gas_limit: String,
    #[serde(default)]
    pub nonce: u64,
}

impl TryFrom<BatchSubmissionRequest> for BatchSubmission {
    type Error = AppError;

    fn try_from(req: BatchSubmissionRequest) -> AppResult<Self> {
        Ok(Self {
            sender: parse_address("sender", &req.sender)?,
            targets: req
                .targets
                .iter()
                .map(|t| parse_address("targets", t))
                .collect::<AppResult<_>>()?,
            payloads: req
                .payloads
                .iter()
                .map(|p| parse_call_data(p))
                .collect::<AppResult<_>>()?,
            values: req
                .values
                .iter()
                .map(|v| parse_u256("values", v))
                .collect::<AppResult<_>>()?,
            attached_value: parse_u256("attached_value", &req.attached_value)?,
            gas_limit: parse_integer::<u64>("gas_limit", &req.gas_limit, 21_000)?,
            nonce: req.nonce,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> TransactionRequest {
        TransactionRequest {
            from: "0x1111111111111111111111111111111111111111".to_string(),
            to: "0x2222222222222222222222222222222222222222".to_string(),
            value: "1000000000000000000".to_string(),
            data: "0x".to_string(),
            gas_limit: "21000".to_string(),
            gas_price: "0x4a817c800".to_string(),
            nonce: 7,
            chain_id: 1,
        }
    }

    #[test]
    fn test_request_conversion() {
        let tx = Transaction::try_from(request()).unwrap();
        assert_eq!(tx.from, Address::repeat_byte(0x11));
        assert_eq!(tx.value, U256::from(1_000_000_000_000_000_000u128));
        assert_eq!(tx.gas_price, 20_000_000_000);
        assert!(tx.data.is_empty());
        assert_eq!(tx.nonce, 7);
    }

    #[test]
    fn test_malformed_address_rejected() {
        let mut req = request();
        req.to = "0x1234".to_string();
        let err = Transaction::try_from(req).unwrap_err();
        assert_eq!(err.code, crate::models::errors::ErrorCode::InvalidAddress);
    }

    #[test]
    fn test_negative_and_fractional_amounts_rejected() {
        let mut req = request();
        req.value = "-1".to_string();
        assert_eq!(
            Transaction::try_from(req).unwrap_err().code,
            crate::models::errors::ErrorCode::InvalidAmount
        );

        let mut req = request();
        req.value = "1.5".to_string();
        assert!(Transaction::try_from(req).is_err());

        let mut req = request();
        req.gas_limit = "-21000".to_string();
        assert!(Transaction::try_from(req).is_err());
    }

    #[test]
    fn test_bad_hex_rejected() {
        let mut req = request();
        req.data = "0xzz".to_string();
        assert_eq!(
            Transaction::try_from(req).unwrap_err().code,
            crate::models::errors::ErrorCode::InvalidCallData
        );
    }

    #[test]
    fn test_risk_level_ordering() {
        assert!(RiskLevel::Low < RiskLevel::Medium);
        assert!(RiskLevel::Medium < RiskLevel::High);
        assert!(RiskLevel::High < RiskLevel::Critical);
    }

    #[test]
    fn test_failsafe_assessment() {
        let a = RiskAssessment::failsafe("worker panicked");
        assert_eq!(a.level, RiskLevel::Medium);
        assert_eq!(a.recommendation, Recommendation::Caution);
        assert!(a.explanation.contains("worker panicked"));
    }
}
