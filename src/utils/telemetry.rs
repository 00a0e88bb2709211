//! Telemetry Module
//!
//! Anonymous counters for the firewall: analyses, threats by type and
//! admission outcomes. No addresses or transaction contents are stored.

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use crate::models::signals::SignalSourceKind;
use crate::models::types::{AdmissionState, RiskAssessment, WarningKind};
use crate::utils::constants::wei_to_eth;

/// Telemetry threat / outcome categories
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ThreatType {
    ScamAddress,
    Honeypot,
    RugPull,
    Phishing,
    SuspiciousCode,
    UnlimitedApproval,
    /// Admission blocked at submission, release or by an operator
    Blocked,
    /// Admission placed in quarantine
    Quarantined,
}

impl ThreatType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThreatType::ScamAddress => "scam_address",
            ThreatType::Honeypot => "honeypot",
            ThreatType::RugPull => "rug_pull",
            ThreatType::Phishing => "phishing",
            ThreatType::SuspiciousCode => "suspicious_code",
            ThreatType::UnlimitedApproval => "unlimited_approval",
            ThreatType::Blocked => "blocked",
            ThreatType::Quarantined => "quarantined",
        }
    }
}

impl From<WarningKind> for ThreatType {
    fn from(kind: WarningKind) -> Self {
        match kind {
            WarningKind::ScamAddress => ThreatType::ScamAddress,
            WarningKind::Honeypot => ThreatType::Honeypot,
            WarningKind::RugPull => ThreatType::RugPull,
            WarningKind::Phishing => ThreatType::Phishing,
            WarningKind::SuspiciousCode => ThreatType::SuspiciousCode,
            WarningKind::UnlimitedApproval => ThreatType::UnlimitedApproval,
        }
    }
}

/// Aggregated statistics for reporting
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TelemetryStats {
    pub total_analyzed: u64,
    /// Analyses that produced at least one warning
    pub total_threats: u64,
    pub threats_by_type: HashMap<String, u64>,
    /// Analyses where every signal source was defaulted
    pub fully_defaulted: u64,
    pub admissions_executed: u64,
    pub admissions_quarantined: u64,
    pub admissions_blocked: u64,
    /// Value refunded from blocked admissions (ETH)
    pub total_value_protected_eth: f64,
    pub avg_latency_ms: f64,
    pub period_start: i64,
    pub period_end: i64,
}

impl TelemetryStats {
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

/// Main telemetry collector
pub struct TelemetryCollector {
    total_analyzed: AtomicU64,
    total_threats: AtomicU64,
    fully_defaulted: AtomicU64,
    total_latency_ms: AtomicU64,
    admissions_executed: AtomicU64,
    admissions_quarantined: AtomicU64,
    admissions_blocked: AtomicU64,
    value_protected_wei: RwLock<U256>,
    threat_counts: RwLock<HashMap<ThreatType, u64>>,
    session_start: i64,
}

impl TelemetryCollector {
    pub fn new() -> Self {
        Self {
            total_analyzed: AtomicU64::new(0),
            total_threats: AtomicU64::new(0),
            fully_defaulted: AtomicU64::new(0),
            total_latency_ms: AtomicU64::new(0),
            admissions_executed: AtomicU64::new(0),
            admissions_quarantined: AtomicU64::new(0),
            admissions_blocked: AtomicU64::new(0),
            value_protected_wei: RwLock::new(U256::ZERO),
            threat_counts: RwLock::new(HashMap::new()),
            session_start: chrono::Utc::now().timestamp(),
        }
    }

    /// Record one completed analysis and every warning it raised
    pub fn record_analysis(&self, assessment: &RiskAssessment, latency_ms: u64) {
        self.total_analyzed.fetch_add(1, Ordering::Relaxed);
        self.total_latency_ms.fetch_add(latency_ms, Ordering::Relaxed);

        let defaulted = assessment.defaulted_sources.len();
        if defaulted > 0
            && defaulted + assessment.skipped_sources.len() == SignalSourceKind::ALL.len()
        {
            self.fully_defaulted.fetch_add(1, Ordering::Relaxed);
        }

        if !assessment.warnings.is_empty() {
            self.total_threats.fetch_add(1, Ordering::Relaxed);
            for warning in &assessment.warnings {
                self.record_threat(warning.kind.into());
            }
        }
    }

    /// Bump the counter for one threat type
    pub fn record_threat(&self, threat: ThreatType) {
        if let Ok(mut counts) = self.threat_counts.write() {
            *counts.entry(threat).or_insert(0) += 1;
        }
    }

    /// Record an admission reaching `state`; `refunded` is the value returned on a block
    pub fn record_admission(&self, state: AdmissionState, refunded: U256) {
        match state {
            AdmissionState::Executed => {
                self.admissions_executed.fetch_add(1, Ordering::Relaxed);
            }
            AdmissionState::Quarantined => {
                self.admissions_quarantined.fetch_add(1, Ordering::Relaxed);
                self.record_threat(ThreatType::Quarantined);
            }
            AdmissionState::Blocked => {
                self.admissions_blocked.fetch_add(1, Ordering::Relaxed);
                self.record_threat(ThreatType::Blocked);
                if let Ok(mut value) = self.value_protected_wei.write() {
                    *value = value.saturating_add(refunded);
                }
            }
            AdmissionState::Submitted => {}
        }
    }

    pub fn get_stats(&self) -> TelemetryStats {
        let total_analyzed = self.total_analyzed.load(Ordering::Relaxed);
        let total_latency = self.total_latency_ms.load(Ordering::Relaxed);

        let avg_latency = if total_analyzed > 0 {
            total_latency as f64 / total_analyzed as f64
        } else {
            0.0
        };

        let value_protected = self
            .value_protected_wei
            .read()
            .map(|v| wei_to_eth(*v))
            .unwrap_or(0.0);

        let threats_by_type = self
            .threat_counts
            .read()
            .map(|counts| {
                counts
                    .iter()
                    .map(|(k, v)| (k.as_str().to_string(), *v))
                    .collect()
            })
            .unwrap_or_default();

        TelemetryStats {
            total_analyzed,
            total_threats: self.total_threats.load(Ordering::Relaxed),
            threats_by_type,
            fully_defaulted: self.fully_defaulted.load(Ordering::Relaxed),
            admissions_executed: self.admissions_executed.load(Ordering::Relaxed),
            admissions_quarantined: self.admissions_quarantined.load(Ordering::Relaxed),
            admissions_blocked: self.admissions_blocked.load(Ordering::Relaxed),
            total_value_protected_eth: value_protected,
            avg_latency_ms: avg_latency,
            period_start: self.session_start,
            period_end: chrono::Utc::now().timestamp(),
        }
    }

    /// Write current stats to `<dir>/stats_<unix>.json`
    pub fn export_stats_json(&self, dir: &Path) -> Result<PathBuf, std::io::Error> {
        fs::create_dir_all(dir)?;
        let stats = self.get_stats();
        let path = dir.join(format!("stats_{}.json", stats.period_end));

        let json = serde_json::to_string_pretty(&stats)?;
        fs::write(&path, json)?;

        Ok(path)
    }
}

impl Default for TelemetryCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::types::{Recommendation, RiskLevel, Warning};
    use crate::utils::constants::eth_to_wei;

    fn assessment_with(kinds: &[WarningKind]) -> RiskAssessment {
        RiskAssessment {
            score: 60,
            level: RiskLevel::Medium,
            warnings: kinds
                .iter()
                .map(|kind| Warning {
                    kind: *kind,
                    severity: RiskLevel::High,
                    message: "test".to_string(),
                    details: String::new(),
                })
                .collect(),
            recommendation: Recommendation::Caution,
            explanation: String::new(),
            breakdown: Vec::new(),
            defaulted_sources: Vec::new(),
            skipped_sources: Vec::new(),
        }
    }

    #[test]
    fn test_collector_basic() {
        let collector = TelemetryCollector::new();

        collector.record_analysis(&assessment_with(&[]), 10);
        collector.record_analysis(
            &assessment_with(&[WarningKind::ScamAddress, WarningKind::UnlimitedApproval]),
            20,
        );

        let stats = collector.get_stats();
        assert_eq!(stats.total_analyzed, 2);
        assert_eq!(stats.total_threats, 1);
        assert_eq!(stats.threats_by_type.get("scam_address"), Some(&1));
        assert_eq!(stats.threats_by_type.get("unlimited_approval"), Some(&1));
        assert_eq!(stats.avg_latency_ms, 15.0);
    }

    #[test]
    fn test_fully_defaulted_ignores_skipped_sources() {
        let collector = TelemetryCollector::new();

        let mut transfer = assessment_with(&[]);
        transfer.skipped_sources = vec![SignalSourceKind::CodeAudit];
        collector.record_analysis(&transfer, 1);
        assert_eq!(collector.get_stats().fully_defaulted, 0);

        transfer.defaulted_sources = vec![
            SignalSourceKind::Simulation,
            SignalSourceKind::Reputation,
            SignalSourceKind::ContractProfile,
        ];
        collector.record_analysis(&transfer, 1);
        assert_eq!(collector.get_stats().fully_defaulted, 1);
    }

    #[test]
    fn test_admission_outcomes() {
        let collector = TelemetryCollector::new();
        collector.record_admission(AdmissionState::Quarantined, U256::ZERO);
        collector.record_admission(AdmissionState::Blocked, eth_to_wei(2));
        collector.record_admission(AdmissionState::Executed, U256::ZERO);

        let stats = collector.get_stats();
        assert_eq!(stats.admissions_quarantined, 1);
        assert_eq!(stats.admissions_blocked, 1);
        assert_eq!(stats.admissions_executed, 1);
        assert_eq!(stats.total_value_protected_eth, 2.0);
        assert_eq!(stats.threats_by_type.get("blocked"), Some(&1));
    }

    #[test]
    fn test_export_json() {
        let collector = TelemetryCollector::new();
        collector.record_analysis(&assessment_with(&[WarningKind::Honeypot]), 5);

        let dir = std::env::temp_dir().join(format!("ruster_shield_telemetry_{}", std::process::id()));
        let path = collector.export_stats_json(&dir).expect("export");
        let content = std::fs::read_to_string(&path).expect("read back");
        assert!(content.contains("\"total_analyzed\": 1"));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
