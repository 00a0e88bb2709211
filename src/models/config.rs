//! Configuration module for the transaction firewall
//!
//! All tunables come from `utils/constants.rs` defaults and may be overridden
//! through `SHIELD_*` environment variables.

use alloy_primitives::Address;
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

use crate::models::errors::{AppError, AppResult};
use crate::models::signals::SignalSourceKind;
use crate::utils::constants::{
    DEFAULT_AUDIT_TIMEOUT_MS, DEFAULT_CRITICAL_THRESHOLD, DEFAULT_HIGH_THRESHOLD,
    DEFAULT_MAX_BATCH_SIZE, DEFAULT_MEDIUM_THRESHOLD, DEFAULT_PROFILE_TIMEOUT_MS,
    DEFAULT_QUARANTINE_SECS, DEFAULT_REPUTATION_TIMEOUT_MS, DEFAULT_SIMULATION_TIMEOUT_MS,
    DEFAULT_TOTAL_DEADLINE_MS, MAX_RISK_SCORE,
};

/// Score thresholds shared by the scorer (level mapping) and the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RiskThresholds {
    pub critical: u8,
    pub high: u8,
    pub medium: u8,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            critical: DEFAULT_CRITICAL_THRESHOLD,
            high: DEFAULT_HIGH_THRESHOLD,
            medium: DEFAULT_MEDIUM_THRESHOLD,
        }
    }
}

impl RiskThresholds {
    /// medium < high < critical <= 100
    pub fn validate(&self) -> AppResult<()> {
        if !(self.medium < self.high && self.high < self.critical) {
            return Err(AppError::invalid_config(format!(
                "thresholds must satisfy medium < high < critical (got {}/{}/{})",
                self.medium, self.high, self.critical
            )));
        }
        if u32::from(self.critical) > MAX_RISK_SCORE {
            return Err(AppError::invalid_config(format!(
                "critical threshold {} exceeds {}",
                self.critical, MAX_RISK_SCORE
            )));
        }
        Ok(())
    }
}

/// Deadlines applied by the signal collector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectorConfig {
    pub source_timeouts: HashMap<SignalSourceKind, Duration>,
    pub total_deadline: Duration,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        let source_timeouts = HashMap::from([
            (
                SignalSourceKind::Simulation,
                Duration::from_millis(DEFAULT_SIMULATION_TIMEOUT_MS),
            ),
            (
                SignalSourceKind::Reputation,
                Duration::from_millis(DEFAULT_REPUTATION_TIMEOUT_MS),
            ),
            (
                SignalSourceKind::ContractProfile,
                Duration::from_millis(DEFAULT_PROFILE_TIMEOUT_MS),
            ),
            (
                SignalSourceKind::CodeAudit,
                Duration::from_millis(DEFAULT_AUDIT_TIMEOUT_MS),
            ),
        ]);
        Self {
            source_timeouts,
            total_deadline: Duration::from_millis(DEFAULT_TOTAL_DEADLINE_MS),
        }
    }
}

impl CollectorConfig {
    /// Sub-deadline for a source; sources missing from the table get the total deadline
    pub fn timeout_for(&self, kind: SignalSourceKind) -> Duration {
        self.source_timeouts
            .get(&kind)
            .copied()
            .unwrap_or(self.total_deadline)
    }

    pub fn with_timeout(mut self, kind: SignalSourceKind, timeout: Duration) -> Self {
        self.source_timeouts.insert(kind, timeout);
        self
    }

    pub fn with_total_deadline(mut self, deadline: Duration) -> Self {
        self.total_deadline = deadline;
        self
    }
}

/// Top-level configuration
#[derive(Debug, Clone)]
pub struct FirewallConfig {
    pub thresholds: RiskThresholds,
    pub quarantine_period: Duration,
    pub max_batch_size: usize,
    pub collector: CollectorConfig,
    /// Addresses allowed to force-block quarantined admissions
    pub operators: HashSet<Address>,
}

impl Default for FirewallConfig {
    fn default() -> Self {
        Self {
            thresholds: RiskThresholds::default(),
            quarantine_period: Duration::from_secs(DEFAULT_QUARANTINE_SECS),
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            collector: CollectorConfig::default(),
            operators: HashSet::new(),
        }
    }
}

impl FirewallConfig {
    /// Defaults overridden by SHIELD_* environment variables
    pub fn from_env() -> AppResult<Self> {
        let defaults = Self::default();

        let thresholds = RiskThresholds {
            critical: env_or("SHIELD_CRITICAL_THRESHOLD", defaults.thresholds.critical),
            high: env_or("SHIELD_HIGH_THRESHOLD", defaults.thresholds.high),
            medium: env_or("SHIELD_MEDIUM_THRESHOLD", defaults.thresholds.medium),
        };

        let mut collector = CollectorConfig::default();
        for (kind, var) in [
            (SignalSourceKind::Simulation, "SHIELD_SIM_TIMEOUT_MS"),
            (SignalSourceKind::Reputation, "SHIELD_REPUTATION_TIMEOUT_MS"),
            (SignalSourceKind::ContractProfile, "SHIELD_PROFILE_TIMEOUT_MS"),
            (SignalSourceKind::CodeAudit, "SHIELD_AUDIT_TIMEOUT_MS"),
        ] {
            let default_ms = collector.timeout_for(kind).as_millis() as u64;
            collector
                .source_timeouts
                .insert(kind, Duration::from_millis(env_or(var, default_ms)));
        }
        collector.total_deadline = Duration::from_millis(env_or(
            "SHIELD_TOTAL_DEADLINE_MS",
            DEFAULT_TOTAL_DEADLINE_MS,
        ));

        let config = Self {
            thresholds,
            quarantine_period: Duration::from_secs(env_or(
                "SHIELD_QUARANTINE_SECS",
                DEFAULT_QUARANTINE_SECS,
            )),
            max_batch_size: env_or("SHIELD_MAX_BATCH", DEFAULT_MAX_BATCH_SIZE),
            collector,
            operators: parse_address_list(&std::env::var("SHIELD_OPERATORS").unwrap_or_default()),
        };

        config.validate()?;
        info!(
            "⚙️  Thresholds: critical={} high={} medium={} | quarantine={}s | batch cap={} | operators={}",
            config.thresholds.critical,
            config.thresholds.high,
            config.thresholds.medium,
            config.quarantine_period.as_secs(),
            config.max_batch_size,
            config.operators.len()
        );
        Ok(config)
    }

    pub fn validate(&self) -> AppResult<()> {
        self.thresholds.validate()?;
        if self.max_batch_size == 0 {
            return Err(AppError::invalid_config("max batch size must be at least 1"));
        }
        if self.collector.total_deadline.is_zero() {
            return Err(AppError::invalid_config("total deadline must be positive"));
        }
        Ok(())
    }

    pub fn with_operator(mut self, operator: Address) -> Self {
        self.operators.insert(operator);
        self
    }

    pub fn with_quarantine_period(mut self, period: Duration) -> Self {
        self.quarantine_period = period;
        self
    }

    pub fn is_operator(&self, address: &Address) -> bool {
        self.operators.contains(address)
    }
}

/// Read and parse an env var, falling back to `default` when unset or unparseable
fn env_or<T>(var: &str, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Display,
{
    match std::env::var(var) {
        Ok(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                warn!("⚠️ {}='{}' is not valid, using default {}", var, raw, default);
                default
            }
        },
        Err(_) => default,
    }
}

/// Comma-separated addresses; invalid entries are skipped with a warning
pub fn parse_address_list(raw: &str) -> HashSet<Address> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| match Address::from_str(s) {
            Ok(addr) => Some(addr),
            Err(_) => {
                warn!("⚠️ Ignoring invalid address '{}'", s);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FirewallConfig::default();
        assert_eq!(config.thresholds.critical, 90);
        assert_eq!(config.thresholds.high, 75);
        assert_eq!(config.thresholds.medium, 50);
        assert_eq!(config.quarantine_period, Duration::from_secs(86_400));
        assert_eq!(config.max_batch_size, 10);
        assert_eq!(
            config.collector.timeout_for(SignalSourceKind::Simulation),
            Duration::from_secs(10)
        );
        assert_eq!(
            config.collector.timeout_for(SignalSourceKind::CodeAudit),
            Duration::from_secs(15)
        );
        assert_eq!(config.collector.total_deadline, Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_threshold_validation() {
        let bad = RiskThresholds {
            critical: 70,
            high: 75,
            medium: 50,
        };
        assert!(bad.validate().is_err());

        let too_high = RiskThresholds {
            critical: 120,
            high: 75,
            medium: 50,
        };
        assert!(too_high.validate().is_err());
    }

    #[test]
    fn test_zero_batch_rejected() {
        let config = FirewallConfig {
            max_batch_size: 0,
            ..FirewallConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_timeout_falls_back_to_total() {
        let mut collector = CollectorConfig::default();
        collector.source_timeouts.remove(&SignalSourceKind::Reputation);
        assert_eq!(
            collector.timeout_for(SignalSourceKind::Reputation),
            collector.total_deadline
        );
    }

    #[test]
    fn test_parse_address_list() {
        let list = parse_address_list(
            "0x1111111111111111111111111111111111111111, nonsense ,,0x2222222222222222222222222222222222222222",
        );
        assert_eq!(list.len(), 2);
        assert!(list.contains(&Address::repeat_byte(0x11)));
    }
}
