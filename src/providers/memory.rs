//! In-memory signal sources
//!
//! Concurrent registries backing the reputation, profile and audit signals.
//! Writes are visible to the next lookup, which is what lets an operator
//! blacklist a target while a transaction to it sits in quarantine.

use alloy_primitives::{Address, Bytes};
use async_trait::async_trait;
use dashmap::DashMap;
use tracing::info;

use crate::core::sources::{CodeAuditor, ContractProfiler, ReputationLookup};
use crate::models::errors::AppResult;
use crate::models::signals::{AuditReport, ContractProfile, ListingCategory, ReputationReport};
use crate::models::types::RiskLevel;

// ============================================
// REPUTATION
// ============================================

/// Operator-maintained blacklist
#[derive(Debug, Default)]
pub struct ReputationRegistry {
    listed: DashMap<Address, ReputationReport>,
}

impl ReputationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from a list of addresses, all listed as Critical scams
    pub fn with_blacklist(addresses: impl IntoIterator<Item = Address>) -> Self {
        let registry = Self::new();
        for address in addresses {
            registry.blacklist(address, RiskLevel::Critical);
        }
        registry
    }

    pub fn blacklist(&self, address: Address, level: RiskLevel) {
        self.list(address, level, ListingCategory::Scam);
    }

    pub fn list(&self, address: Address, level: RiskLevel, category: ListingCategory) {
        info!("🚫 Listed {} ({:?}, {})", address, category, level);
        self.listed.insert(
            address,
            ReputationReport {
                is_listed: true,
                listed_risk_level: Some(level),
                category: Some(category),
            },
        );
    }

    /// Returns true if the address was listed
    pub fn remove(&self, address: &Address) -> bool {
        let removed = self.listed.remove(address).is_some();
        if removed {
            info!("✅ Delisted {}", address);
        }
        removed
    }

    pub fn is_listed(&self, address: &Address) -> bool {
        self.listed.contains_key(address)
    }

    pub fn len(&self) -> usize {
        self.listed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listed.is_empty()
    }
}

#[async_trait]
impl ReputationLookup for ReputationRegistry {
    async fn lookup_reputation(&self, address: Address) -> AppResult<ReputationReport> {
        Ok(self
            .listed
            .get(&address)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }
}

// ============================================
// CONTRACT PROFILES
// ============================================

/// Known contract metadata; unknown addresses profile as plain accounts
#[derive(Debug, Default)]
pub struct ProfileRegistry {
    profiles: DashMap<Address, ContractProfile>,
}

impl ProfileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, address: Address, profile: ContractProfile) {
        self.profiles.insert(address, profile);
    }
}

#[async_trait]
impl ContractProfiler for ProfileRegistry {
    async fn profile_contract(&self, address: Address) -> AppResult<ContractProfile> {
        Ok(self
            .profiles
            .get(&address)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }
}

// ============================================
// AUDIT
// ============================================

/// Precomputed audit reports keyed by contract address
#[derive(Debug, Default)]
pub struct StaticAuditor {
    reports: DashMap<Address, AuditReport>,
}

impl StaticAuditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, address: Address, report: AuditReport) {
        self.reports.insert(address, report);
    }
}

#[async_trait]
impl CodeAuditor for StaticAuditor {
    async fn audit_code(&self, address: Address, _call_data: &Bytes) -> AppResult<AuditReport> {
        Ok(self
            .reports
            .get(&address)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }
}
