//! Constants Module - Single Source of Truth
//!
//! Selectors, wei scale, scoring weights and default limits used across the
//! pipeline. Nothing else in the crate hardcodes these values.

use alloy_primitives::U256;

// ============================================
// APPLICATION CONSTANTS
// ============================================

/// Application name
pub const APP_NAME: &str = "RusterShield";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================
// UNITS
// ============================================

/// 1 ETH in wei
pub const WEI_PER_ETH: u128 = 1_000_000_000_000_000_000;

/// Convert whole ETH to wei
pub fn eth_to_wei(eth: u64) -> U256 {
    U256::from(eth) * U256::from(WEI_PER_ETH)
}

/// Convert wei to ETH (lossy, display only)
pub fn wei_to_eth(wei: U256) -> f64 {
    let wei_u128: u128 = wei.try_into().unwrap_or(u128::MAX);
    wei_u128 as f64 / 1e18
}

// ============================================
// FUNCTION SELECTORS
// ============================================

/// ERC20 transfer(address,uint256)
pub const SELECTOR_TRANSFER: [u8; 4] = [0xa9, 0x05, 0x9c, 0xbb];

/// ERC20 approve(address,uint256)
pub const SELECTOR_APPROVE: [u8; 4] = [0x09, 0x5e, 0xa7, 0xb3];

/// ERC721/ERC1155 setApprovalForAll(address,bool)
pub const SELECTOR_SET_APPROVAL_FOR_ALL: [u8; 4] = [0xa2, 0x2c, 0xb4, 0x65];

/// Selectors that move or delegate control over assets
pub const SENSITIVE_SELECTORS: [[u8; 4]; 3] = [
    SELECTOR_TRANSFER,
    SELECTOR_APPROVE,
    SELECTOR_SET_APPROVAL_FOR_ALL,
];

/// Length of an ABI function selector
pub const SELECTOR_LEN: usize = 4;

// ============================================
// SCORING WEIGHTS
// ============================================

pub const SCORE_KNOWN_SCAM: u32 = 90;
pub const SCORE_AUDIT_FINDINGS: u32 = 60;
pub const SCORE_UNLIMITED_APPROVAL: u32 = 40;
pub const SCORE_NEW_CONTRACT: u32 = 30;
pub const SCORE_SIMULATION_FAILED: u32 = 50;

pub const SCORE_GAS_VERY_HIGH: u32 = 20;
pub const SCORE_GAS_HIGH: u32 = 10;
pub const SCORE_GAS_SUSPICIOUSLY_LOW: u32 = 15;

pub const SCORE_VALUE_VERY_LARGE: u32 = 20;
pub const SCORE_VALUE_LARGE: u32 = 10;
pub const SCORE_LARGE_CALLDATA: u32 = 15;
pub const SCORE_SENSITIVE_SELECTOR: u32 = 5;

/// Final score cap
pub const MAX_RISK_SCORE: u32 = 100;

// ============================================
// SCORING LIMITS
// ============================================

pub const GAS_VERY_HIGH: u64 = 500_000;
pub const GAS_HIGH: u64 = 200_000;
pub const GAS_SUSPICIOUSLY_LOW: u64 = 50_000;

/// Call data longer than this is "non-trivial" for the low-gas pattern
pub const NON_TRIVIAL_CALLDATA_LEN: usize = 10;

/// Call data longer than this is flagged as large
pub const LARGE_CALLDATA_LEN: usize = 1000;

pub const VALUE_VERY_LARGE_ETH: u64 = 100;
pub const VALUE_LARGE_ETH: u64 = 10;

/// Contracts younger than this are "new"
pub const NEW_CONTRACT_AGE_DAYS: i64 = 7;

/// Audit risk at or above this makes a SuspiciousCode warning Critical
pub const AUDIT_CRITICAL_RISK: u8 = 80;

/// Audit risk at or above this makes a SuspiciousCode warning High
pub const AUDIT_HIGH_RISK: u8 = 50;

// ============================================
// DEFAULTS
// ============================================

pub const DEFAULT_CRITICAL_THRESHOLD: u8 = 90;
pub const DEFAULT_HIGH_THRESHOLD: u8 = 75;
pub const DEFAULT_MEDIUM_THRESHOLD: u8 = 50;

/// 24 hours
pub const DEFAULT_QUARANTINE_SECS: u64 = 24 * 60 * 60;

pub const DEFAULT_MAX_BATCH_SIZE: usize = 10;

pub const DEFAULT_SIMULATION_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_REPUTATION_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_PROFILE_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_AUDIT_TIMEOUT_MS: u64 = 15_000;
pub const DEFAULT_TOTAL_DEADLINE_MS: u64 = 30_000;

/// Gas reported by the defaulted simulation ("succeeds, minimal gas")
pub const MINIMAL_TX_GAS: u64 = 21_000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wei_conversions() {
        assert_eq!(eth_to_wei(1), U256::from(WEI_PER_ETH));
        assert!((wei_to_eth(eth_to_wei(10)) - 10.0).abs() < 0.0001);
    }

    #[test]
    fn test_thresholds_are_ordered() {
        assert!(DEFAULT_MEDIUM_THRESHOLD < DEFAULT_HIGH_THRESHOLD);
        assert!(DEFAULT_HIGH_THRESHOLD < DEFAULT_CRITICAL_THRESHOLD);
        assert!(u32::from(DEFAULT_CRITICAL_THRESHOLD) <= MAX_RISK_SCORE);
    }
}
