//! Approval decoder module
//! Parses ERC20 / ERC721 approval calldata to detect unlimited approvals

use alloy_primitives::{Address, U256};
use alloy_sol_types::{sol, SolCall};

use crate::utils::constants::{
    SELECTOR_APPROVE, SELECTOR_LEN, SELECTOR_SET_APPROVAL_FOR_ALL, SENSITIVE_SELECTORS,
};

sol! {
    function approve(address spender, uint256 amount) external returns (bool);

    function setApprovalForAll(address operator, bool approved) external;
}

/// Decoded approval granted by a transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalGrant {
    /// ERC20 approve
    Allowance { spender: Address, amount: U256 },
    /// ERC721/ERC1155 setApprovalForAll
    Operator { operator: Address, approved: bool },
}

impl ApprovalGrant {
    /// Unlimited: max-uint allowance or a blanket operator approval
    pub fn is_unlimited(&self) -> bool {
        match self {
            Self::Allowance { amount, .. } => *amount == U256::MAX,
            Self::Operator { approved, .. } => *approved,
        }
    }

    pub fn grantee(&self) -> Address {
        match self {
            Self::Allowance { spender, .. } => *spender,
            Self::Operator { operator, .. } => *operator,
        }
    }
}

/// Decoder for approval transactions
pub struct ApprovalDecoder;

impl ApprovalDecoder {
    /// First four bytes of the call data, if present
    pub fn selector(calldata: &[u8]) -> Option<[u8; 4]> {
        calldata
            .get(..SELECTOR_LEN)
            .and_then(|s| <[u8; 4]>::try_from(s).ok())
    }

    /// Decode an approval from calldata
    /// Returns None if not a recognized approval function
    pub fn decode(calldata: &[u8]) -> Option<ApprovalGrant> {
        match Self::selector(calldata)? {
            SELECTOR_APPROVE => {
                let call = approveCall::abi_decode(calldata, false).ok()?;
                Some(ApprovalGrant::Allowance {
                    spender: call.spender,
                    amount: call.amount,
                })
            }
            SELECTOR_SET_APPROVAL_FOR_ALL => {
                let call = setApprovalForAllCall::abi_decode(calldata, false).ok()?;
                Some(ApprovalGrant::Operator {
                    operator: call.operator,
                    approved: call.approved,
                })
            }
            _ => None,
        }
    }

    /// Returns the grant only when it is unlimited
    pub fn unlimited_approval(calldata: &[u8]) -> Option<ApprovalGrant> {
        Self::decode(calldata).filter(ApprovalGrant::is_unlimited)
    }

    /// Calldata invokes transfer / approve / setApprovalForAll
    pub fn is_sensitive_call(calldata: &[u8]) -> bool {
        Self::selector(calldata)
            .map(|s| SENSITIVE_SELECTORS.contains(&s))
            .unwrap_or(false)
    }

    /// Encode an ERC20 approve call
    pub fn encode_approve(spender: Address, amount: U256) -> Vec<u8> {
        approveCall { spender, amount }.abi_encode()
    }

    /// Encode a setApprovalForAll call
    pub fn encode_set_approval_for_all(operator: Address, approved: bool) -> Vec<u8> {
        setApprovalForAllCall { operator, approved }.abi_encode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spender() -> Address {
        Address::repeat_byte(0x11)
    }

    #[test]
    fn test_selectors_match_abi() {
        assert_eq!(approveCall::SELECTOR, SELECTOR_APPROVE);
        assert_eq!(setApprovalForAllCall::SELECTOR, SELECTOR_SET_APPROVAL_FOR_ALL);
    }

    #[test]
    fn test_max_uint_approve_is_unlimited() {
        let data = ApprovalDecoder::encode_approve(spender(), U256::MAX);
        let grant = ApprovalDecoder::unlimited_approval(&data).expect("unlimited");
        assert_eq!(grant.grantee(), spender());
    }

    #[test]
    fn test_bounded_approve_is_not_unlimited() {
        let data = ApprovalDecoder::encode_approve(spender(), U256::MAX - U256::from(1));
        assert!(ApprovalDecoder::decode(&data).is_some());
        assert!(ApprovalDecoder::unlimited_approval(&data).is_none());
    }

    #[test]
    fn test_set_approval_for_all() {
        let on = ApprovalDecoder::encode_set_approval_for_all(spender(), true);
        let off = ApprovalDecoder::encode_set_approval_for_all(spender(), false);
        assert!(ApprovalDecoder::unlimited_approval(&on).is_some());
        assert!(ApprovalDecoder::unlimited_approval(&off).is_none());
    }

    #[test]
    fn test_short_and_unknown_calldata() {
        assert!(ApprovalDecoder::decode(&[]).is_none());
        assert!(ApprovalDecoder::decode(&[0x09, 0x5e, 0xa7]).is_none());
        // approve selector with truncated arguments
        assert!(ApprovalDecoder::decode(&SELECTOR_APPROVE).is_none());
        assert!(ApprovalDecoder::decode(&[0xde, 0xad, 0xbe, 0xef, 0x00]).is_none());
    }

    #[test]
    fn test_sensitive_selectors() {
        let mut transfer = SENSITIVE_SELECTORS[0].to_vec();
        transfer.extend_from_slice(&[0u8; 64]);
        assert!(ApprovalDecoder::is_sensitive_call(&transfer));
        assert!(!ApprovalDecoder::is_sensitive_call(&[0xde, 0xad, 0xbe, 0xef]));
        assert!(!ApprovalDecoder::is_sensitive_call(&[]));
    }
}
