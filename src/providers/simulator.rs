//! REVM-based transaction simulator
//! Dry-runs a transaction in an in-memory EVM before it reaches the chain

use alloy_primitives::{keccak256, Address, Bytes, U256};
use async_trait::async_trait;
use dashmap::DashMap;
use revm::{
    db::{CacheDB, EmptyDB},
    primitives::{
        AccountInfo, BlockEnv, Bytecode, CfgEnv, CfgEnvWithHandlerCfg, EnvWithHandlerCfg,
        ExecutionResult, SpecId, TxEnv, TxKind,
    },
    Evm,
};
use std::sync::Arc;
use tracing::debug;

use crate::core::sources::Simulator;
use crate::models::errors::{AppError, AppResult};
use crate::models::signals::SimulationOutcome;
use crate::models::types::Transaction;
use crate::utils::constants::eth_to_wei;

/// Balance given to the sender on top of value and gas cost
const SIMULATION_HEADROOM_ETH: u64 = 100;

/// Simulator backed by a fresh in-memory EVM per call.
/// Contract code can be registered so calls to it execute real bytecode.
#[derive(Default)]
pub struct RevmSimulator {
    code: Arc<DashMap<Address, Bytes>>,
}

impl RevmSimulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deploy runtime bytecode at `address` for subsequent simulations
    pub fn register_code(&self, address: Address, runtime: impl Into<Bytes>) {
        self.code.insert(address, runtime.into());
    }

    /// Execute synchronously. Callers on the runtime should use [`Simulator::simulate`].
    pub fn simulate_blocking(
        tx: &Transaction,
        code: &DashMap<Address, Bytes>,
    ) -> AppResult<SimulationOutcome> {
        let mut db = CacheDB::new(EmptyDB::default());

        let gas_cost = U256::from(tx.gas_limit).saturating_mul(U256::from(tx.gas_price));
        let balance = tx
            .value
            .saturating_add(gas_cost)
            .saturating_add(eth_to_wei(SIMULATION_HEADROOM_ETH));
        db.insert_account_info(
            tx.from,
            AccountInfo {
                balance,
                nonce: tx.nonce,
                ..Default::default()
            },
        );

        if let Some(runtime) = code.get(&tx.to) {
            let runtime = runtime.value().clone();
            db.insert_account_info(
                tx.to,
                AccountInfo {
                    code_hash: keccak256(&runtime),
                    code: Some(Bytecode::new_raw(runtime)),
                    ..Default::default()
                },
            );
        }

        let tx_env = TxEnv {
            caller: tx.from,
            gas_limit: tx.gas_limit,
            gas_price: U256::from(tx.gas_price),
            transact_to: TxKind::Call(tx.to),
            value: tx.value,
            data: tx.data.clone(),
            nonce: Some(tx.nonce),
            chain_id: Some(tx.chain_id),
            ..Default::default()
        };

        let block_env = BlockEnv {
            number: U256::from(19_000_000u64),
            timestamp: U256::from(chrono::Utc::now().timestamp().max(0) as u64),
            gas_limit: U256::from(30_000_000u64),
            basefee: U256::ZERO,
            ..Default::default()
        };

        let mut cfg_env = CfgEnv::default();
        cfg_env.chain_id = tx.chain_id;
        let cfg = CfgEnvWithHandlerCfg::new_with_spec_id(cfg_env, SpecId::CANCUN);
        let env = EnvWithHandlerCfg::new_with_cfg_env(cfg, block_env, tx_env);

        let mut evm = Evm::builder()
            .with_db(&mut db)
            .with_env_with_handler_cfg(env)
            .build();

        let result = evm
            .transact()
            .map_err(|e| AppError::source_failed(format!("EVM error: {:?}", e)))?;

        let outcome = match result.result {
            ExecutionResult::Success { gas_used, .. } => SimulationOutcome {
                success: true,
                gas_used,
                revert_reason: None,
            },
            ExecutionResult::Revert { gas_used, output } => SimulationOutcome {
                success: false,
                gas_used,
                revert_reason: Some(
                    alloy_sol_types::decode_revert_reason(&output)
                        .unwrap_or_else(|| format!("0x{}", hex::encode(&output))),
                ),
            },
            ExecutionResult::Halt { reason, gas_used } => SimulationOutcome {
                success: false,
                gas_used,
                revert_reason: Some(format!("Halted: {:?}", reason)),
            },
        };

        debug!(
            success = outcome.success,
            gas_used = outcome.gas_used,
            "simulated {} -> {}",
            tx.from,
            tx.to
        );
        Ok(outcome)
    }
}

#[async_trait]
impl Simulator for RevmSimulator {
    async fn simulate(&self, tx: &Transaction) -> AppResult<SimulationOutcome> {
        let tx = tx.clone();
        let code = Arc::clone(&self.code);

        tokio::task::spawn_blocking(move || Self::simulate_blocking(&tx, &code))
            .await
            .map_err(|e| AppError::source_failed(format!("simulation task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sender() -> Address {
        Address::repeat_byte(0xaa)
    }

    #[tokio::test]
    async fn test_plain_transfer_succeeds() {
        let sim = RevmSimulator::new();
        let tx = Transaction::new(sender(), Address::repeat_byte(0xbb)).with_value(eth_to_wei(1));

        let outcome = sim.simulate(&tx).await.expect("simulation");
        assert!(outcome.success);
        assert_eq!(outcome.gas_used, 21_000);
    }

    #[tokio::test]
    async fn test_reverting_contract() {
        let sim = RevmSimulator::new();
        let target = Address::repeat_byte(0xcc);
        // PUSH1 0 PUSH1 0 REVERT
        sim.register_code(target, vec![0x60, 0x00, 0x60, 0x00, 0xfd]);

        let tx = Transaction::new(sender(), target)
            .with_data(vec![0x12, 0x34, 0x56, 0x78])
            .with_gas_limit(100_000);
        let outcome = sim.simulate(&tx).await.expect("simulation");

        assert!(!outcome.success);
        assert!(outcome.revert_reason.is_some());
        assert!(outcome.gas_used <= tx.gas_limit);
    }

    #[tokio::test]
    async fn test_gas_limit_below_intrinsic_is_error() {
        let sim = RevmSimulator::new();
        let tx = Transaction::new(sender(), Address::repeat_byte(0xbb)).with_gas_limit(1_000);
        assert!(sim.simulate(&tx).await.is_err());
    }
}
