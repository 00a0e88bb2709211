//! Batch analysis
//! Runs the analyzer over up to `max_batch_size` transactions concurrently

use futures_util::future::join_all;
use std::sync::Arc;
use tracing::{error, info};

use crate::core::analyzer::TransactionAnalyzer;
use crate::models::errors::{AppError, AppResult};
use crate::models::types::{RiskAssessment, Transaction};

pub struct BatchCoordinator {
    analyzer: Arc<TransactionAnalyzer>,
    max_batch_size: usize,
}

impl BatchCoordinator {
    pub fn new(analyzer: Arc<TransactionAnalyzer>, max_batch_size: usize) -> Self {
        Self {
            analyzer,
            max_batch_size,
        }
    }

    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    /// AnalyzeBatch: one assessment per input, in input order.
    /// An item whose task dies gets a failsafe assessment; siblings are unaffected.
    pub async fn analyze_batch(&self, transactions: &[Transaction]) -> AppResult<Vec<RiskAssessment>> {
        if transactions.len() > self.max_batch_size {
            return Err(AppError::batch_too_large(
                transactions.len(),
                self.max_batch_size,
            ));
        }
        if transactions.is_empty() {
            return Ok(Vec::new());
        }

        info!("📦 Analyzing batch of {}", transactions.len());

        let handles: Vec<_> = transactions
            .iter()
            .cloned()
            .map(|tx| {
                let analyzer = Arc::clone(&self.analyzer);
                tokio::spawn(async move { analyzer.analyze(&tx).await })
            })
            .collect();

        let results = join_all(handles)
            .await
            .into_iter()
            .enumerate()
            .map(|(index, joined)| match joined {
                Ok(assessment) => assessment,
                Err(e) => {
                    let err =
                        AppError::internal(format!("batch item {} task failed: {}", index, e));
                    error!("❌ {}", err);
                    RiskAssessment::failsafe(err.message)
                }
            })
            .collect();

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::collector::SignalCollector;
    use crate::core::risk_score::RiskScorer;
    use crate::core::sources::Simulator;
    use crate::models::config::CollectorConfig;
    use crate::models::errors::ErrorCode;
    use crate::models::signals::SimulationOutcome;
    use crate::models::types::{Recommendation, RiskLevel};
    use crate::providers::{ProfileRegistry, ReputationRegistry, StaticAuditor};
    use crate::utils::constants::eth_to_wei;
    use crate::utils::telemetry::TelemetryCollector;
    use alloy_primitives::Address;
    use async_trait::async_trait;
    use std::time::Duration;

    /// Panics for one poisoned target, sleeps briefly for others
    struct FlakySimulator {
        poisoned: Address,
    }

    #[async_trait]
    impl Simulator for FlakySimulator {
        async fn simulate(&self, tx: &Transaction) -> AppResult<SimulationOutcome> {
            if tx.to == self.poisoned {
                panic!("simulator crashed");
            }
            tokio::time::sleep(Duration::from_millis(u64::from(tx.to.as_slice()[0]))).await;
            Ok(SimulationOutcome::default())
        }
    }

    fn coordinator(reputation: Arc<ReputationRegistry>, poisoned: Address) -> BatchCoordinator {
        let collector = SignalCollector::new(
            Arc::new(FlakySimulator { poisoned }),
            reputation,
            Arc::new(ProfileRegistry::new()),
            Arc::new(StaticAuditor::new()),
            CollectorConfig::default(),
        );
        let analyzer = TransactionAnalyzer::new(
            collector,
            RiskScorer::default(),
            Arc::new(TelemetryCollector::new()),
        );
        BatchCoordinator::new(Arc::new(analyzer), 10)
    }

    fn tx_to(byte: u8, eth: u64) -> Transaction {
        Transaction::new(Address::repeat_byte(0x01), Address::repeat_byte(byte))
            .with_value(eth_to_wei(eth))
    }

    #[tokio::test]
    async fn test_results_keep_input_order() {
        let reputation = Arc::new(ReputationRegistry::new());
        reputation.blacklist(Address::repeat_byte(0x30), RiskLevel::Critical);
        let batch = coordinator(reputation, Address::ZERO);

        // Slowest first so completion order differs from input order
        let txs = vec![tx_to(0x30, 1), tx_to(0x10, 50), tx_to(0x05, 1)];
        let results = batch.analyze_batch(&txs).await.unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].recommendation, Recommendation::Block);
        assert_eq!(results[1].score, 10);
        assert_eq!(results[2].score, 0);
    }

    #[tokio::test]
    async fn test_panicking_item_is_isolated() {
        let poisoned = Address::repeat_byte(0x20);
        let batch = coordinator(Arc::new(ReputationRegistry::new()), poisoned);

        let txs = vec![tx_to(0x05, 1), tx_to(0x20, 1), tx_to(0x06, 1)];
        let results = batch.analyze_batch(&txs).await.unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].recommendation, Recommendation::Proceed);
        assert_eq!(results[1].level, RiskLevel::Medium);
        assert_eq!(results[1].recommendation, Recommendation::Caution);
        assert!(results[1].explanation.contains("batch item 1 task failed"));
        assert_eq!(results[2].recommendation, Recommendation::Proceed);
    }

    #[tokio::test]
    async fn test_oversize_batch_rejected() {
        let batch = coordinator(Arc::new(ReputationRegistry::new()), Address::ZERO);
        let txs: Vec<_> = (0..11u8).map(|i| tx_to(i + 1, 1)).collect();

        let err = batch.analyze_batch(&txs).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::BatchTooLarge);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let batch = coordinator(Arc::new(ReputationRegistry::new()), Address::ZERO);
        assert!(batch.analyze_batch(&[]).await.unwrap().is_empty());
    }
}
