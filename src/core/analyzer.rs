//! Transaction analyzer
//! Collect -> score pipeline shared by single, batch and admission paths

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::core::collector::SignalCollector;
use crate::core::risk_score::RiskScorer;
use crate::models::signals::SignalSet;
use crate::models::types::{RiskAssessment, Transaction};
use crate::utils::telemetry::TelemetryCollector;

/// Assessment together with the signals it was computed from
#[derive(Debug, Clone, Serialize)]
pub struct DetailedAnalysis {
    pub signals: SignalSet,
    pub assessment: RiskAssessment,
    pub latency_ms: u64,
}

/// Thread-safe statistics
#[derive(Default)]
struct AnalyzerStats {
    total_analyzed: AtomicU64,
    total_risky: AtomicU64,
    total_latency_ms: AtomicU64,
}

/// Snapshot of analyzer counters
#[derive(Debug, Clone, Serialize)]
pub struct AnalyzerSnapshot {
    pub total_analyzed: u64,
    pub total_risky: u64,
    pub avg_latency_ms: f64,
}

pub struct TransactionAnalyzer {
    collector: SignalCollector,
    scorer: RiskScorer,
    telemetry: Arc<TelemetryCollector>,
    stats: AnalyzerStats,
}

impl TransactionAnalyzer {
    pub fn new(
        collector: SignalCollector,
        scorer: RiskScorer,
        telemetry: Arc<TelemetryCollector>,
    ) -> Self {
        Self {
            collector,
            scorer,
            telemetry,
            stats: AnalyzerStats::default(),
        }
    }

    pub fn scorer(&self) -> &RiskScorer {
        &self.scorer
    }

    pub fn telemetry(&self) -> &Arc<TelemetryCollector> {
        &self.telemetry
    }

    /// AnalyzeTransaction
    pub async fn analyze(&self, tx: &Transaction) -> RiskAssessment {
        self.analyze_detailed(tx).await.assessment
    }

    /// Analyze and keep the collected signals
    pub async fn analyze_detailed(&self, tx: &Transaction) -> DetailedAnalysis {
        let start = Instant::now();

        let signals = self.collector.collect(tx).await;
        let assessment = self.scorer.score(tx, &signals);

        let latency_ms = start.elapsed().as_millis() as u64;
        self.stats.total_analyzed.fetch_add(1, Ordering::Relaxed);
        self.stats
            .total_latency_ms
            .fetch_add(latency_ms, Ordering::Relaxed);
        if !assessment.warnings.is_empty() {
            self.stats.total_risky.fetch_add(1, Ordering::Relaxed);
        }
        self.telemetry.record_analysis(&assessment, latency_ms);

        info!(
            "{} {} -> {} | score {} | {} | {}ms",
            assessment.level.emoji(),
            tx.from,
            tx.to,
            assessment.score,
            assessment.recommendation,
            latency_ms
        );

        DetailedAnalysis {
            signals,
            assessment,
            latency_ms,
        }
    }

    pub fn get_stats(&self) -> AnalyzerSnapshot {
        let analyzed = self.stats.total_analyzed.load(Ordering::Relaxed);
        let total_latency = self.stats.total_latency_ms.load(Ordering::Relaxed);

        AnalyzerSnapshot {
            total_analyzed: analyzed,
            total_risky: self.stats.total_risky.load(Ordering::Relaxed),
            avg_latency_ms: if analyzed > 0 {
                total_latency as f64 / analyzed as f64
            } else {
                0.0
            },
        }
    }
}
