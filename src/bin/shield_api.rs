//! RusterShield API Server
//!
//! Pre-execution transaction firewall over HTTP
//!
//! Usage:
//!   cargo run --bin shield_api
//!
//! Environment:
//!   SHIELD_PORT      - Server port (default: 8080, PORT takes precedence)
//!   SHIELD_HOST      - Server host (default: 0.0.0.0)
//!   SHIELD_BLACKLIST - Comma-separated addresses seeded into the reputation registry
//!   SHIELD_STATS_DIR - Directory for the telemetry export on shutdown (default: .)
//!   RUST_LOG         - Log filter (default: info)

use ruster_shield::api::{create_router, start_cleanup_task, AppState};
use ruster_shield::core::{
    AdmissionController, RecordingSettlement, RiskScorer, SignalCollector, SystemClock,
    TransactionAnalyzer,
};
use ruster_shield::models::{parse_address_list, FirewallConfig};
use ruster_shield::providers::{ProfileRegistry, ReputationRegistry, RevmSimulator, StaticAuditor};
use ruster_shield::utils::{TelemetryCollector, APP_NAME, APP_VERSION};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    info!("🛡️  {} v{} starting", APP_NAME, APP_VERSION);

    let config = FirewallConfig::from_env()?;

    // Signal sources
    let reputation = Arc::new(ReputationRegistry::with_blacklist(parse_address_list(
        &std::env::var("SHIELD_BLACKLIST").unwrap_or_default(),
    )));
    info!("📋 Reputation registry seeded with {} entries", reputation.len());

    let clock = Arc::new(SystemClock);
    let collector = SignalCollector::new(
        Arc::new(RevmSimulator::new()),
        reputation.clone(),
        Arc::new(ProfileRegistry::new()),
        Arc::new(StaticAuditor::new()),
        config.collector.clone(),
    )
    .with_clock(clock.clone());

    let telemetry = Arc::new(TelemetryCollector::new());
    let analyzer = Arc::new(TransactionAnalyzer::new(
        collector,
        RiskScorer::new(config.thresholds),
        telemetry.clone(),
    ));

    let controller = Arc::new(AdmissionController::new(
        analyzer.clone(),
        Arc::new(RecordingSettlement::new()),
        clock,
        config,
    ));

    let state = Arc::new(AppState::new(analyzer, controller, reputation));

    start_cleanup_task();
    info!("🧹 Background cleanup task started");

    let app = create_router(state);

    let host = std::env::var("SHIELD_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("PORT")
        .or_else(|_| std::env::var("SHIELD_PORT"))
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;

    info!("🚀 {} API listening on http://{}", APP_NAME, addr);
    info!("Endpoints:");
    info!("  POST /v1/analyze                   - Score a transaction");
    info!("  POST /v1/analyze/batch             - Score up to the batch cap concurrently");
    info!("  POST /v1/admissions                - Submit through the firewall");
    info!("  POST /v1/admissions/batch          - Submit a multi-target batch");
    info!("  GET  /v1/admissions/:id            - Admission record");
    info!("  POST /v1/admissions/:id/release    - Release after quarantine");
    info!("  POST /v1/admissions/:id/block      - Operator force-block");
    info!("  GET  /v1/admissions/due            - Quarantines ready for release");
    info!("  GET  /v1/stats                     - Protection statistics");
    info!("Press Ctrl+C for graceful shutdown");

    let listener = TcpListener::bind(addr).await?;

    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("⚠️ Failed to listen for Ctrl+C: {}", e);
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("🛑 Shutdown signal received, exporting telemetry...");
    let stats = telemetry.get_stats();
    info!("   Total analyzed: {}", stats.total_analyzed);
    info!("   Total threats: {}", stats.total_threats);
    info!("   Admissions blocked: {}", stats.admissions_blocked);

    let dir = PathBuf::from(std::env::var("SHIELD_STATS_DIR").unwrap_or_else(|_| ".".to_string()));
    match telemetry.export_stats_json(&dir) {
        Ok(path) => info!("   ✅ Stats exported to: {}", path.display()),
        Err(e) => warn!("   ⚠️ Failed to export stats: {}", e),
    }

    info!("👋 {} shutdown complete", APP_NAME);
    Ok(())
}
