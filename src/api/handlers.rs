//! API Request Handlers

use alloy_primitives::Address;
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Json, Path, Query, State,
    },
    http::StatusCode,
};
use chrono::{TimeZone, Utc};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

use super::types::*;
use crate::core::admission::AdmissionController;
use crate::core::analyzer::TransactionAnalyzer;
use crate::core::batch::BatchCoordinator;
use crate::models::errors::{AppError, AppResult};
use crate::models::types::{
    AdmissionId, BatchSubmission, BatchSubmissionRequest, Recommendation, Transaction,
    TransactionRequest,
};
use crate::providers::memory::ReputationRegistry;
use crate::utils::constants::APP_VERSION;
use crate::utils::telemetry::TelemetryCollector;

/// Shared application state
pub struct AppState {
    pub analyzer: Arc<TransactionAnalyzer>,
    pub batch: BatchCoordinator,
    pub controller: Arc<AdmissionController>,
    pub reputation: Arc<ReputationRegistry>,
    pub telemetry: Arc<TelemetryCollector>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        analyzer: Arc<TransactionAnalyzer>,
        controller: Arc<AdmissionController>,
        reputation: Arc<ReputationRegistry>,
    ) -> Self {
        let max_batch = controller.config().max_batch_size;
        Self {
            batch: BatchCoordinator::new(Arc::clone(&analyzer), max_batch),
            telemetry: Arc::clone(analyzer.telemetry()),
            analyzer,
            controller,
            reputation,
            start_time: Instant::now(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

type Rejection = (StatusCode, Json<ApiResponse<()>>);
type ApiResult<T> = Result<Json<ApiResponse<T>>, Rejection>;

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// Map an application error to its HTTP status and envelope
fn reject(err: AppError, start: Instant) -> Rejection {
    let status =
        StatusCode::from_u16(err.code.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if !err.code.is_caller_error() {
        warn!(code = err.code_str(), "{}", err.message);
    }
    (
        status,
        Json(ApiResponse::error(ApiError::from(&err), elapsed_ms(start))),
    )
}

fn respond<T: serde::Serialize>(result: AppResult<T>, start: Instant) -> ApiResult<T> {
    match result {
        Ok(data) => Ok(Json(ApiResponse::success(data, elapsed_ms(start)))),
        Err(e) => Err(reject(e, start)),
    }
}

/// Body or query string the extractor could not decode
fn unreadable(rejection: impl std::fmt::Display, start: Instant) -> Rejection {
    reject(AppError::bad_request(rejection.to_string()), start)
}

fn parse_admission_id(raw: &str) -> AppResult<AdmissionId> {
    AdmissionId::from_str(raw.trim())
        .map_err(|_| AppError::bad_request(format!("'{}' is not a 32-byte admission id", raw)))
}

// ============================================
// Health Check
// ============================================

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<ApiResponse<HealthData>> {
    let start = Instant::now();

    let data = HealthData {
        status: "healthy".to_string(),
        version: APP_VERSION.to_string(),
        uptime_seconds: state.uptime_seconds(),
    };

    Json(ApiResponse::success(data, elapsed_ms(start)))
}

// ============================================
// Analysis
// ============================================

pub async fn analyze_transaction(
    State(state): State<Arc<AppState>>,
    body: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> ApiResult<AnalyzeData> {
    let start = Instant::now();
    let Json(req) = body.map_err(|e| unreadable(e, start))?;
    let tx = Transaction::try_from(req.transaction).map_err(|e| reject(e, start))?;

    let analysis = state.analyzer.analyze_detailed(&tx).await;
    let data = AnalyzeData {
        assessment: analysis.assessment,
        signals: req.include_signals.then_some(analysis.signals),
    };

    Ok(Json(ApiResponse::success(data, elapsed_ms(start))))
}

pub async fn batch_analyze(
    State(state): State<Arc<AppState>>,
    body: Result<Json<BatchAnalysisRequest>, JsonRejection>,
) -> ApiResult<BatchAnalysisData> {
    let start = Instant::now();
    let Json(req) = body.map_err(|e| unreadable(e, start))?;

    let result = async {
        let txs = req
            .transactions
            .into_iter()
            .map(Transaction::try_from)
            .collect::<AppResult<Vec<_>>>()?;
        let results = state.batch.analyze_batch(&txs).await?;

        Ok::<_, AppError>(BatchAnalysisData {
            total: results.len(),
            total_blocked: results
                .iter()
                .filter(|a| a.recommendation == Recommendation::Block)
                .count(),
            results,
            processing_time_ms: elapsed_ms(start),
        })
    }
    .await;

    respond(result, start)
}

// ============================================
// Admission
// ============================================

pub async fn submit_admission(
    State(state): State<Arc<AppState>>,
    body: Result<Json<TransactionRequest>, JsonRejection>,
) -> ApiResult<SubmissionData> {
    let start = Instant::now();
    let Json(req) = body.map_err(|e| unreadable(e, start))?;

    let result = async {
        let tx = Transaction::try_from(req)?;
        let receipt = state.controller.submit(tx).await?;
        Ok::<_, AppError>(SubmissionData::from(receipt))
    }
    .await;

    respond(result, start)
}

pub async fn submit_admission_batch(
    State(state): State<Arc<AppState>>,
    body: Result<Json<BatchSubmissionRequest>, JsonRejection>,
) -> ApiResult<BatchSubmissionData> {
    let start = Instant::now();
    let Json(req) = body.map_err(|e| unreadable(e, start))?;

    let result = async {
        let batch = BatchSubmission::try_from(req)?;
        let receipts = state.controller.submit_batch(batch).await?;

        let results = receipts
            .into_iter()
            .enumerate()
            .map(|(index, item)| match item {
                Ok(receipt) => BatchItemResult {
                    index,
                    status: "accepted".to_string(),
                    receipt: Some(receipt.into()),
                    error: None,
                },
                Err(e) => BatchItemResult {
                    index,
                    status: "error".to_string(),
                    receipt: None,
                    error: Some(ApiError::from(&e)),
                },
            })
            .collect::<Vec<_>>();

        Ok::<_, AppError>(BatchSubmissionData {
            total: results.len(),
            results,
        })
    }
    .await;

    respond(result, start)
}

pub async fn get_admission(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<AdmissionData> {
    let start = Instant::now();

    let result = async {
        let id = parse_admission_id(&id)?;
        let admission = state.controller.get_admission(id)?;
        Ok::<_, AppError>(AdmissionData::from(admission))
    }
    .await;

    respond(result, start)
}

pub async fn release_admission(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<AdmissionData> {
    let start = Instant::now();

    let result = async {
        let id = parse_admission_id(&id)?;
        let admission = state.controller.release(id).await?;
        Ok::<_, AppError>(AdmissionData::from(admission))
    }
    .await;

    respond(result, start)
}

pub async fn force_block_admission(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Result<Json<ForceBlockRequest>, JsonRejection>,
) -> ApiResult<AdmissionData> {
    let start = Instant::now();
    let Json(req) = body.map_err(|e| unreadable(e, start))?;

    let result = async {
        let id = parse_admission_id(&id)?;
        let operator = Address::from_str(req.operator.trim())
            .map_err(|e| AppError::invalid_address(format!("operator: {}", e)))?;
        let admission = state.controller.force_block(id, operator).await?;
        Ok::<_, AppError>(AdmissionData::from(admission))
    }
    .await;

    respond(result, start)
}

pub async fn due_for_release(
    State(state): State<Arc<AppState>>,
    query: Result<Query<DueQuery>, QueryRejection>,
) -> ApiResult<DueData> {
    let start = Instant::now();
    let Query(query) = query.map_err(|e| unreadable(e, start))?;

    let result = (|| {
        let at = match query.at {
            Some(secs) => Utc
                .timestamp_opt(secs, 0)
                .single()
                .ok_or_else(|| AppError::bad_request(format!("invalid timestamp {}", secs)))?,
            None => Utc::now(),
        };
        Ok::<_, AppError>(DueData {
            at: at.timestamp(),
            admission_ids: state.controller.due_for_release(at),
        })
    })();

    respond(result, start)
}

// ============================================
// Stats
// ============================================

pub async fn get_stats(State(state): State<Arc<AppState>>) -> Json<ApiResponse<StatsData>> {
    let start = Instant::now();

    let data = StatsData {
        telemetry: state.telemetry.get_stats(),
        analyzer: state.analyzer.get_stats(),
        admissions: state.controller.stats(),
        blacklist_size: state.reputation.len(),
        uptime_seconds: state.uptime_seconds(),
        api_version: APP_VERSION.to_string(),
    };

    Json(ApiResponse::success(data, elapsed_ms(start)))
}
