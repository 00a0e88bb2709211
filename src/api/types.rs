//! API Request/Response Types

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

use crate::core::admission::ControllerSnapshot;
use crate::core::analyzer::AnalyzerSnapshot;
use crate::models::errors::AppError;
use crate::models::signals::SignalSet;
use crate::models::types::{
    AdmissionId, AdmissionState, PendingAdmission, RiskAssessment, SubmissionReceipt,
    TransactionRequest,
};
use crate::utils::telemetry::TelemetryStats;

/// API Response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
    pub latency_ms: f64,
    pub timestamp: i64,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T, latency_ms: f64) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            latency_ms,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

impl ApiResponse<()> {
    pub fn error(error: ApiError, latency_ms: f64) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
            latency_ms,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

/// API Error
#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn rate_limited(retry_after: u64) -> Self {
        Self {
            code: "RATE_LIMITED".to_string(),
            message: format!("Rate limit exceeded. Retry after {} seconds", retry_after),
            details: Some(format!("retry_after: {}", retry_after)),
        }
    }
}

impl From<&AppError> for ApiError {
    fn from(err: &AppError) -> Self {
        Self {
            code: err.code_str().to_string(),
            message: err.message.clone(),
            details: std::error::Error::source(err).map(|s| s.to_string()),
        }
    }
}

// ============================================
// Analysis
// ============================================

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(flatten)]
    pub transaction: TransactionRequest,
    /// Include the raw signal set in the response
    #[serde(default)]
    pub include_signals: bool,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeData {
    pub assessment: RiskAssessment,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signals: Option<SignalSet>,
}

#[derive(Debug, Deserialize)]
pub struct BatchAnalysisRequest {
    pub transactions: Vec<TransactionRequest>,
}

#[derive(Debug, Serialize)]
pub struct BatchAnalysisData {
    pub total: usize,
    pub total_blocked: usize,
    pub results: Vec<RiskAssessment>,
    pub processing_time_ms: f64,
}

// ============================================
// Admission
// ============================================

#[derive(Debug, Serialize)]
pub struct SubmissionData {
    pub admission_id: AdmissionId,
    pub initial_state: AdmissionState,
    pub assessment: RiskAssessment,
}

impl From<SubmissionReceipt> for SubmissionData {
    fn from(receipt: SubmissionReceipt) -> Self {
        Self {
            admission_id: receipt.admission_id,
            initial_state: receipt.initial_state,
            assessment: receipt.assessment,
        }
    }
}

/// One item of a batch submission: a receipt or that item's error
#[derive(Debug, Serialize)]
pub struct BatchItemResult {
    pub index: usize,
    pub status: String, // "accepted" | "error"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<SubmissionData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

#[derive(Debug, Serialize)]
pub struct BatchSubmissionData {
    pub total: usize,
    pub results: Vec<BatchItemResult>,
}

#[derive(Debug, Serialize)]
pub struct AdmissionData {
    pub admission: PendingAdmission,
    /// Value the firewall is still holding for this admission
    pub escrowed_value: U256,
}

impl From<PendingAdmission> for AdmissionData {
    fn from(admission: PendingAdmission) -> Self {
        Self {
            escrowed_value: admission.escrowed_value(),
            admission,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ForceBlockRequest {
    pub operator: String,
}

#[derive(Debug, Deserialize)]
pub struct DueQuery {
    /// Unix seconds; defaults to now
    pub at: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct DueData {
    pub at: i64,
    pub admission_ids: Vec<AdmissionId>,
}

// ============================================
// Stats / Health
// ============================================

#[derive(Debug, Serialize)]
pub struct StatsData {
    pub telemetry: TelemetryStats,
    pub analyzer: AnalyzerSnapshot,
    pub admissions: ControllerSnapshot,
    pub blacklist_size: usize,
    pub uptime_seconds: u64,
    pub api_version: String,
}

#[derive(Debug, Serialize)]
pub struct HealthData {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
}
