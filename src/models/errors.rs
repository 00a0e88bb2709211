//! Centralized Error Handling Module
//!
//! Every failure carries a unique error code so logs and API responses can be
//! correlated without parsing messages.
//!
//! Error codes follow pattern: CATEGORY_SPECIFIC_ERROR
//! - TX_xxx: Transaction shape errors (rejected before analysis)
//! - BATCH_xxx: Batch validation errors (rejected wholesale)
//! - ADMISSION_xxx: Admission state machine errors
//! - SIGNAL_xxx: Signal source errors (recovered by defaulting)
//! - CFG_xxx: Configuration errors
//! - API_xxx: API errors

use std::fmt;

/// Application-wide error type
#[derive(Debug)]
pub struct AppError {
    /// Unique error code for logging/monitoring
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
    /// Optional underlying error
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new AppError
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Create AppError with source error
    pub fn with_source(
        code: ErrorCode,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Get error code as string (for logging)
    pub fn code_str(&self) -> &'static str {
        self.code.as_str()
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Unique error codes for monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // ============================================
    // Transaction Errors (1xx)
    // ============================================
    /// Sender or recipient is not a 20-byte address
    InvalidAddress,
    /// Value or gas field is negative, fractional or out of range
    InvalidAmount,
    /// Call data is not valid hex
    InvalidCallData,

    // ============================================
    // Batch Errors (2xx)
    // ============================================
    /// More items than the configured cap
    BatchTooLarge,
    /// Zero items
    BatchEmpty,
    /// Array lengths or value sum disagree
    BatchMismatch,

    // ============================================
    // Admission Errors (3xx)
    // ============================================
    /// Unknown admission id
    AdmissionNotFound,
    /// Admission already Executed or Blocked
    AdmissionFinalized,
    /// Release attempted before the quarantine period elapsed
    QuarantineActive,
    /// Admission id already exists
    AdmissionConflict,
    /// Caller is not a configured operator
    Unauthorized,
    /// Force-block refused because the re-checked score is below High
    NotEscalated,

    // ============================================
    // Signal Errors (4xx)
    // ============================================
    /// Signal source returned an error
    SourceFailed,
    /// Signal source returned data that fails validation
    SignalMalformed,

    // ============================================
    // Settlement Errors (5xx)
    // ============================================
    /// Execution or refund could not be performed
    SettlementFailed,

    // ============================================
    // Configuration / API Errors (6xx)
    // ============================================
    /// Invalid configuration value
    ConfigInvalidValue,
    /// Invalid request format
    ApiBadRequest,
    /// Internal server error
    ApiInternalError,

    // ============================================
    // Generic Errors (9xx)
    // ============================================
    /// Unknown error
    Unknown,
}

impl ErrorCode {
    /// Get string representation of error code
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidAddress => "TX_INVALID_ADDRESS",
            Self::InvalidAmount => "TX_INVALID_AMOUNT",
            Self::InvalidCallData => "TX_INVALID_DATA",

            Self::BatchTooLarge => "BATCH_TOO_LARGE",
            Self::BatchEmpty => "BATCH_EMPTY",
            Self::BatchMismatch => "BATCH_MISMATCH",

            Self::AdmissionNotFound => "ADMISSION_NOT_FOUND",
            Self::AdmissionFinalized => "ADMISSION_FINALIZED",
            Self::QuarantineActive => "ADMISSION_QUARANTINE_ACTIVE",
            Self::AdmissionConflict => "ADMISSION_CONFLICT",
            Self::Unauthorized => "ADMISSION_UNAUTHORIZED",
            Self::NotEscalated => "ADMISSION_NOT_ESCALATED",

            Self::SourceFailed => "SIGNAL_SOURCE_FAILED",
            Self::SignalMalformed => "SIGNAL_MALFORMED",

            Self::SettlementFailed => "SETTLEMENT_FAILED",

            Self::ConfigInvalidValue => "CFG_INVALID_VALUE",
            Self::ApiBadRequest => "API_BAD_REQUEST",
            Self::ApiInternalError => "API_INTERNAL_ERROR",

            Self::Unknown => "UNKNOWN_ERROR",
        }
    }

    /// Get HTTP status code for API responses
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidAddress
            | Self::InvalidAmount
            | Self::InvalidCallData
            | Self::BatchTooLarge
            | Self::BatchEmpty
            | Self::BatchMismatch
            | Self::ApiBadRequest
            | Self::ConfigInvalidValue => 400,
            Self::Unauthorized => 403,
            Self::AdmissionNotFound => 404,
            Self::AdmissionFinalized | Self::AdmissionConflict => 409,
            Self::QuarantineActive | Self::NotEscalated => 422,
            Self::SourceFailed | Self::SettlementFailed => 502,
            _ => 500,
        }
    }

    /// Errors the caller caused; the request must not be retried unchanged
    pub fn is_caller_error(&self) -> bool {
        (400..500).contains(&self.http_status())
    }
}

// ============================================
// Convenience constructors
// ============================================

impl AppError {
    pub fn invalid_address(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidAddress, msg)
    }

    pub fn invalid_amount(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidAmount, msg)
    }

    pub fn invalid_call_data(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidCallData, msg)
    }

    pub fn batch_too_large(len: usize, max: usize) -> Self {
        Self::new(
            ErrorCode::BatchTooLarge,
            format!("Batch of {} exceeds maximum of {} items", len, max),
        )
    }

    pub fn batch_empty() -> Self {
        Self::new(ErrorCode::BatchEmpty, "Batch contains no items")
    }

    pub fn batch_mismatch(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::BatchMismatch, msg)
    }

    pub fn admission_not_found(id: impl fmt::Display) -> Self {
        Self::new(ErrorCode::AdmissionNotFound, format!("No admission {}", id))
    }

    pub fn admission_finalized(id: impl fmt::Display, state: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::AdmissionFinalized,
            format!("Admission {} is already {}", id, state),
        )
    }

    pub fn quarantine_active(remaining_secs: i64) -> Self {
        Self::new(
            ErrorCode::QuarantineActive,
            format!("Quarantine still active for {}s", remaining_secs),
        )
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, msg)
    }

    pub fn source_failed(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::SourceFailed, msg)
    }

    pub fn settlement_failed(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::SettlementFailed, msg)
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigInvalidValue, msg)
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ApiBadRequest, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ApiInternalError, msg)
    }
}

// ============================================
// Result type alias
// ============================================

/// Application Result type
pub type AppResult<T> = Result<T, AppError>;

// ============================================
// Conversion from common error types
// ============================================

impl From<eyre::Report> for AppError {
    fn from(err: eyre::Report) -> Self {
        Self::new(ErrorCode::Unknown, err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::with_source(ErrorCode::Unknown, "IO error", err)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(ErrorCode::ApiBadRequest, "JSON parse error", err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = AppError::batch_too_large(11, 10);
        assert_eq!(err.code, ErrorCode::BatchTooLarge);
        assert_eq!(err.code_str(), "BATCH_TOO_LARGE");
        assert!(err.to_string().starts_with("[BATCH_TOO_LARGE]"));
    }

    #[test]
    fn test_http_status() {
        assert_eq!(ErrorCode::InvalidAddress.http_status(), 400);
        assert_eq!(ErrorCode::Unauthorized.http_status(), 403);
        assert_eq!(ErrorCode::AdmissionNotFound.http_status(), 404);
        assert_eq!(ErrorCode::AdmissionFinalized.http_status(), 409);
        assert_eq!(ErrorCode::QuarantineActive.http_status(), 422);
        assert_eq!(ErrorCode::Unknown.http_status(), 500);
    }

    #[test]
    fn test_caller_errors() {
        assert!(ErrorCode::BatchMismatch.is_caller_error());
        assert!(ErrorCode::AdmissionFinalized.is_caller_error());
        assert!(!ErrorCode::SettlementFailed.is_caller_error());
    }
}
