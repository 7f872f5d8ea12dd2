use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use sqlx::migrate::MigrateError;
use thiserror::Error;
use uuid::Uuid;

/// Top-level error type for the entire application
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Settlement error: {0}")]
    Settlement(#[from] SettlementError),

    #[error("Result source error: {0}")]
    Resolve(#[from] SourceError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already settled: {0}")]
    AlreadySettled(Uuid),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Settlement-related errors - scoped to a single bet or market,
/// collected into batch reports rather than aborting the batch
#[derive(Error, Debug)]
pub enum SettlementError {
    #[error("Bet not found: {0}")]
    BetNotFound(Uuid),

    #[error("Ledger integrity failure for bet {bet_id}: {message}")]
    LedgerIntegrity { bet_id: Uuid, message: String },

    #[error("Invalid fancy claim '{claim}' on bet {bet_id}")]
    InvalidClaim { bet_id: Uuid, claim: String },

    #[error("No pending bets for {0}")]
    NoPendingBets(Uuid),

    #[error("Fancy market {0} has no declared result")]
    MissingResult(Uuid),
}

/// Per-source resolution errors - swallowed at the resolver boundary,
/// the failing source is treated as "not yet available"
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Malformed payload from {feed}: {message}")]
    Malformed { feed: &'static str, message: String },
}

/// API error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, message, details) = match self {
            AppError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("Not found: {}", what),
                None,
            ),
            AppError::AlreadySettled(id) => (
                StatusCode::CONFLICT,
                "ALREADY_SETTLED",
                format!("Target {} is already settled", id),
                Some(serde_json::json!({ "id": id })),
            ),
            AppError::InvalidInput(msg) => (
                StatusCode::BAD_REQUEST,
                "INVALID_INPUT",
                msg,
                None,
            ),
            AppError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                "BAD_REQUEST",
                msg,
                None,
            ),
            AppError::Settlement(SettlementError::BetNotFound(id)) => (
                StatusCode::NOT_FOUND,
                "BET_NOT_FOUND",
                format!("Bet not found: {}", id),
                None,
            ),
            AppError::Settlement(SettlementError::MissingResult(id)) => (
                StatusCode::BAD_REQUEST,
                "MISSING_RESULT",
                format!("Fancy market {} has no declared result", id),
                None,
            ),
            AppError::Settlement(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "SETTLEMENT_FAILED",
                err.to_string(),
                None,
            ),
            AppError::Resolve(err) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "RESULT_UNAVAILABLE",
                err.to_string(),
                None,
            ),
            AppError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "DATABASE_ERROR",
                "A database error occurred".to_string(),
                None,
            ),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
                None,
            ),
        };

        let body = Json(ErrorResponse {
            error: message,
            error_code: error_code.to_string(),
            details,
        });

        (status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        AppError::Internal(format!("Error converting: {:?}", error))
    }
}

impl From<rust_decimal::Error> for AppError {
    fn from(error: rust_decimal::Error) -> Self {
        AppError::InvalidInput(format!("Decimal conversion error: {:?}", error))
    }
}

impl From<MigrateError> for AppError {
    fn from(error: MigrateError) -> Self {
        AppError::Internal(format!("Migration error: {:?}", error))
    }
}

/// Result type alias for the application
pub type AppResult<T> = Result<T, AppError>;
