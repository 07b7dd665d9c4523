/// Unified error types for the bank authentication service
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// A single rejected request field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Main error type for the service
#[derive(Error, Debug)]
pub enum BankError {
    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Malformed request input
    #[error("Validation failed for {} field(s)", .0.len())]
    Validation(Vec<FieldError>),

    /// An account with this email already exists
    #[error("An account is already registered for {0}")]
    DuplicateIdentity(String),

    /// Wrong email or secret. Never says which.
    #[error("Invalid email or credentials")]
    InvalidCredentials,

    /// Neither password nor PIN supplied
    #[error("Either pin or password must be provided")]
    MissingCredential,

    /// Unknown activation code
    #[error("Invalid activation token")]
    InvalidToken,

    /// Activation code past its expiry; a replacement has been sent
    #[error("Activation token has expired. A new token has been sent to your email")]
    TokenExpired,

    /// Activation code already consumed
    #[error("Activation token has already been used")]
    TokenAlreadyUsed,

    /// Account not yet activated
    #[error("Account is not activated")]
    AccountDisabled,

    /// Account locked
    #[error("Account is locked")]
    AccountLocked,

    /// Bearer token missing, malformed, expired or not matching its subject
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Rate limiting errors
    #[error("Rate limit exceeded")]
    RateLimitExceeded { retry_after: std::time::Duration },

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Fatal startup configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// JWT encoding errors
    #[error("JWT error: {0}")]
    Jwt(String),

    /// Mail transport errors
    #[error("Mail error: {0}")]
    Mail(String),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// JSON error response format
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_errors: Option<BTreeMap<String, Vec<String>>>,
}

impl BankError {
    /// Status code and stable error code for this error
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            BankError::Validation(_) => (StatusCode::BAD_REQUEST, "ValidationError"),
            BankError::DuplicateIdentity(_) => (StatusCode::CONFLICT, "DuplicateIdentity"),
            BankError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "InvalidCredentials"),
            BankError::MissingCredential => (StatusCode::BAD_REQUEST, "MissingCredential"),
            BankError::InvalidToken => (StatusCode::BAD_REQUEST, "InvalidToken"),
            BankError::TokenExpired => (StatusCode::BAD_REQUEST, "TokenExpired"),
            BankError::TokenAlreadyUsed => (StatusCode::BAD_REQUEST, "TokenAlreadyUsed"),
            BankError::AccountDisabled => (StatusCode::FORBIDDEN, "AccountDisabled"),
            BankError::AccountLocked => (StatusCode::FORBIDDEN, "AccountLocked"),
            BankError::Authentication(_) => (StatusCode::UNAUTHORIZED, "AuthenticationRequired"),
            BankError::RateLimitExceeded { .. } => {
                (StatusCode::TOO_MANY_REQUESTS, "RateLimitExceeded")
            }
            BankError::NotFound(_) => (StatusCode::NOT_FOUND, "NotFound"),
            BankError::Database(_)
            | BankError::Configuration(_)
            | BankError::Jwt(_)
            | BankError::Mail(_)
            | BankError::Internal(_)
            | BankError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "InternalServerError"),
        }
    }
}

/// Convert BankError to HTTP response
impl IntoResponse for BankError {
    fn into_response(self) -> Response {
        let (status, error_code) = self.status_and_code();

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Request failed: {}", self);
            "Internal server error".to_string() // Don't leak details
        } else {
            self.to_string()
        };

        let field_errors = match &self {
            BankError::Validation(errors) => {
                let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
                for error in errors {
                    grouped
                        .entry(error.field.clone())
                        .or_default()
                        .push(error.message.clone());
                }
                Some(grouped)
            }
            _ => None,
        };

        let retry_after = match &self {
            BankError::RateLimitExceeded { retry_after } => Some(retry_after.as_secs().max(1)),
            _ => None,
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
            field_errors,
        });

        let mut response = (status, body).into_response();
        if let Some(seconds) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(seconds));
        }
        response
    }
}

/// Result type alias for service operations
pub type BankResult<T> = Result<T, BankError>;
