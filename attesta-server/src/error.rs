//! Error type returned by every handler.
//!
//! Responses carry `{"error": .., "code": ..}`. Storage and hook failures are
//! mapped here so handlers can use `?` on ledger and host calls directly.

use attesta_core::{ValidationError, COMPLIANCE_VIOLATION_PREFIX};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::events::HookError;
use crate::host::HostError;
use crate::ledger::StoreError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Details are logged, never sent to the client.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Ledger storage unreachable.
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Missing or rejected bearer token. `code` is one of the `AUTH_*` codes.
    #[error("{message}")]
    AuthError { message: String, code: String },

    /// Write refused to protect the audit trail.
    #[error("{prefix}: {0}", prefix = COMPLIANCE_VIOLATION_PREFIX)]
    ComplianceViolation(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn auth_error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::AuthError {
            message: message.into(),
            code: code.into(),
        }
    }

    /// The compliance prefix is added on display.
    pub fn compliance_violation(reason: impl Into<String>) -> Self {
        Self::ComplianceViolation(reason.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::AuthError { .. } => StatusCode::UNAUTHORIZED,
            Self::ComplianceViolation(_) => StatusCode::FORBIDDEN,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }

    /// Stable machine-readable code for the response body.
    pub fn error_code(&self) -> &str {
        match self {
            Self::BadRequest(_) => "INVALID_INPUT",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            Self::AuthError { code, .. } => code,
            Self::ComplianceViolation(_) => "COMPLIANCE_VIOLATION",
            Self::Validation(_) => "VALIDATION_ERROR",
        }
    }

    fn client_message(&self) -> String {
        match self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            _ => self.to_string(),
        }
    }
}

impl From<HookError> for ApiError {
    fn from(e: HookError) -> Self {
        match e {
            HookError::ComplianceViolation(reason) => Self::ComplianceViolation(reason),
            HookError::Validation(v) => Self::Validation(v),
            HookError::Internal { .. } => Self::Internal(e.to_string()),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => Self::NotFound(format!("Audit entry {id} not found")),
            StoreError::InvalidField(msg) => Self::BadRequest(msg),
            StoreError::Rejected(hook) => hook.into(),
            StoreError::Connection(_) => Self::ServiceUnavailable(e.to_string()),
            StoreError::Migration(_) | StoreError::Query(_) => Self::Internal(e.to_string()),
        }
    }
}

impl From<HostError> for ApiError {
    fn from(e: HostError) -> Self {
        match e {
            HostError::Rejected(hook) => hook.into(),
            HostError::NotAnObject => Self::BadRequest(e.to_string()),
            HostError::UnknownFieldType(_) => Self::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code().to_string();

        if status.is_server_error() && !matches!(self, Self::ServiceUnavailable(_)) {
            tracing::error!(status = %status, code = %code, error = %self, "Request failed");
        } else {
            tracing::warn!(status = %status, code = %code, error = %self, "Request refused");
        }

        let body = serde_json::json!({
            "error": self.client_message(),
            "code": code,
        });
        (status, Json(body)).into_response()
    }
}
