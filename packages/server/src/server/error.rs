//! Translation of core outcomes to HTTP responses.

use axum::{
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use engagement::{CascadeProgress, LedgerError};
use serde::Serialize;
use thiserror::Error;

use crate::policy::Operation;

#[derive(Debug, Error)]
pub enum ApiError {
    /// No caller identity on the request
    #[error("missing caller identity")]
    Unauthorized,

    #[error("{user_id} may not {operation} {content_id}")]
    Forbidden {
        operation: Operation,
        user_id: String,
        content_id: String,
    },

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    progress: Option<CascadeProgress>,
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
            ApiError::Forbidden { .. } => (StatusCode::FORBIDDEN, "forbidden"),
            ApiError::Ledger(err) => match err {
                LedgerError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
                LedgerError::AlreadyEngaged { .. } => (StatusCode::CONFLICT, "already_engaged"),
                LedgerError::NotEngaged { .. } => (StatusCode::CONFLICT, "not_engaged"),
                LedgerError::Contention { .. } => (StatusCode::SERVICE_UNAVAILABLE, "contention"),
                LedgerError::PartialFailure { .. } => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "partial_failure")
                }
                LedgerError::StoreUnavailable(_) => {
                    (StatusCode::SERVICE_UNAVAILABLE, "store_unavailable")
                }
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let progress = match &self {
            ApiError::Ledger(LedgerError::PartialFailure { progress, .. }) => Some(progress.clone()),
            _ => None,
        };
        let retryable = matches!(&self, ApiError::Ledger(err) if err.is_retryable());

        let body = ErrorBody {
            error: code,
            message: self.to_string(),
            progress,
        };
        let mut response = (status, Json(body)).into_response();
        if retryable {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from_static("1"));
        }
        response
    }
}
