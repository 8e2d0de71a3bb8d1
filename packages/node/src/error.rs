//! Application-level error type returned by handlers.
//!
//! All variants serialise to the [`ErrorResponse`] JSON format and map to the
//! appropriate HTTP status code.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use ontoweft_node_api::{error::codes, ErrorResponse};

use crate::config::ConfigError;

/// An error that a handler can return; converts directly to an HTTP response.
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    InvalidJson(String),
    Internal(String),
    /// An error raised by the core library.
    Core(ontoweft::Error),
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, codes::INVALID_PARAMETER),
            AppError::InvalidJson(_) => (StatusCode::BAD_REQUEST, codes::INVALID_JSON),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, codes::INTERNAL_ERROR),
            AppError::Core(e) => (status_for(e), e.code()),
        }
    }
}

/// The HTTP status a core error is reported with.
pub fn status_for(e: &ontoweft::Error) -> StatusCode {
    use ontoweft::Error;
    match e {
        Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
        Error::UnknownCuriePrefix(_) => StatusCode::NOT_FOUND,
        Error::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        Error::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        Error::TraversalFailure { .. } | Error::Cancelled { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.parts();
        let message = match self {
            AppError::BadRequest(msg) | AppError::InvalidJson(msg) | AppError::Internal(msg) => msg,
            AppError::Core(e) => e.to_string(),
        };
        if status.is_server_error() {
            tracing::error!(%status, code, "{message}");
        }
        (status, Json(ErrorResponse::new(code, message))).into_response()
    }
}

impl From<ontoweft::Error> for AppError {
    fn from(e: ontoweft::Error) -> Self {
        AppError::Core(e)
    }
}

impl From<ConfigError> for AppError {
    fn from(e: ConfigError) -> Self {
        let message = e.to_string();
        match e {
            ConfigError::Io { .. } => AppError::Internal(message),
            _ => AppError::BadRequest(message),
        }
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(e: tokio::task::JoinError) -> Self {
        AppError::Internal(format!("worker stopped unexpectedly: {e}"))
    }
}
