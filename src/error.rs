//! Defines the app level error type and its conversion to JSON error responses.
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::gateway::GatewayError;

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// A request parameter was missing, malformed or out of range.
    ///
    /// These are always caused by the client and are never retried.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The requested resource was not found.
    ///
    /// The message should name the kind of resource, e.g. "user".
    #[error("Not found: {0}")]
    NotFound(String),

    /// No route matches the requested path, which is held in the message.
    ///
    /// Unlike [Error::NotFound], these are always logged whatever the path.
    #[error("Not found: {0}")]
    RouteNotFound(String),

    /// The search backend could not be reached or was never initialized.
    #[error("the search backend is not reachable")]
    ServiceUnavailable,

    /// The search backend returned an error while executing a query.
    #[error("error during {operation}: {source}")]
    BackendFailure {
        /// The operation that failed, e.g. "search" or "scroll".
        operation: &'static str,
        /// The error reported by the backend gateway.
        source: GatewayError,
    },
}

impl Error {
    /// Shorthand for an [Error::InvalidArgument] from anything string-like.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Wrap a gateway error with the name of the `operation` that failed.
    ///
    /// An unreachable backend is reported as [Error::ServiceUnavailable] so
    /// that clients see a 503 rather than a generic failure.
    pub(crate) fn backend(operation: &'static str, source: GatewayError) -> Self {
        match source {
            GatewayError::Unreachable(_) => Self::ServiceUnavailable,
            source => Self::BackendFailure { operation, source },
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) | Error::RouteNotFound(_) => StatusCode::NOT_FOUND,
            Error::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Error::BackendFailure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Not found errors about users are expected during normal operation and
    /// would flood the logs.
    fn should_log(&self) -> bool {
        !matches!(self, Error::NotFound(message) if message.contains("user"))
    }
}

/// Attached to error responses so that the logging middleware can log the
/// error alongside the request that caused it.
#[derive(Debug, Clone)]
pub struct ErrorLog {
    /// The text of the error sent to the client.
    pub message: String,
    /// Whether the error should be written to the logs.
    pub should_log: bool,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let error_log = ErrorLog {
            message: message.clone(),
            should_log: self.should_log(),
        };

        let mut response = (self.status_code(), Json(json!({ "error": message }))).into_response();
        response.extensions_mut().insert(error_log);

        response
    }
}
