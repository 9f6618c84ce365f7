use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::{logs, monitor};

#[derive(Debug, Default, serde::Deserialize)]
pub struct LogsParams {
    pub tail: Option<usize>,
}

/// JSON body of every error response.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ErrorBody {
    /// Machine-readable reason, e.g. `not_found`.
    pub reason: &'static str,
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, reason: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                reason,
                message: message.into(),
            },
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_request", message)
    }

    fn runtime_unavailable() -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "runtime_unavailable",
            "container runtime is unavailable",
        )
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<monitor::Error> for ApiError {
    fn from(err: monitor::Error) -> Self {
        match err {
            monitor::Error::Unavailable(_) => Self::runtime_unavailable(),
            monitor::Error::List(_) => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "collection_failed",
                "failed to list containers",
            ),
            monitor::Error::Timeout(timeout) => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "collection_failed",
                format!("listing containers did not finish within {}s", timeout.as_secs()),
            ),
        }
    }
}

impl From<logs::Error> for ApiError {
    fn from(err: logs::Error) -> Self {
        match err {
            err @ (logs::Error::InvalidId(_) | logs::Error::InvalidTail(_)) => {
                Self::invalid_request(err.to_string())
            }
            err @ logs::Error::NotFound(_) => {
                Self::new(StatusCode::NOT_FOUND, "not_found", err.to_string())
            }
            logs::Error::Timeout(timeout) => Self::new(
                StatusCode::GATEWAY_TIMEOUT,
                "timeout",
                format!(
                    "container runtime did not return logs within {}s",
                    timeout.as_secs()
                ),
            ),
            logs::Error::Unavailable(_) => Self::runtime_unavailable(),
            logs::Error::Runtime(_) => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "runtime_error",
                "failed to fetch container logs",
            ),
        }
    }
}
