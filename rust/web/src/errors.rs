//! Error-to-HTTP mapping. Every typed error in the crate renders as the
//! wire format `{"detail": <reason>}` with a status from the taxonomy:
//! 400 for rejected inputs, 404 for unknown resources, 409 for operations
//! on ended sessions, 500 for internal failures.

use serde::{Deserialize, Serialize};
use std::fmt;
use warp::http::StatusCode;
use warp::reply::{self, Response};
use warp::Reply;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub detail: String,
}

impl ErrorBody {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }

    pub fn into_response(self, status: StatusCode) -> Response {
        reply::with_status(reply::json(&self), status).into_response()
    }
}

impl fmt::Display for ErrorBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.detail)
    }
}

/// Error classification for logging levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Client errors (4xx) - expected, normal operation
    Client,
    /// Server errors (5xx) - unexpected, needs investigation
    Server,
}

/// Converts typed errors to HTTP responses with severity-aware logging.
pub trait IntoErrorResponse {
    fn status_code(&self) -> StatusCode;

    fn detail(&self) -> String;

    fn severity(&self) -> ErrorSeverity {
        if self.status_code().is_server_error() {
            ErrorSeverity::Server
        } else {
            ErrorSeverity::Client
        }
    }

    fn into_http_response(self) -> Response
    where
        Self: Sized,
    {
        let status = self.status_code();
        let body = ErrorBody::new(self.detail());
        match self.severity() {
            ErrorSeverity::Client => {
                tracing::debug!(status = %status, detail = %body.detail, "request rejected");
            }
            ErrorSeverity::Server => {
                tracing::error!(status = %status, detail = %body.detail, "request failed");
            }
        }
        body.into_response(status)
    }
}
