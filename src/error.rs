//! Service-level errors.
//!
//! Failures of the submitted program (compile errors, crashes, timeouts) are
//! not errors here; they are [`ExecutionOutcome`](crate::pipeline::ExecutionOutcome)
//! values. This type covers malformed requests and infrastructure faults.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use tracing::error;

use crate::http_server::ExecuteResponse;

/// Message returned to callers for any 5xx fault.
pub const INTERNAL_ERROR_MESSAGE: &str = "An unexpected server error occurred.";

#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Validation(String),

    #[error("Unsupported language.")]
    UnsupportedLanguage(String),

    #[error("workspace i/o: {0}")]
    Workspace(#[from] std::io::Error),

    #[error("container launch failed: {0}")]
    Launch(String),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Validation(_) | Error::UnsupportedLanguage(_) => StatusCode::BAD_REQUEST,
            Error::Workspace(_) | Error::Launch(_) | Error::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = if status.is_server_error() {
            // Internal detail stays in the log.
            error!(error = %self, "request failed with internal fault");
            INTERNAL_ERROR_MESSAGE.to_string()
        } else {
            self.to_string()
        };
        (status, Json(ExecuteResponse::failure(message))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_faults_map_to_bad_request() {
        assert_eq!(
            Error::Validation("missing".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::UnsupportedLanguage("ruby".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn infrastructure_faults_map_to_internal_error() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        assert_eq!(Error::from(io).status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            Error::Launch("daemon unreachable".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn unsupported_language_message_is_generic() {
        assert_eq!(
            Error::UnsupportedLanguage("ruby".into()).to_string(),
            "Unsupported language."
        );
    }
}
