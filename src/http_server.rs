//! HTTP server implementation using Axum.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::{Error, Result};
use crate::pipeline::ExecutionOutcome;
use crate::state::AppState;

const MISSING_FIELDS: &str = "Language and code are required.";

/// Body of `POST /execute`. Fields are optional so that a missing one is a
/// 400 with our message rather than an extractor rejection.
#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    pub language: Option<String>,
    pub code: Option<String>,
    #[serde(default)]
    pub stdin: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecuteResponse {
    pub fn succeeded(output: String) -> Self {
        Self {
            success: true,
            output: Some(output),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: None,
            error: Some(error.into()),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/execute", post(execute))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve on `addr` until the listener fails.
pub async fn run_server(addr: SocketAddr, state: AppState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Code execution service listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(state)).await
}

async fn health() -> &'static str {
    "OK"
}

async fn execute(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ExecuteRequest>, JsonRejection>,
) -> Result<Json<ExecuteResponse>> {
    let Json(req) = payload.map_err(|e| {
        Error::Validation(format!("Invalid request body: {}", e.body_text()))
    })?;

    let (language, code) = match (req.language.as_deref(), req.code.as_deref()) {
        (Some(language), Some(code)) if !language.is_empty() && !code.is_empty() => {
            (language, code)
        }
        _ => return Err(Error::Validation(MISSING_FIELDS.to_string())),
    };

    // Registry first: an unknown language never touches the filesystem.
    let toolchain = state.registry.resolve(language)?;
    info!(language = %toolchain.language, code_len = code.len(), "POST /execute");

    let stdin = req.stdin.as_deref().unwrap_or("");
    let outcome = state.pipeline.execute(toolchain, code, stdin).await?;

    match outcome {
        ExecutionOutcome::Success { output } => Ok(Json(ExecuteResponse::succeeded(output))),
        ExecutionOutcome::LaunchFailure { message } => Err(Error::Launch(message)),
        failure => Ok(Json(ExecuteResponse::failure(
            failure.error_message().unwrap_or_default(),
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_response_omits_error() {
        let json = serde_json::to_value(ExecuteResponse::succeeded("hi\n".into())).unwrap();
        assert_eq!(json, serde_json::json!({ "success": true, "output": "hi\n" }));
    }

    #[test]
    fn failure_response_omits_output() {
        let json = serde_json::to_value(ExecuteResponse::failure("boom")).unwrap();
        assert_eq!(json, serde_json::json!({ "success": false, "error": "boom" }));
    }

    #[test]
    fn stdin_defaults_to_none() {
        let req: ExecuteRequest =
            serde_json::from_str(r#"{"language":"python","code":"print(1)"}"#).unwrap();
        assert_eq!(req.stdin, None);
        assert_eq!(req.language.as_deref(), Some("python"));
    }
}
