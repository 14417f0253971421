//! API handlers for the Parley server.

use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, Extension, Json},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use parley_voice::VoiceError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;

/// Reported by `GET /health`.
pub const SERVICE_NAME: &str = "voice-ai-backend";

/// Request body for `POST /token`.
#[derive(Debug, Default, Deserialize)]
pub struct TokenRequest {
    /// Caller identity. Generated when absent, null, or empty.
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Response body for `POST /token`.
///
/// `room_name` and `expires_in` are only returned when the token does not
/// carry an agent dispatch directive.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_name: Option<String>,
    pub server_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
}

/// API error type mapping to HTTP status codes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid input: {0}")]
    BadRequest(String),
    #[error("internal server error: {0}")]
    InternalServerError(String),
}

impl From<VoiceError> for ApiError {
    fn from(err: VoiceError) -> Self {
        if err.is_client_error() {
            ApiError::BadRequest(err.to_string())
        } else {
            tracing::error!(error = %err, "failed to issue room credential");
            ApiError::InternalServerError(err.to_string())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::InternalServerError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

/// Handler for `POST /token`.
pub async fn token_handler(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<TokenRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let credential = state.issuer.issue(request.user_id)?;

    tracing::info!(
        identity = %credential.identity.as_str(),
        room = %credential.room_name,
        agent_dispatched = credential.agent_dispatched,
        "token request served"
    );

    let (room_name, expires_in) = if credential.agent_dispatched {
        (None, None)
    } else {
        (
            Some(credential.room_name.to_string()),
            Some(credential.ttl.as_secs()),
        )
    };

    Ok(Json(TokenResponse {
        token: credential.token,
        room_name,
        server_url: credential.server_url,
        expires_in,
    }))
}

/// Handler for `GET /health`.
///
/// Always `200 OK`; the timestamp is fractional seconds since the Unix epoch.
pub async fn health_handler() -> Json<Value> {
    let now = chrono::Utc::now();
    let timestamp = now.timestamp() as f64 + f64::from(now.timestamp_subsec_micros()) / 1_000_000.0;

    Json(json!({
        "status": "healthy",
        "timestamp": timestamp,
        "service": SERVICE_NAME,
    }))
}
