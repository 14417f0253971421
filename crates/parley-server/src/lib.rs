//! Parley server library logic.

pub mod api;
pub mod config;

use axum::{
    extract::DefaultBodyLimit,
    http::Method,
    routing::{get, post},
    Extension, Router,
};
use config::Config;
use parley_voice::CredentialIssuer;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Maximum request body size (16 KiB). Token requests carry one short field.
const MAX_REQUEST_BODY_BYTES: usize = 16 * 1024;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Signs room credentials. Stateless, shared by every request.
    pub issuer: Arc<CredentialIssuer>,
}

impl AppState {
    pub fn new(issuer: CredentialIssuer) -> Self {
        Self {
            issuer: Arc::new(issuer),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        if !config.livekit.has_signing_keys() {
            tracing::warn!("LiveKit API key or secret not set; POST /token will fail");
        }
        Self::new(
            CredentialIssuer::new(config.livekit.clone())
                .with_agent_dispatch(config.agent_dispatch.clone()),
        )
    }
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(api::health_handler))
        .route("/token", post(api::token_handler))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers(Any),
        )
        .layer(Extension(Arc::new(state)))
}
