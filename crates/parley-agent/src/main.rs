//! Parley agent binary.
//!
//! Hosts an [`AgentWorker`] behind the WebSocket media bridge. Each bridge
//! connection is one participant joining a room; the worker runs one agent
//! session per room until the participant leaves or the process shuts down.

use parley_agent::bridge::{router, BridgeState};
use parley_agent::{AgentSettings, AgentWorker};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

fn resolve_settings_path() -> (Option<String>, &'static str) {
    if let Some(path) = std::env::args()
        .nth(1)
        .filter(|value| !value.trim().is_empty())
    {
        return (Some(path), "cli-arg");
    }

    if let Ok(path) = std::env::var("PARLEY_AGENT_CONFIG_PATH") {
        if !path.trim().is_empty() {
            return (Some(path), "env-var");
        }
    }

    (None, "default")
}

#[tokio::main]
async fn main() {
    // A missing .env is normal outside development.
    let dotenv = dotenvy::dotenv();

    let (resolved_path, source) = resolve_settings_path();
    let selected_path = resolved_path.as_deref().or(Some("agent.toml"));

    let settings = AgentSettings::load(selected_path).expect("failed to load agent settings");

    let filter =
        EnvFilter::try_new(&settings.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));
    if settings.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    if let Ok(path) = dotenv {
        tracing::debug!(path = %path.display(), "loaded environment file");
    }
    tracing::info!(
        source,
        path = selected_path.unwrap_or("<none>"),
        "resolved agent settings path"
    );
    if settings.pipeline.api_key.is_empty() {
        tracing::warn!("GROQ_API_KEY is not set; agent sessions will fail to start");
    }
    tracing::info!(
        discipline = ?settings.discipline,
        base_url = %settings.pipeline.base_url,
        "agent pipeline configured"
    );

    let bridge = settings.bridge.clone();
    let worker = AgentWorker::from_settings(settings);
    let app = router(BridgeState::new(worker.clone(), bridge.sample_rate));
    let addr = SocketAddr::new(bridge.host, bridge.port);

    tracing::info!(%addr, "starting parley agent bridge");

    let listener = TcpListener::bind(addr)
        .await
        .expect("failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            worker.shutdown();
        })
        .await
        .expect("agent bridge error");

    tracing::info!("parley agent shut down");
}

/// Waits for a SIGINT (Ctrl+C) or SIGTERM signal for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { tracing::info!("received SIGINT, initiating graceful shutdown"); }
        () = terminate => { tracing::info!("received SIGTERM, initiating graceful shutdown"); }
    }
}
