//! Router assembly and HTTP listener.

use std::sync::Arc;

use {
    anyhow::{Context, Result},
    axum::Router,
    tower_http::cors::CorsLayer,
    tracing::info,
};

use {
    charla_assistant::AssistantDriver, charla_config::ServerConfig, charla_sessions::SessionManager,
};

use crate::routes;

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
    pub assistant: Arc<AssistantDriver>,
}

/// Assemble the full API router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/session", routes::session_router())
        .nest("/api/assistant", routes::assistant_router())
        .nest("/api/admin", routes::admin_router())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind the configured listener and serve until the process exits.
pub async fn serve(config: &ServerConfig, state: AppState) -> Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(addr, "charla gateway listening");
    axum::serve(listener, build_router(state))
        .await
        .context("serving HTTP")
}
