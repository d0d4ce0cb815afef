use std::sync::Arc;

pub mod core;
pub mod error_handler;
mod routes;

use axum::{
    Router,
    routing::{get, post},
};
use tokio::signal;
use tracing::info;

use crate::core::app_state::AppState;
use crate::error_handler::{AppError, AppResult};
use crate::routes::{
    auth::{callback_route::github_callback_route, login_route::github_login_route},
    health_route::health_route,
    webhook::webhook_route::webhook_route,
};

pub async fn start() -> AppResult<()> {
    let host_url =
        std::env::var("API_ADDRESS").map_err(|_| AppError::MissingEnv("API_ADDRESS"))?;

    let state = Arc::new(AppState::from_env()?);

    let app = Router::new()
        .route("/webhook", post(webhook_route))
        .route("/auth/github/login", get(github_login_route))
        .route("/auth/github/callback", get(github_callback_route))
        .route("/test", get(health_route))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&host_url)
        .await
        .map_err(AppError::Bind)?;
    info!("listening on {host_url}");

    // Start server with graceful shutdown on Ctrl+C
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(AppError::Server)?;

    Ok(())
}

/// Returns a future that resolves when Ctrl+C is pressed
async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
    }
}
