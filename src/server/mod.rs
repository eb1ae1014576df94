//! HTTP/WebSocket surface
//!
//! Thin I/O plumbing over the store and pipeline: status, file and
//! cluster listings, the event log, semantic search and a live event
//! stream. Nothing here participates in the engine's consistency logic.

mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use crate::core::error::{EngineError, Result};
use crate::pipeline::Pipeline;

/// Shared state handed to every route
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
}

/// Build the API router
pub fn build_router(pipeline: Arc<Pipeline>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/status", get(routes::status))
        .route("/api/files", get(routes::list_files))
        .route("/api/files/:id", get(routes::get_file))
        .route("/api/clusters", get(routes::list_clusters))
        .route("/api/events", get(routes::list_events))
        .route("/api/search", get(routes::search))
        .route("/api/rescan", post(routes::rescan))
        .route("/ws", get(routes::websocket))
        .layer(cors)
        .with_state(AppState { pipeline })
}

/// Bind and serve until the process exits
pub async fn serve(pipeline: Arc<Pipeline>, host: &str, port: u16) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .map_err(|e| EngineError::Internal(format!("Invalid server address: {}", e)))?;

    let router = build_router(pipeline);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("API server listening on {}", addr);

    axum::serve(listener, router)
        .await
        .map_err(|e| EngineError::Internal(format!("Server error: {}", e)))?;
    Ok(())
}
