//! API route handlers

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::core::types::{cosine_similarity, normalize_dim, ClusterRecord, FileRecord};

use super::AppState;

/// File view without the raw embedding blob
#[derive(Serialize)]
pub struct FileView {
    id: i64,
    filename: String,
    original_path: String,
    current_path: String,
    cluster_id: i64,
    summary: String,
    file_type: String,
    size_bytes: u64,
    word_count: u64,
    layout_x: f32,
    layout_y: f32,
    created_at: String,
    modified_at: String,
}

impl From<&FileRecord> for FileView {
    fn from(f: &FileRecord) -> Self {
        Self {
            id: f.id,
            filename: f.filename.clone(),
            original_path: f.original_path.display().to_string(),
            current_path: f.current_path.display().to_string(),
            cluster_id: f.cluster_id,
            summary: f.summary.clone(),
            file_type: f.file_type.clone(),
            size_bytes: f.size_bytes,
            word_count: f.word_count,
            layout_x: f.layout_x,
            layout_y: f.layout_y,
            created_at: f.created_at.to_rfc3339(),
            modified_at: f.modified_at.to_rfc3339(),
        }
    }
}

#[derive(Serialize)]
pub struct ClusterView {
    id: i64,
    name: String,
    description: String,
    folder_path: String,
    file_count: i64,
    created_at: String,
}

impl From<&ClusterRecord> for ClusterView {
    fn from(c: &ClusterRecord) -> Self {
        Self {
            id: c.id,
            name: c.name.clone(),
            description: c.description.clone(),
            folder_path: c.folder_path.display().to_string(),
            file_count: c.file_count,
            created_at: c.created_at.to_rfc3339(),
        }
    }
}

fn internal_error(e: impl std::fmt::Display) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": e.to_string() })),
    )
        .into_response()
}

pub async fn status(State(state): State<AppState>) -> Response {
    let store = state.pipeline.store();
    let files = match store.get_all_files().await {
        Ok(files) => files,
        Err(e) => return internal_error(e),
    };
    let clusters = match store.get_all_clusters().await {
        Ok(clusters) => clusters,
        Err(e) => return internal_error(e),
    };

    Json(json!({
        "file_count": files.len(),
        "cluster_count": clusters.len(),
        "status": "running",
    }))
    .into_response()
}

pub async fn list_files(State(state): State<AppState>) -> Response {
    match state.pipeline.store().get_all_files().await {
        Ok(files) => Json(files.iter().map(FileView::from).collect::<Vec<_>>()).into_response(),
        Err(e) => internal_error(e),
    }
}

pub async fn get_file(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match state.pipeline.store().get_file_by_id(id).await {
        Ok(Some(file)) => Json(FileView::from(&file)).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "File not found" })),
        )
            .into_response(),
        Err(e) => internal_error(e),
    }
}

pub async fn list_clusters(State(state): State<AppState>) -> Response {
    match state.pipeline.store().get_all_clusters().await {
        Ok(clusters) => {
            Json(clusters.iter().map(ClusterView::from).collect::<Vec<_>>()).into_response()
        }
        Err(e) => internal_error(e),
    }
}

#[derive(Deserialize)]
pub struct EventsParams {
    #[serde(default = "default_limit")]
    limit: i64,
}

fn default_limit() -> i64 {
    50
}

pub async fn list_events(
    State(state): State<AppState>,
    Query(params): Query<EventsParams>,
) -> Response {
    match state.pipeline.store().recent_events(params.limit).await {
        Ok(events) => Json(events).into_response(),
        Err(e) => internal_error(e),
    }
}

#[derive(Deserialize)]
pub struct SearchParams {
    q: String,
    #[serde(default = "default_search_limit")]
    limit: usize,
}

fn default_search_limit() -> usize {
    10
}

#[derive(Serialize)]
pub struct SearchHit {
    file_id: i64,
    filename: String,
    summary: String,
    cluster_id: i64,
    current_path: String,
    score: f32,
}

/// Semantic search: rank stored embeddings by cosine similarity to the
/// query, normalizing dimensions where providers have changed.
pub async fn search(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Response {
    let query = params.q.trim();
    if query.is_empty() {
        return Json(Vec::<SearchHit>::new()).into_response();
    }

    let files = match state.pipeline.store().get_all_files().await {
        Ok(files) => files,
        Err(e) => return internal_error(e),
    };

    let Some(target_dim) = files
        .iter()
        .find(|f| f.has_embedding())
        .map(|f| f.embedding.len())
    else {
        return Json(Vec::<SearchHit>::new()).into_response();
    };

    let query_emb = state
        .pipeline
        .embedder()
        .embed_matching_dim(query, target_dim)
        .await;

    let mut hits: Vec<SearchHit> = files
        .iter()
        .filter(|f| f.has_embedding())
        .map(|f| {
            let emb = normalize_dim(&f.embedding, target_dim);
            SearchHit {
                file_id: f.id,
                filename: f.filename.clone(),
                summary: f.summary.clone(),
                cluster_id: f.cluster_id,
                current_path: f.current_path.display().to_string(),
                score: cosine_similarity(&query_emb, &emb),
            }
        })
        .collect();

    hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    hits.truncate(params.limit);
    Json(hits).into_response()
}

pub async fn rescan(State(state): State<AppState>) -> Response {
    let pipeline = state.pipeline.clone();
    tokio::spawn(async move {
        if let Err(e) = pipeline.full_scan().await {
            tracing::error!("Rescan failed: {}", e);
        }
    });
    Json(json!({ "message": "Scan started" })).into_response()
}

/// Upgrade to a WebSocket that forwards engine events as JSON
pub async fn websocket(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| stream_events(socket, state))
}

async fn stream_events(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = state.pipeline.events().subscribe();
    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(event) => {
                        let Ok(text) = serde_json::to_string(&event) else { continue };
                        if sender.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    // A lagging subscriber drops old events and goes on
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        if text.contains("\"ping\"") {
                            let _ = sender
                                .send(Message::Text("{\"type\":\"pong\"}".to_string()))
                                .await;
                        }
                    }
                    Some(Ok(_)) => {}
                    _ => break,
                }
            }
        }
    }
}
