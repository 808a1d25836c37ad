//! HTTP chat endpoint using Axum.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{Method, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use showroom_rag_core::{ChatError, ChatPipeline, SearchError};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

const NO_INDEX_MESSAGE: &str = "The knowledge base is not ready yet. Please try again later.";

/// Shared state for the chat server.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<ChatPipeline>,
    /// Where `/admin/reload` reads the persisted index from.
    pub index_dir: PathBuf,
    /// Chat widget page and script, served for every other GET path.
    pub static_dir: PathBuf,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    message: String,
    #[serde(default)]
    session_id: Option<String>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_origin(Any)
        .allow_headers(Any);

    let widget = ServeDir::new(&state.static_dir);

    Router::new()
        .route("/chat", post(chat))
        .route("/api/chat", post(chat))
        .route("/health", get(health))
        .route("/admin/reload", post(reload_index))
        .fallback_service(widget)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn chat(
    State(state): State<AppState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> (StatusCode, Json<Value>) {
    let body = match body {
        Ok(Json(body)) => body,
        Err(rejection) => {
            warn!(status = %rejection.status(), "rejected chat request body");
            return (
                rejection.status(),
                Json(json!({ "error": format!("Error: {}", rejection.body_text()) })),
            );
        }
    };

    let started = Instant::now();
    let session_id = body
        .session_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    match state.pipeline.handle(&session_id, &body.message).await {
        Ok(reply) => {
            let elapsed = started.elapsed().as_secs_f64();
            info!(session = %session_id, elapsed_secs = elapsed, "chat request served");
            (
                StatusCode::OK,
                Json(json!({
                    "response": reply.text(),
                    "processing_time": format!("{elapsed:.2}s"),
                    "session_id": session_id,
                })),
            )
        }
        Err(error) => {
            warn!(session = %session_id, %error, "chat request failed");
            let (status, message) = match error {
                ChatError::Validation(message) => (StatusCode::BAD_REQUEST, message.to_string()),
                ChatError::NoIndex => (StatusCode::SERVICE_UNAVAILABLE, NO_INDEX_MESSAGE.to_string()),
                other => (StatusCode::BAD_GATEWAY, format!("Error: {other}")),
            };
            (status, Json(json!({ "error": message })))
        }
    }
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    let summary = state.pipeline.index_summary().await;
    let mut body = json!({
        "status": "ok",
        "index_loaded": summary.is_some(),
        "chunks": summary.as_ref().map_or(0, |summary| summary.chunks),
        "sessions": state.pipeline.sessions().session_count(),
    });
    if let Some(summary) = summary {
        body["embedder"] = json!(summary.embedder);
        body["dimensions"] = json!(summary.dimensions);
        body["built_at"] = json!(summary.built_at.to_rfc3339());
    }
    Json(body)
}

async fn reload_index(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match state.pipeline.reload(&state.index_dir).await {
        Ok(chunks) => {
            info!(chunks, "vector index reloaded");
            (StatusCode::OK, Json(json!({ "status": "reloaded", "chunks": chunks })))
        }
        Err(SearchError::NoIndex(dir)) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": format!("no index found at {dir}") })),
        ),
        Err(error @ SearchError::EmbedderMismatch { .. }) => {
            warn!(%error, "refusing to load index");
            (StatusCode::CONFLICT, Json(json!({ "error": error.to_string() })))
        }
        Err(error) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": format!("Error: {error}") })),
        ),
    }
}

pub async fn serve(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "chat server listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(%error, "could not listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
