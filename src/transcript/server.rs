//! HTTP endpoint serving transcripts held by a [`TranscriptStore`].

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::get;
use tracing::{error, info};
use uuid::Uuid;

use super::store::TranscriptStore;

async fn get_transcript(
    State(store): State<Arc<TranscriptStore>>,
    Path(id): Path<String>,
) -> Result<Html<String>, StatusCode> {
    let id = Uuid::parse_str(&id).map_err(|_| StatusCode::NOT_FOUND)?;
    store.get(&id).map(Html).ok_or(StatusCode::NOT_FOUND)
}

#[must_use]
pub fn transcript_router(store: Arc<TranscriptStore>) -> Router {
    Router::new()
        .route("/transcripts/{id}", get(get_transcript))
        .route("/health", get(|| async { "ok" }))
        .with_state(store)
}

/// Serve transcripts on `bind` until the process exits.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound.
pub async fn start_transcript_server(
    bind: SocketAddr,
    store: Arc<TranscriptStore>,
) -> anyhow::Result<tokio::task::JoinHandle<()>> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(%bind, "Transcript server listening");

    Ok(tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, transcript_router(store)).await {
            error!("Transcript server stopped: {}", e);
        }
    }))
}
