//! HTTP handlers
//!
//! | Path       | Description                                             |
//! |------------|---------------------------------------------------------|
//! | `/`        | Live broadcast (alias `/stream`)                        |
//! | `/replay`  | Private, unpaced replay of the payload from the start   |
//! | `/health`  | Plain-text liveness check                               |
//! | `/stats`   | Broadcast counters as JSON                              |
//!
//! The live body is the raw payload bytes, chunk after chunk, with no
//! framing of our own. A listener that disconnects drops the response body,
//! which drops its [`Subscription`](crate::registry::Subscription) and
//! deregisters it.

use std::convert::Infallible;
use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use futures::StreamExt;

use crate::registry::ConsumerRegistry;
use crate::source::{ChunkSource, FileSource};
use crate::stats::StatsSnapshot;

use super::config::{ServerConfig, FALLBACK_CONTENT_TYPE};

/// Shared state passed to all request handlers
#[derive(Clone)]
pub(crate) struct AppState {
    registry: Arc<ConsumerRegistry>,
    content_type: HeaderValue,
    payload: Arc<PathBuf>,
    chunk_size: usize,
}

impl AppState {
    pub(crate) fn new(config: &ServerConfig, registry: Arc<ConsumerRegistry>) -> Self {
        let content_type = HeaderValue::from_str(&config.resolved_content_type()).unwrap_or_else(|_| {
            tracing::warn!(
                content_type = ?config.content_type,
                "Invalid content type, using {}",
                FALLBACK_CONTENT_TYPE
            );
            HeaderValue::from_static(FALLBACK_CONTENT_TYPE)
        });

        Self {
            registry,
            content_type,
            payload: Arc::new(config.payload.clone()),
            chunk_size: config.chunk_size,
        }
    }
}

pub(crate) fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handle_stream))
        .route("/stream", get(handle_stream))
        .route("/replay", get(handle_replay))
        .route("/health", get(handle_health))
        .route("/stats", get(handle_stats))
        .with_state(state)
}

fn stream_headers(state: &AppState) -> [(axum::http::HeaderName, HeaderValue); 2] {
    [
        (CONTENT_TYPE, state.content_type.clone()),
        (CACHE_CONTROL, HeaderValue::from_static("no-cache")),
    ]
}

/// Joins the live broadcast
async fn handle_stream(State(state): State<AppState>) -> Response {
    let subscription = state.registry.register();
    tracing::debug!(consumer = %subscription.id(), "Listener connected");

    let body = Body::from_stream(subscription.map(|chunk| Ok::<_, Infallible>(chunk.data)));
    (stream_headers(&state), body).into_response()
}

/// Streams the payload from the beginning to this listener only
async fn handle_replay(State(state): State<AppState>) -> Response {
    let source = match FileSource::open(state.payload.as_path(), state.chunk_size).await {
        Ok(source) => source,
        Err(e) => {
            tracing::warn!(error = %e, "Replay unavailable");
            return (StatusCode::INTERNAL_SERVER_ERROR, "payload unavailable").into_response();
        }
    };

    // Ends on the first read error or once the server shuts down
    let chunks = futures::stream::unfold(
        (source, Arc::clone(&state.registry)),
        |(mut source, registry)| async move {
            if registry.is_closed() {
                return None;
            }
            match source.next_chunk().await {
                Ok(chunk) => Some((Ok::<_, Infallible>(chunk.data), (source, registry))),
                Err(e) => {
                    tracing::debug!(error = %e, "Replay ended");
                    None
                }
            }
        },
    );

    (stream_headers(&state), Body::from_stream(chunks)).into_response()
}

async fn handle_health() -> &'static str {
    "OK"
}

async fn handle_stats(State(state): State<AppState>) -> Json<StatsSnapshot> {
    Json(state.registry.stats().snapshot(state.registry.len()))
}
