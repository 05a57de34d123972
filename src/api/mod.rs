//! HTTP API module - REST endpoints

mod stories;

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::db::Database;
use crate::generate::{Orchestrator, FALLBACK_IMAGE};
use crate::stories::StoryStore;
pub use stories::{GenerateResponse, StoryForm, StoryView};

/// Fallback illustration served at [`FALLBACK_IMAGE`]
const FALLBACK_SVG: &str = include_str!("../../assets/default_story.svg");

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub stories: StoryStore,
    pub orchestrator: Arc<Orchestrator>,
}

/// Build the API router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/", get(root))
        .route(FALLBACK_IMAGE, get(fallback_image))
        .merge(stories::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Root endpoint
async fn root() -> impl IntoResponse {
    Json(RootResponse {
        name: "storyd",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct RootResponse {
    name: &'static str,
    version: &'static str,
}

/// Static default illustration
async fn fallback_image() -> impl IntoResponse {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "image/svg+xml"),
            (header::CACHE_CONTROL, "public, max-age=86400"),
        ],
        FALLBACK_SVG,
    )
}

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.db.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "healthy",
                database: "ok",
            }),
        ),
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "unhealthy",
                database: "error",
            }),
        ),
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    database: &'static str,
}
