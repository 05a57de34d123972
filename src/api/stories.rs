//! Story API endpoints
//!
//! POST /generate      - Write, illustrate, and save a story from a form
//! GET  /stories       - Most recent stories
//! GET  /stories/{id}  - A saved story

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::error;

use super::{AppState, ErrorResponse};
use crate::generate::{Failure, GenerationError, Outcome, StoryRun, Warning};
use crate::stories::{GeneratedStory, GenerationRequest, StoryGenre};

const DEFAULT_RECENT_LIMIT: u32 = 20;
const MAX_RECENT_LIMIT: u32 = 100;

/// Build story router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/generate", post(generate))
        .route("/stories", get(recent))
        .route("/stories/{id}", get(get_story))
}

/// Story form fields. Missing fields deserialize as empty strings.
#[derive(Debug, Deserialize)]
pub struct StoryForm {
    #[serde(default)]
    pub child_name: String,
    #[serde(default)]
    pub child_age: String,
    #[serde(default)]
    pub story_type: String,
}

/// Story as returned to the client by every story route
#[derive(Debug, Serialize)]
pub struct StoryView {
    pub id: String,
    pub child_name: String,
    pub child_age: u32,
    pub story_type: StoryGenre,
    pub content: String,
    pub image_url: String,
    pub created_at: String,
}

impl From<GeneratedStory> for StoryView {
    fn from(story: GeneratedStory) -> Self {
        Self {
            id: story.id,
            child_name: story.child_name,
            child_age: story.child_age,
            story_type: story.genre,
            content: story.content,
            image_url: story.image_reference,
            created_at: story.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WarningView {
    pub kind: &'static str,
    pub message: &'static str,
}

impl From<&Warning> for WarningView {
    fn from(warning: &Warning) -> Self {
        Self {
            kind: warning.kind(),
            message: warning.message(),
        }
    }
}

/// Response to a story form submission
#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub status: &'static str,
    pub message: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<WarningView>,
    pub story: StoryView,
    /// Illustration came from the cache
    pub image_cached: bool,
    pub attempts_used: u32,
    /// Story reached storage
    pub saved: bool,
}

impl GenerateResponse {
    fn new(status: &'static str, message: &'static str, run: StoryRun) -> Self {
        Self {
            status,
            message,
            warnings: Vec::new(),
            image_cached: run.illustration.cached,
            attempts_used: run.story.attempts_used,
            saved: run.saved,
            story: run.record.into(),
        }
    }
}

/// Failure response for form submissions
#[derive(Debug, Serialize)]
pub struct GenerateError {
    pub status: &'static str,
    pub message: String,
}

impl GenerateError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            status: "error",
            message: message.into(),
        }
    }
}

/// Generate a story from a form submission
async fn generate(
    State(state): State<AppState>,
    Form(form): Form<StoryForm>,
) -> impl IntoResponse {
    let request =
        match GenerationRequest::from_form(&form.child_name, &form.child_age, &form.story_type) {
            Ok(request) => request,
            Err(e) => {
                return (StatusCode::BAD_REQUEST, Json(GenerateError::new(e.to_string())))
                    .into_response()
            }
        };

    match state.orchestrator.run(request).await {
        Outcome::Success(run) => (
            StatusCode::CREATED,
            Json(GenerateResponse::new("success", "Your story is ready!", run)),
        )
            .into_response(),
        Outcome::Degraded { run, warnings } => {
            let mut response =
                GenerateResponse::new("warning", "Your story is ready, with some problems", run);
            response.warnings = warnings.iter().map(WarningView::from).collect();
            (StatusCode::CREATED, Json(response)).into_response()
        }
        Outcome::Failed(failure) => {
            let status = match &failure {
                Failure::Rejected => StatusCode::UNPROCESSABLE_ENTITY,
                Failure::Generation(GenerationError::Configuration(_)) => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                Failure::Generation(_) => StatusCode::BAD_GATEWAY,
            };
            (status, Json(GenerateError::new(failure.message()))).into_response()
        }
    }
}

/// Recent stories query
#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    pub limit: Option<u32>,
}

/// List the most recent stories
async fn recent(
    State(state): State<AppState>,
    Query(query): Query<RecentQuery>,
) -> impl IntoResponse {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_RECENT_LIMIT)
        .clamp(1, MAX_RECENT_LIMIT);

    match state.stories.recent(limit).await {
        Ok(stories) => {
            let views: Vec<StoryView> = stories.into_iter().map(StoryView::from).collect();
            (StatusCode::OK, Json(views)).into_response()
        }
        Err(e) => {
            error!("Failed to list stories: {}", e);
            internal_error()
        }
    }
}

/// Fetch a saved story
async fn get_story(Path(id): Path<String>, State(state): State<AppState>) -> impl IntoResponse {
    match state.stories.get(&id).await {
        Ok(Some(story)) => (StatusCode::OK, Json(StoryView::from(story))).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "story not found".to_string(),
            }),
        )
            .into_response(),
        Err(e) => {
            error!("Failed to load story {}: {}", id, e);
            internal_error()
        }
    }
}

fn internal_error() -> axum::response::Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: "internal error".to_string(),
        }),
    )
        .into_response()
}
