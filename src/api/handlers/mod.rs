use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::engine::ReleaseEngine;
use crate::error::EngineError;
use crate::models::*;

// ============================================================
// Error Handling
// ============================================================

const CONFIGURATION_MESSAGE: &str =
    "Invalid server configuration. Check server logs for more information.";

/// Map an engine error to a response.
///
/// Input and range errors are safe to show to the client. Everything else is
/// logged server-side and replaced by a generic message.
fn engine_error(e: EngineError) -> (StatusCode, String) {
    match e {
        EngineError::InvalidInput(msg) => {
            tracing::warn!("Validation error: {}", msg);
            (StatusCode::BAD_REQUEST, msg)
        }
        EngineError::ConfigurationInvalid(msg) => {
            tracing::error!("Configuration error: {}", msg);
            (StatusCode::BAD_REQUEST, CONFIGURATION_MESSAGE.to_string())
        }
        EngineError::RangeNotFound { start } => {
            tracing::warn!(start = %start, "Start release not found");
            (
                StatusCode::BAD_REQUEST,
                "Could not create release filter. Start release could not be found.".to_string(),
            )
        }
        EngineError::RangeUnterminated { start, end } => {
            tracing::warn!(start = %start, end = %end, "End release not found");
            (
                StatusCode::BAD_REQUEST,
                "Could not create release filter. End release could not be found.".to_string(),
            )
        }
        other => {
            tracing::error!("Internal error: {:#}", anyhow::Error::from(other));
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        }
    }
}

// ============================================================
// Health
// ============================================================

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ============================================================
// Releases
// ============================================================

pub async fn upcoming_releases(
    State(engine): State<ReleaseEngine>,
) -> Result<Json<UpcomingReleasesReport>, (StatusCode, String)> {
    engine.upcoming_releases().await.map(Json).map_err(engine_error)
}

pub async fn production_versions(
    State(engine): State<ReleaseEngine>,
) -> Result<Json<Vec<ProjectVersion>>, (StatusCode, String)> {
    engine.production_versions().await.map(Json).map_err(engine_error)
}

pub async fn list_manifests(
    State(engine): State<ReleaseEngine>,
) -> Result<Json<Vec<Manifest>>, (StatusCode, String)> {
    engine.list_manifests().await.map(Json).map_err(engine_error)
}

pub async fn create_release_filter(
    State(engine): State<ReleaseEngine>,
    Json(input): Json<CreateReleaseFilterInput>,
) -> Result<(StatusCode, Json<ReleaseRangeResult>), (StatusCode, String)> {
    engine
        .create_release_filter(&input.start_release_name, &input.end_release_name)
        .await
        .map(|r| (StatusCode::CREATED, Json(r)))
        .map_err(engine_error)
}

// ============================================================
// Stories
// ============================================================

pub async fn stories_for_epic(
    State(engine): State<ReleaseEngine>,
    Path(epic_key): Path<String>,
) -> Result<Json<Vec<Ticket>>, (StatusCode, String)> {
    engine
        .stories_for_epic(&epic_key)
        .await
        .map(Json)
        .map_err(engine_error)
}
