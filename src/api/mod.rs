mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::engine::ReleaseEngine;

pub fn create_router(engine: ReleaseEngine) -> Router {
    let api = Router::new()
        // Releases
        .route("/releases", get(handlers::upcoming_releases))
        .route("/releases/production", get(handlers::production_versions))
        .route("/releases/manifests", get(handlers::list_manifests))
        .route(
            "/releases/create-release-filter",
            post(handlers::create_release_filter),
        )
        // Stories
        .route("/stories/for-epic/{epic_key}", get(handlers::stories_for_epic))
        // Health
        .route("/health", get(handlers::health));

    Router::new()
        .nest("/api/v1", api)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(engine)
}
