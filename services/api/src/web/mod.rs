//! services/api/src/web/mod.rs
//!
//! HTTP layer: shared state, learner middleware, wire types and handlers.

pub mod middleware;
pub mod protocol;
pub mod rest;
pub mod state;

use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

pub use middleware::require_learner;
pub use state::AppState;

/// Request bodies are small JSON documents.
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Builds the API router. Every route requires the `x-user-id` header.
pub fn router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/learners", post(rest::register_learner_handler))
        .route("/progress", get(rest::progress_handler))
        .route("/track", get(rest::track_handler))
        .route("/lessons/{lesson_id}/complete", post(rest::complete_lesson_handler))
        .route("/lessons/{lesson_id}/completion", get(rest::completion_status_handler))
        .route("/lessons/{lesson_id}/next", get(rest::next_lesson_handler))
        .route(
            "/lessons/{lesson_id}/quiz",
            get(rest::lesson_quiz_handler).post(rest::submit_lesson_quiz_handler),
        )
        .route(
            "/quiz",
            get(rest::general_quiz_handler).post(rest::submit_general_quiz_handler),
        )
        .route("/activities", get(rest::activity_feed_handler))
        .route("/study-sessions/scheduled", post(rest::schedule_study_session_handler))
        .layer(axum_middleware::from_fn(require_learner))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(app_state)
}
