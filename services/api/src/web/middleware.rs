//! services/api/src/web/middleware.rs
//!
//! Learner identification for the protected routes.

use axum::{
    extract::Request,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;
use uuid::Uuid;

pub const LEARNER_HEADER: &str = "x-user-id";

/// The authenticated learner, inserted into the request extensions by `require_learner`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LearnerId(pub Uuid);

/// Reads the learner id from the `x-user-id` header.
pub fn parse_learner_id(headers: &HeaderMap) -> Result<Uuid, (StatusCode, String)> {
    let raw = headers
        .get(LEARNER_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                "x-user-id header is required".to_string(),
            )
        })?;

    Uuid::parse_str(raw.trim()).map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            "Invalid x-user-id format".to_string(),
        )
    })
}

/// Middleware that resolves the learner from the request headers.
///
/// If valid, inserts a `LearnerId` into request extensions for handlers to use.
/// If invalid or missing, returns 400 Bad Request.
pub async fn require_learner(mut req: Request, next: Next) -> Response {
    match parse_learner_id(req.headers()) {
        Ok(learner_id) => {
            req.extensions_mut().insert(LearnerId(learner_id));
            next.run(req).await
        }
        Err(rejection) => {
            debug!("Rejected request to {}: {}", req.uri().path(), rejection.1);
            rejection.into_response()
        }
    }
}
