//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.
//!
//! Every handler sits behind `require_learner`, so the caller's id arrives as a
//! `LearnerId` extension.

use crate::error::{json_rejection_response, port_error_response};
use crate::web::middleware::LearnerId;
use crate::web::protocol::{
    ActivityFeedResponse, ActivityQuery, ActivityResponse, CompletionStatusResponse,
    LessonCompletionResponse, LessonResponse, LevelProgressResponse, NextLessonResponse,
    ProgressResponse, QuestionFeedbackResponse, QuizOptionResponse, QuizQuestionResponse,
    QuizQuestionsResponse, QuizResultResponse, QuizSubmission, ScheduleStudySessionRequest,
    TrackLessonResponse, TrackResponse,
};
use crate::web::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::Json,
    Extension,
};
use std::sync::Arc;
use tracing::info;
use utoipa::OpenApi;
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        register_learner_handler,
        progress_handler,
        track_handler,
        complete_lesson_handler,
        completion_status_handler,
        next_lesson_handler,
        lesson_quiz_handler,
        submit_lesson_quiz_handler,
        general_quiz_handler,
        submit_general_quiz_handler,
        activity_feed_handler,
        schedule_study_session_handler,
    ),
    components(
        schemas(
            ProgressResponse,
            LevelProgressResponse,
            LessonResponse,
            LessonCompletionResponse,
            CompletionStatusResponse,
            NextLessonResponse,
            TrackResponse,
            TrackLessonResponse,
            QuizOptionResponse,
            QuizQuestionResponse,
            QuizQuestionsResponse,
            QuizSubmission,
            QuestionFeedbackResponse,
            QuizResultResponse,
            ActivityResponse,
            ActivityFeedResponse,
            ScheduleStudySessionRequest,
        )
    ),
    tags(
        (name = "Learning Progress API", description = "XP, levels, streaks, quizzes and activity for learners.")
    )
)]
pub struct ApiDoc;

type HandlerResult<T> = Result<Json<T>, (StatusCode, String)>;

//=========================================================================================
// Learner Progress
//=========================================================================================

/// Register the learner's progress record.
///
/// The first call records an `account_created` activity. Repeated calls are no-ops.
#[utoipa::path(
    post,
    path = "/learners",
    responses(
        (status = 200, description = "Progress record exists", body = ProgressResponse),
        (status = 400, description = "Missing or invalid x-user-id header"),
        (status = 404, description = "Unknown learner")
    ),
    params(("x-user-id" = Uuid, Header, description = "The unique ID of the learner."))
)]
pub async fn register_learner_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(LearnerId(learner_id)): Extension<LearnerId>,
) -> HandlerResult<ProgressResponse> {
    let summary = app_state
        .engine
        .register_learner(learner_id)
        .await
        .map_err(port_error_response)?;
    Ok(Json(summary.into()))
}

/// Get the learner's XP, level, streak and progress towards the next level.
#[utoipa::path(
    get,
    path = "/progress",
    responses(
        (status = 200, description = "Progress summary", body = ProgressResponse),
        (status = 400, description = "Missing or invalid x-user-id header"),
        (status = 404, description = "Unknown learner")
    ),
    params(("x-user-id" = Uuid, Header, description = "The unique ID of the learner."))
)]
pub async fn progress_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(LearnerId(learner_id)): Extension<LearnerId>,
) -> HandlerResult<ProgressResponse> {
    let summary = app_state
        .engine
        .progress_summary(learner_id)
        .await
        .map_err(port_error_response)?;
    Ok(Json(summary.into()))
}

/// Get the lessons of the learner's pathway and tier with completion flags.
#[utoipa::path(
    get,
    path = "/track",
    responses(
        (status = 200, description = "Track overview", body = TrackResponse),
        (status = 404, description = "Unknown learner")
    ),
    params(("x-user-id" = Uuid, Header, description = "The unique ID of the learner."))
)]
pub async fn track_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(LearnerId(learner_id)): Extension<LearnerId>,
) -> HandlerResult<TrackResponse> {
    let overview = app_state
        .engine
        .track_overview(learner_id)
        .await
        .map_err(port_error_response)?;
    Ok(Json(overview.into()))
}

//=========================================================================================
// Lessons
//=========================================================================================

/// Mark a lesson as completed. Completing the same lesson again changes nothing.
#[utoipa::path(
    post,
    path = "/lessons/{lesson_id}/complete",
    responses(
        (status = 200, description = "Completion result", body = LessonCompletionResponse),
        (status = 404, description = "Unknown lesson or learner")
    ),
    params(
        ("lesson_id" = Uuid, Path, description = "The lesson to complete."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the learner.")
    )
)]
pub async fn complete_lesson_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(LearnerId(learner_id)): Extension<LearnerId>,
    Path(lesson_id): Path<Uuid>,
) -> HandlerResult<LessonCompletionResponse> {
    let completion = app_state
        .engine
        .complete_lesson(learner_id, lesson_id)
        .await
        .map_err(port_error_response)?;
    if completion.completed {
        info!(
            "Learner {} completed lesson {} (+{} XP)",
            learner_id, lesson_id, completion.xp_earned
        );
    }
    Ok(Json(completion.into()))
}

/// Check whether the learner has completed a lesson.
#[utoipa::path(
    get,
    path = "/lessons/{lesson_id}/completion",
    responses(
        (status = 200, description = "Completion status", body = CompletionStatusResponse),
        (status = 404, description = "Unknown lesson")
    ),
    params(
        ("lesson_id" = Uuid, Path, description = "The lesson to check."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the learner.")
    )
)]
pub async fn completion_status_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(LearnerId(learner_id)): Extension<LearnerId>,
    Path(lesson_id): Path<Uuid>,
) -> HandlerResult<CompletionStatusResponse> {
    let completed = app_state
        .engine
        .check_completion(learner_id, lesson_id)
        .await
        .map_err(port_error_response)?;
    Ok(Json(CompletionStatusResponse { lesson_id, completed }))
}

/// Get the lesson unlocked by completing this one, if any.
#[utoipa::path(
    get,
    path = "/lessons/{lesson_id}/next",
    responses(
        (status = 200, description = "The next lesson of the track, or null at the end", body = NextLessonResponse),
        (status = 404, description = "Unknown lesson")
    ),
    params(
        ("lesson_id" = Uuid, Path, description = "The lesson just completed."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the learner.")
    )
)]
pub async fn next_lesson_handler(
    State(app_state): State<Arc<AppState>>,
    Path(lesson_id): Path<Uuid>,
) -> HandlerResult<NextLessonResponse> {
    let next = app_state
        .engine
        .next_lesson(lesson_id)
        .await
        .map_err(port_error_response)?;
    Ok(Json(NextLessonResponse {
        next_lesson: next.map(LessonResponse::from),
    }))
}

//=========================================================================================
// Quizzes
//=========================================================================================

/// Get the questions of a lesson quiz, without the answer key.
#[utoipa::path(
    get,
    path = "/lessons/{lesson_id}/quiz",
    responses(
        (status = 200, description = "Quiz questions", body = QuizQuestionsResponse),
        (status = 404, description = "Unknown lesson or lesson without a quiz")
    ),
    params(
        ("lesson_id" = Uuid, Path, description = "The lesson whose quiz to fetch."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the learner.")
    )
)]
pub async fn lesson_quiz_handler(
    State(app_state): State<Arc<AppState>>,
    Path(lesson_id): Path<Uuid>,
) -> HandlerResult<QuizQuestionsResponse> {
    let questions = app_state
        .engine
        .lesson_quiz_questions(lesson_id)
        .await
        .map_err(port_error_response)?;
    Ok(Json(QuizQuestionsResponse {
        questions: questions.into_iter().map(QuizQuestionResponse::from).collect(),
    }))
}

/// Submit answers to a lesson quiz.
///
/// XP is only awarded for improving on the learner's best attempt.
#[utoipa::path(
    post,
    path = "/lessons/{lesson_id}/quiz",
    request_body = QuizSubmission,
    responses(
        (status = 200, description = "Graded quiz", body = QuizResultResponse),
        (status = 400, description = "Missing, malformed or undecodable answers"),
        (status = 404, description = "Unknown lesson or lesson without a quiz")
    ),
    params(
        ("lesson_id" = Uuid, Path, description = "The lesson whose quiz was taken."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the learner.")
    )
)]
pub async fn submit_lesson_quiz_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(LearnerId(learner_id)): Extension<LearnerId>,
    Path(lesson_id): Path<Uuid>,
    payload: Result<Json<QuizSubmission>, JsonRejection>,
) -> HandlerResult<QuizResultResponse> {
    let Json(submission) = payload.map_err(json_rejection_response)?;
    let outcome = app_state
        .engine
        .submit_lesson_quiz(learner_id, lesson_id, &submission.answers)
        .await
        .map_err(port_error_response)?;
    info!(
        "Learner {} scored {}% on the quiz of lesson {}",
        learner_id, outcome.score_percent, lesson_id
    );
    Ok(Json(outcome.into()))
}

/// Get the general quiz of the learner's pathway and tier, without the answer key.
#[utoipa::path(
    get,
    path = "/quiz",
    responses(
        (status = 200, description = "Quiz questions", body = QuizQuestionsResponse),
        (status = 404, description = "Unknown learner or no questions for the track")
    ),
    params(("x-user-id" = Uuid, Header, description = "The unique ID of the learner."))
)]
pub async fn general_quiz_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(LearnerId(learner_id)): Extension<LearnerId>,
) -> HandlerResult<QuizQuestionsResponse> {
    let questions = app_state
        .engine
        .general_quiz_questions(learner_id)
        .await
        .map_err(port_error_response)?;
    Ok(Json(QuizQuestionsResponse {
        questions: questions.into_iter().map(QuizQuestionResponse::from).collect(),
    }))
}

/// Submit answers to the general quiz.
#[utoipa::path(
    post,
    path = "/quiz",
    request_body = QuizSubmission,
    responses(
        (status = 200, description = "Graded quiz", body = QuizResultResponse),
        (status = 400, description = "Missing, malformed or undecodable answers"),
        (status = 404, description = "Unknown learner or no questions for the track")
    ),
    params(("x-user-id" = Uuid, Header, description = "The unique ID of the learner."))
)]
pub async fn submit_general_quiz_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(LearnerId(learner_id)): Extension<LearnerId>,
    payload: Result<Json<QuizSubmission>, JsonRejection>,
) -> HandlerResult<QuizResultResponse> {
    let Json(submission) = payload.map_err(json_rejection_response)?;
    let outcome = app_state
        .engine
        .submit_general_quiz(learner_id, &submission.answers)
        .await
        .map_err(port_error_response)?;
    info!("Learner {} scored {}% on the general quiz", learner_id, outcome.score_percent);
    Ok(Json(outcome.into()))
}

//=========================================================================================
// Activity
//=========================================================================================

/// Get the learner's most recent activity, newest first.
#[utoipa::path(
    get,
    path = "/activities",
    responses(
        (status = 200, description = "Activity feed", body = ActivityFeedResponse)
    ),
    params(
        ActivityQuery,
        ("x-user-id" = Uuid, Header, description = "The unique ID of the learner.")
    )
)]
pub async fn activity_feed_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(LearnerId(learner_id)): Extension<LearnerId>,
    Query(query): Query<ActivityQuery>,
) -> HandlerResult<ActivityFeedResponse> {
    let limit = query.effective_limit(app_state.config.activity_feed_max);
    let events = app_state
        .engine
        .recent_activity(learner_id, limit)
        .await
        .map_err(port_error_response)?;
    Ok(Json(ActivityFeedResponse {
        activities: events.into_iter().map(ActivityResponse::from).collect(),
    }))
}

/// Record that the learner scheduled a study session for a lesson.
#[utoipa::path(
    post,
    path = "/study-sessions/scheduled",
    request_body = ScheduleStudySessionRequest,
    responses(
        (status = 201, description = "Activity recorded", body = ActivityResponse),
        (status = 400, description = "Undecodable request body"),
        (status = 404, description = "Unknown lesson or learner")
    ),
    params(("x-user-id" = Uuid, Header, description = "The unique ID of the learner."))
)]
pub async fn schedule_study_session_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(LearnerId(learner_id)): Extension<LearnerId>,
    payload: Result<Json<ScheduleStudySessionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ActivityResponse>), (StatusCode, String)> {
    let Json(request) = payload.map_err(json_rejection_response)?;
    let event = app_state
        .engine
        .record_study_session_scheduled(learner_id, request.lesson_id, request.date)
        .await
        .map_err(port_error_response)?;
    Ok((StatusCode::CREATED, Json(event.into())))
}
