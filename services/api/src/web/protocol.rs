//! services/api/src/web/protocol.rs
//!
//! Defines the JSON payloads exchanged between the frontend and the API server.
//! The core crate stays free of serialization concerns; these types mirror its
//! domain types for the wire.

use chrono::{DateTime, NaiveDate, Utc};
use learning_progress_core::domain::{
    ActivityEvent, LessonCompletion, LevelProgress, Lesson, ProgressSummary, QuestionFeedback,
    QuestionView, QuizOutcome, TrackOverview,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

//=========================================================================================
// Payloads Sent FROM the Client TO the Server
//=========================================================================================

/// Answers to a quiz, keyed by question id. Each answer is a single option letter.
#[derive(Deserialize, Debug, ToSchema)]
pub struct QuizSubmission {
    pub answers: HashMap<Uuid, String>,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct ScheduleStudySessionRequest {
    pub lesson_id: Uuid,
    pub date: NaiveDate,
}

#[derive(Deserialize, Debug, Default, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ActivityQuery {
    /// Maximum number of entries to return. Defaults to 20.
    pub limit: Option<usize>,
}

pub const DEFAULT_ACTIVITY_LIMIT: usize = 20;

impl ActivityQuery {
    /// The requested limit, defaulted and capped at `max`.
    pub fn effective_limit(&self, max: usize) -> usize {
        self.limit.unwrap_or(DEFAULT_ACTIVITY_LIMIT).min(max)
    }
}

//=========================================================================================
// Payloads Sent FROM the Server TO the Client
//=========================================================================================

#[derive(Serialize, Debug, ToSchema)]
pub struct LevelProgressResponse {
    pub level: i32,
    pub xp_into_level: i64,
    pub xp_to_next_level: i64,
    pub level_span: i64,
}

impl From<LevelProgress> for LevelProgressResponse {
    fn from(p: LevelProgress) -> Self {
        Self {
            level: p.level,
            xp_into_level: p.xp_into_level,
            xp_to_next_level: p.xp_to_next_level,
            level_span: p.level_span,
        }
    }
}

#[derive(Serialize, Debug, ToSchema)]
pub struct ProgressResponse {
    pub xp: i64,
    pub level: i32,
    pub streak: i32,
    pub lessons_completed: usize,
    pub last_active_date: Option<NaiveDate>,
    pub level_progress: LevelProgressResponse,
}

impl From<ProgressSummary> for ProgressResponse {
    fn from(s: ProgressSummary) -> Self {
        Self {
            xp: s.xp,
            level: s.level,
            streak: s.streak,
            lessons_completed: s.lessons_completed,
            last_active_date: s.last_active_date,
            level_progress: s.level_progress.into(),
        }
    }
}

#[derive(Serialize, Debug, ToSchema)]
pub struct LessonResponse {
    pub id: Uuid,
    pub title: String,
    pub pathway: String,
    pub difficulty_tier: String,
    pub order: i32,
}

impl From<Lesson> for LessonResponse {
    fn from(l: Lesson) -> Self {
        Self {
            id: l.id,
            title: l.title,
            pathway: l.pathway.to_string(),
            difficulty_tier: l.tier.to_string(),
            order: l.order,
        }
    }
}

#[derive(Serialize, Debug, ToSchema)]
pub struct LessonCompletionResponse {
    /// False when the lesson had already been completed and nothing changed.
    pub completed: bool,
    pub lessons_completed: usize,
    pub streak: i32,
    pub leveled_up: bool,
    pub xp: i64,
    pub level: i32,
    pub xp_earned: i64,
}

impl From<LessonCompletion> for LessonCompletionResponse {
    fn from(c: LessonCompletion) -> Self {
        Self {
            completed: c.completed,
            lessons_completed: c.lessons_completed,
            streak: c.streak,
            leveled_up: c.leveled_up,
            xp: c.xp,
            level: c.level,
            xp_earned: c.xp_earned,
        }
    }
}

#[derive(Serialize, Debug, ToSchema)]
pub struct CompletionStatusResponse {
    pub lesson_id: Uuid,
    pub completed: bool,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct NextLessonResponse {
    pub next_lesson: Option<LessonResponse>,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct TrackLessonResponse {
    #[serde(flatten)]
    pub lesson: LessonResponse,
    pub completed: bool,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct TrackResponse {
    pub pathway: String,
    pub difficulty_tier: String,
    pub lessons: Vec<TrackLessonResponse>,
    pub next_lesson: Option<LessonResponse>,
}

impl From<TrackOverview> for TrackResponse {
    fn from(t: TrackOverview) -> Self {
        Self {
            pathway: t.pathway.to_string(),
            difficulty_tier: t.tier.to_string(),
            lessons: t
                .lessons
                .into_iter()
                .map(|tl| TrackLessonResponse {
                    lesson: tl.lesson.into(),
                    completed: tl.completed,
                })
                .collect(),
            next_lesson: t.next_lesson.map(LessonResponse::from),
        }
    }
}

#[derive(Serialize, Debug, ToSchema)]
pub struct QuizOptionResponse {
    pub letter: String,
    pub text: String,
}

/// A question as shown to the learner. The answer key is never included.
#[derive(Serialize, Debug, ToSchema)]
pub struct QuizQuestionResponse {
    pub id: Uuid,
    pub prompt: String,
    pub options: Vec<QuizOptionResponse>,
}

impl From<QuestionView> for QuizQuestionResponse {
    fn from(q: QuestionView) -> Self {
        Self {
            id: q.id,
            prompt: q.prompt,
            options: q
                .options
                .into_iter()
                .map(|o| QuizOptionResponse {
                    letter: o.letter.to_string(),
                    text: o.text,
                })
                .collect(),
        }
    }
}

#[derive(Serialize, Debug, ToSchema)]
pub struct QuizQuestionsResponse {
    pub questions: Vec<QuizQuestionResponse>,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct QuestionFeedbackResponse {
    pub question_id: Uuid,
    pub submitted: String,
    pub correct: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl From<QuestionFeedback> for QuestionFeedbackResponse {
    fn from(f: QuestionFeedback) -> Self {
        Self {
            question_id: f.question_id,
            submitted: f.submitted.to_string(),
            correct: f.correct,
            explanation: f.explanation,
        }
    }
}

#[derive(Serialize, Debug, ToSchema)]
pub struct QuizResultResponse {
    pub total: usize,
    pub correct: usize,
    pub score_percent: i32,
    pub passed: bool,
    pub feedback: Vec<QuestionFeedbackResponse>,
    pub xp_earned: i64,
    pub best_score: i32,
    pub xp_total: i64,
    pub level: i32,
    pub leveled_up: bool,
}

impl From<QuizOutcome> for QuizResultResponse {
    fn from(o: QuizOutcome) -> Self {
        Self {
            total: o.total,
            correct: o.correct,
            score_percent: o.score_percent,
            passed: o.passed,
            feedback: o.feedback.into_iter().map(QuestionFeedbackResponse::from).collect(),
            xp_earned: o.xp_earned,
            best_score: o.best_score,
            xp_total: o.xp_total,
            level: o.level,
            leveled_up: o.leveled_up,
        }
    }
}

#[derive(Serialize, Debug, ToSchema)]
pub struct ActivityResponse {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub description: String,
    pub xp_earned: i64,
    pub occurred_at: DateTime<Utc>,
    pub lesson_id: Option<Uuid>,
    pub quiz_score: Option<i32>,
    pub streak_count: Option<i32>,
    pub level: Option<i32>,
}

impl From<ActivityEvent> for ActivityResponse {
    fn from(e: ActivityEvent) -> Self {
        Self {
            id: e.id,
            kind: e.kind.to_string(),
            title: e.title,
            description: e.description,
            xp_earned: e.xp_earned,
            occurred_at: e.occurred_at,
            lesson_id: e.lesson_id,
            quiz_score: e.quiz_score,
            streak_count: e.streak_count,
            level: e.level,
        }
    }
}

#[derive(Serialize, Debug, ToSchema)]
pub struct ActivityFeedResponse {
    pub activities: Vec<ActivityResponse>,
}
