//! crates/learning_progress_core/src/ports.rs
//!
//! Defines the service contracts (traits) the progress engine depends on.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the concrete database and content catalog.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    ActivityEvent, DifficultyTier, Learner, Lesson, Pathway, ProgressRecord, QuizAttemptRecord,
    QuizIdentity, QuizQuestion,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// The error type for all port and engine operations.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Invalid request: {0}")]
    Validation(String),
    /// A concurrent write slipped past the per-learner lock. Never expected.
    #[error("Conflicting update: {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Progress Storage
//=========================================================================================

/// A unit of work scoped to one learner.
///
/// Holding the transaction means holding the exclusive lock on that learner's
/// progress record. Writes are only visible to other operations after `commit`;
/// dropping the transaction discards them.
#[async_trait]
pub trait LearnerTransaction: Send {
    /// Whether this transaction created the progress record.
    fn created(&self) -> bool;

    /// The locked progress record, including writes staged so far.
    fn progress(&self) -> &ProgressRecord;

    async fn save_progress(&mut self, record: &ProgressRecord) -> PortResult<()>;

    async fn quiz_attempt(&mut self, quiz: &QuizIdentity) -> PortResult<Option<QuizAttemptRecord>>;

    async fn save_quiz_attempt(&mut self, attempt: &QuizAttemptRecord) -> PortResult<()>;

    async fn append_activity(&mut self, event: &ActivityEvent) -> PortResult<()>;

    async fn commit(self: Box<Self>) -> PortResult<()>;
}

#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Locks the learner's progress record, creating it when absent.
    async fn begin(&self, learner_id: Uuid) -> PortResult<Box<dyn LearnerTransaction>>;

    /// Last committed progress, without taking the lock.
    async fn progress(&self, learner_id: Uuid) -> PortResult<Option<ProgressRecord>>;

    /// Committed activity, newest first, at most `limit` entries.
    async fn recent_activity(&self, learner_id: Uuid, limit: usize) -> PortResult<Vec<ActivityEvent>>;
}

//=========================================================================================
// External Collaborators
//=========================================================================================

/// Read access to published lesson content.
#[async_trait]
pub trait LessonCatalog: Send + Sync {
    async fn lesson(&self, lesson_id: Uuid) -> PortResult<Lesson>;

    /// All lessons of a track in ascending `order`.
    async fn track_lessons(&self, pathway: Pathway, tier: DifficultyTier) -> PortResult<Vec<Lesson>>;

    /// Questions of a quiz in catalog order. Empty when the quiz has none.
    async fn questions(&self, quiz: &QuizIdentity) -> PortResult<Vec<QuizQuestion>>;
}

#[async_trait]
pub trait LearnerDirectory: Send + Sync {
    async fn learner(&self, learner_id: Uuid) -> PortResult<Learner>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time. Calendar days are evaluated in UTC.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
