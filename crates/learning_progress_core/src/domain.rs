//! crates/learning_progress_core/src/domain.rs
//!
//! Defines the pure, core data structures of the progress engine.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, NaiveDate, Utc};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::level::level_of;

//=========================================================================================
// Track Classification
//=========================================================================================

/// The learning goal a learner signed up for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Pathway {
    School,
    Portfolio,
    CareerGrowth,
}

impl Pathway {
    pub fn as_str(&self) -> &'static str {
        match self {
            Pathway::School => "school",
            Pathway::Portfolio => "portfolio",
            Pathway::CareerGrowth => "career_growth",
        }
    }
}

impl fmt::Display for Pathway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Pathway {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace([' ', '-'], "_").as_str() {
            "school" => Ok(Pathway::School),
            "portfolio" => Ok(Pathway::Portfolio),
            "career_growth" => Ok(Pathway::CareerGrowth),
            other => Err(format!("unknown pathway '{}'", other)),
        }
    }
}

/// The difficulty tier a learner studies at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DifficultyTier {
    Beginner,
    Intermediate,
    Advanced,
}

impl DifficultyTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            DifficultyTier::Beginner => "beginner",
            DifficultyTier::Intermediate => "intermediate",
            DifficultyTier::Advanced => "advanced",
        }
    }
}

impl fmt::Display for DifficultyTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DifficultyTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "beginner" => Ok(DifficultyTier::Beginner),
            "intermediate" => Ok(DifficultyTier::Intermediate),
            "advanced" => Ok(DifficultyTier::Advanced),
            other => Err(format!("unknown difficulty tier '{}'", other)),
        }
    }
}

//=========================================================================================
// Externally Owned Records (read-only here)
//=========================================================================================

/// The two learner attributes the engine reads. Accounts are owned elsewhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Learner {
    pub id: Uuid,
    pub pathway: Pathway,
    pub tier: DifficultyTier,
}

/// A lesson as published by content management.
///
/// `order` is unique within a (pathway, tier) track. Content authoring must reject
/// duplicates; lesson unlocking relies on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lesson {
    pub id: Uuid,
    pub title: String,
    pub pathway: Pathway,
    pub tier: DifficultyTier,
    pub order: i32,
}

/// One selectable answer of a multiple-choice question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizOption {
    pub letter: char,
    pub text: String,
}

/// A multiple-choice question together with its answer key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizQuestion {
    pub id: Uuid,
    pub prompt: String,
    pub options: Vec<QuizOption>,
    /// Upper-case letter of the correct option.
    pub correct_option: char,
    pub explanation: String,
}

impl QuizQuestion {
    /// The learner-facing view of the question, without the answer key.
    pub fn view(&self) -> QuestionView {
        QuestionView {
            id: self.id,
            prompt: self.prompt.clone(),
            options: self.options.clone(),
        }
    }

    pub fn has_option(&self, letter: char) -> bool {
        self.options.iter().any(|o| o.letter == letter)
    }
}

/// A question as shown to a learner taking a quiz.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionView {
    pub id: Uuid,
    pub prompt: String,
    pub options: Vec<QuizOption>,
}

/// Distinguishes a lesson-scoped quiz from the general pathway+tier quiz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuizIdentity {
    Lesson(Uuid),
    General {
        pathway: Pathway,
        tier: DifficultyTier,
    },
}

impl QuizIdentity {
    /// Stable key used to persist best-score tracking for this quiz.
    pub fn storage_key(&self) -> String {
        match self {
            QuizIdentity::Lesson(lesson_id) => format!("lesson:{}", lesson_id),
            QuizIdentity::General { pathway, tier } => format!("general:{}:{}", pathway, tier),
        }
    }
}

//=========================================================================================
// Engine-Owned Records
//=========================================================================================

/// Durable per-learner progress. `level` is cached and always equals `level_of(xp)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressRecord {
    pub learner_id: Uuid,
    pub xp: i64,
    pub level: i32,
    pub streak: i32,
    pub last_active_date: Option<NaiveDate>,
    /// Append-only; entries are never removed.
    pub completed_lessons: BTreeSet<Uuid>,
}

impl ProgressRecord {
    pub fn new(learner_id: Uuid) -> Self {
        Self {
            learner_id,
            xp: 0,
            level: level_of(0),
            streak: 0,
            last_active_date: None,
            completed_lessons: BTreeSet::new(),
        }
    }

    pub fn lessons_completed(&self) -> usize {
        self.completed_lessons.len()
    }

    pub fn has_completed(&self, lesson_id: Uuid) -> bool {
        self.completed_lessons.contains(&lesson_id)
    }

    /// Checks that `next` is a legal successor of this record: same learner, XP not
    /// lower, no completed lesson dropped and the cached level matching the XP.
    pub fn check_successor(&self, next: &ProgressRecord) -> Result<(), String> {
        if next.learner_id != self.learner_id {
            return Err(format!(
                "progress for learner {} written through learner {}'s lock",
                next.learner_id, self.learner_id
            ));
        }
        if next.xp < self.xp {
            return Err(format!("xp would drop from {} to {}", self.xp, next.xp));
        }
        if !self.completed_lessons.is_subset(&next.completed_lessons) {
            return Err("completed lessons would be removed".to_string());
        }
        if next.level != level_of(next.xp) {
            return Err(format!("level {} does not match xp {}", next.level, next.xp));
        }
        Ok(())
    }
}

/// Best-score tracking for one (learner, quiz identity) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizAttemptRecord {
    pub learner_id: Uuid,
    pub quiz: QuizIdentity,
    pub best_score: i32,
    pub total_questions: i32,
    pub max_xp_earned: i64,
}

impl QuizAttemptRecord {
    pub fn new(learner_id: Uuid, quiz: QuizIdentity, total_questions: i32) -> Self {
        Self {
            learner_id,
            quiz,
            best_score: 0,
            total_questions,
            max_xp_earned: 0,
        }
    }
}

//=========================================================================================
// Activity Feed
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivityKind {
    LessonCompleted,
    QuizPassed,
    QuizCompletedNotPassed,
    StreakMilestone,
    LevelUp,
    XpEarned,
    AccountCreated,
    StudySessionScheduled,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::LessonCompleted => "lesson_completed",
            ActivityKind::QuizPassed => "quiz_passed",
            ActivityKind::QuizCompletedNotPassed => "quiz_completed_not_passed",
            ActivityKind::StreakMilestone => "streak_milestone",
            ActivityKind::LevelUp => "level_up",
            ActivityKind::XpEarned => "xp_earned",
            ActivityKind::AccountCreated => "account_created",
            ActivityKind::StudySessionScheduled => "study_session_scheduled",
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lesson_completed" => Ok(ActivityKind::LessonCompleted),
            "quiz_passed" => Ok(ActivityKind::QuizPassed),
            "quiz_completed_not_passed" => Ok(ActivityKind::QuizCompletedNotPassed),
            "streak_milestone" => Ok(ActivityKind::StreakMilestone),
            "level_up" => Ok(ActivityKind::LevelUp),
            "xp_earned" => Ok(ActivityKind::XpEarned),
            "account_created" => Ok(ActivityKind::AccountCreated),
            "study_session_scheduled" => Ok(ActivityKind::StudySessionScheduled),
            other => Err(format!("unknown activity kind '{}'", other)),
        }
    }
}

/// An immutable entry of the activity feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityEvent {
    pub id: Uuid,
    pub learner_id: Uuid,
    pub kind: ActivityKind,
    pub title: String,
    pub description: String,
    pub xp_earned: i64,
    pub occurred_at: DateTime<Utc>,
    pub lesson_id: Option<Uuid>,
    pub quiz_score: Option<i32>,
    pub streak_count: Option<i32>,
    pub level: Option<i32>,
}

impl ActivityEvent {
    pub fn new(
        learner_id: Uuid,
        kind: ActivityKind,
        title: impl Into<String>,
        description: impl Into<String>,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            learner_id,
            kind,
            title: title.into(),
            description: description.into(),
            xp_earned: 0,
            occurred_at,
            lesson_id: None,
            quiz_score: None,
            streak_count: None,
            level: None,
        }
    }

    pub fn with_xp(mut self, xp_earned: i64) -> Self {
        self.xp_earned = xp_earned;
        self
    }

    pub fn with_lesson(mut self, lesson_id: Uuid) -> Self {
        self.lesson_id = Some(lesson_id);
        self
    }

    pub fn with_quiz_score(mut self, score_percent: i32) -> Self {
        self.quiz_score = Some(score_percent);
        self
    }

    pub fn with_streak(mut self, streak: i32) -> Self {
        self.streak_count = Some(streak);
        self
    }

    pub fn with_level(mut self, level: i32) -> Self {
        self.level = Some(level);
        self
    }
}

//=========================================================================================
// Operation Results
//=========================================================================================

/// Where a learner stands inside their current level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelProgress {
    pub level: i32,
    /// XP earned since reaching the current level.
    pub xp_into_level: i64,
    /// XP still missing to reach the next level.
    pub xp_to_next_level: i64,
    /// Total XP width of the current level.
    pub level_span: i64,
}

/// Counters returned by `complete_lesson`. `completed` is false for a repeat completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonCompletion {
    pub completed: bool,
    pub lessons_completed: usize,
    pub streak: i32,
    pub leveled_up: bool,
    pub xp: i64,
    pub level: i32,
    pub xp_earned: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionFeedback {
    pub question_id: Uuid,
    pub submitted: char,
    pub correct: bool,
    /// Only present for incorrect answers.
    pub explanation: Option<String>,
}

/// Result of grading and recording a quiz submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizOutcome {
    pub total: usize,
    pub correct: usize,
    pub score_percent: i32,
    pub passed: bool,
    pub feedback: Vec<QuestionFeedback>,
    pub xp_earned: i64,
    pub best_score: i32,
    pub xp_total: i64,
    pub level: i32,
    pub leveled_up: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressSummary {
    pub xp: i64,
    pub level: i32,
    pub streak: i32,
    pub lessons_completed: usize,
    pub last_active_date: Option<NaiveDate>,
    pub level_progress: LevelProgress,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackLesson {
    pub lesson: Lesson,
    pub completed: bool,
}

/// The learner's own track with completion flags and the currently unlocked lesson.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackOverview {
    pub pathway: Pathway,
    pub tier: DifficultyTier,
    pub lessons: Vec<TrackLesson>,
    pub next_lesson: Option<Lesson>,
}
