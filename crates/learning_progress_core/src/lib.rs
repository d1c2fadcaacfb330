pub mod domain;
pub mod engine;
pub mod level;
pub mod memory;
pub mod ports;
pub mod rules;
pub mod scoring;
pub mod streak;
pub mod unlock;

pub use domain::{
    ActivityEvent, ActivityKind, DifficultyTier, Learner, Lesson, LessonCompletion, LevelProgress,
    Pathway, ProgressRecord, ProgressSummary, QuestionFeedback, QuestionView, QuizAttemptRecord,
    QuizIdentity, QuizOption, QuizOutcome, QuizQuestion, TrackLesson, TrackOverview,
};
pub use engine::{award_xp, ProgressEngine};
pub use ports::{
    Clock, LearnerDirectory, LearnerTransaction, LessonCatalog, PortError, PortResult, ProgressStore,
    SystemClock,
};
pub use rules::GamificationRules;
