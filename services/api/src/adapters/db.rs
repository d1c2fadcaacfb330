//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, the PostgreSQL implementation of the
//! `ProgressStore`, `LessonCatalog` and `LearnerDirectory` ports from the `core`
//! crate. It handles all interactions with the database using `sqlx`.
//!
//! Every progress mutation runs inside one database transaction that holds a
//! `FOR UPDATE` row lock on the learner's progress record until commit.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use learning_progress_core::domain::{
    ActivityEvent, ActivityKind, DifficultyTier, Learner, Lesson, Pathway, ProgressRecord,
    QuizAttemptRecord, QuizIdentity, QuizOption, QuizQuestion,
};
use learning_progress_core::ports::{
    LearnerDirectory, LearnerTransaction, LessonCatalog, PortError, PortResult, ProgressStore,
};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the storage and catalog ports.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct LearnerRow {
    id: Uuid,
    pathway: String,
    difficulty_tier: String,
}
impl LearnerRow {
    fn to_domain(self) -> PortResult<Learner> {
        Ok(Learner {
            id: self.id,
            pathway: self.pathway.parse::<Pathway>().map_err(PortError::Unexpected)?,
            tier: self.difficulty_tier.parse::<DifficultyTier>().map_err(PortError::Unexpected)?,
        })
    }
}

#[derive(FromRow)]
struct LessonRow {
    id: Uuid,
    title: String,
    pathway: String,
    difficulty_tier: String,
    lesson_order: i32,
}
impl LessonRow {
    fn to_domain(self) -> PortResult<Lesson> {
        Ok(Lesson {
            id: self.id,
            title: self.title,
            pathway: self.pathway.parse::<Pathway>().map_err(PortError::Unexpected)?,
            tier: self.difficulty_tier.parse::<DifficultyTier>().map_err(PortError::Unexpected)?,
            order: self.lesson_order,
        })
    }
}

#[derive(FromRow)]
struct QuestionRow {
    id: Uuid,
    prompt: String,
    options: Vec<String>,
    correct_option: String,
    explanation: String,
}
impl QuestionRow {
    /// Options are stored as plain text in display order and lettered A, B, C...
    fn to_domain(self) -> PortResult<QuizQuestion> {
        let correct_option = self
            .correct_option
            .chars()
            .next()
            .map(|c| c.to_ascii_uppercase())
            .ok_or_else(|| PortError::Unexpected(format!("Question {} has no answer key", self.id)))?;
        let options = self
            .options
            .into_iter()
            .zip('A'..='Z')
            .map(|(text, letter)| QuizOption { letter, text })
            .collect();
        Ok(QuizQuestion {
            id: self.id,
            prompt: self.prompt,
            options,
            correct_option,
            explanation: self.explanation,
        })
    }
}

#[derive(FromRow)]
struct ProgressRow {
    learner_id: Uuid,
    xp: i64,
    level: i32,
    streak: i32,
    last_active_date: Option<NaiveDate>,
}
impl ProgressRow {
    fn to_domain(self, completed_lessons: BTreeSet<Uuid>) -> ProgressRecord {
        ProgressRecord {
            learner_id: self.learner_id,
            xp: self.xp,
            level: self.level,
            streak: self.streak,
            last_active_date: self.last_active_date,
            completed_lessons,
        }
    }
}

#[derive(FromRow)]
struct QuizAttemptRow {
    best_score: i32,
    total_questions: i32,
    max_xp_earned: i64,
}

#[derive(FromRow)]
struct ActivityRow {
    id: Uuid,
    learner_id: Uuid,
    kind: String,
    title: String,
    description: String,
    xp_earned: i64,
    occurred_at: DateTime<Utc>,
    lesson_id: Option<Uuid>,
    quiz_score: Option<i32>,
    streak_count: Option<i32>,
    level: Option<i32>,
}
impl ActivityRow {
    fn to_domain(self) -> PortResult<ActivityEvent> {
        Ok(ActivityEvent {
            id: self.id,
            learner_id: self.learner_id,
            kind: self.kind.parse::<ActivityKind>().map_err(PortError::Unexpected)?,
            title: self.title,
            description: self.description,
            xp_earned: self.xp_earned,
            occurred_at: self.occurred_at,
            lesson_id: self.lesson_id,
            quiz_score: self.quiz_score,
            streak_count: self.streak_count,
            level: self.level,
        })
    }
}

const PROGRESS_COLUMNS: &str = "learner_id, xp, level, streak, last_active_date";

//=========================================================================================
// `ProgressStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl ProgressStore for DbAdapter {
    async fn begin(&self, learner_id: Uuid) -> PortResult<Box<dyn LearnerTransaction>> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        let inserted = sqlx::query("INSERT INTO progress_records (learner_id) VALUES ($1) ON CONFLICT (learner_id) DO NOTHING")
            .bind(learner_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db) if db.is_foreign_key_violation() => {
                    PortError::NotFound(format!("Learner {} not found", learner_id))
                }
                _ => unexpected(e),
            })?;

        let row = sqlx::query_as::<_, ProgressRow>(&format!(
            "SELECT {} FROM progress_records WHERE learner_id = $1 FOR UPDATE",
            PROGRESS_COLUMNS
        ))
        .bind(learner_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("Progress for learner {} not found", learner_id)),
            _ => unexpected(e),
        })?;

        let completed = completed_lessons(&mut tx, learner_id).await?;

        Ok(Box::new(PgLearnerTransaction {
            tx,
            progress: row.to_domain(completed),
            created: inserted.rows_affected() == 1,
        }))
    }

    async fn progress(&self, learner_id: Uuid) -> PortResult<Option<ProgressRecord>> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        let row = sqlx::query_as::<_, ProgressRow>(&format!(
            "SELECT {} FROM progress_records WHERE learner_id = $1",
            PROGRESS_COLUMNS
        ))
        .bind(learner_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(unexpected)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let completed = completed_lessons(&mut tx, learner_id).await?;
        tx.commit().await.map_err(unexpected)?;
        Ok(Some(row.to_domain(completed)))
    }

    async fn recent_activity(&self, learner_id: Uuid, limit: usize) -> PortResult<Vec<ActivityEvent>> {
        let rows = sqlx::query_as::<_, ActivityRow>(
            "SELECT id, learner_id, kind, title, description, xp_earned, occurred_at, lesson_id, quiz_score, streak_count, level \
             FROM activity_events WHERE learner_id = $1 ORDER BY occurred_at DESC, seq DESC LIMIT $2",
        )
        .bind(learner_id)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        rows.into_iter().map(|r| r.to_domain()).collect()
    }
}

async fn completed_lessons(tx: &mut Transaction<'static, Postgres>, learner_id: Uuid) -> PortResult<BTreeSet<Uuid>> {
    let ids = sqlx::query_scalar::<_, Uuid>("SELECT lesson_id FROM completed_lessons WHERE learner_id = $1")
        .bind(learner_id)
        .fetch_all(&mut **tx)
        .await
        .map_err(unexpected)?;
    Ok(ids.into_iter().collect())
}

//=========================================================================================
// Learner Transaction
//=========================================================================================

struct PgLearnerTransaction {
    tx: Transaction<'static, Postgres>,
    progress: ProgressRecord,
    created: bool,
}

#[async_trait]
impl LearnerTransaction for PgLearnerTransaction {
    fn created(&self) -> bool {
        self.created
    }

    fn progress(&self) -> &ProgressRecord {
        &self.progress
    }

    async fn save_progress(&mut self, record: &ProgressRecord) -> PortResult<()> {
        self.progress
            .check_successor(record)
            .map_err(PortError::Conflict)?;

        sqlx::query(
            "UPDATE progress_records SET xp = $2, level = $3, streak = $4, last_active_date = $5, updated_at = now() \
             WHERE learner_id = $1",
        )
        .bind(record.learner_id)
        .bind(record.xp)
        .bind(record.level)
        .bind(record.streak)
        .bind(record.last_active_date)
        .execute(&mut *self.tx)
        .await
        .map_err(unexpected)?;

        for lesson_id in record.completed_lessons.difference(&self.progress.completed_lessons) {
            sqlx::query(
                "INSERT INTO completed_lessons (learner_id, lesson_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(record.learner_id)
            .bind(*lesson_id)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db) if db.is_foreign_key_violation() => {
                    PortError::NotFound(format!("Lesson {} not found", lesson_id))
                }
                _ => unexpected(e),
            })?;
        }

        self.progress = record.clone();
        Ok(())
    }

    async fn quiz_attempt(&mut self, quiz: &QuizIdentity) -> PortResult<Option<QuizAttemptRecord>> {
        let row = sqlx::query_as::<_, QuizAttemptRow>(
            "SELECT best_score, total_questions, max_xp_earned FROM quiz_attempts WHERE learner_id = $1 AND quiz_key = $2",
        )
        .bind(self.progress.learner_id)
        .bind(quiz.storage_key())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(unexpected)?;

        Ok(row.map(|r| QuizAttemptRecord {
            learner_id: self.progress.learner_id,
            quiz: *quiz,
            best_score: r.best_score,
            total_questions: r.total_questions,
            max_xp_earned: r.max_xp_earned,
        }))
    }

    async fn save_quiz_attempt(&mut self, attempt: &QuizAttemptRecord) -> PortResult<()> {
        // GREATEST keeps both columns monotonic even if a stale record is written.
        sqlx::query(
            "INSERT INTO quiz_attempts (learner_id, quiz_key, best_score, total_questions, max_xp_earned) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (learner_id, quiz_key) DO UPDATE SET \
               best_score = GREATEST(quiz_attempts.best_score, EXCLUDED.best_score), \
               total_questions = EXCLUDED.total_questions, \
               max_xp_earned = GREATEST(quiz_attempts.max_xp_earned, EXCLUDED.max_xp_earned), \
               updated_at = now()",
        )
        .bind(attempt.learner_id)
        .bind(attempt.quiz.storage_key())
        .bind(attempt.best_score)
        .bind(attempt.total_questions)
        .bind(attempt.max_xp_earned)
        .execute(&mut *self.tx)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn append_activity(&mut self, event: &ActivityEvent) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO activity_events \
             (id, learner_id, kind, title, description, xp_earned, occurred_at, lesson_id, quiz_score, streak_count, level) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(event.id)
        .bind(event.learner_id)
        .bind(event.kind.as_str())
        .bind(&event.title)
        .bind(&event.description)
        .bind(event.xp_earned)
        .bind(event.occurred_at)
        .bind(event.lesson_id)
        .bind(event.quiz_score)
        .bind(event.streak_count)
        .bind(event.level)
        .execute(&mut *self.tx)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> PortResult<()> {
        self.tx.commit().await.map_err(unexpected)
    }
}

//=========================================================================================
// Catalog and Directory Trait Implementations
//=========================================================================================

#[async_trait]
impl LessonCatalog for DbAdapter {
    async fn lesson(&self, lesson_id: Uuid) -> PortResult<Lesson> {
        let row = sqlx::query_as::<_, LessonRow>(
            "SELECT id, title, pathway, difficulty_tier, lesson_order FROM lessons WHERE id = $1",
        )
        .bind(lesson_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("Lesson {} not found", lesson_id)),
            _ => unexpected(e),
        })?;
        row.to_domain()
    }

    async fn track_lessons(&self, pathway: Pathway, tier: DifficultyTier) -> PortResult<Vec<Lesson>> {
        let rows = sqlx::query_as::<_, LessonRow>(
            "SELECT id, title, pathway, difficulty_tier, lesson_order FROM lessons \
             WHERE pathway = $1 AND difficulty_tier = $2 ORDER BY lesson_order ASC",
        )
        .bind(pathway.as_str())
        .bind(tier.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        rows.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn questions(&self, quiz: &QuizIdentity) -> PortResult<Vec<QuizQuestion>> {
        let query = match quiz {
            QuizIdentity::Lesson(lesson_id) => sqlx::query_as::<_, QuestionRow>(
                "SELECT id, prompt, options, correct_option, explanation FROM quiz_questions \
                 WHERE lesson_id = $1 ORDER BY position ASC, id ASC",
            )
            .bind(*lesson_id),
            QuizIdentity::General { pathway, tier } => sqlx::query_as::<_, QuestionRow>(
                "SELECT id, prompt, options, correct_option, explanation FROM quiz_questions \
                 WHERE lesson_id IS NULL AND pathway = $1 AND difficulty_tier = $2 ORDER BY position ASC, id ASC",
            )
            .bind(pathway.as_str())
            .bind(tier.as_str()),
        };

        let rows = query.fetch_all(&self.pool).await.map_err(unexpected)?;
        rows.into_iter().map(|r| r.to_domain()).collect()
    }
}

#[async_trait]
impl LearnerDirectory for DbAdapter {
    async fn learner(&self, learner_id: Uuid) -> PortResult<Learner> {
        let row = sqlx::query_as::<_, LearnerRow>(
            "SELECT id, pathway, difficulty_tier FROM learners WHERE id = $1",
        )
        .bind(learner_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("Learner {} not found", learner_id)),
            _ => unexpected(e),
        })?;
        row.to_domain()
    }
}
