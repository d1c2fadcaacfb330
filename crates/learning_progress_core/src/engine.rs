//! crates/learning_progress_core/src/engine.rs
//!
//! The progress and gamification handlers.
//!
//! Every mutating operation runs inside a single learner transaction: the record is
//! read under the learner's lock, the new state and its activity events are computed,
//! and everything is committed together. A failure before commit changes nothing.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::{
    ActivityEvent, ActivityKind, DifficultyTier, Learner, Lesson, LessonCompletion, Pathway,
    ProgressRecord, ProgressSummary, QuestionView, QuizAttemptRecord, QuizIdentity, QuizOutcome,
    QuizQuestion, TrackLesson, TrackOverview,
};
use crate::level::{level_of, level_progress};
use crate::ports::{Clock, LearnerDirectory, LessonCatalog, PortError, PortResult, ProgressStore};
use crate::rules::GamificationRules;
use crate::scoring;
use crate::streak::{advance_streak, is_milestone};
use crate::unlock;

//=========================================================================================
// XP Award Primitive
//=========================================================================================

/// Adds `amount` XP to `record`, re-derives the level and queues the resulting
/// activity on `feed`.
///
/// A level-up always produces a `level_up` event. The generic `xp_earned` event is
/// only produced when `emit_generic_activity` is set and the amount reaches
/// `rules.generic_xp_activity_min`; callers that describe the XP with their own
/// event pass `false`. Returns whether the level increased.
pub fn award_xp(
    record: &mut ProgressRecord,
    amount: i64,
    emit_generic_activity: bool,
    rules: &GamificationRules,
    at: DateTime<Utc>,
    feed: &mut Vec<ActivityEvent>,
) -> PortResult<bool> {
    if amount < 0 {
        return Err(PortError::Validation(format!(
            "Cannot award a negative amount of XP ({})",
            amount
        )));
    }

    let level_before = record.level;
    record.xp = record
        .xp
        .checked_add(amount)
        .ok_or_else(|| PortError::Unexpected("XP total overflowed".to_string()))?;
    record.level = level_of(record.xp);

    let leveled_up = record.level > level_before;
    if leveled_up {
        info!(
            "Learner {} reached level {} with {} XP",
            record.learner_id, record.level, record.xp
        );
        feed.push(
            ActivityEvent::new(
                record.learner_id,
                ActivityKind::LevelUp,
                format!("Reached level {}", record.level),
                format!("Total XP is now {}", record.xp),
                at,
            )
            .with_level(record.level),
        );
    }

    if emit_generic_activity && amount >= rules.generic_xp_activity_min {
        feed.push(
            ActivityEvent::new(
                record.learner_id,
                ActivityKind::XpEarned,
                format!("Earned {} XP", amount),
                format!("Total XP is now {}", record.xp),
                at,
            )
            .with_xp(amount),
        );
    }

    Ok(leveled_up)
}

//=========================================================================================
// The Engine
//=========================================================================================

/// Orchestrates lesson completion, quiz scoring and the activity feed on top of the ports.
pub struct ProgressEngine {
    store: Arc<dyn ProgressStore>,
    catalog: Arc<dyn LessonCatalog>,
    learners: Arc<dyn LearnerDirectory>,
    clock: Arc<dyn Clock>,
    rules: GamificationRules,
}

impl ProgressEngine {
    pub fn new(
        store: Arc<dyn ProgressStore>,
        catalog: Arc<dyn LessonCatalog>,
        learners: Arc<dyn LearnerDirectory>,
        clock: Arc<dyn Clock>,
        rules: GamificationRules,
    ) -> Self {
        Self {
            store,
            catalog,
            learners,
            clock,
            rules,
        }
    }

    pub fn rules(&self) -> &GamificationRules {
        &self.rules
    }

    //-------------------------------------------------------------------------------------
    // Learner lifecycle
    //-------------------------------------------------------------------------------------

    /// Ensures the learner has a progress record. The first call also records an
    /// `account_created` event; later calls change nothing.
    pub async fn register_learner(&self, learner_id: Uuid) -> PortResult<ProgressSummary> {
        self.learners.learner(learner_id).await?;

        let mut tx = self.store.begin(learner_id).await?;
        let record = tx.progress().clone();
        if tx.created() {
            let event = ActivityEvent::new(
                learner_id,
                ActivityKind::AccountCreated,
                "Welcome aboard",
                "Your learning journey starts here",
                self.clock.now(),
            );
            tx.append_activity(&event).await?;
            tx.commit().await?;
            info!("Created progress record for learner {}", learner_id);
        }
        Ok(summarize(&record))
    }

    //-------------------------------------------------------------------------------------
    // Lessons
    //-------------------------------------------------------------------------------------

    /// Marks a lesson completed, updates the streak and awards completion XP plus any
    /// streak milestone bonus. Completing the same lesson again is a no-op.
    pub async fn complete_lesson(&self, learner_id: Uuid, lesson_id: Uuid) -> PortResult<LessonCompletion> {
        let lesson = self.catalog.lesson(lesson_id).await?;
        self.learners.learner(learner_id).await?;

        let mut tx = self.store.begin(learner_id).await?;
        let mut record = tx.progress().clone();
        if record.has_completed(lesson_id) {
            debug!(
                "Learner {} already completed lesson {}; nothing to award",
                learner_id, lesson_id
            );
            return Ok(LessonCompletion {
                completed: false,
                lessons_completed: record.lessons_completed(),
                streak: record.streak,
                leveled_up: false,
                xp: record.xp,
                level: record.level,
                xp_earned: 0,
            });
        }

        let now = self.clock.now();
        let level_before = record.level;
        let streak_before = record.streak;
        let mut feed = Vec::new();

        record.completed_lessons.insert(lesson_id);
        let update = advance_streak(record.streak, record.last_active_date, now.date_naive());
        record.streak = update.streak;
        record.last_active_date = Some(update.last_active_date);

        let base_xp = self.rules.lesson_completion_xp;
        award_xp(&mut record, base_xp, false, &self.rules, now, &mut feed)?;
        feed.push(
            ActivityEvent::new(
                learner_id,
                ActivityKind::LessonCompleted,
                format!("Completed \"{}\"", lesson.title),
                format!("Earned {} XP for completing a lesson", base_xp),
                now,
            )
            .with_xp(base_xp)
            .with_lesson(lesson_id),
        );

        let mut xp_earned = base_xp;
        if is_milestone(streak_before, record.streak, self.rules.streak_milestone_interval) {
            let bonus = i64::from(record.streak) * self.rules.streak_bonus_per_day;
            award_xp(&mut record, bonus, false, &self.rules, now, &mut feed)?;
            feed.push(
                ActivityEvent::new(
                    learner_id,
                    ActivityKind::StreakMilestone,
                    format!("{}-day streak!", record.streak),
                    format!(
                        "Bonus of {} XP for keeping a {}-day streak",
                        bonus, record.streak
                    ),
                    now,
                )
                .with_xp(bonus)
                .with_streak(record.streak),
            );
            xp_earned += bonus;
            info!(
                "Learner {} hit a {}-day streak, +{} XP bonus",
                learner_id, record.streak, bonus
            );
        }

        tx.save_progress(&record).await?;
        for event in &feed {
            tx.append_activity(event).await?;
        }
        tx.commit().await?;

        info!(
            "Learner {} completed lesson {} (+{} XP, total {}, streak {})",
            learner_id, lesson_id, xp_earned, record.xp, record.streak
        );
        Ok(LessonCompletion {
            completed: true,
            lessons_completed: record.lessons_completed(),
            streak: record.streak,
            leveled_up: record.level > level_before,
            xp: record.xp,
            level: record.level,
            xp_earned,
        })
    }

    /// Whether the learner has completed the lesson. Unknown lessons are `NotFound`.
    pub async fn check_completion(&self, learner_id: Uuid, lesson_id: Uuid) -> PortResult<bool> {
        self.catalog.lesson(lesson_id).await?;
        Ok(self
            .store
            .progress(learner_id)
            .await?
            .is_some_and(|record| record.has_completed(lesson_id)))
    }

    /// The lesson of the track with the smallest order greater than `completed_order`.
    pub async fn unlock_next(
        &self,
        pathway: Pathway,
        tier: DifficultyTier,
        completed_order: i32,
    ) -> PortResult<Option<Lesson>> {
        let track = self.catalog.track_lessons(pathway, tier).await?;
        Ok(unlock::unlock_next(&track, completed_order).cloned())
    }

    /// The lesson that follows `lesson_id` within its own track.
    pub async fn next_lesson(&self, lesson_id: Uuid) -> PortResult<Option<Lesson>> {
        let lesson = self.catalog.lesson(lesson_id).await?;
        self.unlock_next(lesson.pathway, lesson.tier, lesson.order).await
    }

    /// The learner's track with completion flags and the lesson currently unlocked.
    pub async fn track_overview(&self, learner_id: Uuid) -> PortResult<TrackOverview> {
        let learner = self.learners.learner(learner_id).await?;
        let track = self.catalog.track_lessons(learner.pathway, learner.tier).await?;
        let record = self
            .store
            .progress(learner_id)
            .await?
            .unwrap_or_else(|| ProgressRecord::new(learner_id));

        let next_lesson = unlock::current_unlock(&track, |lesson| record.has_completed(lesson.id)).cloned();
        let lessons = track
            .into_iter()
            .map(|lesson| TrackLesson {
                completed: record.has_completed(lesson.id),
                lesson,
            })
            .collect();

        Ok(TrackOverview {
            pathway: learner.pathway,
            tier: learner.tier,
            lessons,
            next_lesson,
        })
    }

    //-------------------------------------------------------------------------------------
    // Quizzes
    //-------------------------------------------------------------------------------------

    pub async fn lesson_quiz_questions(&self, lesson_id: Uuid) -> PortResult<Vec<QuestionView>> {
        let (_, questions) = self.lesson_quiz(lesson_id).await?;
        Ok(questions.iter().map(QuizQuestion::view).collect())
    }

    pub async fn general_quiz_questions(&self, learner_id: Uuid) -> PortResult<Vec<QuestionView>> {
        let (_, questions) = self.general_quiz(learner_id).await?;
        Ok(questions.iter().map(QuizQuestion::view).collect())
    }

    pub async fn submit_lesson_quiz(
        &self,
        learner_id: Uuid,
        lesson_id: Uuid,
        answers: &HashMap<Uuid, String>,
    ) -> PortResult<QuizOutcome> {
        let (lesson, questions) = self.lesson_quiz(lesson_id).await?;
        self.learners.learner(learner_id).await?;
        let label = format!("the \"{}\" quiz", lesson.title);
        self.submit_quiz(learner_id, QuizIdentity::Lesson(lesson_id), &label, &questions, answers)
            .await
    }

    /// Scores the learner's general quiz: the first `general_quiz_size` questions of
    /// their pathway+tier pool.
    pub async fn submit_general_quiz(
        &self,
        learner_id: Uuid,
        answers: &HashMap<Uuid, String>,
    ) -> PortResult<QuizOutcome> {
        let (learner, questions) = self.general_quiz(learner_id).await?;
        let quiz = QuizIdentity::General {
            pathway: learner.pathway,
            tier: learner.tier,
        };
        self.submit_quiz(learner_id, quiz, "the general quiz", &questions, answers)
            .await
    }

    async fn lesson_quiz(&self, lesson_id: Uuid) -> PortResult<(Lesson, Vec<QuizQuestion>)> {
        let lesson = self.catalog.lesson(lesson_id).await?;
        let questions = self.catalog.questions(&QuizIdentity::Lesson(lesson_id)).await?;
        if questions.is_empty() {
            return Err(PortError::NotFound(format!(
                "No quiz questions for lesson {}",
                lesson_id
            )));
        }
        Ok((lesson, questions))
    }

    async fn general_quiz(&self, learner_id: Uuid) -> PortResult<(Learner, Vec<QuizQuestion>)> {
        let learner = self.learners.learner(learner_id).await?;
        let quiz = QuizIdentity::General {
            pathway: learner.pathway,
            tier: learner.tier,
        };
        let mut questions = self.catalog.questions(&quiz).await?;
        if questions.is_empty() {
            return Err(PortError::NotFound(format!(
                "No general quiz questions for {} / {}",
                learner.pathway, learner.tier
            )));
        }
        questions.truncate(self.rules.general_quiz_size);
        Ok((learner, questions))
    }

    async fn submit_quiz(
        &self,
        learner_id: Uuid,
        quiz: QuizIdentity,
        label: &str,
        questions: &[QuizQuestion],
        answers: &HashMap<Uuid, String>,
    ) -> PortResult<QuizOutcome> {
        let grade = match scoring::grade(questions, answers) {
            Ok(grade) => grade,
            Err(e) => {
                warn!("Rejected quiz submission from learner {}: {}", learner_id, e);
                return Err(e);
            }
        };
        let passed = self.rules.is_passing(grade.score_percent);
        let now = self.clock.now();

        let mut tx = self.store.begin(learner_id).await?;
        let mut attempt = tx
            .quiz_attempt(&quiz)
            .await?
            .unwrap_or_else(|| QuizAttemptRecord::new(learner_id, quiz, grade.total as i32));
        let xp_earned = scoring::apply_attempt(
            &mut attempt,
            grade.correct,
            grade.total,
            self.rules.xp_per_correct_answer,
        );

        let mut record = tx.progress().clone();
        let mut feed = Vec::new();
        let leveled_up = award_xp(&mut record, xp_earned, false, &self.rules, now, &mut feed)?;

        let (kind, title) = if passed {
            (ActivityKind::QuizPassed, format!("Passed {}", label))
        } else {
            (ActivityKind::QuizCompletedNotPassed, format!("Completed {}", label))
        };
        let mut event = ActivityEvent::new(
            learner_id,
            kind,
            title,
            format!(
                "Scored {}% ({}/{} correct)",
                grade.score_percent, grade.correct, grade.total
            ),
            now,
        )
        .with_xp(xp_earned)
        .with_quiz_score(grade.score_percent);
        if let QuizIdentity::Lesson(lesson_id) = quiz {
            event = event.with_lesson(lesson_id);
        }
        feed.push(event);

        tx.save_quiz_attempt(&attempt).await?;
        tx.save_progress(&record).await?;
        for event in &feed {
            tx.append_activity(event).await?;
        }
        tx.commit().await?;

        debug!(
            "Learner {} scored {}/{} on {} (best {}, +{} XP)",
            learner_id, grade.correct, grade.total, quiz.storage_key(), attempt.best_score, xp_earned
        );
        Ok(QuizOutcome {
            total: grade.total,
            correct: grade.correct,
            score_percent: grade.score_percent,
            passed,
            feedback: grade.feedback,
            xp_earned,
            best_score: attempt.best_score,
            xp_total: record.xp,
            level: record.level,
            leveled_up,
        })
    }

    //-------------------------------------------------------------------------------------
    // Summaries and activity
    //-------------------------------------------------------------------------------------

    pub async fn progress_summary(&self, learner_id: Uuid) -> PortResult<ProgressSummary> {
        self.learners.learner(learner_id).await?;
        let record = self
            .store
            .progress(learner_id)
            .await?
            .unwrap_or_else(|| ProgressRecord::new(learner_id));
        Ok(summarize(&record))
    }

    pub async fn recent_activity(&self, learner_id: Uuid, limit: usize) -> PortResult<Vec<ActivityEvent>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        self.store.recent_activity(learner_id, limit).await
    }

    /// Records that the learner booked a study session for a lesson. No XP is involved.
    pub async fn record_study_session_scheduled(
        &self,
        learner_id: Uuid,
        lesson_id: Uuid,
        date: NaiveDate,
    ) -> PortResult<ActivityEvent> {
        let lesson = self.catalog.lesson(lesson_id).await?;
        self.learners.learner(learner_id).await?;
        let event = ActivityEvent::new(
            learner_id,
            ActivityKind::StudySessionScheduled,
            "Scheduled a study session",
            format!("\"{}\" on {}", lesson.title, date.format("%Y-%m-%d")),
            self.clock.now(),
        )
        .with_lesson(lesson_id);

        let mut tx = self.store.begin(learner_id).await?;
        tx.append_activity(&event).await?;
        tx.commit().await?;
        Ok(event)
    }
}

fn summarize(record: &ProgressRecord) -> ProgressSummary {
    ProgressSummary {
        xp: record.xp,
        level: record.level,
        streak: record.streak,
        lessons_completed: record.lessons_completed(),
        last_active_date: record.last_active_date,
        level_progress: level_progress(record.xp),
    }
}
