//! crates/learning_progress_core/src/memory.rs
//!
//! In-process implementations of the ports. Used by the test suites and by
//! deployments that do not need durable storage.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::domain::{
    ActivityEvent, DifficultyTier, Learner, Lesson, Pathway, ProgressRecord, QuizAttemptRecord,
    QuizIdentity, QuizQuestion,
};
use crate::ports::{
    Clock, LearnerDirectory, LearnerTransaction, LessonCatalog, PortError, PortResult, ProgressStore,
};

//=========================================================================================
// Progress Store
//=========================================================================================

#[derive(Default)]
struct LearnerSlot {
    progress: Option<ProgressRecord>,
    attempts: HashMap<String, QuizAttemptRecord>,
    activity: Vec<ActivityEvent>,
}

/// Keeps each learner's state behind its own async mutex, so operations on
/// different learners never wait for each other.
#[derive(Default)]
pub struct InMemoryStore {
    slots: DashMap<Uuid, Arc<Mutex<LearnerSlot>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, learner_id: Uuid) -> Arc<Mutex<LearnerSlot>> {
        self.slots.entry(learner_id).or_default().clone()
    }

    fn existing_slot(&self, learner_id: Uuid) -> Option<Arc<Mutex<LearnerSlot>>> {
        self.slots.get(&learner_id).map(|slot| slot.clone())
    }
}

#[async_trait]
impl ProgressStore for InMemoryStore {
    async fn begin(&self, learner_id: Uuid) -> PortResult<Box<dyn LearnerTransaction>> {
        let guard = self.slot(learner_id).lock_owned().await;
        let (progress, created) = match &guard.progress {
            Some(record) => (record.clone(), false),
            None => (ProgressRecord::new(learner_id), true),
        };
        Ok(Box::new(InMemoryTransaction {
            guard,
            progress,
            created,
            progress_dirty: false,
            attempts: HashMap::new(),
            activity: Vec::new(),
        }))
    }

    async fn progress(&self, learner_id: Uuid) -> PortResult<Option<ProgressRecord>> {
        match self.existing_slot(learner_id) {
            Some(slot) => Ok(slot.lock().await.progress.clone()),
            None => Ok(None),
        }
    }

    async fn recent_activity(&self, learner_id: Uuid, limit: usize) -> PortResult<Vec<ActivityEvent>> {
        let Some(slot) = self.existing_slot(learner_id) else {
            return Ok(Vec::new());
        };
        let slot = slot.lock().await;
        // Newest insertion first, so events sharing a timestamp keep their reverse order.
        let mut events: Vec<ActivityEvent> = slot.activity.iter().rev().cloned().collect();
        events.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
        events.truncate(limit);
        Ok(events)
    }
}

struct InMemoryTransaction {
    guard: OwnedMutexGuard<LearnerSlot>,
    progress: ProgressRecord,
    created: bool,
    progress_dirty: bool,
    attempts: HashMap<String, QuizAttemptRecord>,
    activity: Vec<ActivityEvent>,
}

#[async_trait]
impl LearnerTransaction for InMemoryTransaction {
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
        self.progress = record.clone();
        self.progress_dirty = true;
        Ok(())
    }

    async fn quiz_attempt(&mut self, quiz: &QuizIdentity) -> PortResult<Option<QuizAttemptRecord>> {
        let key = quiz.storage_key();
        Ok(self
            .attempts
            .get(&key)
            .or_else(|| self.guard.attempts.get(&key))
            .cloned())
    }

    async fn save_quiz_attempt(&mut self, attempt: &QuizAttemptRecord) -> PortResult<()> {
        if attempt.learner_id != self.progress.learner_id {
            return Err(PortError::Conflict(format!(
                "quiz attempt for learner {} written through learner {}'s lock",
                attempt.learner_id, self.progress.learner_id
            )));
        }
        self.attempts.insert(attempt.quiz.storage_key(), attempt.clone());
        Ok(())
    }

    async fn append_activity(&mut self, event: &ActivityEvent) -> PortResult<()> {
        self.activity.push(event.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> PortResult<()> {
        let InMemoryTransaction {
            mut guard,
            progress,
            created,
            progress_dirty,
            attempts,
            activity,
        } = *self;

        if created || progress_dirty {
            guard.progress = Some(progress);
        }
        guard.attempts.extend(attempts);
        guard.activity.extend(activity);
        Ok(())
    }
}

//=========================================================================================
// Catalog and Learner Directory
//=========================================================================================

/// Lesson content, quiz questions and learner attributes held in memory.
#[derive(Default)]
pub struct InMemoryCatalog {
    lessons: DashMap<Uuid, Lesson>,
    questions: DashMap<QuizIdentity, Vec<QuizQuestion>>,
    learners: DashMap<Uuid, Learner>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes a lesson. A second lesson with the same `order` in one track is rejected.
    pub fn add_lesson(&self, lesson: Lesson) -> PortResult<()> {
        let clash = self.lessons.iter().any(|existing| {
            existing.id != lesson.id
                && existing.pathway == lesson.pathway
                && existing.tier == lesson.tier
                && existing.order == lesson.order
        });
        if clash {
            return Err(PortError::Validation(format!(
                "Order {} is already used in the {} / {} track",
                lesson.order, lesson.pathway, lesson.tier
            )));
        }
        self.lessons.insert(lesson.id, lesson);
        Ok(())
    }

    /// Appends a question to a quiz; catalog order is insertion order.
    pub fn add_question(&self, quiz: QuizIdentity, question: QuizQuestion) {
        self.questions.entry(quiz).or_default().push(question);
    }

    pub fn add_learner(&self, learner: Learner) {
        self.learners.insert(learner.id, learner);
    }
}

#[async_trait]
impl LessonCatalog for InMemoryCatalog {
    async fn lesson(&self, lesson_id: Uuid) -> PortResult<Lesson> {
        self.lessons
            .get(&lesson_id)
            .map(|lesson| lesson.clone())
            .ok_or_else(|| PortError::NotFound(format!("Lesson {} not found", lesson_id)))
    }

    async fn track_lessons(&self, pathway: Pathway, tier: DifficultyTier) -> PortResult<Vec<Lesson>> {
        let mut track: Vec<Lesson> = self
            .lessons
            .iter()
            .filter(|lesson| lesson.pathway == pathway && lesson.tier == tier)
            .map(|lesson| lesson.clone())
            .collect();
        track.sort_by_key(|lesson| lesson.order);
        Ok(track)
    }

    async fn questions(&self, quiz: &QuizIdentity) -> PortResult<Vec<QuizQuestion>> {
        Ok(self
            .questions
            .get(quiz)
            .map(|questions| questions.clone())
            .unwrap_or_default())
    }
}

#[async_trait]
impl LearnerDirectory for InMemoryCatalog {
    async fn learner(&self, learner_id: Uuid) -> PortResult<Learner> {
        self.learners
            .get(&learner_id)
            .map(|learner| learner.clone())
            .ok_or_else(|| PortError::NotFound(format!("Learner {} not found", learner_id)))
    }
}

//=========================================================================================
// Clock
//=========================================================================================

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct FixedClock {
    millis: AtomicI64,
}

impl FixedClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self {
            millis: AtomicI64::new(at.timestamp_millis()),
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        self.millis.store(at.timestamp_millis(), Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        self.millis.fetch_add(by.num_milliseconds(), Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.millis.load(Ordering::SeqCst)).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ActivityKind;

    fn lesson(order: i32) -> Lesson {
        Lesson {
            id: Uuid::new_v4(),
            title: format!("Lesson {}", order),
            pathway: Pathway::Portfolio,
            tier: DifficultyTier::Intermediate,
            order,
        }
    }

    #[tokio::test]
    async fn dropped_transaction_leaves_no_trace() {
        let store = InMemoryStore::new();
        let learner_id = Uuid::new_v4();

        let mut tx = store.begin(learner_id).await.unwrap();
        assert!(tx.created());
        let mut record = tx.progress().clone();
        record.xp = 25;
        record.level = 1;
        tx.save_progress(&record).await.unwrap();
        drop(tx);

        assert_eq!(store.progress(learner_id).await.unwrap(), None);
        assert!(store.recent_activity(learner_id, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn commit_publishes_everything_together() {
        let store = InMemoryStore::new();
        let learner_id = Uuid::new_v4();
        let quiz = QuizIdentity::Lesson(Uuid::new_v4());

        let mut tx = store.begin(learner_id).await.unwrap();
        let mut record = tx.progress().clone();
        record.xp = 60;
        record.level = 2;
        tx.save_progress(&record).await.unwrap();
        let mut attempt = QuizAttemptRecord::new(learner_id, quiz, 5);
        attempt.best_score = 4;
        tx.save_quiz_attempt(&attempt).await.unwrap();
        assert_eq!(tx.quiz_attempt(&quiz).await.unwrap(), Some(attempt.clone()));
        let event = ActivityEvent::new(learner_id, ActivityKind::XpEarned, "t", "d", Utc::now());
        tx.append_activity(&event).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(store.progress(learner_id).await.unwrap().map(|p| p.xp), Some(60));
        let mut tx = store.begin(learner_id).await.unwrap();
        assert!(!tx.created());
        assert_eq!(tx.quiz_attempt(&quiz).await.unwrap(), Some(attempt));
        drop(tx);
        assert_eq!(store.recent_activity(learner_id, 10).await.unwrap(), vec![event]);
    }

    #[tokio::test]
    async fn rejects_writes_that_break_progress_invariants() {
        let store = InMemoryStore::new();
        let learner_id = Uuid::new_v4();
        let mut tx = store.begin(learner_id).await.unwrap();

        let mut record = tx.progress().clone();
        record.xp = 100;
        assert!(matches!(tx.save_progress(&record).await, Err(PortError::Conflict(_))));

        record.level = 2;
        record.completed_lessons.insert(Uuid::new_v4());
        tx.save_progress(&record).await.unwrap();

        let mut shrunk = record.clone();
        shrunk.completed_lessons.clear();
        assert!(matches!(tx.save_progress(&shrunk).await, Err(PortError::Conflict(_))));

        let mut lower = record.clone();
        lower.xp = 10;
        lower.level = 1;
        assert!(matches!(tx.save_progress(&lower).await, Err(PortError::Conflict(_))));
    }

    #[tokio::test]
    async fn recent_activity_is_newest_first_and_limited() {
        let store = InMemoryStore::new();
        let learner_id = Uuid::new_v4();
        let start = Utc::now();

        let mut tx = store.begin(learner_id).await.unwrap();
        for minutes in [5, 1, 3] {
            let event = ActivityEvent::new(
                learner_id,
                ActivityKind::XpEarned,
                format!("at {}", minutes),
                "",
                start + Duration::minutes(minutes),
            );
            tx.append_activity(&event).await.unwrap();
        }
        tx.commit().await.unwrap();

        let titles: Vec<String> = store
            .recent_activity(learner_id, 2)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.title)
            .collect();
        assert_eq!(titles, vec!["at 5".to_string(), "at 3".to_string()]);
    }

    #[tokio::test]
    async fn catalog_rejects_duplicate_order_in_a_track() {
        let catalog = InMemoryCatalog::new();
        catalog.add_lesson(lesson(1)).unwrap();
        assert!(matches!(catalog.add_lesson(lesson(1)), Err(PortError::Validation(_))));

        let mut other_track = lesson(1);
        other_track.tier = DifficultyTier::Advanced;
        catalog.add_lesson(other_track).unwrap();

        catalog.add_lesson(lesson(3)).unwrap();
        catalog.add_lesson(lesson(2)).unwrap();
        let orders: Vec<i32> = catalog
            .track_lessons(Pathway::Portfolio, DifficultyTier::Intermediate)
            .await
            .unwrap()
            .iter()
            .map(|l| l.order)
            .collect();
        assert_eq!(orders, vec![1, 2, 3]);
    }

    #[test]
    fn fixed_clock_moves_only_on_request() {
        let start = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let clock = FixedClock::new(start);
        assert_eq!(clock.now(), start);
        clock.advance(Duration::days(1));
        assert_eq!(clock.now(), start + Duration::days(1));
    }
}
