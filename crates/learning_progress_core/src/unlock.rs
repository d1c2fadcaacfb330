//! crates/learning_progress_core/src/unlock.rs
//!
//! Finds the lesson that opens up after a lesson in the same track is completed.
//!
//! Within one (pathway, tier) track `order` must be unique. Content authoring is
//! responsible for rejecting duplicates; `has_unique_orders` is provided for that.

use std::collections::HashSet;

use crate::domain::Lesson;

/// Lesson with the smallest `order` strictly greater than `completed_order`.
pub fn unlock_next(track: &[Lesson], completed_order: i32) -> Option<&Lesson> {
    track
        .iter()
        .filter(|lesson| lesson.order > completed_order)
        .min_by_key(|lesson| lesson.order)
}

/// Lesson to offer a learner given what they completed: the one after the highest
/// completed order, or the first lesson when nothing in the track is completed.
pub fn current_unlock<'a>(track: &'a [Lesson], completed: impl Fn(&Lesson) -> bool) -> Option<&'a Lesson> {
    match track.iter().filter(|l| completed(l)).map(|l| l.order).max() {
        Some(highest) => unlock_next(track, highest),
        None => track.iter().min_by_key(|lesson| lesson.order),
    }
}

pub fn has_unique_orders(track: &[Lesson]) -> bool {
    let mut seen = HashSet::new();
    track.iter().all(|lesson| seen.insert(lesson.order))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DifficultyTier, Pathway};
    use uuid::Uuid;

    fn lesson(order: i32) -> Lesson {
        Lesson {
            id: Uuid::new_v4(),
            title: format!("Lesson {}", order),
            pathway: Pathway::School,
            tier: DifficultyTier::Beginner,
            order,
        }
    }

    #[test]
    fn next_after_middle_lesson() {
        let track = vec![lesson(1), lesson(2), lesson(3)];
        assert_eq!(unlock_next(&track, 2).map(|l| l.order), Some(3));
    }

    #[test]
    fn nothing_after_last_lesson() {
        let track = vec![lesson(1), lesson(2), lesson(3)];
        assert!(unlock_next(&track, 3).is_none());
    }

    #[test]
    fn skips_gaps_and_ignores_input_order() {
        let track = vec![lesson(10), lesson(4), lesson(7)];
        assert_eq!(unlock_next(&track, 4).map(|l| l.order), Some(7));
        assert_eq!(unlock_next(&track, 0).map(|l| l.order), Some(4));
    }

    #[test]
    fn current_unlock_follows_highest_completed() {
        let track = vec![lesson(1), lesson(2), lesson(3)];
        let first = track[0].id;
        let second = track[1].id;
        assert_eq!(current_unlock(&track, |_| false).map(|l| l.order), Some(1));
        assert_eq!(current_unlock(&track, |l| l.id == first).map(|l| l.order), Some(2));
        assert_eq!(
            current_unlock(&track, |l| l.id == first || l.id == second).map(|l| l.order),
            Some(3)
        );
        assert!(current_unlock(&track, |_| true).is_none());
    }

    #[test]
    fn detects_duplicate_orders() {
        assert!(has_unique_orders(&[lesson(1), lesson(2)]));
        assert!(!has_unique_orders(&[lesson(1), lesson(1)]));
    }
}
