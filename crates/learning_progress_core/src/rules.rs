//! crates/learning_progress_core/src/rules.rs
//!
//! Tunable gamification constants.

use crate::ports::{PortError, PortResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GamificationRules {
    /// XP for the first completion of a lesson.
    pub lesson_completion_xp: i64,
    /// Quiz XP per correct answer of the best attempt.
    pub xp_per_correct_answer: i64,
    /// A quiz scoring at least this percentage is passed.
    pub pass_threshold_percent: i32,
    /// A streak that lands on a positive multiple of this earns a bonus.
    pub streak_milestone_interval: i32,
    /// Milestone bonus is `streak * streak_bonus_per_day`.
    pub streak_bonus_per_day: i64,
    /// Smallest award that gets its own generic `xp_earned` activity.
    pub generic_xp_activity_min: i64,
    /// Number of questions drawn for the general pathway quiz.
    pub general_quiz_size: usize,
}

impl Default for GamificationRules {
    fn default() -> Self {
        Self {
            lesson_completion_xp: 25,
            xp_per_correct_answer: 10,
            pass_threshold_percent: 70,
            streak_milestone_interval: 5,
            streak_bonus_per_day: 10,
            generic_xp_activity_min: 10,
            general_quiz_size: 5,
        }
    }
}

impl GamificationRules {
    pub fn validate(&self) -> PortResult<()> {
        if self.lesson_completion_xp < 0 || self.xp_per_correct_answer < 0 || self.streak_bonus_per_day < 0 {
            return Err(PortError::Validation("XP amounts must not be negative".to_string()));
        }
        if !(1..=100).contains(&self.pass_threshold_percent) {
            return Err(PortError::Validation(
                "Pass threshold must be between 1 and 100 percent".to_string(),
            ));
        }
        if self.streak_milestone_interval <= 0 {
            return Err(PortError::Validation("Streak milestone interval must be positive".to_string()));
        }
        if self.general_quiz_size == 0 {
            return Err(PortError::Validation("General quiz size must be positive".to_string()));
        }
        Ok(())
    }

    pub fn is_passing(&self, score_percent: i32) -> bool {
        score_percent >= self.pass_threshold_percent
    }
}
