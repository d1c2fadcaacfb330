//! crates/learning_progress_core/src/streak.rs
//!
//! Day-gap rules for the consecutive-day streak.

use chrono::{Days, NaiveDate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreakUpdate {
    pub streak: i32,
    pub last_active_date: NaiveDate,
}

/// Evaluates one qualifying activity on `today`.
///
/// Yesterday continues the streak, today leaves it unchanged, anything else
/// (including no prior activity) starts over at 1.
pub fn advance_streak(current: i32, last_active: Option<NaiveDate>, today: NaiveDate) -> StreakUpdate {
    let yesterday = today.checked_sub_days(Days::new(1));
    let streak = match last_active {
        Some(last) if last == today => current,
        Some(last) if Some(last) == yesterday => current.saturating_add(1),
        _ => 1,
    };
    StreakUpdate {
        streak,
        last_active_date: today,
    }
}

/// True when `new_streak` just crossed onto a positive multiple of `interval`.
pub fn is_milestone(previous: i32, new_streak: i32, interval: i32) -> bool {
    interval > 0 && new_streak > 0 && new_streak > previous && new_streak % interval == 0
}
