//! crates/learning_progress_core/src/level.rs
//!
//! Maps accumulated XP to a level. Everything here is derived from `xp` alone.

use crate::domain::LevelProgress;

/// Cumulative XP required to reach levels 1 through 10.
const LEVEL_THRESHOLDS: [i64; 10] = [0, 50, 150, 300, 500, 750, 1050, 1400, 1800, 2250];

/// XP width of every level past the end of the table.
const XP_PER_LEVEL_BEYOND_TABLE: i64 = 500;

const TABLE_MAX_LEVEL: i32 = LEVEL_THRESHOLDS.len() as i32;
const TABLE_MAX_XP: i64 = LEVEL_THRESHOLDS[LEVEL_THRESHOLDS.len() - 1];

/// Returns the level reached with `xp` experience points. Negative input counts as 0.
pub fn level_of(xp: i64) -> i32 {
    let xp = xp.max(0);
    if xp >= TABLE_MAX_XP {
        let extra = (xp - TABLE_MAX_XP) / XP_PER_LEVEL_BEYOND_TABLE;
        return TABLE_MAX_LEVEL.saturating_add(i32::try_from(extra).unwrap_or(i32::MAX));
    }
    LEVEL_THRESHOLDS
        .iter()
        .rposition(|&threshold| xp >= threshold)
        .map_or(1, |index| index as i32 + 1)
}

/// Cumulative XP at which `level` is reached.
pub fn threshold_for(level: i32) -> i64 {
    if level <= 1 {
        return 0;
    }
    if level <= TABLE_MAX_LEVEL {
        return LEVEL_THRESHOLDS[(level - 1) as usize];
    }
    TABLE_MAX_XP + i64::from(level - TABLE_MAX_LEVEL) * XP_PER_LEVEL_BEYOND_TABLE
}

/// Progress-bar data for the level `xp` falls into.
pub fn level_progress(xp: i64) -> LevelProgress {
    let xp = xp.max(0);
    let level = level_of(xp);
    let current = threshold_for(level);
    let next = threshold_for(level.saturating_add(1));
    LevelProgress {
        level,
        xp_into_level: xp - current,
        xp_to_next_level: next - xp,
        level_span: next - current,
    }
}
