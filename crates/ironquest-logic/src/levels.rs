//! Power-law XP curve, level thresholds, and progress-to-next-level.
//!
//! Experience totals are arbitrary-precision ([`num_bigint::BigUint`]) so
//! they stay exact far beyond 2^53 — long-running accounts never drift the
//! way a float-backed total would.
//!
//! The curve: reaching level `n + 1` from level `n` costs
//! `floor(BASE_XP * n^1.5)` XP. The floor is taken per step, computed
//! exactly as `isqrt(BASE_XP^2 * n^3)` — no floating point anywhere.
//!
//! ```
//! use ironquest_logic::levels::LevelTable;
//! use num_bigint::BigUint;
//!
//! let table = LevelTable::new(20);
//! assert_eq!(table.level_for_xp(&BigUint::from(149u32)), 2);
//! ```
//!
//! [`LevelTable`] is the one cache in the engine. It is built explicitly
//! by whoever owns the service lifecycle and is immutable afterwards, so
//! parallel tests and requests can share it freely.

use crate::constants::{BASE_XP, DEFAULT_TABLE_LEVELS, DEFAULT_THRESHOLD_ROWS};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

/// Cumulative XP total owned by a player. Monotonic except for explicit
/// completion undo.
pub type ExperienceTotal = BigUint;

/// XP cost of the step from `level` to `level + 1`: `floor(BASE_XP * level^1.5)`.
///
/// Exact integer form: `isqrt(BASE_XP^2 * level^3)`.
pub fn xp_for_level(level: u32) -> BigUint {
    if level == 0 {
        return BigUint::default();
    }
    let base = BigUint::from(BASE_XP);
    (base.pow(2) * BigUint::from(level).pow(3)).sqrt()
}

/// Progress snapshot for a given XP total, shaped for the level-display API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelProgress {
    pub current_level: u32,
    /// Cumulative XP required to reach the current level.
    pub xp_for_current_level: BigUint,
    /// Cumulative XP required to reach the next level.
    pub xp_for_next_level: BigUint,
    /// XP earned past the current level threshold.
    pub xp_progress: BigUint,
    /// XP between the current and next thresholds.
    pub xp_needed: BigUint,
    /// `floor(100 * xp_progress / xp_needed)`, clamped to 0–100.
    pub progress_percent: u32,
}

/// One row of the threshold listing shown on level-up screens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdRow {
    pub level: u32,
    /// Cumulative XP required to reach this level.
    pub total_xp: BigUint,
    /// Additional XP from this level to the next.
    pub xp_to_next: BigUint,
}

/// Prebuilt cumulative threshold table.
///
/// `thresholds[i]` is the cumulative XP required to reach level `i + 1`
/// (so `thresholds[0] == 0`). Lookups past the prebuilt depth continue the
/// sum locally without mutating the table, so a shallow table is never
/// wrong — only slower for very high levels.
#[derive(Debug, Clone)]
pub struct LevelTable {
    thresholds: Vec<BigUint>,
}

impl Default for LevelTable {
    fn default() -> Self {
        Self::new(DEFAULT_TABLE_LEVELS)
    }
}

impl LevelTable {
    /// Build a table covering levels 1..=`max_level`.
    pub fn new(max_level: u32) -> Self {
        let depth = max_level.max(2) as usize;
        let mut thresholds = Vec::with_capacity(depth);
        let mut cumulative = BigUint::default();
        for level in 1..=depth as u32 {
            thresholds.push(cumulative.clone());
            cumulative += xp_for_level(level);
        }
        Self { thresholds }
    }

    /// Cumulative XP required to reach `level`. Zero for `level <= 1`.
    pub fn threshold(&self, level: u32) -> BigUint {
        if level <= 1 {
            return BigUint::default();
        }
        if let Some(t) = self.thresholds.get(level as usize - 1) {
            return t.clone();
        }
        // Continue the sum past the prebuilt depth.
        let mut reached = self.thresholds.len() as u32;
        let mut cumulative = self.thresholds[reached as usize - 1].clone();
        while reached < level {
            cumulative += xp_for_level(reached);
            reached += 1;
        }
        cumulative
    }

    /// The largest level whose threshold is at or below `xp`.
    pub fn level_for_xp(&self, xp: &ExperienceTotal) -> u32 {
        let cached = self.thresholds.partition_point(|t| t <= xp);
        if cached < self.thresholds.len() {
            return cached as u32;
        }
        // XP exceeds the prebuilt depth — walk the curve forward.
        let mut level = self.thresholds.len() as u32;
        let mut cumulative = self.thresholds[level as usize - 1].clone();
        loop {
            let next = &cumulative + xp_for_level(level);
            if &next > xp {
                return level;
            }
            cumulative = next;
            level += 1;
        }
    }

    /// Progress toward the next level for an XP total.
    pub fn progress(&self, xp: &ExperienceTotal) -> LevelProgress {
        let current_level = self.level_for_xp(xp);
        let xp_for_current_level = self.threshold(current_level);
        let xp_for_next_level = self.threshold(current_level + 1);
        let xp_progress = xp - &xp_for_current_level;
        let xp_needed = &xp_for_next_level - &xp_for_current_level;
        let percent = (BigUint::from(100u32) * &xp_progress) / &xp_needed;
        let progress_percent = u32::try_from(&percent).unwrap_or(100).min(100);
        LevelProgress {
            current_level,
            xp_for_current_level,
            xp_for_next_level,
            xp_progress,
            xp_needed,
            progress_percent,
        }
    }

    /// Threshold listing for levels 1..=`max_level` (display helper).
    /// Strictly increasing in both `level` and `total_xp`.
    pub fn threshold_rows(&self, max_level: Option<u32>) -> Vec<ThresholdRow> {
        let cap = max_level.unwrap_or(DEFAULT_THRESHOLD_ROWS).max(1);
        (1..=cap)
            .map(|level| ThresholdRow {
                level,
                total_xp: self.threshold(level),
                xp_to_next: xp_for_level(level),
            })
            .collect()
    }
}
