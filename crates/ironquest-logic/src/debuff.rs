//! Time-boxed XP penalty for sustained core-quest non-compliance.
//!
//! A debuff multiplies every XP award by 0.9 for 24 hours. It is applied
//! when a day closes with [`DEBUFF_MISS_THRESHOLD`] or more missed core
//! quests and no debuff already running. Application is idempotent:
//! re-applying while active returns the existing expiry unchanged, and the
//! window never stretches past 24h from the original trigger.
//!
//! Expiry is self-checked on every read (`is_active`, `modifier`); the
//! bulk sweep only keeps stored state tidy.

use crate::compliance::DailyComplianceRecord;
use crate::constants::{DEBUFF_DURATION_MICROS, DEBUFF_MISS_THRESHOLD, DEBUFF_MULTIPLIER_PERCENT, MICROS_PER_HOUR};
use crate::player::PlayerProgress;
use serde::{Deserialize, Serialize};

/// Active multiplier applied to quest XP awards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebuffModifier {
    pub has_debuff: bool,
    /// 90 while debuffed, 100 otherwise. Integer so awards reproduce exactly.
    pub multiplier_percent: u32,
    pub description: String,
}

impl DebuffModifier {
    /// The multiplier as a fraction (0.9 or 1.0), for display.
    pub fn multiplier(&self) -> f32 {
        self.multiplier_percent as f32 / 100.0
    }
}

/// Player-facing debuff status, shaped for the status API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebuffStatus {
    pub is_active: bool,
    pub expires_at: Option<i64>,
    pub hours_remaining: f32,
    /// Penalty strength in percent (10 while active, 0 otherwise).
    pub penalty_percent: u32,
}

/// Outcome of the daily compliance check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebuffDecision {
    pub applied: bool,
    pub expires_at: Option<i64>,
    pub reason: String,
}

/// Whether a debuff with the given expiry is active at `now`.
pub fn is_active(now: i64, expires_at: Option<i64>) -> bool {
    matches!(expires_at, Some(expiry) if now < expiry)
}

/// The XP modifier in force at `now`.
pub fn modifier(now: i64, expires_at: Option<i64>) -> DebuffModifier {
    if is_active(now, expires_at) {
        DebuffModifier {
            has_debuff: true,
            multiplier_percent: DEBUFF_MULTIPLIER_PERCENT,
            description: "XP reduced by 10% for missed core quests".to_string(),
        }
    } else {
        DebuffModifier {
            has_debuff: false,
            multiplier_percent: 100,
            description: "No active debuff".to_string(),
        }
    }
}

/// Full status snapshot at `now`.
pub fn status(now: i64, expires_at: Option<i64>) -> DebuffStatus {
    let active = is_active(now, expires_at);
    let hours_remaining = if active {
        let remaining = expires_at.unwrap_or(now) - now;
        remaining as f32 / MICROS_PER_HOUR as f32
    } else {
        0.0
    };
    DebuffStatus {
        is_active: active,
        expires_at: if active { expires_at } else { None },
        hours_remaining,
        penalty_percent: if active { 100 - DEBUFF_MULTIPLIER_PERCENT } else { 0 },
    }
}

/// Start a 24h debuff window, or return the running one untouched.
pub fn apply(now: i64, expires_at: Option<i64>) -> i64 {
    match expires_at {
        Some(expiry) if now < expiry => expiry,
        _ => now + DEBUFF_DURATION_MICROS,
    }
}

/// The sole automated entry point deciding *whether* to penalize.
///
/// Applies a debuff when the day's record shows at least
/// [`DEBUFF_MISS_THRESHOLD`] missed core quests and none is active.
/// Marks the record `had_debuff` on application. Absence of a record
/// means no penalty, not an error.
pub fn check_and_apply(
    now: i64,
    record: Option<&mut DailyComplianceRecord>,
    expires_at: Option<i64>,
) -> DebuffDecision {
    let Some(record) = record else {
        return DebuffDecision {
            applied: false,
            expires_at,
            reason: "No compliance record for the day".to_string(),
        };
    };
    let missed = record.missed_count();
    if missed < DEBUFF_MISS_THRESHOLD {
        return DebuffDecision {
            applied: false,
            expires_at,
            reason: format!("Missed {missed} core quests, below threshold"),
        };
    }
    if is_active(now, expires_at) {
        return DebuffDecision {
            applied: false,
            expires_at,
            reason: "Debuff already active".to_string(),
        };
    }
    record.had_debuff = true;
    DebuffDecision {
        applied: true,
        expires_at: Some(apply(now, expires_at)),
        reason: format!("Missed {missed} core quests"),
    }
}

/// Clear lapsed debuffs across player records. Returns how many cleared.
pub fn sweep_expired(now: i64, players: &mut [PlayerProgress]) -> usize {
    let mut cleared = 0;
    for player in players.iter_mut() {
        if let Some(expiry) = player.debuff_expires_at {
            if now >= expiry {
                player.debuff_expires_at = None;
                cleared += 1;
            }
        }
    }
    cleared
}

/// Scale a base XP award by a modifier, rounding half up.
pub fn scaled_award(base_xp: u32, modifier: &DebuffModifier) -> u32 {
    (base_xp * modifier.multiplier_percent + 50) / 100
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::MICROS_PER_DAY;

    const NOW: i64 = 1_736_899_200_000_000; // 2025-01-15T00:00:00Z

    #[test]
    fn test_window_edges() {
        assert!(is_active(NOW, Some(NOW + MICROS_PER_HOUR)));
        assert!(!is_active(NOW, Some(NOW - MICROS_PER_HOUR)));
        assert!(!is_active(NOW, Some(NOW)));
        assert!(!is_active(NOW, None));
    }

    #[test]
    fn test_modifier_values() {
        let active = modifier(NOW, Some(NOW + MICROS_PER_HOUR));
        assert!(active.has_debuff);
        assert_eq!(active.multiplier_percent, 90);
        assert!((active.multiplier() - 0.9).abs() < f32::EPSILON);

        let lapsed = modifier(NOW, Some(NOW - MICROS_PER_HOUR));
        assert!(!lapsed.has_debuff);
        assert_eq!(lapsed.multiplier_percent, 100);

        assert!(!modifier(NOW, None).has_debuff);
    }

    #[test]
    fn test_scaled_award_rounding() {
        let debuffed = modifier(NOW, Some(NOW + MICROS_PER_HOUR));
        assert_eq!(scaled_award(50, &debuffed), 45);
        assert_eq!(scaled_award(25, &debuffed), 23); // 22.5 rounds up
        assert_eq!(scaled_award(0, &debuffed), 0);
        let clean = modifier(NOW, None);
        assert_eq!(scaled_award(50, &clean), 50);
    }

    #[test]
    fn test_apply_is_idempotent_while_active() {
        let first = apply(NOW, None);
        assert_eq!(first, NOW + MICROS_PER_DAY);
        // Re-applying mid-window must not extend the expiry.
        let second = apply(NOW + MICROS_PER_HOUR, Some(first));
        assert_eq!(second, first);
        // After expiry a fresh window starts.
        let third = apply(first + 1, Some(first));
        assert_eq!(third, first + 1 + MICROS_PER_DAY);
    }

    #[test]
    fn test_check_applies_on_two_misses() {
        let mut record = DailyComplianceRecord::new("user-1", "2025-01-15");
        record.core_quests_total = 4;
        record.core_quests_completed = 2;
        let decision = check_and_apply(NOW, Some(&mut record), None);
        assert!(decision.applied);
        assert_eq!(decision.expires_at, Some(NOW + MICROS_PER_DAY));
        assert_eq!(decision.reason, "Missed 2 core quests");
        assert!(record.had_debuff);
    }

    #[test]
    fn test_check_refuses_when_already_active() {
        let mut record = DailyComplianceRecord::new("user-1", "2025-01-16");
        record.core_quests_total = 4;
        record.core_quests_completed = 0;
        let running = Some(NOW + 2 * MICROS_PER_HOUR);
        let decision = check_and_apply(NOW, Some(&mut record), running);
        assert!(!decision.applied);
        assert_eq!(decision.expires_at, running);
        assert_eq!(decision.reason, "Debuff already active");
        assert!(!record.had_debuff);
    }

    #[test]
    fn test_check_below_threshold_and_missing_record() {
        let mut record = DailyComplianceRecord::new("user-1", "2025-01-15");
        record.core_quests_total = 4;
        record.core_quests_completed = 3;
        let decision = check_and_apply(NOW, Some(&mut record), None);
        assert!(!decision.applied);

        let absent = check_and_apply(NOW, None, None);
        assert!(!absent.applied);
        assert_eq!(absent.reason, "No compliance record for the day");
    }

    #[test]
    fn test_status_shape() {
        let s = status(NOW, Some(NOW + 2 * MICROS_PER_HOUR));
        assert!(s.is_active);
        assert!((s.hours_remaining - 2.0).abs() < 0.001);
        assert_eq!(s.penalty_percent, 10);

        let clean = status(NOW, Some(NOW - 1));
        assert!(!clean.is_active);
        assert_eq!(clean.expires_at, None);
        assert_eq!(clean.penalty_percent, 0);
    }

    #[test]
    fn test_sweep_clears_only_lapsed() {
        let mut players = vec![
            PlayerProgress::new("a", "2025-01-01"),
            PlayerProgress::new("b", "2025-01-01"),
            PlayerProgress::new("c", "2025-01-01"),
        ];
        players[0].debuff_expires_at = Some(NOW - 1);
        players[1].debuff_expires_at = Some(NOW + 1);
        let cleared = sweep_expired(NOW, &mut players);
        assert_eq!(cleared, 1);
        assert_eq!(players[0].debuff_expires_at, None);
        assert_eq!(players[1].debuff_expires_at, Some(NOW + 1));
        assert_eq!(players[2].debuff_expires_at, None);
    }
}
