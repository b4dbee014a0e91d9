//! Quest instance state machine: assignment, progress, completion, undo.
//!
//! Transitions:
//!
//! ```text
//! Active ──complete──▶ Completed ──reset──▶ Active   (same day only)
//! Active ──rollover──▶ Failed   (core: counts as a miss)
//! Active ──rollover──▶ Expired  (non-core: no penalty)
//! Active ──remove───▶ deleted   (non-core only)
//! ```
//!
//! Completion, reset, and the compliance counters all move inside one
//! call so the host can persist the whole transition atomically under a
//! per-player transaction. `xp_awarded` is `Some` exactly while the quest
//! is `Completed`.

use crate::compliance::DailyComplianceRecord;
use crate::debuff;
use crate::levels::LevelTable;
use crate::player::PlayerProgress;
use crate::templates::QuestTemplate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Quest lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum QuestStatus {
    Active = 0,
    Completed = 1,
    Failed = 2,
    Expired = 3,
}

impl QuestStatus {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(val: u8) -> Option<Self> {
        match val {
            0 => Some(Self::Active),
            1 => Some(Self::Completed),
            2 => Some(Self::Failed),
            3 => Some(Self::Expired),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Expired => "expired",
        }
    }
}

/// Errors surfaced by lifecycle operations. Every variant renders a
/// human-readable reason for the API layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuestError {
    #[error("cannot {action}: quest is {}", .from.name())]
    InvalidState {
        from: QuestStatus,
        action: &'static str,
    },
    #[error("completion at {percent}% is below the required {required}%")]
    NotEligible { percent: u32, required: u32 },
    #[error("core quests cannot be removed")]
    CannotRemoveCoreQuest,
    #[error("quest template {0} not found")]
    TemplateNotFound(u64),
    #[error("quest catalog invalid: {0}")]
    CatalogInvalid(String),
}

/// One assigned quest for one player on one day.
///
/// Template fields that matter after assignment (XP, target, partial
/// rules, stat bonus) are snapshotted here, so later catalog edits never
/// rewrite history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestInstance {
    pub id: u64,
    pub template_id: u64,
    pub user_id: String,
    /// `YYYY-MM-DD` the quest belongs to.
    pub quest_date: String,
    pub is_core: bool,
    pub base_xp: u32,
    pub target_value: u32,
    pub current_value: u32,
    pub allow_partial: bool,
    pub min_partial_percent: Option<u32>,
    pub stat_type: u8,
    pub stat_bonus: u32,
    pub status: QuestStatus,
    /// `Some` if and only if `status == Completed`.
    pub xp_awarded: Option<u32>,
    /// Epoch microseconds of completion.
    pub completed_at: Option<i64>,
}

/// Progress report against a quest counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProgressUpdate {
    /// Add to the current value (activity deltas from health sync).
    Delta(u32),
    /// Replace the current value (daily totals from health sync).
    Absolute(u32),
}

/// Result of a successful completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteOutcome {
    pub xp_awarded: u32,
    pub leveled_up: bool,
    pub new_level: u32,
    pub completion_percent: u32,
}

/// Create an `Active` instance from a template for a given day.
pub fn assign(template: &QuestTemplate, user_id: &str, date: &str, id: u64) -> QuestInstance {
    QuestInstance {
        id,
        template_id: template.id,
        user_id: user_id.to_string(),
        quest_date: date.to_string(),
        is_core: template.is_core,
        base_xp: template.base_xp,
        target_value: template.requirement.target_value(),
        current_value: 0,
        allow_partial: template.allow_partial,
        min_partial_percent: template.min_partial_percent,
        stat_type: template.stat_type,
        stat_bonus: template.stat_bonus,
        status: QuestStatus::Active,
        xp_awarded: None,
        completed_at: None,
    }
}

/// Percent of target reached, rounded half up, capped at 100.
pub fn completion_percent(quest: &QuestInstance) -> u32 {
    let target = quest.target_value.max(1) as u64;
    let current = (quest.current_value as u64).min(target);
    ((200 * current + target) / (2 * target)) as u32
}

/// Record reported activity against an `Active` quest.
///
/// Never transitions status — completion is a separate, explicit call.
/// Returns the resulting completion percent.
pub fn report_progress(
    quest: &mut QuestInstance,
    update: ProgressUpdate,
) -> Result<u32, QuestError> {
    if quest.status != QuestStatus::Active {
        return Err(QuestError::InvalidState {
            from: quest.status,
            action: "report progress",
        });
    }
    quest.current_value = match update {
        ProgressUpdate::Delta(amount) => quest.current_value.saturating_add(amount),
        ProgressUpdate::Absolute(value) => value,
    };
    Ok(completion_percent(quest))
}

/// Complete an `Active` quest, award XP and stats, detect a level-up.
///
/// Below-target completion requires `allow_partial` and a met partial
/// threshold. The player XP total, the stat block, and — for core quests
/// — the day's completion counter all move here, in one call.
pub fn complete(
    quest: &mut QuestInstance,
    player: &mut PlayerProgress,
    record: &mut DailyComplianceRecord,
    table: &LevelTable,
    now: i64,
) -> Result<CompleteOutcome, QuestError> {
    if quest.status != QuestStatus::Active {
        return Err(QuestError::InvalidState {
            from: quest.status,
            action: "complete",
        });
    }
    let percent = completion_percent(quest);
    if quest.current_value < quest.target_value {
        let threshold = match (quest.allow_partial, quest.min_partial_percent) {
            (true, Some(p)) => p,
            // Partial not allowed, or a stale row lost its threshold:
            // below-target completion is refused either way.
            _ => 100,
        };
        if percent < threshold {
            return Err(QuestError::NotEligible {
                percent,
                required: threshold,
            });
        }
    }

    let modifier = debuff::modifier(now, player.debuff_expires_at);
    let awarded = debuff::scaled_award(quest.base_xp, &modifier);

    let old_level = table.level_for_xp(&player.xp_total);
    player.add_xp(awarded);
    let new_level = table.level_for_xp(&player.xp_total);
    player.stats.add(quest.stat_type, quest.stat_bonus);

    quest.status = QuestStatus::Completed;
    quest.xp_awarded = Some(awarded);
    quest.completed_at = Some(now);
    if quest.is_core {
        record.record_completion();
    }

    Ok(CompleteOutcome {
        xp_awarded: awarded,
        leveled_up: new_level > old_level,
        new_level,
        completion_percent: percent,
    })
}

/// Undo a completion, restoring XP, stats, counters, and status exactly.
///
/// Only valid from `Completed`, and only while the quest's own day is
/// still current — day rollover freezes history. Calling it on an
/// already-`Active` quest is a loud `InvalidState`, not a silent no-op,
/// so double-submission bugs surface.
pub fn reset(
    quest: &mut QuestInstance,
    player: &mut PlayerProgress,
    record: &mut DailyComplianceRecord,
    today: &str,
) -> Result<u32, QuestError> {
    if quest.status != QuestStatus::Completed {
        return Err(QuestError::InvalidState {
            from: quest.status,
            action: "reset",
        });
    }
    if quest.quest_date != today {
        return Err(QuestError::InvalidState {
            from: quest.status,
            action: "reset a past-day quest",
        });
    }
    let Some(awarded) = quest.xp_awarded.take() else {
        // Completed without an award violates the status invariant.
        return Err(QuestError::InvalidState {
            from: quest.status,
            action: "reset",
        });
    };
    player.sub_xp(awarded);
    player.stats.sub(quest.stat_type, quest.stat_bonus);
    if quest.is_core {
        record.record_reset();
    }
    quest.status = QuestStatus::Active;
    quest.completed_at = None;
    Ok(awarded)
}

/// Validate that a quest may be removed outright (non-core, `Active`).
/// The host deletes the row after this passes; no XP moves.
pub fn remove(quest: &QuestInstance) -> Result<(), QuestError> {
    if quest.is_core {
        return Err(QuestError::CannotRemoveCoreQuest);
    }
    if quest.status != QuestStatus::Active {
        return Err(QuestError::InvalidState {
            from: quest.status,
            action: "remove",
        });
    }
    Ok(())
}

/// Day rollover: close out every still-`Active` quest from a past day.
///
/// Core quests become `Failed` (they count as misses for the debuff
/// check); optional quests become `Expired` with no penalty. Returns how
/// many quests transitioned.
pub fn expire_day(quests: &mut [QuestInstance], today: &str) -> usize {
    let mut transitioned = 0;
    for quest in quests.iter_mut() {
        if quest.status == QuestStatus::Active && quest.quest_date.as_str() < today {
            quest.status = if quest.is_core {
                QuestStatus::Failed
            } else {
                QuestStatus::Expired
            };
            transitioned += 1;
        }
    }
    transitioned
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::MICROS_PER_HOUR;
    use crate::templates::{builtin_catalog, find_template};
    use num_bigint::BigUint;

    const NOW: i64 = 1_736_899_200_000_000;
    const TODAY: &str = "2025-01-15";

    fn fixture() -> (QuestInstance, PlayerProgress, DailyComplianceRecord, LevelTable) {
        let catalog = builtin_catalog();
        let steps = find_template(&catalog, 1).unwrap();
        let quest = assign(steps, "user-1", TODAY, 101);
        let mut record = DailyComplianceRecord::new("user-1", TODAY);
        record.record_assignment(4);
        (
            quest,
            PlayerProgress::new("user-1", "2025-01-01"),
            record,
            LevelTable::default(),
        )
    }

    #[test]
    fn test_assign_snapshot() {
        let (quest, ..) = fixture();
        assert_eq!(quest.status, QuestStatus::Active);
        assert_eq!(quest.current_value, 0);
        assert_eq!(quest.target_value, 6000);
        assert_eq!(quest.base_xp, 50);
        assert!(quest.is_core);
        assert_eq!(quest.xp_awarded, None);
    }

    #[test]
    fn test_progress_accumulates_without_transition() {
        let (mut quest, ..) = fixture();
        assert_eq!(
            report_progress(&mut quest, ProgressUpdate::Delta(1500)).unwrap(),
            25
        );
        assert_eq!(
            report_progress(&mut quest, ProgressUpdate::Delta(1500)).unwrap(),
            50
        );
        assert_eq!(
            report_progress(&mut quest, ProgressUpdate::Absolute(9000)).unwrap(),
            100
        );
        assert_eq!(quest.status, QuestStatus::Active);
        assert_eq!(quest.current_value, 9000);
    }

    #[test]
    fn test_completion_percent_rounds_half_up() {
        let (mut quest, ..) = fixture();
        quest.target_value = 400;
        quest.current_value = 2; // 0.5%
        assert_eq!(completion_percent(&quest), 1);
        quest.current_value = 1; // 0.25%
        assert_eq!(completion_percent(&quest), 0);
    }

    #[test]
    fn test_complete_awards_and_counts() {
        let (mut quest, mut player, mut record, table) = fixture();
        report_progress(&mut quest, ProgressUpdate::Absolute(6000)).unwrap();
        let outcome = complete(&mut quest, &mut player, &mut record, &table, NOW).unwrap();
        assert_eq!(outcome.xp_awarded, 50);
        assert!(!outcome.leveled_up);
        assert_eq!(outcome.new_level, 1);
        assert_eq!(quest.status, QuestStatus::Completed);
        assert_eq!(quest.xp_awarded, Some(50));
        assert_eq!(quest.completed_at, Some(NOW));
        assert_eq!(player.xp_string(), "50");
        assert_eq!(player.stats.endurance, 2);
        assert_eq!(record.core_quests_completed, 1);
    }

    #[test]
    fn test_complete_detects_level_up() {
        let (mut quest, mut player, mut record, table) = fixture();
        player.xp_total = BigUint::from(99u32);
        report_progress(&mut quest, ProgressUpdate::Absolute(6000)).unwrap();
        let outcome = complete(&mut quest, &mut player, &mut record, &table, NOW).unwrap();
        assert_eq!(outcome.xp_awarded, 50);
        assert!(outcome.leveled_up);
        assert_eq!(outcome.new_level, 2);
        assert_eq!(player.xp_string(), "149");
    }

    #[test]
    fn test_complete_applies_debuff_modifier() {
        let (mut quest, mut player, mut record, table) = fixture();
        player.debuff_expires_at = Some(NOW + 2 * MICROS_PER_HOUR);
        report_progress(&mut quest, ProgressUpdate::Absolute(6000)).unwrap();
        let outcome = complete(&mut quest, &mut player, &mut record, &table, NOW).unwrap();
        assert_eq!(outcome.xp_awarded, 45); // round(50 * 0.9)
    }

    #[test]
    fn test_partial_completion_rules() {
        let (mut quest, mut player, mut record, table) = fixture();
        // Template 1 allows partial at 60%.
        report_progress(&mut quest, ProgressUpdate::Absolute(3000)).unwrap(); // 50%
        let err = complete(&mut quest, &mut player, &mut record, &table, NOW).unwrap_err();
        assert_eq!(
            err,
            QuestError::NotEligible {
                percent: 50,
                required: 60
            }
        );
        assert_eq!(quest.status, QuestStatus::Active);

        report_progress(&mut quest, ProgressUpdate::Absolute(3600)).unwrap(); // 60%
        let outcome = complete(&mut quest, &mut player, &mut record, &table, NOW).unwrap();
        assert_eq!(outcome.completion_percent, 60);
        assert_eq!(outcome.xp_awarded, 50);
    }

    #[test]
    fn test_strict_quest_requires_full_target() {
        let catalog = builtin_catalog();
        let session = find_template(&catalog, 2).unwrap(); // no partial
        let mut quest = assign(session, "user-1", TODAY, 102);
        let mut player = PlayerProgress::new("user-1", "2025-01-01");
        let mut record = DailyComplianceRecord::new("user-1", TODAY);
        let table = LevelTable::default();

        let err = complete(&mut quest, &mut player, &mut record, &table, NOW).unwrap_err();
        assert!(matches!(err, QuestError::NotEligible { required: 100, .. }));

        report_progress(&mut quest, ProgressUpdate::Delta(1)).unwrap();
        assert!(complete(&mut quest, &mut player, &mut record, &table, NOW).is_ok());
    }

    #[test]
    fn test_complete_reset_round_trip() {
        let (mut quest, mut player, mut record, table) = fixture();
        player.xp_total = BigUint::from(1234u32);
        player.stats.endurance = 7;
        let before_quest = quest.clone();
        let before_player = player.clone();
        let before_completed = record.core_quests_completed;

        report_progress(&mut quest, ProgressUpdate::Absolute(6000)).unwrap();
        complete(&mut quest, &mut player, &mut record, &table, NOW).unwrap();
        let reversed = reset(&mut quest, &mut player, &mut record, TODAY).unwrap();

        assert_eq!(reversed, 50);
        assert_eq!(player.xp_total, before_player.xp_total);
        assert_eq!(player.stats, before_player.stats);
        assert_eq!(record.core_quests_completed, before_completed);
        assert_eq!(quest.status, QuestStatus::Active);
        assert_eq!(quest.xp_awarded, None);
        assert_eq!(quest.completed_at, None);
        // Progress reported before completion survives the undo.
        assert_eq!(quest.current_value, 6000);
        assert_eq!(quest.template_id, before_quest.template_id);
    }

    #[test]
    fn test_reset_twice_is_loud() {
        let (mut quest, mut player, mut record, table) = fixture();
        report_progress(&mut quest, ProgressUpdate::Absolute(6000)).unwrap();
        complete(&mut quest, &mut player, &mut record, &table, NOW).unwrap();
        reset(&mut quest, &mut player, &mut record, TODAY).unwrap();
        let err = reset(&mut quest, &mut player, &mut record, TODAY).unwrap_err();
        assert!(matches!(
            err,
            QuestError::InvalidState {
                from: QuestStatus::Active,
                ..
            }
        ));
    }

    #[test]
    fn test_reset_refused_after_rollover() {
        let (mut quest, mut player, mut record, table) = fixture();
        report_progress(&mut quest, ProgressUpdate::Absolute(6000)).unwrap();
        complete(&mut quest, &mut player, &mut record, &table, NOW).unwrap();
        let err = reset(&mut quest, &mut player, &mut record, "2025-01-16").unwrap_err();
        assert!(matches!(err, QuestError::InvalidState { .. }));
        assert_eq!(quest.status, QuestStatus::Completed);
        assert_eq!(player.xp_string(), "50");
    }

    #[test]
    fn test_remove_rules() {
        let catalog = builtin_catalog();
        let hike = find_template(&catalog, 30).unwrap(); // optional
        let quest = assign(hike, "user-1", TODAY, 103);
        assert!(remove(&quest).is_ok());

        let (core_quest, ..) = fixture();
        assert_eq!(remove(&core_quest), Err(QuestError::CannotRemoveCoreQuest));

        let mut done = assign(hike, "user-1", TODAY, 104);
        done.status = QuestStatus::Expired;
        assert!(matches!(
            remove(&done),
            Err(QuestError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_expire_day_splits_core_and_optional() {
        let catalog = builtin_catalog();
        let steps = find_template(&catalog, 1).unwrap();
        let hike = find_template(&catalog, 30).unwrap();
        let mut quests = vec![
            assign(steps, "user-1", "2025-01-14", 1), // past core -> Failed
            assign(hike, "user-1", "2025-01-14", 2),  // past optional -> Expired
            assign(steps, "user-1", TODAY, 3),        // today -> untouched
        ];
        quests.push({
            let mut done = assign(steps, "user-1", "2025-01-14", 4);
            done.status = QuestStatus::Completed;
            done.xp_awarded = Some(50);
            done
        });

        let transitioned = expire_day(&mut quests, TODAY);
        assert_eq!(transitioned, 2);
        assert_eq!(quests[0].status, QuestStatus::Failed);
        assert_eq!(quests[1].status, QuestStatus::Expired);
        assert_eq!(quests[2].status, QuestStatus::Active);
        assert_eq!(quests[3].status, QuestStatus::Completed);
    }

    #[test]
    fn test_award_invariant_holds_across_lifecycle() {
        let (mut quest, mut player, mut record, table) = fixture();
        assert!(quest.xp_awarded.is_none());
        report_progress(&mut quest, ProgressUpdate::Absolute(6000)).unwrap();
        complete(&mut quest, &mut player, &mut record, &table, NOW).unwrap();
        assert!(quest.xp_awarded.is_some());
        reset(&mut quest, &mut player, &mut record, TODAY).unwrap();
        assert!(quest.xp_awarded.is_none());
    }
}
