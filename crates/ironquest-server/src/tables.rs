//! SpacetimeDB table definitions for the progression engine.
//!
//! Rows are flat storage shapes; each converts to and from the plain
//! structs `ironquest-logic` operates on. The XP total is stored as a
//! decimal string so it stays exact at any magnitude.

use ironquest_logic::compliance::DailyComplianceRecord;
use ironquest_logic::player::{parse_xp, PlayerProgress, StatBlock};
use ironquest_logic::quests::{QuestInstance, QuestStatus};
use spacetimedb::{table, Identity, ScheduleAt};

use crate::reducers::{run_day_rollover, sweep_expired_debuffs};

// ============================================================================
// PLAYERS
// ============================================================================

/// One registered player and their progression aggregate.
#[table(name = player, public)]
#[derive(Clone)]
pub struct Player {
    #[primary_key]
    #[auto_inc]
    pub id: u64,
    #[unique]
    pub identity: Identity,
    pub name: String,
    /// Decimal string; parsed to an arbitrary-precision total.
    pub xp_total: String,
    pub strength: u32,
    pub endurance: u32,
    pub agility: u32,
    pub vitality: u32,
    pub discipline: u32,
    /// Debuff expiry in epoch microseconds, when one is stored.
    pub debuff_expires_at: Option<i64>,
    /// `YYYY-MM-DD` of registration; drives the rotating unlock gate.
    pub account_created_date: String,
    pub streak: u32,
}

impl Player {
    /// Stable key used for rotation hashing and instance ownership.
    pub fn user_key(&self) -> String {
        format!("user-{}", self.id)
    }

    pub fn to_progress(&self) -> PlayerProgress {
        PlayerProgress {
            user_id: self.user_key(),
            xp_total: parse_xp(&self.xp_total),
            stats: StatBlock {
                strength: self.strength,
                endurance: self.endurance,
                agility: self.agility,
                vitality: self.vitality,
                discipline: self.discipline,
            },
            debuff_expires_at: self.debuff_expires_at,
            account_created_date: self.account_created_date.clone(),
            streak: self.streak,
        }
    }

    pub fn apply_progress(&mut self, progress: &PlayerProgress) {
        self.xp_total = progress.xp_total.to_string();
        self.strength = progress.stats.strength;
        self.endurance = progress.stats.endurance;
        self.agility = progress.stats.agility;
        self.vitality = progress.stats.vitality;
        self.discipline = progress.stats.discipline;
        self.debuff_expires_at = progress.debuff_expires_at;
        self.streak = progress.streak;
    }
}

// ============================================================================
// QUEST CATALOG
// ============================================================================

/// Immutable template row, seeded from `data/quest_catalog.json` at init.
///
/// The queryable columns are denormalized; `spec` holds the full template
/// JSON the engine deserializes.
#[table(name = quest_template, public)]
#[derive(Clone)]
pub struct QuestTemplateRow {
    #[primary_key]
    pub id: u64,
    pub is_core: bool,
    pub rotating: bool,
    pub min_level: u32,
    pub spec: String,
}

// ============================================================================
// QUEST INSTANCES
// ============================================================================

/// One assigned quest for one player on one day.
#[table(name = quest_instance, public)]
#[derive(Clone)]
pub struct QuestInstanceRow {
    #[primary_key]
    #[auto_inc]
    pub id: u64,
    #[index(btree)]
    pub player_id: u64,
    pub template_id: u64,
    pub quest_date: String,
    pub is_core: bool,
    pub base_xp: u32,
    pub target_value: u32,
    pub current_value: u32,
    pub allow_partial: bool,
    pub min_partial_percent: Option<u32>,
    pub stat_type: u8,
    pub stat_bonus: u32,
    /// `QuestStatus` as u8.
    pub status: u8,
    pub xp_awarded: Option<u32>,
    pub completed_at: Option<i64>,
}

impl QuestInstanceRow {
    pub fn from_instance(player_id: u64, q: &QuestInstance) -> Self {
        Self {
            id: q.id,
            player_id,
            template_id: q.template_id,
            quest_date: q.quest_date.clone(),
            is_core: q.is_core,
            base_xp: q.base_xp,
            target_value: q.target_value,
            current_value: q.current_value,
            allow_partial: q.allow_partial,
            min_partial_percent: q.min_partial_percent,
            stat_type: q.stat_type,
            stat_bonus: q.stat_bonus,
            status: q.status.as_u8(),
            xp_awarded: q.xp_awarded,
            completed_at: q.completed_at,
        }
    }

    pub fn to_instance(&self, user_key: &str) -> QuestInstance {
        QuestInstance {
            id: self.id,
            template_id: self.template_id,
            user_id: user_key.to_string(),
            quest_date: self.quest_date.clone(),
            is_core: self.is_core,
            base_xp: self.base_xp,
            target_value: self.target_value,
            current_value: self.current_value,
            allow_partial: self.allow_partial,
            min_partial_percent: self.min_partial_percent,
            stat_type: self.stat_type,
            stat_bonus: self.stat_bonus,
            // Unknown stored status reads as Expired: dead history, never
            // a live quest resurrected by a bad byte.
            status: QuestStatus::from_u8(self.status).unwrap_or(QuestStatus::Expired),
            xp_awarded: self.xp_awarded,
            completed_at: self.completed_at,
        }
    }

    pub fn apply_instance(&mut self, q: &QuestInstance) {
        self.current_value = q.current_value;
        self.status = q.status.as_u8();
        self.xp_awarded = q.xp_awarded;
        self.completed_at = q.completed_at;
    }
}

// ============================================================================
// DAILY COMPLIANCE
// ============================================================================

/// Core-quest compliance for one player on one day.
#[table(name = daily_compliance, public)]
#[derive(Clone)]
pub struct DailyComplianceRow {
    #[primary_key]
    #[auto_inc]
    pub id: u64,
    #[index(btree)]
    pub player_id: u64,
    pub date: String,
    pub core_quests_total: u32,
    pub core_quests_completed: u32,
    pub had_debuff: bool,
    /// Set once the day rollover has judged this record (debuff + streak).
    pub closed: bool,
}

impl DailyComplianceRow {
    pub fn to_record(&self, user_key: &str) -> DailyComplianceRecord {
        DailyComplianceRecord {
            user_id: user_key.to_string(),
            date: self.date.clone(),
            core_quests_total: self.core_quests_total,
            core_quests_completed: self.core_quests_completed,
            had_debuff: self.had_debuff,
        }
    }

    pub fn apply_record(&mut self, rec: &DailyComplianceRecord) {
        self.core_quests_total = rec.core_quests_total;
        self.core_quests_completed = rec.core_quests_completed;
        self.had_debuff = rec.had_debuff;
    }
}

// ============================================================================
// SCHEDULES
// ============================================================================

/// Hourly sweep that fails/expires yesterday's quests and judges debuffs.
#[table(name = rollover_schedule, scheduled(run_day_rollover))]
pub struct RolloverSchedule {
    #[primary_key]
    #[auto_inc]
    pub id: u64,
    pub scheduled_at: ScheduleAt,
}

/// Periodic cleanup of lapsed debuff expiries.
#[table(name = debuff_sweep_schedule, scheduled(sweep_expired_debuffs))]
pub struct DebuffSweepSchedule {
    #[primary_key]
    #[auto_inc]
    pub id: u64,
    pub scheduled_at: ScheduleAt,
}
