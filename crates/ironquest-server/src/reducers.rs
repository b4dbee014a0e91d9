//! Client-facing reducers for the progression engine.
//!
//! Each reducer loads rows, runs the pure logic from `ironquest-logic`,
//! and writes the results back. SpacetimeDB wraps every reducer in a
//! transaction, so a returned `Err` rolls the whole transition back —
//! XP, counters, and quest status always move together.

use crate::tables::*;
use ironquest_logic::compliance;
use ironquest_logic::constants::stat_types;
use ironquest_logic::debuff;
use ironquest_logic::levels::LevelTable;
use ironquest_logic::player::parse_xp;
use ironquest_logic::quests::{self, ProgressUpdate, QuestStatus};
use ironquest_logic::rotation;
use ironquest_logic::templates::{self, QuestTemplate};
use spacetimedb::{reducer, ReducerContext, ScheduleAt, Table, Timestamp};

/// UTC calendar day for a timestamp, as `YYYY-MM-DD`.
fn date_string(ts: Timestamp) -> String {
    chrono::DateTime::from_timestamp_micros(ts.to_micros_since_unix_epoch())
        .map(|dt| dt.date_naive().format(compliance::DATE_FORMAT).to_string())
        .unwrap_or_else(|| "1970-01-01".to_string())
}

/// Look up the calling player.
fn get_player(ctx: &ReducerContext) -> Result<Player, String> {
    ctx.db
        .player()
        .identity()
        .find(ctx.sender)
        .ok_or("Player not registered".to_string())
}

fn parse_template(row: &QuestTemplateRow) -> Result<QuestTemplate, String> {
    serde_json::from_str(&row.spec)
        .map_err(|e| format!("Stored template {} is corrupt: {e}", row.id))
}

fn get_or_create_compliance(ctx: &ReducerContext, player_id: u64, date: &str) -> DailyComplianceRow {
    ctx.db
        .daily_compliance()
        .player_id()
        .filter(&player_id)
        .find(|row| row.date == date)
        .unwrap_or_else(|| {
            ctx.db.daily_compliance().insert(DailyComplianceRow {
                id: 0,
                player_id,
                date: date.to_string(),
                core_quests_total: 0,
                core_quests_completed: 0,
                had_debuff: false,
                closed: false,
            })
        })
}

// ============================================================================
// MODULE LIFECYCLE
// ============================================================================

#[reducer(init)]
pub fn init(ctx: &ReducerContext) {
    if ctx.db.quest_template().iter().count() == 0 {
        let catalog = templates::builtin_catalog();
        for template in &catalog {
            ctx.db.quest_template().insert(QuestTemplateRow {
                id: template.id,
                is_core: template.is_core,
                rotating: template.rotating,
                min_level: template.min_level,
                spec: serde_json::to_string(template).expect("template serializes"),
            });
        }
        log::info!("Seeded {} quest templates", catalog.len());
    }

    // Idempotent on hot-reload: only insert schedules once.
    if ctx.db.rollover_schedule().iter().count() == 0 {
        ctx.db.rollover_schedule().insert(RolloverSchedule {
            id: 0,
            scheduled_at: ScheduleAt::Interval(std::time::Duration::from_secs(3600).into()),
        });
    }
    if ctx.db.debuff_sweep_schedule().iter().count() == 0 {
        ctx.db.debuff_sweep_schedule().insert(DebuffSweepSchedule {
            id: 0,
            scheduled_at: ScheduleAt::Interval(std::time::Duration::from_secs(3600).into()),
        });
    }

    log::info!("IronQuest module initialized");
}

// ============================================================================
// PLAYER REDUCERS
// ============================================================================

/// Register the calling identity as a player.
#[reducer]
pub fn register_player(ctx: &ReducerContext, name: String) -> Result<(), String> {
    if ctx.db.player().identity().find(ctx.sender).is_some() {
        return Err("Player already registered".to_string());
    }
    let today = date_string(ctx.timestamp);
    let player = ctx.db.player().insert(Player {
        id: 0,
        identity: ctx.sender,
        name: name.clone(),
        xp_total: "0".to_string(),
        strength: 0,
        endurance: 0,
        agility: 0,
        vitality: 0,
        discipline: 0,
        debuff_expires_at: None,
        account_created_date: today,
        streak: 0,
    });
    log::info!("Player '{}' registered with id {}", name, player.id);
    Ok(())
}

/// Instantiate today's quests for the caller: every core template, plus
/// the rotating pick once the account is old enough.
#[reducer]
pub fn assign_daily_quests(ctx: &ReducerContext) -> Result<(), String> {
    let player = get_player(ctx)?;
    let today = date_string(ctx.timestamp);
    let user_key = player.user_key();

    let existing: std::collections::HashSet<u64> = ctx
        .db
        .quest_instance()
        .player_id()
        .filter(&player.id)
        .filter(|row| row.quest_date == today)
        .map(|row| row.template_id)
        .collect();

    let mut new_core = 0u32;
    let mut assigned = 0u32;
    for row in ctx.db.quest_template().iter().filter(|t| t.is_core) {
        if existing.contains(&row.id) {
            continue;
        }
        let template = parse_template(&row)?;
        let quest = quests::assign(&template, &user_key, &today, 0);
        ctx.db
            .quest_instance()
            .insert(QuestInstanceRow::from_instance(player.id, &quest));
        new_core += 1;
        assigned += 1;
    }

    if new_core > 0 {
        let mut compliance_row = get_or_create_compliance(ctx, player.id, &today);
        let mut record = compliance_row.to_record(&user_key);
        record.record_assignment(new_core);
        compliance_row.apply_record(&record);
        ctx.db.daily_compliance().id().update(compliance_row);
    }

    let age = compliance::account_age_days(&player.account_created_date, &today);
    let level = LevelTable::default().level_for_xp(&parse_xp(&player.xp_total));
    let rotating: Vec<QuestTemplate> = ctx
        .db
        .quest_template()
        .iter()
        .filter(|t| t.rotating)
        .map(|row| parse_template(&row))
        .collect::<Result<_, _>>()?;
    let pool = templates::eligible_rotating_pool(&rotating, level);
    if let Some(template_id) = rotation::select(&today, &user_key, &pool, age) {
        if !existing.contains(&template_id) {
            let template = templates::find_template(&rotating, template_id)
                .map_err(|e| e.to_string())?;
            let quest = quests::assign(template, &user_key, &today, 0);
            ctx.db
                .quest_instance()
                .insert(QuestInstanceRow::from_instance(player.id, &quest));
            assigned += 1;
            log::info!("Rotating quest {} assigned to {}", template_id, user_key);
        }
    }

    log::info!("Assigned {} quests to {} for {}", assigned, user_key, today);
    Ok(())
}

// ============================================================================
// QUEST REDUCERS
// ============================================================================

fn get_owned_quest(ctx: &ReducerContext, player: &Player, quest_id: u64) -> Result<QuestInstanceRow, String> {
    let row = ctx
        .db
        .quest_instance()
        .id()
        .find(quest_id)
        .ok_or("Quest not found".to_string())?;
    if row.player_id != player.id {
        return Err("Quest does not belong to caller".to_string());
    }
    Ok(row)
}

/// Record reported activity against a quest counter.
#[reducer]
pub fn report_quest_progress(
    ctx: &ReducerContext,
    quest_id: u64,
    amount: u32,
    absolute: bool,
) -> Result<(), String> {
    let player = get_player(ctx)?;
    let mut row = get_owned_quest(ctx, &player, quest_id)?;
    let mut quest = row.to_instance(&player.user_key());

    let update = if absolute {
        ProgressUpdate::Absolute(amount)
    } else {
        ProgressUpdate::Delta(amount)
    };
    let percent = quests::report_progress(&mut quest, update).map_err(|e| e.to_string())?;

    row.apply_instance(&quest);
    ctx.db.quest_instance().id().update(row);
    if percent >= 100 {
        log::info!("Quest {} reached its target", quest_id);
    }
    Ok(())
}

/// Complete a quest: award XP and stats, bump the compliance counter,
/// report a level-up.
#[reducer]
pub fn complete_quest(ctx: &ReducerContext, quest_id: u64) -> Result<(), String> {
    let mut player = get_player(ctx)?;
    let user_key = player.user_key();
    let mut row = get_owned_quest(ctx, &player, quest_id)?;
    let mut quest = row.to_instance(&user_key);

    let mut compliance_row = get_or_create_compliance(ctx, player.id, &quest.quest_date);
    let mut record = compliance_row.to_record(&user_key);
    let mut progress = player.to_progress();
    let now = ctx.timestamp.to_micros_since_unix_epoch();

    let outcome = quests::complete(
        &mut quest,
        &mut progress,
        &mut record,
        &LevelTable::default(),
        now,
    )
    .map_err(|e| e.to_string())?;

    row.apply_instance(&quest);
    ctx.db.quest_instance().id().update(row);
    compliance_row.apply_record(&record);
    ctx.db.daily_compliance().id().update(compliance_row);
    player.apply_progress(&progress);
    ctx.db.player().id().update(player);

    if outcome.leveled_up {
        log::info!(
            "{} completed quest {} for {} XP and reached level {}",
            user_key,
            quest_id,
            outcome.xp_awarded,
            outcome.new_level
        );
    } else {
        log::info!(
            "{} completed quest {} for {} XP (+{} {})",
            user_key,
            quest_id,
            outcome.xp_awarded,
            quest.stat_bonus,
            stat_types::name(quest.stat_type)
        );
    }
    Ok(())
}

/// Undo a same-day completion, restoring XP and counters exactly.
#[reducer]
pub fn reset_quest(ctx: &ReducerContext, quest_id: u64) -> Result<(), String> {
    let mut player = get_player(ctx)?;
    let user_key = player.user_key();
    let mut row = get_owned_quest(ctx, &player, quest_id)?;
    let mut quest = row.to_instance(&user_key);
    let today = date_string(ctx.timestamp);

    let mut compliance_row = get_or_create_compliance(ctx, player.id, &quest.quest_date);
    let mut record = compliance_row.to_record(&user_key);
    let mut progress = player.to_progress();

    let reversed =
        quests::reset(&mut quest, &mut progress, &mut record, &today).map_err(|e| e.to_string())?;

    row.apply_instance(&quest);
    ctx.db.quest_instance().id().update(row);
    compliance_row.apply_record(&record);
    ctx.db.daily_compliance().id().update(compliance_row);
    player.apply_progress(&progress);
    ctx.db.player().id().update(player);

    log::info!("{} reset quest {}, reversing {} XP", user_key, quest_id, reversed);
    Ok(())
}

/// Delete an optional quest outright. No XP moves.
#[reducer]
pub fn remove_quest(ctx: &ReducerContext, quest_id: u64) -> Result<(), String> {
    let player = get_player(ctx)?;
    let row = get_owned_quest(ctx, &player, quest_id)?;
    let quest = row.to_instance(&player.user_key());

    quests::remove(&quest).map_err(|e| e.to_string())?;
    ctx.db.quest_instance().id().delete(quest_id);
    log::info!("{} removed quest {}", player.user_key(), quest_id);
    Ok(())
}

// ============================================================================
// SCHEDULED REDUCERS
// ============================================================================

/// Hourly rollover: close out past days.
///
/// Still-active quests from past days fail (core) or expire (optional);
/// each unjudged past compliance record then drives the debuff decision
/// and the streak close-out, oldest day first.
#[reducer]
pub fn run_day_rollover(ctx: &ReducerContext, _schedule: RolloverSchedule) {
    if ctx.sender != ctx.identity() {
        log::warn!("Client {} attempted to call run_day_rollover", ctx.sender);
        return;
    }
    let today = date_string(ctx.timestamp);
    let now = ctx.timestamp.to_micros_since_unix_epoch();

    for player in ctx.db.player().iter() {
        let user_key = player.user_key();

        let mut stale: Vec<QuestInstanceRow> = ctx
            .db
            .quest_instance()
            .player_id()
            .filter(&player.id)
            .filter(|row| {
                row.status == QuestStatus::Active.as_u8() && row.quest_date.as_str() < today.as_str()
            })
            .collect();
        if !stale.is_empty() {
            let mut instances: Vec<_> =
                stale.iter().map(|row| row.to_instance(&user_key)).collect();
            let transitioned = quests::expire_day(&mut instances, &today);
            for (row, quest) in stale.iter_mut().zip(&instances) {
                row.apply_instance(quest);
                ctx.db.quest_instance().id().update(row.clone());
            }
            log::info!("{}: {} stale quests closed out", user_key, transitioned);
        }

        let mut pending: Vec<DailyComplianceRow> = ctx
            .db
            .daily_compliance()
            .player_id()
            .filter(&player.id)
            .filter(|row| !row.closed && row.date.as_str() < today.as_str())
            .collect();
        if pending.is_empty() {
            continue;
        }
        pending.sort_by(|a, b| a.date.cmp(&b.date));

        let mut updated = player.clone();
        for mut compliance_row in pending {
            let mut record = compliance_row.to_record(&user_key);
            let decision =
                debuff::check_and_apply(now, Some(&mut record), updated.debuff_expires_at);
            if decision.applied {
                updated.debuff_expires_at = decision.expires_at;
                log::info!("{} debuffed: {}", user_key, decision.reason);
            }
            updated.streak = compliance::close_day_streak(&record, updated.streak);
            compliance_row.apply_record(&record);
            compliance_row.closed = true;
            ctx.db.daily_compliance().id().update(compliance_row);
        }
        ctx.db.player().id().update(updated);
    }
}

/// Periodic cleanup of lapsed debuff expiries. Correctness never depends
/// on this — reads self-check expiry — it only keeps rows tidy.
#[reducer]
pub fn sweep_expired_debuffs(ctx: &ReducerContext, _schedule: DebuffSweepSchedule) {
    if ctx.sender != ctx.identity() {
        log::warn!("Client {} attempted to call sweep_expired_debuffs", ctx.sender);
        return;
    }
    let now = ctx.timestamp.to_micros_since_unix_epoch();
    let mut cleared = 0u32;
    for mut player in ctx.db.player().iter() {
        if player.debuff_expires_at.is_some() && !debuff::is_active(now, player.debuff_expires_at) {
            player.debuff_expires_at = None;
            ctx.db.player().id().update(player);
            cleared += 1;
        }
    }
    if cleared > 0 {
        log::info!("Cleared {} expired debuffs", cleared);
    }
}
