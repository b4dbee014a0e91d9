//! Player aggregate: XP total, trainable stat block, debuff, streak.
//!
//! The XP total is the one arbitrary-precision value in the system; it
//! crosses the persistence boundary as a decimal string.

use crate::constants::stat_types;
use crate::levels::ExperienceTotal;
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

/// Trainable stats raised by quest completion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatBlock {
    pub strength: u32,
    pub endurance: u32,
    pub agility: u32,
    pub vitality: u32,
    pub discipline: u32,
}

impl StatBlock {
    pub fn get(&self, stat: u8) -> u32 {
        match stat {
            stat_types::STRENGTH => self.strength,
            stat_types::ENDURANCE => self.endurance,
            stat_types::AGILITY => self.agility,
            stat_types::VITALITY => self.vitality,
            stat_types::DISCIPLINE => self.discipline,
            _ => 0,
        }
    }

    pub fn add(&mut self, stat: u8, amount: u32) {
        match stat {
            stat_types::STRENGTH => self.strength += amount,
            stat_types::ENDURANCE => self.endurance += amount,
            stat_types::AGILITY => self.agility += amount,
            stat_types::VITALITY => self.vitality += amount,
            stat_types::DISCIPLINE => self.discipline += amount,
            _ => {}
        }
    }

    /// Saturating: reversing an award on a stale row must not panic.
    pub fn sub(&mut self, stat: u8, amount: u32) {
        match stat {
            stat_types::STRENGTH => self.strength = self.strength.saturating_sub(amount),
            stat_types::ENDURANCE => self.endurance = self.endurance.saturating_sub(amount),
            stat_types::AGILITY => self.agility = self.agility.saturating_sub(amount),
            stat_types::VITALITY => self.vitality = self.vitality.saturating_sub(amount),
            stat_types::DISCIPLINE => self.discipline = self.discipline.saturating_sub(amount),
            _ => {}
        }
    }
}

/// Progression state for one player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerProgress {
    pub user_id: String,
    pub xp_total: ExperienceTotal,
    pub stats: StatBlock,
    /// Debuff expiry in epoch microseconds; `None` when no debuff stored.
    pub debuff_expires_at: Option<i64>,
    /// `YYYY-MM-DD` of account creation; drives the rotating unlock gate.
    pub account_created_date: String,
    /// Consecutive fully-compliant days.
    pub streak: u32,
}

impl PlayerProgress {
    pub fn new(user_id: &str, account_created_date: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            xp_total: BigUint::default(),
            stats: StatBlock::default(),
            debuff_expires_at: None,
            account_created_date: account_created_date.to_string(),
            streak: 0,
        }
    }

    pub fn add_xp(&mut self, amount: u32) {
        self.xp_total += amount;
    }

    /// Saturating at zero so an undo against a stale total cannot panic.
    pub fn sub_xp(&mut self, amount: u32) {
        let amount = BigUint::from(amount);
        if self.xp_total >= amount {
            self.xp_total -= amount;
        } else {
            self.xp_total = BigUint::default();
        }
    }

    /// Decimal rendering for storage and transport.
    pub fn xp_string(&self) -> String {
        self.xp_total.to_string()
    }
}

/// Parse a stored XP total. Negative or malformed input is stale data,
/// not an error: it clamps to zero so callers (UI, migrations) never
/// crash on it.
pub fn parse_xp(raw: &str) -> ExperienceTotal {
    raw.trim().parse::<BigUint>().unwrap_or_default()
}
