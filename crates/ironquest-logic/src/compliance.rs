//! Per-(player, day) core-quest counters and streak close-out.
//!
//! One record exists per player per calendar day. It is mutated only by
//! the quest lifecycle (assignment, completion, reset) and read by the
//! debuff policy when the day closes. Calendar days are `YYYY-MM-DD`
//! strings, which order correctly under plain string comparison.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Core-quest compliance for one player on one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyComplianceRecord {
    pub user_id: String,
    pub date: String,
    pub core_quests_total: u32,
    pub core_quests_completed: u32,
    /// Set when this day's misses triggered a debuff.
    pub had_debuff: bool,
}

impl DailyComplianceRecord {
    pub fn new(user_id: &str, date: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            date: date.to_string(),
            core_quests_total: 0,
            core_quests_completed: 0,
            had_debuff: false,
        }
    }

    /// Count newly assigned core quests toward the day's total.
    pub fn record_assignment(&mut self, count: u32) {
        self.core_quests_total += count;
    }

    pub fn record_completion(&mut self) {
        self.core_quests_completed += 1;
    }

    /// Reverse one completion (quest reset). Saturating: stale rows must
    /// never panic the lifecycle.
    pub fn record_reset(&mut self) {
        self.core_quests_completed = self.core_quests_completed.saturating_sub(1);
    }

    pub fn missed_count(&self) -> u32 {
        self.core_quests_total
            .saturating_sub(self.core_quests_completed)
    }

    pub fn all_core_completed(&self) -> bool {
        self.core_quests_total > 0 && self.core_quests_completed >= self.core_quests_total
    }
}

/// Account age in days, counting the creation day as day 1.
///
/// Unparseable dates resolve to 0 (locked features stay locked on bad
/// data rather than crashing).
pub fn account_age_days(created: &str, today: &str) -> u32 {
    let (Ok(created), Ok(today)) = (
        NaiveDate::parse_from_str(created, DATE_FORMAT),
        NaiveDate::parse_from_str(today, DATE_FORMAT),
    ) else {
        return 0;
    };
    let days = (today - created).num_days();
    if days < 0 {
        0
    } else {
        days as u32 + 1
    }
}

/// Streak value after closing a day: +1 when every core quest was
/// completed, otherwise back to zero.
pub fn close_day_streak(record: &DailyComplianceRecord, streak: u32) -> u32 {
    if record.all_core_completed() {
        streak + 1
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_round_trip() {
        let mut rec = DailyComplianceRecord::new("user-1", "2025-01-15");
        rec.record_assignment(4);
        assert_eq!(rec.missed_count(), 4);
        rec.record_completion();
        rec.record_completion();
        assert_eq!(rec.core_quests_completed, 2);
        assert_eq!(rec.missed_count(), 2);
        rec.record_reset();
        assert_eq!(rec.core_quests_completed, 1);
        // Saturates instead of underflowing.
        rec.record_reset();
        rec.record_reset();
        assert_eq!(rec.core_quests_completed, 0);
    }

    #[test]
    fn test_account_age() {
        assert_eq!(account_age_days("2025-01-15", "2025-01-15"), 1);
        assert_eq!(account_age_days("2025-01-15", "2025-01-22"), 8);
        assert_eq!(account_age_days("2025-01-15", "2025-02-15"), 32);
        // Clock skew and garbage resolve to 0, never panic.
        assert_eq!(account_age_days("2025-01-15", "2025-01-14"), 0);
        assert_eq!(account_age_days("not-a-date", "2025-01-15"), 0);
    }

    #[test]
    fn test_streak_close_out() {
        let mut rec = DailyComplianceRecord::new("user-1", "2025-01-15");
        rec.record_assignment(3);
        for _ in 0..3 {
            rec.record_completion();
        }
        assert_eq!(close_day_streak(&rec, 6), 7);

        let mut missed = DailyComplianceRecord::new("user-1", "2025-01-16");
        missed.record_assignment(3);
        missed.record_completion();
        assert_eq!(close_day_streak(&missed, 7), 0);

        // A day with nothing assigned does not extend a streak.
        let empty = DailyComplianceRecord::new("user-1", "2025-01-17");
        assert_eq!(close_day_streak(&empty, 4), 0);
    }

    #[test]
    fn test_dates_order_as_strings() {
        assert!("2025-01-09" < "2025-01-15");
        assert!("2024-12-31" < "2025-01-01");
    }
}
