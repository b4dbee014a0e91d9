//! Deterministic per-(day, player) rotating quest selection.
//!
//! The pick must be reproducible across calls and processes (the client,
//! the server, and the daily job all agree on today's bonus quest) yet
//! look random across days and players. A 32-bit FNV-1a hash over
//! `"{date}-{user_id}"` gives both; cryptographic strength is not needed,
//! only determinism and spread. The function is an implementation choice,
//! not a wire compatibility requirement — swapping it only reshuffles
//! future picks.

use crate::constants::ROTATING_QUEST_UNLOCK_DAY;

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// 32-bit FNV-1a over a string.
pub fn fnv1a_32(input: &str) -> u32 {
    let mut hash = FNV_OFFSET_BASIS;
    for byte in input.bytes() {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Pick today's rotating quest template for a player.
///
/// Returns `None` before the unlock day ([`ROTATING_QUEST_UNLOCK_DAY`])
/// and for an empty pool — never an error. The pool is sorted internally
/// so caller ordering cannot change the pick.
pub fn select(date: &str, user_id: &str, pool: &[u64], account_age_days: u32) -> Option<u64> {
    if account_age_days < ROTATING_QUEST_UNLOCK_DAY || pool.is_empty() {
        return None;
    }
    let mut ordered: Vec<u64> = pool.to_vec();
    ordered.sort_unstable();
    ordered.dedup();
    let hash = fnv1a_32(&format!("{date}-{user_id}"));
    let index = (hash as usize) % ordered.len();
    Some(ordered[index])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const UNLOCKED: u32 = ROTATING_QUEST_UNLOCK_DAY;

    fn pool20() -> Vec<u64> {
        (1..=20).collect()
    }

    #[test]
    fn test_fnv1a_known_vectors() {
        assert_eq!(fnv1a_32(""), 0x811c_9dc5);
        assert_eq!(fnv1a_32("a"), 0xe40c_292c);
    }

    #[test]
    fn test_selection_is_deterministic() {
        let pool = pool20();
        let first = select("2025-01-15", "user-123", &pool, UNLOCKED);
        for _ in 0..10 {
            assert_eq!(select("2025-01-15", "user-123", &pool, UNLOCKED), first);
        }
        assert_eq!(first, Some(17));
    }

    #[test]
    fn test_selection_varies_by_date_and_user() {
        let pool = pool20();
        assert_eq!(select("2025-01-16", "user-123", &pool, UNLOCKED), Some(20));
        assert_eq!(select("2025-01-15", "user-456", &pool, UNLOCKED), Some(12));
    }

    #[test]
    fn test_caller_ordering_cannot_change_the_pick() {
        let mut shuffled = pool20();
        shuffled.reverse();
        shuffled.rotate_left(7);
        assert_eq!(
            select("2025-01-15", "user-123", &shuffled, UNLOCKED),
            select("2025-01-15", "user-123", &pool20(), UNLOCKED)
        );
    }

    #[test]
    fn test_unlock_gate() {
        let pool = pool20();
        for day in 0..UNLOCKED {
            assert_eq!(select("2025-01-15", "user-123", &pool, day), None);
        }
        assert!(select("2025-01-15", "user-123", &pool, UNLOCKED).is_some());
    }

    #[test]
    fn test_empty_pool_is_no_selection() {
        assert_eq!(select("2025-01-15", "user-123", &[], UNLOCKED), None);
    }

    #[test]
    fn test_distribution_over_pairs_is_sane() {
        // 100 distinct (date, user) pairs over a 20-template pool: no
        // template should be picked more than ~3x the uniform expectation.
        let pool = pool20();
        let mut counts: HashMap<u64, u32> = HashMap::new();
        for day in 1..=10u32 {
            for user in 0..10u32 {
                let date = format!("2025-02-{day:02}");
                let picked = select(&date, &format!("user-{user}"), &pool, UNLOCKED).unwrap();
                *counts.entry(picked).or_default() += 1;
            }
        }
        let max = counts.values().copied().max().unwrap();
        assert!(max <= 15, "one template chosen {max} times out of 100");
        assert!(counts.len() >= 10, "selection should spread across the pool");
    }

    #[test]
    fn test_consecutive_days_rotate() {
        let pool = pool20();
        let picks: Vec<u64> = (1..=30u32)
            .map(|day| {
                select(&format!("2025-03-{day:02}"), "user-7", &pool, UNLOCKED).unwrap()
            })
            .collect();
        let distinct: std::collections::HashSet<u64> = picks.iter().copied().collect();
        assert!(distinct.len() >= 10, "a month of picks must rotate the pool");
    }
}
