//! Quest template catalog, requirement rules, and rotation eligibility.
//!
//! Templates are immutable catalog entries. The shipping catalog lives in
//! `data/quest_catalog.json`, embedded at compile time via `include_str!()`.
//! To add or tune quests, edit the JSON file — no code changes required.

use crate::constants::metrics;
use crate::quests::QuestError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Comparison applied by a numeric requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    AtLeast,
    AtMost,
    Exactly,
}

/// What a quest asks the player to do.
///
/// A tagged union rather than a free-form value object, so completion
/// eligibility is exhaustively matched instead of duck-typed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Requirement {
    /// A counter compared against a threshold (steps, minutes, grams...).
    NumericThreshold { metric: u8, operator: Operator, value: u32 },
    /// A yes/no flag (workout logged, weighed in).
    BooleanFlag { metric: u8 },
}

impl Requirement {
    /// The progress target a quest instance accumulates toward.
    pub fn target_value(&self) -> u32 {
        match self {
            Requirement::NumericThreshold { value, .. } => (*value).max(1),
            Requirement::BooleanFlag { .. } => 1,
        }
    }

    /// Whether a reported value satisfies the requirement outright.
    pub fn is_met(&self, reported: u32) -> bool {
        match self {
            Requirement::NumericThreshold { operator, value, .. } => match operator {
                Operator::AtLeast => reported >= *value,
                Operator::AtMost => reported <= *value,
                Operator::Exactly => reported == *value,
            },
            Requirement::BooleanFlag { .. } => reported >= 1,
        }
    }

    pub fn metric(&self) -> u8 {
        match self {
            Requirement::NumericThreshold { metric, .. } => *metric,
            Requirement::BooleanFlag { metric } => *metric,
        }
    }
}

/// Immutable catalog entry describing one kind of quest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestTemplate {
    pub id: u64,
    pub name: String,
    pub category: u8,
    pub is_core: bool,
    pub base_xp: u32,
    pub stat_type: u8,
    pub stat_bonus: u32,
    pub requirement: Requirement,
    pub allow_partial: bool,
    #[serde(default)]
    pub min_partial_percent: Option<u32>,
    pub min_level: u32,
    pub rotating: bool,
}

/// Parse and validate a catalog from JSON.
pub fn load_catalog(json: &str) -> Result<Vec<QuestTemplate>, QuestError> {
    let templates: Vec<QuestTemplate> =
        serde_json::from_str(json).map_err(|e| QuestError::CatalogInvalid(e.to_string()))?;
    validate_catalog(&templates)?;
    Ok(templates)
}

/// Catalog invariants checked once at load, so the lifecycle can trust
/// every template it is handed.
pub fn validate_catalog(templates: &[QuestTemplate]) -> Result<(), QuestError> {
    if templates.is_empty() {
        return Err(QuestError::CatalogInvalid("catalog is empty".to_string()));
    }
    let mut seen = HashSet::new();
    for t in templates {
        if !seen.insert(t.id) {
            return Err(QuestError::CatalogInvalid(format!(
                "duplicate template id {}",
                t.id
            )));
        }
        if t.base_xp == 0 {
            return Err(QuestError::CatalogInvalid(format!(
                "template {} has zero base XP",
                t.id
            )));
        }
        match (t.allow_partial, t.min_partial_percent) {
            (true, Some(p)) if (1..=99).contains(&p) => {}
            (true, _) => {
                return Err(QuestError::CatalogInvalid(format!(
                    "template {} allows partial completion without a 1-99 threshold",
                    t.id
                )));
            }
            (false, _) => {}
        }
        if t.rotating && t.is_core {
            return Err(QuestError::CatalogInvalid(format!(
                "template {} cannot be both core and rotating",
                t.id
            )));
        }
        match &t.requirement {
            Requirement::BooleanFlag { metric } if !metrics::is_boolean(*metric) => {
                return Err(QuestError::CatalogInvalid(format!(
                    "template {} flags the counter metric '{}'",
                    t.id,
                    metrics::name(*metric)
                )));
            }
            Requirement::NumericThreshold { metric, .. } if metrics::is_boolean(*metric) => {
                return Err(QuestError::CatalogInvalid(format!(
                    "template {} counts the yes/no metric '{}'",
                    t.id,
                    metrics::name(*metric)
                )));
            }
            _ => {}
        }
    }
    Ok(())
}

/// The catalog shipped with the game.
pub fn builtin_catalog() -> Vec<QuestTemplate> {
    const CATALOG_JSON: &str = include_str!("../../../data/quest_catalog.json");
    load_catalog(CATALOG_JSON).expect("quest_catalog.json is invalid")
}

/// Look up a template by id.
pub fn find_template(templates: &[QuestTemplate], id: u64) -> Result<&QuestTemplate, QuestError> {
    templates
        .iter()
        .find(|t| t.id == id)
        .ok_or(QuestError::TemplateNotFound(id))
}

/// Template ids eligible for today's rotating pick, sorted by id.
///
/// The stable ordering is load-bearing: the selector maps a hash to an
/// index, so the same pool must present the same ordering on every call.
pub fn eligible_rotating_pool(templates: &[QuestTemplate], player_level: u32) -> Vec<u64> {
    let mut pool: Vec<u64> = templates
        .iter()
        .filter(|t| t.rotating && !t.is_core && t.min_level <= player_level)
        .map(|t| t.id)
        .collect();
    pool.sort_unstable();
    pool
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::metrics;

    fn numeric(metric: u8, value: u32) -> Requirement {
        Requirement::NumericThreshold {
            metric,
            operator: Operator::AtLeast,
            value,
        }
    }

    #[test]
    fn test_builtin_catalog_is_valid() {
        let catalog = builtin_catalog();
        assert!(catalog.len() >= 16);
        assert!(catalog.iter().filter(|t| t.is_core).count() >= 4);
        assert!(catalog.iter().filter(|t| t.rotating).count() >= 10);
    }

    #[test]
    fn test_requirement_targets_and_checks() {
        let steps = numeric(metrics::STEPS, 6000);
        assert_eq!(steps.target_value(), 6000);
        assert!(steps.is_met(6000));
        assert!(!steps.is_met(5999));

        let cap = Requirement::NumericThreshold {
            metric: metrics::CALORIES_BURNED,
            operator: Operator::AtMost,
            value: 2000,
        };
        assert!(cap.is_met(1800));
        assert!(!cap.is_met(2001));

        let flag = Requirement::BooleanFlag {
            metric: metrics::WORKOUT_LOGGED,
        };
        assert_eq!(flag.target_value(), 1);
        assert!(flag.is_met(1));
        assert!(!flag.is_met(0));
    }

    #[test]
    fn test_requirement_json_round_trip() {
        let req = numeric(metrics::STEPS, 6000);
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("numeric_threshold"));
        assert_eq!(serde_json::from_str::<Requirement>(&json).unwrap(), req);
    }

    #[test]
    fn test_validation_rejects_duplicates() {
        let mut catalog = builtin_catalog();
        let mut dup = catalog[0].clone();
        dup.name = "Copy".to_string();
        catalog.push(dup);
        assert!(matches!(
            validate_catalog(&catalog),
            Err(QuestError::CatalogInvalid(_))
        ));
    }

    #[test]
    fn test_validation_rejects_mismatched_metric_kinds() {
        let mut catalog = builtin_catalog();
        catalog[0].requirement = Requirement::BooleanFlag {
            metric: metrics::STEPS,
        };
        assert!(matches!(
            validate_catalog(&catalog),
            Err(QuestError::CatalogInvalid(_))
        ));
        catalog[0].requirement = numeric(metrics::WORKOUT_LOGGED, 2);
        assert!(matches!(
            validate_catalog(&catalog),
            Err(QuestError::CatalogInvalid(_))
        ));
    }

    #[test]
    fn test_validation_rejects_partial_without_threshold() {
        let mut catalog = builtin_catalog();
        catalog[0].allow_partial = true;
        catalog[0].min_partial_percent = None;
        assert!(matches!(
            validate_catalog(&catalog),
            Err(QuestError::CatalogInvalid(_))
        ));
    }

    #[test]
    fn test_eligible_pool_filters_and_sorts() {
        let catalog = builtin_catalog();
        let low = eligible_rotating_pool(&catalog, 1);
        let high = eligible_rotating_pool(&catalog, 10);
        assert!(low.len() < high.len(), "level gates must open with level");
        assert!(high.len() >= 10);
        for pair in high.windows(2) {
            assert!(pair[0] < pair[1], "pool must be sorted by id");
        }
        for id in &low {
            let t = find_template(&catalog, *id).unwrap();
            assert!(t.rotating && !t.is_core && t.min_level <= 1);
        }
    }

    #[test]
    fn test_find_template_missing() {
        let catalog = builtin_catalog();
        assert!(matches!(
            find_template(&catalog, 9999),
            Err(QuestError::TemplateNotFound(9999))
        ));
    }
}
