//! The Policy Engine: immutable per-category rules and the deterministic
//! decision function that is the sole source of truth for eligibility,
//! outcome kind, and discount percent.
//!
//! Ported from `original_source/shop_agent/policy.py`'s `PolicyEngine`,
//! generalized slightly per SPEC_FULL §4.1 (both `refund` and `return`
//! require `item_opened`, not just `return` as the original Python did —
//! the distilled spec is explicit about this and takes precedence over the
//! narrower Python check).

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// One tier of the discount ladder: the first tier whose `max_days` is
/// greater than or equal to `days_since_purchase` wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscountTier {
    pub max_days: i64,
    pub percent: f64,
}

/// Immutable per-category rule set, loaded once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryPolicy {
    pub return_window_days: i64,
    pub allowed_outcomes: Vec<String>,
    pub discount_cap_percent: f64,
    #[serde(default)]
    pub tiered_discounts: Vec<DiscountTier>,
    #[serde(default)]
    pub special_constraints: Vec<String>,
}

impl CategoryPolicy {
    fn validate(&self, category: &str) -> ConfigResult<()> {
        if self.allowed_outcomes.is_empty() {
            return Err(ConfigError::EmptyAllowedOutcomes {
                category: category.to_string(),
            });
        }
        for tier in &self.tiered_discounts {
            if tier.percent > self.discount_cap_percent {
                return Err(ConfigError::TierExceedsCap {
                    category: category.to_string(),
                    percent: tier.percent,
                    cap: self.discount_cap_percent,
                });
            }
        }
        Ok(())
    }

    fn allows(&self, intent: &str) -> bool {
        self.allowed_outcomes.iter().any(|o| o == intent)
    }

    /// Tiered discount for `days_since_purchase`, falling back to the
    /// category cap when no tier matches.
    fn base_discount(&self, days_since_purchase: i64) -> f64 {
        self.tiered_discounts
            .iter()
            .find(|t| t.max_days >= days_since_purchase)
            .map(|t| t.percent)
            .unwrap_or(self.discount_cap_percent)
    }
}

/// The declarative policy source: a map from category name to its rules.
/// Categories are open strings (see DESIGN.md's resolution of the distilled
/// spec's vocabulary Open Question) validated only against table
/// membership, so a deployment can swap the whole vocabulary by loading a
/// different JSON file.
#[derive(Debug, Clone, Default)]
pub struct PolicyTable {
    categories: HashMap<String, CategoryPolicy>,
}

#[derive(Deserialize)]
struct PolicyTableJson {
    categories: HashMap<String, CategoryPolicy>,
}

impl PolicyTable {
    pub fn from_json_str(raw: &str) -> ConfigResult<Self> {
        let parsed: PolicyTableJson =
            serde_json::from_str(raw).map_err(|e| ConfigError::InvalidJson {
                message: e.to_string(),
            })?;
        for (name, policy) in &parsed.categories {
            policy.validate(name)?;
        }
        Ok(Self {
            categories: parsed.categories,
        })
    }

    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound {
                    path: path.to_path_buf(),
                }
            } else {
                ConfigError::Io(e)
            }
        })?;
        Self::from_json_str(&raw)
    }

    pub fn get(&self, category: &str) -> Option<&CategoryPolicy> {
        self.categories.get(category)
    }

    pub fn contains(&self, category: &str) -> bool {
        self.categories.contains_key(category)
    }
}

/// Outcome kind, a closed set per the design note on sum types over strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Refund,
    Return,
    Replacement,
    Discount,
    NeedsInfo,
    NotEligible,
}

/// The structured decision produced by the Policy Engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyOutcome {
    pub eligible: bool,
    pub outcome: OutcomeKind,
    pub discount_percent: f64,
    pub reason: String,
    #[serde(default)]
    pub refused_excess_discount: bool,
}

impl PolicyOutcome {
    fn needs_info(reason: impl Into<String>) -> Self {
        Self {
            eligible: false,
            outcome: OutcomeKind::NeedsInfo,
            discount_percent: 0.0,
            reason: reason.into(),
            refused_excess_discount: false,
        }
    }

    fn not_eligible(reason: impl Into<String>) -> Self {
        Self {
            eligible: false,
            outcome: OutcomeKind::NotEligible,
            discount_percent: 0.0,
            reason: reason.into(),
            refused_excess_discount: false,
        }
    }
}

fn outcome_kind_for_intent(intent: &str) -> Option<OutcomeKind> {
    match intent {
        "refund" => Some(OutcomeKind::Refund),
        "return" => Some(OutcomeKind::Return),
        "replacement" => Some(OutcomeKind::Replacement),
        "discount" => Some(OutcomeKind::Discount),
        _ => None,
    }
}

/// Pure function of the policy table and its inputs — no I/O, no
/// exceptions; every error condition is encoded in the returned
/// `PolicyOutcome`, as mandated by §4.1's "Failure" clause.
pub struct PolicyEngine<'a> {
    table: &'a PolicyTable,
}

impl<'a> PolicyEngine<'a> {
    pub fn new(table: &'a PolicyTable) -> Self {
        Self { table }
    }

    /// `evaluate(category, intent, days_since_purchase, item_opened,
    /// requested_discount) -> PolicyOutcome`, the ordered first-match-wins
    /// algorithm from §4.1.
    #[tracing::instrument(skip(self), fields(category, intent))]
    pub fn evaluate(
        &self,
        category: &str,
        intent: &str,
        days_since_purchase: Option<i64>,
        item_opened: Option<bool>,
        requested_discount: Option<f64>,
    ) -> PolicyOutcome {
        let Some(policy) = self.table.get(category) else {
            return PolicyOutcome::needs_info("Unknown category");
        };

        let mut missing = Vec::new();
        if days_since_purchase.is_none() {
            missing.push("days_since_purchase");
        }
        if matches!(intent, "refund" | "return") && item_opened.is_none() {
            missing.push("item_opened");
        }
        if !missing.is_empty() {
            return PolicyOutcome::needs_info(format!(
                "Missing required info: {}.",
                missing.join(", ")
            ));
        }
        let days = days_since_purchase.expect("checked above");

        if matches!(intent, "refund" | "return" | "replacement")
            && days > policy.return_window_days
        {
            return PolicyOutcome::not_eligible("Return window exceeded based on store policy.");
        }

        if category == "Headphones & Audio"
            && matches!(intent, "refund" | "return")
            && item_opened == Some(true)
        {
            return PolicyOutcome::not_eligible(
                "Opened in-ear headphones are not eligible for refund.",
            );
        }

        if !policy.allows(intent) {
            return PolicyOutcome::not_eligible(
                "Requested outcome is not allowed for this category.",
            );
        }

        if intent == "discount" {
            let base = policy.base_discount(days);
            let refused = requested_discount
                .map(|d| d > policy.discount_cap_percent)
                .unwrap_or(false);
            let mut discount = requested_discount.map(|d| base.min(d)).unwrap_or(base);
            discount = discount.min(policy.discount_cap_percent);
            return PolicyOutcome {
                eligible: true,
                outcome: OutcomeKind::Discount,
                discount_percent: discount,
                reason: "Discount determined by policy tiers and caps.".into(),
                refused_excess_discount: refused,
            };
        }

        let outcome = outcome_kind_for_intent(intent).unwrap_or(OutcomeKind::NotEligible);
        PolicyOutcome {
            eligible: true,
            outcome,
            discount_percent: 0.0,
            reason: "Eligible under store policy.".into(),
            refused_excess_discount: false,
        }
    }
}

/// The default policy table shipped with this crate, unifying both
/// historical category vocabularies (see DESIGN.md) so every literal
/// end-to-end scenario in SPEC_FULL §8 is satisfiable from one file.
pub const DEFAULT_POLICY_TABLE_JSON: &str = include_str!("../policies.json");

#[cfg(test)]
mod tests {
    use super::*;

    fn engine_from_default() -> PolicyTable {
        PolicyTable::from_json_str(DEFAULT_POLICY_TABLE_JSON).unwrap()
    }

    #[test]
    fn phones_discount_cap_enforced() {
        let table = engine_from_default();
        let engine = PolicyEngine::new(&table);
        let outcome = engine.evaluate("Phones", "discount", Some(3), Some(false), Some(50.0));
        assert!(outcome.discount_percent <= 12.0);
        assert!(outcome.refused_excess_discount);
    }

    #[test]
    fn opened_headphones_refund_refused() {
        let table = engine_from_default();
        let engine = PolicyEngine::new(&table);
        let outcome = engine.evaluate(
            "Headphones & Audio",
            "refund",
            Some(5),
            Some(true),
            None,
        );
        assert!(!outcome.eligible);
    }

    #[test]
    fn furniture_late_return_not_eligible() {
        let table = engine_from_default();
        let engine = PolicyEngine::new(&table);
        let outcome = engine.evaluate("Furniture", "return", Some(90), Some(false), None);
        assert!(!outcome.eligible);
        assert!(outcome.reason.to_lowercase().contains("window"));
    }

    #[test]
    fn electronics_refund_within_window() {
        let table = engine_from_default();
        let engine = PolicyEngine::new(&table);
        let outcome = engine.evaluate("Electronics", "refund", Some(10), Some(false), None);
        assert!(outcome.eligible);
        assert_eq!(outcome.outcome, OutcomeKind::Refund);
    }

    #[test]
    fn missing_days_is_needs_info() {
        let table = engine_from_default();
        let engine = PolicyEngine::new(&table);
        let outcome = engine.evaluate("Electronics", "refund", None, Some(false), None);
        assert_eq!(outcome.outcome, OutcomeKind::NeedsInfo);
    }

    #[test]
    fn evaluate_is_idempotent() {
        let table = engine_from_default();
        let engine = PolicyEngine::new(&table);
        let a = engine.evaluate("Electronics", "refund", Some(10), Some(false), None);
        let b = engine.evaluate("Electronics", "refund", Some(10), Some(false), None);
        assert_eq!(a.outcome, b.outcome);
        assert_eq!(a.discount_percent, b.discount_percent);
    }

    #[test]
    fn unknown_category_needs_info() {
        let table = engine_from_default();
        let engine = PolicyEngine::new(&table);
        let outcome = engine.evaluate("Spaceships", "refund", Some(1), Some(false), None);
        assert_eq!(outcome.outcome, OutcomeKind::NeedsInfo);
    }
}
