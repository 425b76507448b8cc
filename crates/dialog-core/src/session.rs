//! Durable per-conversation state.
//!
//! `SessionState` is the sole mutable object the dialog core owns; the
//! session store loads one per `session_id` and the `DialogManager` mutates
//! it in place across a turn, the way the original source's `Case` row is
//! mutated by `Orchestrator.handle_turn`. Every field round-trips through
//! `serde_json` unchanged (§8's round-trip invariant); unknown keys on load
//! are ignored and missing keys default, matching the persisted-state
//! contract in §6.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// What the customer is trying to accomplish. Closed set, per the design
/// note that `user_goal` must be a tagged enum rather than a free string so
/// the anti-hallucination gates in the extraction adapter are type-enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserGoal {
    Refund,
    Return,
    Replacement,
    Discount,
    Unknown,
}

impl Default for UserGoal {
    fn default() -> Self {
        UserGoal::Unknown
    }
}

/// Per-turn response status, part of the `handle_turn` contract (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    NeedsInfo,
    Approved,
    Retention,
    AwaitingEvidence,
    Unknown,
}

/// Every slot the dialog manager can ask about, in one closed enum. Doubles
/// as the "which slot is being asked" tag (`last_question_slot`) and as the
/// element type of the `asked_slots` set, per the design note that maps the
/// source's dynamic slot bag onto an explicit enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionSlot {
    Category,
    Intent,
    DaysSincePurchase,
    ItemOpened,
    FurnitureAssembled,
    ElectronicsDefectClaimed,
    DefectEvidencePresent,
    CustomerName,
    PickupAddress,
    CustomerPhone,
    PurchasePrice,
    ProductId,
}

/// Structured pickup address, stored both as the raw reply and as parsed
/// parts, per the slot parser table's "store both raw and parts" rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PickupAddress {
    pub raw: String,
    pub street: Option<String>,
    pub house: Option<String>,
    pub apt: Option<String>,
    pub city: Option<String>,
}

/// The durable per-conversation record. Created empty on first message for
/// a `session_id` (§3 lifecycle); destroyed only by external eviction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionState {
    pub session_id: String,

    // Intent slots
    #[serde(default)]
    pub user_goal: UserGoal,
    #[serde(default)]
    pub user_goal_summary: String,

    // Product slots
    pub category: Option<String>,
    pub item_guess: Option<String>,
    pub condition: Option<String>,
    /// Tri-state: `Some(true)`/`Some(false)`/`None` (unknown).
    pub item_opened: Option<bool>,
    pub purchase_price: Option<f64>,
    pub product_id: Option<String>,
    pub product_url: Option<String>,

    // Time slot
    pub days_since_purchase: Option<i64>,
    pub purchase_date_iso: Option<String>,

    // Category-conditional slots
    pub furniture_assembled: Option<bool>,
    pub electronics_defect_claimed: Option<bool>,
    pub defect_evidence_present: Option<bool>,

    // Fulfillment slots
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub pickup_address: Option<PickupAddress>,

    // Dialog bookkeeping
    #[serde(default)]
    pub turn_count: u32,
    #[serde(default)]
    pub asked_slots: BTreeSet<QuestionSlot>,
    pub last_question_slot: Option<QuestionSlot>,
    #[serde(default)]
    pub emergency_trigger: bool,
    #[serde(default)]
    pub retention_step: u8,
    pub last_policy_outcome: Option<crate::policy::PolicyOutcome>,
    pub ticket_number: Option<String>,

    // Supplemented (SPEC_FULL §3.1), additive audit/tone fields consumed by
    // an external admin surface, not by policy logic.
    pub requested_action: Option<String>,
    pub user_sentiment: Option<String>,

    /// Most recent `handle_turn` status, exposed for the transport layer
    /// without requiring it to re-derive it from `last_policy_outcome`.
    #[serde(default = "default_status")]
    pub status: Status,
}

fn default_status() -> Status {
    Status::Unknown
}

impl Default for Status {
    fn default() -> Self {
        Status::Unknown
    }
}

impl SessionState {
    /// A fresh, empty state for a session id, per §3's lifecycle rule: "a
    /// fresh state is returned for unknown ids."
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            ..Default::default()
        }
    }

    /// Mark `slot` as asked this session. Idempotent: asking the same slot
    /// twice does not shrink `asked_slots` or reset its insertion — the
    /// invariant is "no slot appears twice", not "insertion is tracked".
    pub fn mark_asked(&mut self, slot: QuestionSlot) {
        self.asked_slots.insert(slot);
    }

    pub fn has_asked(&self, slot: QuestionSlot) -> bool {
        self.asked_slots.contains(&slot)
    }

    /// The intent string used by the policy engine, canonicalized from
    /// `UserGoal`. `unknown` never reaches the engine as an `intent` value;
    /// callers must check for it first via `user_goal`.
    pub fn intent_str(&self) -> &'static str {
        match self.user_goal {
            UserGoal::Refund => "refund",
            UserGoal::Return => "return",
            UserGoal::Replacement => "replacement",
            UserGoal::Discount => "discount",
            UserGoal::Unknown => "unknown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_state_has_unknown_goal_and_zero_turns() {
        let s = SessionState::new("s1");
        assert_eq!(s.user_goal, UserGoal::Unknown);
        assert_eq!(s.turn_count, 0);
        assert!(s.asked_slots.is_empty());
    }

    #[test]
    fn round_trip_preserves_equality() {
        let mut s = SessionState::new("s1");
        s.category = Some("Furniture".into());
        s.turn_count = 3;
        s.mark_asked(QuestionSlot::DaysSincePurchase);
        s.pickup_address = Some(PickupAddress {
            raw: "1 Main St, Apt 2, Springfield".into(),
            street: Some("Main St".into()),
            house: Some("1".into()),
            apt: Some("2".into()),
            city: Some("Springfield".into()),
        });

        let json = serde_json::to_string(&s).unwrap();
        let back: SessionState = serde_json::from_str(&json).unwrap();
        assert_eq!(back.category, s.category);
        assert_eq!(back.turn_count, s.turn_count);
        assert_eq!(back.asked_slots, s.asked_slots);
        assert_eq!(back.pickup_address, s.pickup_address);
    }

    #[test]
    fn unknown_keys_are_ignored_on_load() {
        let json = r#"{"session_id":"s1","some_future_field":"x"}"#;
        let s: SessionState = serde_json::from_str(json).unwrap();
        assert_eq!(s.session_id, "s1");
    }

    #[test]
    fn mark_asked_is_idempotent() {
        let mut s = SessionState::new("s1");
        s.mark_asked(QuestionSlot::Category);
        s.mark_asked(QuestionSlot::Category);
        assert_eq!(s.asked_slots.len(), 1);
    }
}
