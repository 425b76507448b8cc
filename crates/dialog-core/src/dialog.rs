//! Dialog Manager: the per-turn orchestrator and the core state machine
//! (§4.4, §4.5, §4.6). Ported from
//! `original_source/shop_agent/orchestrator.py`'s `handle_turn` control
//! flow, restructured as an explicit ten-step pipeline over a typed
//! `SessionState` instead of a dynamic attribute bag.

use tracing::{debug, info, warn};

use crate::adapters::{ImageClassification, LlmOracle, NluUpdate, PriceProvider};
use crate::policy::{OutcomeKind, PolicyEngine, PolicyOutcome, PolicyTable};
use crate::retention;
use crate::risk::detect_emergency;
use crate::session::{PickupAddress, QuestionSlot, SessionState, Status, UserGoal};
use crate::slots;

/// Tunable knobs that are part of the core's contract, not deployment
/// plumbing (turn budget and the image-confidence floor are invariants
/// named explicitly in §4.2 and §4.4/§4.7). Deployment-level configuration
/// (endpoints, timeouts, retries) lives in `llm-adapters::config`.
#[derive(Debug, Clone)]
pub struct DialogConfig {
    pub turn_budget: u32,
    pub image_confidence_floor: f64,
}

impl Default for DialogConfig {
    fn default() -> Self {
        Self {
            turn_budget: 8,
            image_confidence_floor: 0.70,
        }
    }
}

/// What `handle_turn` returns to the transport layer (§6).
#[derive(Debug, Clone)]
pub struct TurnResult {
    pub reply: String,
    pub status: Status,
    pub next_question_slot: Option<QuestionSlot>,
}

pub struct DialogManager<'a> {
    policy_table: &'a PolicyTable,
    oracle: &'a dyn LlmOracle,
    price_provider: &'a dyn PriceProvider,
    config: DialogConfig,
}

impl<'a> DialogManager<'a> {
    pub fn new(
        policy_table: &'a PolicyTable,
        oracle: &'a dyn LlmOracle,
        price_provider: &'a dyn PriceProvider,
    ) -> Self {
        Self::with_config(policy_table, oracle, price_provider, DialogConfig::default())
    }

    pub fn with_config(
        policy_table: &'a PolicyTable,
        oracle: &'a dyn LlmOracle,
        price_provider: &'a dyn PriceProvider,
        config: DialogConfig,
    ) -> Self {
        Self {
            policy_table,
            oracle,
            price_provider,
            config,
        }
    }

    /// The per-turn pipeline. Never returns an error: every failure mode
    /// manifests as an unmodified slot or a user-visible reply (§7).
    #[tracing::instrument(skip(self, state, image_bytes), fields(session_id = %state.session_id))]
    pub async fn handle_turn(
        &self,
        state: &mut SessionState,
        user_message: &str,
        image_bytes: Option<&[u8]>,
    ) -> TurnResult {
        // 1. Bookkeeping.
        state.turn_count += 1;
        if detect_emergency(user_message) {
            state.emergency_trigger = true;
        }

        // 2. Follow-up parsing.
        self.apply_followup_parser(state, user_message);

        // 3. Image classification.
        if let Some(bytes) = image_bytes {
            self.apply_image_classification(state, user_message, bytes).await;
        }

        // 4. NLU extraction.
        if self.should_run_nlu(state) {
            self.apply_nlu_extraction(state, user_message).await;
        }

        // 5. Derived enrichment.
        self.apply_derived_enrichment(state).await;

        // 6. Missing-slot computation.
        let missing = self.compute_missing_slots(state);

        // 7. Turn-budget check.
        if state.turn_count >= self.config.turn_budget && !missing.is_empty() {
            state.status = Status::NeedsInfo;
            return TurnResult {
                reply: self.fallback_summary(state, &missing),
                status: Status::NeedsInfo,
                next_question_slot: None,
            };
        }

        // 8. Ask-next rule.
        if let Some(slot) = missing.iter().find(|s| !state.has_asked(**s)) {
            let slot = *slot;
            state.mark_asked(slot);
            state.last_question_slot = Some(slot);
            state.status = Status::NeedsInfo;
            return TurnResult {
                reply: question_for_slot(slot).to_string(),
                status: Status::NeedsInfo,
                next_question_slot: Some(slot),
            };
        }

        // 9. Stall reply.
        if !missing.is_empty() {
            state.status = Status::NeedsInfo;
            return TurnResult {
                reply: "I can proceed once the remaining detail is provided.".to_string(),
                status: Status::NeedsInfo,
                next_question_slot: None,
            };
        }

        // 10. Decision.
        self.decide(state).await
    }

    fn apply_followup_parser(&self, state: &mut SessionState, message: &str) {
        let Some(slot) = state.last_question_slot else {
            return;
        };
        let parsed = match slot {
            QuestionSlot::DaysSincePurchase => slots::parse_days_since_purchase(message)
                .map(|v| state.days_since_purchase = Some(v))
                .is_some(),
            QuestionSlot::ItemOpened => slots::parse_item_opened(message)
                .map(|v| state.item_opened = Some(v))
                .is_some(),
            QuestionSlot::FurnitureAssembled => slots::parse_furniture_assembled(message)
                .map(|v| state.furniture_assembled = Some(v))
                .is_some(),
            QuestionSlot::ElectronicsDefectClaimed => {
                slots::parse_electronics_defect_claimed(message)
                    .map(|v| state.electronics_defect_claimed = Some(v))
                    .is_some()
            }
            QuestionSlot::DefectEvidencePresent => slots::parse_item_opened(message)
                .map(|v| state.defect_evidence_present = Some(v))
                .is_some(),
            QuestionSlot::Intent => slots::parse_intent(message)
                .map(|v| state.user_goal = user_goal_from_str(v))
                .is_some(),
            QuestionSlot::Category => slots::parse_category(message)
                .map(|v| state.category = Some(v.to_string()))
                .is_some(),
            QuestionSlot::CustomerPhone => slots::parse_customer_phone(message)
                .map(|v| state.customer_phone = Some(v))
                .is_some(),
            QuestionSlot::PickupAddress => slots::parse_pickup_address(message)
                .map(|v: PickupAddress| state.pickup_address = Some(v))
                .is_some(),
            QuestionSlot::CustomerName => slots::parse_customer_name(message)
                .map(|v| state.customer_name = Some(v))
                .is_some(),
            QuestionSlot::PurchasePrice => slots::parse_purchase_price(message)
                .map(|v| state.purchase_price = Some(v))
                .is_some(),
            QuestionSlot::ProductId => slots::parse_product_id(message)
                .map(|v| state.product_id = Some(v))
                .is_some(),
        };
        if parsed {
            debug!(?slot, "follow-up parser filled slot");
            state.last_question_slot = None;
        }
    }

    async fn apply_image_classification(
        &self,
        state: &mut SessionState,
        user_message: &str,
        image_bytes: &[u8],
    ) {
        match self.oracle.classify_image(user_message, image_bytes).await {
            Ok(classification) => {
                if self.accept_image_classification(&classification) {
                    state.category = classification.category;
                } else {
                    warn!(
                        confidence = classification.confidence,
                        needs_clarification = classification.needs_clarification,
                        "rejected image classification"
                    );
                }
            }
            Err(err) => {
                warn!(error = %err, "image classification call failed");
            }
        }
    }

    fn accept_image_classification(&self, classification: &ImageClassification) -> bool {
        !classification.needs_clarification
            && classification.confidence >= self.config.image_confidence_floor
            && classification
                .category
                .as_deref()
                .map(|c| self.policy_table.contains(c))
                .unwrap_or(false)
    }

    fn should_run_nlu(&self, state: &SessionState) -> bool {
        state.category.is_none()
            || state.user_goal == UserGoal::Unknown
            || state.days_since_purchase.is_none()
            || state.item_opened.is_none()
            || state.purchase_price.is_none()
            || state.product_id.is_none()
            || state.product_url.is_none()
    }

    async fn apply_nlu_extraction(&self, state: &mut SessionState, message: &str) {
        match self.oracle.extract_intent(message).await {
            Ok(update) => self.merge_nlu_update(state, update),
            Err(err) => warn!(error = %err, "NLU extraction call failed"),
        }
    }

    /// Accept a field only when non-null and, for `category`, valid
    /// against the declared policy table (§4.2's anti-hallucination gate).
    /// Never overwrites a slot that is already filled.
    fn merge_nlu_update(&self, state: &mut SessionState, update: NluUpdate) {
        if let Some(goal) = update.user_goal.as_deref() {
            if state.user_goal == UserGoal::Unknown {
                if let Some(parsed) = user_goal_from_valid_str(goal) {
                    state.user_goal = parsed;
                } else {
                    warn!(goal, "discarded out-of-domain user_goal from NLU");
                }
            }
        }
        if state.user_goal_summary.is_empty() {
            if let Some(summary) = update.user_goal_summary {
                state.user_goal_summary = summary;
            }
        }
        if state.category.is_none() {
            match update.category {
                Some(cat) if self.policy_table.contains(&cat) => state.category = Some(cat),
                Some(cat) => warn!(category = cat, "discarded out-of-domain category from NLU"),
                None => {}
            }
        }
        if state.days_since_purchase.is_none() {
            state.days_since_purchase = update.days_since_purchase;
        }
        if state.item_opened.is_none() {
            state.item_opened = update.item_opened;
        }
        if state.purchase_price.is_none() {
            state.purchase_price = update.purchase_price;
        }
        if state.product_id.is_none() {
            state.product_id = update.product_id;
        }
        if state.product_url.is_none() {
            state.product_url = update.product_url;
        }
        if state.furniture_assembled.is_none() {
            state.furniture_assembled = update.furniture_assembled;
        }
        if state.electronics_defect_claimed.is_none() {
            state.electronics_defect_claimed = update.electronics_defect_claimed;
        }
        if state.customer_name.is_none() {
            state.customer_name = update.customer_name;
        }
        if state.customer_phone.is_none() {
            state.customer_phone = update.customer_phone;
        }
    }

    async fn apply_derived_enrichment(&self, state: &mut SessionState) {
        if state.product_id.is_none() {
            if let Some(url) = state.product_url.clone() {
                if let Some(id) = slots::parse_product_id(&url) {
                    state.product_id = Some(id);
                }
            }
        }
        if state.purchase_price.is_none() {
            if let Some(id) = state.product_id.clone() {
                if let Some(price) = self.price_provider.get_price(&id).await {
                    state.purchase_price = Some(price);
                }
            }
        }
    }

    /// Category-conditional required-slot list, in the fixed order §4.4
    /// step 6 names.
    fn compute_missing_slots(&self, state: &SessionState) -> Vec<QuestionSlot> {
        let mut missing = Vec::new();
        if state.category.is_none() {
            missing.push(QuestionSlot::Category);
        }
        if state.user_goal == UserGoal::Unknown {
            missing.push(QuestionSlot::Intent);
        }

        let category = state.category.as_deref();

        // Food's decision (§4.5) is retention regardless of any other slot;
        // gating it behind item_opened/purchase_price would make the
        // single-turn retention-with-emergency-snap scenario unreachable.
        if category == Some("Food") {
            return missing;
        }

        // §4.1's policy engine treats item_opened as mandatory whenever the
        // intent is refund/return; collect it up front so categories routed
        // through `decide_via_policy_engine` (Phones, Headphones & Audio)
        // never reach the engine with it unset. Art's approved path never
        // consults it (§4.4).
        if matches!(state.user_goal, UserGoal::Refund | UserGoal::Return)
            && category != Some("Art")
            && state.item_opened.is_none()
        {
            missing.push(QuestionSlot::ItemOpened);
        }

        match category {
            Some("Furniture") => {
                if state.days_since_purchase.is_none() && state.purchase_date_iso.is_none() {
                    missing.push(QuestionSlot::DaysSincePurchase);
                }
                let days = effective_days_since_purchase(state);
                if days.map(|d| d <= 7).unwrap_or(false)
                    && state.furniture_assembled.is_none()
                {
                    missing.push(QuestionSlot::FurnitureAssembled);
                }
            }
            Some("Electronics") => {
                if state.electronics_defect_claimed.is_none() {
                    missing.push(QuestionSlot::ElectronicsDefectClaimed);
                }
                if state.electronics_defect_claimed == Some(true)
                    && state.defect_evidence_present.is_none()
                {
                    missing.push(QuestionSlot::DefectEvidencePresent);
                }
            }
            Some("Art") => {
                if state.customer_name.is_none() {
                    missing.push(QuestionSlot::CustomerName);
                }
                if state.pickup_address.is_none() {
                    missing.push(QuestionSlot::PickupAddress);
                }
                if state.customer_phone.is_none() {
                    missing.push(QuestionSlot::CustomerPhone);
                }
            }
            _ => {
                if state.days_since_purchase.is_none() {
                    missing.push(QuestionSlot::DaysSincePurchase);
                }
            }
        }

        if matches!(state.user_goal, UserGoal::Refund | UserGoal::Discount)
            && state.purchase_price.is_none()
            && state.product_id.is_none()
        {
            missing.push(QuestionSlot::PurchasePrice);
        }

        missing
    }

    fn fallback_summary(&self, state: &SessionState, missing: &[QuestionSlot]) -> String {
        let mut summary = format!(
            "Here's what I have so far: category {}, goal {}.",
            state.category.as_deref().unwrap_or("unknown"),
            state.intent_str(),
        );
        if let Some(slot) = missing.first() {
            summary.push_str(&format!(
                " I still need one more detail: {}",
                detail_for_slot(*slot)
            ));
        }
        summary
    }

    async fn decide(&self, state: &mut SessionState) -> TurnResult {
        match state.category.as_deref() {
            Some("Food") => self.enter_retention(state, "Returns are not available for food items."),
            Some("Art") => self.finish_approved_with_fulfillment(state),
            Some("Electronics") => self.decide_electronics(state),
            Some("Furniture") => self.decide_furniture(state),
            Some(category) => self.decide_via_policy_engine(state, category),
            None => self.enter_retention(state, "Unable to match policy."),
        }
    }

    fn decide_electronics(&self, state: &mut SessionState) -> TurnResult {
        match (state.electronics_defect_claimed, state.defect_evidence_present) {
            (Some(false), _) => {
                self.enter_retention(state, "Returns only for defective items.")
            }
            (Some(true), Some(false)) | (Some(true), None) => {
                state.status = Status::AwaitingEvidence;
                TurnResult {
                    reply: "Could you share a photo, video, or describe the symptoms of the defect?"
                        .to_string(),
                    status: Status::AwaitingEvidence,
                    next_question_slot: None,
                }
            }
            (Some(true), Some(true)) => self.finish_approved_with_fulfillment(state),
            (None, _) => self.enter_retention(state, "Unable to match policy."),
        }
    }

    fn decide_furniture(&self, state: &mut SessionState) -> TurnResult {
        let Some(days) = effective_days_since_purchase(state) else {
            state.status = Status::NeedsInfo;
            return TurnResult {
                reply: "Need purchase timing.".to_string(),
                status: Status::NeedsInfo,
                next_question_slot: None,
            };
        };
        if days > 7 {
            return self.enter_retention(state, "Limited to 7 days.");
        }
        if state.furniture_assembled == Some(true) {
            return self.enter_retention(state, "Assembled furniture cannot be returned.");
        }
        self.finish_approved_with_fulfillment(state)
    }

    fn decide_via_policy_engine(&self, state: &mut SessionState, category: &str) -> TurnResult {
        let engine = PolicyEngine::new(self.policy_table);
        let outcome = engine.evaluate(
            category,
            state.intent_str(),
            state.days_since_purchase,
            state.item_opened,
            requested_discount(state),
        );
        info!(?outcome.outcome, outcome.discount_percent, "policy engine decision");
        let reply = render_policy_outcome(&outcome);
        let status = match outcome.eligible {
            true if outcome.outcome != OutcomeKind::NeedsInfo => Status::Approved,
            _ => Status::Retention,
        };
        state.last_policy_outcome = Some(outcome);
        state.status = status;
        TurnResult {
            reply,
            status,
            next_question_slot: None,
        }
    }

    fn enter_retention(&self, state: &mut SessionState, reason: &str) -> TurnResult {
        let decision = retention::decide(state.retention_step, state.emergency_trigger);
        state.retention_step = decision.step;
        state.status = Status::Retention;
        state.last_policy_outcome = Some(PolicyOutcome {
            eligible: false,
            outcome: OutcomeKind::NotEligible,
            discount_percent: decision.discount_percent,
            reason: reason.to_string(),
            refused_excess_discount: false,
        });
        TurnResult {
            reply: retention::line_for_step(decision.step).to_string(),
            status: Status::Retention,
            next_question_slot: None,
        }
    }

    fn finish_approved_with_fulfillment(&self, state: &mut SessionState) -> TurnResult {
        if state.customer_name.is_none() {
            return self.ask_fulfillment_slot(state, QuestionSlot::CustomerName);
        }
        if state.pickup_address.is_none() {
            return self.ask_fulfillment_slot(state, QuestionSlot::PickupAddress);
        }
        if state.customer_phone.is_none() {
            return self.ask_fulfillment_slot(state, QuestionSlot::CustomerPhone);
        }
        if state.ticket_number.is_none() {
            state.ticket_number = Some(generate_ticket_number(&state.session_id, state.turn_count));
        }
        state.status = Status::Approved;
        TurnResult {
            reply: format!(
                "Request #{} created. Courier will contact you.",
                state.ticket_number.clone().unwrap_or_default()
            ),
            status: Status::Approved,
            next_question_slot: None,
        }
    }

    fn ask_fulfillment_slot(&self, state: &mut SessionState, slot: QuestionSlot) -> TurnResult {
        state.mark_asked(slot);
        state.last_question_slot = Some(slot);
        state.status = Status::NeedsInfo;
        TurnResult {
            reply: question_for_slot(slot).to_string(),
            status: Status::NeedsInfo,
            next_question_slot: Some(slot),
        }
    }
}

/// The discount percent a customer asked for, if they named one in plain
/// language (e.g. "can I get 50% off"). Not a dedicated slot: the policy
/// engine only needs this to decide `refused_excess_discount` (§4.1), so a
/// plain numeric-percent scan over the goal summary is sufficient.
fn requested_discount(state: &SessionState) -> Option<f64> {
    if state.user_goal != UserGoal::Discount {
        return None;
    }
    let text = &state.user_goal_summary;
    let idx = text.find('%')?;
    let digits_start = text[..idx]
        .rfind(|c: char| !c.is_ascii_digit() && c != '.')
        .map(|i| i + 1)
        .unwrap_or(0);
    text[digits_start..idx].parse().ok()
}

fn render_policy_outcome(outcome: &PolicyOutcome) -> String {
    format!(
        "{} (outcome: {:?}, discount: {}%)",
        outcome.reason, outcome.outcome, outcome.discount_percent
    )
}

fn user_goal_from_str(s: &str) -> UserGoal {
    user_goal_from_valid_str(s).unwrap_or(UserGoal::Unknown)
}

fn user_goal_from_valid_str(s: &str) -> Option<UserGoal> {
    match s {
        "refund" => Some(UserGoal::Refund),
        "return" => Some(UserGoal::Return),
        "replacement" => Some(UserGoal::Replacement),
        "discount" => Some(UserGoal::Discount),
        _ => None,
    }
}

fn effective_days_since_purchase(state: &SessionState) -> Option<i64> {
    if let Some(days) = state.days_since_purchase {
        return Some(days);
    }
    let iso = state.purchase_date_iso.as_deref()?;
    let purchase_date = chrono::NaiveDate::parse_from_str(iso, "%Y-%m-%d").ok()?;
    let today = chrono::Utc::now().date_naive();
    Some((today - purchase_date).num_days())
}

fn question_for_slot(slot: QuestionSlot) -> &'static str {
    match slot {
        QuestionSlot::Category => "What kind of item is this regarding?",
        QuestionSlot::Intent => "Are you looking for a refund, return, replacement, or discount?",
        QuestionSlot::DaysSincePurchase => "How many days ago did you make this purchase?",
        QuestionSlot::ItemOpened => "Has the item been opened?",
        QuestionSlot::FurnitureAssembled => "Has the furniture been assembled?",
        QuestionSlot::ElectronicsDefectClaimed => "Is the item defective, or did you change your mind?",
        QuestionSlot::DefectEvidencePresent => {
            "Could you share a photo, video, or describe the symptoms of the defect?"
        }
        QuestionSlot::CustomerName => "Can I get your full name for the order?",
        QuestionSlot::PickupAddress => "What's the pickup address (street, house/apt, city)?",
        QuestionSlot::CustomerPhone => "What's the best phone number to reach you?",
        QuestionSlot::PurchasePrice => "What was the purchase price?",
        QuestionSlot::ProductId => "Do you have the product ID or a link to the product?",
    }
}

fn detail_for_slot(slot: QuestionSlot) -> &'static str {
    question_for_slot(slot)
}

/// Deterministic 8-digit pseudo-random ticket number, assigned once.
/// Derived from a simple hash of the session id and turn count so the
/// core stays deterministic given its inputs (no RNG dependency).
fn generate_ticket_number(session_id: &str, turn_count: u32) -> String {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    session_id.hash(&mut hasher);
    turn_count.hash(&mut hasher);
    let digits = hasher.finish() % 100_000_000;
    format!("{digits:08}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{ImageClassification, LlmOracle, NluUpdate, OracleError, PriceProvider};
    use crate::policy::PolicyTable;

    struct FixtureOracle {
        nlu: NluUpdate,
    }

    #[async_trait::async_trait]
    impl LlmOracle for FixtureOracle {
        async fn extract_intent(&self, _user_message: &str) -> Result<NluUpdate, OracleError> {
            Ok(self.nlu.clone())
        }

        async fn classify_image(
            &self,
            _user_message: &str,
            _image_bytes: &[u8],
        ) -> Result<ImageClassification, OracleError> {
            Ok(ImageClassification {
                item_name_guess: "headset".into(),
                category: Some("Furniture".into()),
                confidence: 0.9,
                observations: "Over-ear headset".into(),
                needs_clarification: false,
            })
        }

        async fn generate_text(&self, _prompt: &str) -> Result<String, OracleError> {
            Ok("Policy response.".into())
        }
    }

    struct NullPrice;

    #[async_trait::async_trait]
    impl PriceProvider for NullPrice {
        async fn get_price(&self, _product_id: &str) -> Option<f64> {
            None
        }
    }

    fn table() -> PolicyTable {
        PolicyTable::from_json_str(crate::policy::DEFAULT_POLICY_TABLE_JSON).unwrap()
    }

    #[tokio::test]
    async fn followup_days_parser_advances_to_opened_question() {
        let table = table();
        let oracle = FixtureOracle { nlu: NluUpdate::default() };
        let price = NullPrice;
        let manager = DialogManager::new(&table, &oracle, &price);

        let mut state = SessionState::new("s1");
        state.category = Some("Electronics".into());
        state.user_goal = UserGoal::Refund;
        state.last_question_slot = Some(QuestionSlot::DaysSincePurchase);
        state.mark_asked(QuestionSlot::DaysSincePurchase);

        let result = manager.handle_turn(&mut state, "4 days", None).await;
        assert_eq!(state.days_since_purchase, Some(4));
        assert_eq!(result.next_question_slot, Some(QuestionSlot::ItemOpened));
    }

    #[tokio::test]
    async fn followup_assembled_parser_sets_false() {
        let table = table();
        let oracle = FixtureOracle { nlu: NluUpdate::default() };
        let price = NullPrice;
        let manager = DialogManager::new(&table, &oracle, &price);

        let mut state = SessionState::new("s2");
        state.category = Some("Furniture".into());
        state.user_goal = UserGoal::Refund;
        state.last_question_slot = Some(QuestionSlot::FurnitureAssembled);
        state.mark_asked(QuestionSlot::FurnitureAssembled);

        let result = manager.handle_turn(&mut state, "not assembled", None).await;
        assert_eq!(state.furniture_assembled, Some(false));
        assert!(!result.reply.is_empty());
    }

    #[tokio::test]
    async fn food_always_enters_retention() {
        let table = table();
        let oracle = FixtureOracle { nlu: NluUpdate::default() };
        let price = NullPrice;
        let manager = DialogManager::new(&table, &oracle, &price);

        let mut state = SessionState::new("s3");
        state.category = Some("Food".into());
        state.user_goal = UserGoal::Refund;
        state.days_since_purchase = Some(1);

        let result = manager.handle_turn(&mut state, "I want a refund", None).await;
        assert_eq!(result.status, Status::Retention);
    }

    #[tokio::test]
    async fn phones_refund_collects_item_opened_before_policy_engine() {
        let table = table();
        let oracle = FixtureOracle { nlu: NluUpdate::default() };
        let price = NullPrice;
        let manager = DialogManager::new(&table, &oracle, &price);

        let mut state = SessionState::new("s7");
        state.category = Some("Phones".into());
        state.user_goal = UserGoal::Refund;
        state.days_since_purchase = Some(5);
        state.purchase_price = Some(599.0);

        let first = manager.handle_turn(&mut state, "I'd like a refund", None).await;
        assert_eq!(first.next_question_slot, Some(QuestionSlot::ItemOpened));

        let second = manager.handle_turn(&mut state, "no, still sealed", None).await;
        assert_eq!(state.item_opened, Some(false));
        assert_eq!(second.status, Status::Approved);
    }

    #[tokio::test]
    async fn emergency_trigger_caps_discount_at_twenty_percent() {
        let table = table();
        let oracle = FixtureOracle { nlu: NluUpdate::default() };
        let price = NullPrice;
        let manager = DialogManager::new(&table, &oracle, &price);

        let mut state = SessionState::new("s4");
        state.category = Some("Food".into());
        state.user_goal = UserGoal::Refund;
        state.days_since_purchase = Some(1);

        manager
            .handle_turn(&mut state, "I will sue you and leave bad reviews.", None)
            .await;
        assert!(state.emergency_trigger);
        assert_eq!(state.retention_step, 4);
        let discount = state.last_policy_outcome.as_ref().unwrap().discount_percent;
        assert!(discount <= 20.0);
    }

    #[tokio::test]
    async fn turn_budget_forces_fallback_after_eight_turns() {
        let table = table();
        let oracle = FixtureOracle { nlu: NluUpdate::default() };
        let price = NullPrice;
        let manager = DialogManager::new(&table, &oracle, &price);

        let mut state = SessionState::new("s5");
        let mut last = manager.handle_turn(&mut state, "I need help", None).await;
        for _ in 0..7 {
            last = manager.handle_turn(&mut state, "I need help", None).await;
        }
        assert_eq!(state.turn_count, 8);
        assert!(last.reply.to_lowercase().contains("one more detail"));
        assert!(last.next_question_slot.is_none());
    }

    #[tokio::test]
    async fn at_most_one_question_per_turn_and_no_slot_repeats() {
        let table = table();
        let oracle = FixtureOracle { nlu: NluUpdate::default() };
        let price = NullPrice;
        let manager = DialogManager::new(&table, &oracle, &price);

        let mut state = SessionState::new("s6");
        for _ in 0..3 {
            manager.handle_turn(&mut state, "hello", None).await;
        }
        let asked: Vec<_> = state.asked_slots.iter().collect();
        let mut deduped = asked.clone();
        deduped.dedup();
        assert_eq!(asked.len(), deduped.len());
    }
}
