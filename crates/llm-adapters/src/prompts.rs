//! Prompt constants for the LLM oracle's two structured calls.
//!
//! Prompt versioning: bump `PROMPT_VERSION` whenever preamble content
//! changes. Emitted on every oracle call's trace span.

/// Prompt version. Bump on any preamble content change.
pub const PROMPT_VERSION: &str = "1.0.0";

pub use dialog_core::adapters::ANTI_OVERRIDE_PREAMBLE;

/// Schema the extractor is instructed to fill. Every field optional;
/// unspecified means "not mentioned" (distilled spec §4.2).
const NLU_SCHEMA_DESCRIPTION: &str = "\
{
  \"user_goal\": \"refund\" | \"return\" | \"replacement\" | \"discount\" | null,
  \"user_goal_summary\": string | null,
  \"category\": string | null,
  \"days_since_purchase\": integer | null,
  \"item_opened\": boolean | null,
  \"purchase_price\": number | null,
  \"product_id\": string | null,
  \"product_url\": string | null,
  \"furniture_assembled\": boolean | null,
  \"electronics_defect_claimed\": boolean | null,
  \"customer_name\": string | null,
  \"customer_phone\": string | null
}";

/// Builds the full `extract_intent` prompt: anti-override preamble, schema,
/// then the verbatim user message. The oracle adapter parses the model's
/// response against this shape; nothing here trusts the model to produce a
/// decision, only a set of candidate slot values.
pub fn nlu_extraction_prompt(user_message: &str) -> String {
    format!(
        "{ANTI_OVERRIDE_PREAMBLE}\n\n\
         Extract any of the following fields you can find in the customer's message. \
         Respond with a single JSON object matching this shape exactly, using null for \
         anything not mentioned. Do not include any text before or after the JSON.\n\n\
         {NLU_SCHEMA_DESCRIPTION}\n\n\
         Customer message:\n\"\"\"\n{user_message}\n\"\"\"\n"
    )
}

/// Builds the `classify_image` prompt. The accompanying image is attached
/// by the caller as a separate multimodal content part (§4.2); this text
/// only carries the schema and the user's caption, if any.
pub fn image_classification_prompt(user_message: &str) -> String {
    format!(
        "{ANTI_OVERRIDE_PREAMBLE}\n\n\
         Look at the attached product photo and the customer's message. Respond with a \
         single JSON object matching this shape exactly, with no text before or after it:\n\n\
         {{\n\
         \u{20}\"item_name_guess\": string,\n\
         \u{20}\"category\": string | null,\n\
         \u{20}\"confidence\": number between 0 and 1,\n\
         \u{20}\"observations\": string,\n\
         \u{20}\"needs_clarification\": boolean\n\
         }}\n\n\
         Set \"needs_clarification\" to true if the photo does not clearly show the item or \
         its condition. Customer message (may be empty):\n\"\"\"\n{user_message}\n\"\"\"\n"
    )
}

/// Preamble for the freeform render of a policy-engine decision (§4.6): the
/// outcome JSON is immutable context, never a suggestion the model can talk
/// itself out of.
pub use dialog_core::adapters::POLICY_RENDER_PREAMBLE;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nlu_prompt_embeds_preamble_and_message() {
        let prompt = nlu_extraction_prompt("it arrived broken 3 days ago");
        assert!(prompt.contains(ANTI_OVERRIDE_PREAMBLE));
        assert!(prompt.contains("it arrived broken 3 days ago"));
    }

    #[test]
    fn image_prompt_requests_needs_clarification_field() {
        let prompt = image_classification_prompt("here's a photo");
        assert!(prompt.contains("needs_clarification"));
    }
}
