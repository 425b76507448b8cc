//! `RigLlmOracle`: a [`dialog_core::adapters::LlmOracle`] backed by a
//! rig-core agent talking to an OpenAI-compatible completions endpoint.
//!
//! Grounded on `crates/swarm-agents/src/agents/coder.rs`'s
//! `client.agent(model).name().preamble().temperature().build()`
//! construction style and `main.rs`'s `agent.prompt(&task_prompt).await`
//! call site — generalized from a tool-calling coding agent down to a
//! single structured-JSON-in, JSON-out call with no tools attached.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use rig::agent::Agent;
use rig::completion::Prompt;
use rig::providers::openai;
use tokio::time::timeout;

use dialog_core::adapters::{ImageClassification, LlmOracle, NluUpdate, OracleError};

use crate::prompts;

type OaiAgent = Agent<openai::completion::CompletionModel>;

/// Low, near-deterministic temperature: this oracle only ever extracts
/// structured fields or renders a fixed policy decision, never plans or
/// calls tools, so there is no reason to court variety.
const ORACLE_TEMPERATURE: f64 = 0.1;

pub struct RigLlmOracle {
    agent: OaiAgent,
    call_timeout: Duration,
}

impl RigLlmOracle {
    pub fn new(client: &openai::CompletionsClient, model: &str, call_timeout: Duration) -> Self {
        let agent = client
            .agent(model)
            .name("retail_dialog_oracle")
            .description("Structured-extraction oracle for a retail returns/refunds dialog agent")
            .preamble(dialog_core::adapters::ANTI_OVERRIDE_PREAMBLE)
            .temperature(ORACLE_TEMPERATURE)
            .build();
        Self { agent, call_timeout }
    }

    async fn prompt_for_json(&self, prompt: String) -> Result<String, OracleError> {
        match timeout(self.call_timeout, self.agent.prompt(&prompt)).await {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) => Err(OracleError::Unreachable(e.to_string())),
            Err(_) => Err(OracleError::Timeout),
        }
    }

    /// The provider's multimodal shape is endpoint-specific; rather than
    /// bind to one provider's message-content API, the image is inlined as
    /// a base64 data URL in the prompt text — every OpenAI-compatible
    /// vision endpoint this crate targets accepts that form inside a plain
    /// chat completion.
    async fn prompt_with_image_for_json(
        &self,
        prompt: String,
        image_bytes: &[u8],
    ) -> Result<String, OracleError> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(image_bytes);
        let message = format!("{prompt}\n\n![attached photo](data:image/jpeg;base64,{encoded})");
        match timeout(self.call_timeout, self.agent.prompt(&message)).await {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) => Err(OracleError::Unreachable(e.to_string())),
            Err(_) => Err(OracleError::Timeout),
        }
    }
}

/// Extracts the first top-level `{...}` object in `text`, tolerating
/// leading/trailing prose the model produced despite being told not to.
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

#[async_trait]
impl LlmOracle for RigLlmOracle {
    async fn extract_intent(&self, user_message: &str) -> Result<NluUpdate, OracleError> {
        tracing::debug!(prompt_version = prompts::PROMPT_VERSION, "issuing NLU extraction prompt");
        let prompt = prompts::nlu_extraction_prompt(user_message);
        let raw = self.prompt_for_json(prompt).await?;
        let json = extract_json_object(&raw)
            .ok_or_else(|| OracleError::InvalidOutput("no JSON object in response".into()))?;
        serde_json::from_str(json).map_err(|e| OracleError::InvalidOutput(e.to_string()))
    }

    async fn classify_image(
        &self,
        user_message: &str,
        image_bytes: &[u8],
    ) -> Result<ImageClassification, OracleError> {
        tracing::debug!(prompt_version = prompts::PROMPT_VERSION, "issuing image classification prompt");
        let prompt = prompts::image_classification_prompt(user_message);
        let raw = self.prompt_with_image_for_json(prompt, image_bytes).await?;
        let json = extract_json_object(&raw)
            .ok_or_else(|| OracleError::InvalidOutput("no JSON object in response".into()))?;
        serde_json::from_str(json).map_err(|e| OracleError::InvalidOutput(e.to_string()))
    }

    async fn generate_text(&self, prompt: &str) -> Result<String, OracleError> {
        self.prompt_for_json(prompt.to_string()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_json_object_strips_surrounding_prose() {
        let text = "Sure, here you go:\n{\"category\": \"Electronics\"}\nHope that helps!";
        assert_eq!(
            extract_json_object(text),
            Some("{\"category\": \"Electronics\"}")
        );
    }

    #[test]
    fn extract_json_object_none_without_braces() {
        assert_eq!(extract_json_object("no json here"), None);
    }
}
