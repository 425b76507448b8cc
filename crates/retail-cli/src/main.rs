//! Single-turn command-line driver for the retail returns/refunds dialog
//! agent. Ported from `original_source/shop_agent/cli.py`'s
//! load-session -> handle-turn -> save-session -> print flow, adapted to
//! `DialogManager::handle_turn`'s single-call contract (the Python
//! original called `update_intent`/`update_classification`/`decide_policy`
//! as three separate steps; the Rust core folds all of that into one
//! pipeline per §4.4).

use std::path::PathBuf;

use clap::Parser;
use dialog_core::dialog::DialogManager;
use dialog_core::policy::{PolicyTable, DEFAULT_POLICY_TABLE_JSON};
use llm_adapters::config::{check_endpoint, AgentConfig};
use llm_adapters::{build_price_provider, JsonFileSessionStore, RigLlmOracle};

/// Drive one turn of the retail returns/refunds dialog agent.
#[derive(Parser, Debug)]
#[command(name = "retail-cli", about = "Retail returns/refunds dialog agent CLI")]
struct Args {
    /// Session identifier; reused across invocations to continue a conversation.
    session_id: String,

    /// The customer's message for this turn.
    message: String,

    /// Path to an image file (e.g. a product photo) attached to this turn.
    #[arg(long)]
    image: Option<PathBuf>,

    /// Override the bundled policy table with one loaded from this file.
    #[arg(long)]
    policy_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = AgentConfig::default();

    let policy_table = match &args.policy_file {
        Some(path) => {
            let raw = std::fs::read_to_string(path)?;
            PolicyTable::from_json_str(&raw)?
        }
        None => PolicyTable::from_json_str(DEFAULT_POLICY_TABLE_JSON)?,
    };

    let store = JsonFileSessionStore::new(config.session_store_dir.clone());
    let price_provider = build_price_provider(config.amazon_paapi.clone(), config.call_timeout);

    let oracle_reachable =
        check_endpoint(&config.oracle.url, Some(config.oracle.api_key.as_str())).await;
    let client = config.build_client()?;
    let rig_oracle;
    let null_oracle;
    let oracle: &dyn dialog_core::adapters::LlmOracle = if oracle_reachable {
        rig_oracle = RigLlmOracle::new(&client, &config.oracle.model, config.call_timeout);
        &rig_oracle
    } else {
        tracing::warn!(url = %config.oracle.url, "oracle endpoint unreachable, falling back to a no-op oracle");
        null_oracle = NoopOracle;
        &null_oracle
    };

    let manager = DialogManager::new(&policy_table, oracle, price_provider.as_ref());

    let mut state = dialog_core::adapters::SessionStore::load(&store, &args.session_id).await;

    let image_bytes = match &args.image {
        Some(path) => Some(std::fs::read(path)?),
        None => None,
    };

    let result = manager
        .handle_turn(&mut state, &args.message, image_bytes.as_deref())
        .await;

    dialog_core::adapters::SessionStore::save(&store, &state).await?;

    println!("{}", result.reply);
    tracing::info!(status = ?result.status, "turn complete");

    Ok(())
}

/// Always-empty oracle, used when no reachable endpoint is configured so the
/// dialog manager still runs its deterministic slot-filling and policy path
/// (every field simply stays unfilled, per §7's no-throw contract).
struct NoopOracle;

#[async_trait::async_trait]
impl dialog_core::adapters::LlmOracle for NoopOracle {
    async fn extract_intent(
        &self,
        _user_message: &str,
    ) -> Result<dialog_core::adapters::NluUpdate, dialog_core::adapters::OracleError> {
        Ok(dialog_core::adapters::NluUpdate::default())
    }

    async fn classify_image(
        &self,
        _user_message: &str,
        _image_bytes: &[u8],
    ) -> Result<dialog_core::adapters::ImageClassification, dialog_core::adapters::OracleError> {
        Err(dialog_core::adapters::OracleError::Unreachable(
            "no oracle endpoint configured".into(),
        ))
    }

    async fn generate_text(
        &self,
        _prompt: &str,
    ) -> Result<String, dialog_core::adapters::OracleError> {
        Err(dialog_core::adapters::OracleError::Unreachable(
            "no oracle endpoint configured".into(),
        ))
    }
}
