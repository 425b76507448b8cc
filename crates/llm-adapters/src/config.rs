//! Environment-driven configuration for the adapter layer: the oracle
//! endpoint, the optional Amazon PA-API price endpoint, and the session
//! store directory. Grounded on `crates/swarm-agents/src/config.rs`'s
//! `SwarmConfig::default`/`cloud_from_env` env-var-with-fallback style,
//! narrowed from four inference tiers down to the single oracle endpoint
//! this domain needs.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use rig::providers::openai;

/// OpenAI-compatible oracle endpoint configuration.
#[derive(Debug, Clone)]
pub struct OracleEndpoint {
    pub url: String,
    pub model: String,
    pub api_key: String,
}

/// Amazon Product Advertising API credentials for the price provider.
#[derive(Debug, Clone)]
pub struct AmazonPaapiConfig {
    pub access_key: String,
    pub secret_key: String,
    pub partner_tag: String,
    pub host: String,
    pub region: String,
}

/// Top-level adapter configuration.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub oracle: OracleEndpoint,
    /// `None` falls back to the always-unknown null price provider.
    pub amazon_paapi: Option<AmazonPaapiConfig>,
    /// Directory `JsonFileSessionStore` reads/writes one file per session
    /// into.
    pub session_store_dir: PathBuf,
    /// Per-call timeout bound on the oracle and price provider, per §5
    /// ("suggested: 10 s").
    pub call_timeout: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            oracle: OracleEndpoint {
                url: std::env::var("RETAIL_ORACLE_URL")
                    .unwrap_or_else(|_| "http://localhost:8080/v1".into()),
                model: std::env::var("RETAIL_ORACLE_MODEL")
                    .unwrap_or_else(|_| "gpt-4o-mini".into()),
                api_key: std::env::var("RETAIL_ORACLE_API_KEY")
                    .unwrap_or_else(|_| "not-needed".into()),
            },
            amazon_paapi: Self::amazon_paapi_from_env(),
            session_store_dir: std::env::var("RETAIL_SESSION_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./sessions")),
            call_timeout: std::env::var("RETAIL_CALL_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or_else(|| Duration::from_secs(10)),
        }
    }
}

impl AgentConfig {
    fn amazon_paapi_from_env() -> Option<AmazonPaapiConfig> {
        let access_key = std::env::var("AMAZON_PAAPI_ACCESS_KEY").ok()?;
        let secret_key = std::env::var("AMAZON_PAAPI_SECRET_KEY").ok()?;
        let partner_tag = std::env::var("AMAZON_PAAPI_PARTNER_TAG").ok()?;
        let host = std::env::var("AMAZON_PAAPI_HOST")
            .unwrap_or_else(|_| "webservices.amazon.com".into());
        let region = std::env::var("AMAZON_PAAPI_REGION").unwrap_or_else(|_| "us-east-1".into());
        Some(AmazonPaapiConfig {
            access_key,
            secret_key,
            partner_tag,
            host,
            region,
        })
    }

    /// Configuration pointing the oracle at a local proxy, for integration
    /// tests.
    pub fn proxy_config() -> Self {
        Self {
            oracle: OracleEndpoint {
                url: "http://localhost:8317/v1".into(),
                model: "gpt-4o-mini".into(),
                api_key: "local-proxy-key".into(),
            },
            amazon_paapi: None,
            session_store_dir: PathBuf::from("./sessions"),
            call_timeout: Duration::from_secs(10),
        }
    }

    pub fn build_client(&self) -> Result<openai::CompletionsClient> {
        openai::CompletionsClient::builder()
            .api_key(&self.oracle.api_key)
            .base_url(&self.oracle.url)
            .build()
            .context("failed to build oracle client")
    }
}

/// Check whether the oracle endpoint is reachable. Queries `GET
/// /v1/models`; returns `true` only if the endpoint responds successfully.
///
/// If `api_key` is provided (and not `"not-needed"`), sends a Bearer auth
/// header.
pub async fn check_endpoint(url: &str, api_key: Option<&str>) -> bool {
    let models_url = format!("{url}/models");
    let client = reqwest::Client::new();
    let mut req = client
        .get(&models_url)
        .timeout(std::time::Duration::from_secs(5));

    if let Some(key) = api_key {
        if key != "not-needed" {
            req = req.bearer_auth(key);
        }
    }

    match req.send().await {
        Ok(resp) if resp.status().is_success() => true,
        Ok(resp) => {
            tracing::warn!(endpoint = url, status = %resp.status(), "oracle endpoint returned non-success status");
            false
        }
        Err(e) => {
            tracing::warn!(endpoint = url, error = %e, "oracle endpoint unreachable");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_falls_back_to_localhost() {
        std::env::remove_var("RETAIL_ORACLE_URL");
        let config = AgentConfig::default();
        assert!(config.oracle.url.contains("localhost"));
        assert_eq!(config.call_timeout, Duration::from_secs(10));
    }

    #[test]
    fn proxy_config_points_at_local_proxy() {
        let config = AgentConfig::proxy_config();
        assert!(config.oracle.url.contains("localhost:8317"));
    }

    #[test]
    fn amazon_paapi_absent_without_env() {
        std::env::remove_var("AMAZON_PAAPI_ACCESS_KEY");
        std::env::remove_var("AMAZON_PAAPI_SECRET_KEY");
        std::env::remove_var("AMAZON_PAAPI_PARTNER_TAG");
        let config = AgentConfig::default();
        assert!(config.amazon_paapi.is_none());
    }
}
