//! Price provider adapters: maps a product identifier to a numeric price
//! (§6). Ported from `original_source/shop_agent/pricing.py`'s
//! `AmazonPAAPIPriceProvider` (SigV4-signed POST to the Amazon Product
//! Advertising API) and `build_price_provider`'s env-gated factory.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::{Digest, Sha256};

use dialog_core::adapters::PriceProvider;
pub use dialog_core::adapters::NullPriceProvider;

use crate::config::AmazonPaapiConfig;

type HmacSha256 = Hmac<Sha256>;

const SERVICE: &str = "ProductAdvertisingAPI";
const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Amazon PA-API-backed price provider, signed with AWS SigV4 the way the
/// Python original's `_signed_headers`/`_get_signature_key` did.
pub struct AmazonPaapiPriceProvider {
    config: AmazonPaapiConfig,
    client: reqwest::Client,
    call_timeout: Duration,
}

impl AmazonPaapiPriceProvider {
    pub fn new(config: AmazonPaapiConfig, call_timeout: Duration) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
            call_timeout,
        }
    }

    fn signed_headers(&self, payload: &str, amz_date: &str, date_stamp: &str) -> Vec<(String, String)> {
        let content_type = "application/json; charset=utf-8";
        let canonical_uri = "/paapi5/getitems";
        let signed_headers_list = "content-type;host;x-amz-date;x-amz-target";
        let target = "com.amazon.paapi5.v1.ProductAdvertisingAPIv1.GetItems";
        let canonical_headers = format!(
            "content-type:{content_type}\nhost:{}\nx-amz-date:{amz_date}\nx-amz-target:{target}\n",
            self.config.host
        );
        let payload_hash = hex::encode(Sha256::digest(payload.as_bytes()));
        let canonical_request = format!(
            "POST\n{canonical_uri}\n\n{canonical_headers}\n{signed_headers_list}\n{payload_hash}"
        );
        let credential_scope = format!("{date_stamp}/{}/{SERVICE}/aws4_request", self.config.region);
        let string_to_sign = format!(
            "{ALGORITHM}\n{amz_date}\n{credential_scope}\n{}",
            hex::encode(Sha256::digest(canonical_request.as_bytes()))
        );
        let signing_key = self.signature_key(date_stamp);
        let signature = hex::encode(hmac_bytes(&signing_key, string_to_sign.as_bytes()));
        let authorization = format!(
            "{ALGORITHM} Credential={}/{credential_scope}, SignedHeaders={signed_headers_list}, Signature={signature}",
            self.config.access_key
        );
        vec![
            ("Content-Type".to_string(), content_type.to_string()),
            ("X-Amz-Date".to_string(), amz_date.to_string()),
            ("X-Amz-Target".to_string(), target.to_string()),
            ("Authorization".to_string(), authorization),
            ("Host".to_string(), self.config.host.clone()),
        ]
    }

    fn signature_key(&self, date_stamp: &str) -> Vec<u8> {
        let k_date = hmac_bytes(
            format!("AWS4{}", self.config.secret_key).as_bytes(),
            date_stamp.as_bytes(),
        );
        let k_region = hmac_bytes(&k_date, self.config.region.as_bytes());
        let k_service = hmac_bytes(&k_region, SERVICE.as_bytes());
        hmac_bytes(&k_service, b"aws4_request")
    }

    fn extract_price(data: &serde_json::Value) -> Option<f64> {
        data["ItemsResult"]["Items"]
            .get(0)?
            .get("Offers")?
            .get("Listings")?
            .get(0)?
            .get("Price")?
            .get("Amount")?
            .as_f64()
    }
}

fn hmac_bytes(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

#[async_trait]
impl PriceProvider for AmazonPaapiPriceProvider {
    async fn get_price(&self, product_id: &str) -> Option<f64> {
        let now = Utc::now();
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date_stamp = now.format("%Y%m%d").to_string();

        let payload = json!({
            "ItemIds": [product_id],
            "PartnerTag": self.config.partner_tag,
            "PartnerType": "Associates",
            "Marketplace": "www.amazon.com",
            "Resources": ["Offers.Listings.Price"],
        })
        .to_string();

        let headers = self.signed_headers(&payload, &amz_date, &date_stamp);
        let url = format!("https://{}/paapi5/getitems", self.config.host);

        let mut request = self.client.post(&url).body(payload);
        for (name, value) in headers {
            request = request.header(name, value);
        }

        let response = tokio::time::timeout(self.call_timeout, request.send())
            .await
            .ok()?
            .ok()?;
        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "price provider returned non-success status");
            return None;
        }
        let body: serde_json::Value = response.json().await.ok()?;
        Self::extract_price(&body)
    }
}

/// Env-gated factory: returns an [`AmazonPaapiPriceProvider`] if
/// credentials are configured, else [`NullPriceProvider`], matching
/// `build_price_provider`'s fallback in the Python original.
pub fn build_price_provider(
    config: Option<AmazonPaapiConfig>,
    call_timeout: Duration,
) -> Box<dyn PriceProvider> {
    match config {
        Some(cfg) => Box::new(AmazonPaapiPriceProvider::new(cfg, call_timeout)),
        None => Box::new(NullPriceProvider),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> AmazonPaapiConfig {
        AmazonPaapiConfig {
            access_key: "AKIDEXAMPLE".into(),
            secret_key: "secret".into(),
            partner_tag: "tag-20".into(),
            host: "webservices.amazon.com".into(),
            region: "us-east-1".into(),
        }
    }

    #[test]
    fn extract_price_reads_nested_amount() {
        let body = json!({
            "ItemsResult": {
                "Items": [{
                    "Offers": { "Listings": [{ "Price": { "Amount": 42.5 } }] }
                }]
            }
        });
        assert_eq!(AmazonPaapiPriceProvider::extract_price(&body), Some(42.5));
    }

    #[test]
    fn extract_price_none_on_missing_offers() {
        let body = json!({ "ItemsResult": { "Items": [{}] } });
        assert_eq!(AmazonPaapiPriceProvider::extract_price(&body), None);
    }

    #[test]
    fn signature_key_is_deterministic() {
        let provider = AmazonPaapiPriceProvider::new(test_config(), Duration::from_secs(10));
        let a = provider.signature_key("20240101");
        let b = provider.signature_key("20240101");
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn build_price_provider_falls_back_to_null_without_config() {
        let provider = build_price_provider(None, Duration::from_secs(10));
        assert_eq!(provider.get_price("B08N5WRWNW").await, None);
    }
}
