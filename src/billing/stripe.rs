use anyhow::{anyhow, Result};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Webhook signatures older than this are treated as replays and rejected.
const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// key: billing-gateway -> hosted checkout + webhook verification
#[derive(Clone)]
pub struct StripeGateway {
    http: reqwest::Client,
    secret_key: String,
    webhook_secret: String,
    api_base: String,
    success_url: String,
    cancel_url: String,
}

/// Line item mirrored from a cart item snapshot.
#[derive(Debug, Clone)]
pub struct CheckoutLineItem {
    pub name: String,
    pub unit_amount_cents: i32,
    pub quantity: i32,
    pub currency: String,
}

/// Hosted checkout session as returned by the processor.
#[derive(Debug, Clone, Deserialize)]
pub struct HostedCheckout {
    pub id: String,
    pub url: String,
    pub payment_intent: Option<String>,
}

impl StripeGateway {
    pub fn new(
        secret_key: impl Into<String>,
        webhook_secret: impl Into<String>,
        api_base: impl Into<String>,
        success_url: impl Into<String>,
        cancel_url: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            secret_key: secret_key.into(),
            webhook_secret: webhook_secret.into(),
            api_base: api_base.into(),
            success_url: success_url.into(),
            cancel_url: cancel_url.into(),
        }
    }

    pub fn from_env() -> Self {
        Self::new(
            crate::config::STRIPE_SECRET_KEY.as_str(),
            crate::config::STRIPE_WEBHOOK_SECRET.as_str(),
            crate::config::STRIPE_API_BASE.as_str(),
            crate::config::CHECKOUT_SUCCESS_URL.as_str(),
            crate::config::CHECKOUT_CANCEL_URL.as_str(),
        )
    }

    /// Requests a hosted checkout session for a single line item. The cart
    /// session id rides along in metadata so the webhook reconciler can find
    /// its way back.
    pub async fn create_checkout_session(
        &self,
        cart_session_id: &str,
        item: &CheckoutLineItem,
    ) -> Result<HostedCheckout> {
        let form: Vec<(String, String)> = vec![
            ("mode".into(), "payment".into()),
            ("success_url".into(), self.success_url.clone()),
            ("cancel_url".into(), self.cancel_url.clone()),
            (
                "line_items[0][price_data][currency]".into(),
                item.currency.clone(),
            ),
            (
                "line_items[0][price_data][unit_amount]".into(),
                item.unit_amount_cents.to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]".into(),
                item.name.clone(),
            ),
            ("line_items[0][quantity]".into(), item.quantity.to_string()),
            (
                "metadata[cart_session_id]".into(),
                cart_session_id.to_string(),
            ),
        ];

        let response = self
            .http
            .post(format!("{}/v1/checkout/sessions", self.api_base))
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("checkout session creation failed: {status}: {body}"));
        }

        Ok(response.json::<HostedCheckout>().await?)
    }

    /// Verifies a `t=<ts>,v1=<hex>` signature header against the shared
    /// webhook secret. Returns Ok(false) for a well-formed but wrong
    /// signature, Err for a malformed header.
    pub fn verify_webhook_signature(&self, payload: &[u8], header: &str) -> Result<bool> {
        let mut timestamp: Option<&str> = None;
        let mut signature: Option<&str> = None;
        for part in header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => timestamp = Some(value),
                Some(("v1", value)) => signature = Some(value),
                _ => {}
            }
        }
        let timestamp = timestamp.ok_or_else(|| anyhow!("signature header missing timestamp"))?;
        let signature = signature.ok_or_else(|| anyhow!("signature header missing v1 digest"))?;

        let ts: i64 = timestamp
            .parse()
            .map_err(|_| anyhow!("signature timestamp is not an integer"))?;
        let age = chrono::Utc::now().timestamp() - ts;
        if age.abs() > SIGNATURE_TOLERANCE_SECS {
            return Ok(false);
        }

        let mut mac = HmacSha256::new_from_slice(self.webhook_secret.as_bytes())
            .map_err(|e| anyhow!("HMAC init failed: {e}"))?;
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(payload);
        let expected = hex::encode(mac.finalize().into_bytes());

        Ok(constant_time_eq(expected.as_bytes(), signature.as_bytes()))
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
