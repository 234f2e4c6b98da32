use crate::config::AppConfig;
use crate::errors::ServiceError;
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::Duration;
use tracing::{instrument, warn};

type HmacSha256 = Hmac<Sha256>;

/// Remote order object returned by the gateway; handed back to the
/// storefront client to open the payment widget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    pub receipt: String,
    pub status: String,
}

/// Seam to the external payment provider.
///
/// Constructed once at startup and injected into the checkout service; tests
/// swap in a fake implementation.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Publishable key id the client needs to open the payment flow.
    fn key_id(&self) -> &str;

    /// Creates a remote order for `amount` minor currency units.
    async fn create_order(
        &self,
        amount: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<GatewayOrder, ServiceError>;

    /// Checks a client-supplied payment confirmation signature.
    fn verify_signature(&self, order_id: &str, payment_id: &str, signature: &str) -> bool;
}

/// Razorpay Orders API client.
#[derive(Clone)]
pub struct RazorpayClient {
    http: reqwest::Client,
    base_url: String,
    key_id: String,
    key_secret: String,
}

#[derive(Debug, Serialize)]
struct CreateOrderBody<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
    payment_capture: u8,
}

#[derive(Debug, Deserialize)]
struct GatewayErrorBody {
    error: Option<GatewayErrorDetails>,
}

#[derive(Debug, Deserialize)]
struct GatewayErrorDetails {
    description: Option<String>,
}

impl RazorpayClient {
    pub fn new(config: &AppConfig) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.gateway_timeout_secs))
            .build()
            .map_err(|e| ServiceError::InternalError(format!("http client init failed: {e}")))?;

        Ok(Self {
            http,
            base_url: config.razorpay_base_url.trim_end_matches('/').to_string(),
            key_id: config.razorpay_key_id.clone(),
            key_secret: config.razorpay_key_secret.clone(),
        })
    }
}

#[async_trait]
impl PaymentGateway for RazorpayClient {
    fn key_id(&self) -> &str {
        &self.key_id
    }

    #[instrument(skip(self))]
    async fn create_order(
        &self,
        amount: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<GatewayOrder, ServiceError> {
        let url = format!("{}/v1/orders", self.base_url);
        let body = CreateOrderBody {
            amount,
            currency,
            receipt,
            payment_capture: 1,
        };

        let response = self
            .http
            .post(&url)
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ServiceError::GatewayError("order creation timed out".to_string())
                } else {
                    ServiceError::GatewayError(format!("order creation failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let description = response
                .json::<GatewayErrorBody>()
                .await
                .ok()
                .and_then(|b| b.error)
                .and_then(|e| e.description)
                .unwrap_or_else(|| "no error description".to_string());
            warn!(%status, "gateway rejected order creation");
            return Err(ServiceError::GatewayError(format!(
                "gateway returned {status}: {description}"
            )));
        }

        response
            .json::<GatewayOrder>()
            .await
            .map_err(|e| ServiceError::GatewayError(format!("malformed gateway response: {e}")))
    }

    fn verify_signature(&self, order_id: &str, payment_id: &str, signature: &str) -> bool {
        verify_checkout_signature(&self.key_secret, order_id, payment_id, signature)
    }
}

/// Recomputes the HMAC-SHA256 of `"{order_id}|{payment_id}"` with the shared
/// secret and compares against the supplied hex signature.
pub fn verify_checkout_signature(
    secret: &str,
    order_id: &str,
    payment_id: &str,
    signature: &str,
) -> bool {
    let payload = format!("{order_id}|{payment_id}");
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(payload.as_bytes());
    let expected = hex::encode(mac.finalize().into_bytes());
    constant_time_eq(&expected, signature)
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut res = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        res |= x ^ y;
    }
    res == 0
}

/// Generates the idempotent receipt id sent with every gateway order.
/// Stored unique locally so an orphaned charge can be swept later.
pub fn generate_receipt_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(24)
        .map(char::from)
        .collect();
    format!("rcpt_{suffix}")
}

/// Computes the hex signature a gateway would produce for a confirmation.
/// Used by tests and development tooling.
pub fn sign_checkout(secret: &str, order_id: &str, payment_id: &str) -> String {
    let payload = format!("{order_id}|{payment_id}");
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(payload.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_round_trip() {
        let sig = sign_checkout("secret", "order_abc", "pay_xyz");
        assert_eq!(sig.len(), 64);
        assert!(verify_checkout_signature("secret", "order_abc", "pay_xyz", &sig));
    }

    #[test]
    fn forged_signature_rejected() {
        let sig = sign_checkout("secret", "order_abc", "pay_xyz");
        assert!(!verify_checkout_signature("other", "order_abc", "pay_xyz", &sig));
        assert!(!verify_checkout_signature("secret", "order_abc", "pay_other", &sig));
        assert!(!verify_checkout_signature("secret", "order_abc", "pay_xyz", "deadbeef"));
    }

    #[test]
    fn constant_time_eq_requires_equal_length() {
        assert!(!constant_time_eq("abc", "abcd"));
        assert!(constant_time_eq("abc", "abc"));
        assert!(!constant_time_eq("abc", "abd"));
    }

    #[test]
    fn receipt_ids_are_unique_and_prefixed() {
        let a = generate_receipt_id();
        let b = generate_receipt_id();
        assert!(a.starts_with("rcpt_"));
        assert_eq!(a.len(), 5 + 24);
        assert_ne!(a, b);
    }
}
