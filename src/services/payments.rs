//! Payment provider contract.
//!
//! The worker only invokes the provider's request/response surface.
//! Retry and webhook handling belong to the provider, not this client.
//! Stripe in production, a mock otherwise.

use anyhow::anyhow;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{ServiceError, ServiceResult};

/// Outcome of a one-off charge.
#[derive(Debug, Clone)]
pub struct ChargeOutcome {
    pub id: String,
    pub status: String,
}

/// Payment gateway abstraction (Stripe, mock, ...).
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Charge `amount` (dollars) against a provider customer reference.
    async fn charge(&self, amount: f64, customer_ref: &str) -> ServiceResult<ChargeOutcome>;

    /// Create a recurring subscription; returns the provider's reference.
    async fn create_subscription(&self, customer_ref: &str, price_ref: &str)
        -> ServiceResult<String>;

    async fn pause_subscription(&self, subscription_ref: &str) -> ServiceResult<()>;

    async fn resume_subscription(&self, subscription_ref: &str) -> ServiceResult<()>;

    fn name(&self) -> &str;
}

/// Stripe client configuration
#[derive(Debug, Clone)]
pub struct StripeConfig {
    pub secret_key: String,
    pub base_url: String,
    pub timeout_seconds: u64,
}

impl StripeConfig {
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            secret_key: secret_key.into(),
            base_url: "https://api.stripe.com".to_string(),
            timeout_seconds: 30,
        }
    }
}

/// Stripe REST gateway (form-encoded v1 API)
pub struct StripeGateway {
    client: Client,
    config: StripeConfig,
}

#[derive(Debug, Deserialize)]
struct StripeObject {
    id: String,
    #[serde(default)]
    status: Option<String>,
}

impl StripeGateway {
    pub fn new(config: StripeConfig) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()
            .expect("Failed to create HTTP client");

        Self { client, config }
    }

    async fn post_form(&self, path: &str, form: &[(&str, String)]) -> ServiceResult<StripeObject> {
        let url = format!("{}{}", self.config.base_url, path);

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.config.secret_key, Option::<&str>::None)
            .form(form)
            .send()
            .await
            .map_err(|e| ServiceError::upstream(anyhow!(e).context("stripe request failed")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::upstream(anyhow!(
                "stripe returned {}: {}",
                status,
                body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ServiceError::upstream(anyhow!(e).context("failed to parse stripe response")))
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn charge(&self, amount: f64, customer_ref: &str) -> ServiceResult<ChargeOutcome> {
        // Stripe wants integer cents.
        let cents = (amount * 100.0).round() as i64;
        debug!("Charging {} cents to {}", cents, customer_ref);

        let object = self
            .post_form(
                "/v1/payment_intents",
                &[
                    ("amount", cents.to_string()),
                    ("currency", "usd".to_string()),
                    ("customer", customer_ref.to_string()),
                    ("confirm", "true".to_string()),
                ],
            )
            .await?;

        Ok(ChargeOutcome {
            id: object.id,
            status: object.status.unwrap_or_default(),
        })
    }

    async fn create_subscription(
        &self,
        customer_ref: &str,
        price_ref: &str,
    ) -> ServiceResult<String> {
        let object = self
            .post_form(
                "/v1/subscriptions",
                &[
                    ("customer", customer_ref.to_string()),
                    ("items[0][price]", price_ref.to_string()),
                ],
            )
            .await?;
        Ok(object.id)
    }

    async fn pause_subscription(&self, subscription_ref: &str) -> ServiceResult<()> {
        self.post_form(
            &format!("/v1/subscriptions/{}", subscription_ref),
            &[("pause_collection[behavior]", "void".to_string())],
        )
        .await?;
        Ok(())
    }

    async fn resume_subscription(&self, subscription_ref: &str) -> ServiceResult<()> {
        self.post_form(
            &format!("/v1/subscriptions/{}", subscription_ref),
            &[("pause_collection", "".to_string())],
        )
        .await?;
        Ok(())
    }

    fn name(&self) -> &str {
        "Stripe"
    }
}

/// Mock gateway for tests and keyless development. Always succeeds.
#[derive(Default)]
pub struct MockPaymentGateway;

impl MockPaymentGateway {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn charge(&self, amount: f64, customer_ref: &str) -> ServiceResult<ChargeOutcome> {
        debug!("Mock charge of ${:.2} to {}", amount, customer_ref);
        Ok(ChargeOutcome {
            id: format!("mock_pi_{}", Uuid::new_v4().simple()),
            status: "succeeded".to_string(),
        })
    }

    async fn create_subscription(
        &self,
        _customer_ref: &str,
        _price_ref: &str,
    ) -> ServiceResult<String> {
        Ok(format!("mock_sub_{}", Uuid::new_v4().simple()))
    }

    async fn pause_subscription(&self, subscription_ref: &str) -> ServiceResult<()> {
        debug!("Mock pause of {}", subscription_ref);
        Ok(())
    }

    async fn resume_subscription(&self, subscription_ref: &str) -> ServiceResult<()> {
        debug!("Mock resume of {}", subscription_ref);
        Ok(())
    }

    fn name(&self) -> &str {
        "MockPayment"
    }
}

/// Create the payment gateway from configuration. No secret key configured
/// means the mock.
pub fn create_payment_gateway(config: Option<StripeConfig>) -> Box<dyn PaymentGateway> {
    match config {
        Some(cfg) => {
            info!("Using Stripe payment gateway at {}", cfg.base_url);
            Box::new(StripeGateway::new(cfg))
        }
        None => {
            info!("Using mock payment gateway (STRIPE_SECRET_KEY not configured)");
            Box::new(MockPaymentGateway::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_charge_succeeds() {
        let gateway = MockPaymentGateway::new();
        let outcome = gateway.charge(42.50, "cus_test").await.unwrap();
        assert_eq!(outcome.status, "succeeded");
        assert!(outcome.id.starts_with("mock_pi_"));
    }

    #[tokio::test]
    async fn test_mock_pause_resume() {
        let gateway = MockPaymentGateway::new();
        gateway.pause_subscription("sub_test").await.unwrap();
        gateway.resume_subscription("sub_test").await.unwrap();
    }

    #[test]
    fn test_create_gateway_without_config_is_mock() {
        let gateway = create_payment_gateway(None);
        assert_eq!(gateway.name(), "MockPayment");
    }

    #[test]
    fn test_stripe_config_defaults() {
        let config = StripeConfig::new("sk_test_123");
        assert_eq!(config.base_url, "https://api.stripe.com");
        assert_eq!(config.timeout_seconds, 30);
    }
}
