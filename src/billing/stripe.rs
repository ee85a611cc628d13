//! Stripe Checkout over its REST API.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use url::form_urlencoded;

use super::{BillingError, BillingProvider, CheckoutSession};
use crate::config::BillingConfig;
use crate::identity::Identity;
use crate::quota::Tier;

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    #[serde(default)]
    message: String,
}

pub struct StripeClient {
    client: reqwest::Client,
    config: BillingConfig,
    public_url: String,
}

impl StripeClient {
    pub fn new(config: BillingConfig, public_url: String) -> Result<Self, BillingError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            config,
            public_url,
        })
    }

    fn price_for(&self, tier: Tier) -> Result<&str, BillingError> {
        let price = match tier {
            Tier::Pro => &self.config.pro_price_id,
            Tier::ProByok => &self.config.pro_byok_price_id,
            Tier::Free => return Err(BillingError::NotConfigured("free tier has no price")),
        };
        if price.is_empty() {
            return Err(BillingError::NotConfigured("price id"));
        }
        Ok(price)
    }

    /// Form body for `POST /v1/checkout/sessions`.
    fn checkout_form(&self, identity: &Identity, tier: Tier, price: &str) -> String {
        let base = self.public_url.trim_end_matches('/');
        form_urlencoded::Serializer::new(String::new())
            .append_pair("mode", "subscription")
            .append_pair("line_items[0][price]", price)
            .append_pair("line_items[0][quantity]", "1")
            .append_pair("client_reference_id", &identity.user_id)
            .append_pair("customer_email", &identity.email)
            .append_pair("metadata[user_id]", &identity.user_id)
            .append_pair("metadata[tier]", tier.as_str())
            .append_pair("success_url", &format!("{}/app/billing?status=success", base))
            .append_pair("cancel_url", &format!("{}/app/billing?status=cancelled", base))
            .finish()
    }
}

#[async_trait]
impl BillingProvider for StripeClient {
    async fn create_checkout(&self, identity: &Identity, tier: Tier) -> Result<CheckoutSession, BillingError> {
        if self.config.secret_key.is_empty() {
            return Err(BillingError::NotConfigured("secret key"));
        }
        let price = self.price_for(tier)?;
        let url = format!("{}/v1/checkout/sessions", self.config.api_base.trim_end_matches('/'));

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.config.secret_key)
            .header(reqwest::header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(self.checkout_form(identity, tier, price))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<StripeErrorBody>()
                .await
                .map(|b| b.error.message)
                .unwrap_or_default();
            return Err(BillingError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let session: CheckoutSession = response.json().await?;
        tracing::info!(user_id = %identity.user_id, tier = %tier, session_id = %session.id, "Checkout session created");
        Ok(session)
    }
}
