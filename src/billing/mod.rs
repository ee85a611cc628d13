//! Payment processor integration.
//!
//! Only checkout-session creation crosses this boundary; the processor
//! owns the ledger and subscription state.

pub mod stripe;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::identity::Identity;
use crate::quota::Tier;

pub use stripe::StripeClient;

/// A hosted checkout page the client is sent to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Error)]
pub enum BillingError {
    #[error("billing is not configured: {0}")]
    NotConfigured(&'static str),

    #[error("payment processor unreachable: {0}")]
    Transport(String),

    #[error("payment processor rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("malformed payment processor response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for BillingError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            BillingError::Malformed(e.to_string())
        } else {
            BillingError::Transport(e.to_string())
        }
    }
}

/// Creates checkout sessions for paid tiers.
#[async_trait]
pub trait BillingProvider: Send + Sync {
    async fn create_checkout(&self, identity: &Identity, tier: Tier) -> Result<CheckoutSession, BillingError>;
}
