//! Checkout for paid tiers.

use axum::body::Body;
use axum::http::Request;
use serde::{Deserialize, Serialize};

use super::read_json;
use crate::http::envelope::{ApiError, FieldError};
use crate::http::protected::RequestContext;
use crate::http::server::AppState;
use crate::quota::Tier;

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    #[serde(default)]
    pub tier: String,
}

impl CheckoutRequest {
    fn paid_tier(&self) -> Result<Tier, ApiError> {
        match self.tier.parse::<Tier>() {
            Ok(tier @ (Tier::Pro | Tier::ProByok)) => Ok(tier),
            _ => Err(ApiError::Validation(vec![FieldError::new(
                "tier",
                "must be one of: pro, pro_byok",
            )])),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutView {
    pub session_id: String,
    pub url: String,
}

/// `POST /api/billing/checkout`
pub async fn checkout(state: AppState, ctx: RequestContext, req: Request<Body>) -> Result<CheckoutView, ApiError> {
    let user = ctx.user()?;
    let body: CheckoutRequest = read_json(req, state.max_body_size()).await?;
    let tier = body.paid_tier()?;
    if user.tier == tier {
        return Err(ApiError::Validation(vec![FieldError::new(
            "tier",
            format!("already subscribed to {}", tier),
        )]));
    }

    let session = state.billing.create_checkout(user, tier).await?;
    Ok(CheckoutView {
        session_id: session.id,
        url: session.url,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_paid_tiers_are_accepted() {
        let req = |tier: &str| CheckoutRequest { tier: tier.into() };
        assert_eq!(req("pro").paid_tier().unwrap(), Tier::Pro);
        assert_eq!(req("pro_byok").paid_tier().unwrap(), Tier::ProByok);
        assert!(req("free").paid_tier().is_err());
        assert!(req("").paid_tier().is_err());
    }
}
