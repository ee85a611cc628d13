//! Business handlers and the route table.
//!
//! Every `/api` handler runs inside `protected`: it receives the resolved
//! user and correlation id, does one thing, and returns data or an
//! `ApiError`. Envelopes, headers and logging happen around it.

pub mod admin;
pub mod auth;
pub mod billing;
pub mod pages;
pub mod tickets;
pub mod usage;

use axum::body::Body;
use axum::http::Request;
use axum::routing::{get, post};
use axum::Router;
use serde::de::DeserializeOwned;

use crate::http::envelope::{ApiError, FieldError};
use crate::http::protected::{protected, ProtectedOptions};
use crate::http::server::AppState;
use crate::quota::QuotaKind;
use crate::security::rate_limit::RateLimit;

/// Ticket creation allowance per user.
const TICKET_CREATE_LIMIT: RateLimit = RateLimit {
    points: 5,
    duration_secs: 60,
};

/// Options for a signed-in `/api` route: every call counts against the
/// caller's `api_calls` allowance.
fn metered() -> ProtectedOptions {
    ProtectedOptions::default().with_quota(QuotaKind::ApiCalls)
}

/// The route table. `defaults` is the window for handlers without their own.
/// Session endpoints and public routes are not metered.
pub fn routes(defaults: RateLimit) -> Router<AppState> {
    Router::new()
        .route("/health", get(pages::health))
        .route("/auth/signin", get(pages::sign_in))
        .route("/app", get(pages::app_shell))
        .route("/app/{*path}", get(pages::app_shell))
        .route("/api/auth/refresh", get(protected(ProtectedOptions::public(), auth::refresh)))
        .route("/api/auth/signout", post(protected(ProtectedOptions::public(), auth::sign_out)))
        .route(
            "/api/usage",
            get(protected(metered().with_rate_limit(defaults), usage::snapshot)),
        )
        .route("/api/usage/tiers", get(protected(ProtectedOptions::public(), usage::tier_limits)))
        .route(
            "/api/billing/checkout",
            post(protected(
                metered().with_rate_limit(defaults).with_body_logging(),
                billing::checkout,
            )),
        )
        .route(
            "/api/support/tickets",
            get(protected(metered().with_rate_limit(defaults), tickets::list)).post(protected(
                metered().with_rate_limit(TICKET_CREATE_LIMIT),
                tickets::create,
            )),
        )
        .route(
            "/api/support/tickets/{id}/close",
            post(protected(metered().with_rate_limit(defaults), tickets::close)),
        )
        .route(
            "/api/admin/monitoring",
            get(protected(ProtectedOptions::admin().with_quota(QuotaKind::ApiCalls), admin::monitoring)),
        )
        .route(
            "/api/admin/usage/reset",
            post(protected(ProtectedOptions::admin().with_quota(QuotaKind::ApiCalls), admin::reset_usage)),
        )
}

fn invalid_body(message: impl Into<String>) -> ApiError {
    ApiError::Validation(vec![FieldError::new("body", message)])
}

/// Read and deserialize a JSON body, reporting problems as validation errors.
pub(crate) async fn read_json<T: DeserializeOwned>(req: Request<Body>, limit: usize) -> Result<T, ApiError> {
    let bytes = axum::body::to_bytes(req.into_body(), limit)
        .await
        .map_err(|e| invalid_body(e.to_string()))?;
    if bytes.is_empty() {
        return Err(invalid_body("a JSON body is required"));
    }
    serde_json::from_slice(&bytes).map_err(|e| invalid_body(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Payload {
        name: String,
    }

    #[tokio::test]
    async fn test_read_json_accepts_valid_body() {
        let req = Request::post("/").body(Body::from(r#"{"name":"x"}"#)).unwrap();
        let payload: Payload = read_json(req, 1024).await.unwrap();
        assert_eq!(payload.name, "x");
    }

    #[tokio::test]
    async fn test_read_json_rejects_garbage_and_empty() {
        let req = Request::post("/").body(Body::from("not json")).unwrap();
        assert!(matches!(read_json::<Payload>(req, 1024).await, Err(ApiError::Validation(_))));

        let req = Request::post("/").body(Body::empty()).unwrap();
        assert!(matches!(read_json::<Payload>(req, 1024).await, Err(ApiError::Validation(_))));
    }

    #[tokio::test]
    async fn test_read_json_enforces_limit() {
        let req = Request::post("/").body(Body::from(vec![b'a'; 64])).unwrap();
        assert!(read_json::<Payload>(req, 16).await.is_err());
    }
}
