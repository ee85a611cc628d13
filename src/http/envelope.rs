//! Uniform JSON response envelope and the error taxonomy behind it.
//!
//! ```json
//! { "success": false,
//!   "error": { "code": "UNAUTHORIZED", "message": "..." },
//!   "correlationId": "..." }
//! ```

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::billing::BillingError;
use crate::http::request::CorrelationId;
use crate::identity::IdentityError;
use crate::quota::{QuotaError, QuotaKind, Tier};
use crate::support::StoreError;

/// One invalid input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Every way a protected request can fail.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("validation failed")]
    Validation(Vec<FieldError>),

    #[error("authentication required")]
    Unauthorized,

    #[error("insufficient privileges")]
    Forbidden,

    #[error("resource not found")]
    NotFound,

    #[error("rate limit exceeded")]
    RateLimited { retry_after_secs: u64 },

    #[error("usage limit exceeded for {kind}")]
    UsageLimit {
        kind: QuotaKind,
        current: u64,
        limit: u64,
        tier: Tier,
    },

    #[error("identity service failure: {0}")]
    IdentityService(#[from] IdentityError),

    #[error("{service} failure: {detail}")]
    Upstream { service: &'static str, detail: String },

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::RateLimited { .. } | ApiError::UsageLimit { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            ApiError::IdentityService(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::Unauthorized => "UNAUTHORIZED",
            ApiError::Forbidden => "FORBIDDEN",
            ApiError::NotFound => "NOT_FOUND",
            ApiError::RateLimited { .. } => "RATE_LIMITED",
            ApiError::UsageLimit { .. } => "USAGE_LIMIT_EXCEEDED",
            ApiError::Upstream { .. } => "UPSTREAM_ERROR",
            ApiError::IdentityService(_) | ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Message safe to show the client. Infrastructure detail stays in the logs.
    fn public_message(&self) -> String {
        match self {
            ApiError::Validation(_) => "The request is invalid".into(),
            ApiError::Unauthorized => "Authentication required".into(),
            ApiError::Forbidden => "You do not have permission to access this resource".into(),
            ApiError::NotFound => "The requested resource does not exist".into(),
            ApiError::RateLimited { .. } => "Too many requests, please try again later".into(),
            ApiError::UsageLimit { kind, tier, .. } => {
                format!("You have exceeded your {} limit for the {} tier", kind, tier)
            }
            ApiError::Upstream { .. } => "An upstream service failed, please try again later".into(),
            ApiError::IdentityService(_) | ApiError::Internal(_) => "An unexpected error occurred".into(),
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            ApiError::Validation(fields) => serde_json::to_value(fields).ok(),
            ApiError::RateLimited { retry_after_secs } => {
                Some(serde_json::json!({ "retryAfter": retry_after_secs }))
            }
            ApiError::UsageLimit { kind, current, limit, tier } => Some(serde_json::json!({
                "limitType": kind,
                "currentUsage": current,
                "limit": limit,
                "tier": tier,
                "upgradeRequired": *tier == Tier::Free,
                "upgradeMessage": tier.upgrade_message(),
            })),
            _ => None,
        }
    }

    /// Render as an envelope tagged with the request's correlation id.
    pub fn into_envelope(self, correlation_id: &CorrelationId) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(correlation_id = %correlation_id, error = %self, "Request failed");
        } else {
            tracing::debug!(correlation_id = %correlation_id, code = self.code(), "Request rejected");
        }

        let body = Envelope::<()> {
            success: false,
            data: None,
            error: Some(ErrorBody {
                code: self.code(),
                message: self.public_message(),
                details: self.details(),
            }),
            correlation_id: correlation_id.to_string(),
        };
        let mut response = (status, Json(body)).into_response();
        let headers = response.headers_mut();
        match &self {
            ApiError::RateLimited { retry_after_secs } => {
                headers.insert(header::RETRY_AFTER, HeaderValue::from(*retry_after_secs));
            }
            ApiError::UsageLimit { kind, .. } => {
                headers.insert(header::RETRY_AFTER, HeaderValue::from_static("3600"));
                headers.insert("x-usage-limit-exceeded", HeaderValue::from_static(kind.as_str()));
            }
            _ => {}
        }
        correlation_id.stamp(headers);
        response
    }
}

impl From<QuotaError> for ApiError {
    fn from(e: QuotaError) -> Self {
        match e {
            QuotaError::LimitExceeded { kind, current, limit, tier } => ApiError::UsageLimit { kind, current, limit, tier },
            QuotaError::Store(detail) => ApiError::Internal(detail),
        }
    }
}

impl From<BillingError> for ApiError {
    fn from(e: BillingError) -> Self {
        match e {
            BillingError::NotConfigured(what) => ApiError::Internal(format!("billing not configured: {}", what)),
            other => ApiError::Upstream {
                service: "payment processor",
                detail: other.to_string(),
            },
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// The response body of every protected handler.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
    pub correlation_id: String,
}

impl<T: Serialize> Envelope<T> {
    pub fn ok(data: T, correlation_id: &CorrelationId) -> Response {
        let body = Envelope {
            success: true,
            data: Some(data),
            error: None,
            correlation_id: correlation_id.to_string(),
        };
        let mut response = (StatusCode::OK, Json(body)).into_response();
        correlation_id.stamp(response.headers_mut());
        response
    }
}
