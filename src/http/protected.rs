//! Protected handler wrapper.
//!
//! # Pipeline
//! ```text
//! request
//!     → correlation id (generated once, here)
//!     → identity (from the gating layer, else resolved)
//!     → require_auth        → 401 before the handler runs
//!     → required_role       → 403
//!     → rate limit          → 429
//!     → usage quota         → 429 / usage headers
//!     → handler(state, ctx, request)
//!     → exactly one envelope (panics become 500)
//! ```

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, Request};
use axum::response::Response;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde::Serialize;
use tracing::Instrument;

use crate::http::envelope::{ApiError, Envelope, FieldError};
use crate::http::request::{client_ip, route_of, CorrelationId, ResolvedSession};
use crate::http::server::AppState;
use crate::identity::cookies::{append_set_cookies, merge_set_cookies};
use crate::identity::{CookieJar, Identity, Role, SessionCookie};
use crate::observability::metrics;
use crate::quota::{QuotaError, QuotaKind, UsageGrant};
use crate::security::rate_limit::{rate_key, RateDecision, RateLimit};

/// Request logging switches.
#[derive(Debug, Clone, Copy)]
pub struct LoggingOptions {
    pub enabled: bool,
    pub include_body: bool,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            include_body: false,
        }
    }
}

/// What the wrapper enforces before the handler runs.
#[derive(Debug, Clone)]
pub struct ProtectedOptions {
    pub require_auth: bool,
    pub required_role: Option<Role>,
    pub rate_limit: Option<RateLimit>,
    pub quota: Option<QuotaKind>,
    pub logging: LoggingOptions,
}

impl Default for ProtectedOptions {
    fn default() -> Self {
        Self {
            require_auth: true,
            required_role: None,
            rate_limit: None,
            quota: None,
            logging: LoggingOptions::default(),
        }
    }
}

impl ProtectedOptions {
    /// Anonymous callers reach the handler.
    pub fn public() -> Self {
        Self {
            require_auth: false,
            ..Self::default()
        }
    }

    pub fn admin() -> Self {
        Self {
            required_role: Some(Role::Admin),
            ..Self::default()
        }
    }

    pub fn with_rate_limit(mut self, limit: RateLimit) -> Self {
        self.rate_limit = Some(limit);
        self
    }

    pub fn with_quota(mut self, kind: QuotaKind) -> Self {
        self.quota = Some(kind);
        self
    }

    pub fn with_body_logging(mut self) -> Self {
        self.logging.include_body = true;
        self
    }

    pub fn without_logging(mut self) -> Self {
        self.logging.enabled = false;
        self
    }
}

/// Per-request context handed to business handlers.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub user: Option<Identity>,
    pub correlation_id: CorrelationId,
    pub route: String,
    outgoing: Arc<Mutex<Vec<SessionCookie>>>,
}

impl RequestContext {
    /// The authenticated user, or `Unauthorized`.
    pub fn user(&self) -> Result<&Identity, ApiError> {
        self.user.as_ref().ok_or(ApiError::Unauthorized)
    }

    /// Queue cookies for the response, whatever the handler's outcome.
    pub fn set_cookies(&self, cookies: Vec<SessionCookie>) {
        if let Ok(mut outgoing) = self.outgoing.lock() {
            outgoing.extend(cookies);
        }
    }

    fn take_cookies(&self) -> Vec<SessionCookie> {
        self.outgoing
            .lock()
            .map(|mut outgoing| std::mem::take(&mut *outgoing))
            .unwrap_or_default()
    }
}

/// Wrap a business handler into an axum handler.
pub fn protected<F, Fut, T>(
    options: ProtectedOptions,
    handler: F,
) -> impl Fn(State<AppState>, Request<Body>) -> BoxFuture<'static, Response> + Clone + Send + Sync + 'static
where
    F: Fn(AppState, RequestContext, Request<Body>) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    T: Serialize + Send + 'static,
{
    move |State(state): State<AppState>, req: Request<Body>| {
        let handler = handler.clone();
        let options = options.clone();
        async move {
            let correlation_id = CorrelationId::generate();
            let route = route_of(&req);
            let span = tracing::info_span!("request", correlation_id = %correlation_id, route = %route);
            run(state, options, handler, req, correlation_id, route)
                .instrument(span)
                .await
        }
        .boxed()
    }
}

/// Headers gathered before the handler runs and attached to whatever it returns.
#[derive(Default)]
struct Carry {
    /// From a resolution done here rather than in the gate.
    resolved_cookies: Vec<SessionCookie>,
    handler_cookies: Vec<SessionCookie>,
    usage: Option<UsageGrant>,
}

impl Carry {
    fn finish(self, mut response: Response, correlation_id: &CorrelationId) -> Response {
        let headers = response.headers_mut();
        correlation_id.stamp(headers);
        append_set_cookies(headers, &self.handler_cookies);
        merge_set_cookies(headers, &self.resolved_cookies);
        if let Some(grant) = &self.usage {
            usage_headers(headers, grant);
        }
        response
    }
}

async fn run<F, Fut, T>(
    state: AppState,
    options: ProtectedOptions,
    handler: F,
    req: Request<Body>,
    correlation_id: CorrelationId,
    route: String,
) -> Response
where
    F: Fn(AppState, RequestContext, Request<Body>) -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
    T: Serialize,
{
    let started = Instant::now();
    let mut carry = Carry::default();

    let outcome = guarded(&state, &options, handler, req, &correlation_id, &route, &mut carry).await;

    let response = match outcome {
        Ok(data) => Envelope::ok(data, &correlation_id),
        Err(err) => err.into_envelope(&correlation_id),
    };
    let response = carry.finish(response, &correlation_id);
    metrics::record_request(&route, response.status().as_u16(), started);
    response
}

/// Every check in order, then the handler. Anything collected for the
/// response along the way goes into `carry`.
async fn guarded<F, Fut, T>(
    state: &AppState,
    options: &ProtectedOptions,
    handler: F,
    mut req: Request<Body>,
    correlation_id: &CorrelationId,
    route: &str,
    carry: &mut Carry,
) -> Result<T, ApiError>
where
    F: Fn(AppState, RequestContext, Request<Body>) -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let resolved = req.extensions().get::<ResolvedSession>().cloned();
    let user = match resolved {
        Some(session) => session.identity,
        None if options.require_auth => {
            let jar = CookieJar::from_headers(req.headers());
            let resolution = state
                .resolver
                .resolve(&jar)
                .await
                .inspect_err(|_| metrics::record_identity_error())?;
            req.extensions_mut().insert(ResolvedSession {
                identity: resolution.identity.clone(),
                cookies: resolution.cookies.clone(),
            });
            carry.resolved_cookies = resolution.cookies;
            resolution.identity
        }
        None => None,
    };

    if options.require_auth && user.is_none() {
        return Err(ApiError::Unauthorized);
    }

    if let Some(required) = options.required_role {
        let identity = user.as_ref().ok_or(ApiError::Unauthorized)?;
        if !state.authorizer.authorize(identity, required) {
            tracing::warn!(user_id = %identity.user_id, required = ?required, "Authorization denied");
            return Err(ApiError::Forbidden);
        }
    }

    if let Some(limit) = options.rate_limit.filter(|_| state.rate_limiting_enabled()) {
        let subject = user
            .as_ref()
            .map(|u| u.user_id.clone())
            .or_else(|| client_ip(&req))
            .unwrap_or_else(|| "anonymous".to_string());
        let decision = state
            .rate_limits
            .check_and_increment(&rate_key(&subject, &format!("{} {}", req.method(), route)), limit)
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))?;
        if let RateDecision::Limited { retry_after } = decision {
            tracing::warn!(subject = %subject, "Rate limit exceeded");
            metrics::record_rate_limited(&route);
            return Err(ApiError::RateLimited {
                retry_after_secs: retry_after.as_secs().max(1),
            });
        }
    }

    if let Some(kind) = options.quota {
        let identity = user.as_ref().ok_or(ApiError::Unauthorized)?;
        let grant = state
            .quotas
            .check_and_increment(identity, kind, 1)
            .await
            .inspect_err(|e| {
                if matches!(e, QuotaError::LimitExceeded { .. }) {
                    metrics::record_usage_rejected(kind);
                }
            })?;
        carry.usage = Some(grant);
    }

    if options.logging.enabled {
        tracing::info!(
            method = %req.method(),
            user_id = user.as_ref().map(|u| u.user_id.as_str()).unwrap_or("-"),
            "Handling request"
        );
    }
    if options.logging.include_body {
        req = log_body(req, state.max_body_size()).await?;
    }

    let ctx = RequestContext {
        user,
        correlation_id: correlation_id.clone(),
        route: route.to_string(),
        outgoing: Arc::default(),
    };

    let result = AssertUnwindSafe(handler(state.clone(), ctx.clone(), req))
        .catch_unwind()
        .await;
    carry.handler_cookies = ctx.take_cookies();
    match result {
        Ok(result) => result,
        Err(panic) => Err(ApiError::Internal(panic_message(panic.as_ref()))),
    }
}

fn usage_headers(headers: &mut HeaderMap, grant: &UsageGrant) {
    headers.insert("x-usage-current", HeaderValue::from(grant.current));
    headers.insert("x-usage-limit", HeaderValue::from(grant.limit));
    headers.insert("x-usage-remaining", HeaderValue::from(grant.remaining));
    headers.insert("x-usage-tier", HeaderValue::from_static(grant.tier.as_str()));
    if grant.approaching_limit() {
        headers.insert("x-usage-warning", HeaderValue::from_static("approaching_limit"));
    }
}

/// Buffer the body, log it, and hand back an equivalent request.
async fn log_body(req: Request<Body>, limit: usize) -> Result<Request<Body>, ApiError> {
    let (parts, body) = req.into_parts();
    let bytes = axum::body::to_bytes(body, limit)
        .await
        .map_err(|e| ApiError::Validation(vec![FieldError::new("body", e.to_string())]))?;
    let preview: String = String::from_utf8_lossy(&bytes).chars().take(2048).collect();
    tracing::debug!(body = %preview, "Request body");
    Ok(Request::from_parts(parts, Body::from(bytes)))
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    let detail = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("handler panicked: {}", detail)
}
