//! The gate in front of every route.

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderValue, Method, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};

use super::{Decision, GateSettings, PathClass};
use crate::http::envelope::ApiError;
use crate::http::request::{CorrelationId, ResolvedSession};
use crate::http::server::AppState;
use crate::identity::cookies::merge_set_cookies;
use crate::identity::CookieJar;
use crate::observability::metrics;
use crate::security::apply_security_headers;

/// Gate a request: short-circuit preflights, resolve sessions where the
/// path needs one, redirect or reject, and stamp response headers.
pub async fn gate_middleware(State(state): State<AppState>, mut req: Request<Body>, next: Next) -> Response {
    let settings = state.gate.load_full();
    let origin = req.headers().get(header::ORIGIN).cloned();
    let path = req.uri().path().to_string();

    if req.method() == Method::OPTIONS && settings.policy.is_api(&path) {
        metrics::record_decision("preflight");
        return finish(&settings, origin.as_ref(), StatusCode::NO_CONTENT.into_response(), true);
    }

    let class = settings.policy.classify(&path);
    if class == PathClass::Unmatched {
        let response = next.run(req).await;
        return finish(&settings, origin.as_ref(), response, false);
    }

    let jar = CookieJar::from_headers(req.headers());
    let resolution = match state.resolver.resolve(&jar).await {
        Ok(resolution) => resolution,
        Err(e) => {
            metrics::record_identity_error();
            let correlation_id = CorrelationId::generate();
            let response = ApiError::IdentityService(e).into_envelope(&correlation_id);
            return finish(&settings, origin.as_ref(), response, false);
        }
    };

    let decision = settings.policy.decide(req.uri(), resolution.identity.as_ref());
    metrics::record_decision(decision.label());
    tracing::debug!(
        path = %path,
        decision = decision.label(),
        authenticated = resolution.identity.is_some(),
        "Gate decision"
    );

    let mut response = match decision {
        Decision::Allow | Decision::PassThrough => {
            req.extensions_mut().insert(ResolvedSession {
                identity: resolution.identity.clone(),
                cookies: resolution.cookies.clone(),
            });
            next.run(req).await
        }
        Decision::Redirect { location } => Redirect::temporary(&location).into_response(),
        // Only API paths are rejected; they get the envelope, never a redirect.
        Decision::Reject { .. } => ApiError::Unauthorized.into_envelope(&CorrelationId::generate()),
    };

    // Rotated or cleared cookies ride on every outcome, redirects included.
    // Cookies the handler set itself take precedence.
    merge_set_cookies(response.headers_mut(), &resolution.cookies);
    finish(&settings, origin.as_ref(), response, false)
}

fn finish(settings: &GateSettings, origin: Option<&HeaderValue>, mut response: Response, preflight: bool) -> Response {
    let headers = response.headers_mut();
    apply_security_headers(headers);
    settings.cors.apply(origin, headers, preflight);
    response
}
