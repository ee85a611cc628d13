//! Session endpoints.

use axum::body::Body;
use axum::http::Request;
use serde::Serialize;

use crate::http::envelope::ApiError;
use crate::http::protected::RequestContext;
use crate::http::request::ResolvedSession;
use crate::http::server::AppState;
use crate::identity::{CookieJar, Identity};

#[derive(Debug, Serialize)]
pub struct SessionView {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<Identity>,
}

/// `GET /api/auth/refresh`: the gate has already refreshed the session and
/// queued rotated cookies; report who the caller is now.
pub async fn refresh(_state: AppState, ctx: RequestContext, _req: Request<Body>) -> Result<SessionView, ApiError> {
    Ok(SessionView {
        authenticated: ctx.user.is_some(),
        user: ctx.user,
    })
}

/// `POST /api/auth/signout`: revoke the session and expire its cookies.
/// Succeeds for anonymous callers too.
///
/// The gate may already have rotated an expiring session on the way in; the
/// rotated tokens are revoked as well as the ones the client sent.
pub async fn sign_out(state: AppState, ctx: RequestContext, req: Request<Body>) -> Result<SessionView, ApiError> {
    let sent = CookieJar::from_headers(req.headers());
    let rotated = req
        .extensions()
        .get::<ResolvedSession>()
        .filter(|session| session.cookies.iter().any(|c| !c.is_removal()))
        .map(|session| session.current_jar(&sent));

    let mut cookies = state.resolver.sign_out(&sent).await?;
    if let Some(rotated) = rotated {
        cookies = state.resolver.sign_out(&rotated).await?;
    }
    ctx.set_cookies(cookies);
    if let Some(user) = &ctx.user {
        tracing::info!(user_id = %user.user_id, "Signed out");
    }
    Ok(SessionView {
        authenticated: false,
        user: None,
    })
}
