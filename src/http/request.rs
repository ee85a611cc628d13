//! Request-scoped values.
//!
//! Everything a handler needs about the current request travels in request
//! extensions or in `RequestContext`, never in process-wide state.

use std::fmt;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, MatchedPath};
use axum::http::{HeaderMap, HeaderValue, Request};
use uuid::Uuid;

use crate::identity::{CookieJar, Identity, SessionCookie};

/// Response header carrying the correlation id.
pub const X_CORRELATION_ID: &str = "x-correlation-id";

/// Unique token tying together every log line of one request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Generate a new random correlation id (UUID v4).
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Write the id into response headers.
    pub fn stamp(&self, headers: &mut HeaderMap) {
        if let Ok(value) = HeaderValue::from_str(&self.0) {
            headers.insert(X_CORRELATION_ID, value);
        }
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Session resolved by the gating layer, so the wrapper does not resolve
/// (and possibly refresh) it a second time.
#[derive(Debug, Clone, Default)]
pub struct ResolvedSession {
    pub identity: Option<Identity>,
    /// Rotated or cleared cookies the response will carry.
    pub cookies: Vec<SessionCookie>,
}

impl ResolvedSession {
    /// The caller's cookies as they stand after this request's rotation.
    pub fn current_jar(&self, sent: &CookieJar) -> CookieJar {
        sent.with_applied(&self.cookies)
    }
}

/// The route template the request matched, or its raw path.
pub fn route_of<B>(req: &Request<B>) -> String {
    req.extensions()
        .get::<MatchedPath>()
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string())
}

/// Client address when the server records connection info.
pub fn client_ip<B>(req: &Request<B>) -> Option<String> {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
}
