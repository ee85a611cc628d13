//! In-process session table.
//!
//! Mirrors the hosted provider's token lifecycle (short-lived access
//! tokens, single-use refresh tokens) without the network hop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use super::{CookieJar, Identity, IdentityError, Resolution, SessionCookie, SessionCookies, SessionResolver, SessionTokens};

#[derive(Debug, Clone)]
struct AccessEntry {
    identity: Identity,
    expires_at: i64,
}

/// A thread-safe session store keyed by token.
#[derive(Clone)]
pub struct MemorySessionStore {
    access: Arc<DashMap<String, AccessEntry>>,
    refresh: Arc<DashMap<String, Identity>>,
    cookies: SessionCookies,
    session_ttl_secs: i64,
    refresh_margin_secs: i64,
    unavailable: Arc<AtomicBool>,
}

impl MemorySessionStore {
    pub fn new(cookies: SessionCookies, refresh_margin_secs: u64) -> Self {
        Self {
            access: Arc::new(DashMap::new()),
            refresh: Arc::new(DashMap::new()),
            cookies,
            session_ttl_secs: 3600,
            refresh_margin_secs: refresh_margin_secs as i64,
            unavailable: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Open a session that expires `ttl_secs` from now.
    pub fn create_session(&self, identity: Identity, ttl_secs: i64) -> SessionTokens {
        let tokens = SessionTokens {
            access_token: Uuid::new_v4().simple().to_string(),
            refresh_token: Uuid::new_v4().simple().to_string(),
            expires_at: Utc::now().timestamp() + ttl_secs,
        };
        self.access.insert(
            tokens.access_token.clone(),
            AccessEntry {
                identity: identity.clone(),
                expires_at: tokens.expires_at,
            },
        );
        self.refresh.insert(tokens.refresh_token.clone(), identity);
        tokens
    }

    /// `Cookie` header value a browser would send for these tokens.
    pub fn cookie_header(&self, tokens: &SessionTokens) -> String {
        format!(
            "{}={}; {}={}; {}={}",
            self.cookies.access,
            tokens.access_token,
            self.cookies.refresh,
            tokens.refresh_token,
            self.cookies.expires,
            tokens.expires_at
        )
    }

    /// Simulate a provider outage.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn session_count(&self) -> usize {
        self.access.len()
    }

    fn rotate(&self, refresh_token: &str) -> Option<Resolution> {
        let (_, identity) = self.refresh.remove(refresh_token)?;
        self.access.retain(|_, entry| entry.identity.user_id != identity.user_id);
        let tokens = self.create_session(identity.clone(), self.session_ttl_secs);
        tracing::debug!(user_id = %identity.user_id, "Session rotated");
        Some(Resolution::rotated(identity, self.cookies.issue(&tokens)))
    }
}

#[async_trait]
impl SessionResolver for MemorySessionStore {
    async fn resolve(&self, jar: &CookieJar) -> Result<Resolution, IdentityError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(IdentityError::Unavailable);
        }
        if !self.cookies.present_in(jar) {
            return Ok(Resolution::anonymous());
        }

        let now = Utc::now().timestamp();
        if let Some(token) = jar.get(&self.cookies.access) {
            if let Some(entry) = self.access.get(token).map(|e| e.value().clone()) {
                if entry.expires_at > now + self.refresh_margin_secs {
                    return Ok(Resolution::authenticated(entry.identity));
                }
                if entry.expires_at <= now {
                    self.access.remove(token);
                }
            }
        }

        if let Some(refresh_token) = jar.get(&self.cookies.refresh) {
            if let Some(resolution) = self.rotate(refresh_token) {
                return Ok(resolution);
            }
        }

        Ok(Resolution::cleared(self.cookies.clear()))
    }

    async fn sign_out(&self, jar: &CookieJar) -> Result<Vec<SessionCookie>, IdentityError> {
        if let Some(token) = jar.get(&self.cookies.access) {
            self.access.remove(token);
        }
        if let Some(token) = jar.get(&self.cookies.refresh) {
            self.refresh.remove(token);
        }
        Ok(self.cookies.clear())
    }
}
