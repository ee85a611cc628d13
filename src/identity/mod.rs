//! Session resolution subsystem.
//!
//! # Data Flow
//! ```text
//! Cookie header(s)
//!     → cookies.rs (CookieJar)
//!     → SessionResolver (supabase.rs or memory.rs)
//!         - valid access token        → Identity
//!         - expiring / rejected token → refresh, rotated cookies
//!         - nothing usable            → anonymous (not an error)
//!         - provider failure          → IdentityError
//! ```
//!
//! Absence of a session is an ordinary outcome. Only infrastructure
//! failures surface as errors.

pub mod cookies;
pub mod memory;
pub mod supabase;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::quota::Tier;

pub use cookies::{CookieJar, SessionCookie, SessionCookies, SessionTokens};
pub use memory::MemorySessionStore;
pub use supabase::SupabaseResolver;

/// Privilege carried by an identity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    /// Parse the provider's role claim. Unknown claims carry no privilege.
    pub fn from_claim(claim: Option<&str>) -> Self {
        match claim {
            Some("admin") => Role::Admin,
            _ => Role::User,
        }
    }
}

/// An authenticated user as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    #[serde(rename = "id")]
    pub user_id: String,
    pub email: String,
    pub role: Role,
    pub tier: Tier,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: email.into(),
            role: Role::User,
            tier: Tier::Free,
        }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    pub fn with_tier(mut self, tier: Tier) -> Self {
        self.tier = tier;
        self
    }
}

/// Outcome of resolving a request's session.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub identity: Option<Identity>,
    /// Cookies to attach to the response (rotation or removal).
    pub cookies: Vec<SessionCookie>,
}

impl Resolution {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(identity: Identity) -> Self {
        Self {
            identity: Some(identity),
            cookies: Vec::new(),
        }
    }

    pub fn rotated(identity: Identity, cookies: Vec<SessionCookie>) -> Self {
        Self {
            identity: Some(identity),
            cookies,
        }
    }

    pub fn cleared(cookies: Vec<SessionCookie>) -> Self {
        Self {
            identity: None,
            cookies,
        }
    }
}

/// Failures talking to the identity provider.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("identity provider unreachable: {0}")]
    Transport(String),

    #[error("identity provider returned status {0}")]
    UnexpectedStatus(u16),

    #[error("malformed identity provider response: {0}")]
    Malformed(String),

    #[error("identity provider unavailable")]
    Unavailable,
}

impl From<reqwest::Error> for IdentityError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            IdentityError::Malformed(e.to_string())
        } else {
            IdentityError::Transport(e.to_string())
        }
    }
}

/// Resolves the identity behind a request's cookies.
#[async_trait]
pub trait SessionResolver: Send + Sync {
    /// Resolve the session, refreshing it when it is about to expire.
    async fn resolve(&self, jar: &CookieJar) -> Result<Resolution, IdentityError>;

    /// End the session; returns the cookies that remove it from the client.
    async fn sign_out(&self, jar: &CookieJar) -> Result<Vec<SessionCookie>, IdentityError>;
}
