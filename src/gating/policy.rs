//! The gating decision procedure.
//!
//! ```text
//! classify(path)
//!     gated prefix         → session required
//!     refresh-only prefix  → always allowed, session refreshed on the way
//!     anything else        → not intercepted
//!
//! decide(uri, identity)
//!     Gated + identity          → Allow
//!     Gated + none (page)       → Redirect(sign_in?next=<path+query>)
//!     Gated + none (API route)  → Reject(401)
//!     RefreshOnly               → Allow
//!     Unmatched                 → PassThrough
//! ```

use axum::http::{StatusCode, Uri};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use super::matcher::PathPrefixMatcher;
use crate::config::GatingConfig;
use crate::identity::Identity;

/// Characters left alone by JavaScript's `encodeURIComponent`.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Which rule a path falls under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathClass {
    Gated,
    RefreshOnly,
    Unmatched,
}

/// What to do with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Redirect { location: String },
    Reject { status: StatusCode },
    PassThrough,
}

impl Decision {
    pub fn label(&self) -> &'static str {
        match self {
            Decision::Allow => "allow",
            Decision::Redirect { .. } => "redirect",
            Decision::Reject { .. } => "reject",
            Decision::PassThrough => "pass_through",
        }
    }
}

#[derive(Debug, Clone)]
struct Rule {
    matcher: PathPrefixMatcher,
    class: PathClass,
}

/// Compiled gating rules. Immutable; rebuilt on config reload.
#[derive(Debug, Clone)]
pub struct GatePolicy {
    rules: Vec<Rule>,
    api: PathPrefixMatcher,
    sign_in_path: String,
}

impl GatePolicy {
    pub fn from_config(config: &GatingConfig) -> Self {
        let gated = config.gated_prefixes.iter().map(|p| Rule {
            matcher: PathPrefixMatcher::new(p.as_str()),
            class: PathClass::Gated,
        });
        let refresh = config.refresh_only_prefixes.iter().map(|p| Rule {
            matcher: PathPrefixMatcher::new(p.as_str()),
            class: PathClass::RefreshOnly,
        });
        Self {
            rules: gated.chain(refresh).collect(),
            api: PathPrefixMatcher::new(config.api_prefix.as_str()),
            sign_in_path: config.sign_in_path.clone(),
        }
    }

    /// True for API-only routes, which never redirect.
    pub fn is_api(&self, path: &str) -> bool {
        self.api.matches(path)
    }

    pub fn classify(&self, path: &str) -> PathClass {
        self.rules
            .iter()
            .find(|rule| rule.matcher.matches(path))
            .map(|rule| rule.class)
            .unwrap_or(PathClass::Unmatched)
    }

    pub fn decide(&self, uri: &Uri, identity: Option<&Identity>) -> Decision {
        let path = uri.path();
        match (self.classify(path), identity) {
            (PathClass::Unmatched, _) => Decision::PassThrough,
            (PathClass::RefreshOnly, _) => Decision::Allow,
            (PathClass::Gated, Some(_)) => Decision::Allow,
            (PathClass::Gated, None) if self.is_api(path) => Decision::Reject {
                status: StatusCode::UNAUTHORIZED,
            },
            (PathClass::Gated, None) => Decision::Redirect {
                location: self.sign_in_location(uri),
            },
        }
    }

    /// Sign-in URL carrying the original path and query in `next`.
    pub fn sign_in_location(&self, uri: &Uri) -> String {
        let original = uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or_else(|| uri.path());
        format!(
            "{}?next={}",
            self.sign_in_path,
            utf8_percent_encode(original, URI_COMPONENT)
        )
    }
}
