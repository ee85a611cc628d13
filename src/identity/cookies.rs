//! Cookie parsing and `Set-Cookie` rendering for session tokens.

use std::collections::{HashMap, HashSet};

use axum::http::{header, HeaderMap, HeaderValue};

use crate::config::IdentityConfig;

/// Cookies sent by the client, parsed from every `Cookie` header.
#[derive(Debug, Clone, Default)]
pub struct CookieJar {
    values: HashMap<String, String>,
}

impl CookieJar {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut values = HashMap::new();
        for raw in headers.get_all(header::COOKIE) {
            let Ok(raw) = raw.to_str() else { continue };
            for pair in raw.split(';') {
                if let Some((name, value)) = pair.trim().split_once('=') {
                    let name = name.trim();
                    if !name.is_empty() {
                        // First occurrence wins, matching browser ordering (most specific path first).
                        values
                            .entry(name.to_string())
                            .or_insert_with(|| value.trim().trim_matches('"').to_string());
                    }
                }
            }
        }
        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str).filter(|v| !v.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The jar as the client will hold it once `cookies` are stored.
    pub fn with_applied(&self, cookies: &[SessionCookie]) -> Self {
        let mut values = self.values.clone();
        for cookie in cookies {
            if cookie.is_removal() {
                values.remove(&cookie.name);
            } else {
                values.insert(cookie.name.clone(), cookie.value.clone());
            }
        }
        Self { values }
    }
}

/// A cookie the gateway wants the client to store (or drop).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    /// `Some(0)` deletes the cookie.
    pub max_age: Option<i64>,
    pub secure: bool,
}

impl SessionCookie {
    /// Render as a `Set-Cookie` header value.
    pub fn to_header_value(&self) -> Option<HeaderValue> {
        let mut out = format!("{}={}; Path=/; HttpOnly; SameSite=Lax", self.name, self.value);
        if let Some(max_age) = self.max_age {
            out.push_str(&format!("; Max-Age={}", max_age));
        }
        if self.secure {
            out.push_str("; Secure");
        }
        HeaderValue::from_str(&out).ok()
    }

    pub fn is_removal(&self) -> bool {
        self.max_age == Some(0)
    }
}

/// Append every cookie to the response headers.
pub fn append_set_cookies(headers: &mut HeaderMap, cookies: &[SessionCookie]) {
    for cookie in cookies {
        match cookie.to_header_value() {
            Some(value) => {
                headers.append(header::SET_COOKIE, value);
            }
            None => tracing::warn!(cookie = %cookie.name, "Dropping cookie with invalid characters"),
        }
    }
}

/// Append the cookies the response does not already set itself.
///
/// Clients keep the last `Set-Cookie` for a name, so a handler's own cookie
/// (a sign-out removal, say) must not be followed by an older rotation.
pub fn merge_set_cookies(headers: &mut HeaderMap, cookies: &[SessionCookie]) {
    let already_set: HashSet<String> = headers
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split_once('=').map(|(name, _)| name.trim().to_string()))
        .collect();
    let missing: Vec<SessionCookie> = cookies
        .iter()
        .filter(|c| !already_set.contains(&c.name))
        .cloned()
        .collect();
    append_set_cookies(headers, &missing);
}

/// Tokens issued by the identity provider for one session.
#[derive(Debug, Clone)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix seconds.
    pub expires_at: i64,
}

/// Names and attributes of the three session cookies.
#[derive(Debug, Clone)]
pub struct SessionCookies {
    pub access: String,
    pub refresh: String,
    pub expires: String,
    pub secure: bool,
    /// Lifetime given to the refresh cookie.
    pub refresh_max_age: i64,
}

impl SessionCookies {
    pub fn from_config(config: &IdentityConfig, secure: bool) -> Self {
        Self {
            access: config.access_cookie.clone(),
            refresh: config.refresh_cookie.clone(),
            expires: config.expires_cookie.clone(),
            secure,
            refresh_max_age: 60 * 60 * 24 * 30,
        }
    }

    /// Cookies carrying a freshly issued session.
    pub fn issue(&self, tokens: &SessionTokens) -> Vec<SessionCookie> {
        let access_max_age = (tokens.expires_at - chrono::Utc::now().timestamp()).max(0);
        vec![
            self.cookie(&self.access, tokens.access_token.clone(), access_max_age),
            self.cookie(&self.refresh, tokens.refresh_token.clone(), self.refresh_max_age),
            self.cookie(&self.expires, tokens.expires_at.to_string(), self.refresh_max_age),
        ]
    }

    /// Cookies that delete the session on the client.
    pub fn clear(&self) -> Vec<SessionCookie> {
        [&self.access, &self.refresh, &self.expires]
            .into_iter()
            .map(|name| self.cookie(name, String::new(), 0))
            .collect()
    }

    /// True when the jar carries any session cookie at all.
    pub fn present_in(&self, jar: &CookieJar) -> bool {
        jar.get(&self.access).is_some() || jar.get(&self.refresh).is_some()
    }

    fn cookie(&self, name: &str, value: String, max_age: i64) -> SessionCookie {
        SessionCookie {
            name: name.to_string(),
            value,
            max_age: Some(max_age),
            secure: self.secure,
        }
    }
}
