//! Origin validation and CORS response headers.
//!
//! Membership is exact string equality against the allow-list of the
//! active deployment mode. No wildcards, no subdomain matching.

use axum::http::{header, HeaderMap, HeaderValue};

/// True if `origin` is exactly one of the allowed origins.
pub fn validate(origin: &str, allow_list: &[String]) -> bool {
    allow_list.iter().any(|allowed| allowed == origin)
}

/// CORS policy for one deployment mode.
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    allow_list: Vec<String>,
    allow_methods: HeaderValue,
    allow_headers: HeaderValue,
}

impl CorsPolicy {
    pub fn new(allow_list: Vec<String>, methods: &[String], headers: &[String]) -> Self {
        Self {
            allow_list,
            allow_methods: HeaderValue::from_str(&methods.join(", "))
                .unwrap_or_else(|_| HeaderValue::from_static("GET, POST, PUT, DELETE, OPTIONS")),
            allow_headers: HeaderValue::from_str(&headers.join(", "))
                .unwrap_or_else(|_| HeaderValue::from_static("Content-Type, Authorization")),
        }
    }

    /// The request's `Origin` header, if it is allowed.
    pub fn allowed_origin<'a>(&self, origin: Option<&'a HeaderValue>) -> Option<&'a HeaderValue> {
        let origin = origin?;
        let origin_str = origin.to_str().ok()?;
        validate(origin_str, &self.allow_list).then_some(origin)
    }

    /// Attach CORS headers when the request's origin is allowed.
    pub fn apply(&self, origin: Option<&HeaderValue>, response_headers: &mut HeaderMap, preflight: bool) {
        let Some(origin) = self.allowed_origin(origin) else {
            return;
        };
        response_headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
        response_headers.insert(
            header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        );
        response_headers.insert(header::VARY, HeaderValue::from_static("Origin"));
        if preflight {
            response_headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, self.allow_methods.clone());
            response_headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, self.allow_headers.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list() -> Vec<String> {
        vec!["https://rekonnlabs.com".to_string(), "http://localhost:3000".to_string()]
    }

    #[test]
    fn test_exact_membership() {
        assert!(validate("https://rekonnlabs.com", &list()));
        assert!(!validate("https://app.rekonnlabs.com", &list()));
        assert!(!validate("https://rekonnlabs.com/", &list()));
        assert!(!validate("http://localhost:3001", &list()));
        assert!(!validate("", &list()));
    }

    #[test]
    fn test_apply_only_for_allowed_origin() {
        let policy = CorsPolicy::new(list(), &["GET".into()], &["Content-Type".into()]);

        let mut response = HeaderMap::new();
        policy.apply(Some(&HeaderValue::from_static("https://evil.example")), &mut response, true);
        policy.apply(None, &mut response, true);
        assert!(response.is_empty());

        policy.apply(Some(&HeaderValue::from_static("http://localhost:3000")), &mut response, false);
        assert_eq!(response[header::ACCESS_CONTROL_ALLOW_ORIGIN], "http://localhost:3000");
        assert_eq!(response[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
        assert_eq!(response[header::VARY], "Origin");
        assert!(response.get(header::ACCESS_CONTROL_ALLOW_METHODS).is_none());
    }

    #[test]
    fn test_preflight_adds_methods() {
        let policy = CorsPolicy::new(list(), &["GET".into(), "POST".into()], &["Content-Type".into()]);
        let mut response = HeaderMap::new();
        policy.apply(Some(&HeaderValue::from_static("https://rekonnlabs.com")), &mut response, true);
        assert_eq!(response[header::ACCESS_CONTROL_ALLOW_METHODS], "GET, POST");
    }
}
