//! Configuration validation.
//!
//! Serde handles the syntax; this module checks the semantics and reports
//! every problem at once rather than stopping at the first.

use std::fmt;

use crate::config::schema::{GatewayConfig, IdentityBackend};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<std::net::SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    let gating = &config.gating;
    if !gating.api_prefix.starts_with('/') {
        errors.push(ValidationError::new("gating.api_prefix", "must start with '/'"));
    }
    if !gating.sign_in_path.starts_with('/') || gating.sign_in_path.contains('?') {
        errors.push(ValidationError::new(
            "gating.sign_in_path",
            "must be an absolute path without a query",
        ));
    }

    for (i, prefix) in gating.gated_prefixes.iter().enumerate() {
        let field = format!("gating.gated_prefixes[{}]", i);
        if !prefix.starts_with('/') {
            errors.push(ValidationError::new(field.clone(), "must start with '/'"));
        }
        if prefix == "/" {
            errors.push(ValidationError::new(field.clone(), "gating every path would gate the sign-in page"));
        }
        if gating.sign_in_path.starts_with(prefix.as_str()) {
            errors.push(ValidationError::new(field, "must not cover the sign-in path"));
        }
    }
    for (i, prefix) in gating.refresh_only_prefixes.iter().enumerate() {
        if !prefix.starts_with('/') {
            errors.push(ValidationError::new(
                format!("gating.refresh_only_prefixes[{}]", i),
                "must start with '/'",
            ));
        }
    }

    for (name, origins) in [
        ("cors.production_origins", &config.cors.production_origins),
        ("cors.development_origins", &config.cors.development_origins),
    ] {
        for origin in origins {
            if origin.contains('*') {
                errors.push(ValidationError::new(name, format!("wildcard origin '{}' is not allowed", origin)));
            } else if url::Url::parse(origin).is_err() || origin.ends_with('/') {
                errors.push(ValidationError::new(name, format!("'{}' is not a bare origin", origin)));
            }
        }
    }

    if config.identity.backend == IdentityBackend::Supabase {
        if url::Url::parse(&config.identity.url).is_err() {
            errors.push(ValidationError::new("identity.url", "must be a valid URL"));
        }
        if config.identity.anon_key.is_empty() {
            errors.push(ValidationError::new("identity.anon_key", "required for the supabase backend"));
        }
    }
    if config.identity.request_timeout_secs == 0 {
        errors.push(ValidationError::new("identity.request_timeout_secs", "must be greater than 0"));
    }

    if config.rate_limit.enabled && (config.rate_limit.points == 0 || config.rate_limit.duration_secs == 0) {
        errors.push(ValidationError::new("rate_limit", "points and duration_secs must be greater than 0"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&GatewayConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = GatewayConfig::default();
        config.listener.bind_address = "nope".into();
        config.gating.gated_prefixes.push("/auth".into());
        config.cors.production_origins.push("https://*.example.com".into());

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().any(|e| e.field == "listener.bind_address"));
        assert!(errors.iter().any(|e| e.message.contains("sign-in")));
        assert!(errors.iter().any(|e| e.message.contains("wildcard")));
    }

    #[test]
    fn test_supabase_requires_key() {
        let mut config = GatewayConfig::default();
        config.identity.backend = IdentityBackend::Supabase;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "identity.anon_key");
    }

    #[test]
    fn test_origin_with_path_rejected() {
        let mut config = GatewayConfig::default();
        config.cors.development_origins = vec!["http://localhost:3000/".into()];
        assert!(validate_config(&config).is_err());
    }
}
