//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Deployment mode selection.
    pub deployment: DeploymentConfig,

    /// Path gating rules.
    pub gating: GatingConfig,

    /// CORS allow-lists.
    pub cors: CorsConfig,

    /// Identity provider settings.
    pub identity: IdentityConfig,

    /// Default rate limits for protected handlers.
    pub rate_limit: RateLimitConfig,

    /// Payment processor settings.
    pub billing: BillingConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Request hardening.
    pub security: SecurityConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            tls: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Deployment mode.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DeploymentConfig {
    /// Production mode selects the production CORS allow-list and
    /// marks session cookies `Secure`.
    pub production: bool,

    /// Public base URL used for checkout return links.
    pub public_url: String,
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            production: false,
            public_url: "http://localhost:3000".to_string(),
        }
    }
}

/// Path gating rules. Prefix lists are evaluated in order, first match wins.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatingConfig {
    /// Prefix identifying API-only routes (JSON errors, never redirects).
    pub api_prefix: String,

    /// Prefixes that require a session.
    pub gated_prefixes: Vec<String>,

    /// Prefixes that always proceed but still refresh the session.
    pub refresh_only_prefixes: Vec<String>,

    /// Where unauthenticated browser navigations are sent.
    pub sign_in_path: String,
}

impl Default for GatingConfig {
    fn default() -> Self {
        Self {
            api_prefix: "/api/".to_string(),
            gated_prefixes: vec!["/app".to_string()],
            refresh_only_prefixes: vec!["/api/auth/".to_string()],
            sign_in_path: "/auth/signin".to_string(),
        }
    }
}

/// CORS allow-lists, one per deployment mode.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    pub production_origins: Vec<String>,
    pub development_origins: Vec<String>,
    pub allowed_methods: Vec<String>,
    pub allowed_headers: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            production_origins: vec![
                "https://rekonnlabs.com".to_string(),
                "https://www.rekonnlabs.com".to_string(),
                "https://rekonnlabs.vercel.app".to_string(),
            ],
            development_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
                "http://localhost:5173".to_string(),
                "http://127.0.0.1:5173".to_string(),
            ],
            allowed_methods: ["GET", "POST", "PUT", "DELETE", "OPTIONS"]
                .iter()
                .map(|m| m.to_string())
                .collect(),
            allowed_headers: vec!["Content-Type".to_string(), "Authorization".to_string()],
        }
    }
}

/// Which session backend resolves identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityBackend {
    /// Hosted identity provider over HTTP.
    Supabase,
    /// In-process session table (development and tests).
    Memory,
}

/// Identity provider settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IdentityConfig {
    pub backend: IdentityBackend,

    /// Base URL of the hosted auth service.
    pub url: String,

    /// Public API key sent as `apikey`.
    pub anon_key: String,

    pub access_cookie: String,
    pub refresh_cookie: String,
    pub expires_cookie: String,

    /// Sessions expiring within this many seconds are refreshed eagerly.
    pub refresh_margin_secs: u64,

    /// Timeout for calls to the identity provider.
    pub request_timeout_secs: u64,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            backend: IdentityBackend::Memory,
            url: "http://localhost:54321".to_string(),
            anon_key: String::new(),
            access_cookie: "sb-access-token".to_string(),
            refresh_cookie: "sb-refresh-token".to_string(),
            expires_cookie: "sb-expires-at".to_string(),
            refresh_margin_secs: 60,
            request_timeout_secs: 5,
        }
    }
}

/// Default rate limits applied by route handlers.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Requests allowed per window.
    pub points: u32,

    /// Window length in seconds.
    pub duration_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            points: 60,
            duration_secs: 60,
        }
    }
}

/// Payment processor settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BillingConfig {
    pub api_base: String,
    pub secret_key: String,
    pub pro_price_id: String,
    pub pro_byok_price_id: String,
    pub request_timeout_secs: u64,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.stripe.com".to_string(),
            secret_key: String::new(),
            pro_price_id: String::new(),
            pro_byok_price_id: String::new(),
            request_timeout_secs: 10,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the pretty format.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

impl GatewayConfig {
    /// Apply environment overrides on top of file values.
    pub fn apply_env(&mut self) {
        if let Ok(mode) = std::env::var("BRIEFLY_ENV") {
            if mode.eq_ignore_ascii_case("production") {
                self.deployment.production = true;
            }
        }
        if let Ok(url) = std::env::var("SUPABASE_URL") {
            self.identity.url = url;
            self.identity.backend = IdentityBackend::Supabase;
        }
        if let Ok(key) = std::env::var("SUPABASE_ANON_KEY") {
            self.identity.anon_key = key;
        }
        if let Ok(key) = std::env::var("STRIPE_SECRET_KEY") {
            self.billing.secret_key = key;
        }
    }

    /// The CORS allow-list for the active deployment mode.
    pub fn active_origins(&self) -> &[String] {
        if self.deployment.production {
            &self.cors.production_origins
        } else {
            &self.cors.development_origins
        }
    }
}
