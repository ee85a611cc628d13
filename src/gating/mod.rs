//! Edge gating.
//!
//! # Data Flow
//! ```text
//! every request
//!     → middleware.rs
//!         OPTIONS on API path → 204 (CORS + security headers only)
//!         policy.rs classifies the path (matcher.rs prefixes)
//!         gated / refresh-only → resolve identity, rotate cookies
//!         decision → allow | redirect | reject | pass through
//!     → security headers + CORS on whatever goes out
//! ```

pub mod matcher;
pub mod middleware;
pub mod policy;

pub use middleware::gate_middleware;
pub use policy::{Decision, GatePolicy, PathClass};

use crate::config::GatewayConfig;
use crate::security::CorsPolicy;

/// The hot-reloadable part of the gateway: path rules and CORS allow-list.
#[derive(Debug, Clone)]
pub struct GateSettings {
    pub policy: GatePolicy,
    pub cors: CorsPolicy,
}

impl GateSettings {
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            policy: GatePolicy::from_config(&config.gating),
            cors: CorsPolicy::new(
                config.active_origins().to_vec(),
                &config.cors.allowed_methods,
                &config.cors.allowed_headers,
            ),
        }
    }
}
