//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse, env overrides)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!
//! On change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → atomic swap of the live gate settings
//! ```

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    BillingConfig, CorsConfig, DeploymentConfig, GatewayConfig, GatingConfig, IdentityBackend,
    IdentityConfig, ListenerConfig, ObservabilityConfig, RateLimitConfig,
};
pub use watcher::ConfigWatcher;
