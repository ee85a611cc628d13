//! Briefly gateway library: edge gating and protected API handlers.

pub mod billing;
pub mod config;
pub mod gating;
pub mod handlers;
pub mod http;
pub mod identity;
pub mod lifecycle;
pub mod observability;
pub mod quota;
pub mod security;
pub mod support;

pub use config::GatewayConfig;
pub use http::{AppState, HttpServer};
pub use lifecycle::Shutdown;
