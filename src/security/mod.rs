//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Every response:
//!     → headers.rs (fixed security headers)
//!     → cors.rs (CORS headers for allow-listed origins)
//!
//! Protected handlers:
//!     → authz.rs (role check)
//!     → rate_limit.rs (per user + route window)
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject on any security check failure
//! - Exact origin matching only

pub mod authz;
pub mod cors;
pub mod headers;
pub mod rate_limit;

pub use authz::{Authorizer, RoleAuthorizer};
pub use cors::CorsPolicy;
pub use headers::{apply_security_headers, security_headers_middleware};
pub use rate_limit::{MemoryRateLimitStore, RateDecision, RateLimit, RateLimitStore};
