//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! gate middleware, protected wrapper, handlers
//!     → logging.rs (structured events, one span per request carrying the correlation id)
//!     → metrics.rs (decision, request, rejection counters)
//!
//! Consumers:
//!     → stdout (pretty or JSON lines)
//!     → Prometheus scrape endpoint (optional)
//! ```

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
pub use metrics::init_metrics;
