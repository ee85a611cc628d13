//! HTTP surface of the gateway.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (router, tower layers, gate middleware)
//!     → protected.rs (per-handler auth, role, rate limit, quota)
//!     → handler
//!     → envelope.rs (uniform JSON body, error taxonomy)
//! ```

pub mod envelope;
pub mod protected;
pub mod request;
pub mod server;
pub mod tls;

pub use envelope::{ApiError, Envelope, FieldError};
pub use protected::{protected, LoggingOptions, ProtectedOptions, RequestContext};
pub use request::{CorrelationId, X_CORRELATION_ID};
pub use server::{build_state, AppState, HttpServer, InMemory, StartupError};
