//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! signals.rs: SIGTERM / Ctrl+C
//!     → Shutdown::trigger
//!     → server stops accepting, in-flight requests drain
//!     → config watcher and background tasks exit
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::wait_for_shutdown;
