//! Tracing and logging (shared setup).
//!
//! Library crates only emit `tracing` events. The process entry point installs
//! the subscriber once, before building any services:
//!
//! ```no_run
//! fn main() {
//!     clubhouse_observability::init();
//!     tracing::info!("clubhouse starting");
//! }
//! ```

/// Initialize process-wide logging from the environment.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init();
}

/// Subscriber configuration (filters, output format).
pub mod tracing;

pub use self::tracing::{FORMAT_VAR, LogFormat, UnknownLogFormat};
