//! Structured tracing with spans for testsel.
//!
//! This module provides structured logging controlled by the RUST_LOG environment variable.
//! Logging happens at effect boundaries (discovery, scoring, plan building), not inside the
//! pure scoring/similarity/clustering math.
//!
//! ## Log Levels
//!
//! - `error!` - Actual errors affecting results
//! - `warn!` - Recoverable issues
//! - `info!` - Phase-level progress (discovery, scoring, plan building, clustering)
//! - `debug!` - Detailed per-test progress
//! - `trace!` - Very verbose output
//!
//! ## Usage
//!
//! Control verbosity with RUST_LOG:
//!
//! ```bash
//! # Default: warnings and errors only
//! testsel plan .
//!
//! # Show phase-level progress
//! RUST_LOG=info testsel plan .
//!
//! # Detailed debugging output
//! RUST_LOG=debug testsel plan .
//!
//! # Debug only the testsel crate
//! RUST_LOG=testsel=debug testsel plan .
//! ```
//!
//! For long-running sessions, output can be redirected to a file:
//!
//! ```bash
//! TESTSEL_LOG_FILE=testsel.log testsel plan .
//! ```

use std::io::Write;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the tracing subscriber for testsel.
///
/// This sets up structured logging with environment-based filtering.
/// Default level is `warn` (warnings and errors only).
///
/// # Panics
///
/// Panics if the tracing subscriber cannot be initialized (e.g., if called twice).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    if let Ok(log_file_path) = std::env::var("TESTSEL_LOG_FILE") {
        if let Ok(file) = std::fs::File::create(&log_file_path) {
            let file = std::sync::Mutex::new(file);
            tracing_subscriber::registry()
                .with(
                    fmt::layer()
                        .with_target(false)
                        .with_ansi(false)
                        .with_writer(move || FileWriter {
                            file: &file as *const _,
                        }),
                )
                .with(filter)
                .init();
            return;
        }
    }

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();
}

/// Initialize tracing with a custom filter string.
///
/// Useful for tests or programmatic configuration.
///
/// # Arguments
///
/// * `filter` - A filter string like "debug" or "testsel=debug,warn"
pub fn init_tracing_with_filter(filter: &str) {
    let filter = EnvFilter::new(filter);
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();
}

/// Check if debug logging is enabled.
///
/// Use this to avoid expensive formatting when debug logging is disabled.
///
/// # Example
///
/// ```ignore
/// if is_debug_enabled() {
///     debug!(data = ?expensive_debug_format(&item), "Processing item");
/// }
/// ```
pub fn is_debug_enabled() -> bool {
    tracing::enabled!(tracing::Level::DEBUG)
}

/// A writer that writes to a file, for sessions that redirect logging away from stderr.
struct FileWriter {
    file: *const std::sync::Mutex<std::fs::File>,
}

// SAFETY: FileWriter is only used with a static Mutex<File>, which is Send + Sync
unsafe impl Send for FileWriter {}

impl Write for FileWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        // SAFETY: The file pointer is valid for the lifetime of the program
        let file = unsafe { &*self.file };
        let mut guard = file.lock().unwrap();
        guard.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        // SAFETY: The file pointer is valid for the lifetime of the program
        let file = unsafe { &*self.file };
        let mut guard = file.lock().unwrap();
        guard.flush()
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for FileWriter {
    type Writer = FileWriter;

    fn make_writer(&'a self) -> Self::Writer {
        FileWriter { file: self.file }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_enabled_check_does_not_panic() {
        let _ = is_debug_enabled();
    }
}
