//! Cooperative cancellation (§5): every long-running operation accepts a
//! [`CancellationToken`] and checks it at suspension points and outer loop
//! boundaries (per-assembly in discovery, per-pair in clustering,
//! per-algorithm in scoring), surfacing `AnalysisError::Cancelled` rather
//! than quietly finishing or panicking.
//!
//! A cheap atomic flag behind an `Arc` rather than a channel: the call
//! patterns here are request/poll, not producer/consumer, so there's
//! nothing a dedicated channel type would buy over `AtomicBool`.

use crate::errors::{AnalysisError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A clonable, thread-safe cancellation flag.
///
/// Clones share the same underlying flag: cancelling any clone cancels all
/// of them. The default token is never cancelled, for callers that don't
/// need to interrupt an operation in progress.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Checks this token at a suspension point or loop boundary, returning
    /// `Err(AnalysisError::Cancelled)` if cancellation was requested.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(AnalysisError::Cancelled.into())
        } else {
            Ok(())
        }
    }
}
