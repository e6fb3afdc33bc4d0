//! Unified error types for test-selection operations.
//!
//! Categorizes failures the way callers need to branch on them (§7 of the
//! specification): per-item failures during bulk operations are recovered
//! locally and surface as warnings, while whole-operation failures
//! propagate through this error type.

use std::path::PathBuf;

/// Structured error kind surfaced by the core.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AnalysisError {
    /// A test id, assembly path, or coverage map could not be found.
    #[error("not found: {message}")]
    NotFound { message: String },
    /// Malformed input: bad test id, empty required argument, conflicting options.
    #[error("invalid: {message}")]
    Invalid { message: String },
    /// An external collaborator (discovery, coverage builder) failed for one unit of work.
    #[error("dependency unavailable for {unit}: {message}")]
    DependencyUnavailable { message: String, unit: String },
    /// Cooperative cancellation observed at a suspension point or loop boundary.
    #[error("operation cancelled")]
    Cancelled,
    /// A cache entry failed its integrity check; already evicted by the caller.
    #[error("corrupt cache entry{}: {message}", path.as_ref().map(|p| format!(" at {}", p.display())).unwrap_or_default())]
    Corrupt { path: Option<PathBuf>, message: String },
}

impl AnalysisError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    pub fn dependency_unavailable(message: impl Into<String>, unit: impl Into<String>) -> Self {
        Self::DependencyUnavailable {
            message: message.into(),
            unit: unit.into(),
        }
    }

    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::Corrupt {
            path: None,
            message: message.into(),
        }
    }

    pub fn corrupt_at(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Corrupt {
            path: Some(path.into()),
            message: message.into(),
        }
    }

    /// Whether this error should be recovered locally (attached as a warning)
    /// rather than aborting the whole operation, per the propagation policy in §7.
    pub fn is_recoverable_per_item(&self) -> bool {
        matches!(self, Self::DependencyUnavailable { .. } | Self::Corrupt { .. })
    }
}

pub type Result<T> = std::result::Result<T, anyhow::Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dependency_and_corrupt_errors_are_recoverable() {
        let dep = AnalysisError::dependency_unavailable("assembly load failed", "MyApp.Tests.dll");
        assert!(dep.is_recoverable_per_item());

        let corrupt = AnalysisError::corrupt("schema mismatch");
        assert!(corrupt.is_recoverable_per_item());

        let invalid = AnalysisError::invalid("empty test id");
        assert!(!invalid.is_recoverable_per_item());
    }

    #[test]
    fn cancelled_is_not_recoverable_per_item() {
        assert!(!AnalysisError::Cancelled.is_recoverable_per_item());
    }

    #[test]
    fn display_includes_context() {
        let err = AnalysisError::not_found("MyApp.Tests.FooTest");
        assert_eq!(err.to_string(), "not found: MyApp.Tests.FooTest");
    }

    #[test]
    fn display_includes_path_when_present() {
        let err = AnalysisError::corrupt_at("/tmp/cache/entry.bin", "bad magic bytes");
        assert_eq!(err.to_string(), "corrupt cache entry at /tmp/cache/entry.bin: bad magic bytes");
    }
}
