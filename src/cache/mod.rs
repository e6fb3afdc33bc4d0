//! Compressed, content-addressed cache (§4.8, §6): a byte-level store
//! ([`compressed_cache`]) with two thin layers on top — project-scoped
//! namespacing with source-file invalidation ([`project_cache`]) and a
//! persisted baseline for detecting what changed since the last run
//! ([`solution_snapshot`]).

pub mod atomic_io;
pub mod compressed_cache;
pub mod entry;
pub mod project_cache;
pub mod solution_snapshot;

pub use atomic_io::AtomicFileWriter;
pub use compressed_cache::{CacheStatsSnapshot, CompressedCache, CompressionOptions, MaintenanceReport};
pub use entry::{DependentFile, SCHEMA_VERSION};
pub use project_cache::{ProjectCache, ProjectIdentity};
pub use solution_snapshot::{SnapshotDiff, SolutionSnapshot};
