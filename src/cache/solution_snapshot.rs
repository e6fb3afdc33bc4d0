//! Solution snapshot (§4.8): persists the
//! set of tracked file digests between runs, so the first query after a
//! restart can detect what changed since the last run without re-hashing
//! against an empty baseline.

use super::entry::digest_file;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// A persisted map of tracked file path -> digest, written to one file on
/// disk via `postcard` (matching the canonical-encoding requirement the
/// byte cache also follows).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SolutionSnapshot {
    digests: BTreeMap<String, [u8; 32]>,
}

/// What changed between a loaded snapshot and the live file set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotDiff {
    pub added: Vec<String>,
    pub modified: Vec<String>,
    pub removed: Vec<String>,
}

impl SnapshotDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }
}

impl SolutionSnapshot {
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read(path) {
            Ok(bytes) => postcard::from_bytes(&bytes).context("corrupt solution snapshot, treating as empty"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
        .or_else(|_: anyhow::Error| Ok(Self::default()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes = postcard::to_allocvec(self).context("failed to serialize solution snapshot")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, bytes).context("failed to write solution snapshot")
    }

    /// Recompute digests for `files` and record them as the new baseline.
    pub fn track(&mut self, files: &[impl AsRef<Path>]) -> Result<()> {
        let mut digests = BTreeMap::new();
        for f in files {
            let p = f.as_ref();
            let digest = digest_file(p)?;
            digests.insert(p.to_string_lossy().into_owned(), digest);
        }
        self.digests = digests;
        Ok(())
    }

    /// Compare the persisted baseline against the live digests of `files`,
    /// without mutating this snapshot.
    pub fn diff_against(&self, files: &[impl AsRef<Path>]) -> SnapshotDiff {
        let mut live: BTreeMap<String, [u8; 32]> = BTreeMap::new();
        for f in files {
            let p = f.as_ref();
            if let Ok(digest) = digest_file(p) {
                live.insert(p.to_string_lossy().into_owned(), digest);
            }
        }

        let mut diff = SnapshotDiff::default();
        for (path, digest) in &live {
            match self.digests.get(path) {
                None => diff.added.push(path.clone()),
                Some(old) if old != digest => diff.modified.push(path.clone()),
                _ => {}
            }
        }
        for path in self.digests.keys() {
            if !live.contains_key(path) {
                diff.removed.push(path.clone());
            }
        }
        diff
    }

    pub fn tracked_paths(&self) -> Vec<PathBuf> {
        self.digests.keys().map(PathBuf::from).collect()
    }
}
