//! Canonical on-disk cache entry format (§6): a fixed-layout header followed
//! by a compressed, canonically-serialized payload. Fixed field order and
//! integer width/endianness per §9 "Serialization", so the format can't be
//! poisoned by a differently-ordered encoder.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::SystemTime;

/// Current on-disk schema version. Bumping this invalidates every existing
/// entry (§6 "any unknown schema version is treated as a miss").
pub const SCHEMA_VERSION: u32 = 1;

const MAGIC: &[u8; 4] = b"TSC1";

/// Digest + mtime recorded for one file this entry depends on. `get` must
/// verify every recorded digest against the live file before returning a hit
/// (§3 `CacheEntry` invariant).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependentFile {
    pub path: String,
    pub digest: [u8; 32],
    pub last_modified_unix_ms: i64,
}

/// Header recorded alongside every cache entry, independent of the value
/// type stored (§6 on-disk layout).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryHeader {
    pub schema_version: u32,
    pub content_hash: [u8; 32],
    pub uncompressed_size: u64,
    pub dependent_files: Vec<DependentFile>,
    pub created_at: SystemTime,
    pub expires_at: Option<SystemTime>,
}

/// A full on-disk record: header plus the compressed payload bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEntry {
    pub header: EntryHeader,
    pub compressed_payload: Vec<u8>,
}

pub fn sha256_bytes(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

/// Digest a live file's contents. Used both when recording a new
/// `DependentFile` and when verifying one on read.
pub fn digest_file(path: &Path) -> std::io::Result<[u8; 32]> {
    let bytes = std::fs::read(path)?;
    Ok(sha256_bytes(&bytes))
}

pub fn file_last_modified_unix_ms(path: &Path) -> std::io::Result<i64> {
    let meta = std::fs::metadata(path)?;
    let modified = meta.modified()?;
    let dur = modified
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default();
    Ok(dur.as_millis() as i64)
}

/// Build the `dependent_files` list for a set of paths, in canonical
/// (sorted-by-path) order so the header is reproducible regardless of the
/// order callers supplied paths in.
pub fn build_dependent_files(paths: &[impl AsRef<Path>]) -> std::io::Result<Vec<DependentFile>> {
    let mut ordered: BTreeMap<String, ([u8; 32], i64)> = BTreeMap::new();
    for p in paths {
        let path = p.as_ref();
        let digest = digest_file(path)?;
        let mtime = file_last_modified_unix_ms(path)?;
        ordered.insert(path.to_string_lossy().into_owned(), (digest, mtime));
    }
    Ok(ordered
        .into_iter()
        .map(|(path, (digest, last_modified_unix_ms))| DependentFile {
            path,
            digest,
            last_modified_unix_ms,
        })
        .collect())
}

/// Returns `true` when every recorded dependent file still matches its
/// recorded digest. Missing files count as a mismatch (§8 "Invalidation").
pub fn dependent_files_still_valid(files: &[DependentFile]) -> bool {
    files.iter().all(|f| match digest_file(Path::new(&f.path)) {
        Ok(digest) => digest == f.digest,
        Err(_) => false,
    })
}

pub const MAGIC_BYTES: &[u8; 4] = MAGIC;

/// Prepend the magic bytes to a serialized entry (§6 on-disk layout).
pub fn frame_with_magic(serialized: &[u8]) -> Vec<u8> {
    let mut framed = Vec::with_capacity(MAGIC.len() + serialized.len());
    framed.extend_from_slice(MAGIC);
    framed.extend_from_slice(serialized);
    framed
}

/// Strip and verify the magic bytes, returning the remaining body. `None`
/// means the file is too short or doesn't start with the expected magic,
/// which is treated the same as any other corruption (§4.8 "Integrity").
pub fn strip_magic(framed: &[u8]) -> Option<&[u8]> {
    framed.strip_prefix(MAGIC.as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_is_deterministic() {
        assert_eq!(sha256_bytes(b"hello"), sha256_bytes(b"hello"));
        assert_ne!(sha256_bytes(b"hello"), sha256_bytes(b"world"));
    }

    #[test]
    fn missing_dependent_file_is_invalid() {
        let files = vec![DependentFile {
            path: "/nonexistent/path/for/testsel/tests".to_string(),
            digest: [0u8; 32],
            last_modified_unix_ms: 0,
        }];
        assert!(!dependent_files_still_valid(&files));
    }

    #[test]
    fn empty_dependent_files_are_trivially_valid() {
        assert!(dependent_files_still_valid(&[]));
    }
}
