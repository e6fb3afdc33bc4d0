//! The process-wide compressed, content-addressed byte cache (C8, §4.8).
//!
//! One file per entry under `root`, named by the hex-encoded SHA-256 digest
//! of the key (§6 on-disk layout). Values are serialized with `postcard`
//! (a canonical, fixed-layout binary encoding — no field reordering or
//! varint ambiguity across runs), compressed with `zstd`, and written
//! atomically via [`crate::cache::atomic_io::AtomicFileWriter`].

use super::atomic_io::AtomicFileWriter;
use super::entry::{
    build_dependent_files, dependent_files_still_valid, frame_with_magic, sha256_bytes,
    strip_magic, DependentFile, EntryHeader, StoredEntry, SCHEMA_VERSION,
};
use anyhow::{Context, Result};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Compression level selection (§4.8 "Fastest or SmallestSize per options").
/// `Fastest` maps to zstd level 1, `SmallestSize` to zstd level 19.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionOptions {
    Fastest,
    SmallestSize,
}

impl CompressionOptions {
    fn zstd_level(self) -> i32 {
        match self {
            CompressionOptions::Fastest => 1,
            CompressionOptions::SmallestSize => 19,
        }
    }
}

/// Running counters surfaced by [`CompressedCache::stats`].
#[derive(Debug, Default)]
pub struct CacheStats {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub evictions: AtomicU64,
    pub corruptions: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub corruptions: u64,
}

/// The byte-level compressed cache. Owned by whatever session/handle wires
/// it in (§9 "Global state" — never a hidden singleton).
pub struct CompressedCache {
    root: PathBuf,
    compression: CompressionOptions,
    max_cache_size_bytes: u64,
    stats: CacheStats,
    /// At-most-one concurrent factory invocation per key (§4.8 `getOrSet`):
    /// a key present here means some caller is already computing it: every
    /// other caller for the same key blocks on its `Mutex` rather than
    /// recomputing.
    in_flight: DashMap<String, Arc<Mutex<()>>>,
}

fn key_filename(key: &str) -> String {
    hex_encode(&sha256_bytes(key.as_bytes()))
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

impl CompressedCache {
    pub fn new(root: impl Into<PathBuf>, compression: CompressionOptions, max_cache_size_bytes: u64) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .with_context(|| format!("failed to create cache root {}", root.display()))?;
        Ok(Self {
            root,
            compression,
            max_cache_size_bytes,
            stats: CacheStats::default(),
            in_flight: DashMap::new(),
        })
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.cache", key_filename(key)))
    }

    /// Read and validate an entry; returns `Ok(None)` on a clean miss.
    /// Corrupted payloads (decompression failure, schema mismatch, content
    /// hash mismatch) are treated as a miss and the file is removed silently
    /// (§4.8 "Integrity").
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let path = self.entry_path(key);
        let bytes = match std::fs::read(&path) {
            Ok(b) => b,
            Err(_) => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                return Ok(None);
            }
        };

        let Some(body) = strip_magic(&bytes) else {
            self.evict_corrupt(&path);
            return Ok(None);
        };

        let stored: StoredEntry = match postcard::from_bytes(body) {
            Ok(s) => s,
            Err(_) => {
                self.evict_corrupt(&path);
                return Ok(None);
            }
        };

        if stored.header.schema_version != SCHEMA_VERSION {
            self.evict_corrupt(&path);
            return Ok(None);
        }

        if let Some(expires_at) = stored.header.expires_at {
            if SystemTime::now() > expires_at {
                self.evict(&path);
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                return Ok(None);
            }
        }

        if !dependent_files_still_valid(&stored.header.dependent_files) {
            self.evict(&path);
            self.stats.misses.fetch_add(1, Ordering::Relaxed);
            return Ok(None);
        }

        let decompressed = match zstd::decode_all(stored.compressed_payload.as_slice()) {
            Ok(d) => d,
            Err(_) => {
                self.evict_corrupt(&path);
                return Ok(None);
            }
        };

        if sha256_bytes(&decompressed) != stored.header.content_hash {
            self.evict_corrupt(&path);
            return Ok(None);
        }

        match postcard::from_bytes(&decompressed) {
            Ok(value) => {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(value))
            }
            Err(_) => {
                self.evict_corrupt(&path);
                Ok(None)
            }
        }
    }

    fn evict(&self, path: &Path) {
        let _ = std::fs::remove_file(path);
        self.stats.evictions.fetch_add(1, Ordering::Relaxed);
    }

    fn evict_corrupt(&self, path: &Path) {
        let _ = std::fs::remove_file(path);
        self.stats.corruptions.fetch_add(1, Ordering::Relaxed);
    }

    /// Serialize, compress, and atomically write `value` under `key`, with
    /// an optional TTL and dependent-file paths whose digests gate future
    /// reads (§4.8 `set`).
    pub fn set<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
        dependent_paths: &[impl AsRef<Path>],
    ) -> Result<()> {
        let canonical = postcard::to_allocvec(value).context("failed to serialize cache value")?;
        let content_hash = sha256_bytes(&canonical);
        let compressed = zstd::encode_all(canonical.as_slice(), self.compression.zstd_level())
            .context("failed to compress cache payload")?;
        let dependent_files: Vec<DependentFile> = build_dependent_files(dependent_paths)
            .context("failed to hash dependent files")?;

        let header = EntryHeader {
            schema_version: SCHEMA_VERSION,
            content_hash,
            uncompressed_size: canonical.len() as u64,
            dependent_files,
            created_at: SystemTime::now(),
            expires_at: ttl.and_then(|d| SystemTime::now().checked_add(d)),
        };
        let stored = StoredEntry {
            header,
            compressed_payload: compressed,
        };
        let body = postcard::to_allocvec(&stored).context("failed to serialize cache entry")?;
        let bytes = frame_with_magic(&body);

        let target = self.entry_path(key);
        let writer = AtomicFileWriter::with_default_retry();
        writer.write_atomically(&target, &bytes)
    }

    /// At-most-one concurrent `factory` invocation per key across this
    /// process; other callers for the same key wait for the in-flight one
    /// (§4.8 `getOrSet`).
    pub fn get_or_set<T, F>(&self, key: &str, ttl: Option<Duration>, factory: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T>,
    {
        if let Some(hit) = self.get::<T>(key)? {
            return Ok(hit);
        }

        let lock = self
            .in_flight
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock();

        // Re-check: another caller may have populated the entry while we
        // waited for the lock.
        if let Some(hit) = self.get::<T>(key)? {
            self.in_flight.remove(key);
            return Ok(hit);
        }

        let value = factory()?;
        self.set(key, &value, ttl, &[] as &[&Path])?;
        self.in_flight.remove(key);
        Ok(value)
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        let path = self.entry_path(key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn clear(&self) -> Result<()> {
        for entry in std::fs::read_dir(&self.root)?.flatten() {
            let _ = std::fs::remove_file(entry.path());
        }
        Ok(())
    }

    /// Removes expired entries and, while total compressed bytes exceed
    /// `max_cache_size_bytes`, evicts oldest-by-`created_at` entries until
    /// within the limit (§4.8 `performMaintenance`, LRU-by-creation).
    pub fn perform_maintenance(&self) -> Result<MaintenanceReport> {
        let mut entries: Vec<(PathBuf, SystemTime, u64)> = Vec::new();
        let now = SystemTime::now();
        let mut expired_removed = 0usize;

        for dir_entry in std::fs::read_dir(&self.root)?.flatten() {
            let path = dir_entry.path();
            let Ok(bytes) = std::fs::read(&path) else { continue };
            let Some(body) = strip_magic(&bytes) else {
                let _ = std::fs::remove_file(&path);
                self.stats.corruptions.fetch_add(1, Ordering::Relaxed);
                continue;
            };
            let Ok(stored) = postcard::from_bytes::<StoredEntry>(body) else {
                let _ = std::fs::remove_file(&path);
                self.stats.corruptions.fetch_add(1, Ordering::Relaxed);
                continue;
            };
            if let Some(expires_at) = stored.header.expires_at {
                if now > expires_at {
                    let _ = std::fs::remove_file(&path);
                    expired_removed += 1;
                    continue;
                }
            }
            entries.push((path, stored.header.created_at, bytes.len() as u64));
        }

        entries.sort_by_key(|(_, created_at, _)| *created_at);

        let mut total: u64 = entries.iter().map(|(_, _, size)| size).sum();
        let mut evicted = 0usize;
        let mut i = 0;
        while total > self.max_cache_size_bytes && i < entries.len() {
            let (path, _, size) = &entries[i];
            if std::fs::remove_file(path).is_ok() {
                total = total.saturating_sub(*size);
                evicted += 1;
                self.stats.evictions.fetch_add(1, Ordering::Relaxed);
            }
            i += 1;
        }

        Ok(MaintenanceReport {
            expired_removed,
            size_evicted: evicted,
            remaining_bytes: total,
        })
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            evictions: self.stats.evictions.load(Ordering::Relaxed),
            corruptions: self.stats.corruptions.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MaintenanceReport {
    pub expired_removed: usize,
    pub size_evicted: usize,
    pub remaining_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn cache(dir: &TempDir) -> CompressedCache {
        CompressedCache::new(dir.path(), CompressionOptions::Fastest, 1024 * 1024).unwrap()
    }

    #[test]
    fn set_then_get_round_trips() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);
        cache.set("k1", &vec![1, 2, 3], None, &[] as &[&Path]).unwrap();
        let value: Option<Vec<i32>> = cache.get("k1").unwrap();
        assert_eq!(value, Some(vec![1, 2, 3]));
    }

    #[test]
    fn missing_key_is_a_clean_miss() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);
        let value: Option<String> = cache.get("nope").unwrap();
        assert_eq!(value, None);
    }

    #[test]
    fn dependent_file_change_invalidates_entry() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);
        let dep_path = dir.path().join("dep.txt");
        std::fs::write(&dep_path, "v1").unwrap();

        cache.set("k1", &42i32, None, &[&dep_path]).unwrap();
        assert_eq!(cache.get::<i32>("k1").unwrap(), Some(42));

        std::fs::write(&dep_path, "v2").unwrap();
        assert_eq!(cache.get::<i32>("k1").unwrap(), None);
    }

    #[test]
    fn corrupted_payload_is_treated_as_miss_and_removed() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);
        cache.set("k1", &"hello".to_string(), None, &[] as &[&Path]).unwrap();
        let path = cache.entry_path("k1");
        std::fs::write(&path, b"not a valid entry").unwrap();

        let value: Option<String> = cache.get("k1").unwrap();
        assert_eq!(value, None);
        assert!(!path.exists());
    }

    #[test]
    fn expired_entry_is_a_miss() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);
        cache
            .set("k1", &1i32, Some(Duration::from_millis(1)), &[] as &[&Path])
            .unwrap();
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(cache.get::<i32>("k1").unwrap(), None);
    }

    #[test]
    fn get_or_set_only_invokes_factory_once_per_key() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);
        let calls = std::sync::atomic::AtomicUsize::new(0);

        let v1 = cache
            .get_or_set("k1", None, || {
                calls.fetch_add(1, Ordering::Relaxed);
                Ok(7i32)
            })
            .unwrap();
        let v2 = cache
            .get_or_set("k1", None, || {
                calls.fetch_add(1, Ordering::Relaxed);
                Ok(99i32)
            })
            .unwrap();

        assert_eq!(v1, 7);
        assert_eq!(v2, 7);
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn remove_and_clear_are_idempotent() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);
        cache.set("k1", &1i32, None, &[] as &[&Path]).unwrap();
        cache.remove("k1").unwrap();
        cache.remove("k1").unwrap();
        assert_eq!(cache.get::<i32>("k1").unwrap(), None);

        cache.set("k2", &2i32, None, &[] as &[&Path]).unwrap();
        cache.clear().unwrap();
        assert_eq!(cache.get::<i32>("k2").unwrap(), None);
    }

    #[test]
    fn maintenance_evicts_oldest_first_over_size_budget() {
        let dir = TempDir::new().unwrap();
        // Small budget forces eviction after a couple of entries.
        let cache = CompressedCache::new(dir.path(), CompressionOptions::Fastest, 1).unwrap();
        cache.set("a", &vec![0u8; 64], None, &[] as &[&Path]).unwrap();
        std::thread::sleep(Duration::from_millis(5));
        cache.set("b", &vec![0u8; 64], None, &[] as &[&Path]).unwrap();

        let report = cache.perform_maintenance().unwrap();
        assert!(report.size_evicted >= 1);
    }
}
