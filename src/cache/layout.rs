//! On-disk layout of the cache directory
//!
//! ```text
//! <root>/<key>.parquet
//! <root>/metadata/<key>.json
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use directories::BaseDirs;

use super::metadata::MetadataStore;
use super::{CacheError, CacheKey};

/// Directory name of the default cache root, placed in the home directory
const DEFAULT_DIR_NAME: &str = ".tushare_parquet_cache";

const METADATA_DIR: &str = "metadata";
const PAYLOAD_EXT: &str = "parquet";
const METADATA_EXT: &str = "json";

/// Root of a cache directory and the paths derived from it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheDir {
    root: PathBuf,
}

/// Entry counts reported by [`CacheDir::stats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of parquet payloads
    pub entries: usize,
    /// Total size of the payloads in bytes
    pub payload_bytes: u64,
    /// Number of metadata files
    pub metadata_files: usize,
}

/// Result of a [`CacheDir::prune`] pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneReport {
    /// Entries whose metadata was older than the cutoff
    pub expired: usize,
    /// Payloads with missing or unreadable metadata
    pub orphaned: usize,
    /// Entries left in place
    pub kept: usize,
}

impl CacheDir {
    /// Uses `~/.tushare_parquet_cache`
    ///
    /// Returns `None` if the home directory cannot be determined.
    pub fn new() -> Option<Self> {
        let base = BaseDirs::new()?;
        Some(Self::with_root(base.home_dir().join(DEFAULT_DIR_NAME)))
    }

    /// Uses a custom root directory
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn metadata_dir(&self) -> PathBuf {
        self.root.join(METADATA_DIR)
    }

    /// Path of the parquet payload for a key
    pub fn payload_path(&self, key: &CacheKey) -> PathBuf {
        self.root.join(format!("{}.{}", key, PAYLOAD_EXT))
    }

    /// Path of the metadata file for a key
    pub fn metadata_path(&self, key: &CacheKey) -> PathBuf {
        self.metadata_dir().join(format!("{}.{}", key, METADATA_EXT))
    }

    /// Counts cached entries and payload bytes
    ///
    /// A missing root counts as an empty cache.
    pub fn stats(&self) -> Result<CacheStats, CacheError> {
        let mut stats = CacheStats::default();

        for (_, path) in self.list(&self.root, PAYLOAD_EXT)? {
            stats.entries += 1;
            stats.payload_bytes += fs::metadata(&path)?.len();
        }
        stats.metadata_files = self.list(&self.metadata_dir(), METADATA_EXT)?.len();

        Ok(stats)
    }

    /// Removes entries fetched longer than `max_age` before `now`
    ///
    /// Payloads without readable metadata are removed too, as are metadata
    /// files left without a payload. The fetch path never calls this. A
    /// `max_age` reaching past the earliest representable time keeps every
    /// entry with readable metadata.
    pub fn prune(&self, max_age: Duration, now: DateTime<Utc>) -> Result<PruneReport, CacheError> {
        let mut report = PruneReport::default();
        let metadata = MetadataStore::new(self.clone());
        let cutoff = now
            .checked_sub_signed(max_age)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        for (stem, payload) in self.list(&self.root, PAYLOAD_EXT)? {
            let key = CacheKey::from_stem(stem);
            let metadata_path = self.metadata_path(&key);

            match metadata.read(&key) {
                Ok(Some(timestamp)) if timestamp >= cutoff => {
                    report.kept += 1;
                    continue;
                }
                Ok(Some(_)) => report.expired += 1,
                Ok(None) | Err(_) => report.orphaned += 1,
            }

            tracing::debug!(key = %key, "Pruning cache entry");
            remove_if_exists(&payload)?;
            remove_if_exists(&metadata_path)?;
        }

        for (stem, path) in self.list(&self.metadata_dir(), METADATA_EXT)? {
            if !self.payload_path(&CacheKey::from_stem(stem)).exists() {
                remove_if_exists(&path)?;
                report.orphaned += 1;
            }
        }

        Ok(report)
    }

    /// Lists `(file stem, path)` for files in `dir` with the given extension
    fn list(&self, dir: &Path, ext: &str) -> Result<Vec<(String, PathBuf)>, CacheError> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(ext) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                files.push((stem.to_string(), path.clone()));
            }
        }
        Ok(files)
    }
}

fn remove_if_exists(path: &Path) -> std::io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{derive_key, QueryParams};
    use tempfile::TempDir;

    fn key(code: &str) -> CacheKey {
        derive_key("pro_bar", &QueryParams::new().with("ts_code", code))
    }

    #[test]
    fn test_paths_follow_layout() {
        let dir = CacheDir::with_root("/tmp/cache-root");
        let key = key("000001.SZ");

        assert_eq!(
            dir.payload_path(&key),
            PathBuf::from(format!("/tmp/cache-root/{}.parquet", key))
        );
        assert_eq!(
            dir.metadata_path(&key),
            PathBuf::from(format!("/tmp/cache-root/metadata/{}.json", key))
        );
    }

    #[test]
    fn test_new_uses_home_directory() {
        if let Some(dir) = CacheDir::new() {
            assert!(dir.root().ends_with(DEFAULT_DIR_NAME));
        }
        // Passes if there is no home directory (e.g. some CI sandboxes)
    }

    #[test]
    fn test_stats_on_missing_root_is_empty() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let dir = CacheDir::with_root(temp_dir.path().join("absent"));
        assert_eq!(dir.stats().expect("stats"), CacheStats::default());
    }

    #[test]
    fn test_prune_removes_expired_and_orphaned_entries() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let dir = CacheDir::with_root(temp_dir.path());
        let metadata = MetadataStore::new(dir.clone());
        let now = Utc::now();

        let fresh = key("000001.SZ");
        let stale = key("000002.SZ");
        let orphan = key("000003.SZ");
        let dangling = key("000004.SZ");

        for k in [&fresh, &stale, &orphan] {
            fs::write(dir.payload_path(k), b"payload").expect("write payload");
        }
        metadata.write(&fresh, now - Duration::days(1)).expect("metadata");
        metadata.write(&stale, now - Duration::days(10)).expect("metadata");
        metadata.write(&dangling, now).expect("metadata");

        let report = dir.prune(Duration::days(7), now).expect("prune");

        assert_eq!(report.kept, 1);
        assert_eq!(report.expired, 1);
        assert_eq!(report.orphaned, 2);
        assert!(dir.payload_path(&fresh).exists());
        assert!(dir.metadata_path(&fresh).exists());
        assert!(!dir.payload_path(&stale).exists());
        assert!(!dir.metadata_path(&stale).exists());
        assert!(!dir.payload_path(&orphan).exists());
        assert!(!dir.metadata_path(&dangling).exists());

        let stats = dir.stats().expect("stats");
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.metadata_files, 1);
        assert_eq!(stats.payload_bytes, 7);
    }

    #[test]
    fn test_prune_with_age_beyond_date_range_keeps_entries() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let dir = CacheDir::with_root(temp_dir.path());
        let now = Utc::now();
        let entry = key("600000.SH");

        fs::write(dir.payload_path(&entry), b"payload").expect("write payload");
        MetadataStore::new(dir.clone())
            .write(&entry, now - Duration::days(365))
            .expect("metadata");

        let report = dir
            .prune(Duration::days(i64::from(u32::MAX)), now)
            .expect("prune");

        assert_eq!(report, PruneReport { expired: 0, orphaned: 0, kept: 1 });
        assert!(dir.payload_path(&entry).exists());
    }
}
