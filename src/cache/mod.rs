//! Disk cache for tabular API results
//!
//! Each cache entry is a pair of files under one root directory: a parquet
//! payload named by the cache key and a small JSON metadata file recording when
//! the payload was fetched. [`CachedFetcher`] ties the pieces together and
//! decides between serving from disk and calling the remote source.

mod fetcher;
mod key;
mod layout;
mod metadata;
mod table;
mod ttl;

use thiserror::Error;

pub use fetcher::CachedFetcher;
pub use key::{derive_key, CacheKey, QueryParams};
pub use layout::{CacheDir, CacheStats, PruneReport};
pub use metadata::MetadataStore;
pub use table::TableStore;
pub use ttl::{Clock, ManualClock, SystemClock, TtlValidator};

/// Errors raised by the cache stores
///
/// These never reach accessor callers: the fetcher treats read failures as a
/// miss and write failures as a skipped write.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Filesystem operation failed
    #[error("Cache I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Metadata file is not valid JSON
    #[error("Invalid cache metadata: {0}")]
    Metadata(#[from] serde_json::Error),

    /// Parquet payload could not be written or read
    #[error("Parquet error: {0}")]
    Parquet(#[from] polars::error::PolarsError),

    /// Metadata timestamp is not ISO-8601
    #[error("Invalid timestamp in cache metadata: {0}")]
    InvalidTimestamp(String),
}
