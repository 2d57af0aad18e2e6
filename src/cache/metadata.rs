//! Per-key fetch timestamps stored as small JSON files

use std::fs;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::{CacheDir, CacheError, CacheKey};

/// Contents of a metadata file
#[derive(Debug, Serialize, Deserialize)]
struct Metadata {
    /// When the payload was fetched, ISO-8601
    timestamp: String,
}

/// Reads and writes `<root>/metadata/<key>.json`
#[derive(Debug, Clone)]
pub struct MetadataStore {
    dir: CacheDir,
}

impl MetadataStore {
    pub fn new(dir: CacheDir) -> Self {
        Self { dir }
    }

    /// Records the fetch time for a key, replacing any previous record
    pub fn write(&self, key: &CacheKey, timestamp: DateTime<Utc>) -> Result<(), CacheError> {
        fs::create_dir_all(self.dir.metadata_dir())?;

        let metadata = Metadata {
            timestamp: timestamp.to_rfc3339(),
        };
        let json = serde_json::to_string(&metadata)?;
        fs::write(self.dir.metadata_path(key), json)?;
        Ok(())
    }

    /// Reads the fetch time for a key
    ///
    /// # Returns
    /// * `Ok(None)` if there is no metadata file for the key
    /// * `Ok(Some(timestamp))` if the file parses
    /// * `Err` if the file cannot be read or its contents are malformed
    pub fn read(&self, key: &CacheKey) -> Result<Option<DateTime<Utc>>, CacheError> {
        let content = match fs::read_to_string(self.dir.metadata_path(key)) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let metadata: Metadata = serde_json::from_str(&content)?;
        parse_timestamp(&metadata.timestamp).map(Some)
    }
}

/// Parses an ISO-8601 timestamp
///
/// Accepts RFC 3339 with an offset, and naive local times such as
/// `2024-07-15T09:30:00.123456` as written by Python's `datetime.isoformat()`.
pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, CacheError> {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(value) {
        return Ok(timestamp.with_timezone(&Utc));
    }

    let naive = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .map_err(|_| CacheError::InvalidTimestamp(value.to_string()))?;

    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| CacheError::InvalidTimestamp(value.to_string()))
}
