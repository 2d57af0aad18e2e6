//! Cache key derivation
//!
//! A cache key is a SHA-256 digest over the operation name and the query
//! parameters in key order. Parameter values are stored as strings, so two
//! values that render the same (`1` and `"1"`) share a key.

use std::collections::btree_map::{BTreeMap, Iter};
use std::fmt;

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Query parameters for a single accessor call
///
/// Keys are kept sorted so iteration order is the hashing order. Absent
/// values are never stored: use [`QueryParams::insert_opt`] to skip `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct QueryParams {
    inner: BTreeMap<String, String>,
}

impl QueryParams {
    /// Creates an empty parameter set
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.insert(key, value);
        self
    }

    /// Builder-style insert that skips `None`
    pub fn with_opt<V: ToString>(mut self, key: impl Into<String>, value: Option<V>) -> Self {
        self.insert_opt(key, value);
        self
    }

    /// Inserts a parameter, replacing any previous value for the key
    pub fn insert(&mut self, key: impl Into<String>, value: impl ToString) {
        self.inner.insert(key.into(), value.to_string());
    }

    /// Inserts a parameter only when a value is present
    pub fn insert_opt<V: ToString>(&mut self, key: impl Into<String>, value: Option<V>) {
        if let Some(value) = value {
            self.insert(key, value);
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.inner.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.inner.remove(key)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Iterates parameters in lexicographic key order
    pub fn iter(&self) -> Iter<'_, String, String> {
        self.inner.iter()
    }
}

impl<K: Into<String>, V: ToString> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = QueryParams::new();
        for (key, value) in iter {
            params.insert(key, value);
        }
        params
    }
}

impl<'a> IntoIterator for &'a QueryParams {
    type Item = (&'a String, &'a String);
    type IntoIter = Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.iter()
    }
}

/// Fixed-width hex identifier for a cache entry
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Rebuilds a key from a cache file name without its extension
    pub(crate) fn from_stem(stem: impl Into<String>) -> Self {
        Self(stem.into())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derives the cache key for an operation and its parameters
///
/// Fields are fed to the hasher back to back with no separators: the
/// operation name, then each key followed by its value.
pub fn derive_key(operation: &str, params: &QueryParams) -> CacheKey {
    let mut hasher = Sha256::new();
    hasher.update(operation.as_bytes());
    for (key, value) in params {
        hasher.update(key.as_bytes());
        hasher.update(value.as_bytes());
    }
    CacheKey(hex::encode(hasher.finalize()))
}
