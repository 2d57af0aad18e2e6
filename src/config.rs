//! Runtime configuration from the environment
//!
//! `main` loads a `.env` file first (via dotenvy), so every variable here can
//! also be set there.

use std::path::PathBuf;

use thiserror::Error;

use crate::cache::CacheDir;
use crate::data::provider::{TushareClient, TUSHARE_API_URL};

/// API token for Tushare Pro
pub const TOKEN_VAR: &str = "TUSHARE_TOKEN";

/// Overrides the cache root (default `~/.tushare_parquet_cache`)
pub const CACHE_DIR_VAR: &str = "TUSHARE_CACHE_DIR";

/// Overrides the API endpoint
pub const API_URL_VAR: &str = "TUSHARE_API_URL";

/// Errors building the configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("TUSHARE_TOKEN is not set. Add TUSHARE_TOKEN=your_token to the environment or a .env file")]
    MissingToken,

    #[error("Could not determine the home directory for the cache; set TUSHARE_CACHE_DIR")]
    NoHomeDir,
}

/// Settings shared by every accessor call
#[derive(Debug, Clone)]
pub struct Config {
    /// Provider credential; only needed for remote calls
    pub token: Option<String>,
    pub cache_dir: CacheDir,
    pub api_url: String,
}

impl Config {
    /// Reads the configuration from process environment variables
    ///
    /// `cache_dir` (from `--cache-dir`) takes precedence over the environment.
    pub fn from_env(cache_dir: Option<PathBuf>) -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok(), cache_dir)
    }

    /// Reads the configuration through `lookup`; empty values count as unset
    ///
    /// The cache root is `cache_dir` if given, then `TUSHARE_CACHE_DIR`, then
    /// the home directory, which is only looked up when it is needed.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
        cache_dir: Option<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let cache_dir = match cache_dir.or_else(|| get(CACHE_DIR_VAR).map(PathBuf::from)) {
            Some(dir) => CacheDir::with_root(dir),
            None => CacheDir::new().ok_or(ConfigError::NoHomeDir)?,
        };

        Ok(Self {
            token: get(TOKEN_VAR),
            cache_dir,
            api_url: get(API_URL_VAR).unwrap_or_else(|| TUSHARE_API_URL.to_string()),
        })
    }

    /// Builds the provider client, failing if no token is configured
    pub fn client(&self) -> Result<TushareClient, ConfigError> {
        let token = self.token.as_deref().ok_or(ConfigError::MissingToken)?;
        Ok(TushareClient::new(token).with_base_url(self.api_url.clone()))
    }
}
