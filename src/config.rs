//! Relay configuration, read from TOML.
//!
//! Every key is optional:
//!
//! ```toml
//! [site]
//! boards = "http://boards.endoftheinter.net"
//! archives = "http://archives.endoftheinter.net"
//!
//! [client]
//! request_interval_ms = 1000
//!
//! [cache]
//! backend = "file"
//! directory = "/var/cache/etirelay"
//! commit = "detached"
//!
//! [bookmarks]
//! ttl_secs = 86400
//! sweep_secs = 3600
//! fallback_query = "LUE"
//! ```

use std::{path::Path, time::Duration};

use serde::Deserialize;

use crate::{result::Result, site::Site};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Remote hosts and markers.
    pub site: Site,
    /// HTTP client behaviour.
    pub client: ClientConfig,
    /// Thread cache backend.
    pub cache: CacheConfig,
    /// Bookmark cache lifetimes.
    pub bookmarks: BookmarkConfig,
}

impl Config {
    /// Parses a configuration document.
    ///
    /// # Errors
    ///
    /// Fails if the document is not valid TOML or a key has the wrong type.
    pub fn from_toml(doc: &str) -> Result<Self> {
        toml::from_str(doc).map_err(Into::into)
    }

    /// Reads and parses a configuration file.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or parsed.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let doc = tokio::fs::read_to_string(path.as_ref()).await?;
        log::debug!("loaded config from {}", path.as_ref().display());
        Self::from_toml(&doc)
    }
}

/// HTTP client settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Minimum spacing between two outgoing requests, in milliseconds.
    pub request_interval_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            request_interval_ms: 1000,
        }
    }
}

impl ClientConfig {
    /// The request spacing as a [`Duration`].
    pub fn request_interval(&self) -> Duration {
        Duration::from_millis(self.request_interval_ms.max(1))
    }
}

/// Which store backs the thread cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// No store; every request is cold.
    None,
    /// Process-local map.
    #[default]
    Memory,
    /// One JSON document per thread under [`CacheConfig::directory`].
    File,
}

/// How a merged thread reaches the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitMode {
    /// Spawn the write and let the response go out without it.
    #[default]
    Detached,
    /// Await the write before returning.
    Inline,
}

/// Thread cache settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Store implementation.
    pub backend: Backend,
    /// Directory for the file backend.
    pub directory: Option<String>,
    /// Commit strategy.
    pub commit: CommitMode,
}

/// Bookmark cache settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BookmarkConfig {
    /// Lifetime of a cached bookmark list.
    pub ttl_secs: u64,
    /// Interval between sweeps of expired entries.
    pub sweep_secs: u64,
    /// Listing fetched to harvest bookmarks on a cache miss.
    pub fallback_query: String,
}

impl Default for BookmarkConfig {
    fn default() -> Self {
        BookmarkConfig {
            ttl_secs: 24 * 60 * 60,
            sweep_secs: 60 * 60,
            fallback_query: String::from("LUE"),
        }
    }
}

impl BookmarkConfig {
    /// Entry lifetime.
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    /// Sweep period.
    pub fn sweep(&self) -> Duration {
        Duration::from_secs(self.sweep_secs.max(1))
    }
}
