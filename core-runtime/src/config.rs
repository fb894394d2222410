//! # Panel Configuration Module
//!
//! Builder-validated settings for a publish-browser engine instance.
//!
//! ## Overview
//!
//! A host constructs one `PanelConfig` per engine and passes it in together
//! with the bridge implementations. Validation is fail-fast: a config that
//! builds is a config the engine can run with.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::config::PanelConfig;
//!
//! let config = PanelConfig::builder()
//!     .cache_root("/tmp/publish-browser")
//!     .http_timeout_secs(20)
//!     .build()
//!     .expect("Failed to build config");
//! # assert_eq!(config.http_timeout_secs, 20);
//! ```

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Configuration for one publish-browser engine instance.
#[derive(Debug, Clone)]
pub struct PanelConfig {
    /// Root directory for all on-disk caches (tree caches, thumbnails).
    /// Defaults to a subdirectory of the process temp directory.
    pub cache_root: PathBuf,

    /// Number of thumbnail paths kept in the in-memory LRU index.
    pub thumbnail_index_entries: usize,

    /// Timeout for individual HTTP operations (seconds).
    pub http_timeout_secs: u64,

    /// Buffer size of the panel event bus.
    pub event_buffer: usize,
}

impl PanelConfig {
    /// Create a builder pre-populated with defaults.
    pub fn builder() -> PanelConfigBuilder {
        PanelConfigBuilder::default()
    }

    fn default_cache_root() -> PathBuf {
        std::env::temp_dir().join("publish-browser")
    }
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            cache_root: Self::default_cache_root(),
            thumbnail_index_entries: 512,
            http_timeout_secs: 30,
            event_buffer: crate::events::DEFAULT_EVENT_BUFFER_SIZE,
        }
    }
}

/// Builder for [`PanelConfig`] with fail-fast validation.
#[derive(Debug, Default)]
pub struct PanelConfigBuilder {
    cache_root: Option<PathBuf>,
    thumbnail_index_entries: Option<usize>,
    http_timeout_secs: Option<u64>,
    event_buffer: Option<usize>,
}

impl PanelConfigBuilder {
    pub fn cache_root(mut self, path: impl AsRef<Path>) -> Self {
        self.cache_root = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn thumbnail_index_entries(mut self, entries: usize) -> Self {
        self.thumbnail_index_entries = Some(entries);
        self
    }

    pub fn http_timeout_secs(mut self, secs: u64) -> Self {
        self.http_timeout_secs = Some(secs);
        self
    }

    pub fn event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = Some(capacity);
        self
    }

    /// Validate and build the config.
    pub fn build(self) -> Result<PanelConfig> {
        let defaults = PanelConfig::default();
        let config = PanelConfig {
            cache_root: self.cache_root.unwrap_or(defaults.cache_root),
            thumbnail_index_entries: self
                .thumbnail_index_entries
                .unwrap_or(defaults.thumbnail_index_entries),
            http_timeout_secs: self.http_timeout_secs.unwrap_or(defaults.http_timeout_secs),
            event_buffer: self.event_buffer.unwrap_or(defaults.event_buffer),
        };

        if config.cache_root.as_os_str().is_empty() {
            return Err(Error::Config("cache_root must not be empty".to_string()));
        }
        if config.thumbnail_index_entries == 0 {
            return Err(Error::Config(
                "thumbnail_index_entries must be greater than zero".to_string(),
            ));
        }
        if config.http_timeout_secs == 0 {
            return Err(Error::Config(
                "http_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if config.event_buffer == 0 {
            return Err(Error::Config(
                "event_buffer must be greater than zero".to_string(),
            ));
        }

        Ok(config)
    }
}
