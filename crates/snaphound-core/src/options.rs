use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

const APP_DIR: &str = "snaphound";
const CONFIG_FILE: &str = "config.json";

/// Tunables for a [`crate::SnapHound`] search.
#[derive(Clone, Debug)]
pub struct EngineOptions {
    /// Descend into subdirectories of every root, not just roots marked `/*`.
    pub recursive: bool,
    pub max_results: usize,
    /// Number of files per `results` event.
    pub chunk_size: usize,
    pub concurrency: usize,
    /// Document content beyond this many bytes is not scanned.
    pub max_file_bytes: u64,
    pub enable_index: bool,
    pub index_dir: Option<PathBuf>,
    pub enable_rga: bool,
    pub cache_dir: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
    pub tool_timeout: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            recursive: false,
            max_results: 50,
            chunk_size: 10,
            concurrency: 8,
            max_file_bytes: 1024 * 1024,
            enable_index: false,
            index_dir: None,
            enable_rga: false,
            cache_dir: None,
            log_dir: None,
            tool_timeout: Duration::from_secs(10),
        }
    }
}

impl EngineOptions {
    /// Overlay values from a config file onto these options.
    pub fn merge_file(mut self, file: &ConfigFile) -> Self {
        if let Some(recursive) = file.recursive {
            self.recursive = recursive;
        }
        if let Some(max_results) = file.max_results {
            self.max_results = max_results;
        }
        if let Some(chunk_size) = file.chunk_size {
            self.chunk_size = chunk_size;
        }
        if let Some(concurrency) = file.concurrency {
            self.concurrency = concurrency;
        }
        if let Some(max_file_bytes) = file.max_file_bytes {
            self.max_file_bytes = max_file_bytes;
        }
        if let Some(enable_index) = file.enable_index {
            self.enable_index = enable_index;
        }
        if let Some(enable_rga) = file.enable_rga {
            self.enable_rga = enable_rga;
        }
        self
    }

    /// Clamp counts and fill in derived directories.
    pub(crate) fn resolve(mut self) -> ResolvedOptions {
        self.max_results = usize::max(1, self.max_results);
        self.chunk_size = usize::max(1, self.chunk_size);
        self.concurrency = usize::max(1, self.concurrency);

        if self.enable_index && !cfg!(feature = "indexing") {
            tracing::warn!("indexing support not compiled; ignoring enable_index");
            self.enable_index = false;
        }

        let cache_dir = self.cache_dir.clone().unwrap_or_else(default_app_dir);
        let index_dir = self
            .index_dir
            .clone()
            .unwrap_or_else(|| cache_dir.join("index"));
        ResolvedOptions {
            cache_dir,
            index_dir,
            options: self,
        }
    }
}

pub(crate) struct ResolvedOptions {
    pub options: EngineOptions,
    pub cache_dir: PathBuf,
    pub index_dir: PathBuf,
}

/// On-disk engine configuration. Keys the engine does not know about are
/// ignored so the desktop app's config file can be shared.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ConfigFile {
    pub recursive: Option<bool>,
    pub max_results: Option<usize>,
    pub chunk_size: Option<usize>,
    pub concurrency: Option<usize>,
    pub max_file_bytes: Option<u64>,
    pub enable_index: Option<bool>,
    pub enable_rga: Option<bool>,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    /// Load the config from `explicit`, or from the default location when it
    /// exists. A missing default file yields an empty config.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load(path),
            None => {
                let default_path = default_config_path();
                if default_path.is_file() {
                    Self::load(&default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }
}

/// Per-user scratch directory shared with the desktop app.
pub fn default_app_dir() -> PathBuf {
    std::env::temp_dir().join(APP_DIR)
}

pub fn default_config_path() -> PathBuf {
    default_app_dir().join(CONFIG_FILE)
}
