use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use snaphound::{ConfigFile, EngineOptions};

/// Top-level CLI definition for snaphound-search.
///
/// The two positionals are optional at the clap level so that a short
/// argument list reaches the dispatcher, which owns the usage message.
#[derive(Parser, Debug)]
#[command(name = "snaphound-search")]
#[command(about = "Search local images, videos and documents for \"The END\"", long_about = None)]
pub struct Cli {
    /// JSON array of priority paths; searched first and ranked higher.
    pub priority_paths_json: Option<String>,

    /// JSON array of paths to search.
    pub paths_json: Option<String>,

    /// Anything after the two positionals is accepted and ignored.
    #[arg(hide = true, trailing_var_arg = true)]
    pub extra: Vec<String>,

    #[command(flatten)]
    pub engine: EngineArgs,
}

/// Engine tuning flags. Unset flags fall back to the config file, then to
/// the engine defaults.
#[derive(clap::Args, Debug, Default, Clone)]
pub struct EngineArgs {
    /// JSON config file; defaults to `$TMPDIR/snaphound/config.json` when present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Descend into subdirectories of every path, not only those ending in `/*`.
    #[arg(long, default_value_t = false)]
    pub recursive: bool,

    /// Maximum number of ranked files to report.
    #[arg(long)]
    pub max_results: Option<usize>,

    /// Number of files per `results` event.
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Maximum number of files probed concurrently.
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Enable the tantivy-backed content index.
    #[arg(long, default_value_t = false)]
    pub enable_index: bool,

    /// Override the content index directory.
    #[arg(long)]
    pub index_dir: Option<PathBuf>,

    /// Fall back to ripgrep-all when nothing else matches.
    #[arg(long, default_value_t = false)]
    pub enable_rga: bool,

    /// Directory used to persist search state.
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Append a JSON summary of every search to `<dir>/search.log.jsonl`.
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Print the final search summary after the event stream.
    #[arg(long, default_value_t = false)]
    pub summary: bool,
}

impl EngineArgs {
    /// Resolve engine options: defaults, then the config file, then flags.
    pub fn to_options(&self) -> Result<EngineOptions> {
        let file = ConfigFile::discover(self.config.as_deref())?;
        let mut options = EngineOptions::default().merge_file(&file);

        if self.recursive {
            options.recursive = true;
        }
        if let Some(max_results) = self.max_results {
            options.max_results = max_results;
        }
        if let Some(chunk_size) = self.chunk_size {
            options.chunk_size = chunk_size;
        }
        if let Some(concurrency) = self.concurrency {
            options.concurrency = concurrency;
        }
        if self.enable_index {
            options.enable_index = true;
        }
        if self.enable_rga {
            options.enable_rga = true;
        }
        if self.index_dir.is_some() {
            options.index_dir = self.index_dir.clone();
        }
        if self.cache_dir.is_some() {
            options.cache_dir = self.cache_dir.clone();
        }
        if self.log_dir.is_some() {
            options.log_dir = self.log_dir.clone();
        }
        Ok(options)
    }
}
