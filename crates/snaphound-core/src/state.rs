use std::collections::HashMap;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const STATE_FILE: &str = "state.json";
const MAX_HITS_PER_QUERY: usize = 10;

#[derive(Serialize, Deserialize, Default)]
struct PersistentStateData {
    query_hits: HashMap<String, Vec<String>>,
    directory_scores: HashMap<String, u32>,
}

/// Hits remembered across searches, keyed by normalized query.
pub(crate) struct PersistentState {
    file_path: PathBuf,
    data: PersistentStateData,
    dirty: bool,
}

impl PersistentState {
    /// Load state from `cache_dir`. Unreadable or corrupt state is logged
    /// and replaced with an empty one.
    pub fn load(cache_dir: &Path) -> Self {
        let file_path = cache_dir.join(STATE_FILE);
        let data = if file_path.exists() {
            match fs::read_to_string(&file_path) {
                Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|err| {
                    tracing::warn!(error = %err, path = %file_path.display(), "discarding corrupt search state");
                    PersistentStateData::default()
                }),
                Err(err) => {
                    tracing::warn!(error = %err, path = %file_path.display(), "failed to read search state");
                    PersistentStateData::default()
                }
            }
        } else {
            PersistentStateData::default()
        };
        Self {
            file_path,
            data,
            dirty: false,
        }
    }

    pub fn remembered(&self, query: &str, path: &Path) -> bool {
        let text = path.to_string_lossy();
        self.data
            .query_hits
            .get(query)
            .map(|paths| paths.iter().any(|p| p.as_str() == text.as_ref()))
            .unwrap_or(false)
    }

    pub fn observe<'a>(&mut self, query: &str, hits: impl IntoIterator<Item = &'a Path>) {
        let hits: Vec<&Path> = hits.into_iter().collect();
        if hits.is_empty() {
            return;
        }
        let entry = self.data.query_hits.entry(query.to_string()).or_default();
        for path in hits.iter().take(MAX_HITS_PER_QUERY) {
            let text = path.to_string_lossy().to_string();
            if !entry.contains(&text) {
                entry.push(text);
            }
        }
        if entry.len() > MAX_HITS_PER_QUERY {
            let overflow = entry.len() - MAX_HITS_PER_QUERY;
            entry.drain(..overflow);
        }

        for path in &hits {
            if let Some(dir) = path.parent().and_then(|p| p.to_str()) {
                if dir.is_empty() {
                    continue;
                }
                let counter = self
                    .data
                    .directory_scores
                    .entry(dir.to_string())
                    .or_insert(0);
                *counter = counter.saturating_add(1);
            }
        }

        self.dirty = true;
    }

    pub fn save(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let tmp_path = self.file_path.with_extension("json.tmp");
        let file = fs::File::create(&tmp_path)
            .with_context(|| format!("failed to create {}", tmp_path.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &self.data)
            .context("failed to serialize search state")?;
        writer.flush().context("failed to flush search state")?;
        drop(writer);
        fs::rename(&tmp_path, &self.file_path).with_context(|| {
            format!(
                "failed to move search state into place {}",
                self.file_path.display()
            )
        })?;
        self.dirty = false;
        Ok(())
    }
}
