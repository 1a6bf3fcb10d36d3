use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use ignore::WalkBuilder;
use tokio::task;

use crate::media::{FileKind, is_packed_document};
use crate::paths::SearchRoot;

/// A file kept by discovery.
#[derive(Clone, Debug)]
pub(crate) struct Discovered {
    pub path: PathBuf,
    pub kind: FileKind,
    /// Only readable through an rga adapter.
    pub packed: bool,
}

/// Files of a known kind directly under (or, when recursive, anywhere below)
/// `root`, sorted by path. Packed documents are kept when `include_packed`.
pub(crate) async fn walk_root(
    root: &SearchRoot,
    include_packed: bool,
    cancel: Arc<AtomicBool>,
) -> Result<Vec<Discovered>> {
    let path = root.path.clone();
    let recursive = root.recursive;

    task::spawn_blocking(move || {
        let mut walker = WalkBuilder::new(&path);
        walker
            .hidden(false)
            .follow_links(false)
            .standard_filters(false)
            .max_depth(if recursive { None } else { Some(1) });

        let mut files = Vec::new();
        for result in walker.build() {
            if cancel.load(Ordering::Relaxed) {
                break;
            }
            let entry = match result {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::warn!(error = %err, "failed to read entry during discovery");
                    continue;
                }
            };
            if !entry.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
                continue;
            }
            let kind = FileKind::of(entry.path());
            if kind.is_known() {
                files.push(Discovered {
                    path: entry.into_path(),
                    kind,
                    packed: false,
                });
            } else if include_packed && is_packed_document(entry.path()) {
                files.push(Discovered {
                    path: entry.into_path(),
                    kind: FileKind::Document,
                    packed: true,
                });
            }
        }
        files.sort_by(|a, b| a.path.cmp(&b.path));
        files
    })
    .await
    .context("discovery task cancelled")
}
