use std::path::PathBuf;

use serde::Serialize;

const RECURSIVE_MARKER: &str = "/*";

/// A directory the engine walks, after `~` and `/*` expansion.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SearchRoot {
    pub path: PathBuf,
    pub recursive: bool,
    pub priority: bool,
}

/// Expand priority and general path strings into an ordered root list.
///
/// Priority roots come first. A general root equal to an already listed
/// root is dropped.
pub fn expand_roots(priority_paths: &[String], paths: &[String], recursive: bool) -> Vec<SearchRoot> {
    let mut roots: Vec<SearchRoot> = Vec::new();
    let tagged = priority_paths
        .iter()
        .map(|p| (p, true))
        .chain(paths.iter().map(|p| (p, false)));

    for (raw, priority) in tagged {
        let Some(mut root) = expand_path(raw) else {
            continue;
        };
        root.recursive |= recursive;
        root.priority = priority;
        if let Some(existing) = roots.iter_mut().find(|r| r.path == root.path) {
            // same directory listed twice; keep the first and widen its depth
            existing.recursive |= root.recursive;
            continue;
        }
        roots.push(root);
    }
    roots
}

/// Expand a single path string. Returns `None` for blank input.
pub fn expand_path(raw: &str) -> Option<SearchRoot> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let (text, recursive) = match trimmed.strip_suffix(RECURSIVE_MARKER) {
        Some(rest) if !rest.is_empty() => (rest, true),
        Some(_) => ("/", true),
        None => (trimmed, false),
    };

    let path = match text.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(text)),
        None if text == "~" => dirs::home_dir().unwrap_or_else(|| PathBuf::from(text)),
        None => PathBuf::from(text),
    };

    Some(SearchRoot {
        path,
        recursive,
        priority: false,
    })
}
