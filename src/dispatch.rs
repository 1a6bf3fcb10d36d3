use std::future::Future;

use snaphound::{SearchSummary, SnapHound};
use thiserror::Error;

/// The one query every invocation runs.
pub const SEARCH_QUERY: &str = "The END";

pub const USAGE: &str = "Usage: snaphound-search <priority_paths_json> <paths_json>";

/// Exit code when the positionals are missing.
pub const EXIT_USAGE: u8 = 1;
/// Exit code of a search ended by an interrupt.
pub const EXIT_CANCELLED: u8 = 130;

/// Failures surfaced by [`dispatch`].
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Fewer than two positional arguments, or nothing to search.
    #[error("missing arguments")]
    MissingArguments,
    /// A positional argument is not a JSON array of path strings.
    #[error("argument {position} ({name}) is not a JSON array of paths")]
    MalformedInput {
        position: usize,
        name: &'static str,
        #[source]
        source: serde_json::Error,
    },
    /// Engine construction or search failed.
    #[error(transparent)]
    Engine(#[from] anyhow::Error),
}

/// Decoded positional arguments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invocation {
    pub priority_paths: Vec<String>,
    pub paths: Vec<String>,
}

impl Invocation {
    /// Decode both positionals in order. The second is only decoded once
    /// the first succeeded.
    pub fn decode(
        priority_paths_json: Option<&str>,
        paths_json: Option<&str>,
    ) -> Result<Self, DispatchError> {
        let (Some(priority_paths_json), Some(paths_json)) = (priority_paths_json, paths_json) else {
            return Err(DispatchError::MissingArguments);
        };

        let priority_paths = decode_paths(priority_paths_json, 1, "priority_paths")?;
        let paths = decode_paths(paths_json, 2, "paths")?;
        if priority_paths.is_empty() && paths.is_empty() {
            return Err(DispatchError::MissingArguments);
        }

        Ok(Self {
            priority_paths,
            paths,
        })
    }
}

fn decode_paths(raw: &str, position: usize, name: &'static str) -> Result<Vec<String>, DispatchError> {
    serde_json::from_str(raw).map_err(|source| DispatchError::MalformedInput {
        position,
        name,
        source,
    })
}

/// Process exit code for a finished search.
pub fn exit_code(summary: &SearchSummary) -> u8 {
    if summary.cancelled { EXIT_CANCELLED } else { 0 }
}

/// A search engine handle the dispatcher can drive.
pub trait TextSearch {
    type Output;

    fn search_with_text(&mut self, query: &str) -> impl Future<Output = anyhow::Result<Self::Output>>;
}

impl TextSearch for SnapHound {
    type Output = SearchSummary;

    fn search_with_text(&mut self, query: &str) -> impl Future<Output = anyhow::Result<SearchSummary>> {
        SnapHound::search_with_text(self, query)
    }
}

/// Decode the positionals, build the engine with `build(paths, priority_paths)`
/// and run [`SEARCH_QUERY`] exactly once.
///
/// `build` is never called when decoding fails.
pub async fn dispatch<E, F>(
    priority_paths_json: Option<&str>,
    paths_json: Option<&str>,
    build: F,
) -> Result<E::Output, DispatchError>
where
    E: TextSearch,
    F: FnOnce(Vec<String>, Vec<String>) -> anyhow::Result<E>,
{
    let Invocation {
        priority_paths,
        paths,
    } = Invocation::decode(priority_paths_json, paths_json)?;

    tracing::debug!(
        priority = priority_paths.len(),
        general = paths.len(),
        "dispatching search"
    );
    let mut engine = build(paths, priority_paths)?;
    let output = engine.search_with_text(SEARCH_QUERY).await?;
    Ok(output)
}
