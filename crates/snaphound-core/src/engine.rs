use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::json;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;

use crate::discover::walk_root;
use crate::events::{EventSink, JsonLinesSink, ResultFile, SearchEvent};
use crate::media::FileKind;
use crate::options::{EngineOptions, ResolvedOptions};
use crate::paths::{SearchRoot, expand_roots};
use crate::query::TextQuery;
use crate::state::PersistentState;
use crate::tools::rga::RgaTool;
#[cfg(feature = "indexing")]
use snaphound_indexer::{ContentIndex, IndexConfig};

const PRIORITY_BONUS: f32 = 0.25;
const REMEMBERED_BONUS: f32 = 0.1;
#[cfg(feature = "indexing")]
const INDEX_BONUS: f32 = 0.1;
#[cfg(feature = "indexing")]
const INDEX_ONLY_SCORE: f32 = 0.5;
const RGA_SCORE: f32 = 0.45;
const SEARCH_LOG_FILE: &str = "search.log.jsonl";

/// Local media and document search over a priority and a general set of
/// locations.
pub struct SnapHound {
    paths: Vec<String>,
    priority_paths: Vec<String>,
    options: EngineOptions,
    #[cfg_attr(not(feature = "indexing"), allow(dead_code))]
    index_dir: PathBuf,
    sink: Box<dyn EventSink>,
    cancel: Arc<AtomicBool>,
    state: PersistentState,
    rga_tool: Option<RgaTool>,
}

/// Raises the cancel flag of the [`SnapHound`] it was taken from.
#[derive(Clone, Debug)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

impl SnapHound {
    /// Engine with default options that reports events on stdout.
    pub fn new(paths: Vec<String>, priority_paths: Vec<String>) -> Result<Self> {
        Self::with_options(
            paths,
            priority_paths,
            EngineOptions::default(),
            JsonLinesSink::stdout(),
        )
    }

    pub fn with_options(
        paths: Vec<String>,
        priority_paths: Vec<String>,
        options: EngineOptions,
        sink: impl EventSink + 'static,
    ) -> Result<Self> {
        let ResolvedOptions {
            options,
            cache_dir,
            index_dir,
        } = options.resolve();

        let state = PersistentState::load(&cache_dir);
        let rga_tool = options
            .enable_rga
            .then(|| RgaTool::new(options.tool_timeout, options.max_results));

        tracing::debug!(
            priority = priority_paths.len(),
            general = paths.len(),
            cache_dir = %cache_dir.display(),
            "search engine ready"
        );

        Ok(Self {
            paths,
            priority_paths,
            options,
            index_dir,
            sink: Box::new(sink),
            cancel: Arc::new(AtomicBool::new(false)),
            state,
            rga_tool,
        })
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    pub fn priority_paths(&self) -> &[String] {
        &self.priority_paths
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            flag: self.cancel.clone(),
        }
    }

    /// Run one search cycle for `text` and report it through the event sink.
    ///
    /// A cancel raised before or during the cycle ends it with a
    /// `cancelled` event; the flag is cleared once the cycle returns.
    pub async fn search_with_text(&mut self, text: &str) -> Result<SearchSummary> {
        let outcome = self.run_cycle(text).await;
        self.cancel.store(false, Ordering::SeqCst);
        outcome
    }

    async fn run_cycle(&mut self, text: &str) -> Result<SearchSummary> {
        let cycle_start = Instant::now();
        let query = TextQuery::parse(text);
        let roots = expand_roots(&self.priority_paths, &self.paths, self.options.recursive);
        let mut stage_stats = StageStats {
            discover_roots: roots.len(),
            ..StageStats::default()
        };
        tracing::info!(query = query.raw(), roots = roots.len(), "search started");
        self.emit(SearchEvent::status(format!("Searching for {}", query.raw())))?;

        let mut summary = SearchSummary {
            query: query.raw().to_string(),
            terms: query.terms().to_vec(),
            roots: roots.clone(),
            hits: Vec::new(),
            scanned: 0,
            matched: 0,
            cancelled: false,
            stage_stats: StageStats::default(),
        };

        if query.is_empty() {
            tracing::info!("empty query; nothing to search");
            self.emit(SearchEvent::Completed {
                matched: 0,
                scanned: 0,
            })?;
            summary.stage_stats = stage_stats;
            return Ok(summary);
        }

        // --- Discover ---
        let discover_start = Instant::now();
        let (candidates, walked) = self.discover(&roots).await?;
        stage_stats.discover_ms = elapsed_ms(discover_start);
        stage_stats.discover_candidates = candidates.len();
        summary.scanned = candidates.len();

        // --- Probe ---
        let mut hits = Vec::new();
        if !self.is_cancelled() {
            let probe_start = Instant::now();
            hits = self.probe(&query, &candidates).await;
            stage_stats.probe_ms = elapsed_ms(probe_start);
            stage_stats.probe_hits = hits.len();
        }

        // --- Index ---
        #[cfg(feature = "indexing")]
        if self.options.enable_index && !self.is_cancelled() {
            let index_start = Instant::now();
            stage_stats.index_candidates = self.index_stage(&query, &candidates, &mut hits).await;
            stage_stats.index_ms = elapsed_ms(index_start);
        }

        // --- Rga ---
        if !self.is_cancelled() {
            if let Some(rga_tool) = self.rga_tool.clone() {
                let rga_start = Instant::now();
                let rga_hits = rga_stage(&rga_tool, &walked, query.raw(), &candidates).await;
                stage_stats.rga_hits = rga_hits.len();
                stage_stats.rga_ms = elapsed_ms(rga_start);
                hits.extend(rga_hits);
            }
        }

        if self.is_cancelled() {
            tracing::info!("search cancelled");
            self.emit(SearchEvent::Cancelled {
                message: "Search cancelled".to_string(),
            })?;
            summary.cancelled = true;
            stage_stats.cycle_latency_ms = elapsed_ms(cycle_start);
            summary.stage_stats = stage_stats;
            return Ok(summary);
        }

        // --- Rank ---
        let rank_start = Instant::now();
        let (ranked, matched) = self.rank(&query, hits);
        stage_stats.rank_ms = elapsed_ms(rank_start);
        summary.matched = matched;

        // --- Emit ---
        let emit_start = Instant::now();
        let files: Vec<ResultFile> = ranked
            .into_iter()
            .enumerate()
            .map(|(rank, hit)| hit.into_result(rank + 1))
            .collect();
        for chunk in files.chunks(self.options.chunk_size) {
            self.emit(SearchEvent::Results {
                files: chunk.to_vec(),
            })?;
        }
        self.emit(SearchEvent::Completed {
            matched,
            scanned: summary.scanned,
        })?;
        stage_stats.emit_ms = elapsed_ms(emit_start);

        // --- Persist ---
        self.state
            .observe(&query_key(&query), files.iter().map(|f| f.file_path.as_path()));
        if let Err(err) = self.state.save() {
            tracing::warn!(error = %err, "failed to persist search state");
        }

        stage_stats.cycle_latency_ms = elapsed_ms(cycle_start);
        summary.hits = files;
        summary.stage_stats = stage_stats;
        tracing::info!(
            matched = summary.matched,
            scanned = summary.scanned,
            latency_ms = summary.stage_stats.cycle_latency_ms,
            "search completed"
        );

        self.log_summary(&summary).await?;
        Ok(summary)
    }

    fn emit(&mut self, event: SearchEvent) -> Result<()> {
        self.sink.emit(&event)
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Walk every root and merge their files into one candidate list. Also
    /// returns the roots that were walked.
    async fn discover(&mut self, roots: &[SearchRoot]) -> Result<(Vec<Candidate>, Vec<SearchRoot>)> {
        let cancel = self.cancel.clone();
        let include_packed = self.rga_tool.is_some();
        let walks: Vec<_> = stream::iter(roots.iter().cloned())
            .map(|root| {
                let cancel = cancel.clone();
                async move {
                    let is_dir = tokio::fs::metadata(&root.path)
                        .await
                        .map(|meta| meta.is_dir())
                        .unwrap_or(false);
                    if !is_dir {
                        return (root, None);
                    }
                    let files = walk_root(&root, include_packed, cancel).await;
                    (root, Some(files))
                }
            })
            .buffered(self.options.concurrency)
            .collect()
            .await;

        let mut seen: HashSet<PathBuf> = HashSet::new();
        let mut candidates = Vec::new();
        let mut walked = Vec::new();
        for (root, files) in walks {
            let files = match files {
                Some(Ok(files)) => files,
                Some(Err(err)) => {
                    tracing::warn!(error = %err, root = %root.path.display(), "failed to walk search root");
                    self.emit(SearchEvent::status(format!(
                        "Skipping {}: {err}",
                        root.path.display()
                    )))?;
                    continue;
                }
                None => {
                    tracing::warn!(root = %root.path.display(), "search root is not a directory");
                    self.emit(SearchEvent::status(format!(
                        "Skipping {}: not a directory",
                        root.path.display()
                    )))?;
                    continue;
                }
            };
            self.emit(SearchEvent::status(format!(
                "Fetching data from: {}",
                root.path.display()
            )))?;
            for file in files {
                if seen.insert(file.path.clone()) {
                    candidates.push(Candidate {
                        path: file.path,
                        kind: file.kind,
                        packed: file.packed,
                        priority: root.priority,
                    });
                }
            }
            walked.push(root);
        }
        Ok((candidates, walked))
    }

    async fn probe(&self, query: &TextQuery, candidates: &[Candidate]) -> Vec<Hit> {
        let semaphore = Arc::new(Semaphore::new(self.options.concurrency));
        let query = Arc::new(query.clone());
        let max_file_bytes = self.options.max_file_bytes;
        let mut workers = JoinSet::new();

        for candidate in candidates.iter().cloned() {
            let semaphore = semaphore.clone();
            let cancel = self.cancel.clone();
            let query = query.clone();
            workers.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return None;
                };
                if cancel.load(Ordering::Relaxed) {
                    return None;
                }
                score_candidate(&query, candidate, max_file_bytes).await
            });
        }

        let mut hits = Vec::new();
        while let Some(res) = workers.join_next().await {
            match res {
                Ok(Some(hit)) => hits.push(hit),
                Ok(None) => {}
                Err(join_err) => {
                    tracing::warn!(error = %join_err, "probe worker failed");
                }
            }
        }
        hits
    }

    #[cfg(feature = "indexing")]
    async fn index_stage(
        &self,
        query: &TextQuery,
        candidates: &[Candidate],
        hits: &mut Vec<Hit>,
    ) -> usize {
        let max_results = self.options.max_results;
        let config = IndexConfig {
            index_dir: self.index_dir.clone(),
            files: candidates.iter().map(|c| c.path.clone()).collect(),
            max_file_bytes: self.options.max_file_bytes,
        };
        // reopened every cycle; the indexer rebuilds when the files changed
        let index = match ContentIndex::open_or_build(config).await {
            Ok(index) => index,
            Err(err) => {
                tracing::warn!(error = %err, "failed to initialize content index");
                return 0;
            }
        };
        let found = match index.search(query.raw(), max_results).await {
            Ok(found) => found,
            Err(err) => {
                tracing::warn!(error = %err, "content index search failed");
                return 0;
            }
        };

        let known: HashMap<&Path, &Candidate> =
            candidates.iter().map(|c| (c.path.as_path(), c)).collect();
        let mut used = 0;
        for path in &found {
            // the index may predate the current roots
            let Some(candidate) = known.get(path.as_path()) else {
                continue;
            };
            used += 1;
            if let Some(existing) = hits.iter_mut().find(|h| &h.path == path) {
                existing.score += INDEX_BONUS;
            } else {
                hits.push(Hit {
                    path: candidate.path.clone(),
                    kind: candidate.kind,
                    score: INDEX_ONLY_SCORE,
                    origin: HitOrigin::Index,
                    line: None,
                    snippet: None,
                    priority: candidate.priority,
                });
            }
        }
        used
    }

    /// Deduplicate, apply ranking bonuses and keep the best `max_results`.
    /// Also returns the number of distinct hits before truncation.
    fn rank(&self, query: &TextQuery, hits: Vec<Hit>) -> (Vec<Hit>, usize) {
        let key = query_key(query);
        let mut dedup: HashMap<PathBuf, Hit> = HashMap::new();
        for hit in hits {
            dedup
                .entry(hit.path.clone())
                .and_modify(|existing| {
                    if hit.score > existing.score {
                        *existing = hit.clone();
                    }
                })
                .or_insert(hit);
        }

        let mut ranked: Vec<Hit> = dedup
            .into_values()
            .map(|mut hit| {
                if hit.priority {
                    hit.score += PRIORITY_BONUS;
                }
                if self.state.remembered(&key, &hit.path) {
                    hit.score += REMEMBERED_BONUS;
                }
                hit
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.path.cmp(&b.path))
        });

        let matched = ranked.len();
        ranked.truncate(self.options.max_results);
        (ranked, matched)
    }

    async fn log_summary(&self, summary: &SearchSummary) -> Result<()> {
        let Some(dir) = &self.options.log_dir else {
            return Ok(());
        };

        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("failed to create log directory {}", dir.display()))?;

        let log_path = dir.join(SEARCH_LOG_FILE);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .await
            .with_context(|| format!("failed to open log file {}", log_path.display()))?;

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64();

        let entry = json!({
            "timestamp": timestamp,
            "query": summary.query,
            "priority_paths": self.priority_paths,
            "paths": self.paths,
            "enable_index": self.options.enable_index,
            "enable_rga": self.options.enable_rga,
            "summary": summary,
        });

        let mut line = serde_json::to_vec(&entry)?;
        line.push(b'\n');
        file.write_all(&line).await?;

        Ok(())
    }
}

async fn score_candidate(query: &TextQuery, candidate: Candidate, max_file_bytes: u64) -> Option<Hit> {
    let name_score = query.score_name(&candidate.path);
    let content = if candidate.kind.has_text() && !candidate.packed {
        match read_prefix(&candidate.path, max_file_bytes).await {
            Ok(text) => query.score_content(&text),
            Err(err) => {
                tracing::warn!(error = %err, path = %candidate.path.display(), "skipping unreadable file");
                return None;
            }
        }
    } else {
        None
    };

    let mut hit = Hit {
        path: candidate.path,
        kind: candidate.kind,
        score: name_score,
        origin: HitOrigin::Name,
        line: None,
        snippet: None,
        priority: candidate.priority,
    };
    if let Some(content) = content {
        if content.score > hit.score {
            hit.score = content.score;
            hit.origin = HitOrigin::Content;
        }
        hit.line = content.line;
        hit.snippet = content.snippet;
    }

    (hit.score > 0.0).then_some(hit)
}

async fn read_prefix(path: &Path, limit: u64) -> Result<String> {
    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("failed to open {}", path.display()))?;
    let mut buffer = Vec::new();
    file.take(limit)
        .read_to_end(&mut buffer)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

async fn rga_stage(
    tool: &RgaTool,
    roots: &[SearchRoot],
    query: &str,
    candidates: &[Candidate],
) -> Vec<Hit> {
    let known: HashMap<&Path, &Candidate> =
        candidates.iter().map(|c| (c.path.as_path(), c)).collect();
    let mut hits = Vec::new();
    for root in roots {
        let matches = match tool.search(&root.path, query, root.recursive).await {
            Ok(matches) => matches,
            Err(err) => {
                tracing::warn!(error = %err, root = %root.path.display(), "rga search failed");
                continue;
            }
        };
        for m in matches {
            // only files discovery accepted are reportable
            let Some(candidate) = known.get(m.path.as_path()) else {
                continue;
            };
            hits.push(Hit {
                path: candidate.path.clone(),
                kind: candidate.kind,
                score: RGA_SCORE,
                origin: HitOrigin::Rga,
                line: m.line_number,
                snippet: Some(m.lines.trim().to_string()),
                priority: candidate.priority,
            });
        }
    }
    hits
}

fn query_key(query: &TextQuery) -> String {
    query.terms().join(" ")
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

fn round_two(value: f32) -> f32 {
    (value * 100.0).round() / 100.0
}

#[derive(Clone, Debug)]
struct Candidate {
    path: PathBuf,
    kind: FileKind,
    packed: bool,
    priority: bool,
}

#[derive(Clone, Debug)]
struct Hit {
    path: PathBuf,
    kind: FileKind,
    score: f32,
    origin: HitOrigin,
    line: Option<usize>,
    snippet: Option<String>,
    priority: bool,
}

impl Hit {
    fn into_result(self, id: usize) -> ResultFile {
        ResultFile {
            id,
            file_path: self.path,
            kind: self.kind,
            score: round_two(self.score),
            origin: self.origin.as_str().to_string(),
            line: self.line,
            snippet: self.snippet,
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum HitOrigin {
    Name,
    Content,
    #[cfg(feature = "indexing")]
    Index,
    Rga,
}

impl HitOrigin {
    fn as_str(&self) -> &'static str {
        match self {
            HitOrigin::Name => "name",
            HitOrigin::Content => "content",
            #[cfg(feature = "indexing")]
            HitOrigin::Index => "index",
            HitOrigin::Rga => "rga",
        }
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct StageStats {
    pub discover_roots: usize,
    pub discover_candidates: usize,
    pub discover_ms: u64,
    pub probe_hits: usize,
    pub probe_ms: u64,
    pub index_candidates: usize,
    #[serde(skip_serializing_if = "is_zero")]
    pub index_ms: u64,
    pub rga_hits: usize,
    #[serde(skip_serializing_if = "is_zero")]
    pub rga_ms: u64,
    pub rank_ms: u64,
    pub emit_ms: u64,
    pub cycle_latency_ms: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct SearchSummary {
    pub query: String,
    pub terms: Vec<String>,
    pub roots: Vec<SearchRoot>,
    pub hits: Vec<ResultFile>,
    /// Files of a known kind found under the roots.
    pub scanned: usize,
    /// Distinct hits before truncation to `max_results`.
    pub matched: usize,
    pub cancelled: bool,
    pub stage_stats: StageStats,
}

fn is_zero(value: &u64) -> bool {
    *value == 0
}
