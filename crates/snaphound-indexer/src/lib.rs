use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use anyhow::{Context, Result};
use tantivy::collector::TopDocs;
use tantivy::directory::MmapDirectory;
use tantivy::schema::{STORED, Schema, SchemaBuilder, TEXT};
use tantivy::{Index, IndexReader, ReloadPolicy};
use tokio::task;

const INDEX_FILENAME: &str = "meta.json";
/// Size, mtime and path of every indexed file, one per line.
const MANIFEST_FILENAME: &str = "files.manifest";
const WRITER_HEAP_BYTES: usize = 50_000_000;

/// Full-text index over the documents discovered by a search.
#[derive(Clone)]
pub struct ContentIndex {
    reader: IndexReader,
    query_parser: tantivy::query::QueryParser,
    path_field: tantivy::schema::Field,
}

#[derive(Clone, Debug)]
pub struct IndexConfig {
    pub index_dir: PathBuf,
    /// Files the index must cover. A different set, or a changed file,
    /// triggers a rebuild.
    pub files: Vec<PathBuf>,
    /// Files larger than this are indexed by name only.
    pub max_file_bytes: u64,
}

impl ContentIndex {
    /// Open the index at `index_dir`. It is (re)built from `files` when no
    /// committed index exists there yet or when the files it was built from
    /// no longer match `files`.
    pub async fn open_or_build(config: IndexConfig) -> Result<Self> {
        let IndexConfig {
            index_dir,
            files,
            max_file_bytes,
        } = config;

        let schema = build_schema();
        fs::create_dir_all(&index_dir)
            .with_context(|| format!("failed to create index directory {}", index_dir.display()))?;
        let manifest = {
            let files = files.clone();
            task::spawn_blocking(move || build_manifest(&files))
                .await
                .context("index manifest task cancelled")?
        };
        let manifest_path = index_dir.join(MANIFEST_FILENAME);
        let stored = fs::read_to_string(&manifest_path).ok();
        let needs_build =
            !index_dir.join(INDEX_FILENAME).exists() || stored.as_deref() != Some(manifest.as_str());
        let directory = MmapDirectory::open(&index_dir)
            .with_context(|| format!("failed to open index directory {}", index_dir.display()))?;
        let index = Index::open_or_create(directory, schema)
            .with_context(|| format!("failed to open/create index at {}", index_dir.display()))?;

        if needs_build {
            tracing::info!(files = files.len(), dir = %index_dir.display(), "building content index");
            build_index(index.clone(), files, max_file_bytes).await?;
            fs::write(&manifest_path, &manifest)
                .with_context(|| format!("failed to write {}", manifest_path.display()))?;
        }

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommit)
            .try_into()
            .context("failed to create index reader")?;
        reader.reload()?;

        let path_field = index
            .schema()
            .get_field("path")
            .context("path field missing")?;
        let body_field = index
            .schema()
            .get_field("body")
            .context("body field missing")?;
        let query_parser = tantivy::query::QueryParser::for_index(&index, vec![body_field]);

        Ok(Self {
            reader,
            query_parser,
            path_field,
        })
    }

    /// Return indexed paths in relevance order.
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<PathBuf>> {
        let query_string = sanitize_query(query);
        if query_string.is_empty() {
            return Ok(Vec::new());
        }

        let parser = self.query_parser.clone();
        let reader = self.reader.clone();
        let path_field = self.path_field;

        task::spawn_blocking(move || {
            let searcher = reader.searcher();
            let query = parser
                .parse_query(&query_string)
                .with_context(|| format!("failed to parse index query `{query_string}`"))?;
            let top_docs = searcher
                .search(&query, &TopDocs::with_limit(limit.max(1)))
                .context("index search failed")?;

            let mut results = Vec::new();
            for (_score, doc_address) in top_docs {
                let retrieved = searcher.doc(doc_address)?;
                if let Some(value) = retrieved.get_first(path_field) {
                    let text = value.as_text().unwrap_or_default();
                    results.push(PathBuf::from(text));
                }
            }
            Ok::<Vec<PathBuf>, anyhow::Error>(results)
        })
        .await
        .context("index search task cancelled")?
    }
}

fn build_schema() -> Schema {
    let mut builder = SchemaBuilder::default();
    builder.add_text_field("path", STORED);
    builder.add_text_field("body", TEXT);
    builder.build()
}

async fn build_index(index: Index, files: Vec<PathBuf>, max_file_bytes: u64) -> Result<()> {
    task::spawn_blocking(move || {
        let mut writer = index
            .writer(WRITER_HEAP_BYTES)
            .context("failed to create index writer")?;
        let schema = index.schema();
        let path_field = schema.get_field("path").context("path field missing")?;
        let body_field = schema.get_field("body").context("body field missing")?;

        writer
            .delete_all_documents()
            .context("failed to clear stale index documents")?;
        for path in files {
            let mut body = path
                .file_stem()
                .map(|stem| stem.to_string_lossy().replace(['_', '-', '.'], " "))
                .unwrap_or_default();

            let small_enough = fs::metadata(&path)
                .map(|meta| meta.len() <= max_file_bytes)
                .unwrap_or(false);
            if small_enough {
                match fs::read_to_string(&path) {
                    Ok(text) => {
                        body.push('\n');
                        body.push_str(&text);
                    }
                    Err(err) => {
                        tracing::debug!(error = %err, path = %path.display(), "indexing file name only");
                    }
                }
            }

            let mut doc = tantivy::Document::new();
            doc.add_text(path_field, path.display().to_string());
            doc.add_text(body_field, body);
            if let Err(err) = writer.add_document(doc) {
                tracing::warn!(error = %err, "failed to add document to index");
            }
        }

        writer.commit().context("failed to commit index writer")?;
        Ok::<(), anyhow::Error>(())
    })
    .await
    .context("index build task cancelled")??;

    Ok(())
}

fn build_manifest(files: &[PathBuf]) -> String {
    let mut lines: Vec<String> = files.iter().map(|path| manifest_line(path)).collect();
    lines.sort();
    lines.join("\n")
}

fn manifest_line(path: &Path) -> String {
    let (len, modified) = fs::metadata(path)
        .map(|meta| {
            let modified = meta
                .modified()
                .ok()
                .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
                .map(|since| since.as_nanos())
                .unwrap_or_default();
            (meta.len(), modified)
        })
        .unwrap_or_default();
    format!("{len}\t{modified}\t{}", path.display())
}

/// Strip query-parser syntax so free text never fails to parse.
fn sanitize_query(query: &str) -> String {
    query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|term| !term.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
