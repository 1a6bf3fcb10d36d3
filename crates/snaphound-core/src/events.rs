use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::media::FileKind;

/// Progress and result notifications produced while a search runs.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum SearchEvent {
    Status { message: String },
    Results { files: Vec<ResultFile> },
    Completed { matched: usize, scanned: usize },
    Cancelled { message: String },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResultFile {
    /// 1-based rank within the search.
    pub id: usize,
    pub file_path: PathBuf,
    #[serde(rename = "type")]
    pub kind: FileKind,
    pub score: f32,
    pub origin: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

impl SearchEvent {
    pub fn status(message: impl Into<String>) -> Self {
        SearchEvent::Status {
            message: message.into(),
        }
    }
}

/// Destination for [`SearchEvent`]s.
pub trait EventSink: Send {
    fn emit(&mut self, event: &SearchEvent) -> Result<()>;
}

/// Writes one JSON object per line and flushes after each event so a
/// consumer reading a pipe sees progress immediately.
pub struct JsonLinesSink<W: Write + Send> {
    writer: W,
}

impl JsonLinesSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self {
            writer: io::stdout(),
        }
    }
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> EventSink for JsonLinesSink<W> {
    fn emit(&mut self, event: &SearchEvent) -> Result<()> {
        let mut line = serde_json::to_vec(event).context("failed to encode search event")?;
        line.push(b'\n');
        self.writer
            .write_all(&line)
            .context("failed to write search event")?;
        self.writer.flush().context("failed to flush search event")
    }
}

/// Collects events in memory; clones share the same buffer.
#[derive(Clone, Default)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<SearchEvent>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SearchEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl EventSink for MemorySink {
    fn emit(&mut self, event: &SearchEvent) -> Result<()> {
        let mut events = self
            .events
            .lock()
            .map_err(|_| anyhow::anyhow!("event buffer poisoned"))?;
        events.push(event.clone());
        Ok(())
    }
}
