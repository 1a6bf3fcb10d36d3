//! SnapHound: local media and document search.
//!
//! A [`SnapHound`] walks a priority and a general set of locations, scores
//! every image, video and document it finds against a text query and
//! streams the ranked results as JSON events.

mod discover;
pub mod engine;
pub mod events;
pub mod media;
pub mod options;
pub mod paths;
pub mod query;
mod state;
pub mod telemetry;
pub mod tools;

pub use engine::{CancelHandle, SearchSummary, SnapHound, StageStats};
pub use events::{EventSink, JsonLinesSink, MemorySink, ResultFile, SearchEvent};
pub use media::FileKind;
pub use options::{ConfigFile, EngineOptions};
