use std::path::Path;

use serde::Serialize;

/// Coarse file classification driving what a search reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Image,
    Video,
    Document,
    Unknown,
}

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "bmp"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "avi", "mov", "webm"];
const DOCUMENT_EXTENSIONS: &[&str] = &[
    "txt", "md", "markdown", "log", "csv", "json", "srt", "vtt",
];
const PACKED_DOCUMENT_EXTENSIONS: &[&str] = &["pdf", "docx", "odt", "epub"];

/// Documents whose text only ripgrep-all adapters can extract. Discovery
/// keeps them as [`FileKind::Document`] only when rga is enabled, and the
/// probe never reads their bytes.
pub fn is_packed_document(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| PACKED_DOCUMENT_EXTENSIONS.iter().any(|c| c.eq_ignore_ascii_case(ext)))
}

impl FileKind {
    pub fn of(path: &Path) -> Self {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return FileKind::Unknown;
        };
        let matches = |set: &[&str]| set.iter().any(|c| c.eq_ignore_ascii_case(ext));
        if matches(IMAGE_EXTENSIONS) {
            FileKind::Image
        } else if matches(VIDEO_EXTENSIONS) {
            FileKind::Video
        } else if matches(DOCUMENT_EXTENSIONS) {
            FileKind::Document
        } else {
            FileKind::Unknown
        }
    }

    pub fn is_known(self) -> bool {
        self != FileKind::Unknown
    }

    /// Only documents have searchable text content.
    pub fn has_text(self) -> bool {
        self == FileKind::Document
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FileKind::Image => "image",
            FileKind::Video => "video",
            FileKind::Document => "document",
            FileKind::Unknown => "unknown",
        }
    }
}
