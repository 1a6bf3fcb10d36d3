use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Child;

/// Kills the wrapped child process when dropped, so a timed out tool
/// invocation does not leave an orphan behind.
pub struct ChildGuard {
    child: Option<Child>,
}

impl ChildGuard {
    pub fn new(child: Child) -> Self {
        Self { child: Some(child) }
    }

    /// Take ownership of the child, preventing it from being killed on drop.
    pub fn take(&mut self) -> Option<Child> {
        self.child.take()
    }

    pub fn as_mut(&mut self) -> Option<&mut Child> {
        self.child.as_mut()
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.start_kill();
        }
    }
}

/// ripgrep-style `--json` output line.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RgMessage {
    Match { data: RgMatchData },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
pub struct RgMatchData {
    pub path: RgText,
    pub lines: RgText,
    pub line_number: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct RgText {
    pub text: String,
}

/// Read `reader` to EOF, keeping roughly the first `limit` bytes.
///
/// Output past the limit is still consumed so a child writing to a piped
/// stderr never blocks on a full pipe.
pub async fn drain_capped<R>(reader: R, limit: usize) -> String
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    let mut output = String::new();
    let mut truncated = false;
    while let Ok(Some(line)) = lines.next_line().await {
        if truncated {
            continue;
        }
        if !output.is_empty() {
            output.push('\n');
        }
        output.push_str(&line);
        if output.len() > limit {
            output.push_str("\n... (truncated)");
            truncated = true;
        }
    }
    output
}
