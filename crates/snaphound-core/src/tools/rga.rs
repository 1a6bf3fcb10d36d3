use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::time::timeout;

use super::common::{ChildGuard, RgMessage, drain_capped};

const STDERR_LIMIT: usize = 1024;

/// Async wrapper around `rga` (ripgrep-all), which also looks inside PDFs,
/// archives and media metadata.
#[derive(Clone, Debug)]
pub struct RgaTool {
    timeout: Duration,
    max_matches: usize,
}

#[derive(Clone, Debug)]
pub struct RgaMatch {
    pub path: PathBuf,
    pub line_number: Option<usize>,
    pub lines: String,
}

impl RgaTool {
    pub fn new(timeout: Duration, max_matches: usize) -> Self {
        Self {
            timeout,
            max_matches,
        }
    }

    pub async fn search(&self, root: &Path, query: &str, recursive: bool) -> Result<Vec<RgaMatch>> {
        let mut cmd = Command::new("rga");
        cmd.arg("--json")
            .arg("--line-number")
            .arg("--ignore-case")
            .arg("--fixed-strings")
            .arg("--max-columns")
            .arg("200");
        if !recursive {
            cmd.arg("--max-depth").arg("1");
        }
        cmd.arg("--").arg(query).arg(root);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let child = cmd
            .spawn()
            .with_context(|| "failed to spawn rga; is ripgrep-all installed and on PATH?")?;

        let mut guard = ChildGuard::new(child);
        let child_ref = guard.as_mut().context("child process unavailable")?;
        let stdout = child_ref
            .stdout
            .take()
            .context("rga did not produce stdout pipe")?;
        let stderr = child_ref
            .stderr
            .take()
            .context("rga did not produce stderr pipe")?;

        // drained alongside stdout; a full stderr pipe would stall rga
        let stderr_task = tokio::spawn(drain_capped(stderr, STDERR_LIMIT));
        let mut reader = BufReader::new(stdout).lines();
        let mut matches = Vec::new();
        let max_matches = self.max_matches;

        let collect = async {
            while let Some(line) = reader.next_line().await? {
                if matches.len() >= max_matches {
                    break;
                }
                let parsed: RgMessage = match serde_json::from_str(&line) {
                    Ok(msg) => msg,
                    Err(err) => {
                        tracing::warn!(error = %err, "failed to parse rga json line");
                        continue;
                    }
                };
                if let RgMessage::Match { data } = parsed {
                    matches.push(RgaMatch {
                        path: PathBuf::from(data.path.text),
                        line_number: data.line_number,
                        lines: data.lines.text,
                    });
                }
            }

            let mut child = guard.take().context("child process already taken")?;
            if matches.len() >= max_matches {
                // stopped reading early; the rest of the output is not needed
                let _ = child.start_kill();
                let _ = child.wait().await;
                return Result::<Vec<RgaMatch>>::Ok(matches);
            }
            let status = child.wait().await?;

            // exit code 1 means "no matches"
            if !status.success() && status.code() != Some(1) {
                let stderr_output = stderr_task.await.unwrap_or_default();
                if stderr_output.trim().is_empty() {
                    anyhow::bail!("rga exited with status {}", status);
                } else {
                    anyhow::bail!("rga exited with status {}: {}", status, stderr_output.trim());
                }
            }
            Result::<Vec<RgaMatch>>::Ok(matches)
        };

        timeout(self.timeout, collect)
            .await
            .with_context(|| "rga invocation timed out")?
    }
}
