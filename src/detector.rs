use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::Context;
use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;
use tracing::{debug, warn};

/// The pretrained detection model, invoked as a black box.
///
/// Implementations may write an annotated copy of the image into the results
/// directory under the same file name; its absence is not an error.
#[async_trait]
pub trait Detector: Send + Sync {
    async fn detect(&self, image: &Path) -> anyhow::Result<Option<Value>>;
}

/// Runs an external program as `<program> <args..> <image path> <results dir>`.
#[derive(Debug, Clone)]
pub struct CommandDetector {
    program: String,
    args: Vec<String>,
    result_dir: PathBuf,
}

impl CommandDetector {
    pub fn new(command_line: &str, result_dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts.next().context("empty detector command")?;
        Ok(Self {
            program,
            args: parts.collect(),
            result_dir: result_dir.into(),
        })
    }
}

#[async_trait]
impl Detector for CommandDetector {
    async fn detect(&self, image: &Path) -> anyhow::Result<Option<Value>> {
        tokio::fs::create_dir_all(&self.result_dir)
            .await
            .with_context(|| format!("create result dir {}", self.result_dir.display()))?;

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(image)
            .arg(&self.result_dir)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("spawn detector {}", self.program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(status = %output.status, stderr = %stderr.trim(), "detector exited with failure");
            anyhow::bail!("detector exited with {}", output.status);
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        debug!(image = %image.display(), bytes = stdout.len(), "detector finished");
        Ok(parse_output(&stdout))
    }
}

fn parse_output(stdout: &str) -> Option<Value> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(serde_json::from_str(trimmed).unwrap_or_else(|_| Value::String(trimmed.to_string())))
}

/// Stand-in used when no detector command is configured. Every call fails.
#[derive(Debug, Clone, Copy)]
pub struct UnconfiguredDetector;

#[async_trait]
impl Detector for UnconfiguredDetector {
    async fn detect(&self, _image: &Path) -> anyhow::Result<Option<Value>> {
        anyhow::bail!("no detector command configured (set DETECTOR_COMMAND)")
    }
}
