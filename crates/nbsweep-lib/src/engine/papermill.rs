//! Executor backed by the `papermill` command line tool
//!
//! papermill saves the output notebook as cells complete, including the
//! error output of a failing cell, which is what lets a failed run still
//! produce a partially executed artifact.

use super::NotebookExecutor;
use crate::error::ExecutionError;
use crate::notebook::Notebook;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

const INPUT_NAME: &str = "input.ipynb";
const OUTPUT_NAME: &str = "output.ipynb";

#[derive(Debug, Clone)]
pub struct PapermillExecutor {
    program: String,
}

impl Default for PapermillExecutor {
    fn default() -> Self {
        Self::new("papermill")
    }
}

impl PapermillExecutor {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn args(
        input: &Path,
        output: &Path,
        kernel_name: &str,
        working_dir: &Path,
        timeout: Duration,
    ) -> Vec<String> {
        vec![
            input.display().to_string(),
            output.display().to_string(),
            "--kernel".to_string(),
            kernel_name.to_string(),
            "--cwd".to_string(),
            working_dir.display().to_string(),
            "--execution-timeout".to_string(),
            timeout.as_secs().to_string(),
            "--no-progress-bar".to_string(),
        ]
    }

    fn temp_error(e: std::io::Error) -> ExecutionError {
        ExecutionError::Engine {
            message: format!("Failed to stage notebook for execution: {e}"),
        }
    }
}

/// Classify a failed run from the executed notebook's first error output.
pub fn classify_failure(executed: Option<&Notebook>, stderr: &str, timeout: Duration) -> ExecutionError {
    if let Some(detail) = executed.and_then(Notebook::first_error) {
        let mentions_timeout = detail.ename.contains("Timeout") || detail.evalue.contains("timed out");
        if mentions_timeout {
            return ExecutionError::Timeout {
                timeout_secs: timeout.as_secs(),
            };
        }
        return ExecutionError::Cell {
            ename: detail.ename,
            evalue: detail.evalue,
            traceback: detail.traceback,
        };
    }
    if stderr.contains("CellTimeoutError") || stderr.contains("timed out") {
        return ExecutionError::Timeout {
            timeout_secs: timeout.as_secs(),
        };
    }
    ExecutionError::Engine {
        message: last_lines(stderr, 5),
    }
}

fn last_lines(text: &str, count: usize) -> String {
    let lines: Vec<&str> = text.trim().lines().collect();
    lines[lines.len().saturating_sub(count)..].join("\n")
}

#[async_trait]
impl NotebookExecutor for PapermillExecutor {
    async fn execute(
        &self,
        notebook: &mut Notebook,
        kernel_name: &str,
        working_dir: &Path,
        timeout: Duration,
    ) -> Result<(), ExecutionError> {
        let staging = tempfile::Builder::new()
            .prefix("nbsweep-")
            .tempdir()
            .map_err(Self::temp_error)?;
        let input: PathBuf = staging.path().join(INPUT_NAME);
        let output: PathBuf = staging.path().join(OUTPUT_NAME);
        notebook.write(&input).map_err(|e| ExecutionError::Engine {
            message: e.to_string(),
        })?;

        let args = Self::args(&input, &output, kernel_name, working_dir, timeout);
        debug!(program = %self.program, ?args, "Starting papermill");

        let result = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ExecutionError::Engine {
                message: format!("Failed to spawn '{}': {e}", self.program),
            })?;

        // Whatever papermill managed to write replaces the in-memory document.
        let executed = if output.exists() {
            match Notebook::read(&output) {
                Ok(executed) => Some(executed),
                Err(e) => {
                    warn!(error = %e, "papermill output could not be read back");
                    None
                }
            }
        } else {
            None
        };
        if let Some(executed) = &executed {
            *notebook = executed.clone();
        }

        if result.status.success() {
            info!(cells = notebook.executed_cells(), "papermill run succeeded");
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&result.stderr);
        Err(classify_failure(executed.as_ref(), &stderr, timeout))
    }

    fn name(&self) -> &str {
        "papermill"
    }
}
