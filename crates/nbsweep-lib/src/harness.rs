//! Executing one notebook with failure isolation
//!
//! A document moves through `Loaded -> Executing -> Succeeded | Failed ->
//! Persisted`. Execution failures become a failed [`ExecutionResult`] and
//! never escape; the artifact is written for both outcomes. Errors before
//! execution (unreadable metadata, unknown kernel) and artifact I/O errors do
//! escape, as [`HarnessError`].

use crate::engine::KernelRegistry;
use crate::error::{ArtifactError, ExecutionError, HarnessError};
use crate::notebook::Notebook;
use crate::run_log::RunLog;
use crate::workspace::WorkspaceLayout;
use nbsweep_types::{ErrorDetail, ExecutionResult, ExecutionStatus};
use std::path::Path;
use std::time::{Duration, Instant};
use strum::Display;
use tracing::{debug, info, instrument, warn};

/// Where a document is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum HarnessState {
    Loaded,
    Executing,
    Succeeded,
    Failed,
    Persisted,
}

pub struct NotebookExecutionHarness<'a> {
    layout: &'a WorkspaceLayout,
    registry: &'a KernelRegistry,
    timeout: Duration,
}

impl<'a> NotebookExecutionHarness<'a> {
    pub fn new(layout: &'a WorkspaceLayout, registry: &'a KernelRegistry, timeout: Duration) -> Self {
        Self {
            layout,
            registry,
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Execute `notebook_path` from `working_copy` and persist the artifact.
    #[instrument(skip_all, fields(notebook = %notebook_path.display()))]
    pub async fn run(
        &self,
        notebook_path: &Path,
        working_copy: &Path,
        log: &mut RunLog,
    ) -> Result<ExecutionResult, HarnessError> {
        let repository_name = working_copy
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let artifact_path = self.layout.artifact_path(&repository_name, notebook_path);
        let display_name = notebook_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| notebook_path.display().to_string());

        log.info(&format!("\n# PROCESSING: {display_name}"))?;

        // Loaded
        let mut notebook = Notebook::read(notebook_path)?;
        let kernel_name = notebook.kernel_name()?.to_string();
        log.info(&format!("  Notebook kernel: {kernel_name}"))?;
        let executor = self.registry.resolve(&kernel_name)?;
        transition(HarnessState::Loaded);

        // Executing
        transition(HarnessState::Executing);
        let started = Instant::now();
        let outcome = executor
            .execute(&mut notebook, &kernel_name, working_copy, self.timeout)
            .await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let (status, error_detail) = match outcome {
            Ok(()) => {
                transition(HarnessState::Succeeded);
                (ExecutionStatus::Success, None)
            }
            Err(e) => {
                transition(HarnessState::Failed);
                warn!(error = %e, executor = executor.name(), "Notebook execution failed");
                (ExecutionStatus::Failure, Some(error_detail(&e, &notebook)))
            }
        };

        // Persisted, whatever the outcome.
        persist(&notebook, &artifact_path)?;
        transition(HarnessState::Persisted);

        match &error_detail {
            None => {
                log.info(&format!("  SUCCESS notebook saved to {}", artifact_path.display()))?;
            }
            Some(detail) => {
                log.error(&format!("  FAILURE [{}] {}", detail.ename, detail.evalue))?;
                for line in &detail.traceback {
                    log.error(&format!("    {line}"))?;
                }
                log.error(&format!(
                    "  partial notebook saved to {}",
                    artifact_path.display()
                ))?;
            }
        }

        info!(%status, duration_ms, artifact = %artifact_path.display(), "Notebook processed");

        Ok(ExecutionResult {
            notebook_path: notebook_path.to_path_buf(),
            kernel_name,
            status,
            error_detail,
            artifact_path,
            duration_ms,
        })
    }
}

fn transition(state: HarnessState) {
    debug!(%state, "Harness state");
}

/// Write the artifact, creating `tests/<repository-name>/` as needed.
fn persist(notebook: &Notebook, artifact_path: &Path) -> Result<(), ArtifactError> {
    if let Some(dir) = artifact_path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ArtifactError::CreateDir {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    notebook.write(artifact_path)
}

/// The exception class and message to report for a failed execution.
fn error_detail(error: &ExecutionError, notebook: &Notebook) -> ErrorDetail {
    match error {
        ExecutionError::Cell {
            ename,
            evalue,
            traceback,
        } => ErrorDetail::new(ename.clone(), evalue.clone()).with_traceback(traceback.clone()),
        ExecutionError::Timeout { .. } => notebook
            .first_error()
            .filter(|detail| detail.ename.contains("Timeout"))
            .unwrap_or_else(|| ErrorDetail::new("CellTimeoutError", error.to_string())),
        ExecutionError::Engine { message } => ErrorDetail::new("EngineError", message.clone()),
    }
}
