//! In-process stand-ins for version control and notebook execution
//!
//! These let the whole pipeline run in tests without git, Jupyter, or the
//! network.

use crate::engine::NotebookExecutor;
use crate::error::{ExecutionError, SyncError};
use crate::notebook::{error_output, stream_output, Notebook};
use crate::sync::VersionControl;
use crate::workspace::repository_name;
use async_trait::async_trait;
use nbsweep_types::ErrorDetail;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

/// Source marker that makes [`ScriptedExecutor`] raise in that cell.
pub const RAISE_MARKER: &str = "raise ";
/// Source marker that makes [`ScriptedExecutor`] time out in that cell.
pub const HANG_MARKER: &str = "time.sleep(";

/// Runs code cells by script instead of by kernel.
///
/// Each code cell gets an execution count and a stdout echo of its source.
/// A cell whose source contains `raise <Name>(<message>)` fails with that
/// exception; a cell containing `time.sleep(` exceeds the timeout.
pub struct ScriptedExecutor {
    name: String,
    calls: Mutex<Vec<(PathBuf, String)>>,
}

impl Default for ScriptedExecutor {
    fn default() -> Self {
        Self::named("scripted")
    }
}

impl ScriptedExecutor {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// `(working_dir, kernel_name)` for every execution, in order.
    pub fn calls(&self) -> Vec<(PathBuf, String)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn parse_raise(source: &str) -> Option<ErrorDetail> {
        let start = source.find(RAISE_MARKER)? + RAISE_MARKER.len();
        let statement = source[start..].lines().next().unwrap_or_default().trim();
        let (ename, rest) = statement.split_once('(').unwrap_or((statement, ")"));
        let evalue = rest
            .trim_end_matches(')')
            .trim_matches(|c| c == '"' || c == '\'');
        Some(
            ErrorDetail::new(ename.trim(), evalue).with_traceback(vec![
                "---------------------------------------------------------------------------".to_string(),
                format!("{ename}: {evalue}"),
            ]),
        )
    }
}

#[async_trait]
impl NotebookExecutor for ScriptedExecutor {
    async fn execute(
        &self,
        notebook: &mut Notebook,
        kernel_name: &str,
        working_dir: &Path,
        timeout: Duration,
    ) -> Result<(), ExecutionError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((working_dir.to_path_buf(), kernel_name.to_string()));
        }

        let mut count = 0u64;
        for cell in notebook.cells.iter_mut().filter(|cell| cell.is_code()) {
            count += 1;
            let source = cell.source.text();
            cell.execution_count = Some(count.into());

            if source.contains(HANG_MARKER) {
                return Err(ExecutionError::Timeout {
                    timeout_secs: timeout.as_secs(),
                });
            }
            if let Some(detail) = Self::parse_raise(&source) {
                cell.push_output(error_output(&detail));
                return Err(ExecutionError::Cell {
                    ename: detail.ename,
                    evalue: detail.evalue,
                    traceback: detail.traceback,
                });
            }
            cell.push_output(stream_output(&source));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Records clone and update calls and creates working copy directories on clone.
#[derive(Default)]
pub struct RecordingVcs {
    clones: Mutex<Vec<String>>,
    updates: Mutex<Vec<PathBuf>>,
    /// Files to drop into a working copy when it is cloned, keyed by repository name.
    seeds: HashMap<String, Vec<(String, String)>>,
    fail: bool,
}

impl RecordingVcs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every operation exits unsuccessfully and creates nothing.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Populate `relative_path` with `contents` when `repository` is cloned.
    pub fn with_file(mut self, repository: &str, relative_path: &str, contents: &str) -> Self {
        self.seeds
            .entry(repository.to_string())
            .or_default()
            .push((relative_path.to_string(), contents.to_string()));
        self
    }

    pub fn clones(&self) -> Vec<String> {
        self.clones.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn updates(&self) -> Vec<PathBuf> {
        self.updates.lock().map(|u| u.clone()).unwrap_or_default()
    }

    fn failure(command: &str) -> SyncError {
        SyncError::ExitStatus {
            command: command.to_string(),
            code: Some(128),
            stderr: "fatal: repository not found".to_string(),
        }
    }
}

#[async_trait]
impl VersionControl for RecordingVcs {
    async fn clone_into(&self, remote_url: &str, parent_dir: &Path) -> Result<(), SyncError> {
        if let Ok(mut clones) = self.clones.lock() {
            clones.push(remote_url.to_string());
        }
        if self.fail {
            return Err(Self::failure("git clone"));
        }

        let name = repository_name(remote_url);
        let target = parent_dir.join(&name);
        let io = |source: std::io::Error| SyncError::Spawn {
            command: "git clone".to_string(),
            source,
        };
        std::fs::create_dir_all(&target).map_err(io)?;
        for (relative, contents) in self.seeds.get(&name).into_iter().flatten() {
            let path = target.join(relative);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(io)?;
            }
            std::fs::write(&path, contents).map_err(io)?;
        }
        Ok(())
    }

    async fn update(&self, working_copy: &Path, _branch: Option<&str>) -> Result<(), SyncError> {
        if let Ok(mut updates) = self.updates.lock() {
            updates.push(working_copy.to_path_buf());
        }
        if self.fail {
            return Err(Self::failure("git pull"));
        }
        Ok(())
    }
}
