//! Filesystem layout of a harness workspace
//!
//! ```text
//! <root>/repositories/<name>/          synced working copies
//! <root>/tests/<name>/<document-name>  persisted execution artifacts
//! <root>/tests/LOG.txt                 run log
//! ```

use anyhow::{Context, Result};
use nbsweep_types::{Repository, SyncState};
use std::path::{Path, PathBuf};

pub const REPOSITORIES_DIR: &str = "repositories";
pub const ARTIFACTS_DIR: &str = "tests";
pub const RUN_LOG_FILE: &str = "LOG.txt";

/// Paths under an explicit workspace root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceLayout {
    root: PathBuf,
}

impl WorkspaceLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn repositories_dir(&self) -> PathBuf {
        self.root.join(REPOSITORIES_DIR)
    }

    pub fn artifacts_dir(&self) -> PathBuf {
        self.root.join(ARTIFACTS_DIR)
    }

    pub fn run_log_path(&self) -> PathBuf {
        self.artifacts_dir().join(RUN_LOG_FILE)
    }

    /// Working copy location for a repository name.
    pub fn local_path(&self, repository_name: &str) -> PathBuf {
        self.repositories_dir().join(repository_name)
    }

    /// `tests/<repository-name>/<file-name>` for a document found in a working copy.
    pub fn artifact_path(&self, repository_name: &str, notebook_path: &Path) -> PathBuf {
        let file_name = notebook_path
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| notebook_path.to_path_buf());
        self.artifacts_dir().join(repository_name).join(file_name)
    }

    /// Describe a remote in terms of this workspace, reading its current sync state from disk.
    pub fn repository(&self, remote_url: &str) -> Repository {
        let name = repository_name(remote_url);
        let local_path = self.local_path(&name);
        let sync_state = if local_path.is_dir() {
            SyncState::Present
        } else {
            SyncState::Absent
        };
        Repository {
            remote_url: remote_url.to_string(),
            name,
            local_path,
            sync_state,
        }
    }

    /// Create `repositories/` and `tests/` if they are missing.
    pub fn prepare(&self) -> Result<()> {
        for dir in [self.repositories_dir(), self.artifacts_dir()] {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create workspace directory {}", dir.display()))?;
        }
        Ok(())
    }
}

/// The trailing path segment of a remote url, without a `.git` suffix.
pub fn repository_name(remote_url: &str) -> String {
    let trimmed = remote_url.trim_end_matches('/');
    let last = trimmed.rsplit('/').next().unwrap_or(trimmed);
    last.strip_suffix(".git").unwrap_or(last).to_string()
}
