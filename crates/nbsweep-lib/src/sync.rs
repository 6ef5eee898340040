//! Keeping local working copies current
//!
//! The sync manager owns the clone-versus-update decision for a repository.
//! Version control itself sits behind [`VersionControl`] so the pipeline can
//! run against [`GitCli`] in production and a recording fake in tests.

use crate::error::SyncError;
use crate::run_log::RunLog;
use crate::workspace::WorkspaceLayout;
use async_trait::async_trait;
use nbsweep_types::{Repository, SyncAction, SyncState};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

/// Clone and update operations, each a blocking external call.
#[async_trait]
pub trait VersionControl: Send + Sync {
    /// Clone `remote_url` into `parent_dir`, producing `parent_dir/<name>`.
    async fn clone_into(&self, remote_url: &str, parent_dir: &Path) -> Result<(), SyncError>;

    /// Fetch and merge `branch` (the remote default branch when `None`) into `working_copy`.
    async fn update(&self, working_copy: &Path, branch: Option<&str>) -> Result<(), SyncError>;
}

/// `git` invoked as a subprocess.
#[derive(Debug, Clone)]
pub struct GitCli {
    program: String,
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new("git")
    }
}

impl GitCli {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn clone_args(remote_url: &str) -> Vec<String> {
        vec!["clone".to_string(), remote_url.to_string()]
    }

    pub fn update_args(branch: Option<&str>) -> Vec<String> {
        vec![
            "pull".to_string(),
            "origin".to_string(),
            branch.unwrap_or("HEAD").to_string(),
        ]
    }

    async fn run(&self, args: &[String], cwd: &Path) -> Result<(), SyncError> {
        let command = format!("{} {}", self.program, args.join(" "));
        debug!(%command, cwd = %cwd.display(), "Running version control command");

        let output = Command::new(&self.program)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| SyncError::Spawn {
                command: command.clone(),
                source,
            })?;

        if output.status.success() {
            Ok(())
        } else {
            Err(SyncError::ExitStatus {
                command,
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

#[async_trait]
impl VersionControl for GitCli {
    async fn clone_into(&self, remote_url: &str, parent_dir: &Path) -> Result<(), SyncError> {
        self.run(&Self::clone_args(remote_url), parent_dir).await
    }

    async fn update(&self, working_copy: &Path, branch: Option<&str>) -> Result<(), SyncError> {
        self.run(&Self::update_args(branch), working_copy).await
    }
}

/// What a sync attempt did. A failed subprocess is reported in `error`, never swallowed.
#[derive(Debug)]
pub struct SyncReport {
    pub repository: Repository,
    pub action: SyncAction,
    pub error: Option<SyncError>,
}

impl SyncReport {
    pub fn local_path(&self) -> &Path {
        &self.repository.local_path
    }

    /// Whether the working copy exists now, whatever the subprocess reported.
    pub fn is_present(&self) -> bool {
        self.repository.sync_state == SyncState::Present
    }
}

pub struct RepositorySyncManager<'a> {
    layout: &'a WorkspaceLayout,
    vcs: &'a dyn VersionControl,
    branch: Option<String>,
}

impl<'a> RepositorySyncManager<'a> {
    pub fn new(layout: &'a WorkspaceLayout, vcs: &'a dyn VersionControl) -> Self {
        Self {
            layout,
            vcs,
            branch: None,
        }
    }

    pub fn with_branch(mut self, branch: Option<String>) -> Self {
        self.branch = branch;
        self
    }

    /// Clone the repository if absent, update it if present.
    ///
    /// Calling this repeatedly converges on a present, updated working copy at
    /// the same local path.
    #[instrument(skip(self, log))]
    pub async fn sync(&self, remote_url: &str, log: &mut RunLog) -> std::io::Result<SyncReport> {
        let repository = self.layout.repository(remote_url);

        let (action, result) = match repository.sync_state {
            SyncState::Present => {
                log.info("# Working copy exists locally, updating ...")?;
                let result = self
                    .vcs
                    .update(&repository.local_path, self.branch.as_deref())
                    .await;
                (SyncAction::Updated, result)
            }
            SyncState::Absent => {
                log.info("# Working copy does not exist locally, cloning ...")?;
                let parent = self.layout.repositories_dir();
                let result = self.vcs.clone_into(remote_url, &parent).await;
                (SyncAction::Cloned, result)
            }
        };

        let refreshed = self.layout.repository(remote_url);
        let error = match result {
            Ok(()) => {
                info!(name = %refreshed.name, %action, "Working copy synced");
                None
            }
            Err(e) => {
                warn!(name = %refreshed.name, %action, error = %e, "Sync command failed");
                log.warn(&format!("  Sync {action} failed: {e}"))?;
                Some(e)
            }
        };

        Ok(SyncReport {
            repository: refreshed,
            action,
            error,
        })
    }
}

/// Directory names currently under the repositories root.
pub fn local_repository_names(repositories_dir: &Path) -> std::io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(repositories_dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

/// Resolve `name` under `repositories_dir` if such a directory exists.
pub fn find_local_repository(repositories_dir: &Path, name: &str) -> std::io::Result<Option<PathBuf>> {
    let names = local_repository_names(repositories_dir)?;
    Ok(names
        .iter()
        .any(|candidate| candidate == name)
        .then(|| repositories_dir.join(name)))
}
