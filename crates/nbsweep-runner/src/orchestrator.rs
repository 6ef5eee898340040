//! Drives the batch: probe, sync, discover, and execute per catalog entry
//!
//! Decisions per error kind:
//! - probe failure: fall back to an existing local working copy, otherwise skip
//! - sync failure: governed by [`SyncFailurePolicy`]
//! - unreadable notebook metadata or unknown kernel: reject that document, continue
//! - execution failure: already isolated by the harness as a failed result
//! - artifact or run log I/O failure: abort the run

use crate::config::HarnessConfig;
use anyhow::{Context, Result};
use nbsweep_lib::{
    ForgeClient, KernelRegistry, NotebookDiscovery, NotebookExecutionHarness, RepositorySyncManager,
    RunLog, VersionControl, WorkspaceLayout, repository_name, select_forge_resources,
    sync::find_local_repository,
};
use nbsweep_types::{ExecutionResult, Resource, SyncFailurePolicy};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

/// Why a repository produced no execution results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NoDocumentsAtRoot,
    ProbeFailedNoLocalCopy,
    SyncFailed,
    WorkingCopyMissing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRepository {
    pub url: String,
    pub reason: SkipReason,
}

/// A document that never reached execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedDocument {
    pub notebook_path: PathBuf,
    pub reason: String,
}

/// Everything one run produced, in processing order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub results: Vec<ExecutionResult>,
    pub rejected: Vec<RejectedDocument>,
    pub skipped: Vec<SkippedRepository>,
}

pub struct Orchestrator<'a> {
    layout: &'a WorkspaceLayout,
    forge: &'a ForgeClient,
    sync: RepositorySyncManager<'a>,
    harness: NotebookExecutionHarness<'a>,
    config: &'a HarnessConfig,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        config: &'a HarnessConfig,
        layout: &'a WorkspaceLayout,
        forge: &'a ForgeClient,
        vcs: &'a dyn VersionControl,
        registry: &'a KernelRegistry,
    ) -> Self {
        Self {
            layout,
            forge,
            sync: RepositorySyncManager::new(layout, vcs).with_branch(config.update_branch.clone()),
            harness: NotebookExecutionHarness::new(layout, registry, config.execution_timeout()),
            config,
        }
    }

    /// Process every forge-hosted resource in catalog order.
    #[instrument(skip_all, fields(resources = resources.len()))]
    pub async fn run(&self, resources: &[Resource], log: &mut RunLog) -> Result<RunReport> {
        let selected = select_forge_resources(resources, &self.config.forge_web_prefix);
        info!(selected = selected.len(), "Selected forge-hosted resources");
        log.info(&format!(
            "# {} of {} catalog resources are hosted at {}",
            selected.len(),
            resources.len(),
            self.config.forge_web_prefix
        ))?;

        let mut report = RunReport::default();
        for resource in &selected {
            self.process_resource(&resource.url, log, &mut report).await?;
        }
        Ok(report)
    }

    async fn process_resource(&self, url: &str, log: &mut RunLog, report: &mut RunReport) -> Result<()> {
        let extension = &self.config.document_extension;

        match self.forge.probe(url, extension).await {
            Ok(true) => {
                log.info(&format!("# PROBE {url}: {extension} found at repository root"))?;
                self.process_repository(url, log, report).await
            }
            Ok(false) => {
                log.info(&format!("# PROBE {url}: no {extension} at repository root, skipping"))?;
                report.skipped.push(SkippedRepository {
                    url: url.to_string(),
                    reason: SkipReason::NoDocumentsAtRoot,
                });
                Ok(())
            }
            Err(e) => {
                // Usually rate limiting. A working copy from an earlier run is
                // processed without consulting the extension check.
                warn!(%url, error = %e, "Probe failed, checking for a local working copy");
                log.warn(&format!("# PROBE {url} failed: {e}"))?;

                let name = repository_name(url);
                let local = find_local_repository(&self.layout.repositories_dir(), &name)
                    .with_context(|| {
                        format!(
                            "Failed to list {}",
                            self.layout.repositories_dir().display()
                        )
                    })?;
                match local {
                    Some(path) => {
                        log.info(&format!("# Using local working copy {}", path.display()))?;
                        self.process_repository(url, log, report).await
                    }
                    None => {
                        report.skipped.push(SkippedRepository {
                            url: url.to_string(),
                            reason: SkipReason::ProbeFailedNoLocalCopy,
                        });
                        Ok(())
                    }
                }
            }
        }
    }

    /// Sync, discover, and execute every document of one repository.
    #[instrument(skip(self, log, report))]
    async fn process_repository(&self, url: &str, log: &mut RunLog, report: &mut RunReport) -> Result<()> {
        log.banner(&format!("REPO: {url}"))?;

        let mut synced = self.sync.sync(url, log).await?;
        if let Some(error) = synced.error.take() {
            match self.config.on_sync_failure {
                SyncFailurePolicy::Warn => {
                    log.warn("  Continuing with the working copy as found on disk")?;
                }
                SyncFailurePolicy::Skip => {
                    log.warn("  Skipping repository after sync failure")?;
                    report.skipped.push(SkippedRepository {
                        url: url.to_string(),
                        reason: SkipReason::SyncFailed,
                    });
                    return Ok(());
                }
                SyncFailurePolicy::Abort => {
                    log.error("  Aborting run after sync failure")?;
                    return Err(anyhow::Error::new(error))
                        .with_context(|| format!("Sync of {url} failed"));
                }
            }
        }

        if !synced.is_present() {
            log.error(&format!(
                "  No working copy at {}, skipping",
                synced.local_path().display()
            ))?;
            report.skipped.push(SkippedRepository {
                url: url.to_string(),
                reason: SkipReason::WorkingCopyMissing,
            });
            return Ok(());
        }

        self.execute_documents(synced.local_path(), log, report).await
    }

    async fn execute_documents(&self, working_copy: &Path, log: &mut RunLog, report: &mut RunReport) -> Result<()> {
        let discovery = NotebookDiscovery::new(&self.config.document_extension, &self.config.excluded_dirs);

        for notebook_path in discovery.discover(working_copy) {
            match self.harness.run(&notebook_path, working_copy, log).await {
                Ok(result) => report.results.push(result),
                Err(e) if e.is_document_scoped() => {
                    warn!(notebook = %notebook_path.display(), error = %e, "Notebook rejected");
                    log.error(&format!("  REJECTED {}: {e}", notebook_path.display()))?;
                    report.rejected.push(RejectedDocument {
                        notebook_path,
                        reason: e.to_string(),
                    });
                }
                Err(e) => {
                    return Err(anyhow::Error::new(e))
                        .with_context(|| format!("Failed to process {}", notebook_path.display()));
                }
            }
        }
        Ok(())
    }
}
