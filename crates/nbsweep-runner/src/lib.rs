pub mod config;
pub mod orchestrator;

use anyhow::{Context, Result};
use config::HarnessConfig;
use nbsweep_lib::{
    ForgeClient, GitCli, HttpCatalogProvider, KernelRegistry, PapermillExecutor, RunLog, VersionControl,
    WorkspaceLayout,
};
use orchestrator::{Orchestrator, RunReport};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Executor registry backed by the configured engine command.
///
/// With no kernel allow-list every kernel name resolves to the engine; otherwise
/// only the listed names do.
pub fn build_kernel_registry(config: &HarnessConfig) -> KernelRegistry {
    let engine = Arc::new(PapermillExecutor::new(&config.engine_command));
    if config.kernels.is_empty() {
        return KernelRegistry::new().with_fallback(engine);
    }
    config
        .kernels
        .iter()
        .fold(KernelRegistry::new(), |registry, kernel| registry.register(kernel, engine.clone()))
}

/// Run one full batch with git and the configured engine.
pub async fn run_batch(config: &HarnessConfig) -> Result<RunReport> {
    let git = GitCli::new(&config.git_command);
    let registry = build_kernel_registry(config);
    run_batch_with(config, &git, &registry).await
}

/// Run one full batch with the given version control and executors.
///
/// The catalog is fetched before anything touches `repositories/`; if neither
/// the remote nor the local copy is usable the run ends there.
#[instrument(skip_all, fields(workspace = %config.workspace.display()))]
pub async fn run_batch_with(
    config: &HarnessConfig,
    vcs: &dyn VersionControl,
    registry: &KernelRegistry,
) -> Result<RunReport> {
    config.validate()?;

    let layout = WorkspaceLayout::new(&config.workspace);
    layout.prepare()?;
    let mut log = RunLog::open(layout.run_log_path())
        .with_context(|| format!("Failed to open run log {}", layout.run_log_path().display()))?;
    info!(run_id = %log.run_id(), log = %log.path().display(), "Run started");

    let catalog = HttpCatalogProvider::new(
        &config.catalog_url,
        config.catalog_fallback_path(),
        config.http_timeout(),
    )?;
    let resources = match catalog.fetch().await {
        Ok(resources) => resources,
        Err(e) => {
            error!(error = %e, "Catalog unavailable");
            return finish_run(log, Err(e.into()));
        }
    };
    log.info(&format!("# Catalog lists {} resources", resources.len()))?;

    let forge = ForgeClient::new(&config.forge_api_root, config.http_timeout())?
        .with_token(config.forge_token.clone());

    let orchestrator = Orchestrator::new(config, &layout, &forge, vcs, registry);
    let outcome = orchestrator.run(&resources, &mut log).await;

    finish_run(log, outcome)
}

/// Record how the run ended and close the log.
///
/// When the run already failed, that error is returned; a failure to record
/// it in the log is reported through `tracing` instead.
fn finish_run(mut log: RunLog, outcome: Result<RunReport>) -> Result<RunReport> {
    match outcome {
        Ok(report) => {
            info!(run_id = %log.run_id(), "Run finished");
            let path = log.path().to_path_buf();
            log.close()
                .with_context(|| format!("Failed to close run log {}", path.display()))?;
            Ok(report)
        }
        Err(e) => {
            error!(error = %e, "Run aborted");
            if let Err(log_error) = log.error(&format!("# RUN ABORTED: {e:#}")) {
                warn!(error = %log_error, "Failed to record the abort in the run log");
            }
            if let Err(log_error) = log.close() {
                warn!(error = %log_error, "Failed to close the run log");
            }
            Err(e)
        }
    }
}
