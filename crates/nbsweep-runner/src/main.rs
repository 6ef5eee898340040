use anyhow::{Context, Result};
use clap::Parser;
use dotenvy::dotenv;
use nbsweep_runner::{config::HarnessConfig, run_batch};
use nbsweep_types::SyncFailurePolicy;
use opentelemetry::global::{self};
use opentelemetry::trace::TracerProvider;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::trace as sdktrace;
use std::path::PathBuf;
use tracing::{info, subscriber};
use tracing_subscriber::{EnvFilter, Registry, prelude::*};

/// Clone or update the notebook repositories listed in a learning-resource
/// catalog and execute every notebook, recording outcomes in `tests/LOG.txt`.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// YAML config file. Environment variables and flags override its values.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Workspace root holding `repositories/` and `tests/`.
    #[arg(short, long)]
    workspace: Option<PathBuf>,

    #[arg(long)]
    catalog_url: Option<String>,

    /// Per-cell execution timeout in seconds.
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// What to do when clone or update fails: warn, skip, or abort.
    #[arg(long)]
    on_sync_failure: Option<SyncFailurePolicy>,

    /// Kernel name the engine may run. Repeat to allow several.
    #[arg(long = "kernel")]
    kernels: Vec<String>,
}

impl Cli {
    fn apply(self, mut config: HarnessConfig) -> HarnessConfig {
        if let Some(workspace) = self.workspace {
            config.workspace = workspace;
        }
        if let Some(url) = self.catalog_url {
            config.catalog_url = url;
        }
        if let Some(secs) = self.timeout_secs {
            config.execution_timeout_secs = secs;
        }
        if let Some(policy) = self.on_sync_failure {
            config.on_sync_failure = policy;
        }
        if !self.kernels.is_empty() {
            config.kernels = self.kernels;
        }
        config
    }
}

/// Initializes the OpenTelemetry pipeline for tracing.
fn init_tracing() -> Result<sdktrace::SdkTracerProvider> {
    let provider = sdktrace::SdkTracerProvider::builder()
        .with_resource(Resource::builder().with_service_name("nbsweep-runner").build())
        .build();
    let tracer = provider.tracer("nbsweep-runner");
    global::set_tracer_provider(provider.clone());

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,nbsweep_lib=debug,nbsweep_runner=debug"));

    let subscriber = Registry::default()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .with(tracing_opentelemetry::layer().with_tracer(tracer));

    subscriber::set_global_default(subscriber)
        .context("Failed to set global default tracing subscriber")?;

    Ok(provider)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let provider = init_tracing()?;

    let cli = Cli::parse();

    let base = match &cli.config {
        Some(path) => HarnessConfig::from_yaml_file(path)?,
        None => HarnessConfig::default(),
    };
    let config = cli.apply(base.with_env()?);
    info!(
        workspace = %config.workspace.display(),
        catalog = %config.catalog_url,
        policy = %config.on_sync_failure,
        "Starting notebook sweep"
    );

    let outcome = run_batch(&config).await;

    if let Err(e) = provider.shutdown() {
        eprintln!("Failed to shut down tracer provider: {e}");
    }
    outcome.map(|_| ())
}
