//! Catalog retrieval with a local-file fallback

use crate::error::CatalogError;
use anyhow::{Context, Result};
use nbsweep_types::{Catalog, Resource};
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

pub const USER_AGENT: &str = concat!("nbsweep/", env!("CARGO_PKG_VERSION"));

/// Fetches the catalog from a remote url, falling back to a local JSON file
/// with the same shape.
pub struct HttpCatalogProvider {
    client: Client,
    url: String,
    fallback_path: PathBuf,
}

impl HttpCatalogProvider {
    pub fn new(url: impl Into<String>, fallback_path: impl Into<PathBuf>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to create HTTP client for catalog retrieval")?;
        Ok(Self {
            client,
            url: url.into(),
            fallback_path: fallback_path.into(),
        })
    }

    /// Every resource in the catalog, in published order.
    #[instrument(skip_all, fields(url = %self.url))]
    pub async fn fetch(&self) -> Result<Vec<Resource>, CatalogError> {
        let remote_error = match self.fetch_remote().await {
            Ok(catalog) => {
                info!(resources = catalog.data.len(), "Retrieved remote catalog");
                return Ok(catalog.data);
            }
            Err(e) => e,
        };

        warn!(error = %remote_error, fallback = %self.fallback_path.display(), "Remote catalog unavailable, reading local copy");

        match read_catalog_file(&self.fallback_path) {
            Ok(catalog) => {
                info!(resources = catalog.data.len(), "Read local catalog");
                Ok(catalog.data)
            }
            Err(local_error) => Err(CatalogError::Unavailable {
                remote: format!("{remote_error:#}"),
                path: self.fallback_path.clone(),
                local: format!("{local_error:#}"),
            }),
        }
    }

    async fn fetch_remote(&self) -> Result<Catalog> {
        debug!("Requesting remote catalog");
        let response = self.client.get(&self.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("HTTP {status}");
        }
        let catalog = response
            .json::<Catalog>()
            .await
            .context("Catalog response is not a valid catalog document")?;
        Ok(catalog)
    }
}

pub fn read_catalog_file(path: &Path) -> Result<Catalog> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
}
