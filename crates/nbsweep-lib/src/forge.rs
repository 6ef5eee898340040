//! Forge-side selection and probing
//!
//! [`select_forge_resources`] keeps the catalog entries hosted on the forge,
//! and [`ForgeClient::probe`] asks the forge's contents API whether a
//! repository's root holds a matching document.
//!
//! The probe looks at the repository root only. Documents that live solely in
//! subdirectories make the probe come back negative even though discovery
//! would find them in a working copy.

use crate::catalog::USER_AGENT;
use crate::error::ProbeError;
use anyhow::{Context, Result};
use nbsweep_types::Resource;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

/// Marker separating the forge host from `owner/name` in a web url.
pub const DEFAULT_HOST_MARKER: &str = "github.com/";

/// Catalog entries whose url starts with `web_prefix`, in catalog order.
pub fn select_forge_resources(resources: &[Resource], web_prefix: &str) -> Vec<Resource> {
    resources
        .iter()
        .filter(|resource| resource.url.starts_with(web_prefix))
        .cloned()
        .collect()
}

/// Split a repository web url into `(owner, name)`.
///
/// Only `owner/name` urls name a repository. Deeper urls (`/tree/<branch>`,
/// `/blob/...`) are rejected, since sync would clone and name them by their
/// last segment instead.
pub fn parse_owner_and_name(url: &str, host_marker: &str) -> Result<(String, String), ProbeError> {
    let invalid = || ProbeError::InvalidUrl {
        url: url.to_string(),
    };
    let (_, tail) = url.split_once(host_marker).ok_or_else(invalid)?;
    let mut segments = tail.split('/').filter(|segment| !segment.is_empty());
    let owner = segments.next().ok_or_else(invalid)?;
    let name = segments.next().ok_or_else(invalid)?;
    if segments.next().is_some() {
        return Err(invalid());
    }
    let name = name.strip_suffix(".git").unwrap_or(name);
    Ok((owner.to_string(), name.to_string()))
}

/// One entry of a contents listing. Only the name matters here.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ContentEntry {
    pub name: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

/// True if any top-level entry name ends with `extension`.
pub fn contains_extension(entries: &[ContentEntry], extension: &str) -> bool {
    entries.iter().any(|entry| entry.name.ends_with(extension))
}

/// Client for the forge's repository contents API.
pub struct ForgeClient {
    client: Client,
    api_root: String,
    host_marker: String,
    token: Option<String>,
}

impl ForgeClient {
    pub fn new(api_root: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to create HTTP client for the forge API")?;
        Ok(Self {
            client,
            api_root: api_root.into().trim_end_matches('/').to_string(),
            host_marker: DEFAULT_HOST_MARKER.to_string(),
            token: None,
        })
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn with_host_marker(mut self, marker: impl Into<String>) -> Self {
        self.host_marker = marker.into();
        self
    }

    /// `GET {api_root}/repos/{owner}/{name}/contents`, non-recursive.
    pub async fn list_root(&self, repo_url: &str) -> Result<Vec<ContentEntry>, ProbeError> {
        let (owner, name) = parse_owner_and_name(repo_url, &self.host_marker)?;
        let url = format!("{}/repos/{owner}/{name}/contents", self.api_root);
        debug!(%url, "Listing repository root");

        let mut request = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|source| ProbeError::Transport {
            url: url.clone(),
            source,
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProbeError::Status {
                url,
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|source| ProbeError::Transport {
            url: url.clone(),
            source,
        })?;
        serde_json::from_str(&body).map_err(|e| ProbeError::Decode {
            url,
            message: e.to_string(),
        })
    }

    /// Whether the repository root holds a file ending with `extension`.
    #[instrument(skip(self), err)]
    pub async fn probe(&self, repo_url: &str, extension: &str) -> Result<bool, ProbeError> {
        let entries = self.list_root(repo_url).await?;
        let found = contains_extension(&entries, extension);
        debug!(entries = entries.len(), found, "Probe completed");
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn entry(name: &str) -> ContentEntry {
        ContentEntry {
            name: name.to_string(),
            kind: Some("file".to_string()),
        }
    }

    #[test]
    fn test_select_forge_resources_preserves_order() {
        let resources = vec![
            Resource::new("https://github.com/acme/one"),
            Resource::new("https://daac.ornl.gov/guide"),
            Resource::new("https://github.com/acme/two"),
            Resource::new("http://github.com/acme/insecure"),
            Resource::new("https://gitlab.com/acme/three"),
        ];

        let selected = select_forge_resources(&resources, "https://github.com/");
        let urls: Vec<_> = selected.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls, vec!["https://github.com/acme/one", "https://github.com/acme/two"]);

        // Stable for identical input.
        assert_eq!(select_forge_resources(&resources, "https://github.com/"), selected);
    }

    #[test]
    fn test_select_from_empty_catalog() {
        assert!(select_forge_resources(&[], "https://github.com/").is_empty());
    }

    #[rstest]
    #[case("https://github.com/acme/demo", "acme", "demo")]
    #[case("https://github.com/acme/demo/", "acme", "demo")]
    #[case("https://github.com/acme/demo.git", "acme", "demo")]
    fn test_parse_owner_and_name(#[case] url: &str, #[case] owner: &str, #[case] name: &str) {
        let parsed = parse_owner_and_name(url, DEFAULT_HOST_MARKER).unwrap();
        assert_eq!(parsed, (owner.to_string(), name.to_string()));
    }

    #[rstest]
    #[case("https://gitlab.com/acme/demo")]
    #[case("https://github.com/acme")]
    #[case("https://github.com/")]
    #[case("https://github.com/acme/demo/tree/main")]
    #[case("https://github.com/acme/demo/blob/main/analysis.ipynb")]
    fn test_parse_owner_and_name_rejects(#[case] url: &str) {
        assert!(matches!(
            parse_owner_and_name(url, DEFAULT_HOST_MARKER),
            Err(ProbeError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_contains_extension_checks_names_only() {
        let entries = vec![entry("README.md"), entry("analysis.ipynb")];
        assert!(contains_extension(&entries, ".ipynb"));

        let entries = vec![entry("README.md"), entry("notebooks")];
        assert!(!contains_extension(&entries, ".ipynb"));
        assert!(!contains_extension(&[], ".ipynb"));
    }
}
