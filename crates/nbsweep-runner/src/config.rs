//! Configuration for a harness run
//!
//! Values are layered: built-in defaults, then an optional YAML file, then
//! environment variables, then command line flags.

use nbsweep_lib::discovery::CHECKPOINT_DIR;
use nbsweep_types::SyncFailurePolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Error types for configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Root holding `repositories/` and `tests/`.
    pub workspace: PathBuf,

    pub catalog_url: String,

    /// Local catalog copy; `<workspace>/resources.json` when unset.
    pub catalog_fallback: Option<PathBuf>,

    /// Catalog entries are kept only when their url starts with this.
    pub forge_web_prefix: String,

    pub forge_api_root: String,

    #[serde(skip_serializing)]
    pub forge_token: Option<String>,

    pub document_extension: String,

    /// Directory names never descended into during discovery.
    pub excluded_dirs: Vec<String>,

    pub execution_timeout_secs: u64,

    pub http_timeout_secs: u64,

    pub git_command: String,

    /// Branch to pull on update; the remote's default branch when unset.
    pub update_branch: Option<String>,

    pub engine_command: String,

    /// Kernel names the engine may run. Empty means any kernel name.
    pub kernels: Vec<String>,

    pub on_sync_failure: SyncFailurePolicy,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            workspace: PathBuf::from("."),
            catalog_url: "https://daac.ornl.gov/js/learning.json".to_string(),
            catalog_fallback: None,
            forge_web_prefix: "https://github.com/".to_string(),
            forge_api_root: "https://api.github.com".to_string(),
            forge_token: None,
            document_extension: ".ipynb".to_string(),
            excluded_dirs: vec![CHECKPOINT_DIR.to_string()],
            execution_timeout_secs: 900,
            http_timeout_secs: 30,
            git_command: "git".to_string(),
            update_branch: None,
            engine_command: "papermill".to_string(),
            kernels: Vec::new(),
            on_sync_failure: SyncFailurePolicy::Warn,
        }
    }
}

impl HarnessConfig {
    /// Load a YAML config file. Missing keys keep their defaults.
    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Overlay environment variables onto this configuration.
    pub fn with_env(mut self) -> Result<Self, ConfigError> {
        if let Ok(path) = std::env::var("NBSWEEP_WORKSPACE") {
            self.workspace = PathBuf::from(path);
        }

        if let Ok(url) = std::env::var("NBSWEEP_CATALOG_URL") {
            self.catalog_url = url;
        }

        if let Ok(path) = std::env::var("NBSWEEP_CATALOG_FALLBACK") {
            self.catalog_fallback = Some(PathBuf::from(path));
        }

        if let Ok(url) = std::env::var("NBSWEEP_FORGE_API_ROOT") {
            self.forge_api_root = url;
        }

        if let Ok(token) = std::env::var("GITHUB_TOKEN") {
            self.forge_token = Some(token);
        }

        if let Ok(secs) = std::env::var("NBSWEEP_EXECUTION_TIMEOUT_SECS") {
            self.execution_timeout_secs = secs.parse().map_err(|_| ConfigError::Invalid {
                message: format!("NBSWEEP_EXECUTION_TIMEOUT_SECS is not a number: '{secs}'"),
            })?;
        }

        if let Ok(policy) = std::env::var("NBSWEEP_ON_SYNC_FAILURE") {
            self.on_sync_failure = policy.parse().map_err(|_| ConfigError::Invalid {
                message: format!("NBSWEEP_ON_SYNC_FAILURE must be warn, skip or abort, got '{policy}'"),
            })?;
        }

        if let Ok(command) = std::env::var("NBSWEEP_ENGINE_COMMAND") {
            self.engine_command = command;
        }

        if let Ok(command) = std::env::var("NBSWEEP_GIT_COMMAND") {
            self.git_command = command;
        }

        Ok(self)
    }

    /// Defaults overlaid with the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env()
    }

    pub fn catalog_fallback_path(&self) -> PathBuf {
        self.catalog_fallback
            .clone()
            .unwrap_or_else(|| self.workspace.join("resources.json"))
    }

    pub fn execution_timeout(&self) -> Duration {
        Duration::from_secs(self.execution_timeout_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: &str| {
            Err(ConfigError::Invalid {
                message: message.to_string(),
            })
        };

        if !self.document_extension.starts_with('.') || self.document_extension.len() < 2 {
            return invalid("document_extension must look like '.ipynb'");
        }

        if self.execution_timeout_secs == 0 {
            return invalid("execution_timeout_secs must be greater than 0");
        }

        if self.http_timeout_secs == 0 {
            return invalid("http_timeout_secs must be greater than 0");
        }

        if !self.forge_web_prefix.ends_with('/') {
            return invalid("forge_web_prefix must end with '/'");
        }

        if self.workspace.as_os_str().is_empty() {
            return invalid("workspace cannot be empty");
        }

        if self.git_command.is_empty() || self.engine_command.is_empty() {
            return invalid("git_command and engine_command cannot be empty");
        }

        Ok(())
    }
}
