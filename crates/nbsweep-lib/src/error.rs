//! Error kinds for every pipeline stage
//!
//! Each stage reports its own kind so the orchestrator can decide per kind
//! whether to abort the run, recover with a fallback, or move on.

use std::path::PathBuf;

/// Neither the remote catalog nor the local copy could be read. Fatal.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Catalog unavailable: remote failed ({remote}); local fallback '{}' failed ({local})", path.display())]
    Unavailable {
        remote: String,
        path: PathBuf,
        local: String,
    },
}

/// The forge contents listing could not be consulted.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("Cannot derive owner/name from repository url '{url}'")]
    InvalidUrl { url: String },

    #[error("Contents request for '{url}' failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Contents request for '{url}' returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Contents response for '{url}' could not be decoded: {message}")]
    Decode { url: String, message: String },
}

/// A clone or update subprocess did not complete successfully.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{command}' exited with {}: {stderr}", code.map(|c| c.to_string()).unwrap_or_else(|| "signal".to_string()))]
    ExitStatus {
        command: String,
        code: Option<i32>,
        stderr: String,
    },
}

/// A notebook could not be loaded well enough to pick an execution environment.
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("Failed to read notebook '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Notebook '{}' is not valid notebook JSON: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Notebook has no kernelspec name in its metadata")]
    MissingKernelSpec,
}

/// Execution of a notebook failed. Isolated per document.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("Cell execution failed [{ename}]: {evalue}")]
    Cell {
        ename: String,
        evalue: String,
        traceback: Vec<String>,
    },

    #[error("Cell execution timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Execution engine failed: {message}")]
    Engine { message: String },
}

/// The artifact for an execution attempt could not be persisted. Fatal.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("Failed to create artifact directory '{}': {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write artifact '{}': {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize artifact '{}': {source}", path.display())]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors that escape the execution harness instead of becoming a failed result.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error("No executor is registered for kernel '{kernel}'")]
    UnsupportedKernel { kernel: String },

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error("Failed to write run log: {0}")]
    Log(#[from] std::io::Error),
}

impl HarnessError {
    /// Errors that stop the current document but not the batch.
    pub fn is_document_scoped(&self) -> bool {
        matches!(
            self,
            HarnessError::Metadata(_) | HarnessError::UnsupportedKernel { .. }
        )
    }
}
