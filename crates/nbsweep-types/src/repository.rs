use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use strum::Display;

/// Whether a working copy exists on disk.
#[derive(Debug, Clone, Copy, Display, PartialEq, Eq, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
pub enum SyncState {
    Absent,
    Present,
}

/// A remote repository and the working copy it maps to.
///
/// `local_path` is derived from the repository name embedded in
/// `remote_url`, so the same remote always maps to the same directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub remote_url: String,
    pub name: String,
    pub local_path: PathBuf,
    pub sync_state: SyncState,
}

/// Which branch of the sync manager ran.
#[derive(Debug, Clone, Copy, Display, PartialEq, Eq, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
pub enum SyncAction {
    Cloned,
    Updated,
}
