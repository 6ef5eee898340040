use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// What the orchestrator does when a clone or update exits unsuccessfully.
#[derive(
    Debug, Clone, Copy, Default, Display, EnumString, PartialEq, Eq, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SyncFailurePolicy {
    /// Log a warning and carry on with whatever is on disk.
    #[default]
    Warn,
    /// Skip the repository.
    Skip,
    /// Abort the whole run.
    Abort,
}
