//! Core components of the nbsweep notebook harness
//!
//! Catalog retrieval, forge probing, working copy sync, notebook discovery,
//! and isolated notebook execution. The runner crate wires these together.

pub mod catalog;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod forge;
pub mod harness;
pub mod mock;
pub mod notebook;
pub mod run_log;
pub mod sync;
pub mod workspace;

pub use catalog::HttpCatalogProvider;
pub use discovery::NotebookDiscovery;
pub use engine::{KernelRegistry, NotebookExecutor, PapermillExecutor};
pub use error::{
    ArtifactError, CatalogError, ExecutionError, HarnessError, MetadataError, ProbeError, SyncError,
};
pub use forge::{select_forge_resources, ForgeClient};
pub use harness::NotebookExecutionHarness;
pub use run_log::RunLog;
pub use sync::{GitCli, RepositorySyncManager, SyncReport, VersionControl};
pub use workspace::{repository_name, WorkspaceLayout};
