//! Execution engines and kernel dispatch
//!
//! A [`NotebookExecutor`] runs a notebook's cells in order against a working
//! directory, writing captured outputs back into the notebook as it goes. The
//! [`KernelRegistry`] maps the kernel name found in a notebook's metadata to
//! the executor that can run it.

pub mod papermill;

pub use papermill::PapermillExecutor;

use crate::error::{ExecutionError, HarnessError};
use crate::notebook::Notebook;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

#[async_trait]
pub trait NotebookExecutor: Send + Sync {
    /// Execute `notebook` in place with `working_dir` as the kernel's cwd.
    ///
    /// On failure the notebook still holds the outputs of every cell that ran
    /// before the failing one, plus the failing cell's error output.
    async fn execute(
        &self,
        notebook: &mut Notebook,
        kernel_name: &str,
        working_dir: &Path,
        timeout: Duration,
    ) -> Result<(), ExecutionError>;

    fn name(&self) -> &str;
}

/// Kernel name to executor lookup, with an optional fallback for any other name.
#[derive(Clone, Default)]
pub struct KernelRegistry {
    executors: HashMap<String, Arc<dyn NotebookExecutor>>,
    fallback: Option<Arc<dyn NotebookExecutor>>,
}

impl KernelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, kernel_name: impl Into<String>, executor: Arc<dyn NotebookExecutor>) -> Self {
        self.executors.insert(kernel_name.into(), executor);
        self
    }

    pub fn with_fallback(mut self, executor: Arc<dyn NotebookExecutor>) -> Self {
        self.fallback = Some(executor);
        self
    }

    pub fn resolve(&self, kernel_name: &str) -> Result<Arc<dyn NotebookExecutor>, HarnessError> {
        self.executors
            .get(kernel_name)
            .or(self.fallback.as_ref())
            .cloned()
            .ok_or_else(|| HarnessError::UnsupportedKernel {
                kernel: kernel_name.to_string(),
            })
    }

    pub fn kernels(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.executors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
