//! Finding candidate notebooks in a working copy
//!
//! Traversal prunes excluded directories before descending into them, so
//! nothing below an excluded directory is ever visited.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, FilterEntry, WalkDir};

pub const CHECKPOINT_DIR: &str = ".ipynb_checkpoints";

type Prune<'a> = Box<dyn FnMut(&DirEntry) -> bool + 'a>;

/// A lazy walk over a directory tree that never enters directories the
/// exclusion predicate matches. Yields regular files, and symlinks to regular
/// files, in traversal order. Symlinked directories are not followed.
pub struct PruningWalker<'a> {
    inner: FilterEntry<walkdir::IntoIter, Prune<'a>>,
}

impl<'a> PruningWalker<'a> {
    pub fn new<P>(root: impl AsRef<Path>, mut exclude_dir: P) -> Self
    where
        P: FnMut(&DirEntry) -> bool + 'a,
    {
        let keep: Prune<'a> = Box::new(move |entry: &DirEntry| {
            entry.depth() == 0 || !entry.file_type().is_dir() || !exclude_dir(entry)
        });
        Self {
            inner: WalkDir::new(root.as_ref()).into_iter().filter_entry(keep),
        }
    }
}

impl Iterator for PruningWalker<'_> {
    type Item = PathBuf;

    fn next(&mut self) -> Option<PathBuf> {
        loop {
            match self.inner.next()? {
                Ok(entry) if is_file_like(&entry) => return Some(entry.into_path()),
                Ok(_) => continue,
                // A missing root is an empty working copy, not an error.
                Err(e) if e.depth() == 0 => debug!(error = %e, "Discovery root unreadable"),
                Err(e) => warn!(error = %e, "Skipping unreadable entry during discovery"),
            }
        }
    }
}

fn is_file_like(entry: &DirEntry) -> bool {
    if entry.file_type().is_file() {
        return true;
    }
    entry.path_is_symlink()
        && std::fs::metadata(entry.path())
            .map(|target| target.is_file())
            .unwrap_or(false)
}

/// Excludes directories whose name is one of `names`.
pub fn exclude_dir_names(names: &[String]) -> impl Fn(&DirEntry) -> bool + '_ {
    move |entry| {
        let name = entry.file_name().to_string_lossy();
        names.iter().any(|excluded| *excluded == name)
    }
}

/// Notebook discovery configuration for working copies.
pub struct NotebookDiscovery<'a> {
    extension: &'a str,
    excluded_dirs: &'a [String],
}

impl<'a> NotebookDiscovery<'a> {
    pub fn new(extension: &'a str, excluded_dirs: &'a [String]) -> Self {
        Self {
            extension,
            excluded_dirs,
        }
    }

    /// Paths ending in the extension anywhere under `root`. Every call starts a fresh walk.
    pub fn discover(&self, root: &Path) -> impl Iterator<Item = PathBuf> + 'a {
        let extension = self.extension;
        PruningWalker::new(root, exclude_dir_names(self.excluded_dirs)).filter(move |path| {
            path.file_name()
                .map(|name| name.to_string_lossy().ends_with(extension))
                .unwrap_or(false)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "{}").unwrap();
    }

    fn discovered(root: &Path) -> BTreeSet<PathBuf> {
        let excluded = vec![CHECKPOINT_DIR.to_string()];
        NotebookDiscovery::new(".ipynb", &excluded)
            .discover(root)
            .collect()
    }

    #[test]
    fn test_discovers_nested_notebooks_and_prunes_checkpoints() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        touch(root, "analysis.ipynb");
        touch(root, "nested/deeper/plots.ipynb");
        touch(root, "README.md");
        touch(root, ".ipynb_checkpoints/analysis-checkpoint.ipynb");
        touch(root, "nested/.ipynb_checkpoints/plots-checkpoint.ipynb");

        let found = discovered(root);
        let expected: BTreeSet<_> = [
            root.join("analysis.ipynb"),
            root.join("nested/deeper/plots.ipynb"),
        ]
        .into_iter()
        .collect();
        assert_eq!(found, expected);
        assert!(found
            .iter()
            .all(|p| !p.components().any(|c| c.as_os_str() == CHECKPOINT_DIR)));
    }

    #[test]
    fn test_empty_and_missing_roots_yield_nothing() {
        let temp = TempDir::new().unwrap();
        assert!(discovered(temp.path()).is_empty());
        assert!(discovered(&temp.path().join("never-cloned")).is_empty());
    }

    #[test]
    fn test_discovery_is_restartable() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "a.ipynb");
        touch(temp.path(), "b/c.ipynb");
        assert_eq!(discovered(temp.path()), discovered(temp.path()));
    }

    #[test]
    fn test_pruned_directories_are_never_visited() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "keep/x.txt");
        touch(temp.path(), "skip/inner/y.txt");

        let mut visited = Vec::new();
        let files: BTreeSet<_> = PruningWalker::new(temp.path(), |entry: &DirEntry| {
            visited.push(entry.path().to_path_buf());
            entry.file_name() == "skip"
        })
        .collect();

        assert_eq!(files, [temp.path().join("keep/x.txt")].into_iter().collect());
        assert!(visited.contains(&temp.path().join("skip")));
        assert!(!visited
            .iter()
            .any(|p| p.starts_with(temp.path().join("skip/inner"))));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_notebooks_are_discovered() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("repo");
        touch(&root, "shared/source.ipynb");
        touch(temp.path(), "outside/elsewhere.ipynb");
        std::os::unix::fs::symlink(root.join("shared/source.ipynb"), root.join("linked.ipynb")).unwrap();
        std::os::unix::fs::symlink(root.join("missing.ipynb"), root.join("dangling.ipynb")).unwrap();
        // Directory links are not followed.
        std::os::unix::fs::symlink(temp.path().join("outside"), root.join("outside")).unwrap();

        let found = discovered(&root);
        let expected: BTreeSet<_> = [root.join("shared/source.ipynb"), root.join("linked.ipynb")]
            .into_iter()
            .collect();
        assert_eq!(found, expected);
    }
}
