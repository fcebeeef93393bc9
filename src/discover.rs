//! Candidate module discovery.
//!
//! Walks the source roots breadth-first over an explicit queue of pending
//! directories. Each directory is expanded into its immediate children in one
//! step: matching files are yielded, subdirectories are queued.

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::{IgnoreSet, SOURCE_EXTENSION};

/// One discovered module, consumed exactly once by an extraction worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleTask {
    pub module_path: PathBuf,
}

impl ModuleTask {
    pub fn new(module_path: impl Into<PathBuf>) -> Self {
        Self {
            module_path: module_path.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("cannot read directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("source root does not exist: {0}")]
    MissingRoot(PathBuf),
}

impl DiscoveryError {
    pub fn path(&self) -> &Path {
        match self {
            DiscoveryError::ReadDir { path, .. } => path,
            DiscoveryError::MissingRoot(path) => path,
        }
    }
}

/// Lazy iterator over candidate module paths.
///
/// Errors are yielded in-line; a failing directory never stops the walk of
/// other directories or roots.
pub struct ModuleDiscovery {
    roots: VecDeque<PathBuf>,
    pending: VecDeque<PathBuf>,
    ready: VecDeque<Result<PathBuf, DiscoveryError>>,
    visited: HashSet<PathBuf>,
    emitted: HashSet<PathBuf>,
    ignore: IgnoreSet,
}

impl ModuleDiscovery {
    pub fn new<I>(roots: I, ignore: IgnoreSet) -> Self
    where
        I: IntoIterator<Item = PathBuf>,
    {
        Self {
            roots: roots.into_iter().collect(),
            pending: VecDeque::new(),
            ready: VecDeque::new(),
            visited: HashSet::new(),
            emitted: HashSet::new(),
            ignore,
        }
    }

    fn start_root(&mut self, root: PathBuf) {
        if root.is_file() {
            // Files named directly skip the directory ignore list.
            if self.accepts_file(&root) {
                self.emit(root);
            } else {
                debug!(path = %root.display(), "root file filtered out");
            }
        } else if root.is_dir() {
            let ignored = root
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|name| self.ignore.is_directory_ignored(name));
            if ignored {
                debug!(path = %root.display(), "root directory is ignored");
            } else {
                self.pending.push_back(root);
            }
        } else {
            self.ready.push_back(Err(DiscoveryError::MissingRoot(root)));
        }
    }

    fn expand(&mut self, dir: PathBuf) {
        // Canonical paths guard against symlink cycles.
        let key = dir.canonicalize().unwrap_or_else(|_| dir.clone());
        if !self.visited.insert(key) {
            debug!(path = %dir.display(), "directory already visited");
            return;
        }

        let children = WalkDir::new(&dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(false)
            .sort_by_file_name();

        for entry in children {
            let entry = match entry {
                Ok(entry) => entry,
                Err(source) => {
                    let path = source.path().map(Path::to_path_buf).unwrap_or_else(|| dir.clone());
                    self.ready.push_back(Err(DiscoveryError::ReadDir { path, source }));
                    continue;
                }
            };

            let path = entry.into_path();
            if path.is_dir() {
                let ignored = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|name| self.ignore.is_directory_ignored(name));
                if !ignored {
                    self.pending.push_back(path);
                }
            } else if path.is_file() && self.accepts_file(&path) {
                self.emit(path);
            }
        }
    }

    /// Queue a module unless it was already emitted under another spelling,
    /// e.g. a file root that also lies under a directory root.
    fn emit(&mut self, path: PathBuf) {
        let key = path.canonicalize().unwrap_or_else(|_| path.clone());
        if self.emitted.insert(key) {
            self.ready.push_back(Ok(path));
        } else {
            debug!(path = %path.display(), "module already discovered");
        }
    }

    fn accepts_file(&self, path: &Path) -> bool {
        has_source_extension(path) && !self.ignore.is_file_ignored(path)
    }
}

impl Iterator for ModuleDiscovery {
    type Item = Result<PathBuf, DiscoveryError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.ready.pop_front() {
                return Some(item);
            }
            if let Some(dir) = self.pending.pop_front() {
                self.expand(dir);
                continue;
            }
            match self.roots.pop_front() {
                Some(root) => self.start_root(root),
                None => return None,
            }
        }
    }
}

pub fn has_source_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e == SOURCE_EXTENSION)
}

/// Collect every module under the roots, logging and skipping errors.
pub fn discover_modules(roots: &[PathBuf], ignore: &IgnoreSet) -> Vec<PathBuf> {
    ModuleDiscovery::new(roots.iter().cloned(), ignore.clone())
        .filter_map(|item| match item {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(path = %e.path().display(), "discovery error: {}", e);
                None
            }
        })
        .collect()
}
