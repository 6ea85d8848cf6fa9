use std::fmt;
use std::path::{Path, PathBuf};

use super::cache::ProcessedCache;
use crate::common::config::Config;
use crate::common::safety;

/// Why a detected path was not queued
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// A directory, a symlink, or the file is already gone
    NotAFile,
    AlreadyProcessed,
    Protected,
    TooLarge { size: u64, limit: u64 },
    OutsideRoot,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::NotAFile => write!(f, "not a file"),
            Rejection::AlreadyProcessed => write!(f, "already processed"),
            Rejection::Protected => write!(f, "protected path"),
            Rejection::TooLarge { size, limit } => write!(
                f,
                "too large ({} > {})",
                crate::common::format::format_size(*size),
                crate::common::format::format_size(*limit)
            ),
            Rejection::OutsideRoot => write!(f, "outside the watched folder"),
        }
    }
}

/// Gate deciding whether a detected path is eligible for processing
#[derive(Debug, Clone)]
pub struct AdmissionFilter {
    root: PathBuf,
    protected: Vec<String>,
    max_size: u64,
}

impl AdmissionFilter {
    pub fn new(config: &Config) -> Self {
        Self {
            root: config.watch_root.clone(),
            protected: config.protected_names.clone(),
            max_size: config.max_file_size_bytes(),
        }
    }

    /// Run the checks in order: regular file exists, not cached, not
    /// protected, under the size ceiling, resolves inside the root.
    ///
    /// Symlinks are never admitted: the mover acts on the link target,
    /// which may sit in a protected or already-organized folder.
    pub fn check(&self, path: &Path, cache: &ProcessedCache) -> Result<(), Rejection> {
        let metadata = std::fs::symlink_metadata(path).map_err(|_| Rejection::NotAFile)?;
        if !metadata.is_file() {
            return Err(Rejection::NotAFile);
        }

        if cache.contains(path) {
            return Err(Rejection::AlreadyProcessed);
        }

        if safety::is_protected(path, &self.root, &self.protected) {
            return Err(Rejection::Protected);
        }

        if metadata.len() > self.max_size {
            tracing::warn!(
                path = %path.display(),
                size = metadata.len(),
                "file too large, skipping"
            );
            return Err(Rejection::TooLarge {
                size: metadata.len(),
                limit: self.max_size,
            });
        }

        if safety::resolve_within_root(path, &self.root).is_err() {
            tracing::error!(path = %path.display(), "path resolves outside the watched folder");
            return Err(Rejection::OutsideRoot);
        }

        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
