//! Guarded relocation of one file into its category folder.
//!
//! Protocol: link, containment and protected-name checks, free-space
//! check, busy probe, dated backup, classification, collision-free
//! destination, move, then either drop the backup (success) or restore
//! from it (failure). At every step the file exists at least once on disk.

use chrono::Local;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

use super::classifier;
use crate::common::config::Config;
use crate::common::fsops::FileOps;
use crate::common::safety;

/// Result of one relocation attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "destination", rename_all = "snake_case")]
pub enum MoveOutcome {
    /// Moved; carries the final destination path
    Success(PathBuf),
    FileInUse,
    InsufficientSpace,
    BackupFailed,
    MoveFailed,
    /// Unknown type, a link, a protected file or a path outside the
    /// watched folder
    InvalidPath,
}

impl MoveOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, MoveOutcome::Success(_))
    }
}

impl fmt::Display for MoveOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MoveOutcome::Success(dest) => write!(f, "moved to {}", dest.display()),
            MoveOutcome::FileInUse => write!(f, "file in use"),
            MoveOutcome::InsufficientSpace => write!(f, "insufficient disk space"),
            MoveOutcome::BackupFailed => write!(f, "backup failed"),
            MoveOutcome::MoveFailed => write!(f, "move failed"),
            MoveOutcome::InvalidPath => write!(f, "invalid path or unknown type"),
        }
    }
}

/// `dir/name`, or `dir/stem_<unix time>[_n].ext` when that is already taken
pub fn unique_destination(dir: &Path, file_name: &std::ffi::OsStr) -> PathBuf {
    let candidate = dir.join(file_name);
    if !candidate.exists() {
        return candidate;
    }

    let name = Path::new(file_name);
    let stem = name
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = name
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let stamp = Local::now().timestamp();

    let mut n = 0u32;
    loop {
        let suffix = if n == 0 {
            format!("{}_{}{}", stem, stamp, ext)
        } else {
            format!("{}_{}_{}{}", stem, stamp, n, ext)
        };
        let candidate = dir.join(suffix);
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

/// Performs the guarded move protocol. Holds no state between calls.
pub struct SafeMover<'a> {
    config: &'a Config,
    fs: &'a dyn FileOps,
}

impl<'a> SafeMover<'a> {
    pub fn new(config: &'a Config, fs: &'a dyn FileOps) -> Self {
        Self { config, fs }
    }

    /// Relocate `source` into `dest_root` (a category folder) and its subfolder
    pub fn move_file(&self, source: &Path, dest_root: &Path) -> MoveOutcome {
        let root = &self.config.watch_root;

        match std::fs::symlink_metadata(source) {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => {
                tracing::error!(path = %source.display(), "refusing to move a link or directory");
                return MoveOutcome::InvalidPath;
            }
            Err(e) => {
                tracing::error!(path = %source.display(), error = %e, "refusing to move file");
                return MoveOutcome::InvalidPath;
            }
        }
        let source = match safety::resolve_within_root(source, root) {
            Ok(p) => p,
            Err(e) => {
                tracing::error!(error = %e, "refusing to move file");
                return MoveOutcome::InvalidPath;
            }
        };
        let canonical_root = root.canonicalize().unwrap_or_else(|_| root.clone());
        if safety::is_protected(&source, &canonical_root, &self.config.protected_names) {
            tracing::error!(path = %source.display(), "refusing to move a protected file");
            return MoveOutcome::InvalidPath;
        }
        let dest_root = match safety::resolve_target_within_root(dest_root, root) {
            Ok(p) => p,
            Err(e) => {
                tracing::error!(error = %e, "refusing to move into destination");
                return MoveOutcome::InvalidPath;
            }
        };
        let Some(file_name) = source.file_name().map(|n| n.to_os_string()) else {
            return MoveOutcome::InvalidPath;
        };

        // 1. Free space on the destination volume
        let floor = self.config.min_free_space_bytes();
        if floor > 0 {
            match self.fs.available_space(&dest_root) {
                Some(free) if free >= floor => {}
                Some(free) => {
                    tracing::error!(free, floor, "insufficient disk space");
                    return MoveOutcome::InsufficientSpace;
                }
                None => {
                    tracing::error!(dest = %dest_root.display(), "could not determine free space");
                    return MoveOutcome::InsufficientSpace;
                }
            }
        }

        // 2. Busy probe
        if let Err(e) = self.fs.probe_exclusive(&source) {
            tracing::warn!(path = %source.display(), error = %e, "file in use");
            return MoveOutcome::FileInUse;
        }

        // 3. Backup copy
        let backup = match self.create_backup(&source, &file_name) {
            Ok(b) => b,
            Err(e) => {
                tracing::error!(path = %source.display(), error = %e, "backup failed");
                return MoveOutcome::BackupFailed;
            }
        };

        // 4. Classification
        let Some(category) = classifier::classify(&self.config.categories, &source) else {
            tracing::info!(path = %source.display(), "unknown file type");
            self.discard_backup(&backup);
            return MoveOutcome::InvalidPath;
        };

        // 5. Destination
        let dest_dir = match classifier::subfolder(category, &source) {
            Some(sub) => dest_root.join(&sub.name),
            None => dest_root.clone(),
        };
        if let Err(e) = std::fs::create_dir_all(&dest_dir) {
            tracing::error!(dest = %dest_dir.display(), error = %e, "could not create destination");
            self.discard_backup(&backup);
            return MoveOutcome::MoveFailed;
        }
        let destination = unique_destination(&dest_dir, &file_name);

        // 6. Move
        match self.fs.move_path(&source, &destination) {
            Ok(()) => {
                tracing::info!(
                    from = %source.display(),
                    to = %destination.display(),
                    "moved file"
                );
                // 7. Drop the backup
                self.discard_backup(&backup);
                MoveOutcome::Success(destination)
            }
            Err(e) => {
                tracing::error!(path = %source.display(), error = %e, "move failed");
                // 8. Restore from backup
                self.restore(&backup, &source);
                MoveOutcome::MoveFailed
            }
        }
    }

    fn create_backup(&self, source: &Path, file_name: &std::ffi::OsStr) -> std::io::Result<PathBuf> {
        let dir = self
            .config
            .backup_dir()
            .join(Local::now().format("%Y%m%d").to_string());
        std::fs::create_dir_all(&dir)?;
        let backup = unique_destination(&dir, file_name);
        if let Err(e) = self.fs.copy(source, &backup) {
            let _ = self.fs.remove_file(&backup);
            return Err(e);
        }
        tracing::debug!(from = %source.display(), to = %backup.display(), "backed up file");
        Ok(backup)
    }

    fn discard_backup(&self, backup: &Path) {
        if let Err(e) = self.fs.remove_file(backup) {
            tracing::warn!(path = %backup.display(), error = %e, "failed to delete backup");
        }
    }

    /// Bring the original back after a failed move. The backup is only
    /// deleted once the original is confirmed present again.
    fn restore(&self, backup: &Path, original: &Path) {
        if !original.exists() {
            match self.fs.copy(backup, original) {
                Ok(_) => {
                    tracing::info!(from = %backup.display(), to = %original.display(), "restored file from backup");
                }
                Err(e) => {
                    let _ = self.fs.remove_file(original);
                    tracing::error!(
                        backup = %backup.display(),
                        error = %e,
                        "restore from backup failed, backup kept"
                    );
                    return;
                }
            }
        }
        self.discard_backup(backup);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_unique_destination_free_name() {
        let dir = TempDir::new().unwrap();
        let dest = unique_destination(dir.path(), std::ffi::OsStr::new("a.pdf"));
        assert_eq!(dest, dir.path().join("a.pdf"));
    }

    #[test]
    fn test_unique_destination_never_reuses() {
        let dir = TempDir::new().unwrap();
        let name = std::ffi::OsStr::new("a.pdf");
        for _ in 0..3 {
            let dest = unique_destination(dir.path(), name);
            assert!(!dest.exists());
            std::fs::write(&dest, "x").unwrap();
        }
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 3);
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(MoveOutcome::FileInUse.to_string(), "file in use");
        assert!(MoveOutcome::Success(PathBuf::from("/x")).is_success());
        assert!(!MoveOutcome::MoveFailed.is_success());
    }
}
