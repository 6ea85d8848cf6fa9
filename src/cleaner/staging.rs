use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::Path;

use super::manifest::{CleanManifest, ManifestItem};
use crate::common::config::Config;
use crate::common::format;
use crate::common::fsops::FileOps;

/// Move one file into the trash area
pub fn stage_file(fs: &dyn FileOps, original: &Path, staged: &Path) -> Result<()> {
    if !original.exists() {
        anyhow::bail!("Path does not exist: {}", original.display());
    }
    if let Some(parent) = staged.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create trash dir: {}", parent.display()))?;
    }
    fs.move_path(original, staged)
        .with_context(|| format!("Failed to move '{}' to trash", original.display()))
}

/// Put the files of a trash session back where they came from
pub fn restore_session(
    config: &Config,
    fs: &dyn FileOps,
    session_id: &str,
    show_progress: bool,
) -> Result<RestoreReport> {
    let mut manifest = CleanManifest::load(config, session_id)?;

    if manifest.restored {
        anyhow::bail!("Session '{}' has already been restored", session_id);
    }

    let restorable: Vec<&ManifestItem> = manifest
        .items
        .iter()
        .filter(|i| i.success && i.staged_path.is_some())
        .collect();

    if restorable.is_empty() {
        anyhow::bail!("No restorable items in session '{}'", session_id);
    }

    let pb = if show_progress {
        let pb = ProgressBar::new(restorable.len() as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.green/blue}] {pos}/{len} Restoring... {msg}")
        {
            pb.set_style(style.progress_chars("━━░"));
        }
        Some(pb)
    } else {
        None
    };

    let mut restored_count = 0usize;
    let mut restored_bytes = 0u64;
    let mut errors = Vec::new();

    for item in &restorable {
        let Some(staged_path) = item.staged_path.as_ref() else {
            continue;
        };
        let original_path = &item.original_path;

        if let Some(ref pb) = pb {
            pb.set_message(format::truncate(&format::format_path(original_path), 40));
        }

        match restore_single_path(fs, staged_path, original_path) {
            Ok(()) => {
                tracing::info!(path = %original_path.display(), "restored from trash");
                restored_count += 1;
                restored_bytes += item.size_bytes;
            }
            Err(e) => {
                tracing::warn!(path = %original_path.display(), error = %e, "restore failed");
                errors.push(format!("Failed to restore '{}': {}", original_path.display(), e));
            }
        }

        if let Some(ref pb) = pb {
            pb.inc(1);
        }
    }

    if let Some(ref pb) = pb {
        pb.finish_and_clear();
    }

    manifest.mark_restored(config)?;

    // Drop the now-empty files dir; the manifest stays until purged
    prune_empty_dirs(&manifest.files_dir(config), false);

    Ok(RestoreReport {
        session_id: session_id.to_string(),
        restored_count,
        restored_bytes,
        errors,
    })
}

fn restore_single_path(fs: &dyn FileOps, staged: &Path, original: &Path) -> Result<()> {
    if !staged.exists() {
        anyhow::bail!("Staged file no longer exists: {}", staged.display());
    }

    // Don't overwrite if something already exists at the original path
    if original.exists() {
        anyhow::bail!(
            "Original path already exists (won't overwrite): {}",
            original.display()
        );
    }

    if let Some(parent) = original.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create parent dir: {}", parent.display()))?;
    }
    fs.move_path(staged, original)?;
    Ok(())
}

/// Remove empty directories under `dir`, deepest first. A directory that
/// is not empty simply stays. Returns how many were removed.
pub fn prune_empty_dirs(dir: &Path, keep_root: bool) -> usize {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };

    let mut removed = 0;
    for entry in entries.filter_map(|e| e.ok()) {
        if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            removed += prune_empty_dirs(&entry.path(), false);
        }
    }

    if !keep_root {
        match std::fs::remove_dir(dir) {
            Ok(()) => {
                tracing::debug!(path = %dir.display(), "removed empty folder");
                removed += 1;
            }
            Err(e) => {
                tracing::trace!(path = %dir.display(), error = %e, "folder kept");
            }
        }
    }
    removed
}

/// Report from a restore operation
#[derive(Debug, Serialize)]
pub struct RestoreReport {
    pub session_id: String,
    pub restored_count: usize,
    pub restored_bytes: u64,
    pub errors: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_prune_leaf_first_keeps_root_and_files() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("a/b/c")).unwrap();
        std::fs::create_dir_all(root.join("d")).unwrap();
        std::fs::write(root.join("d/keep.txt"), "x").unwrap();

        let removed = prune_empty_dirs(root, true);

        assert_eq!(removed, 3);
        assert!(root.exists());
        assert!(!root.join("a").exists());
        assert!(root.join("d/keep.txt").exists());
    }

    #[test]
    fn test_stage_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        let result = stage_file(
            &crate::common::fsops::RealFs,
            &dir.path().join("nope.zip"),
            &dir.path().join("trash/000001"),
        );
        assert!(result.is_err());
    }
}
