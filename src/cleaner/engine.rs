use serde::{Deserialize, Serialize};
use std::path::Path;

use super::manifest::{CleanManifest, ManifestItem};
use super::rules::CleanupCandidate;
use super::staging;
use crate::common::config::{CleanupConfig, Config};
use crate::common::format;
use crate::common::fsops::{FileOps, RealFs};
use crate::common::safety;

/// Clean mode determines how files are removed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanMode {
    /// Move to the trash area for recovery (safe mode)
    SoftDelete,
    /// Permanent removal, no undo
    HardDelete,
}

impl CleanMode {
    pub fn from_config(cleanup: &CleanupConfig) -> Self {
        if cleanup.safe_mode {
            CleanMode::SoftDelete
        } else {
            CleanMode::HardDelete
        }
    }
}

impl std::fmt::Display for CleanMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CleanMode::SoftDelete => write!(f, "soft_delete"),
            CleanMode::HardDelete => write!(f, "hard_delete"),
        }
    }
}

/// Per-run counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupStats {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Report from a cleanup run
#[derive(Debug, Serialize)]
pub struct CleanupReport {
    pub stats: CleanupStats,
    pub mode: CleanMode,
    pub bytes_freed: u64,
    /// Trash session holding the removed files (soft-delete only)
    pub session_id: Option<String>,
    pub folders_pruned: usize,
    pub aborted: bool,
    pub errors: Vec<String>,
}

impl CleanupReport {
    fn new(mode: CleanMode, total: usize) -> Self {
        Self {
            stats: CleanupStats {
                total,
                ..CleanupStats::default()
            },
            mode,
            bytes_freed: 0,
            session_id: None,
            folders_pruned: 0,
            aborted: false,
            errors: Vec::new(),
        }
    }
}

/// Called once per candidate before it is removed with
/// `(index, total, path, reason)`, where `index` counts from 1 up to
/// `total`. Returning `false` stops the run.
pub type Progress<'a> = dyn FnMut(usize, usize, &Path, &str) -> bool + 'a;

/// Remove `candidates` in order. Never fails as a whole: every per-file
/// problem is counted and the run moves on.
pub fn execute(
    config: &Config,
    candidates: &[CleanupCandidate],
    mode: CleanMode,
    progress: Option<&mut Progress<'_>>,
) -> CleanupReport {
    execute_with(config, &RealFs, candidates, mode, progress)
}

pub fn execute_with(
    config: &Config,
    fs: &dyn FileOps,
    candidates: &[CleanupCandidate],
    mode: CleanMode,
    mut progress: Option<&mut Progress<'_>>,
) -> CleanupReport {
    let total = candidates.len();
    let mut report = CleanupReport::new(mode, total);

    if config.cleanup.require_confirmation && progress.is_none() {
        tracing::warn!(total, "cleanup needs confirmation and none was given, skipping all");
        report.stats.skipped = total;
        return report;
    }

    if let Err(e) = safety::validate_clean_operation(total) {
        tracing::error!(error = %e, "refusing cleanup");
        report.stats.skipped = total;
        report.errors.push(e);
        return report;
    }

    let mut manifest = CleanManifest::new(mode, config.trash_retention_days);
    let files_dir = manifest.files_dir(config);
    let root = &config.watch_root;

    for (index, candidate) in candidates.iter().enumerate() {
        let path = candidate.path.as_path();
        let reason = candidate.reason.to_string();

        if let Some(callback) = progress.as_mut() {
            if !callback(index + 1, total, path, &reason) {
                tracing::info!(done = index, total, "cleanup aborted by caller");
                report.stats.skipped += total - index;
                report.aborted = true;
                break;
            }
        }

        let Ok(metadata) = std::fs::symlink_metadata(path) else {
            tracing::info!(path = %path.display(), "vanished since scan, skipping");
            report.stats.skipped += 1;
            continue;
        };
        if !metadata.is_file() {
            report.stats.skipped += 1;
            continue;
        }
        if safety::is_protected(path, root, &config.protected_names) {
            tracing::warn!(path = %path.display(), "protected path, skipping");
            report.stats.skipped += 1;
            continue;
        }
        if let Err(e) = safety::resolve_within_root(path, root) {
            tracing::error!(error = %e, "refusing to clean");
            report.stats.failed += 1;
            report.errors.push(e.to_string());
            continue;
        }
        if fs.probe_exclusive(path).is_err() {
            tracing::info!(path = %path.display(), "file in use, skipping");
            report.stats.skipped += 1;
            continue;
        }

        let mut item = ManifestItem {
            original_path: path.to_path_buf(),
            staged_path: None,
            size_bytes: metadata.len(),
            category: candidate.category.clone(),
            reason: reason.clone(),
            success: false,
            error: None,
        };

        let result = match mode {
            CleanMode::SoftDelete => {
                let staged = files_dir.join(format!("{:06}", index + 1));
                staging::stage_file(fs, path, &staged).map(|()| item.staged_path = Some(staged))
            }
            CleanMode::HardDelete => fs
                .remove_file(path)
                .map_err(|e| anyhow::anyhow!("Failed to remove '{}': {}", path.display(), e)),
        };

        match result {
            Ok(()) => {
                tracing::info!(path = %path.display(), %reason, %mode, "cleaned file");
                item.success = true;
                report.stats.success += 1;
                report.bytes_freed += metadata.len();
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "cleanup failed");
                item.error = Some(format!("{:#}", e));
                report.stats.failed += 1;
            }
        }
        manifest.add_item(item);
    }

    if config.cleanup.cleanup_empty_folders {
        for name in &config.cleanup.enabled_categories {
            report.folders_pruned += staging::prune_empty_dirs(&config.category_dir(name), true);
        }
    }

    if !manifest.items.is_empty() {
        if let Err(e) = manifest.save(config) {
            tracing::error!(error = %e, "failed to record cleanup session");
            report.errors.push(format!("{:#}", e));
        }
        if mode == CleanMode::SoftDelete && manifest.total_files > 0 {
            report.session_id = Some(manifest.session_id.clone());
        }
    }
    report.errors.extend(manifest.errors);

    tracing::info!(
        success = report.stats.success,
        failed = report.stats.failed,
        skipped = report.stats.skipped,
        freed = %format::format_size(report.bytes_freed),
        "cleanup finished"
    );
    report
}

/// Size and age of the trash area
pub fn check_trash_health(config: &Config) -> anyhow::Result<TrashHealth> {
    let sessions = CleanManifest::list_sessions(config)?;
    let total_size: u64 = sessions.iter().map(|s| s.staged_size).sum();
    let expired: Vec<_> = sessions.iter().filter(|s| s.is_expired).collect();
    let expired_size: u64 = expired.iter().map(|s| s.staged_size).sum();

    let warning = if !expired.is_empty() {
        Some(format!(
            "{} expired trash sessions ({}). Run 'clearboom purge --expired' to free space.",
            expired.len(),
            format::format_size(expired_size)
        ))
    } else {
        None
    };

    Ok(TrashHealth {
        total_size,
        session_count: sessions.len(),
        expired_count: expired.len(),
        expired_size,
        warning,
    })
}

#[derive(Debug, Serialize)]
pub struct TrashHealth {
    pub total_size: u64,
    pub session_count: usize,
    pub expired_count: usize,
    pub expired_size: u64,
    pub warning: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleaner::rules::CleanupReason;
    use tempfile::TempDir;

    fn candidate(path: &Path) -> CleanupCandidate {
        CleanupCandidate {
            path: path.to_path_buf(),
            reason: CleanupReason::Age { days: 30 },
            size_bytes: 1,
            category: "[ZIP] 压缩包".into(),
        }
    }

    #[test]
    fn test_mode_from_config() {
        let mut cleanup = CleanupConfig::default();
        assert_eq!(CleanMode::from_config(&cleanup), CleanMode::SoftDelete);
        cleanup.safe_mode = false;
        assert_eq!(CleanMode::from_config(&cleanup), CleanMode::HardDelete);
    }

    #[test]
    fn test_vanished_file_is_skipped() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::with_root(dir.path());
        config.cleanup.require_confirmation = false;
        let gone = dir.path().join("[ZIP] 压缩包").join("gone.zip");

        let report = execute(&config, &[candidate(&gone)], CleanMode::HardDelete, None);
        assert_eq!(report.stats.skipped, 1);
        assert_eq!(report.stats.success, 0);
    }

    #[test]
    fn test_abort_counts_rest_as_skipped() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::with_root(dir.path());
        config.init_dirs().unwrap();
        let zip = config.category_dir("[ZIP] 压缩包");
        let files: Vec<_> = (0..3)
            .map(|i| {
                let p = zip.join(format!("f{}.zip", i));
                std::fs::write(&p, "x").unwrap();
                candidate(&p)
            })
            .collect();
        config.cleanup.cleanup_empty_folders = false;

        let mut seen = 0;
        let mut stop_after_first = |_i: usize, _t: usize, _p: &Path, _r: &str| {
            seen += 1;
            seen == 1
        };
        let report = execute(&config, &files, CleanMode::HardDelete, Some(&mut stop_after_first));

        assert!(report.aborted);
        assert_eq!(report.stats.success, 1);
        assert_eq!(report.stats.skipped, 2);
        assert!(files[1].path.exists());
    }
}
