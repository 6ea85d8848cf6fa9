use serde::Serialize;
use std::path::Path;

use super::classifier;
use super::mover::{MoveOutcome, SafeMover};
use super::StatusSink;
use crate::common::config::Config;
use crate::common::format;
use crate::common::fsops::FileOps;

/// What happened to one admitted path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemResult {
    /// No category claims the file
    Unclassified,
    /// `confirm_before_move` is on and the move was not approved
    Declined,
    /// The move protocol ran
    Attempted(MoveOutcome),
}

impl ItemResult {
    /// Moved and unknown files are remembered; failures stay eligible for retry
    pub fn marks_processed(&self) -> bool {
        matches!(
            self,
            ItemResult::Unclassified | ItemResult::Attempted(MoveOutcome::Success(_))
        )
    }
}

/// Tally of one organizing pass (or of a pipeline run)
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct PassReport {
    pub scanned: usize,
    pub admitted: usize,
    pub rejected: usize,
    pub moved: usize,
    pub unclassified: usize,
    pub declined: usize,
    pub failed: usize,
}

impl PassReport {
    pub fn tally(&mut self, result: &ItemResult) {
        match result {
            ItemResult::Unclassified => self.unclassified += 1,
            ItemResult::Declined => self.declined += 1,
            ItemResult::Attempted(MoveOutcome::Success(_)) => self.moved += 1,
            ItemResult::Attempted(_) => self.failed += 1,
        }
    }
}

/// Classify one file and run the guarded move. Blocking; callers on an
/// async runtime run it on the blocking pool.
pub fn process_item(
    config: &Config,
    fs: &dyn FileOps,
    sink: &dyn StatusSink,
    path: &Path,
) -> ItemResult {
    let Some(category) = classifier::classify(&config.categories, path) else {
        tracing::info!(path = %path.display(), "skipping unknown file type");
        return ItemResult::Unclassified;
    };

    if config.options.confirm_before_move && !sink.confirm_move(path, &category.name) {
        tracing::info!(path = %path.display(), category = %category.name, "move not approved");
        return ItemResult::Declined;
    }

    let dest_root = config.category_dir(&category.name);
    let outcome = SafeMover::new(config, fs).move_file(path, &dest_root);

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match &outcome {
        MoveOutcome::Success(dest) => {
            sink.status(&format!(
                "Moved {} -> {}",
                name,
                format::format_relative(dest, &config.watch_root)
            ));
        }
        MoveOutcome::FileInUse => {
            tracing::warn!(path = %path.display(), "file in use, will retry on next change");
            sink.status(&format!("Skipped {} (in use)", name));
        }
        MoveOutcome::InsufficientSpace => {
            sink.status("Not enough free disk space to organize files");
        }
        other => {
            sink.status(&format!("Could not organize {}: {}", name, other));
        }
    }

    ItemResult::Attempted(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_only_success_and_unknown_are_remembered() {
        assert!(ItemResult::Unclassified.marks_processed());
        assert!(ItemResult::Attempted(MoveOutcome::Success(PathBuf::from("/x"))).marks_processed());
        assert!(!ItemResult::Declined.marks_processed());
        assert!(!ItemResult::Attempted(MoveOutcome::FileInUse).marks_processed());
        assert!(!ItemResult::Attempted(MoveOutcome::MoveFailed).marks_processed());
    }

    #[test]
    fn test_tally() {
        let mut report = PassReport::default();
        report.tally(&ItemResult::Unclassified);
        report.tally(&ItemResult::Attempted(MoveOutcome::Success(PathBuf::from("/x"))));
        report.tally(&ItemResult::Attempted(MoveOutcome::BackupFailed));
        report.tally(&ItemResult::Declined);
        assert_eq!(report.unclassified, 1);
        assert_eq!(report.moved, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.declined, 1);
    }
}
