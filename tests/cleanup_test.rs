use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

use clearboom::cleaner::{self, CleanMode, CleanupReason};
use clearboom::common::config::Config;

const ZIP: &str = "[ZIP] 压缩包";

fn setup() -> (TempDir, Config) {
    let dir = TempDir::new().unwrap();
    let mut config = Config::with_root(dir.path());
    config.init_dirs().unwrap();
    // Only the age rule unless a test turns the others on
    config.cleanup.rules.size.enabled = false;
    config.cleanup.rules.kind.enabled = false;
    (dir, config)
}

fn write_aged(path: &Path, len: u64, days_old: u64) -> PathBuf {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let file = File::create(path).unwrap();
    file.set_len(len).unwrap();
    file.set_modified(SystemTime::now() - Duration::from_secs(days_old * 86_400))
        .unwrap();
    path.to_path_buf()
}

#[test]
fn test_scan_reports_only_old_file_with_age_reason() {
    let (_dir, config) = setup();
    let zip = config.category_dir(ZIP);
    let old = write_aged(&zip.join("old.zip"), 5 * 1024 * 1024, 40);
    write_aged(&zip.join("new.zip"), 1024, 1);

    let candidates = cleaner::scan(&config);

    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].path, old);
    assert_eq!(candidates[0].reason, CleanupReason::Age { days: 30 });
    assert!(candidates[0].reason.to_string().contains("30 days"));
}

#[test]
fn test_scan_honors_excludes_and_disabled_categories() {
    let (_dir, config) = setup();
    write_aged(&config.category_dir(ZIP).join("keep-this.zip"), 10, 90);
    write_aged(&config.category_dir(ZIP).join("重要合同.zip"), 10, 90);
    // Documents are not cleanup-enabled by default
    write_aged(&config.category_dir("[DOC] 文档").join("ancient.pdf"), 10, 900);

    assert!(cleaner::scan(&config).is_empty());
}

#[test]
fn test_scan_skips_protected_folders() {
    let (_dir, config) = setup();
    write_aged(&config.category_dir(ZIP).join("themes").join("old.zip"), 10, 90);
    assert!(cleaner::scan(&config).is_empty());
}

#[test]
fn test_age_reported_before_size() {
    let (_dir, mut config) = setup();
    config.cleanup.rules.size.enabled = true;
    config.cleanup.rules.size.max_size_mb = 1;
    write_aged(&config.category_dir(ZIP).join("both.zip"), 2 * 1024 * 1024, 45);
    write_aged(&config.category_dir(ZIP).join("big.zip"), 2 * 1024 * 1024, 1);

    let candidates = cleaner::scan(&config);
    assert_eq!(candidates.len(), 2);
    // Sorted by file name within the category
    assert_eq!(candidates[0].reason, CleanupReason::Size { max_mb: 1 });
    assert_eq!(candidates[1].reason, CleanupReason::Age { days: 30 });
}

#[test]
fn test_confirmation_required_without_callback_touches_nothing() {
    let (_dir, config) = setup();
    assert!(config.cleanup.require_confirmation);
    let old = write_aged(&config.category_dir(ZIP).join("old.zip"), 10, 40);

    let candidates = cleaner::scan(&config);
    let report = cleaner::execute(&config, &candidates, CleanMode::HardDelete, None);

    assert_eq!(report.stats.total, 1);
    assert_eq!(report.stats.skipped, report.stats.total);
    assert_eq!(report.stats.success, 0);
    assert!(old.exists());
}

#[test]
fn test_hard_delete_prunes_empty_folders_and_writes_audit() {
    let (_dir, mut config) = setup();
    config.cleanup.require_confirmation = false;
    let zip = config.category_dir(ZIP);
    let nested = write_aged(&zip.join("2024").join("old.zip"), 10, 40);

    let candidates = cleaner::scan(&config);
    let mut calls = Vec::new();
    let mut record = |index: usize, total: usize, path: &Path, reason: &str| {
        calls.push((index, total, path.to_path_buf(), reason.to_string()));
        true
    };
    let report = cleaner::execute(&config, &candidates, CleanMode::HardDelete, Some(&mut record));

    assert_eq!(report.stats.success, 1);
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, 0);
    assert_eq!(calls[0].2, nested);
    assert!(!nested.exists());
    assert!(!zip.join("2024").exists());
    assert!(zip.exists(), "the category folder itself stays");
    assert!(report.session_id.is_none());

    let audit: Vec<_> = std::fs::read_dir(config.logs_dir())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with("cleanup-"))
        .collect();
    assert_eq!(audit.len(), 1);
    let line = std::fs::read_to_string(audit[0].path()).unwrap();
    assert!(line.contains("hard_delete"));
    assert!(line.contains("old.zip"));
}

#[test]
fn test_file_vanished_after_scan_is_skipped() {
    let (_dir, mut config) = setup();
    config.cleanup.require_confirmation = false;
    let old = write_aged(&config.category_dir(ZIP).join("old.zip"), 10, 40);
    let candidates = cleaner::scan(&config);
    std::fs::remove_file(&old).unwrap();

    let report = cleaner::execute(&config, &candidates, CleanMode::SoftDelete, None);
    assert_eq!(report.stats.skipped, 1);
    assert_eq!(report.stats.failed, 0);
}

#[test]
fn test_progress_counts_from_one_and_can_abort() {
    let (_dir, mut config) = setup();
    config.cleanup.require_confirmation = false;
    let zip = config.category_dir(ZIP);
    let a = write_aged(&zip.join("a.zip"), 10, 40);
    let b = write_aged(&zip.join("b.zip"), 10, 40);
    let c = write_aged(&zip.join("c.zip"), 10, 40);

    let candidates = cleaner::scan(&config);
    let mut seen = Vec::new();
    let mut progress = |index: usize, total: usize, _path: &Path, _reason: &str| {
        seen.push((index, total));
        index < 2
    };
    let report = cleaner::execute(&config, &candidates, CleanMode::HardDelete, Some(&mut progress));

    assert_eq!(seen, vec![(1, 3), (2, 3)]);
    assert!(report.aborted);
    assert_eq!(report.stats.success, 1);
    assert_eq!(report.stats.skipped, 2);
    assert!(!a.exists());
    assert!(b.exists());
    assert!(c.exists());
}
