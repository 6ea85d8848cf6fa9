use glob::{MatchOptions, Pattern};
use rayon::prelude::*;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use walkdir::WalkDir;

use crate::common::config::{CleanupConfig, CleanupRules, Config};
use crate::common::safety;
use crate::organizer::classifier;

const SECS_PER_DAY: u64 = 86_400;

/// The first rule a file matched
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum CleanupReason {
    Age { days: u32 },
    Size { max_mb: u64 },
    Type { extension: String },
}

impl fmt::Display for CleanupReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CleanupReason::Age { days } => write!(f, "older than {} days", days),
            CleanupReason::Size { max_mb } => write!(f, "larger than {} MB", max_mb),
            CleanupReason::Type { extension } => write!(f, "blacklisted type .{}", extension),
        }
    }
}

/// A file the scan proposes to remove
#[derive(Debug, Clone, Serialize)]
pub struct CleanupCandidate {
    pub path: PathBuf,
    pub reason: CleanupReason,
    pub size_bytes: u64,
    /// Category folder the file was found under
    pub category: String,
}

/// Compiled cleanup rules
#[derive(Debug, Clone)]
pub struct RuleSet {
    excludes: Vec<Pattern>,
    rules: CleanupRules,
}

impl RuleSet {
    pub fn new(cleanup: &CleanupConfig) -> Self {
        let excludes = cleanup
            .exclude_patterns
            .iter()
            .filter_map(|p| match Pattern::new(p) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    tracing::warn!(pattern = %p, error = %e, "ignoring invalid exclude pattern");
                    None
                }
            })
            .collect();
        Self {
            excludes,
            rules: cleanup.rules.clone(),
        }
    }

    /// Name matches one of the exclude globs (case-insensitive)
    pub fn is_excluded(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().map(|n| n.to_string_lossy()) else {
            return false;
        };
        let options = MatchOptions {
            case_sensitive: false,
            ..MatchOptions::new()
        };
        self.excludes
            .iter()
            .any(|p| p.matches_with(&name, options))
    }

    /// Evaluate at the current time
    pub fn evaluate(&self, path: &Path, size: u64, modified: SystemTime) -> Option<CleanupReason> {
        self.evaluate_at(path, size, modified, SystemTime::now())
    }

    /// Exclusion first, then age, size and type; the first hit wins
    pub fn evaluate_at(
        &self,
        path: &Path,
        size: u64,
        modified: SystemTime,
        now: SystemTime,
    ) -> Option<CleanupReason> {
        if self.is_excluded(path) {
            return None;
        }

        let age = &self.rules.age;
        if age.enabled {
            let elapsed = now.duration_since(modified).unwrap_or(Duration::ZERO);
            if elapsed.as_secs() / SECS_PER_DAY > age.days as u64 {
                return Some(CleanupReason::Age { days: age.days });
            }
        }

        let limit = &self.rules.size;
        if limit.enabled && size > limit.max_size_mb * 1024 * 1024 {
            return Some(CleanupReason::Size {
                max_mb: limit.max_size_mb,
            });
        }

        let kind = &self.rules.kind;
        if kind.enabled {
            if let Some(ext) = classifier::extension_of(path) {
                if classifier::list_contains(&kind.extensions, &ext) {
                    return Some(CleanupReason::Type { extension: ext });
                }
            }
        }

        None
    }
}

/// Walk every cleanup-enabled category folder and collect rule matches.
///
/// Categories are scanned in parallel; the result keeps configuration
/// order, and file-name order within each category.
pub fn scan(config: &Config) -> Vec<CleanupCandidate> {
    let rules = RuleSet::new(&config.cleanup);
    let now = SystemTime::now();

    config
        .cleanup
        .enabled_categories
        .par_iter()
        .map(|name| scan_category(config, &rules, name, now))
        .flatten()
        .collect()
}

fn scan_category(
    config: &Config,
    rules: &RuleSet,
    name: &str,
    now: SystemTime,
) -> Vec<CleanupCandidate> {
    let dir = config.category_dir(name);
    if !dir.is_dir() {
        tracing::debug!(category = %name, "category folder missing, nothing to scan");
        return Vec::new();
    }

    let root = &config.watch_root;
    let mut found = Vec::new();
    let walker = WalkDir::new(&dir)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !safety::is_protected(e.path(), root, &config.protected_names));

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let metadata = match entry.metadata() {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(path = %entry.path().display(), error = %e, "cannot stat file");
                continue;
            }
        };
        let modified = metadata.modified().unwrap_or(now);

        if let Some(reason) = rules.evaluate_at(entry.path(), metadata.len(), modified, now) {
            tracing::debug!(path = %entry.path().display(), %reason, "cleanup candidate");
            found.push(CleanupCandidate {
                path: entry.path().to_path_buf(),
                reason,
                size_bytes: metadata.len(),
                category: name.to_string(),
            });
        }
    }

    tracing::info!(category = %name, candidates = found.len(), "category scanned");
    found
}
