use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::engine::CleanMode;
use crate::common::config::Config;

/// Record of one cleanup session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanManifest {
    /// Sortable, unique: `<timestamp>-<short uuid>`
    pub session_id: String,

    pub timestamp: DateTime<Utc>,

    pub mode: CleanMode,

    /// Total bytes removed (or staged)
    pub total_bytes: u64,

    /// Total files affected
    pub total_files: usize,

    /// When staged files expire (soft-delete only)
    pub expires_at: Option<DateTime<Utc>>,

    /// Whether this session has been restored via undo
    pub restored: bool,

    pub items: Vec<ManifestItem>,

    pub errors: Vec<String>,
}

/// A single file entry in the manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestItem {
    /// Original path before cleaning
    pub original_path: PathBuf,

    /// Path in the trash area (soft-delete only)
    pub staged_path: Option<PathBuf>,

    pub size_bytes: u64,

    /// Category folder the file came from
    pub category: String,

    /// Rule that selected the file
    pub reason: String,

    pub success: bool,

    pub error: Option<String>,
}

impl CleanManifest {
    pub fn new(mode: CleanMode, retention_days: u32) -> Self {
        let now = Utc::now();
        let short = uuid::Uuid::new_v4().simple().to_string();
        let session_id = format!("{}-{}", now.format("%Y-%m-%dT%H-%M-%S"), &short[..8]);
        let expires_at = match mode {
            CleanMode::SoftDelete => Some(now + Duration::days(retention_days as i64)),
            CleanMode::HardDelete => None,
        };

        Self {
            session_id,
            timestamp: now,
            mode,
            total_bytes: 0,
            total_files: 0,
            expires_at,
            restored: false,
            items: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Add an item; only successful ones count toward the totals
    pub fn add_item(&mut self, item: ManifestItem) {
        if item.success {
            self.total_bytes += item.size_bytes;
            self.total_files += 1;
        }
        if let Some(error) = &item.error {
            self.errors.push(error.clone());
        }
        self.items.push(item);
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| now > at).unwrap_or(false)
    }

    pub fn session_dir(&self, config: &Config) -> PathBuf {
        config.trash_dir().join(&self.session_id)
    }

    /// Staged files of this session
    pub fn files_dir(&self, config: &Config) -> PathBuf {
        self.session_dir(config).join("files")
    }

    /// Write the session manifest (soft-delete) and append the audit record
    pub fn save(&self, config: &Config) -> Result<()> {
        if self.mode == CleanMode::SoftDelete {
            self.write_manifest(config)?;
        }
        self.append_audit(config)
    }

    fn write_manifest(&self, config: &Config) -> Result<()> {
        let session_dir = self.session_dir(config);
        std::fs::create_dir_all(&session_dir)
            .with_context(|| format!("Failed to create session dir: {}", session_dir.display()))?;

        let manifest_path = session_dir.join("manifest.json");
        let json = serde_json::to_string_pretty(self).context("Failed to serialize manifest")?;
        std::fs::write(&manifest_path, &json)
            .with_context(|| format!("Failed to write manifest: {}", manifest_path.display()))?;
        Ok(())
    }

    /// One JSON line per session in `cleanup-YYYY-MM-DD.jsonl`
    fn append_audit(&self, config: &Config) -> Result<()> {
        let log_dir = config.logs_dir();
        std::fs::create_dir_all(&log_dir)
            .with_context(|| format!("Failed to create logs dir: {}", log_dir.display()))?;

        let log_path = log_dir.join(format!("cleanup-{}.jsonl", self.timestamp.format("%Y-%m-%d")));
        let entry = serde_json::to_string(self).context("Failed to serialize log entry")?;

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .with_context(|| format!("Failed to open log: {}", log_path.display()))?;
        writeln!(file, "{}", entry)?;
        Ok(())
    }

    pub fn load(config: &Config, session_id: &str) -> Result<Self> {
        let manifest_path = config.trash_dir().join(session_id).join("manifest.json");
        if !manifest_path.exists() {
            anyhow::bail!("Session '{}' not found", session_id);
        }

        let contents = std::fs::read_to_string(&manifest_path)
            .with_context(|| format!("Failed to read manifest: {}", manifest_path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse manifest: {}", manifest_path.display()))
    }

    /// All sessions in the trash area, most recent first
    pub fn list_sessions(config: &Config) -> Result<Vec<SessionSummary>> {
        let trash_dir = config.trash_dir();
        if !trash_dir.exists() {
            return Ok(Vec::new());
        }

        let mut sessions = Vec::new();
        for entry in std::fs::read_dir(&trash_dir)
            .with_context(|| format!("Failed to read trash dir: {}", trash_dir.display()))?
        {
            let path = entry?.path();
            if !path.is_dir() {
                continue;
            }
            let manifest_path = path.join("manifest.json");
            let Ok(contents) = std::fs::read_to_string(&manifest_path) else {
                continue;
            };
            match serde_json::from_str::<CleanManifest>(&contents) {
                Ok(manifest) => sessions.push(SessionSummary {
                    is_expired: manifest.is_expired(),
                    staged_size: dir_size(&path),
                    session_id: manifest.session_id,
                    timestamp: manifest.timestamp,
                    total_bytes: manifest.total_bytes,
                    total_files: manifest.total_files,
                    expires_at: manifest.expires_at,
                    restored: manifest.restored,
                }),
                Err(e) => {
                    tracing::warn!(path = %manifest_path.display(), error = %e, "unreadable manifest");
                }
            }
        }

        sessions.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(sessions)
    }

    pub fn most_recent_session(config: &Config) -> Result<Option<String>> {
        let sessions = Self::list_sessions(config)?;
        Ok(sessions
            .into_iter()
            .find(|s| !s.restored)
            .map(|s| s.session_id))
    }

    pub fn mark_restored(&mut self, config: &Config) -> Result<()> {
        self.restored = true;
        self.write_manifest(config)
    }
}

/// Listing view of a trash session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub total_bytes: u64,
    pub total_files: usize,
    pub staged_size: u64,
    pub expires_at: Option<DateTime<Utc>>,
    pub restored: bool,
    pub is_expired: bool,
}

/// Total size of regular files under `path`
pub fn dir_size(path: &Path) -> u64 {
    WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_totals_count_successes_only() {
        let mut manifest = CleanManifest::new(CleanMode::HardDelete, 0);
        assert!(manifest.expires_at.is_none());
        manifest.add_item(ManifestItem {
            original_path: "/a.zip".into(),
            staged_path: None,
            size_bytes: 10,
            category: "[ZIP] 压缩包".into(),
            reason: "older than 30 days".into(),
            success: true,
            error: None,
        });
        manifest.add_item(ManifestItem {
            original_path: "/b.zip".into(),
            staged_path: None,
            size_bytes: 99,
            category: "[ZIP] 压缩包".into(),
            reason: "older than 30 days".into(),
            success: false,
            error: Some("denied".into()),
        });
        assert_eq!(manifest.total_files, 1);
        assert_eq!(manifest.total_bytes, 10);
        assert_eq!(manifest.errors, vec!["denied".to_string()]);
    }

    #[test]
    fn test_soft_delete_expiry() {
        let manifest = CleanManifest::new(CleanMode::SoftDelete, 7);
        assert!(!manifest.is_expired());
        assert!(manifest.is_expired_at(Utc::now() + Duration::days(8)));
    }

    #[test]
    fn test_session_ids_are_unique() {
        let a = CleanManifest::new(CleanMode::SoftDelete, 7);
        let b = CleanManifest::new(CleanMode::SoftDelete, 7);
        assert_ne!(a.session_id, b.session_id);
    }
}
