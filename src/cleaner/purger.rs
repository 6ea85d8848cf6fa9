use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

use super::manifest::{dir_size, CleanManifest};
use crate::common::config::Config;

/// Remove trash sessions whose retention period has elapsed.
/// Restored sessions only hold a manifest and are dropped as well.
pub fn purge_expired(config: &Config) -> Result<PurgeReport> {
    let mut report = PurgeReport::default();
    for session in CleanManifest::list_sessions(config)?
        .into_iter()
        .filter(|s| s.is_expired)
    {
        let files = if session.restored { 0 } else { session.total_files };
        let dir = config.trash_dir().join(&session.session_id);
        report.remove(&dir, session.session_id, files);
    }
    Ok(report)
}

/// Purge one session by ID, returning the bytes freed
pub fn purge_session(config: &Config, session_id: &str) -> Result<u64> {
    if session_id.is_empty() || session_id == ".." || session_id.contains(['/', '\\']) {
        anyhow::bail!("Invalid session id '{}'", session_id);
    }
    let dir = config.trash_dir().join(session_id);
    if !dir.is_dir() {
        anyhow::bail!("Session '{}' not found", session_id);
    }

    let bytes = dir_size(&dir);
    std::fs::remove_dir_all(&dir)
        .with_context(|| format!("Failed to purge session: {}", session_id))?;
    tracing::info!(session = %session_id, bytes, "purged session");
    Ok(bytes)
}

/// Empty the whole trash area, including folders without a readable manifest
pub fn purge_all(config: &Config) -> Result<PurgeReport> {
    let trash_dir = config.trash_dir();
    let mut report = PurgeReport::default();
    if !trash_dir.is_dir() {
        return Ok(report);
    }

    let entries = std::fs::read_dir(&trash_dir)
        .with_context(|| format!("Failed to read trash dir: {}", trash_dir.display()))?;
    for dir in entries.filter_map(|e| e.ok()).map(|e| e.path()) {
        if !dir.is_dir() {
            continue;
        }
        let id = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let files = CleanManifest::load(config, &id)
            .map(|m| if m.restored { 0 } else { m.total_files })
            .unwrap_or(0);
        report.remove(&dir, id, files);
    }
    Ok(report)
}

/// Report from a purge operation
#[derive(Debug, Default, Serialize)]
pub struct PurgeReport {
    pub purged_sessions: Vec<PurgedSession>,
    pub total_bytes_freed: u64,
    pub errors: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct PurgedSession {
    pub session_id: String,
    pub bytes_freed: u64,
    pub file_count: usize,
}

impl PurgeReport {
    /// Delete one session folder; failures are recorded, not returned
    fn remove(&mut self, dir: &Path, session_id: String, file_count: usize) {
        let bytes = dir_size(dir);
        match std::fs::remove_dir_all(dir) {
            Ok(()) => {
                tracing::info!(session = %session_id, bytes, "purged trash session");
                self.total_bytes_freed += bytes;
                self.purged_sessions.push(PurgedSession {
                    session_id,
                    bytes_freed: bytes,
                    file_count,
                });
            }
            Err(e) => {
                tracing::warn!(session = %session_id, error = %e, "purge failed");
                self.errors.push(format!("Failed to purge '{}': {}", session_id, e));
            }
        }
    }
}
