//! Process-level startup checks: single-instance lock and download-folder
//! verification.

use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, Write};
use std::path::{Path, PathBuf};

use super::config::Config;
use super::errors::OrganizeError;
use super::safety;

/// Exclusive OS lock on a lock file. The file also records the holder's
/// PID for the "already running" message. The OS drops the lock when the
/// process exits, however it exits.
#[derive(Debug)]
pub struct InstanceLock {
    path: PathBuf,
    file: File,
}

impl InstanceLock {
    pub fn acquire(path: &Path) -> Result<Self, OrganizeError> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| OrganizeError::io(dir, e))?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| OrganizeError::io(path, e))?;

        if let Err(e) = file.try_lock_exclusive() {
            if e.kind() == fs2::lock_contended_error().kind() {
                let mut recorded = String::new();
                let _ = file.read_to_string(&mut recorded);
                let pid = recorded.trim().parse::<u32>().unwrap_or(0);
                return Err(OrganizeError::AlreadyRunning { pid });
            }
            return Err(OrganizeError::io(path, e));
        }

        // Whatever a previous holder left behind is replaced
        file.set_len(0).map_err(|e| OrganizeError::io(path, e))?;
        file.rewind().map_err(|e| OrganizeError::io(path, e))?;
        writeln!(file, "{}", std::process::id()).map_err(|e| OrganizeError::io(path, e))?;
        file.flush().map_err(|e| OrganizeError::io(path, e))?;

        tracing::debug!(path = %path.display(), "instance lock acquired");
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for InstanceLock {
    // The file stays on disk. Deleting it would let a waiting process lock
    // the old inode while a newcomer locks a fresh one.
    fn drop(&mut self) {
        let _ = self.file.set_len(0);
        let _ = FileExt::unlock(&self.file);
    }
}

/// Require the configured watch root to be the platform download folder
pub fn verify_download_dir(configured: &Path) -> Result<(), OrganizeError> {
    let system = dirs::download_dir().ok_or_else(|| {
        OrganizeError::State("the system download folder could not be determined".into())
    })?;
    check_same_dir(configured, &system)
}

fn check_same_dir(configured: &Path, system: &Path) -> Result<(), OrganizeError> {
    let mismatch = || OrganizeError::WatchRootMismatch {
        configured: configured.to_path_buf(),
        system: system.to_path_buf(),
    };
    let a = configured.canonicalize().map_err(|_| mismatch())?;
    let b = system.canonicalize().map_err(|_| mismatch())?;
    if a == b {
        Ok(())
    } else {
        Err(mismatch())
    }
}

/// Startup sequence for commands that move files: take the instance lock,
/// check the watch root, create the folder layout and make sure the
/// backup, log and trash areas resolve inside the root. Any failure is fatal.
pub fn prepare(config: &Config, lock_path: &Path) -> anyhow::Result<InstanceLock> {
    let lock = InstanceLock::acquire(lock_path)?;

    if config.require_download_dir {
        verify_download_dir(&config.watch_root)?;
    }
    config.init_dirs()?;
    for dir in [config.backup_dir(), config.logs_dir(), config.trash_dir()] {
        safety::resolve_within_root(&dir, &config.watch_root)?;
    }

    tracing::info!(root = %config.watch_root.display(), "startup checks passed");
    Ok(lock)
}
