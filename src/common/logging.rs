//! Console + daily size-capped file logging, and the "recent log lines"
//! query used by front-ends.

use anyhow::{Context, Result};
use chrono::Local;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Prefix of the daily log files (`organizer.YYYY-MM-DD.log`)
pub const LOG_FILE_PREFIX: &str = "organizer";
/// A day's file is rolled into a numbered backup once it would pass this size
pub const MAX_LOG_BYTES: u64 = 5 * 1024 * 1024;
/// Numbered backups kept per day (`organizer.YYYY-MM-DD.log.1` is the newest)
pub const MAX_LOG_BACKUPS: usize = 5;
/// Days of log files kept on disk
pub const MAX_LOG_DAYS: usize = 5;

fn env_filter(verbose: bool) -> EnvFilter {
    let default = if verbose { "clearboom=debug" } else { "clearboom=info" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Console-only logging, used by the read-only commands
pub fn init_console(verbose: bool) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbose))
        .with_writer(std::io::stderr)
        .try_init();
}

/// Console + size-capped daily file logging into `logs_dir`.
///
/// The returned guard flushes the file writer on drop and must be held
/// for as long as the process logs.
pub fn init(logs_dir: &Path, verbose: bool) -> Result<WorkerGuard> {
    let appender = SizeCappedAppender::new(logs_dir, MAX_LOG_BYTES, MAX_LOG_BACKUPS, MAX_LOG_DAYS)
        .with_context(|| format!("Failed to open log file in {}", logs_dir.display()))?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(env_filter(verbose))
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(guard)
}

fn today() -> String {
    Local::now().format("%Y-%m-%d").to_string()
}

fn day_file(dir: &Path, day: &str) -> PathBuf {
    dir.join(format!("{}.{}.log", LOG_FILE_PREFIX, day))
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// `(day, backup number)` of a log file name; the live file is backup 0
fn log_key(name: &str) -> Option<(String, usize)> {
    let rest = name.strip_prefix(LOG_FILE_PREFIX)?.strip_prefix('.')?;
    let (day, suffix) = rest.split_once(".log")?;
    let backup = match suffix {
        "" => 0,
        n => n.strip_prefix('.')?.parse().ok()?,
    };
    Some((day.to_string(), backup))
}

/// Appends to today's log file. When a write would take the file past
/// `max_bytes` it is renamed to `.1` (older backups shift up, the oldest
/// is dropped) and a fresh file is started. Files from all but the newest
/// `max_days` days are deleted.
pub struct SizeCappedAppender {
    dir: PathBuf,
    max_bytes: u64,
    max_backups: usize,
    max_days: usize,
    day: String,
    file: File,
    written: u64,
}

impl SizeCappedAppender {
    pub fn new(dir: &Path, max_bytes: u64, max_backups: usize, max_days: usize) -> io::Result<Self> {
        std::fs::create_dir_all(dir)?;
        let day = today();
        let file = open_append(&day_file(dir, &day))?;
        let written = file.metadata()?.len();
        let appender = Self {
            dir: dir.to_path_buf(),
            max_bytes,
            max_backups,
            max_days,
            day,
            file,
            written,
        };
        appender.prune_old_days();
        Ok(appender)
    }

    fn backup_path(&self, n: usize) -> PathBuf {
        let mut name = day_file(&self.dir, &self.day).into_os_string();
        name.push(format!(".{}", n));
        PathBuf::from(name)
    }

    fn roll_over(&mut self) -> io::Result<()> {
        self.file.flush()?;
        let current = day_file(&self.dir, &self.day);
        if self.max_backups == 0 {
            self.file.set_len(0)?;
        } else {
            let oldest = self.backup_path(self.max_backups);
            if oldest.exists() {
                std::fs::remove_file(&oldest)?;
            }
            for n in (1..self.max_backups).rev() {
                let from = self.backup_path(n);
                if from.exists() {
                    std::fs::rename(&from, self.backup_path(n + 1))?;
                }
            }
            std::fs::rename(&current, self.backup_path(1))?;
            self.file = open_append(&current)?;
        }
        self.written = 0;
        Ok(())
    }

    fn start_day(&mut self, day: String) -> io::Result<()> {
        self.day = day;
        self.file = open_append(&day_file(&self.dir, &self.day))?;
        self.written = self.file.metadata()?.len();
        self.prune_old_days();
        Ok(())
    }

    fn prune_old_days(&self) {
        let files = log_files(&self.dir);
        let mut days: Vec<&str> = files.iter().map(|(_, (day, _))| day.as_str()).collect();
        days.dedup();
        let Some(&cutoff) = days.get(self.max_days.saturating_sub(1)) else {
            return;
        };
        for (path, (day, _)) in &files {
            if day.as_str() < cutoff {
                let _ = std::fs::remove_file(path);
            }
        }
    }
}

impl Write for SizeCappedAppender {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let day = today();
        if day != self.day {
            self.start_day(day)?;
        }
        if self.written > 0 && self.written + buf.len() as u64 > self.max_bytes {
            self.roll_over()?;
        }
        let n = self.file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// Log files in `logs_dir` with their keys, newest first
fn log_files(logs_dir: &Path) -> Vec<(PathBuf, (String, usize))> {
    let pattern = match glob::Pattern::new(&format!("{}*.log*", LOG_FILE_PREFIX)) {
        Ok(p) => p,
        Err(_) => return Vec::new(),
    };
    let entries = match std::fs::read_dir(logs_dir) {
        Ok(entries) => entries,
        Err(_) => return Vec::new(),
    };

    let mut files: Vec<(PathBuf, (String, usize))> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .filter_map(|p| {
            let name = p.file_name()?.to_string_lossy().into_owned();
            if !pattern.matches(&name) {
                return None;
            }
            let key = log_key(&name)?;
            Some((p, key))
        })
        .collect();

    // Newest day first; within a day the live file, then .1, .2, ...
    files.sort_by(|(_, (a_day, a_n)), (_, (b_day, b_n))| b_day.cmp(a_day).then(a_n.cmp(b_n)));
    files
}

/// The most recent `lines` log lines across the daily files and their
/// backups, oldest first
pub fn recent_log_lines(logs_dir: &Path, lines: usize) -> Vec<String> {
    let mut collected: Vec<String> = Vec::new();

    for (file, _) in log_files(logs_dir) {
        let remaining = lines.saturating_sub(collected.len());
        if remaining == 0 {
            break;
        }
        let contents = match std::fs::read_to_string(&file) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(path = %file.display(), error = %e, "failed to read log file");
                continue;
            }
        };
        // Newest lines first while collecting
        collected.extend(contents.lines().rev().take(remaining).map(str::to_string));
    }

    collected.reverse();
    collected
}
