use std::path::PathBuf;
use thiserror::Error;

/// Typed errors for ClearBOOM operations.
/// We use `anyhow` at the top level for CLI error handling,
/// but these typed errors allow modules to be precise about failures.
///
/// Per-file move failures are not errors: they are reported as a
/// [`MoveOutcome`](crate::organizer::MoveOutcome) value.
#[derive(Debug, Error)]
pub enum OrganizeError {
    /// File system operation failed
    #[error("I/O error at '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration file is invalid
    #[error("Config error in '{}': {message}", path.display())]
    ConfigError { path: PathBuf, message: String },

    /// Path resolves outside the watched root
    #[error("Path '{}' is outside the watched folder '{}'", path.display(), root.display())]
    OutsideRoot { path: PathBuf, root: PathBuf },

    /// Another instance holds the lock
    #[error("ClearBOOM is already running (pid {pid})")]
    AlreadyRunning { pid: u32 },

    /// Configured watch root is not the system download folder
    #[error(
        "Configured folder '{}' does not match the system download folder '{}'",
        configured.display(),
        system.display()
    )]
    WatchRootMismatch { configured: PathBuf, system: PathBuf },

    /// Filesystem watcher could not be started
    #[error("Watcher error: {0}")]
    Watch(#[from] notify::Error),

    /// Pipeline is not in the state the call requires
    #[error("{0}")]
    State(String),
}

impl OrganizeError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        OrganizeError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<std::io::Error> for OrganizeError {
    fn from(e: std::io::Error) -> Self {
        OrganizeError::Io {
            path: PathBuf::from("<unknown>"),
            source: e,
        }
    }
}
