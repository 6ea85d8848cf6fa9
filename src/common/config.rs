use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::errors::OrganizeError;

/// Name of the folder holding logs and the staged trash.
pub const SCRIPT_DIR_NAME: &str = "[SCRIPT] 自动整理";
/// Name of the folder holding the pre-move backups.
pub const BACKUP_DIR_NAME: &str = "[BACKUP] 备份";

/// Global ClearBOOM configuration.
///
/// Loaded once at startup and then shared read-only (usually behind an
/// `Arc`) by the classifier, the mover, the pipeline and the cleanup engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory being watched and organized
    #[serde(default = "default_watch_root")]
    pub watch_root: PathBuf,

    /// Abort `watch` when `watch_root` is not the platform download folder
    #[serde(default = "default_true")]
    pub require_download_dir: bool,

    /// Capacity of the work queue between admission and the workers
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Number of move workers
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Minimum free space on the destination volume, in GB (0 disables the check)
    #[serde(default = "default_min_free_space_gb")]
    pub min_free_space_gb: u64,

    /// Files larger than this are never moved, in MB
    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: u64,

    /// Maximum number of remembered processed paths
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Processed paths older than this are forgotten once their file is gone
    #[serde(default = "default_cache_retention_days")]
    pub cache_retention_days: u32,

    /// Quiet period before a burst of events for one path is admitted
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// How long staged trash sessions are kept before `purge --expired` removes them
    #[serde(default = "default_trash_retention_days")]
    pub trash_retention_days: u32,

    /// Names never scanned, moved or deleted (matched against every path segment)
    #[serde(default = "default_protected_names")]
    pub protected_names: Vec<String>,

    /// Global toggles
    #[serde(default)]
    pub options: UserOptions,

    /// Cleanup rules
    #[serde(default)]
    pub cleanup: CleanupConfig,

    /// Categories in priority order; the first enabled match wins
    #[serde(default = "default_categories")]
    pub categories: Vec<CategoryRule>,
}

/// One top-level destination folder and the extensions it claims.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryRule {
    pub name: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    pub extensions: Vec<String>,

    /// Second-level folders, looked up in declared order
    #[serde(default)]
    pub subfolders: Vec<SubfolderRule>,
}

/// A second-level folder. An empty extension list catches everything.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubfolderRule {
    pub name: String,

    #[serde(default)]
    pub extensions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserOptions {
    /// Start the watch pipeline at all
    #[serde(default = "default_true")]
    pub auto_organize: bool,

    /// Queue every existing file when the pipeline starts
    #[serde(default = "default_true")]
    pub organize_on_startup: bool,

    /// Read by desktop front-ends only
    #[serde(default = "default_true")]
    pub show_notification: bool,

    /// Read by desktop front-ends only
    #[serde(default = "default_true")]
    pub minimize_on_startup: bool,

    /// Ask the status sink before every move
    #[serde(default)]
    pub confirm_before_move: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupConfig {
    /// Categories scanned by `cleanup`
    #[serde(default = "default_cleanup_categories")]
    pub enabled_categories: Vec<String>,

    /// Stage files in the trash area instead of deleting them
    #[serde(default = "default_true")]
    pub safe_mode: bool,

    /// Refuse to delete anything without a confirmation callback
    #[serde(default = "default_true")]
    pub require_confirmation: bool,

    /// Remove directories left empty after a cleanup
    #[serde(default = "default_true")]
    pub cleanup_empty_folders: bool,

    /// File-name globs that are never cleaned up
    #[serde(default = "default_exclude_patterns")]
    pub exclude_patterns: Vec<String>,

    #[serde(default)]
    pub rules: CleanupRules,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CleanupRules {
    #[serde(default)]
    pub age: AgeRule,

    #[serde(default)]
    pub size: SizeRule,

    #[serde(default, rename = "type")]
    pub kind: TypeRule,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgeRule {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_age_days")]
    pub days: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SizeRule {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_max_size_mb")]
    pub max_size_mb: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeRule {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_blacklist")]
    pub extensions: Vec<String>,
}

fn default_true() -> bool {
    true
}
fn default_watch_root() -> PathBuf {
    dirs::download_dir().unwrap_or_else(|| {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join("Downloads")
    })
}
fn default_batch_size() -> usize {
    50
}
fn default_workers() -> usize {
    4
}
fn default_min_free_space_gb() -> u64 {
    10
}
fn default_max_file_size_mb() -> u64 {
    1024
}
fn default_cache_capacity() -> usize {
    10_000
}
fn default_cache_retention_days() -> u32 {
    7
}
fn default_debounce_ms() -> u64 {
    2000
}
fn default_trash_retention_days() -> u32 {
    7
}
fn default_age_days() -> u32 {
    30
}
fn default_max_size_mb() -> u64 {
    1024
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_protected_names() -> Vec<String> {
    strings(&[
        "Clash for Windows",
        ".minecraft",
        SCRIPT_DIR_NAME,
        BACKUP_DIR_NAME,
        "Install-pkg",
        "themes",
    ])
}

fn default_cleanup_categories() -> Vec<String> {
    strings(&["[ZIP] 压缩包", "[APP] 应用"])
}

fn default_exclude_patterns() -> Vec<String> {
    strings(&["*重要*", "*保留*", "*keep*", "*important*"])
}

fn default_blacklist() -> Vec<String> {
    strings(&[
        ".tmp", ".temp", ".bak", ".old", ".exe", ".msi", ".appx", ".zip", ".rar", ".7z",
    ])
}

fn sub(name: &str, extensions: &[&str]) -> SubfolderRule {
    SubfolderRule {
        name: name.to_string(),
        extensions: strings(extensions),
    }
}

/// Build a category whose extension list is the union of its subfolders
fn category(name: &str, subfolders: Vec<SubfolderRule>) -> CategoryRule {
    let mut extensions: Vec<String> = Vec::new();
    for ext in subfolders.iter().flat_map(|s| s.extensions.iter()) {
        if !extensions.contains(ext) {
            extensions.push(ext.clone());
        }
    }
    CategoryRule {
        name: name.to_string(),
        enabled: true,
        extensions,
        subfolders,
    }
}

pub fn default_categories() -> Vec<CategoryRule> {
    vec![
        category(
            "[DOC] 文档",
            vec![
                sub(
                    "Office",
                    &[".doc", ".docx", ".xls", ".xlsx", ".ppt", ".pptx", ".rtf", ".odt", ".ods", ".odp"],
                ),
                sub("PDF", &[".pdf"]),
                sub("Text", &[".txt", ".md", ".log", ".csv"]),
                sub("Book", &[".epub", ".mobi", ".azw3"]),
                sub("Web", &[".htm", ".html", ".xml", ".json"]),
            ],
        ),
        category(
            "[MEDIA] 媒体",
            vec![
                sub("Video", &[".mp4", ".mkv", ".avi", ".mov", ".wmv", ".flv", ".webm", ".m4v"]),
                sub(
                    "Audio",
                    &[".mp3", ".wav", ".flac", ".m4a", ".aac", ".ogg", ".wma", ".ape", ".mid", ".midi"],
                ),
                sub(
                    "Image",
                    &[
                        ".jpg", ".jpeg", ".png", ".gif", ".bmp", ".webp", ".raw", ".cr2", ".nef",
                        ".arw", ".svg", ".ai", ".psd",
                    ],
                ),
                sub("Subtitle", &[".srt", ".ass", ".ssa"]),
            ],
        ),
        category(
            "[APP] 应用",
            vec![
                sub("Windows", &[".exe", ".msi", ".appx", ".app"]),
                sub("Mobile", &[".apk", ".ipa"]),
                sub("Plugin", &[".vsix", ".crx", ".xpi"]),
                sub("System", &[".dll", ".sys", ".drv", ".reg", ".iso", ".img", ".vhd", ".vmdk"]),
            ],
        ),
        category(
            "[ZIP] 压缩包",
            vec![
                sub("ZIP", &[".zip"]),
                sub("RAR", &[".rar"]),
                sub("7Z", &[".7z"]),
                sub("TAR", &[".tar", ".tgz", ".tbz"]),
                sub("Other", &[".gz", ".xz", ".bz2"]),
            ],
        ),
        category(
            "[DEV] 开发",
            vec![
                sub(
                    "Source",
                    &[
                        ".py", ".java", ".cpp", ".c", ".h", ".cs", ".js", ".ts", ".php", ".asp",
                        ".jsp", ".go", ".rb", ".pl", ".swift",
                    ],
                ),
                sub("Web", &[".html", ".css", ".scss", ".less"]),
                sub(
                    "Tool",
                    &[
                        ".json", ".xml", ".yaml", ".yml", ".toml", ".ini", ".sln", ".csproj",
                        ".vcxproj",
                    ],
                ),
            ],
        ),
    ]
}

impl Default for UserOptions {
    fn default() -> Self {
        Self {
            auto_organize: true,
            organize_on_startup: true,
            show_notification: true,
            minimize_on_startup: true,
            confirm_before_move: false,
        }
    }
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            enabled_categories: default_cleanup_categories(),
            safe_mode: true,
            require_confirmation: true,
            cleanup_empty_folders: true,
            exclude_patterns: default_exclude_patterns(),
            rules: CleanupRules::default(),
        }
    }
}

impl Default for AgeRule {
    fn default() -> Self {
        Self {
            enabled: true,
            days: default_age_days(),
        }
    }
}

impl Default for SizeRule {
    fn default() -> Self {
        Self {
            enabled: true,
            max_size_mb: default_max_size_mb(),
        }
    }
}

impl Default for TypeRule {
    fn default() -> Self {
        Self {
            enabled: true,
            extensions: default_blacklist(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            watch_root: default_watch_root(),
            require_download_dir: true,
            batch_size: default_batch_size(),
            workers: default_workers(),
            min_free_space_gb: default_min_free_space_gb(),
            max_file_size_mb: default_max_file_size_mb(),
            cache_capacity: default_cache_capacity(),
            cache_retention_days: default_cache_retention_days(),
            debounce_ms: default_debounce_ms(),
            trash_retention_days: default_trash_retention_days(),
            protected_names: default_protected_names(),
            options: UserOptions::default(),
            cleanup: CleanupConfig::default(),
            categories: default_categories(),
        }
    }
}

impl Config {
    /// Default configuration organizing `root` instead of the download folder
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            watch_root: root.into(),
            ..Self::default()
        }
    }

    /// Get the ClearBOOM data directory (~/.clearboom)
    pub fn data_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join(".clearboom")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        Self::data_dir().join("config.toml")
    }

    /// Get the single-instance lock file path
    pub fn lock_path() -> PathBuf {
        Self::data_dir().join("clearboom.lock")
    }

    /// Load config from the default location, or the defaults if it does not exist
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create config dir: {}", dir.display()))?;
        }
        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<(), OrganizeError> {
        let invalid = |message: String| OrganizeError::ConfigError {
            path: Self::config_path(),
            message,
        };

        if self.workers == 0 {
            return Err(invalid("workers must be at least 1".into()));
        }
        if self.batch_size == 0 {
            return Err(invalid("batch_size must be at least 1".into()));
        }
        if self.cache_capacity == 0 {
            return Err(invalid("cache_capacity must be at least 1".into()));
        }
        for category in &self.categories {
            let mut components = Path::new(&category.name).components();
            let single_segment = matches!(
                (components.next(), components.next()),
                (Some(std::path::Component::Normal(_)), None)
            );
            if !single_segment {
                return Err(invalid(format!(
                    "category name '{}' must be a single folder name",
                    category.name
                )));
            }
            for sub in &category.subfolders {
                if sub.name.contains(['/', '\\']) || sub.name == ".." || sub.name.is_empty() {
                    return Err(invalid(format!(
                        "subfolder name '{}' in '{}' must be a single folder name",
                        sub.name, category.name
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn script_dir(&self) -> PathBuf {
        self.watch_root.join(SCRIPT_DIR_NAME)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.script_dir().join("logs")
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.watch_root.join(BACKUP_DIR_NAME)
    }

    /// Staged trash used by safe-mode cleanup
    pub fn trash_dir(&self) -> PathBuf {
        self.script_dir().join("trash")
    }

    pub fn category_dir(&self, name: &str) -> PathBuf {
        self.watch_root.join(name)
    }

    /// Look up a category rule by folder name
    pub fn category(&self, name: &str) -> Option<&CategoryRule> {
        self.categories.iter().find(|c| c.name == name)
    }

    /// Create the watch root, every category folder, and the backup/log/trash areas
    pub fn init_dirs(&self) -> Result<()> {
        let mut dirs = vec![
            self.watch_root.clone(),
            self.script_dir(),
            self.logs_dir(),
            self.backup_dir(),
            self.trash_dir(),
        ];
        dirs.extend(self.categories.iter().map(|c| self.category_dir(&c.name)));

        for dir in &dirs {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        }
        Ok(())
    }

    pub fn min_free_space_bytes(&self) -> u64 {
        self.min_free_space_gb * 1024 * 1024 * 1024
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb * 1024 * 1024
    }

    pub fn cache_retention(&self) -> Duration {
        Duration::from_secs(self.cache_retention_days as u64 * 86_400)
    }

    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}
