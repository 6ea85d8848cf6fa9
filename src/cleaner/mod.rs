//! On-demand cleanup of stale files in selected category folders.

pub mod engine;
pub mod manifest;
pub mod purger;
pub mod rules;
pub mod staging;

pub use engine::{
    check_trash_health, execute, execute_with, CleanMode, CleanupReport, CleanupStats, Progress,
    TrashHealth,
};
pub use manifest::{CleanManifest, ManifestItem, SessionSummary};
pub use purger::{purge_all, purge_expired, purge_session, PurgeReport};
pub use rules::{scan, CleanupCandidate, CleanupReason, RuleSet};
pub use staging::{restore_session, RestoreReport};
