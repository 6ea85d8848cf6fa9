//! Watch → debounce → admit → queue → classify + move.

pub mod admission;
pub mod cache;
pub mod classifier;
pub mod debounce;
pub mod mover;
pub mod pipeline;
pub mod stats;
pub mod worker;

use std::path::Path;

pub use admission::{AdmissionFilter, Rejection};
pub use cache::ProcessedCache;
pub use mover::{MoveOutcome, SafeMover};
pub use pipeline::{Organizer, PipelineSummary};
pub use stats::{category_counts, CategoryCount};
pub use worker::{process_item, ItemResult, PassReport};

/// Boundary to whatever presents the organizer to the user.
///
/// `status` may be called from any worker thread.
pub trait StatusSink: Send + Sync {
    /// One human-readable status line
    fn status(&self, message: &str);

    /// Approve a move when `confirm_before_move` is set.
    /// Without a front-end to ask, nothing is approved.
    fn confirm_move(&self, path: &Path, category: &str) -> bool {
        let _ = (path, category);
        false
    }
}

/// Sink that only logs
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl StatusSink for LogSink {
    fn status(&self, message: &str) {
        tracing::info!(target: "clearboom::status", "{}", message);
    }
}
