//! # ClearBOOM
//!
//! A background agent that keeps a downloads folder sorted.
//!
//! - **Organizer**: watches the folder, debounces bursts of events and moves
//!   each new file into a category folder chosen by extension. Every move is
//!   guarded: free-space check, busy-file probe, dated backup, rollback.
//! - **Cleanup**: scans selected category folders for stale, oversized or
//!   blacklisted files and moves them into a recoverable trash (or deletes
//!   them), with undo and purge.
//! - **CLI**: `watch`, `organize`, `cleanup`, `undo`, `purge`, `stats`, `logs`.

pub mod cleaner;
pub mod cli;
pub mod common;
pub mod organizer;
