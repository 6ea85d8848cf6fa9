use chrono::Utc;
use colored::*;

use crate::cleaner::{
    CleanMode, CleanupCandidate, CleanupReport, PurgeReport, RestoreReport, SessionSummary,
    TrashHealth,
};
use crate::common::config::Config;
use crate::common::format::{self, format_relative, format_size, format_size_colored};
use crate::organizer::{CategoryCount, PassReport};

/// Print a serializable value as pretty JSON
pub fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing results: {}", e),
    }
}

/// Print the result of one organize pass
pub fn print_organize_report(report: &PassReport, config: &Config) {
    println!();
    println!("{}  ClearBOOM Organize", "📂");
    println!("{}", "─".repeat(60).dimmed());
    println!("  Folder: {}", format::format_path(&config.watch_root).cyan());
    println!();
    println!(
        "  {} Moved         {}",
        "✓".green(),
        report.moved.to_string().cyan()
    );
    println!("  {} Unknown type  {}", "•".dimmed(), report.unclassified);
    if report.declined > 0 {
        println!("  {} Not approved  {}", "•".dimmed(), report.declined);
    }
    println!("  {} Skipped       {}", "•".dimmed(), report.rejected);
    if report.failed > 0 {
        println!(
            "  {} Failed        {}",
            "⚠".yellow(),
            report.failed.to_string().yellow()
        );
        println!(
            "  {} Failed files stay in place; see {}",
            "💡",
            "clearboom logs".cyan()
        );
    }
    println!();
}

/// Print cleanup candidates grouped by category
pub fn print_candidates(candidates: &[CleanupCandidate], config: &Config) {
    println!();
    println!("{}  ClearBOOM Cleanup Candidates", "🧹");
    println!("{}", "─".repeat(60).dimmed());

    if candidates.is_empty() {
        println!("  {} Nothing to clean up!", "✨");
        println!();
        return;
    }

    let total: u64 = candidates.iter().map(|c| c.size_bytes).sum();
    println!(
        "  {}  •  {}",
        format::format_count(candidates.len()),
        format_size_colored(total)
    );
    println!("{}", "─".repeat(60).dimmed());

    let mut current: Option<&str> = None;
    for candidate in candidates {
        if current != Some(candidate.category.as_str()) {
            println!();
            println!("  {} {}", "●".yellow(), candidate.category.bold());
            current = Some(candidate.category.as_str());
        }
        println!(
            "    {:<44} {:>10}  {}",
            format::truncate(&format_relative(&candidate.path, &config.watch_root), 44),
            format_size(candidate.size_bytes),
            candidate.reason.to_string().dimmed()
        );
    }
    println!();
}

pub fn print_cleanup_report(report: &CleanupReport) {
    println!();
    let (icon, mode_label) = match report.mode {
        CleanMode::SoftDelete => ("✓", "Moved to trash"),
        CleanMode::HardDelete => ("🔥", "Deleted"),
    };

    println!(
        "  {} {}: {} of {} files, {}",
        icon,
        mode_label.bold(),
        report.stats.success.to_string().cyan(),
        report.stats.total,
        format_size_colored(report.bytes_freed),
    );
    if report.stats.skipped > 0 {
        println!("  {} Skipped: {}", "•".dimmed(), report.stats.skipped);
    }
    if report.stats.failed > 0 {
        println!("  {} Failed: {}", "⚠".yellow(), report.stats.failed);
    }
    if report.folders_pruned > 0 {
        println!("  {} Removed {} empty folders", "•".dimmed(), report.folders_pruned);
    }
    if report.aborted {
        println!("  {} Stopped before the end", "ℹ️");
    }

    if let Some(ref sid) = report.session_id {
        println!("  {} Session: {}", "💾", sid.cyan());
        println!(
            "  {} Undo with: {}",
            "💡",
            format!("clearboom undo --session {}", sid).cyan()
        );
    }

    if !report.errors.is_empty() {
        println!();
        println!("  {} {} errors:", "⚠".yellow(), report.errors.len());
        for (i, err) in report.errors.iter().enumerate().take(10) {
            println!("    {} {}", format!("{}.", i + 1).dimmed(), err.dimmed());
        }
        if report.errors.len() > 10 {
            println!(
                "    ... and {} more",
                (report.errors.len() - 10).to_string().dimmed()
            );
        }
    }
    println!();
}

/// Print the list of trash sessions
pub fn print_sessions(sessions: &[SessionSummary]) {
    println!();
    println!("  {} Trash Sessions", "📦");
    println!("{}", "─".repeat(80).dimmed());
    println!();

    if sessions.is_empty() {
        println!("  No sessions found in the trash.");
        println!();
        return;
    }

    println!(
        "  {:<32} {:>10} {:>8}  {}",
        "Session ID".dimmed(),
        "Size".dimmed(),
        "Files".dimmed(),
        "Status".dimmed(),
    );
    println!("  {}", "─".repeat(76).dimmed());

    for session in sessions {
        println!(
            "  {:<32} {:>10} {:>8}  {}",
            session.session_id,
            format_size(session.staged_size),
            session.total_files,
            session_status(session),
        );
    }

    println!();
    println!("  {} Restore: {}", "💡", "clearboom undo --session <ID>".cyan());
    println!("  {} Purge expired: {}", "💡", "clearboom purge --expired".cyan());
    println!();
}

fn session_status(session: &SessionSummary) -> String {
    if session.restored {
        "Restored".green().to_string()
    } else if session.is_expired {
        "Expired".red().to_string()
    } else {
        session
            .expires_at
            .map(|e| {
                let left = e - Utc::now();
                if left.num_days() > 0 {
                    format!("{}d left", left.num_days())
                } else {
                    format!("{}h left", left.num_hours().max(0))
                }
            })
            .unwrap_or_else(|| "N/A".to_string())
            .yellow()
            .to_string()
    }
}

pub fn print_restore_report(report: &RestoreReport) {
    println!();
    println!(
        "  {} Restored {} files ({})",
        "✓".green(),
        report.restored_count.to_string().cyan(),
        format_size_colored(report.restored_bytes),
    );
    println!("  {} Session: {}", "📦", report.session_id.cyan());

    if !report.errors.is_empty() {
        println!();
        println!(
            "  {} {} errors during restore:",
            "⚠".yellow(),
            report.errors.len()
        );
        for err in report.errors.iter().take(5) {
            println!("    {} {}", "→".dimmed(), err.dimmed());
        }
    }
    println!();
}

pub fn print_purge_report(report: &PurgeReport) {
    println!();
    if report.purged_sessions.is_empty() {
        println!("  {} No sessions to purge.", "✓".green());
    } else {
        println!(
            "  {} Purged {} sessions, freed {}",
            "🔥",
            report.purged_sessions.len().to_string().cyan(),
            format_size_colored(report.total_bytes_freed),
        );
        for session in &report.purged_sessions {
            println!(
                "    {} {} ({})",
                "✗".red(),
                session.session_id,
                format_size(session.bytes_freed),
            );
        }
    }

    if !report.errors.is_empty() {
        println!();
        for err in &report.errors {
            println!("    {} {}", "⚠".yellow(), err.dimmed());
        }
    }
    println!();
}

/// Print a trash warning if there is one
pub fn print_trash_health(health: &TrashHealth) {
    if let Some(ref warning) = health.warning {
        println!("  {} {}", "⚠".yellow(), warning.yellow());
        println!();
    }
}

pub fn print_stats(counts: &[CategoryCount], health: &TrashHealth, config: &Config) {
    println!();
    println!("  {} ClearBOOM Status", "📊");
    println!("{}", "─".repeat(60).dimmed());
    println!("  Folder: {}", format::format_path(&config.watch_root).cyan());
    println!();

    for count in counts {
        let n = if count.count > 0 {
            count.count.to_string().cyan()
        } else {
            count.count.to_string().dimmed()
        };
        println!("    {:<24} {:>6}", count.category, n);
    }

    println!();
    println!(
        "  {} Trash: {} sessions, {} used",
        "📦",
        health.session_count,
        format_size(health.total_size)
    );
    print_trash_health(health);
    println!();
}

pub fn print_logs(lines: &[String]) {
    if lines.is_empty() {
        println!("  No log entries yet.");
        return;
    }
    for line in lines {
        println!("{}", line);
    }
}
