use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clearboom::cleaner::{self, CleanManifest, CleanMode};
use clearboom::cli::args::{Cli, Commands, CompletionShell, ConfigAction, OutputFormat};
use clearboom::cli::{confirm, output, ConsoleSink};
use clearboom::common::config::Config;
use clearboom::common::fsops::RealFs;
use clearboom::common::{format, instance, logging};
use clearboom::organizer::{self, Organizer, ProcessedCache};

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    match cli.command {
        Commands::Watch { yes } => cmd_watch(&cli, yes),
        Commands::Organize { yes } => cmd_organize(&cli, yes),
        Commands::Cleanup { dry_run, hard, yes } => cmd_cleanup(&cli, dry_run, hard, yes),
        Commands::Undo {
            last,
            ref session,
            list,
        } => cmd_undo(&cli, last, session.clone(), list),
        Commands::Purge {
            expired,
            all,
            ref session,
            yes,
        } => cmd_purge(&cli, expired, all, session.clone(), yes),
        Commands::Stats => cmd_stats(&cli),
        Commands::Logs { lines } => cmd_logs(&cli, lines),
        Commands::Config { ref action } => cmd_config(&cli, action),
        Commands::Completions { shell } => {
            use clap::CommandFactory;
            let mut cmd = Cli::command();
            let shell = match shell {
                CompletionShell::Bash => clap_complete::Shell::Bash,
                CompletionShell::Zsh => clap_complete::Shell::Zsh,
                CompletionShell::Fish => clap_complete::Shell::Fish,
            };
            clap_complete::generate(shell, &mut cmd, "clearboom", &mut std::io::stdout());
            Ok(())
        }
    }
}

fn config_path(cli: &Cli) -> PathBuf {
    cli.config.clone().unwrap_or_else(Config::config_path)
}

fn load_config(cli: &Cli) -> Result<Config> {
    Config::load_from(&config_path(cli))
}

fn human(cli: &Cli) -> bool {
    !cli.quiet && matches!(cli.format, OutputFormat::Human)
}

// ─── Watch ────────────────────────────────────────────────────────────────────

fn cmd_watch(cli: &Cli, yes: bool) -> Result<()> {
    let config = load_config(cli)?;
    let _lock = instance::prepare(&config, &Config::lock_path())?;
    let _guard = logging::init(&config.logs_dir(), cli.verbose)?;

    if !config.options.auto_organize {
        println!(
            "  {} auto_organize is off in {}; nothing to watch.",
            "ℹ️",
            format::format_path(&config_path(cli))
        );
        return Ok(());
    }

    if human(cli) {
        println!();
        println!(
            "  {} Watching {} (Ctrl-C to stop)",
            "👀",
            format::format_path(&config.watch_root).cyan()
        );
        println!("{}", "─".repeat(60).dimmed());
    }

    let sink = Arc::new(ConsoleSink::new(!human(cli), yes));
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let summary = runtime.block_on(async {
        let mut organizer = Organizer::new(Arc::new(config.clone()), sink);
        organizer.start().await?;
        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for Ctrl-C")?;
        let summary = organizer.stop().await?;
        Ok::<_, anyhow::Error>(summary)
    })?;

    match cli.format {
        OutputFormat::Human => output::print_organize_report(&summary.report, &config),
        OutputFormat::Json => output::print_json(&summary.report),
        OutputFormat::Quiet => println!("{}  {}", summary.report.moved, summary.report.failed),
    }
    Ok(())
}

// ─── Organize ─────────────────────────────────────────────────────────────────

fn cmd_organize(cli: &Cli, yes: bool) -> Result<()> {
    let config = load_config(cli)?;
    let _lock = instance::prepare(&config, &Config::lock_path())?;
    let _guard = logging::init(&config.logs_dir(), cli.verbose)?;

    let sink = Arc::new(ConsoleSink::new(!human(cli), yes));
    let organizer = Organizer::new(Arc::new(config.clone()), sink);
    let mut cache = ProcessedCache::new(config.cache_capacity);
    let report = organizer.run_once(&mut cache)?;

    match cli.format {
        OutputFormat::Human => output::print_organize_report(&report, &config),
        OutputFormat::Json => output::print_json(&report),
        OutputFormat::Quiet => println!("{}  {}", report.moved, report.failed),
    }
    Ok(())
}

// ─── Cleanup ──────────────────────────────────────────────────────────────────

fn cmd_cleanup(cli: &Cli, dry_run: bool, hard: bool, yes: bool) -> Result<()> {
    let config = load_config(cli)?;
    if !config.watch_root.is_dir() {
        anyhow::bail!(
            "Downloads folder does not exist: {}",
            config.watch_root.display()
        );
    }
    let _guard = logging::init(&config.logs_dir(), cli.verbose)?;

    let candidates = cleaner::scan(&config);

    if dry_run {
        match cli.format {
            OutputFormat::Human => {
                output::print_candidates(&candidates, &config);
                println!("  {} Dry run, no files modified.", "ℹ️");
            }
            OutputFormat::Json => output::print_json(&candidates),
            OutputFormat::Quiet => {
                for c in &candidates {
                    println!("{}\t{}", c.path.display(), c.reason);
                }
            }
        }
        return Ok(());
    }

    if human(cli) {
        output::print_candidates(&candidates, &config);
    }
    if candidates.is_empty() {
        return Ok(());
    }

    let mode = if hard {
        CleanMode::HardDelete
    } else {
        CleanMode::from_config(&config.cleanup)
    };

    if mode == CleanMode::SoftDelete && human(cli) {
        output::print_trash_health(&cleaner::check_trash_health(&config)?);
    }

    if !yes {
        let total: u64 = candidates.iter().map(|c| c.size_bytes).sum();
        let label = match mode {
            CleanMode::SoftDelete => "Move to trash",
            CleanMode::HardDelete => "PERMANENTLY DELETE",
        };
        let question = format!(
            "{} {} ({})?",
            label,
            format::format_count(candidates.len()),
            format::format_size(total)
        );
        if !confirm(&question)? {
            println!("  {} Cancelled", "✗".red());
            return Ok(());
        }
    }

    let pb = if human(cli) {
        let pb = ProgressBar::new(candidates.len() as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.red} [{bar:40.red/blue}] {pos}/{len} Cleaning... {msg}")
        {
            pb.set_style(style.progress_chars("━━░"));
        }
        Some(pb)
    } else {
        None
    };

    let mut progress = |_index: usize, _total: usize, path: &Path, _reason: &str| {
        if let Some(ref pb) = pb {
            pb.set_message(format::truncate(&format::format_path(path), 40));
            pb.inc(1);
        }
        true
    };
    let report = cleaner::execute(&config, &candidates, mode, Some(&mut progress));

    if let Some(ref pb) = pb {
        pb.finish_and_clear();
    }

    match cli.format {
        OutputFormat::Human => output::print_cleanup_report(&report),
        OutputFormat::Json => output::print_json(&report),
        OutputFormat::Quiet => println!(
            "{}  {}  {}",
            report.stats.success,
            format::format_size(report.bytes_freed),
            report.session_id.as_deref().unwrap_or("none")
        ),
    }
    Ok(())
}

// ─── Undo ─────────────────────────────────────────────────────────────────────

fn cmd_undo(cli: &Cli, last: bool, session: Option<String>, list: bool) -> Result<()> {
    logging::init_console(cli.verbose);
    let config = load_config(cli)?;

    if list {
        let sessions = CleanManifest::list_sessions(&config)?;
        match cli.format {
            OutputFormat::Human => output::print_sessions(&sessions),
            OutputFormat::Json => output::print_json(&sessions),
            OutputFormat::Quiet => {
                for s in &sessions {
                    let status = if s.restored {
                        "restored"
                    } else if s.is_expired {
                        "expired"
                    } else {
                        "active"
                    };
                    println!(
                        "{}  {}  {}",
                        s.session_id,
                        format::format_size(s.staged_size),
                        status
                    );
                }
            }
        }
        return Ok(());
    }

    let session_id = if last {
        CleanManifest::most_recent_session(&config)?
            .ok_or_else(|| anyhow::anyhow!("No sessions found in the trash"))?
    } else if let Some(sid) = session {
        sid
    } else {
        println!();
        println!("  {} Undo a previous cleanup", "↩️");
        println!();
        println!("  Usage:");
        println!("    {} Restore last session", "clearboom undo --last".cyan());
        println!("    {} Restore specific", "clearboom undo --session <ID>".cyan());
        println!("    {} List all", "clearboom undo --list".cyan());
        println!();
        return Ok(());
    };

    let manifest = CleanManifest::load(&config, &session_id)?;
    if manifest.restored {
        println!("  {} Session '{}' was already restored.", "ℹ️", session_id);
        return Ok(());
    }

    if human(cli) {
        let restorable = manifest
            .items
            .iter()
            .filter(|i| i.success && i.staged_path.is_some())
            .count();
        println!();
        println!(
            "  {} Restoring session '{}': {} files ({})",
            "↩️",
            session_id.cyan(),
            restorable,
            format::format_size(manifest.total_bytes)
        );
    }

    let report = cleaner::restore_session(&config, &RealFs, &session_id, human(cli))?;

    match cli.format {
        OutputFormat::Human => output::print_restore_report(&report),
        OutputFormat::Json => output::print_json(&report),
        OutputFormat::Quiet => println!(
            "{}  {}  {}",
            report.session_id,
            report.restored_count,
            format::format_size(report.restored_bytes)
        ),
    }
    Ok(())
}

// ─── Purge ────────────────────────────────────────────────────────────────────

fn cmd_purge(
    cli: &Cli,
    expired: bool,
    all: bool,
    session: Option<String>,
    yes: bool,
) -> Result<()> {
    logging::init_console(cli.verbose);
    let config = load_config(cli)?;

    if let Some(sid) = session {
        if !yes && !confirm(&format!("Permanently purge session '{}'?", sid))? {
            println!("  {} Cancelled", "✗".red());
            return Ok(());
        }
        let freed = cleaner::purge_session(&config, &sid)?;
        println!("  {} Purged '{}', freed {}", "🔥", sid, format::format_size(freed));
        return Ok(());
    }

    if all {
        let sessions = CleanManifest::list_sessions(&config)?;
        let total: u64 = sessions.iter().map(|s| s.staged_size).sum();
        if !yes
            && !confirm(&format!(
                "Permanently purge ALL {} sessions ({})?",
                sessions.len(),
                format::format_size(total)
            ))?
        {
            println!("  {} Cancelled", "✗".red());
            return Ok(());
        }
        let report = cleaner::purge_all(&config)?;
        print_purge(cli, &report);
        return Ok(());
    }

    if expired {
        let report = cleaner::purge_expired(&config)?;
        print_purge(cli, &report);
        return Ok(());
    }

    println!();
    println!("  {} Purge trash sessions", "🔥");
    println!();
    println!("  Usage:");
    println!("    {} Expired only", "clearboom purge --expired".cyan());
    println!("    {} ALL sessions", "clearboom purge --all".cyan());
    println!("    {} Specific session", "clearboom purge --session <ID>".cyan());
    println!();

    let health = cleaner::check_trash_health(&config)?;
    println!(
        "  Trash: {} sessions, {} total",
        health.session_count,
        format::format_size(health.total_size)
    );
    output::print_trash_health(&health);
    Ok(())
}

fn print_purge(cli: &Cli, report: &cleaner::PurgeReport) {
    match cli.format {
        OutputFormat::Human => output::print_purge_report(report),
        OutputFormat::Json => output::print_json(report),
        OutputFormat::Quiet => println!(
            "{}  {}",
            report.purged_sessions.len(),
            format::format_size(report.total_bytes_freed)
        ),
    }
}

// ─── Stats / Logs ─────────────────────────────────────────────────────────────

fn cmd_stats(cli: &Cli) -> Result<()> {
    logging::init_console(cli.verbose);
    let config = load_config(cli)?;
    let counts = organizer::category_counts(&config);
    let health = cleaner::check_trash_health(&config)?;

    match cli.format {
        OutputFormat::Human => output::print_stats(&counts, &health, &config),
        OutputFormat::Json => output::print_json(&serde_json::json!({
            "watch_root": config.watch_root,
            "categories": counts,
            "trash": health,
        })),
        OutputFormat::Quiet => {
            for c in &counts {
                println!("{}\t{}", c.category, c.count);
            }
        }
    }
    Ok(())
}

fn cmd_logs(cli: &Cli, lines: usize) -> Result<()> {
    logging::init_console(cli.verbose);
    let config = load_config(cli)?;
    let recent = logging::recent_log_lines(&config.logs_dir(), lines);

    match cli.format {
        OutputFormat::Json => output::print_json(&recent),
        _ => output::print_logs(&recent),
    }
    Ok(())
}

// ─── Config ───────────────────────────────────────────────────────────────────

fn cmd_config(cli: &Cli, action: &ConfigAction) -> Result<()> {
    let path = config_path(cli);
    match action {
        ConfigAction::Init => {
            let config = if path.exists() {
                Config::load_from(&path)?
            } else {
                let config = Config::default();
                config.save_to(&path)?;
                config
            };
            config.init_dirs()?;
            println!(
                "  {} ClearBOOM initialized: {}",
                "✓".green(),
                format::format_path(&path)
            );
            println!(
                "  Created category folders in {}",
                format::format_path(&config.watch_root)
            );
            Ok(())
        }
        ConfigAction::Show => {
            let config = Config::load_from(&path)?;
            match cli.format {
                OutputFormat::Json => output::print_json(&config),
                _ => println!("{}", toml::to_string_pretty(&config)?),
            }
            Ok(())
        }
        ConfigAction::Path => {
            println!("{}", path.display());
            Ok(())
        }
        ConfigAction::Reset => {
            Config::default().save_to(&path)?;
            println!("  {} Configuration reset to defaults", "✓".green());
            Ok(())
        }
    }
}
