pub mod args;
pub mod output;

use colored::Colorize;
use std::io::{IsTerminal, Write};
use std::path::Path;
use std::sync::Mutex;

use crate::common::format;
use crate::organizer::StatusSink;

/// Ask a yes/no question on stdin. Anything but "y" is a no.
pub fn confirm(prompt: &str) -> anyhow::Result<bool> {
    print!("  {} {} [y/N] ", "❓", prompt);
    std::io::stdout().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}

/// Terminal front-end for the organizer's status feed
pub struct ConsoleSink {
    quiet: bool,
    assume_yes: bool,
    prompt: Mutex<()>,
}

impl ConsoleSink {
    pub fn new(quiet: bool, assume_yes: bool) -> Self {
        Self {
            quiet,
            assume_yes,
            prompt: Mutex::new(()),
        }
    }
}

impl StatusSink for ConsoleSink {
    fn status(&self, message: &str) {
        tracing::debug!(target: "clearboom::status", "{}", message);
        if !self.quiet {
            println!("  {} {}", "•".dimmed(), message);
        }
    }

    fn confirm_move(&self, path: &Path, category: &str) -> bool {
        if self.assume_yes {
            return true;
        }
        if !std::io::stdin().is_terminal() {
            return false;
        }
        // One question at a time when several workers ask
        let Ok(_guard) = self.prompt.lock() else {
            return false;
        };
        confirm(&format!(
            "Move {} to {}?",
            format::format_path(path),
            category.cyan()
        ))
        .unwrap_or(false)
    }
}
