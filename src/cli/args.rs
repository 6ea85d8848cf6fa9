use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// ClearBOOM: keeps your downloads folder sorted and tidy
#[derive(Parser, Debug)]
#[command(
    name = "clearboom",
    version,
    about = "Sorts your downloads folder by file type and cleans up stale files",
    long_about = "ClearBOOM watches your downloads folder and moves every new file into a\n\
                   category folder by extension, with a backup taken before each move.\n\
                   Stale archives and installers can be cleaned up into a recoverable trash.",
    after_help = "EXAMPLES:\n  \
        clearboom watch                        Organize new downloads until Ctrl-C\n  \
        clearboom organize                     Sort the files already there, then exit\n  \
        clearboom cleanup --dry-run            Preview cleanup candidates\n  \
        clearboom cleanup --yes                Move candidates to the trash\n  \
        clearboom undo --last                  Restore the last cleanup\n  \
        clearboom purge --expired              Empty expired trash sessions\n  \
        clearboom stats                        Files waiting per category\n  \
        clearboom logs -n 20                   Recent log lines"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file to use instead of ~/.clearboom/config.toml
    #[arg(long, global = true, value_name = "PATH", env = "CLEARBOOM_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, default_value = "human")]
    pub format: OutputFormat,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Quiet mode, minimal output
    #[arg(long, short, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Watch the downloads folder and organize files as they arrive
    Watch {
        /// Approve every move when confirm_before_move is enabled
        #[arg(long, short = 'y')]
        yes: bool,
    },

    /// Organize the files currently in the downloads folder, then exit
    Organize {
        /// Approve every move when confirm_before_move is enabled
        #[arg(long, short = 'y')]
        yes: bool,
    },

    /// Remove stale files from the cleanup-enabled category folders
    Cleanup {
        /// Only list what would be removed
        #[arg(long)]
        dry_run: bool,

        /// Delete permanently instead of moving to the trash
        #[arg(long)]
        hard: bool,

        /// Skip confirmation prompts
        #[arg(long, short = 'y')]
        yes: bool,
    },

    /// Restore files from a cleanup trash session
    Undo {
        /// Restore the most recent cleanup session
        #[arg(long)]
        last: bool,

        /// Specific session ID to restore
        #[arg(long)]
        session: Option<String>,

        /// List all available sessions
        #[arg(long)]
        list: bool,
    },

    /// Permanently empty trash sessions
    Purge {
        /// Only purge expired sessions
        #[arg(long)]
        expired: bool,

        /// Purge ALL trash sessions
        #[arg(long)]
        all: bool,

        /// Purge a specific session by ID
        #[arg(long)]
        session: Option<String>,

        /// Skip confirmation
        #[arg(long, short = 'y')]
        yes: bool,
    },

    /// Files waiting in the downloads folder, per category
    Stats,

    /// Show the most recent log lines
    Logs {
        /// Number of lines
        #[arg(short = 'n', long, default_value = "50")]
        lines: usize,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: CompletionShell,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Write the default config and create the folder layout
    Init,

    /// Print the config file location
    Path,

    /// Reset to default configuration
    Reset,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
    Quiet,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}
