use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

#[derive(Parser)]
#[command(name = "accountctl")]
#[command(version)]
#[command(about = "Converge local user accounts toward a declarative manifest", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the accounts manifest (defaults to ~/.config/accountctl/accounts.toml)
    #[arg(short, long, global = true)]
    pub manifest: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the ordered resource plan for accounts
    Plan {
        /// Plan a single account (defaults to all)
        account: Option<String>,

        /// Emit the plan as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show pending changes (current vs desired state)
    Diff {
        /// Diff a single account (defaults to all)
        account: Option<String>,

        /// Limit to resources matching TYPE or TYPE.NAME (e.g. "user" or "file.deploy")
        #[arg(short, long)]
        target: Option<String>,
    },

    /// Apply the manifest to the system
    Apply {
        /// Apply a single account (defaults to all)
        account: Option<String>,

        /// Show what would change without touching the system
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Number of parallel jobs per wave
        #[arg(short, long, default_value = "4")]
        jobs: usize,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,

        /// Limit to resources matching TYPE or TYPE.NAME (e.g. "user" or "file.deploy")
        #[arg(short, long)]
        target: Option<String>,
    },

    /// Validate the manifest (parse keys, resolve and plan every account)
    Validate,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}
