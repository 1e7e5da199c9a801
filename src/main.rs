mod account;
mod cli;
mod commands;
mod config;
mod engine;
mod resource;
mod sudo;
mod ui;

use std::io;
use std::path::PathBuf;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Commands};

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    pub manifest_path: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let manifest_path = match cli.manifest {
        Some(path) => path,
        None => config::default_manifest_path()?,
    };

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        manifest_path,
    };

    match cli.command {
        Commands::Plan { account, json } => commands::plan::run(&ctx, account.as_deref(), json),
        Commands::Diff { account, target } => {
            commands::diff::run(&ctx, account.as_deref(), target.as_deref())
        }
        Commands::Apply {
            account,
            dry_run,
            jobs,
            yes,
            target,
        } => commands::apply::run(&ctx, account.as_deref(), dry_run, jobs, yes, target.as_deref()),
        Commands::Validate => commands::validate::run(&ctx),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "accountctl", &mut io::stdout());
            Ok(())
        }
    }
}
