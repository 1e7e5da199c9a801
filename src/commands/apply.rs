//! `apply` - converge the system toward the manifest

use std::io::{self, Write};

use anyhow::{Result, bail};
use colored::Colorize;
use convergence::{
    ApplyResult, ConfirmCallback, DiffSummary, ExecuteOptions, ProgressCallback, compute_diffs,
    execute,
};

use crate::Context;
use crate::engine;
use crate::sudo::SudoContext;
use crate::ui;

pub fn run(
    ctx: &Context,
    account: Option<&str>,
    dry_run: bool,
    jobs: usize,
    yes: bool,
    target: Option<&str>,
) -> Result<()> {
    ui::header("Applying Manifest");

    if dry_run {
        ui::warn("Dry run - no changes will be made");
    }

    let manifest = super::load_manifest(ctx)?;
    let nodes = super::planned_nodes(&manifest, account)?;
    let plan = engine::lower(&nodes)?.filter_by_target(target);

    let diffs = compute_diffs(plan.resources());
    if diffs.is_empty() {
        ui::success("Nothing to do - system matches the manifest");
        return Ok(());
    }

    let pending = DiffSummary::from_diffs(&diffs);
    ui::info(&format!(
        "{} to create, {} to modify, {} to remove",
        pending.additions, pending.modifications, pending.removals
    ));
    if !ctx.quiet {
        for diff in &diffs {
            ui::dim(&format!("  {} ({})", diff.resource_id, diff.description));
        }
    }
    println!();

    let opts = ExecuteOptions {
        dry_run,
        jobs,
        verbose: ctx.verbose > 0,
    };
    let mut progress = ConsoleProgress { quiet: ctx.quiet };
    let mut confirm = PromptConfirm { assume_yes: yes };

    let summary = execute(
        plan,
        opts,
        || SudoContext::acquire("account changes modify system users and groups"),
        &mut progress,
        &mut confirm,
    )?;

    println!();
    if dry_run {
        ui::success(&format!("Dry run complete - {} changes pending", diffs.len()));
    } else if !summary.is_success() {
        ui::error(&format!(
            "Apply finished with {} failed, {} blocked",
            summary.failed, summary.blocked
        ));
        bail!("Apply failed");
    } else if summary.total_changes() == 0 && summary.skipped > 0 {
        ui::info("Aborted - no changes made");
    } else {
        ui::success(&format!(
            "Apply complete: {} created, {} modified, {} removed, {} unchanged",
            summary.created, summary.modified, summary.removed, summary.no_change
        ));
    }

    Ok(())
}

/// Prints one line per converged resource
struct ConsoleProgress {
    quiet: bool,
}

impl ProgressCallback for ConsoleProgress {
    fn on_wave_start(&mut self, _count: usize) {}

    fn on_resource_start(&mut self, _id: &str, _description: &str) {}

    fn on_resource_complete(&mut self, id: &str, result: &ApplyResult) {
        match result {
            ApplyResult::NoChange => {
                if !self.quiet {
                    println!("  {} {} {}", "·".dimmed(), id, "unchanged".dimmed());
                }
            }
            ApplyResult::Created => {
                println!("  {} {} {}", "+".green(), id, "created".green());
            }
            ApplyResult::Modified => {
                println!("  {} {} {}", "~".yellow(), id, "modified".yellow());
            }
            ApplyResult::Removed => {
                println!("  {} {} {}", "-".red(), id, "removed".red());
            }
            ApplyResult::Skipped { reason } => {
                if !self.quiet {
                    println!(
                        "  {} {} {}",
                        "·".dimmed(),
                        id,
                        format!("skipped: {reason}").dimmed()
                    );
                }
            }
            ApplyResult::Failed { error } => {
                println!("  {} {} {}", "✗".red(), id, error.red());
            }
            ApplyResult::Blocked { prerequisite } => {
                println!(
                    "  {} {} {}",
                    "✗".red(),
                    id,
                    format!("blocked by {prerequisite}").yellow()
                );
            }
        }
    }

    fn on_wave_complete(&mut self) {}
}

/// Asks on stdin unless `--yes` was given
struct PromptConfirm {
    assume_yes: bool,
}

impl ConfirmCallback for PromptConfirm {
    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        if self.assume_yes {
            return Ok(true);
        }
        print!("{prompt} [y/N] ");
        io::stdout().flush()?;
        let mut answer = String::new();
        io::stdin().read_line(&mut answer)?;
        Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
    }
}
