//! `diff` - show pending changes without applying them

use anyhow::Result;
use colored::Colorize;
use convergence::{DiffSummary, ResourceState, compute_diffs};

use crate::Context;
use crate::engine;
use crate::ui;

pub fn run(ctx: &Context, account: Option<&str>, target: Option<&str>) -> Result<()> {
    let manifest = super::load_manifest(ctx)?;
    let nodes = super::planned_nodes(&manifest, account)?;
    let plan = engine::lower(&nodes)?.filter_by_target(target);

    ui::header("Pending Changes");

    let diffs = compute_diffs(plan.resources());
    if diffs.is_empty() {
        ui::success("No changes - system matches the manifest");
        return Ok(());
    }

    for diff in &diffs {
        let marker = if diff.is_addition() {
            "+".green()
        } else if diff.is_removal() {
            "-".red()
        } else {
            "~".yellow()
        };
        println!("  {} {}", marker, diff.resource_id.bold());
        if !ctx.quiet {
            ui::dim(&format!("    current: {}", describe_state(&diff.current)));
            ui::dim(&format!("    desired: {}", describe_state(&diff.desired)));
        }
    }

    let summary = DiffSummary::from_diffs(&diffs);
    println!();
    ui::info(&format!(
        "{} to create, {} to modify, {} to remove ({} require sudo)",
        summary.additions, summary.modifications, summary.removals, summary.sudo_required
    ));

    Ok(())
}

fn describe_state(state: &ResourceState) -> String {
    match state {
        ResourceState::Present { details: Some(d) } => format!("present ({d})"),
        ResourceState::Present { details: None } => "present".to_string(),
        ResourceState::Absent => "absent".to_string(),
        ResourceState::Modified { from, to } => format!("{from} -> {to}"),
        ResourceState::Unknown => "unknown".to_string(),
    }
}
