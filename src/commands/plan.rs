//! `plan` - print the ordered resource sequence for the manifest

use anyhow::Result;
use colored::Colorize;

use crate::Context;
use crate::account::node::NodeEnsure;
use crate::engine;
use crate::ui;

pub fn run(ctx: &Context, account: Option<&str>, json: bool) -> Result<()> {
    let manifest = super::load_manifest(ctx)?;
    let nodes = super::planned_nodes(&manifest, account)?;

    // Validate the combined graph even though nothing runs
    engine::lower(&nodes)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&nodes)?);
        return Ok(());
    }

    ui::header("Resource Plan");

    if nodes.is_empty() {
        ui::info("Manifest declares no accounts");
        return Ok(());
    }

    for node in &nodes {
        let marker = match node.ensure {
            NodeEnsure::Absent => "-".red(),
            NodeEnsure::Present | NodeEnsure::Directory => "+".green(),
        };
        println!(
            "  {} {} {}",
            marker,
            node.reference().bold(),
            node.ensure.to_string().dimmed()
        );
        if !ctx.quiet {
            for (key, value) in node.attributes() {
                ui::dim(&format!("    {key} = {value}"));
            }
            if !node.requires.is_empty() {
                ui::dim(&format!("    requires: {}", node.requires.join(", ")));
            }
        }
    }

    println!();
    ui::success(&format!("{} resources planned", nodes.len()));

    Ok(())
}
