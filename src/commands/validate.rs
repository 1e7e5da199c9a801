//! `validate` - check the manifest without touching the system

use anyhow::{Result, bail};

use crate::Context;
use crate::account::plan as planner;
use crate::engine;
use crate::ui;

pub fn run(ctx: &Context) -> Result<()> {
    ui::header("Validating Manifest");

    let manifest = super::load_manifest(ctx)?;
    let resolver = manifest.resolver();

    let mut count = 0usize;
    let mut errors = 0usize;
    let mut all_nodes = Vec::new();

    for declared in manifest.accounts() {
        count += 1;
        let resolved = resolver.resolve(declared);
        match planner::plan(&resolved) {
            Ok(nodes) => {
                ui::success(&format!("{} ({} resources)", resolved.title, nodes.len()));
                all_nodes.extend(nodes);
            }
            Err(e) => {
                ui::error(&format!("{}: {e}", resolved.title));
                errors += 1;
            }
        }
    }

    if count == 0 {
        ui::warn("Manifest declares no accounts");
    }

    // The cross-account graph must validate as a whole too
    if errors == 0
        && let Err(e) = engine::lower(&all_nodes)
    {
        ui::error(&format!("Combined plan: {e}"));
        errors += 1;
    }

    println!();
    if errors > 0 {
        bail!("{errors} account(s) failed validation");
    }
    ui::success(&format!("{count} account(s) valid"));

    Ok(())
}
