//! CLI command implementations

pub mod apply;
pub mod diff;
pub mod plan;
pub mod validate;

use anyhow::{Context as AnyhowContext, Result};

use crate::Context;
use crate::account::AccountSpec;
use crate::account::node::ResourceNode;
use crate::account::plan as planner;
use crate::config::Manifest;

/// Load the manifest configured for this invocation
fn load_manifest(ctx: &Context) -> Result<Manifest> {
    Manifest::load(&ctx.manifest_path)
}

/// Select one account by title, or all of them
fn select<'a>(manifest: &'a Manifest, account: Option<&str>) -> Result<Vec<&'a AccountSpec>> {
    match account {
        Some(title) => {
            let found = manifest
                .account(title)
                .with_context(|| format!("No account '{title}' in manifest"))?;
            Ok(vec![found])
        }
        None => Ok(manifest.accounts().collect()),
    }
}

/// Resolve and plan the selected accounts into one ordered node sequence
fn planned_nodes(manifest: &Manifest, account: Option<&str>) -> Result<Vec<ResourceNode>> {
    let resolver = manifest.resolver();
    let mut nodes = Vec::new();
    for declared in select(manifest, account)? {
        let resolved = resolver.resolve(declared);
        let planned = planner::plan(&resolved)
            .with_context(|| format!("Planning account '{}'", resolved.title))?;
        nodes.extend(planned);
    }
    Ok(nodes)
}
