//! Lowering planned nodes into an executable plan
//!
//! Bridges the pure planning core and the convergence executor: every
//! node becomes its concrete resource implementation, and the combined
//! graph is validated once more so cross-account plans with colliding
//! or dangling references are rejected before anything runs.

use anyhow::Result;
use convergence::ExecutionPlan;

use crate::account::node::ResourceNode;
use crate::resource;

/// Lower an ordered node sequence (one or many accounts) into an
/// execution plan
pub fn lower(nodes: &[ResourceNode]) -> Result<ExecutionPlan> {
    let mut plan = ExecutionPlan::new();
    for node in nodes {
        plan.add_resource(resource::from_node(node));
    }
    plan.validate()?;
    log::debug!("lowered {} nodes into an execution plan", nodes.len());
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::plan::plan;
    use crate::account::resolve::Resolver;
    use crate::account::AccountSpec;

    #[test]
    fn test_lower_default_account() {
        let resolved = Resolver::default().resolve(&AccountSpec::new("user"));
        let nodes = plan(&resolved).unwrap();
        let plan = lower(&nodes).unwrap();
        assert_eq!(plan.total_resources(), nodes.len());
    }

    #[test]
    fn test_lower_two_accounts_in_one_plan() {
        let resolver = Resolver::default();
        let mut nodes = Vec::new();
        for title in ["alice", "bob"] {
            nodes.extend(plan(&resolver.resolve(&AccountSpec::new(title))).unwrap());
        }
        let plan = lower(&nodes).unwrap();
        assert_eq!(plan.total_resources(), nodes.len());

        // Both accounts start in the first wave: independent accounts
        // may converge in parallel. Each account contributes two
        // prerequisite-free nodes, its group and the absent
        // authorized_keys file for a keyless account.
        let waves = plan.waves().unwrap();
        let wave0: Vec<String> = waves[0].iter().map(|&i| plan.resources()[i].id()).collect();
        assert_eq!(wave0.len(), 4);
        assert!(wave0.contains(&"group[alice]".to_string()));
        assert!(wave0.contains(&"group[bob]".to_string()));
    }

    #[test]
    fn test_lower_orders_group_before_user() {
        let resolved = Resolver::default().resolve(&AccountSpec::new("user"));
        let nodes = plan(&resolved).unwrap();
        let plan = lower(&nodes).unwrap();
        let waves = plan.waves().unwrap();

        let id_of = |i: usize| plan.resources()[i].id();
        let wave_of = |id: &str| {
            waves
                .iter()
                .position(|w| w.iter().any(|&i| id_of(i) == id))
                .unwrap()
        };
        assert!(wave_of("group[user]") < wave_of("user[user]"));
        assert!(wave_of("user[user]") < wave_of("directory[user_home]"));
        assert!(wave_of("directory[user_home]") < wave_of("directory[user_sshdir]"));
    }
}
