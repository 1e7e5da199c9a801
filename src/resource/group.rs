//! Group resource - dedicated primary groups

use anyhow::Result;
use convergence::{ApplyContext, ApplyResult, Resource, ResourceState, SudoRequirement};

use super::{run_admin, sysdb};
use crate::account::node::{GroupAttrs, NodeEnsure, ResourceNode};

/// An OS group managed through groupadd/groupmod/groupdel
#[derive(Debug, Clone)]
pub struct GroupResource {
    reference: String,
    ensure: NodeEnsure,
    requires: Vec<String>,
    attrs: GroupAttrs,
}

impl GroupResource {
    pub fn new(node: &ResourceNode, attrs: GroupAttrs) -> Self {
        Self {
            reference: node.reference(),
            ensure: node.ensure,
            requires: node.requires.clone(),
            attrs,
        }
    }

    fn create(&self, ctx: &ApplyContext) -> Result<()> {
        let gid_str;
        let mut args: Vec<&str> = Vec::new();
        if self.attrs.system {
            args.push("-r");
        }
        if let Some(gid) = self.attrs.gid {
            gid_str = gid.to_string();
            args.push("-g");
            args.push(&gid_str);
        }
        args.push(&self.attrs.name);
        run_admin(ctx, "groupadd", &args)?;
        Ok(())
    }
}

impl Resource for GroupResource {
    fn id(&self) -> String {
        self.reference.clone()
    }

    fn description(&self) -> String {
        match self.ensure {
            NodeEnsure::Absent => format!("Remove group {}", self.attrs.name),
            _ => format!("Group {}", self.attrs.name),
        }
    }

    fn resource_type(&self) -> &'static str {
        "group"
    }

    fn requires(&self) -> Vec<String> {
        self.requires.clone()
    }

    fn sudo_requirement(&self) -> SudoRequirement {
        SudoRequirement::Required {
            reason: "modifies the group database".to_string(),
        }
    }

    fn current_state(&self) -> Result<ResourceState> {
        let Some(entry) = sysdb::lookup_group(&self.attrs.name)? else {
            return Ok(ResourceState::Absent);
        };
        if let Some(gid) = self.attrs.gid
            && self.ensure != NodeEnsure::Absent
            && entry.gid != gid
        {
            return Ok(ResourceState::Modified {
                from: format!("gid {}", entry.gid),
                to: format!("gid {gid}"),
            });
        }
        Ok(ResourceState::Present { details: None })
    }

    fn desired_state(&self) -> ResourceState {
        match self.ensure {
            NodeEnsure::Absent => ResourceState::Absent,
            _ => ResourceState::Present { details: None },
        }
    }

    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        if ctx.dry_run {
            return Ok(ApplyResult::Skipped {
                reason: "Dry run".to_string(),
            });
        }

        match (self.ensure, self.current_state()?) {
            (NodeEnsure::Absent, ResourceState::Absent) => Ok(ApplyResult::NoChange),
            (NodeEnsure::Absent, _) => {
                run_admin(ctx, "groupdel", &[&self.attrs.name])?;
                Ok(ApplyResult::Removed)
            }
            (_, ResourceState::Absent) => {
                self.create(ctx)?;
                Ok(ApplyResult::Created)
            }
            (_, ResourceState::Modified { .. }) => {
                let gid = self.attrs.gid.unwrap_or_default().to_string();
                run_admin(ctx, "groupmod", &["-g", &gid, &self.attrs.name])?;
                Ok(ApplyResult::Modified)
            }
            _ => Ok(ApplyResult::NoChange),
        }
    }
}
