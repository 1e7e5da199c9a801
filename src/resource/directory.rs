//! Directory resource - home and .ssh directories

use anyhow::{bail, Result};
use convergence::{ApplyContext, ApplyResult, Resource, ResourceState, SudoRequirement};
use std::fs;
use std::os::unix::fs::MetadataExt;

use super::{parse_mode, run_admin, sysdb};
use crate::account::node::{FileAttrs, NodeEnsure, ResourceNode};

/// A directory with declared owner, group and mode
#[derive(Debug, Clone)]
pub struct DirectoryResource {
    reference: String,
    ensure: NodeEnsure,
    requires: Vec<String>,
    attrs: FileAttrs,
}

impl DirectoryResource {
    pub fn new(node: &ResourceNode, attrs: FileAttrs) -> Self {
        Self {
            reference: node.reference(),
            ensure: node.ensure,
            requires: node.requires.clone(),
            attrs,
        }
    }

    /// Declared attributes the live directory does not match
    fn drift(&self, meta: &fs::Metadata) -> Result<Vec<(String, String)>> {
        let mut drift = Vec::new();
        if let Some(mode) = self.attrs.mode.as_deref().and_then(parse_mode) {
            let actual = meta.mode() & 0o7777;
            if actual != mode {
                drift.push((format!("mode {actual:o}"), format!("mode {mode:o}")));
            }
        }
        if let Some(owner) = &self.attrs.owner {
            let actual = sysdb::lookup_uid(meta.uid())?.map(|e| e.name);
            if actual.as_deref() != Some(owner) {
                drift.push((
                    format!("owner {}", actual.unwrap_or_else(|| meta.uid().to_string())),
                    format!("owner {owner}"),
                ));
            }
        }
        if let Some(group) = &self.attrs.group {
            let actual = sysdb::lookup_gid(meta.gid())?.map(|e| e.name);
            if actual.as_deref() != Some(group) {
                drift.push((
                    format!("group {}", actual.unwrap_or_else(|| meta.gid().to_string())),
                    format!("group {group}"),
                ));
            }
        }
        Ok(drift)
    }

    fn set_attributes(&self, ctx: &ApplyContext) -> Result<()> {
        if let (Some(owner), Some(group)) = (&self.attrs.owner, &self.attrs.group) {
            let spec = format!("{owner}:{group}");
            run_admin(ctx, "chown", &[&spec, &self.attrs.path])?;
        }
        if let Some(mode) = &self.attrs.mode {
            run_admin(ctx, "chmod", &[mode, &self.attrs.path])?;
        }
        Ok(())
    }
}

impl Resource for DirectoryResource {
    fn id(&self) -> String {
        self.reference.clone()
    }

    fn description(&self) -> String {
        match self.ensure {
            NodeEnsure::Absent => format!("Remove directory {}", self.attrs.path),
            _ => format!("Directory {}", self.attrs.path),
        }
    }

    fn resource_type(&self) -> &'static str {
        "directory"
    }

    fn requires(&self) -> Vec<String> {
        self.requires.clone()
    }

    fn sudo_requirement(&self) -> SudoRequirement {
        SudoRequirement::Required {
            reason: "manages directories owned by other accounts".to_string(),
        }
    }

    fn current_state(&self) -> Result<ResourceState> {
        let meta = match fs::symlink_metadata(&self.attrs.path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(ResourceState::Absent);
            }
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                return Ok(ResourceState::Unknown);
            }
            Err(e) => return Err(e.into()),
        };
        if !meta.is_dir() {
            return Ok(ResourceState::Modified {
                from: "not a directory".to_string(),
                to: "directory".to_string(),
            });
        }
        if self.ensure == NodeEnsure::Absent {
            return Ok(ResourceState::Present { details: None });
        }
        let drift = self.drift(&meta)?;
        if drift.is_empty() {
            Ok(ResourceState::Present { details: None })
        } else {
            let (from, to): (Vec<_>, Vec<_>) = drift.into_iter().unzip();
            Ok(ResourceState::Modified {
                from: from.join(", "),
                to: to.join(", "),
            })
        }
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
                run_admin(ctx, "rm", &["-rf", "--", &self.attrs.path])?;
                Ok(ApplyResult::Removed)
            }
            (_, ResourceState::Absent) => {
                run_admin(ctx, "mkdir", &["-p", "--", &self.attrs.path])?;
                self.set_attributes(ctx)?;
                Ok(ApplyResult::Created)
            }
            (_, ResourceState::Modified { from, .. }) => {
                if from == "not a directory" {
                    bail!("{} exists and is not a directory", self.attrs.path);
                }
                self.set_attributes(ctx)?;
                Ok(ApplyResult::Modified)
            }
            _ => Ok(ApplyResult::NoChange),
        }
    }
}
