//! File resource - the authorized_keys file
//!
//! Key entries write the file's content; this resource converges its
//! existence, ownership and mode, and removes it when no keys are
//! declared or the account is going away.

use anyhow::Result;
use convergence::{ApplyContext, ApplyResult, Resource, ResourceState, SudoRequirement};
use std::fs;
use std::os::unix::fs::MetadataExt;

use super::{parse_mode, run_admin, sysdb};
use crate::account::node::{FileAttrs, NodeEnsure, ResourceNode};

#[derive(Debug, Clone)]
pub struct FileResource {
    reference: String,
    ensure: NodeEnsure,
    requires: Vec<String>,
    attrs: FileAttrs,
}

impl FileResource {
    pub fn new(node: &ResourceNode, attrs: FileAttrs) -> Self {
        Self {
            reference: node.reference(),
            ensure: node.ensure,
            requires: node.requires.clone(),
            attrs,
        }
    }

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

impl Resource for FileResource {
    fn id(&self) -> String {
        self.reference.clone()
    }

    fn description(&self) -> String {
        match self.ensure {
            NodeEnsure::Absent => format!("Remove file {}", self.attrs.path),
            _ => format!("File {}", self.attrs.path),
        }
    }

    fn resource_type(&self) -> &'static str {
        "file"
    }

    fn requires(&self) -> Vec<String> {
        self.requires.clone()
    }

    fn sudo_requirement(&self) -> SudoRequirement {
        SudoRequirement::Required {
            reason: "manages files owned by other accounts".to_string(),
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
                run_admin(ctx, "rm", &["-f", "--", &self.attrs.path])?;
                Ok(ApplyResult::Removed)
            }
            (_, ResourceState::Absent) => {
                run_admin(ctx, "touch", &["--", &self.attrs.path])?;
                self.set_attributes(ctx)?;
                Ok(ApplyResult::Created)
            }
            (_, ResourceState::Modified { .. }) => {
                self.set_attributes(ctx)?;
                Ok(ApplyResult::Modified)
            }
            _ => Ok(ApplyResult::NoChange),
        }
    }
}
