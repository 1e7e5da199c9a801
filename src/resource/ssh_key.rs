//! SSH authorized-key resource
//!
//! Manages one `type material comment` line in the bound user's
//! authorized_keys file, keyed by the comment. The file path is derived
//! from the live passwd record at apply time; the plan guarantees the
//! user node converged first.

use anyhow::{Context, Result};
use convergence::{ApplyContext, ApplyResult, Resource, ResourceState, SudoRequirement};
use std::fs;

use super::{run_admin, shell_quote, sysdb};
use crate::account::node::{NodeEnsure, ResourceNode, SshKeyAttrs};

#[derive(Debug, Clone)]
pub struct SshKeyResource {
    reference: String,
    ensure: NodeEnsure,
    requires: Vec<String>,
    attrs: SshKeyAttrs,
}

impl SshKeyResource {
    pub fn new(node: &ResourceNode, attrs: SshKeyAttrs) -> Self {
        Self {
            reference: node.reference(),
            ensure: node.ensure,
            requires: node.requires.clone(),
            attrs,
        }
    }

    /// The declared key line
    fn line(&self) -> String {
        format!(
            "{} {} {}",
            self.attrs.key_type, self.attrs.material, self.attrs.name
        )
    }

    fn keys_path(&self) -> Result<Option<String>> {
        Ok(sysdb::lookup_user(&self.attrs.user)?
            .map(|entry| format!("{}/.ssh/authorized_keys", entry.home)))
    }

    fn read_keys(&self, ctx: Option<&ApplyContext>) -> Result<Option<String>> {
        let Some(path) = self.keys_path()? else {
            return Ok(None);
        };
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Some(String::new())),
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => match ctx {
                // Unreadable without privileges; retry through sudo
                Some(ctx) => {
                    let output = ctx.require_sudo()?.run("cat", &["--", &path])?;
                    if output.success {
                        Ok(Some(output.stdout_str()))
                    } else {
                        Ok(Some(String::new()))
                    }
                }
                None => Err(e).with_context(|| format!("Could not read {path}")),
            },
            Err(e) => Err(e).with_context(|| format!("Could not read {path}")),
        }
    }
}

/// Find the entry with the given comment
fn find_entry<'a>(content: &'a str, name: &str) -> Option<(&'a str, &'a str)> {
    content.lines().find_map(|line| {
        let mut tokens = line.split_whitespace();
        match (tokens.next(), tokens.next(), tokens.next(), tokens.next()) {
            (Some(t), Some(m), Some(n), None) if n == name => Some((t, m)),
            _ => None,
        }
    })
}

/// Replace or append the entry with the given comment
fn upsert_entry(content: &str, name: &str, line: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut replaced = false;
    for existing in content.lines() {
        let is_ours = existing.split_whitespace().nth(2) == Some(name);
        if is_ours && !replaced {
            lines.push(line.to_string());
            replaced = true;
        } else if !is_ours {
            lines.push(existing.to_string());
        }
    }
    if !replaced {
        lines.push(line.to_string());
    }
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

impl Resource for SshKeyResource {
    fn id(&self) -> String {
        self.reference.clone()
    }

    fn description(&self) -> String {
        format!(
            "Authorized key {} for {}",
            self.attrs.name, self.attrs.user
        )
    }

    fn resource_type(&self) -> &'static str {
        "ssh_key"
    }

    fn requires(&self) -> Vec<String> {
        self.requires.clone()
    }

    fn sudo_requirement(&self) -> SudoRequirement {
        SudoRequirement::Required {
            reason: "writes another account's authorized_keys".to_string(),
        }
    }

    fn current_state(&self) -> Result<ResourceState> {
        let content = match self.read_keys(None) {
            Ok(Some(content)) => content,
            Ok(None) => return Ok(ResourceState::Absent),
            Err(_) => return Ok(ResourceState::Unknown),
        };
        match find_entry(&content, &self.attrs.name) {
            Some((key_type, material))
                if key_type == self.attrs.key_type && material == self.attrs.material =>
            {
                Ok(ResourceState::Present { details: None })
            }
            Some((key_type, _)) => Ok(ResourceState::Modified {
                from: key_type.to_string(),
                to: self.attrs.key_type.clone(),
            }),
            None => Ok(ResourceState::Absent),
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

        let Some(path) = self.keys_path()? else {
            anyhow::bail!("user {} does not exist", self.attrs.user);
        };
        let content = self
            .read_keys(Some(ctx))?
            .unwrap_or_default();

        let existing = find_entry(&content, &self.attrs.name);
        let result = match existing {
            Some((t, m)) if t == self.attrs.key_type && m == self.attrs.material => {
                return Ok(ApplyResult::NoChange);
            }
            Some(_) => ApplyResult::Modified,
            None => ApplyResult::Created,
        };

        let updated = upsert_entry(&content, &self.attrs.name, &self.line());
        let script = format!(
            "printf '%s' {} > {}",
            shell_quote(&updated),
            shell_quote(&path)
        );
        run_admin(ctx, "sh", &["-c", &script])?;
        Ok(result)
    }
}
