//! Initial-password hook
//!
//! A one-shot exec planned for every account. It expires the fresh
//! account's empty password so the user must pick one at first login,
//! and guards against re-running: once the shadow record carries a
//! password the hook is converged. For absent accounts it is a no-op;
//! removal is handled by the user node.

use anyhow::Result;
use convergence::{ApplyContext, ApplyResult, Resource, ResourceState, SudoRequirement};

use super::run_admin;
use crate::account::node::{ExecAttrs, NodeEnsure, ResourceNode};

#[derive(Debug, Clone)]
pub struct InitialPasswordExec {
    reference: String,
    ensure: NodeEnsure,
    requires: Vec<String>,
    attrs: ExecAttrs,
}

impl InitialPasswordExec {
    pub fn new(node: &ResourceNode, attrs: ExecAttrs) -> Self {
        Self {
            reference: node.reference(),
            ensure: node.ensure,
            requires: node.requires.clone(),
            attrs,
        }
    }

    /// Whether the account already has a password set
    ///
    /// Reads /etc/shadow, which needs root; `None` means we could not
    /// tell without privileges and the decision moves to apply time.
    fn password_initialized(&self) -> Option<bool> {
        let content = std::fs::read_to_string("/etc/shadow").ok()?;
        shadow_password_set(&content, &self.attrs.user)
    }
}

/// Inspect the password field of one shadow record
///
/// `None` when the user has no record; `Some(false)` covers the empty
/// and locked-uninitialized (`!`, `!!`, `*`) markers left by useradd.
fn shadow_password_set(shadow: &str, user: &str) -> Option<bool> {
    let line = shadow
        .lines()
        .find(|l| l.split(':').next() == Some(user))?;
    let field = line.split(':').nth(1).unwrap_or("");
    Some(!matches!(field, "" | "!" | "!!" | "*"))
}

impl Resource for InitialPasswordExec {
    fn id(&self) -> String {
        self.reference.clone()
    }

    fn description(&self) -> String {
        format!("Initialize password for {}", self.attrs.user)
    }

    fn resource_type(&self) -> &'static str {
        "exec"
    }

    fn requires(&self) -> Vec<String> {
        self.requires.clone()
    }

    fn sudo_requirement(&self) -> SudoRequirement {
        SudoRequirement::Required {
            reason: "reads and updates password aging data".to_string(),
        }
    }

    fn current_state(&self) -> Result<ResourceState> {
        if self.ensure == NodeEnsure::Absent {
            return Ok(ResourceState::Absent);
        }
        Ok(match self.password_initialized() {
            Some(true) => ResourceState::Present { details: None },
            Some(false) => ResourceState::Absent,
            None => ResourceState::Unknown,
        })
    }

    fn desired_state(&self) -> ResourceState {
        match self.ensure {
            NodeEnsure::Absent => ResourceState::Absent,
            _ => ResourceState::Present { details: None },
        }
    }

    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        if self.ensure == NodeEnsure::Absent {
            return Ok(ApplyResult::NoChange);
        }
        if ctx.dry_run {
            return Ok(ApplyResult::Skipped {
                reason: "Dry run".to_string(),
            });
        }

        // Re-check under privileges; the unprivileged probe may have
        // been unable to read the shadow database.
        let shadow = ctx
            .require_sudo()?
            .run_capture("getent", &["shadow", &self.attrs.user])?;
        if shadow_password_set(&shadow, &self.attrs.user) == Some(true) {
            return Ok(ApplyResult::NoChange);
        }

        let parts: Vec<&str> = self.attrs.command.split_whitespace().collect();
        let (cmd, args) = parts
            .split_first()
            .ok_or_else(|| anyhow::anyhow!("empty exec command"))?;
        run_admin(ctx, cmd, args)?;
        Ok(ApplyResult::Modified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shadow_password_set() {
        let shadow = "root:$6$abc$def:19000:0:99999:7:::\n\
                      fresh:!:19000:0:99999:7:::\n\
                      locked:!!:19000::::::\n\
                      nopw::19000::::::\n";
        assert_eq!(shadow_password_set(shadow, "root"), Some(true));
        assert_eq!(shadow_password_set(shadow, "fresh"), Some(false));
        assert_eq!(shadow_password_set(shadow, "locked"), Some(false));
        assert_eq!(shadow_password_set(shadow, "nopw"), Some(false));
        assert_eq!(shadow_password_set(shadow, "ghost"), None);
    }
}
