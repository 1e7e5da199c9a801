//! User resource - the account record itself
//!
//! Converges one `/etc/passwd` record through useradd/usermod/userdel.
//! `purge_ssh_keys` is carried as a pass-through flag; this resource
//! never enumerates or removes keys itself.

use anyhow::Result;
use convergence::{ApplyContext, ApplyResult, Resource, ResourceState, SudoRequirement};

use super::{run_admin, sysdb};
use crate::account::node::{NodeEnsure, ResourceNode, UserAttrs};

/// An OS user account
#[derive(Debug, Clone)]
pub struct UserResource {
    reference: String,
    ensure: NodeEnsure,
    requires: Vec<String>,
    attrs: UserAttrs,
}

impl UserResource {
    pub fn new(node: &ResourceNode, attrs: UserAttrs) -> Self {
        Self {
            reference: node.reference(),
            ensure: node.ensure,
            requires: node.requires.clone(),
            attrs,
        }
    }

    /// Differences between the live record and the declared attributes
    ///
    /// `member_of` is the user's live supplementary membership from the
    /// group database.
    fn drift(
        &self,
        entry: &sysdb::PasswdEntry,
        member_of: &[String],
    ) -> Result<Vec<(String, String)>> {
        let mut drift = Vec::new();
        if entry.shell != self.attrs.shell {
            drift.push((entry.shell.clone(), self.attrs.shell.clone()));
        }
        if entry.home != self.attrs.home {
            drift.push((entry.home.clone(), self.attrs.home.clone()));
        }
        if let Some(uid) = self.attrs.uid
            && entry.uid != uid
        {
            drift.push((format!("uid {}", entry.uid), format!("uid {uid}")));
        }
        // Primary group: the declared value is a name or a numeric string
        let declared_gid = match self.attrs.gid.parse::<u32>() {
            Ok(gid) => Some(gid),
            Err(_) => sysdb::lookup_group(&self.attrs.gid)?.map(|g| g.gid),
        };
        if let Some(gid) = declared_gid
            && entry.gid != gid
        {
            drift.push((format!("gid {}", entry.gid), format!("gid {gid}")));
        }
        // Supplementary membership: `-G` replaces the whole set, so any
        // set difference is drift. Nothing declared means nothing managed.
        if !self.attrs.groups.is_empty() {
            let mut declared: Vec<&str> = self.attrs.groups.iter().map(String::as_str).collect();
            declared.sort_unstable();
            let mut live: Vec<&str> = member_of.iter().map(String::as_str).collect();
            live.sort_unstable();
            if declared != live {
                drift.push((
                    format!("groups {}", live.join(",")),
                    format!("groups {}", declared.join(",")),
                ));
            }
        }
        Ok(drift)
    }

    fn common_args(&self, uid_str: &mut String) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(uid) = self.attrs.uid {
            *uid_str = uid.to_string();
            args.push("-u".to_string());
            args.push(uid_str.clone());
            if self.attrs.allowdupe {
                args.push("-o".to_string());
            }
        }
        args.push("-g".to_string());
        args.push(self.attrs.gid.clone());
        if !self.attrs.groups.is_empty() {
            args.push("-G".to_string());
            args.push(self.attrs.groups.join(","));
        }
        args.push("-d".to_string());
        args.push(self.attrs.home.clone());
        args.push("-s".to_string());
        args.push(self.attrs.shell.clone());
        args
    }

    fn create(&self, ctx: &ApplyContext) -> Result<()> {
        let mut uid_str = String::new();
        let mut args = self.common_args(&mut uid_str);
        // The tri-state flag: Some(true) manages the home, None omits
        // the flag entirely and leaves the decision to the OS defaults
        if self.attrs.manage_home == Some(true) {
            args.push("-m".to_string());
        }
        if self.attrs.system {
            args.push("-r".to_string());
        }
        args.push(self.attrs.name.clone());
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        run_admin(ctx, "useradd", &arg_refs)?;
        Ok(())
    }

    fn modify(&self, ctx: &ApplyContext) -> Result<()> {
        let mut uid_str = String::new();
        let mut args = self.common_args(&mut uid_str);
        args.push(self.attrs.name.clone());
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        run_admin(ctx, "usermod", &arg_refs)?;
        Ok(())
    }
}

impl Resource for UserResource {
    fn id(&self) -> String {
        self.reference.clone()
    }

    fn description(&self) -> String {
        match self.ensure {
            NodeEnsure::Absent => format!("Remove user {}", self.attrs.name),
            _ => format!("User {} ({})", self.attrs.name, self.attrs.shell),
        }
    }

    fn resource_type(&self) -> &'static str {
        "user"
    }

    fn requires(&self) -> Vec<String> {
        self.requires.clone()
    }

    fn sudo_requirement(&self) -> SudoRequirement {
        SudoRequirement::Required {
            reason: "modifies the account database".to_string(),
        }
    }

    fn current_state(&self) -> Result<ResourceState> {
        let Some(entry) = sysdb::lookup_user(&self.attrs.name)? else {
            return Ok(ResourceState::Absent);
        };
        if self.ensure == NodeEnsure::Absent {
            return Ok(ResourceState::Present { details: None });
        }
        let drift = self.drift(&entry, &sysdb::member_of(&self.attrs.name)?)?;
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
                // Home removal belongs to the directory node, so no -r
                run_admin(ctx, "userdel", &[&self.attrs.name])?;
                Ok(ApplyResult::Removed)
            }
            (_, ResourceState::Absent) => {
                self.create(ctx)?;
                Ok(ApplyResult::Created)
            }
            (_, ResourceState::Modified { .. }) => {
                self.modify(ctx)?;
                Ok(ApplyResult::Modified)
            }
            _ => Ok(ApplyResult::NoChange),
        }
    }
}
