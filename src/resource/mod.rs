//! OS-level resource implementations
//!
//! One [`convergence::Resource`] per planned node kind. These are the
//! applier side of the account core: they translate a [`ResourceNode`]
//! into calls to the usual account-management commands and filesystem
//! operations, with state detection against `/etc/passwd`, `/etc/group`
//! and the filesystem. Planning never touches this module.

use crate::account::node::{NodeAttrs, ResourceNode};
use anyhow::Result;
use convergence::{ApplyContext, BoxedResource, CommandOutput};

pub mod directory;
pub mod exec;
pub mod file;
pub mod group;
pub mod ssh_key;
pub mod sysdb;
pub mod user;

pub use directory::DirectoryResource;
pub use exec::InitialPasswordExec;
pub use file::FileResource;
pub use group::GroupResource;
pub use ssh_key::SshKeyResource;
pub use user::UserResource;

/// Build the concrete resource for a planned node
pub fn from_node(node: &ResourceNode) -> BoxedResource {
    match &node.attrs {
        NodeAttrs::Group(attrs) => Box::new(GroupResource::new(node, attrs.clone())),
        NodeAttrs::User(attrs) => Box::new(UserResource::new(node, attrs.clone())),
        NodeAttrs::Exec(attrs) => Box::new(InitialPasswordExec::new(node, attrs.clone())),
        NodeAttrs::Directory(attrs) => Box::new(DirectoryResource::new(node, attrs.clone())),
        NodeAttrs::File(attrs) => Box::new(FileResource::new(node, attrs.clone())),
        NodeAttrs::SshKey(attrs) => Box::new(SshKeyResource::new(node, attrs.clone())),
    }
}

/// Run a privileged command through the context's sudo provider
///
/// All account resources declare a sudo requirement, so the executor
/// provides the sudo handle whenever a plan contains them.
pub(crate) fn run_admin(ctx: &ApplyContext, cmd: &str, args: &[&str]) -> Result<CommandOutput> {
    let output = ctx.require_sudo()?.run(cmd, args)?;
    if !output.success {
        anyhow::bail!("{} failed: {}", cmd, output.stderr_str().trim());
    }
    Ok(output)
}

/// Quote a string for embedding in `sh -c`
pub(crate) fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

/// Parse an octal mode string like "750" or "0700"
pub(crate) fn parse_mode(mode: &str) -> Option<u32> {
    u32::from_str_radix(mode, 8).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::node::{FileAttrs, NodeEnsure};
    use convergence::Resource;

    #[test]
    fn test_shell_quote_escapes_single_quotes() {
        assert_eq!(shell_quote("abc"), "'abc'");
        assert_eq!(shell_quote("a'b"), "'a'\\''b'");
    }

    #[test]
    fn test_parse_mode() {
        assert_eq!(parse_mode("750"), Some(0o750));
        assert_eq!(parse_mode("0700"), Some(0o700));
        assert_eq!(parse_mode("rwx"), None);
    }

    #[test]
    fn test_from_node_keeps_reference_and_requires() {
        let node = ResourceNode {
            id: "user_home".to_string(),
            ensure: NodeEnsure::Directory,
            attrs: NodeAttrs::Directory(FileAttrs {
                path: "/home/user".to_string(),
                owner: Some("user".to_string()),
                group: Some("user".to_string()),
                mode: Some("750".to_string()),
            }),
            requires: vec!["user[user]".to_string()],
        };
        let resource = from_node(&node);
        assert_eq!(resource.id(), "directory[user_home]");
        assert_eq!(resource.resource_type(), "directory");
        assert_eq!(resource.requires(), vec!["user[user]"]);
    }
}
