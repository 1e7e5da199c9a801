//! Planned resource nodes
//!
//! A [`ResourceNode`] is one atomic declared unit of system state. Nodes
//! are created fresh on every planning pass and never persisted;
//! convergence state lives in the OS. Identifiers follow the stable
//! naming contract consumed by the applier: group/user nodes use the
//! account title, file/directory nodes use `<title>_home`,
//! `<title>_sshdir`, `<title>_sshdir_authorized_keys`, the password hook
//! uses `<title>_set_initial_password`, and key nodes use
//! `<title>_ssh_key_<comment>`.

use serde::Serialize;
use std::collections::BTreeMap;

/// Resource kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Group,
    User,
    Exec,
    Directory,
    File,
    SshKey,
}

impl NodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Group => "group",
            NodeKind::User => "user",
            NodeKind::Exec => "exec",
            NodeKind::Directory => "directory",
            NodeKind::File => "file",
            NodeKind::SshKey => "ssh_key",
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Desired lifecycle state of one node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeEnsure {
    Present,
    Absent,
    /// Present as a directory (directory nodes only)
    Directory,
}

impl std::fmt::Display for NodeEnsure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeEnsure::Present => write!(f, "present"),
            NodeEnsure::Absent => write!(f, "absent"),
            NodeEnsure::Directory => write!(f, "directory"),
        }
    }
}

/// Kind-specific node attributes
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeAttrs {
    Group(GroupAttrs),
    User(UserAttrs),
    Exec(ExecAttrs),
    Directory(FileAttrs),
    File(FileAttrs),
    SshKey(SshKeyAttrs),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupAttrs {
    pub name: String,
    pub system: bool,
    pub gid: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserAttrs {
    pub name: String,
    pub uid: Option<u32>,
    pub shell: String,
    /// Primary group, by name (or numeric string when declared that way)
    pub gid: String,
    pub groups: Vec<String>,
    pub home: String,
    /// Tri-state: `Some(true)` manages the home, `None` omits the flag
    pub manage_home: Option<bool>,
    pub system: bool,
    pub allowdupe: bool,
    /// Pass-through flag for the user primitive; no enumeration here
    pub purge_ssh_keys: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecAttrs {
    /// Account whose password is initialized
    pub user: String,
    pub command: String,
}

/// Attributes shared by directory and plain-file nodes.
/// Absent nodes carry the path only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileAttrs {
    pub path: String,
    pub owner: Option<String>,
    pub group: Option<String>,
    pub mode: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SshKeyAttrs {
    /// Account the key is bound to
    pub user: String,
    /// Key comment, the unique sub-identifier
    pub name: String,
    #[serde(rename = "type")]
    pub key_type: String,
    /// Base64 key material
    pub material: String,
}

/// One planned OS-level resource
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceNode {
    /// Identifier per the stable naming contract, unique per kind
    pub id: String,
    pub ensure: NodeEnsure,
    pub attrs: NodeAttrs,
    /// References of nodes that must converge before this one
    pub requires: Vec<String>,
}

impl ResourceNode {
    pub fn kind(&self) -> NodeKind {
        match &self.attrs {
            NodeAttrs::Group(_) => NodeKind::Group,
            NodeAttrs::User(_) => NodeKind::User,
            NodeAttrs::Exec(_) => NodeKind::Exec,
            NodeAttrs::Directory(_) => NodeKind::Directory,
            NodeAttrs::File(_) => NodeKind::File,
            NodeAttrs::SshKey(_) => NodeKind::SshKey,
        }
    }

    /// Globally unique reference, `kind[id]`
    ///
    /// Group and user nodes share the account title as their id, so
    /// ordering constraints name nodes by kind-qualified reference.
    pub fn reference(&self) -> String {
        node_reference(self.kind(), &self.id)
    }

    /// Flat string view of the attributes, for rendering and snapshots
    ///
    /// Unset optional attributes are omitted; key order is stable.
    pub fn attributes(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        let mut put = |k: &str, v: String| {
            map.insert(k.to_string(), v);
        };
        match &self.attrs {
            NodeAttrs::Group(g) => {
                put("name", g.name.clone());
                put("system", g.system.to_string());
                if let Some(gid) = g.gid {
                    put("gid", gid.to_string());
                }
            }
            NodeAttrs::User(u) => {
                put("name", u.name.clone());
                if let Some(uid) = u.uid {
                    put("uid", uid.to_string());
                }
                put("shell", u.shell.clone());
                put("gid", u.gid.clone());
                put("groups", u.groups.join(","));
                put("home", u.home.clone());
                if let Some(manage) = u.manage_home {
                    put("managehome", manage.to_string());
                }
                put("system", u.system.to_string());
                put("allowdupe", u.allowdupe.to_string());
                put("purge_ssh_keys", u.purge_ssh_keys.to_string());
            }
            NodeAttrs::Exec(e) => {
                put("user", e.user.clone());
                put("command", e.command.clone());
            }
            NodeAttrs::Directory(f) | NodeAttrs::File(f) => {
                put("path", f.path.clone());
                if let Some(owner) = &f.owner {
                    put("owner", owner.clone());
                }
                if let Some(group) = &f.group {
                    put("group", group.clone());
                }
                if let Some(mode) = &f.mode {
                    put("mode", mode.clone());
                }
            }
            NodeAttrs::SshKey(k) => {
                put("user", k.user.clone());
                put("name", k.name.clone());
                put("type", k.key_type.clone());
                put("key", k.material.clone());
            }
        }
        map
    }
}

/// Build a kind-qualified node reference, `kind[id]`
pub fn node_reference(kind: NodeKind, id: &str) -> String {
    format!("{}[{}]", kind.as_str(), id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_is_kind_qualified() {
        let group = ResourceNode {
            id: "user".to_string(),
            ensure: NodeEnsure::Present,
            attrs: NodeAttrs::Group(GroupAttrs {
                name: "user".to_string(),
                system: false,
                gid: None,
            }),
            requires: vec![],
        };
        assert_eq!(group.reference(), "group[user]");
        assert_eq!(group.kind(), NodeKind::Group);
    }

    #[test]
    fn test_attribute_view_omits_unset() {
        let node = ResourceNode {
            id: "user_home".to_string(),
            ensure: NodeEnsure::Absent,
            attrs: NodeAttrs::Directory(FileAttrs {
                path: "/home/user".to_string(),
                owner: None,
                group: None,
                mode: None,
            }),
            requires: vec![],
        };
        let attrs = node.attributes();
        assert_eq!(attrs.get("path").map(String::as_str), Some("/home/user"));
        assert!(!attrs.contains_key("owner"));
        assert!(!attrs.contains_key("mode"));
    }
}
