//! Account convergence core
//!
//! One declared account converges a group, a user record, a home
//! directory, an `.ssh` directory, and an authorized_keys file against
//! live system state. The pipeline is pure: an [`AccountSpec`] is
//! resolved to fully-defaulted attributes, then planned into an ordered
//! sequence of resource nodes consumed by the applier.

pub mod node;
pub mod plan;
pub mod resolve;
pub mod sshkey;

use serde::{Deserialize, Serialize};

/// Desired lifecycle state of an account
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ensure {
    #[default]
    Present,
    Absent,
}

impl std::fmt::Display for Ensure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Ensure::Present => write!(f, "present"),
            Ensure::Absent => write!(f, "absent"),
        }
    }
}

/// A group referenced by numeric id or by name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GroupRef {
    Id(u32),
    Name(String),
}

impl std::fmt::Display for GroupRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GroupRef::Id(id) => write!(f, "{id}"),
            GroupRef::Name(name) => write!(f, "{name}"),
        }
    }
}

/// Declared intent for one OS user account
///
/// A typed parameter bag; every optional field has a total default
/// applied by [`resolve`](resolve::Resolver::resolve). `title` is the
/// account's unique key (the manifest table key) and doubles as the
/// default username.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccountSpec {
    /// Unique key for this account; set from the manifest table key
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,

    /// Desired lifecycle state, defaults to present
    #[serde(default)]
    pub ensure: Ensure,

    /// Login name, defaults to `title`
    #[serde(default)]
    pub username: Option<String>,

    /// Login shell, defaults to /bin/bash
    #[serde(default)]
    pub shell: Option<String>,

    /// Whether the user primitive manages the home directory.
    /// Explicit `false` means the flag is omitted entirely downstream
    /// (the primitive distinguishes unset from false).
    #[serde(default)]
    pub manage_home: Option<bool>,

    /// Home directory path, defaults to /home/<username>
    #[serde(default)]
    pub home_dir: Option<String>,

    /// Home directory mode, defaults to 750
    #[serde(default)]
    pub home_dir_perms: Option<String>,

    /// Create a dedicated primary group named after the user
    #[serde(default = "default_true")]
    pub create_group: bool,

    /// With `create_group`: numeric id for the new group.
    /// Without: the existing primary group (name or id) for the user.
    #[serde(default)]
    pub gid: Option<GroupRef>,

    /// Numeric user id, defaults unset
    #[serde(default)]
    pub uid: Option<u32>,

    /// Create as a system account
    #[serde(default)]
    pub system: bool,

    /// Allow a duplicate (non-unique) uid
    #[serde(default)]
    pub allowdupe: bool,

    /// Passed through to the user primitive; no key enumeration here
    #[serde(default)]
    pub purge_ssh_keys: bool,

    /// Supplementary group names, in declaration order
    #[serde(default)]
    pub groups: Vec<String>,

    /// Raw SSH public key lines, in declaration order
    #[serde(default)]
    pub ssh_keys: Vec<String>,
}

fn default_true() -> bool {
    true
}

impl Default for AccountSpec {
    fn default() -> Self {
        Self {
            title: String::new(),
            ensure: Ensure::Present,
            username: None,
            shell: None,
            manage_home: None,
            home_dir: None,
            home_dir_perms: None,
            create_group: true,
            gid: None,
            uid: None,
            system: false,
            allowdupe: false,
            purge_ssh_keys: false,
            groups: Vec::new(),
            ssh_keys: Vec::new(),
        }
    }
}

impl AccountSpec {
    /// A spec with only a title, everything else defaulted
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}
