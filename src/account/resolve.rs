//! Attribute resolution
//!
//! Merges a declared [`AccountSpec`] with defaults into a
//! [`ResolvedAccount`] where every field has a concrete value. All
//! defaulting is total: resolution never fails, so omitted optional
//! fields never surface as errors.

use super::{AccountSpec, Ensure, GroupRef};

/// Default login shell
pub const DEFAULT_SHELL: &str = "/bin/bash";
/// Primary group used when no dedicated group is created and no gid is given
pub const DEFAULT_FALLBACK_GROUP: &str = "users";
/// Default home directory mode
pub const DEFAULT_HOME_PERMS: &str = "750";
/// Mode of the `.ssh` directory, not configurable
pub const SSH_DIR_PERMS: &str = "700";
/// Mode of the authorized_keys file when present, not configurable
pub const AUTHORIZED_KEYS_PERMS: &str = "600";

/// Fully-defaulted account attributes
///
/// Invariants: `group_name` is never empty and `home_path` is always
/// absolute (derived from `/home/<username>` when not declared).
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedAccount {
    pub title: String,
    pub ensure: Ensure,
    pub username: String,
    pub shell: String,
    /// `Some(true)` by default; declaring `manage_home = false` leaves
    /// the flag unset, which downstream primitives treat differently
    /// from `false`.
    pub manage_home: Option<bool>,
    pub create_group: bool,
    /// Primary group name for the user, owner group for directories
    pub group_name: String,
    /// Numeric id assigned to the dedicated group, when one is created
    pub group_gid: Option<u32>,
    pub uid: Option<u32>,
    pub system: bool,
    pub allowdupe: bool,
    pub purge_ssh_keys: bool,
    pub groups: Vec<String>,
    pub home_path: String,
    pub home_dir_perms: String,
    pub ssh_dir_path: String,
    pub authorized_keys_path: String,
    /// Raw declared key lines, parsed later by the planner
    pub ssh_keys: Vec<String>,
}

/// Applies site defaults while resolving account attributes
#[derive(Debug, Clone)]
pub struct Resolver {
    /// Fallback primary group when `create_group = false` and no gid
    pub fallback_group: String,
    /// Default login shell
    pub default_shell: String,
}

impl Default for Resolver {
    fn default() -> Self {
        Self {
            fallback_group: DEFAULT_FALLBACK_GROUP.to_string(),
            default_shell: DEFAULT_SHELL.to_string(),
        }
    }
}

impl Resolver {
    /// Resolve a declared account into fully-defaulted attributes
    pub fn resolve(&self, spec: &AccountSpec) -> ResolvedAccount {
        let username = spec
            .username
            .clone()
            .unwrap_or_else(|| spec.title.clone());

        let group_name = if spec.create_group {
            username.clone()
        } else {
            match &spec.gid {
                Some(gid) => gid.to_string(),
                None => self.fallback_group.clone(),
            }
        };

        // The dedicated group's numeric id: an explicit numeric gid wins,
        // otherwise it mirrors the declared uid.
        let group_gid = match &spec.gid {
            Some(GroupRef::Id(id)) => Some(*id),
            _ => spec.uid,
        };

        let home_path = spec
            .home_dir
            .clone()
            .unwrap_or_else(|| format!("/home/{username}"));
        let ssh_dir_path = format!("{home_path}/.ssh");
        let authorized_keys_path = format!("{ssh_dir_path}/authorized_keys");

        ResolvedAccount {
            title: spec.title.clone(),
            ensure: spec.ensure,
            shell: spec
                .shell
                .clone()
                .unwrap_or_else(|| self.default_shell.clone()),
            // Explicit false leaves the flag unset rather than false
            manage_home: match spec.manage_home {
                Some(false) => None,
                _ => Some(true),
            },
            create_group: spec.create_group,
            group_name,
            group_gid,
            uid: spec.uid,
            system: spec.system,
            allowdupe: spec.allowdupe,
            purge_ssh_keys: spec.purge_ssh_keys,
            groups: spec.groups.clone(),
            home_dir_perms: spec
                .home_dir_perms
                .clone()
                .unwrap_or_else(|| DEFAULT_HOME_PERMS.to_string()),
            home_path,
            ssh_dir_path,
            authorized_keys_path,
            ssh_keys: spec.ssh_keys.clone(),
            username,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(spec: &AccountSpec) -> ResolvedAccount {
        Resolver::default().resolve(spec)
    }

    #[test]
    fn test_defaults() {
        let resolved = resolve(&AccountSpec::new("user"));

        assert_eq!(resolved.username, "user");
        assert_eq!(resolved.shell, "/bin/bash");
        assert_eq!(resolved.manage_home, Some(true));
        assert!(resolved.create_group);
        assert_eq!(resolved.group_name, "user");
        assert_eq!(resolved.group_gid, None);
        assert_eq!(resolved.uid, None);
        assert_eq!(resolved.home_path, "/home/user");
        assert_eq!(resolved.home_dir_perms, "750");
        assert_eq!(resolved.ssh_dir_path, "/home/user/.ssh");
        assert_eq!(resolved.authorized_keys_path, "/home/user/.ssh/authorized_keys");
        assert!(!resolved.system);
        assert!(!resolved.allowdupe);
        assert!(!resolved.purge_ssh_keys);
        assert!(resolved.groups.is_empty());
        assert_eq!(resolved.ensure, Ensure::Present);
    }

    #[test]
    fn test_username_overrides_title() {
        let spec = AccountSpec {
            username: Some("sysadmin".to_string()),
            ..AccountSpec::new("admin")
        };
        let resolved = resolve(&spec);

        assert_eq!(resolved.title, "admin");
        assert_eq!(resolved.username, "sysadmin");
        assert_eq!(resolved.group_name, "sysadmin");
        assert_eq!(resolved.home_path, "/home/sysadmin");
    }

    #[test]
    fn test_explicit_manage_home_false_becomes_unset() {
        let spec = AccountSpec {
            manage_home: Some(false),
            ..AccountSpec::new("user")
        };
        assert_eq!(resolve(&spec).manage_home, None);

        let spec = AccountSpec {
            manage_home: Some(true),
            ..AccountSpec::new("user")
        };
        assert_eq!(resolve(&spec).manage_home, Some(true));
    }

    #[test]
    fn test_no_dedicated_group_falls_back_to_users() {
        let spec = AccountSpec {
            create_group: false,
            ..AccountSpec::new("user")
        };
        let resolved = resolve(&spec);
        assert_eq!(resolved.group_name, "users");
    }

    #[test]
    fn test_no_dedicated_group_honors_gid() {
        let spec = AccountSpec {
            create_group: false,
            gid: Some(GroupRef::Name("staff".to_string())),
            ..AccountSpec::new("user")
        };
        assert_eq!(resolve(&spec).group_name, "staff");
    }

    #[test]
    fn test_fallback_group_is_configurable() {
        let resolver = Resolver {
            fallback_group: "staff".to_string(),
            ..Resolver::default()
        };
        let spec = AccountSpec {
            create_group: false,
            ..AccountSpec::new("user")
        };
        assert_eq!(resolver.resolve(&spec).group_name, "staff");
    }

    #[test]
    fn test_group_gid_mirrors_uid() {
        let spec = AccountSpec {
            uid: Some(777),
            ..AccountSpec::new("admin")
        };
        assert_eq!(resolve(&spec).group_gid, Some(777));

        let spec = AccountSpec {
            uid: Some(777),
            gid: Some(GroupRef::Id(1200)),
            ..AccountSpec::new("admin")
        };
        assert_eq!(resolve(&spec).group_gid, Some(1200));
    }

    #[test]
    fn test_custom_home_and_perms() {
        let spec = AccountSpec {
            home_dir: Some("/opt/admin".to_string()),
            home_dir_perms: Some("0700".to_string()),
            ..AccountSpec::new("admin")
        };
        let resolved = resolve(&spec);
        assert_eq!(resolved.home_path, "/opt/admin");
        assert_eq!(resolved.home_dir_perms, "0700");
        assert_eq!(resolved.ssh_dir_path, "/opt/admin/.ssh");
        assert_eq!(resolved.authorized_keys_path, "/opt/admin/.ssh/authorized_keys");
    }

    #[test]
    fn test_resolution_is_pure() {
        let spec = AccountSpec {
            uid: Some(42),
            groups: vec!["sudo".to_string()],
            ..AccountSpec::new("user")
        };
        assert_eq!(resolve(&spec), resolve(&spec));
    }
}
