//! Manifest loading
//!
//! Accounts are declared in a TOML manifest, one table per account
//! keyed by title:
//!
//! ```toml
//! [defaults]
//! fallback_group = "users"
//!
//! [accounts.deploy]
//! uid = 1200
//! groups = ["sudo"]
//! ssh_keys = ["ssh-ed25519 AAAAC3Nz ci@build"]
//! ```

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::account::resolve::{Resolver, DEFAULT_FALLBACK_GROUP, DEFAULT_SHELL};
use crate::account::{AccountSpec, GroupRef};

/// Get the config directory path
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("accountctl"))
}

/// Default manifest location, `~/.config/accountctl/accounts.toml`
pub fn default_manifest_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("accounts.toml"))
}

/// Site-wide defaults applied during attribute resolution
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Defaults {
    #[serde(default = "default_fallback_group")]
    pub fallback_group: String,
    #[serde(default = "default_shell")]
    pub shell: String,
}

fn default_fallback_group() -> String {
    DEFAULT_FALLBACK_GROUP.to_string()
}

fn default_shell() -> String {
    DEFAULT_SHELL.to_string()
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            fallback_group: default_fallback_group(),
            shell: default_shell(),
        }
    }
}

/// The declared account manifest
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub defaults: Defaults,
    /// Keyed by account title; BTreeMap keeps iteration order stable
    #[serde(default)]
    pub accounts: BTreeMap<String, AccountSpec>,
}

impl Manifest {
    /// Load and normalize a manifest file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        let mut manifest: Manifest = toml::from_str(&content)
            .with_context(|| format!("Invalid manifest {}", path.display()))?;

        for (title, spec) in &mut manifest.accounts {
            spec.title = title.clone();
            if let Some(home_dir) = &spec.home_dir {
                spec.home_dir = Some(shellexpand::tilde(home_dir).to_string());
            }
            // A dedicated group gets its numeric id from gid; a group
            // name only selects an existing primary group
            if spec.create_group && matches!(spec.gid, Some(GroupRef::Name(_))) {
                bail!(
                    "Invalid manifest {}: account '{}' needs a numeric gid when create_group is set (a group name only applies with create_group = false)",
                    path.display(),
                    title
                );
            }
        }
        Ok(manifest)
    }

    /// Build the attribute resolver carrying the manifest defaults
    pub fn resolver(&self) -> Resolver {
        Resolver {
            fallback_group: self.defaults.fallback_group.clone(),
            default_shell: self.defaults.shell.clone(),
        }
    }

    /// Find one account by title
    pub fn account(&self, title: &str) -> Option<&AccountSpec> {
        self.accounts.get(title)
    }

    /// Accounts in stable (title) order
    pub fn accounts(&self) -> impl Iterator<Item = &AccountSpec> {
        self.accounts.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::Ensure;
    use std::io::Write;

    fn load_str(content: &str) -> Result<Manifest> {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        Manifest::load(file.path())
    }

    #[test]
    fn test_load_assigns_titles() {
        let manifest = load_str(
            r#"
            [accounts.deploy]
            uid = 1200

            [accounts.legacy]
            ensure = "absent"
            "#,
        )
        .unwrap();

        let deploy = manifest.account("deploy").unwrap();
        assert_eq!(deploy.title, "deploy");
        assert_eq!(deploy.uid, Some(1200));
        assert_eq!(deploy.ensure, Ensure::Present);

        let legacy = manifest.account("legacy").unwrap();
        assert_eq!(legacy.ensure, Ensure::Absent);
    }

    #[test]
    fn test_defaults_section() {
        let manifest = load_str(
            r#"
            [defaults]
            fallback_group = "staff"
            "#,
        )
        .unwrap();
        assert_eq!(manifest.defaults.fallback_group, "staff");
        assert_eq!(manifest.defaults.shell, "/bin/bash");
        assert_eq!(manifest.resolver().fallback_group, "staff");
    }

    #[test]
    fn test_empty_manifest() {
        let manifest = load_str("").unwrap();
        assert_eq!(manifest.accounts.len(), 0);
        assert_eq!(manifest.defaults.fallback_group, "users");
    }

    #[test]
    fn test_gid_accepts_name_or_number() {
        let manifest = load_str(
            r#"
            [accounts.a]
            create_group = false
            gid = "staff"

            [accounts.b]
            gid = 1300
            "#,
        )
        .unwrap();
        assert_eq!(
            manifest.account("a").unwrap().gid,
            Some(GroupRef::Name("staff".to_string()))
        );
        assert_eq!(manifest.account("b").unwrap().gid, Some(GroupRef::Id(1300)));
    }

    #[test]
    fn test_named_gid_rejected_with_dedicated_group() {
        let err = load_str(
            r#"
            [accounts.deploy]
            gid = "staff"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("numeric gid"));
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let err = load_str(
            r#"
            [accounts.deploy]
            shelll = "/bin/zsh"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("Invalid manifest"));
    }

    #[test]
    fn test_home_dir_tilde_expansion() {
        let manifest = load_str(
            r#"
            [accounts.deploy]
            home_dir = "/srv/deploy"
            "#,
        )
        .unwrap();
        assert_eq!(
            manifest.account("deploy").unwrap().home_dir.as_deref(),
            Some("/srv/deploy")
        );
    }

    #[test]
    fn test_missing_file_has_context() {
        let err = Manifest::load(Path::new("/nonexistent/accounts.toml")).unwrap_err();
        assert!(err.to_string().contains("Could not read"));
    }
}
