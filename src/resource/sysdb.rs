//! Read-only access to the local account databases
//!
//! State detection parses `/etc/passwd` and `/etc/group` directly; all
//! mutation goes through the usual management commands in the resource
//! apply paths.

use anyhow::{Context, Result};
use std::fs;

const PASSWD_PATH: &str = "/etc/passwd";
const GROUP_PATH: &str = "/etc/group";

/// One `/etc/passwd` record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswdEntry {
    pub name: String,
    pub uid: u32,
    pub gid: u32,
    pub home: String,
    pub shell: String,
}

/// One `/etc/group` record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupEntry {
    pub name: String,
    pub gid: u32,
    pub members: Vec<String>,
}

/// Look up a user by login name
pub fn lookup_user(name: &str) -> Result<Option<PasswdEntry>> {
    let content = fs::read_to_string(PASSWD_PATH)
        .with_context(|| format!("Could not read {PASSWD_PATH}"))?;
    Ok(parse_passwd(&content).into_iter().find(|e| e.name == name))
}

/// Look up a group by name
pub fn lookup_group(name: &str) -> Result<Option<GroupEntry>> {
    let content =
        fs::read_to_string(GROUP_PATH).with_context(|| format!("Could not read {GROUP_PATH}"))?;
    Ok(parse_group(&content).into_iter().find(|e| e.name == name))
}

/// Look up a group by numeric id
pub fn lookup_gid(gid: u32) -> Result<Option<GroupEntry>> {
    let content =
        fs::read_to_string(GROUP_PATH).with_context(|| format!("Could not read {GROUP_PATH}"))?;
    Ok(parse_group(&content).into_iter().find(|e| e.gid == gid))
}

/// Names of the groups listing a user as a supplementary member
pub fn member_of(user: &str) -> Result<Vec<String>> {
    let content =
        fs::read_to_string(GROUP_PATH).with_context(|| format!("Could not read {GROUP_PATH}"))?;
    Ok(parse_group(&content)
        .into_iter()
        .filter(|g| g.members.iter().any(|m| m == user))
        .map(|g| g.name)
        .collect())
}

/// Look up a user by numeric id
pub fn lookup_uid(uid: u32) -> Result<Option<PasswdEntry>> {
    let content = fs::read_to_string(PASSWD_PATH)
        .with_context(|| format!("Could not read {PASSWD_PATH}"))?;
    Ok(parse_passwd(&content).into_iter().find(|e| e.uid == uid))
}

fn parse_passwd(content: &str) -> Vec<PasswdEntry> {
    content
        .lines()
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .filter_map(|line| {
            let fields: Vec<&str> = line.split(':').collect();
            if fields.len() < 7 {
                return None;
            }
            Some(PasswdEntry {
                name: fields[0].to_string(),
                uid: fields[2].parse().ok()?,
                gid: fields[3].parse().ok()?,
                home: fields[5].to_string(),
                shell: fields[6].to_string(),
            })
        })
        .collect()
}

fn parse_group(content: &str) -> Vec<GroupEntry> {
    content
        .lines()
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .filter_map(|line| {
            let fields: Vec<&str> = line.split(':').collect();
            if fields.len() < 4 {
                return None;
            }
            Some(GroupEntry {
                name: fields[0].to_string(),
                gid: fields[2].parse().ok()?,
                members: fields[3]
                    .split(',')
                    .filter(|m| !m.is_empty())
                    .map(str::to_string)
                    .collect(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_passwd() {
        let entries = parse_passwd(
            "root:x:0:0:root:/root:/bin/bash\n\
             deploy:x:1001:1001::/home/deploy:/bin/zsh\n\
             broken:line\n",
        );
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].name, "deploy");
        assert_eq!(entries[1].uid, 1001);
        assert_eq!(entries[1].home, "/home/deploy");
        assert_eq!(entries[1].shell, "/bin/zsh");
    }

    #[test]
    fn test_parse_group() {
        let entries = parse_group(
            "root:x:0:\n\
             sudo:x:27:deploy,admin\n",
        );
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].members, Vec::<String>::new());
        assert_eq!(entries[1].name, "sudo");
        assert_eq!(entries[1].gid, 27);
        assert_eq!(entries[1].members, vec!["deploy", "admin"]);
    }
}
