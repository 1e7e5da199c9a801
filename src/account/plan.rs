//! Resource planning
//!
//! Turns a [`ResolvedAccount`] into the ordered sequence of resource
//! nodes that converges it: group, user, initial-password hook, home
//! directory, `.ssh` directory, per-key entries, and the
//! authorized_keys file. Planning is pure and deterministic; identical
//! input always yields an identical node sequence. The constraint graph
//! is validated (unknown references, duplicates, cycles) before the
//! plan is returned.

use super::node::{
    node_reference, ExecAttrs, FileAttrs, GroupAttrs, NodeAttrs, NodeEnsure, NodeKind,
    ResourceNode, SshKeyAttrs, UserAttrs,
};
use super::resolve::{ResolvedAccount, AUTHORIZED_KEYS_PERMS, SSH_DIR_PERMS};
use super::sshkey::{self, MalformedKeyError, SshKeyEntry};
use super::Ensure;
use std::collections::HashMap;
use thiserror::Error;

/// Planning failures
///
/// All of these abort the whole account's plan; partial plans are never
/// produced.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error(transparent)]
    MalformedKey(#[from] MalformedKeyError),

    #[error("duplicate resource {0}")]
    DuplicateNode(String),

    #[error("resource {resource} requires unknown resource {prerequisite}")]
    UnknownPrerequisite {
        resource: String,
        prerequisite: String,
    },

    #[error("dependency cycle involving resource {0}")]
    Cycle(String),
}

/// Plan the ordered resource sequence for one resolved account
pub fn plan(resolved: &ResolvedAccount) -> Result<Vec<ResourceNode>, PlanError> {
    // Parse every declared key up front; one malformed line aborts the
    // whole account so partial key lists are never planned.
    let keys: Vec<SshKeyEntry> = resolved
        .ssh_keys
        .iter()
        .map(|line| sshkey::parse(line))
        .collect::<Result<_, _>>()?;

    let nodes = match resolved.ensure {
        Ensure::Present => plan_present(resolved, &keys),
        Ensure::Absent => plan_absent(resolved),
    };

    check_graph(&nodes)?;
    Ok(nodes)
}

fn plan_present(resolved: &ResolvedAccount, keys: &[SshKeyEntry]) -> Vec<ResourceNode> {
    let title = &resolved.title;
    let mut nodes = Vec::new();

    if resolved.create_group {
        nodes.push(ResourceNode {
            id: title.clone(),
            ensure: NodeEnsure::Present,
            attrs: NodeAttrs::Group(GroupAttrs {
                name: resolved.group_name.clone(),
                system: resolved.system,
                gid: resolved.group_gid,
            }),
            requires: vec![],
        });
    }

    nodes.push(ResourceNode {
        id: title.clone(),
        ensure: NodeEnsure::Present,
        attrs: NodeAttrs::User(user_attrs(resolved)),
        requires: if resolved.create_group {
            vec![node_reference(NodeKind::Group, title)]
        } else {
            vec![]
        },
    });

    nodes.push(exec_node(resolved, NodeEnsure::Present));

    nodes.push(ResourceNode {
        id: format!("{title}_home"),
        ensure: NodeEnsure::Directory,
        attrs: NodeAttrs::Directory(FileAttrs {
            path: resolved.home_path.clone(),
            owner: Some(resolved.username.clone()),
            group: Some(resolved.group_name.clone()),
            mode: Some(resolved.home_dir_perms.clone()),
        }),
        requires: vec![node_reference(NodeKind::User, title)],
    });

    nodes.push(ResourceNode {
        id: format!("{title}_sshdir"),
        ensure: NodeEnsure::Directory,
        attrs: NodeAttrs::Directory(FileAttrs {
            path: resolved.ssh_dir_path.clone(),
            owner: Some(resolved.username.clone()),
            group: Some(resolved.group_name.clone()),
            mode: Some(SSH_DIR_PERMS.to_string()),
        }),
        requires: vec![node_reference(NodeKind::Directory, &format!("{title}_home"))],
    });

    // Key entries rewrite the same authorized_keys file, so they are
    // chained in declaration order rather than left free to run in
    // parallel within one wave.
    let sshdir_ref = node_reference(NodeKind::Directory, &format!("{title}_sshdir"));
    let mut prev_key_ref: Option<String> = None;
    for key in keys {
        let id = format!("{title}_ssh_key_{}", key.name);
        let mut requires = vec![sshdir_ref.clone()];
        if let Some(prev) = prev_key_ref.take() {
            requires.push(prev);
        }
        prev_key_ref = Some(node_reference(NodeKind::SshKey, &id));
        nodes.push(ResourceNode {
            id,
            ensure: NodeEnsure::Present,
            attrs: NodeAttrs::SshKey(SshKeyAttrs {
                user: resolved.username.clone(),
                name: key.name.clone(),
                key_type: key.key_type.clone(),
                material: key.material.clone(),
            }),
            requires,
        });
    }

    // The file exists only when at least one key is declared
    nodes.push(if keys.is_empty() {
        ResourceNode {
            id: format!("{title}_sshdir_authorized_keys"),
            ensure: NodeEnsure::Absent,
            attrs: NodeAttrs::File(FileAttrs {
                path: resolved.authorized_keys_path.clone(),
                owner: None,
                group: None,
                mode: None,
            }),
            requires: vec![],
        }
    } else {
        let mut requires = vec![sshdir_ref];
        // Ownership and mode are fixed only after the last key wrote
        requires.extend(prev_key_ref);
        ResourceNode {
            id: format!("{title}_sshdir_authorized_keys"),
            ensure: NodeEnsure::Present,
            attrs: NodeAttrs::File(FileAttrs {
                path: resolved.authorized_keys_path.clone(),
                owner: Some(resolved.username.clone()),
                group: Some(resolved.group_name.clone()),
                mode: Some(AUTHORIZED_KEYS_PERMS.to_string()),
            }),
            requires,
        }
    });

    nodes
}

/// Teardown plan: same node sequence minus key entries, constraints
/// reversed so removal runs inner-out (authorized_keys, ssh dir, home)
/// and the dedicated group goes only after the user
fn plan_absent(resolved: &ResolvedAccount) -> Vec<ResourceNode> {
    let title = &resolved.title;
    let mut nodes = Vec::new();

    if resolved.create_group {
        nodes.push(ResourceNode {
            id: title.clone(),
            ensure: NodeEnsure::Absent,
            attrs: NodeAttrs::Group(GroupAttrs {
                name: resolved.group_name.clone(),
                system: resolved.system,
                gid: None,
            }),
            requires: vec![node_reference(NodeKind::User, title)],
        });
    }

    // Identity fields are preserved for auditing even on removal
    nodes.push(ResourceNode {
        id: title.clone(),
        ensure: NodeEnsure::Absent,
        attrs: NodeAttrs::User(user_attrs(resolved)),
        requires: vec![],
    });

    nodes.push(exec_node(resolved, NodeEnsure::Absent));

    nodes.push(ResourceNode {
        id: format!("{title}_home"),
        ensure: NodeEnsure::Absent,
        attrs: NodeAttrs::Directory(FileAttrs {
            path: resolved.home_path.clone(),
            owner: None,
            group: None,
            mode: None,
        }),
        requires: vec![node_reference(NodeKind::Directory, &format!("{title}_sshdir"))],
    });

    nodes.push(ResourceNode {
        id: format!("{title}_sshdir"),
        ensure: NodeEnsure::Absent,
        attrs: NodeAttrs::Directory(FileAttrs {
            path: resolved.ssh_dir_path.clone(),
            owner: None,
            group: None,
            mode: None,
        }),
        requires: vec![node_reference(
            NodeKind::File,
            &format!("{title}_sshdir_authorized_keys"),
        )],
    });

    // Key removal is implied by file/directory removal, never itemized
    nodes.push(ResourceNode {
        id: format!("{title}_sshdir_authorized_keys"),
        ensure: NodeEnsure::Absent,
        attrs: NodeAttrs::File(FileAttrs {
            path: resolved.authorized_keys_path.clone(),
            owner: None,
            group: None,
            mode: None,
        }),
        requires: vec![],
    });

    nodes
}

fn user_attrs(resolved: &ResolvedAccount) -> UserAttrs {
    UserAttrs {
        name: resolved.username.clone(),
        uid: resolved.uid,
        shell: resolved.shell.clone(),
        gid: resolved.group_name.clone(),
        groups: resolved.groups.clone(),
        home: resolved.home_path.clone(),
        manage_home: resolved.manage_home,
        system: resolved.system,
        allowdupe: resolved.allowdupe,
        purge_ssh_keys: resolved.purge_ssh_keys,
    }
}

/// One-shot password initialization hook; the exec primitive guards
/// against re-running once a password is already set, and no-ops for
/// absent accounts
fn exec_node(resolved: &ResolvedAccount, ensure: NodeEnsure) -> ResourceNode {
    ResourceNode {
        id: format!("{}_set_initial_password", resolved.title),
        ensure,
        attrs: NodeAttrs::Exec(ExecAttrs {
            user: resolved.username.clone(),
            command: format!("chage --lastday 0 {}", resolved.username),
        }),
        requires: if ensure == NodeEnsure::Absent {
            vec![]
        } else {
            vec![node_reference(NodeKind::User, &resolved.title)]
        },
    }
}

/// Validate the ordering-constraint graph at plan-construction time
fn check_graph(nodes: &[ResourceNode]) -> Result<(), PlanError> {
    let mut index_of = HashMap::new();
    for (i, node) in nodes.iter().enumerate() {
        if index_of.insert(node.reference(), i).is_some() {
            return Err(PlanError::DuplicateNode(node.reference()));
        }
    }

    let mut indegree = vec![0usize; nodes.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    for (i, node) in nodes.iter().enumerate() {
        for prerequisite in &node.requires {
            let Some(&p) = index_of.get(prerequisite) else {
                return Err(PlanError::UnknownPrerequisite {
                    resource: node.reference(),
                    prerequisite: prerequisite.clone(),
                });
            };
            indegree[i] += 1;
            dependents[p].push(i);
        }
    }

    let mut ready: Vec<usize> = (0..nodes.len()).filter(|&i| indegree[i] == 0).collect();
    let mut placed = 0;
    while let Some(i) = ready.pop() {
        placed += 1;
        for &d in &dependents[i] {
            indegree[d] -= 1;
            if indegree[d] == 0 {
                ready.push(d);
            }
        }
    }

    if placed < nodes.len() {
        let stuck = (0..nodes.len())
            .find(|&i| indegree[i] > 0)
            .map(|i| nodes[i].reference())
            .unwrap_or_default();
        return Err(PlanError::Cycle(stuck));
    }

    Ok(())
}
