//! Execution plan - an ordered graph of resources
//!
//! Resources declare prerequisites by id; the plan validates the graph
//! (duplicate ids, unknown prerequisites, cycles) and yields execution
//! waves: each wave contains only resources whose prerequisites all
//! converged in earlier waves, so a wave can run in parallel.

use crate::resource::{BoxedResource, Resource};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Errors detected when validating a plan's dependency graph
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("duplicate resource id: {0}")]
    DuplicateId(String),

    #[error("resource {resource} requires unknown resource {prerequisite}")]
    UnknownPrerequisite {
        resource: String,
        prerequisite: String,
    },

    #[error("dependency cycle involving resource {0}")]
    Cycle(String),
}

/// An execution plan holding resources in declaration order
pub struct ExecutionPlan {
    resources: Vec<BoxedResource>,
}

impl ExecutionPlan {
    /// Create a new empty plan
    pub fn new() -> Self {
        Self {
            resources: Vec::new(),
        }
    }

    /// Add a resource to the plan
    pub fn add_resource(&mut self, resource: BoxedResource) {
        self.resources.push(resource);
    }

    /// All resources, in declaration order
    pub fn resources(&self) -> &[BoxedResource] {
        &self.resources
    }

    /// Total number of resources in the plan
    pub fn total_resources(&self) -> usize {
        self.resources.len()
    }

    /// Check if plan is empty
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Validate the dependency graph
    ///
    /// Rejects duplicate ids, prerequisites naming resources not in the
    /// plan, and cycles. Called by [`waves`](Self::waves); exposed so
    /// callers can validate at construction time.
    pub fn validate(&self) -> Result<(), PlanError> {
        let mut seen = HashSet::new();
        for resource in &self.resources {
            if !seen.insert(resource.id()) {
                return Err(PlanError::DuplicateId(resource.id()));
            }
        }
        for resource in &self.resources {
            for prerequisite in resource.requires() {
                if !seen.contains(&prerequisite) {
                    return Err(PlanError::UnknownPrerequisite {
                        resource: resource.id(),
                        prerequisite,
                    });
                }
            }
        }
        self.waves().map(|_| ())
    }

    /// Compute execution waves (topological order, Kahn's algorithm)
    ///
    /// Returns indices into [`resources`](Self::resources). Order within
    /// a wave follows declaration order, so the result is deterministic.
    pub fn waves(&self) -> Result<Vec<Vec<usize>>, PlanError> {
        let index_of: HashMap<String, usize> = self
            .resources
            .iter()
            .enumerate()
            .map(|(i, r)| (r.id(), i))
            .collect();

        let mut indegree = vec![0usize; self.resources.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); self.resources.len()];
        for (i, resource) in self.resources.iter().enumerate() {
            for prerequisite in resource.requires() {
                let Some(&p) = index_of.get(&prerequisite) else {
                    return Err(PlanError::UnknownPrerequisite {
                        resource: resource.id(),
                        prerequisite,
                    });
                };
                indegree[i] += 1;
                dependents[p].push(i);
            }
        }

        let mut waves = Vec::new();
        let mut ready: Vec<usize> = (0..self.resources.len())
            .filter(|&i| indegree[i] == 0)
            .collect();
        let mut placed = 0;

        while !ready.is_empty() {
            placed += ready.len();
            let mut next = Vec::new();
            for &i in &ready {
                for &d in &dependents[i] {
                    indegree[d] -= 1;
                    if indegree[d] == 0 {
                        next.push(d);
                    }
                }
            }
            next.sort_unstable();
            waves.push(std::mem::replace(&mut ready, next));
        }

        if placed < self.resources.len() {
            let stuck = (0..self.resources.len())
                .find(|&i| indegree[i] > 0)
                .map(|i| self.resources[i].id())
                .unwrap_or_default();
            return Err(PlanError::Cycle(stuck));
        }

        Ok(waves)
    }

    /// Filter plan to only include resources matching a predicate
    ///
    /// Prerequisites referring to removed resources are dropped at wave
    /// computation time, so a filtered plan stays executable.
    pub fn filter<F>(self, predicate: F) -> Self
    where
        F: Fn(&dyn Resource) -> bool,
    {
        let kept: Vec<BoxedResource> = self
            .resources
            .into_iter()
            .filter(|r| predicate(r.as_ref()))
            .collect();
        let ids: HashSet<String> = kept.iter().map(|r| r.id()).collect();
        Self {
            resources: kept
                .into_iter()
                .map(|r| Box::new(Pruned { inner: r, ids: ids.clone() }) as BoxedResource)
                .collect(),
        }
    }

    /// Filter plan to only include resources matching a target pattern
    ///
    /// Target format: "type" or "type.name"
    pub fn filter_by_target(self, target: Option<&str>) -> Self {
        match target {
            None => self,
            Some(t) => {
                let (resource_type, name) = parse_target(t);
                self.filter(|r| matches_filter(r, resource_type.as_deref(), name.as_deref()))
            }
        }
    }
}

impl Default for ExecutionPlan {
    fn default() -> Self {
        Self::new()
    }
}

/// Wrapper that drops prerequisites pointing outside the kept id set
struct Pruned {
    inner: BoxedResource,
    ids: HashSet<String>,
}

impl std::fmt::Debug for Pruned {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(&self.inner, f)
    }
}

impl Resource for Pruned {
    fn id(&self) -> String {
        self.inner.id()
    }

    fn description(&self) -> String {
        self.inner.description()
    }

    fn resource_type(&self) -> &'static str {
        self.inner.resource_type()
    }

    fn requires(&self) -> Vec<String> {
        self.inner
            .requires()
            .into_iter()
            .filter(|id| self.ids.contains(id))
            .collect()
    }

    fn sudo_requirement(&self) -> crate::types::SudoRequirement {
        self.inner.sudo_requirement()
    }

    fn current_state(&self) -> anyhow::Result<crate::types::ResourceState> {
        self.inner.current_state()
    }

    fn desired_state(&self) -> crate::types::ResourceState {
        self.inner.desired_state()
    }

    fn apply(
        &self,
        ctx: &mut crate::context::ApplyContext,
    ) -> anyhow::Result<crate::types::ApplyResult> {
        self.inner.apply(ctx)
    }
}

/// Parse a target string like "type.name" into (type, name)
fn parse_target(target: &str) -> (Option<String>, Option<String>) {
    let parts: Vec<&str> = target.split('.').collect();
    match parts.len() {
        1 => (Some(parts[0].to_string()), None),
        2 => (Some(parts[0].to_string()), Some(parts[1].to_string())),
        _ => (None, Some(target.to_string())),
    }
}

/// Check if a resource matches the filter criteria
fn matches_filter(
    resource: &dyn Resource,
    resource_type: Option<&str>,
    name: Option<&str>,
) -> bool {
    if let Some(rt) = resource_type
        && resource.resource_type() != rt
    {
        return false;
    }

    if let Some(n) = name
        && !resource.id().contains(n)
    {
        return false;
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ApplyContext;
    use crate::types::{ApplyResult, ResourceState};
    use anyhow::Result;

    #[derive(Debug)]
    struct Node {
        id: &'static str,
        requires: Vec<&'static str>,
    }

    impl Resource for Node {
        fn id(&self) -> String {
            self.id.to_string()
        }

        fn description(&self) -> String {
            format!("node {}", self.id)
        }

        fn resource_type(&self) -> &'static str {
            "test"
        }

        fn requires(&self) -> Vec<String> {
            self.requires.iter().map(|s| s.to_string()).collect()
        }

        fn current_state(&self) -> Result<ResourceState> {
            Ok(ResourceState::Absent)
        }

        fn desired_state(&self) -> ResourceState {
            ResourceState::Present { details: None }
        }

        fn apply(&self, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
            Ok(ApplyResult::Created)
        }
    }

    fn plan_of(nodes: Vec<Node>) -> ExecutionPlan {
        let mut plan = ExecutionPlan::new();
        for node in nodes {
            plan.add_resource(Box::new(node));
        }
        plan
    }

    #[test]
    fn test_waves_respect_prerequisites() {
        let plan = plan_of(vec![
            Node { id: "a", requires: vec![] },
            Node { id: "b", requires: vec!["a"] },
            Node { id: "c", requires: vec!["a"] },
            Node { id: "d", requires: vec!["b", "c"] },
        ]);

        let waves = plan.waves().unwrap();
        assert_eq!(waves, vec![vec![0], vec![1, 2], vec![3]]);
    }

    #[test]
    fn test_unknown_prerequisite_rejected() {
        let plan = plan_of(vec![Node { id: "a", requires: vec!["ghost"] }]);
        assert_eq!(
            plan.validate(),
            Err(PlanError::UnknownPrerequisite {
                resource: "a".to_string(),
                prerequisite: "ghost".to_string(),
            })
        );
    }

    #[test]
    fn test_cycle_rejected() {
        let plan = plan_of(vec![
            Node { id: "a", requires: vec!["b"] },
            Node { id: "b", requires: vec!["a"] },
        ]);
        assert!(matches!(plan.validate(), Err(PlanError::Cycle(_))));
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let plan = plan_of(vec![
            Node { id: "a", requires: vec![] },
            Node { id: "a", requires: vec![] },
        ]);
        assert_eq!(plan.validate(), Err(PlanError::DuplicateId("a".to_string())));
    }

    #[test]
    fn test_filter_by_target() {
        let plan = plan_of(vec![
            Node { id: "a", requires: vec![] },
            Node { id: "b", requires: vec!["a"] },
        ]);
        assert_eq!(plan.filter_by_target(None).total_resources(), 2);

        let plan = plan_of(vec![
            Node { id: "a", requires: vec![] },
            Node { id: "b", requires: vec!["a"] },
        ]);
        let filtered = plan.filter_by_target(Some("test.b"));
        assert_eq!(filtered.total_resources(), 1);
        assert_eq!(filtered.resources()[0].id(), "b");
        assert!(filtered.validate().is_ok());

        let plan = plan_of(vec![Node { id: "a", requires: vec![] }]);
        assert_eq!(plan.filter_by_target(Some("group")).total_resources(), 0);
    }

    #[test]
    fn test_filter_prunes_dangling_prerequisites() {
        let plan = plan_of(vec![
            Node { id: "a", requires: vec![] },
            Node { id: "b", requires: vec!["a"] },
        ]);

        let filtered = plan.filter(|r| r.id() == "b");
        assert_eq!(filtered.total_resources(), 1);
        assert!(filtered.validate().is_ok());
        assert_eq!(filtered.waves().unwrap(), vec![vec![0]]);
    }
}
