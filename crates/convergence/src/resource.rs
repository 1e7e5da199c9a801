//! Resource trait for declarative state management
//!
//! A Resource represents something that can be in a certain state,
//! and can be changed to reach a desired state. Resources may declare
//! prerequisites; the plan orders them before execution.

use crate::context::ApplyContext;
use crate::types::{ApplyResult, ResourceState, SudoRequirement};
use anyhow::Result;
use std::fmt;

/// Core trait for declarative resources
///
/// Every resource in the system implements this trait, which provides:
/// - Identity (id, description, type)
/// - Ordering (prerequisite resource ids)
/// - State detection (current vs desired)
/// - State convergence (apply)
pub trait Resource: Send + Sync + fmt::Debug {
    /// Unique identifier for this resource
    ///
    /// Must be stable and unique within a plan. Examples:
    /// - "deploy" for a user or group
    /// - "deploy_home" for the user's home directory
    /// - "deploy_ssh_key_ci@build" for one authorized key
    fn id(&self) -> String;

    /// Human-readable description of what this resource does
    fn description(&self) -> String;

    /// Resource type category
    ///
    /// Used for grouping and filtering, e.g. "group", "user", "directory".
    fn resource_type(&self) -> &'static str;

    /// Identifiers of resources that must converge before this one
    ///
    /// Default: no prerequisites. Every named id must exist in the same
    /// plan; the plan rejects unknown prerequisites and cycles.
    fn requires(&self) -> Vec<String> {
        Vec::new()
    }

    /// Whether this resource requires elevated privileges
    fn sudo_requirement(&self) -> SudoRequirement {
        SudoRequirement::None
    }

    /// Detect the current state of this resource
    ///
    /// Queries the system to determine what state the resource is in.
    fn current_state(&self) -> Result<ResourceState>;

    /// Get the desired state for this resource
    ///
    /// This is typically derived from configuration.
    fn desired_state(&self) -> ResourceState;

    /// Check if the resource needs changes to reach desired state
    fn needs_apply(&self) -> Result<bool> {
        let current = self.current_state()?;
        let desired = self.desired_state();
        Ok(current != desired)
    }

    /// Apply changes to reach the desired state
    ///
    /// This method should:
    /// 1. Check if already in desired state (return NoChange)
    /// 2. Respect ctx.dry_run (return Skipped if true)
    /// 3. Make the necessary changes
    /// 4. Return the appropriate ApplyResult
    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult>;
}

/// A boxed resource for type-erased storage
pub type BoxedResource = Box<dyn Resource>;

/// Extension trait for working with resources
pub trait ResourceExt {
    /// Check if the resource requires sudo based on its requirement
    fn requires_sudo(&self) -> bool;
}

impl<R: Resource + ?Sized> ResourceExt for R {
    fn requires_sudo(&self) -> bool {
        matches!(self.sudo_requirement(), SudoRequirement::Required { .. })
    }
}
