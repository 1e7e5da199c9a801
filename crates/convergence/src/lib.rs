//! # Convergence
//!
//! A framework for declarative resource convergence with explicit ordering.
//!
//! This crate provides the core abstractions for declaring desired state,
//! detecting current state, and converging systems to match the desired
//! state. Resources declare prerequisites by id; plans validate the
//! resulting graph and execute it in dependency order.
//!
//! ## Core Concepts
//!
//! - **Resource**: Something with state that can be managed (users, groups, files)
//! - **ResourceState**: The current or desired state of a resource
//! - **ExecutionPlan**: A validated DAG of resources, executed in topological waves
//! - **Executor**: Applies resources wave by wave, blocking dependents of failures
//!
//! ## Example
//!
//! ```ignore
//! use convergence::{
//!     Resource, ResourceState, ApplyResult, ApplyContext,
//!     ExecutionPlan, ExecuteOptions, execute_simple,
//! };
//!
//! #[derive(Debug)]
//! struct FileResource { path: String, content: String }
//!
//! impl Resource for FileResource {
//!     fn id(&self) -> String { self.path.clone() }
//!     fn description(&self) -> String { format!("File: {}", self.path) }
//!     fn resource_type(&self) -> &'static str { "file" }
//!
//!     fn current_state(&self) -> anyhow::Result<ResourceState> {
//!         if std::path::Path::new(&self.path).exists() {
//!             Ok(ResourceState::Present { details: None })
//!         } else {
//!             Ok(ResourceState::Absent)
//!         }
//!     }
//!
//!     fn desired_state(&self) -> ResourceState {
//!         ResourceState::Present { details: None }
//!     }
//!
//!     fn apply(&self, ctx: &mut ApplyContext) -> anyhow::Result<ApplyResult> {
//!         if ctx.dry_run {
//!             return Ok(ApplyResult::Skipped { reason: "Dry run".into() });
//!         }
//!         std::fs::write(&self.path, &self.content)?;
//!         Ok(ApplyResult::Created)
//!     }
//! }
//!
//! let mut plan = ExecutionPlan::new();
//! plan.add_resource(Box::new(FileResource {
//!     path: "/tmp/test.txt".into(),
//!     content: "hello".into(),
//! }));
//! plan.validate()?;
//!
//! let summary = execute_simple(plan, ExecuteOptions::default(), || {
//!     anyhow::bail!("No sudo needed")
//! })?;
//! ```
//!
//! ## Provider Traits
//!
//! The crate uses traits for dependency injection:
//!
//! - [`SudoProvider`]: Provides elevated privilege execution
//! - [`ProgressCallback`]: Receives progress updates
//! - [`ConfirmCallback`]: Handles user confirmations
//!
//! This allows the crate to be used without hard dependencies on
//! specific UI frameworks, sudo implementations, etc.

pub mod context;
pub mod diff;
pub mod executor;
pub mod plan;
pub mod resource;
pub mod types;

// Re-export main types at crate root
pub use context::{
    ApplyContext, AutoConfirm, AutoDecline, ConfirmCallback, NoProgress, ProgressCallback,
    SudoProvider,
};
pub use diff::{compute_diffs, DiffSummary, ResourceDiff};
pub use executor::{execute, execute_simple};
pub use plan::{ExecutionPlan, PlanError};
pub use resource::{BoxedResource, Resource, ResourceExt};
pub use types::{
    ApplyResult, CommandOutput, ExecuteOptions, ExecuteSummary, ResourceState, SudoRequirement,
};
