//! Execution engine - applies resources wave by wave
//!
//! Waves come from the plan's topological order: every resource in a wave
//! has all prerequisites already converged, so a wave can run in parallel.
//! When a resource fails, its transitive dependents are reported as
//! Blocked instead of being attempted.

use crate::context::{ApplyContext, ConfirmCallback, ProgressCallback, SudoProvider};
use crate::diff::compute_diffs;
use crate::plan::ExecutionPlan;
use crate::resource::{Resource, ResourceExt};
use crate::types::{ApplyResult, ExecuteOptions, ExecuteSummary};
use anyhow::Result;
use rayon::prelude::*;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Execute a plan with the given options and callbacks
///
/// # Arguments
/// * `plan` - The execution plan to run
/// * `opts` - Execution options (dry_run, jobs, verbose)
/// * `sudo_provider` - Provider for privileged operations (called lazily if needed)
/// * `progress` - Progress callback
/// * `confirm` - Confirmation callback
///
/// # Returns
/// Summary of execution results
pub fn execute<S, P, C>(
    plan: ExecutionPlan,
    opts: ExecuteOptions,
    sudo_provider: impl FnOnce() -> Result<S>,
    progress: &mut P,
    confirm: &mut C,
) -> Result<ExecuteSummary>
where
    S: SudoProvider,
    P: ProgressCallback,
    C: ConfirmCallback,
{
    let waves = plan.waves()?;

    // Compute diffs for reporting
    let diffs = compute_diffs(plan.resources());
    if diffs.is_empty() {
        return Ok(ExecuteSummary::default());
    }

    // Confirm before proceeding (unless dry_run)
    if !opts.dry_run && !confirm.confirm("Apply changes?")? {
        return Ok(ExecuteSummary {
            skipped: diffs.len(),
            ..Default::default()
        });
    }

    if opts.dry_run {
        return Ok(ExecuteSummary::default());
    }

    // Acquire sudo once if anything in the plan needs it
    let sudo = if plan.resources().iter().any(|r| r.requires_sudo()) {
        Some(sudo_provider()?)
    } else {
        None
    };
    let sudo_ref = sudo.as_ref().map(|s| s as &dyn SudoProvider);

    let mut summary = ExecuteSummary::default();
    let mut failed: HashSet<String> = HashSet::new();

    for wave in waves {
        progress.on_wave_start(wave.len());

        // Anything whose prerequisite failed is blocked, not attempted
        let (blocked, runnable): (Vec<usize>, Vec<usize>) = wave.into_iter().partition(|&i| {
            plan.resources()[i]
                .requires()
                .iter()
                .any(|p| failed.contains(p))
        });

        for i in blocked {
            let resource = &plan.resources()[i];
            let prerequisite = resource
                .requires()
                .into_iter()
                .find(|p| failed.contains(p))
                .unwrap_or_default();
            let result = ApplyResult::Blocked { prerequisite };
            progress.on_resource_complete(&resource.id(), &result);
            summary.add_result(&result);
            failed.insert(resource.id());
        }

        let resources: Vec<&dyn Resource> = runnable
            .iter()
            .map(|&i| plan.resources()[i].as_ref())
            .collect();
        let results = execute_wave(&resources, opts.jobs, opts.verbose, sudo_ref, progress)?;
        for (resource, result) in resources.iter().zip(&results) {
            if !result.is_success() {
                failed.insert(resource.id());
            }
            summary.add_result(result);
        }

        progress.on_wave_complete();
    }

    Ok(summary)
}

/// Execute one wave of independent resources
fn execute_wave<P: ProgressCallback>(
    resources: &[&dyn Resource],
    jobs: usize,
    verbose: bool,
    sudo: Option<&dyn SudoProvider>,
    progress: &mut P,
) -> Result<Vec<ApplyResult>> {
    if jobs == 1 || resources.len() <= 1 {
        // Sequential execution
        let mut results = Vec::with_capacity(resources.len());
        for resource in resources {
            progress.on_resource_start(&resource.id(), &resource.description());
            let result = apply_resource(*resource, verbose, sudo);
            progress.on_resource_complete(&resource.id(), &result);
            results.push(result);
        }
        Ok(results)
    } else {
        execute_parallel(resources, jobs, verbose, sudo, progress)
    }
}

/// Execute independent resources in parallel using rayon
fn execute_parallel<P: ProgressCallback>(
    resources: &[&dyn Resource],
    jobs: usize,
    verbose: bool,
    sudo: Option<&dyn SudoProvider>,
    progress: &mut P,
) -> Result<Vec<ApplyResult>> {
    // The progress callback is not thread-safe; collect results and
    // report after the wave.
    let results: Arc<Mutex<Vec<(usize, ApplyResult)>>> = Arc::new(Mutex::new(Vec::new()));

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to create thread pool: {}", e))?;

    pool.install(|| {
        resources.par_iter().enumerate().for_each(|(i, resource)| {
            let result = apply_resource(*resource, verbose, sudo);
            results.lock().unwrap().push((i, result));
        });
    });

    let mut results = Arc::try_unwrap(results)
        .map_err(|_| anyhow::anyhow!("Failed to unwrap results"))?
        .into_inner()
        .unwrap();
    results.sort_by_key(|(i, _)| *i);

    for (i, result) in &results {
        progress.on_resource_complete(&resources[*i].id(), result);
    }

    Ok(results.into_iter().map(|(_, r)| r).collect())
}

/// Apply a single resource
fn apply_resource(
    resource: &dyn Resource,
    verbose: bool,
    sudo: Option<&dyn SudoProvider>,
) -> ApplyResult {
    let mut ctx = match sudo {
        Some(s) => ApplyContext::with_sudo(false, verbose, s),
        None => ApplyContext::new(false, verbose),
    };

    match resource.apply(&mut ctx) {
        Ok(result) => result,
        Err(e) => ApplyResult::Failed {
            error: e.to_string(),
        },
    }
}

/// Simple execution without callbacks
///
/// For basic use cases where you don't need progress or confirmation.
pub fn execute_simple<S: SudoProvider>(
    plan: ExecutionPlan,
    opts: ExecuteOptions,
    sudo_provider: impl FnOnce() -> Result<S>,
) -> Result<ExecuteSummary> {
    use crate::context::{AutoConfirm, NoProgress};

    execute(plan, opts, sudo_provider, &mut NoProgress, &mut AutoConfirm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{AutoConfirm, NoProgress};
    use crate::types::{CommandOutput, ResourceState};
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Mock sudo provider for tests
    struct MockSudo;

    impl SudoProvider for MockSudo {
        fn run(&self, _cmd: &str, _args: &[&str]) -> Result<CommandOutput> {
            Ok(CommandOutput {
                stdout: Vec::new(),
                stderr: Vec::new(),
                success: true,
            })
        }
    }

    #[derive(Debug)]
    struct TestResource {
        id: String,
        requires: Vec<String>,
        should_change: bool,
        fail: bool,
        applied: Arc<AtomicBool>,
    }

    impl TestResource {
        fn new(id: &str, requires: &[&str]) -> Self {
            Self {
                id: id.to_string(),
                requires: requires.iter().map(|s| s.to_string()).collect(),
                should_change: true,
                fail: false,
                applied: Arc::new(AtomicBool::new(false)),
            }
        }
    }

    impl Resource for TestResource {
        fn id(&self) -> String {
            self.id.clone()
        }

        fn description(&self) -> String {
            format!("Test resource {}", self.id)
        }

        fn resource_type(&self) -> &'static str {
            "test"
        }

        fn requires(&self) -> Vec<String> {
            self.requires.clone()
        }

        fn current_state(&self) -> Result<ResourceState> {
            if self.should_change {
                Ok(ResourceState::Absent)
            } else {
                Ok(ResourceState::Present { details: None })
            }
        }

        fn desired_state(&self) -> ResourceState {
            ResourceState::Present { details: None }
        }

        fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult> {
            if ctx.dry_run {
                return Ok(ApplyResult::Skipped {
                    reason: "Dry run".into(),
                });
            }
            self.applied.store(true, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("boom");
            }
            if self.should_change {
                Ok(ApplyResult::Created)
            } else {
                Ok(ApplyResult::NoChange)
            }
        }
    }

    fn run(plan: ExecutionPlan) -> ExecuteSummary {
        execute(
            plan,
            ExecuteOptions {
                jobs: 1,
                ..Default::default()
            },
            || -> Result<MockSudo> { Ok(MockSudo) },
            &mut NoProgress,
            &mut AutoConfirm,
        )
        .unwrap()
    }

    #[test]
    fn test_execute_empty_plan() {
        let summary = run(ExecutionPlan::new());
        assert_eq!(summary.total(), 0);
    }

    #[test]
    fn test_execute_no_changes() {
        let mut plan = ExecutionPlan::new();
        plan.add_resource(Box::new(TestResource {
            should_change: false,
            ..TestResource::new("test1", &[])
        }));

        // No diff means no execution
        let summary = run(plan);
        assert_eq!(summary.total(), 0);
    }

    #[test]
    fn test_execute_with_changes() {
        let mut plan = ExecutionPlan::new();
        plan.add_resource(Box::new(TestResource::new("test1", &[])));

        let summary = run(plan);
        assert_eq!(summary.created, 1);
    }

    #[test]
    fn test_failure_blocks_dependents() {
        let blocked_applied = Arc::new(AtomicBool::new(false));
        let mut plan = ExecutionPlan::new();
        plan.add_resource(Box::new(TestResource {
            fail: true,
            ..TestResource::new("root", &[])
        }));
        plan.add_resource(Box::new(TestResource {
            applied: blocked_applied.clone(),
            ..TestResource::new("child", &["root"])
        }));
        plan.add_resource(Box::new(TestResource::new("other", &[])));

        let summary = run(plan);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.blocked, 1);
        assert_eq!(summary.created, 1);
        assert!(!blocked_applied.load(Ordering::SeqCst));
    }

    #[test]
    fn test_blocked_propagates_transitively() {
        let mut plan = ExecutionPlan::new();
        plan.add_resource(Box::new(TestResource {
            fail: true,
            ..TestResource::new("a", &[])
        }));
        plan.add_resource(Box::new(TestResource::new("b", &["a"])));
        plan.add_resource(Box::new(TestResource::new("c", &["b"])));

        let summary = run(plan);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.blocked, 2);
    }

    #[test]
    fn test_dry_run_applies_nothing() {
        let applied = Arc::new(AtomicBool::new(false));
        let mut plan = ExecutionPlan::new();
        plan.add_resource(Box::new(TestResource {
            applied: applied.clone(),
            ..TestResource::new("test1", &[])
        }));

        let summary = execute(
            plan,
            ExecuteOptions {
                dry_run: true,
                ..Default::default()
            },
            || -> Result<MockSudo> { Ok(MockSudo) },
            &mut NoProgress,
            &mut AutoConfirm,
        )
        .unwrap();

        assert_eq!(summary.total_changes(), 0);
        assert!(!applied.load(Ordering::SeqCst));
    }
}
