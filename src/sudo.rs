//! Scoped sudo context
//!
//! Sudo is never requested for the entire process. Instead:
//! 1. The plan is computed first (no privileges needed)
//! 2. Sudo is acquired once, lazily, when the executor reaches the
//!    first privileged resource
//! 3. The timestamp is invalidated on drop
//!
//! When already running as root the context skips sudo entirely and
//! executes commands directly.

use anyhow::{bail, Context, Result};
use convergence::{CommandOutput, SudoProvider};
use std::process::{Command, Output};

/// Check whether the current process already runs as root
pub fn is_root() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail
    unsafe { libc::geteuid() == 0 }
}

/// Scoped sudo context - invalidates the timestamp on drop
pub struct SudoContext {
    /// Root needs no sudo prefix
    direct: bool,
}

impl SudoContext {
    /// Acquire sudo privileges with a reason shown to the user
    pub fn acquire(reason: &str) -> Result<Self> {
        if is_root() {
            log::debug!("already root, skipping sudo");
            return Ok(Self { direct: true });
        }

        eprintln!();
        eprintln!("  Sudo required: {reason}");
        eprintln!();

        // Validate sudo (will prompt for password)
        let status = Command::new("sudo")
            .args(["-v"])
            .status()
            .context("Failed to execute sudo")?;

        if !status.success() {
            bail!("Failed to acquire sudo privileges");
        }

        Ok(Self { direct: false })
    }

    fn run_internal(&self, cmd: &str, args: &[&str]) -> Result<Output> {
        let output = if self.direct {
            Command::new(cmd).args(args).output()
        } else {
            Command::new("sudo").arg(cmd).args(args).output()
        }
        .with_context(|| format!("Failed to execute: {cmd} {args:?}"))?;

        Ok(output)
    }
}

impl SudoProvider for SudoContext {
    fn run(&self, cmd: &str, args: &[&str]) -> Result<CommandOutput> {
        let output = self.run_internal(cmd, args)?;
        Ok(output.into())
    }
}

impl Drop for SudoContext {
    fn drop(&mut self) {
        if !self.direct {
            // Invalidate sudo timestamp to release privileges
            let _ = Command::new("sudo").args(["-k"]).status();
        }
    }
}
