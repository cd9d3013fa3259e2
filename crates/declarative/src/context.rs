//! Dry-run context and command-runner seam
//!
//! These let the declarative crate drive providers without depending on a
//! specific process-spawning implementation, and let tests substitute a
//! recording runner.

use crate::error::{Error, Result};
use crate::types::CommandOutput;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// Shared dry-run flag
///
/// Clones share the same flag. Providers read it before every mutating
/// operation; [`DryRun::run`] scopes a block to dry-run mode and restores the
/// previous value on every exit path, including panics.
#[derive(Debug, Clone, Default)]
pub struct DryRun(Arc<AtomicBool>);

static GLOBAL: OnceLock<DryRun> = OnceLock::new();

impl DryRun {
    /// A new, inactive flag independent of the process-wide one
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide flag
    pub fn global() -> &'static DryRun {
        GLOBAL.get_or_init(DryRun::new)
    }

    pub fn is_active(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Activate dry-run until the returned guard is dropped
    pub fn enter(&self) -> DryRunGuard {
        let previous = self.0.swap(true, Ordering::SeqCst);
        DryRunGuard {
            flag: self.clone(),
            previous,
        }
    }

    /// Run `f` with dry-run active, restoring the previous state afterwards
    pub fn run<T>(&self, f: impl FnOnce() -> T) -> T {
        let _guard = self.enter();
        f()
    }
}

/// Restores the prior dry-run state when dropped
#[derive(Debug)]
pub struct DryRunGuard {
    flag: DryRun,
    previous: bool,
}

impl Drop for DryRunGuard {
    fn drop(&mut self) {
        self.flag.0.store(self.previous, Ordering::SeqCst);
    }
}

/// Options for [`CommandRunner::exec_or_fail`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecOptions<'a> {
    /// Extra environment variables for the child process
    pub env: &'a [(&'a str, &'a str)],
    /// Report stdout instead of stderr on failure (for tools that print
    /// their errors on stdout)
    pub ignore_stderr: bool,
}

impl<'a> ExecOptions<'a> {
    pub fn with_env(env: &'a [(&'a str, &'a str)]) -> Self {
        Self {
            env,
            ignore_stderr: false,
        }
    }

    pub fn ignoring_stderr() -> Self {
        Self {
            env: &[],
            ignore_stderr: true,
        }
    }
}

/// Runs external OS commands
///
/// Implement this trait to provide process execution. Every platform
/// provider goes through it, so a fake implementation can observe the exact
/// argument vectors.
pub trait CommandRunner: Send + Sync {
    /// Run a command to completion and capture its output
    fn run(&self, cmd: &str, args: &[&str], env: &[(&str, &str)]) -> Result<CommandOutput>;

    /// Run a command and return its stdout, failing when it exits unsuccessfully
    ///
    /// The failure message is `{error_prefix}: "{diagnostic}"`, with the
    /// diagnostic taken from stderr (or stdout with `ignore_stderr`).
    fn exec_or_fail(
        &self,
        cmd: &str,
        args: &[&str],
        error_prefix: &str,
        options: ExecOptions<'_>,
    ) -> Result<String> {
        let output = self.run(cmd, args, options.env)?;
        if output.success {
            return Ok(output.stdout_str());
        }

        let diagnostic = if options.ignore_stderr {
            output.stdout_str()
        } else {
            output.stderr_str()
        };
        Err(Error::command_failed(error_prefix, &diagnostic))
    }
}
