//! Execution engine - applies resources in declaration order
//!
//! Resources are independent: there is no dependency graph, and ordering is
//! entirely the caller's. A failure stops the run unless `keep_going` is set,
//! in which case it is recorded and the next resource runs.

use crate::error::Result;
use crate::resource::Resource;
use crate::types::{ApplyResult, ExecuteOptions, ExecuteSummary};

/// Anything the executor can run: a built [`Resource`], or a description
/// that is turned into one when its turn comes
pub trait Runnable {
    fn kind(&self) -> &str;

    fn name(&self) -> &str;

    /// Run the configured action and report whether it changed state
    fn run(&mut self) -> Result<bool>;
}

impl Runnable for Resource {
    fn kind(&self) -> &str {
        Resource::kind(self)
    }

    fn name(&self) -> &str {
        Resource::name(self)
    }

    fn run(&mut self) -> Result<bool> {
        Resource::run(self)
    }
}

/// Progress callback for execution operations
///
/// Implement this trait to receive progress updates during execution.
pub trait ProgressCallback {
    /// Called before a resource's action runs
    fn on_resource_start(&mut self, kind: &str, name: &str);

    /// Called when a resource's action completes
    fn on_resource_complete(&mut self, kind: &str, name: &str, result: &ApplyResult);
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_resource_start(&mut self, _kind: &str, _name: &str) {}
    fn on_resource_complete(&mut self, _kind: &str, _name: &str, _result: &ApplyResult) {}
}

/// Run every resource's configured action in order
pub fn execute<R: Runnable, P: ProgressCallback>(
    resources: &mut [R],
    opts: &ExecuteOptions,
    progress: &mut P,
) -> ExecuteSummary {
    let mut summary = ExecuteSummary::default();

    for (index, resource) in resources.iter_mut().enumerate() {
        progress.on_resource_start(resource.kind(), resource.name());

        let result = apply_resource(resource);
        progress.on_resource_complete(resource.kind(), resource.name(), &result);
        summary.add_result(&result);

        if !result.is_success() && !opts.keep_going {
            summary.skipped = resources.len() - index - 1;
            break;
        }
    }

    summary
}

/// Apply a single resource
fn apply_resource<R: Runnable>(resource: &mut R) -> ApplyResult {
    match resource.run() {
        Ok(true) => ApplyResult::Changed,
        Ok(false) => ApplyResult::NoChange,
        Err(e) => {
            log::error!("{} '{}': {}", resource.kind(), resource.name(), e);
            ApplyResult::Failed {
                error: e.to_string(),
            }
        }
    }
}

/// Simple execution without callbacks
pub fn execute_simple<R: Runnable>(resources: &mut [R], opts: &ExecuteOptions) -> ExecuteSummary {
    execute(resources, opts, &mut NoProgress)
}
