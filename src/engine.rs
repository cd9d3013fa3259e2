//! Applies and checks manifests
//!
//! Entries run strictly in manifest order through [`declarative::execute`],
//! each one built just before it runs so it can refer to accounts and paths
//! an earlier entry created. Drift checks only call `uptodate` and never
//! mutate.

use anyhow::Result;
use declarative::{
    DriftSummary, ExecuteOptions, ExecuteSummary, ResourceDrift, compute_drift, group_by_kind,
};

use crate::dsl::Dsl;
use crate::manifest::Manifest;
use crate::ui;

#[derive(Debug, Clone, Copy, Default)]
pub struct ApplyOptions {
    /// Report what would change without changing it
    pub dry_run: bool,
    /// Continue with the next resource after a failure
    pub keep_going: bool,
}

/// Apply every resource in `manifest`
pub fn apply(dsl: &Dsl, manifest: Manifest, opts: ApplyOptions) -> Result<ExecuteSummary> {
    let mut resources = manifest.into_pending(dsl);

    ui::header("Applying Configuration");
    if opts.dry_run {
        ui::warn("Dry run - no changes will be made");
    }

    if resources.is_empty() {
        ui::info("Manifest declares no resources");
        return Ok(ExecuteSummary::default());
    }

    let _guard = opts.dry_run.then(|| dsl.dry_run().enter());
    let mut progress = ui::ApplyProgress::new(resources.len(), opts.dry_run);
    let summary = declarative::execute(
        &mut resources,
        &ExecuteOptions {
            keep_going: opts.keep_going,
        },
        &mut progress,
    );

    ui::print_summary(&summary, opts.dry_run);
    Ok(summary)
}

/// Report resources whose configured action is not yet satisfied
pub fn check(dsl: &Dsl, manifest: Manifest) -> Result<Vec<ResourceDrift>> {
    let resources = manifest.into_resources(dsl)?;

    ui::header("Checking Configuration");
    let drift = compute_drift(&resources);
    let summary = DriftSummary::from_drift(&drift);
    ui::print_drift(&group_by_kind(&drift), &summary);
    Ok(drift)
}
