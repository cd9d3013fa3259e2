use colored::Colorize;
use declarative::{ApplyResult, DriftSummary, ExecuteSummary, ProgressCallback, ResourceDrift};
use std::collections::BTreeMap;

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Print a step indicator
pub fn step(num: usize, total: usize, msg: &str) {
    println!("{} {}", format!("[{num}/{total}]").blue().bold(), msg);
}

// ============================================================================
// Apply progress
// ============================================================================

/// Prints one line per resource as the executor runs
pub struct ApplyProgress {
    total: usize,
    current: usize,
    dry_run: bool,
}

impl ApplyProgress {
    pub fn new(total: usize, dry_run: bool) -> Self {
        Self {
            total,
            current: 0,
            dry_run,
        }
    }
}

/// Marker shown next to a completed resource
fn result_marker(result: &ApplyResult, dry_run: bool) -> String {
    match result {
        ApplyResult::NoChange => "○ ok".dimmed().to_string(),
        ApplyResult::Changed if dry_run => "~ would change".yellow().to_string(),
        ApplyResult::Changed => "✓ changed".green().to_string(),
        ApplyResult::Failed { .. } => "✗ failed".red().to_string(),
    }
}

impl ProgressCallback for ApplyProgress {
    fn on_resource_start(&mut self, _kind: &str, _name: &str) {
        self.current += 1;
    }

    fn on_resource_complete(&mut self, kind: &str, name: &str, result: &ApplyResult) {
        step(
            self.current,
            self.total,
            &format!("{kind} {name}  {}", result_marker(result, self.dry_run)),
        );
        if let ApplyResult::Failed { error } = result {
            dim(error);
        }
    }
}

/// Print the totals after an apply run
pub fn print_summary(summary: &ExecuteSummary, dry_run: bool) {
    println!();
    if !summary.is_success() {
        println!(
            "  {} Configuration applied with errors",
            "⚠".yellow().bold()
        );
    } else if dry_run {
        println!("  {} Dry run complete, no changes made", "ℹ".blue().bold());
    } else {
        println!(
            "  {} Configuration applied successfully!",
            "✓".green().bold()
        );
    }

    let changed = if dry_run { "would change" } else { "changed" };
    if summary.changed > 0 {
        println!("    • {} resources {changed}", summary.changed);
    }
    if summary.unchanged > 0 {
        println!("    • {} resources up to date", summary.unchanged);
    }
    if summary.skipped > 0 {
        println!("    • {} resources skipped", summary.skipped);
    }
    if summary.failed > 0 {
        println!("    • {} {} failed", summary.failed, "resources".red());
    }
}

// ============================================================================
// Drift
// ============================================================================

fn drift_symbol(drift: &ResourceDrift) -> String {
    if drift.is_error() {
        "!".red().to_string()
    } else if drift.action == declarative::Action::Remove {
        "-".red().to_string()
    } else {
        "+".green().to_string()
    }
}

/// Print out-of-date resources grouped by kind
pub fn print_drift(groups: &BTreeMap<&str, Vec<&ResourceDrift>>, summary: &DriftSummary) {
    if !summary.has_changes() {
        println!();
        println!("  {} Everything is up to date", "✓".green());
        return;
    }

    for (kind, items) in groups {
        section(kind);
        for item in items {
            let detail = match &item.error {
                Some(error) => error.as_str().red().to_string(),
                None => format!("({})", item.action).dimmed().to_string(),
            };
            println!("  {} {:<40} {}", drift_symbol(item), item.name, detail);
        }
    }

    println!();
    println!(
        "  Summary: {} pending, {} removals, {} errors",
        summary.pending.to_string().green(),
        summary.removals.to_string().red(),
        summary.errors.to_string().yellow()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markers_distinguish_dry_run() {
        colored::control::set_override(false);
        assert_eq!(result_marker(&ApplyResult::Changed, true), "~ would change");
        assert_eq!(result_marker(&ApplyResult::Changed, false), "✓ changed");
        assert_eq!(result_marker(&ApplyResult::NoChange, false), "○ ok");
        assert_eq!(
            result_marker(&ApplyResult::Failed { error: "x".into() }, false),
            "✗ failed"
        );
    }

    #[test]
    fn progress_counts_resources() {
        let mut progress = ApplyProgress::new(2, false);
        progress.on_resource_start("file", "/a");
        progress.on_resource_complete("file", "/a", &ApplyResult::NoChange);
        progress.on_resource_start("file", "/b");
        assert_eq!(progress.current, 2);
    }
}
