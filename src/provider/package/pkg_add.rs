//! OpenBSD packages through pkg_info, pkg_add and pkg_delete

use declarative::{Error, ExecOptions, Result};

use super::PackageManager;
use crate::provider::SharedRunner;

#[derive(Debug, Clone)]
pub struct PkgAdd {
    runner: SharedRunner,
}

impl PkgAdd {
    pub fn new(runner: SharedRunner) -> Self {
        Self { runner }
    }
}

/// `pkg_info -e` prints one `inst:<name>-<version>[-flavor]` line per match
fn parse_matches(name: &str, output: &str) -> Result<Vec<String>> {
    let prefix = format!("{name}-");
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|line| {
            let stem = line.strip_prefix("inst:").unwrap_or(line);
            stem.strip_prefix(&prefix)
                .map(str::to_string)
                .ok_or_else(|| Error::MalformedOutput {
                    command: format!("pkg_info -e {name}"),
                    message: format!("unexpected line '{line}'"),
                })
        })
        .collect()
}

impl PackageManager for PkgAdd {
    fn provider_name(&self) -> &'static str {
        "pkg_add"
    }

    fn installed_versions(&self, name: &str, version: Option<&str>) -> Result<Vec<String>> {
        let pattern = format!("{name}-{}", version.unwrap_or("*"));
        let output = self.runner.run("pkg_info", &["-e", &pattern], &[])?;
        // pkg_info -e exits 1 silently when nothing matches
        if !output.success {
            let stderr = output.stderr_str();
            if output.code == Some(1) && stderr.trim().is_empty() {
                return Ok(Vec::new());
            }
            return Err(Error::command_failed(
                format!("failed to query package '{name}'"),
                &stderr,
            ));
        }
        parse_matches(name, &output.stdout_str())
    }

    fn install(&self, name: &str, version: Option<&str>) -> Result<()> {
        let package = match version {
            Some(version) => format!("{name}-{version}"),
            None => name.to_string(),
        };
        self.runner
            .exec_or_fail(
                "pkg_add",
                &[&package],
                &format!("failed to install package '{package}'"),
                ExecOptions::default(),
            )
            .map(drop)
    }

    fn remove(&self, name: &str) -> Result<()> {
        self.runner
            .exec_or_fail(
                "pkg_delete",
                &[name],
                &format!("failed to remove package '{name}'"),
                ExecOptions::default(),
            )
            .map(drop)
    }
}
