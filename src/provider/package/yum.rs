//! Fedora/RHEL packages through rpm and yum

use declarative::{Error, ExecOptions, Result};

use super::PackageManager;
use crate::provider::SharedRunner;

const QUERYFORMAT: &str = "%{VERSION}-%{RELEASE}\\n";

#[derive(Debug, Clone)]
pub struct Yum {
    runner: SharedRunner,
}

impl Yum {
    pub fn new(runner: SharedRunner) -> Self {
        Self { runner }
    }
}

/// `wanted` names either the full `version-release` or just the version
fn version_matches(installed: &str, wanted: &str) -> bool {
    installed == wanted
        || installed
            .strip_prefix(wanted)
            .is_some_and(|release| release.starts_with('-'))
}

impl PackageManager for Yum {
    fn provider_name(&self) -> &'static str {
        "yum"
    }

    fn installed_versions(&self, name: &str, version: Option<&str>) -> Result<Vec<String>> {
        let output = self
            .runner
            .run("rpm", &["-q", "--queryformat", QUERYFORMAT, name], &[])?;

        // rpm reports on stdout, including "package x is not installed"
        let stdout = output.stdout_str();
        if !output.success {
            if stdout.contains("is not installed") {
                return Ok(Vec::new());
            }
            return Err(Error::command_failed(
                format!("failed to query package '{name}'"),
                &stdout,
            ));
        }

        let versions = stdout
            .lines()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .filter(|v| version.is_none_or(|wanted| version_matches(v, wanted)))
            .map(str::to_string)
            .collect();
        Ok(versions)
    }

    fn install(&self, name: &str, version: Option<&str>) -> Result<()> {
        let package = match version {
            Some(version) => format!("{name}-{version}"),
            None => name.to_string(),
        };
        self.runner
            .exec_or_fail(
                "yum",
                &["install", "-y", &package],
                &format!("failed to install package '{package}'"),
                ExecOptions::default(),
            )
            .map(drop)
    }

    fn remove(&self, name: &str) -> Result<()> {
        self.runner
            .exec_or_fail(
                "yum",
                &["remove", "-y", name],
                &format!("failed to remove package '{name}'"),
                ExecOptions::default(),
            )
            .map(drop)
    }
}
