//! Debian/Ubuntu packages through dpkg-query and apt-get

use declarative::{Error, ExecOptions, Result};

use super::PackageManager;
use crate::provider::SharedRunner;

const SHOWFORMAT: &str = "--showformat=${db:Status-Abbrev}${Version}\\n";
const ENV: &[(&str, &str)] = &[("DEBIAN_FRONTEND", "noninteractive")];

#[derive(Debug, Clone)]
pub struct Apt {
    runner: SharedRunner,
}

impl Apt {
    pub fn new(runner: SharedRunner) -> Self {
        Self { runner }
    }
}

/// Parse `${db:Status-Abbrev}${Version}` lines, keeping installed (`ii`) ones
fn parse_status(output: &str) -> Result<Vec<String>> {
    let mut versions = Vec::new();
    for line in output.lines().filter(|l| !l.trim().is_empty()) {
        let status: String = line.chars().take(3).collect();
        let flags: Vec<char> = status.trim_end().chars().collect();
        if flags.len() < 2 || !flags.iter().all(char::is_ascii_alphabetic) {
            return Err(Error::MalformedOutput {
                command: "dpkg-query".to_string(),
                message: format!("unexpected status line '{line}'"),
            });
        }
        if flags[..2] == ['i', 'i'] {
            let version = line.get(3..).unwrap_or_default().trim();
            if !version.is_empty() {
                versions.push(version.to_string());
            }
        }
    }
    Ok(versions)
}

impl PackageManager for Apt {
    fn provider_name(&self) -> &'static str {
        "apt"
    }

    fn installed_versions(&self, name: &str, version: Option<&str>) -> Result<Vec<String>> {
        let output = self
            .runner
            .run("dpkg-query", &["--show", SHOWFORMAT, name], &[])?;
        // dpkg-query exits 1 for packages it has never heard of, 2 on real errors
        if !output.success {
            let stderr = output.stderr_str();
            if output.code == Some(1) || stderr.contains("no packages found") {
                return Ok(Vec::new());
            }
            return Err(Error::command_failed(
                format!("failed to query package '{name}'"),
                &stderr,
            ));
        }

        let mut versions = parse_status(&output.stdout_str())?;
        if let Some(wanted) = version {
            versions.retain(|v| v == wanted);
        }
        Ok(versions)
    }

    fn install(&self, name: &str, version: Option<&str>) -> Result<()> {
        let package = match version {
            Some(version) => format!("{name}={version}"),
            None => name.to_string(),
        };
        self.runner
            .exec_or_fail(
                "apt-get",
                &["install", "-y", "-q", &package],
                &format!("failed to install package '{package}'"),
                ExecOptions::with_env(ENV),
            )
            .map(drop)
    }

    fn remove(&self, name: &str) -> Result<()> {
        self.runner
            .exec_or_fail(
                "apt-get",
                &["remove", "-y", "-q", name],
                &format!("failed to remove package '{name}'"),
                ExecOptions::with_env(ENV),
            )
            .map(drop)
    }
}
