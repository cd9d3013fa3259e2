//! Homebrew formulae

use declarative::{Error, ExecOptions, Result};
use serde::Deserialize;

use super::PackageManager;
use crate::provider::SharedRunner;

#[derive(Debug, Clone)]
pub struct Brew {
    runner: SharedRunner,
}

impl Brew {
    pub fn new(runner: SharedRunner) -> Self {
        Self { runner }
    }
}

#[derive(Deserialize)]
struct BrewInfo {
    #[serde(default)]
    formulae: Vec<Formula>,
}

#[derive(Deserialize)]
struct Formula {
    #[serde(default)]
    installed: Vec<Installed>,
}

#[derive(Deserialize)]
struct Installed {
    version: String,
}

fn parse_info(json: &str) -> Result<Vec<String>> {
    let info: BrewInfo = serde_json::from_str(json).map_err(|e| Error::MalformedOutput {
        command: "brew info --json=v2".to_string(),
        message: e.to_string(),
    })?;
    Ok(info
        .formulae
        .into_iter()
        .flat_map(|f| f.installed)
        .map(|i| i.version)
        .collect())
}

impl PackageManager for Brew {
    fn provider_name(&self) -> &'static str {
        "brew"
    }

    /// Versions cannot be pinned; `version` is ignored
    fn installed_versions(&self, name: &str, _version: Option<&str>) -> Result<Vec<String>> {
        let output = self
            .runner
            .run("brew", &["info", "--json=v2", "--formula", name], &[])?;
        if !output.success {
            let stderr = output.stderr_str();
            if stderr.contains("No available formula") {
                return Ok(Vec::new());
            }
            return Err(Error::command_failed(
                format!("failed to query package '{name}'"),
                &stderr,
            ));
        }
        parse_info(&output.stdout_str())
    }

    fn install(&self, name: &str, _version: Option<&str>) -> Result<()> {
        self.runner
            .exec_or_fail(
                "brew",
                &["install", name],
                &format!("failed to install package '{name}'"),
                ExecOptions::default(),
            )
            .map(drop)
    }

    fn remove(&self, name: &str) -> Result<()> {
        self.runner
            .exec_or_fail(
                "brew",
                &["uninstall", name],
                &format!("failed to remove package '{name}'"),
                ExecOptions::default(),
            )
            .map(drop)
    }
}
