//! keel.toml: platform override and per-kind provider overrides
//!
//! ```toml
//! platform = "debian"
//!
//! [providers]
//! package = "brew"
//! ```

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::paths;
use crate::platform::{self, Platform};
use crate::provider::{Kind, ProviderRegistry};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Platform name, overriding detection
    #[serde(default)]
    pub platform: Option<String>,
    /// Provider name per resource kind, overriding the platform default
    #[serde(default)]
    pub providers: BTreeMap<String, String>,
}

impl Config {
    /// Load the config file from the config directory; a missing file is the default config
    pub fn load() -> Result<Self> {
        let path = paths::config_file()?;
        if !path.exists() {
            log::debug!("No config file at {}", path.display());
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if let Some(name) = &self.platform {
            name.parse::<Platform>().map_err(|e| anyhow!(e))?;
        }
        self.overrides().map(|_| ())
    }

    fn overrides(&self) -> Result<Vec<(Kind, &str)>> {
        self.providers
            .iter()
            .map(|(kind, provider)| {
                let kind: Kind = kind.parse().map_err(|e: String| anyhow!(e))?;
                if provider.trim().is_empty() {
                    bail!("Empty provider name for {kind}");
                }
                Ok((kind, provider.as_str()))
            })
            .collect()
    }

    /// Platform to use: `cli` first, then the config file, then detection
    pub fn platform(&self, cli: Option<Platform>) -> Result<Platform> {
        if let Some(platform) = cli {
            return Ok(platform);
        }
        match &self.platform {
            Some(name) => name.parse().map_err(|e: String| anyhow!(e)),
            None => Ok(platform::detect()),
        }
    }

    /// Provider registry for `platform` with this config's overrides applied
    pub fn registry(&self, platform: Platform) -> Result<ProviderRegistry> {
        Ok(self
            .overrides()?
            .into_iter()
            .fold(ProviderRegistry::new(platform), |registry, (kind, name)| {
                registry.with_override(kind, name)
            }))
    }
}
