//! Providers and the provider registry
//!
//! Every platform implementation is a [`declarative::Mechanism`] wrapped in a
//! [`declarative::Reconciler`]. Kinds publish a static table of
//! `(provider name, factory)` pairs; [`ProviderRegistry`] picks the name from
//! a per-kind override or the platform default and calls the factory.

pub mod directory;
pub mod dscl;
pub mod file;
pub mod group;
pub mod package;
pub mod symlink;
pub mod user;
pub mod useradd;

use declarative::{Action, CommandRunner, DryRun, Provider, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Deref;
use std::str::FromStr;
use std::sync::Arc;

use crate::platform::Platform;

/// Resource kinds keel manages
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Directory,
    File,
    Symlink,
    Group,
    User,
    Package,
}

impl Kind {
    pub const ALL: [Kind; 6] = [
        Kind::Directory,
        Kind::File,
        Kind::Symlink,
        Kind::Group,
        Kind::User,
        Kind::Package,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Directory => "directory",
            Self::File => "file",
            Self::Symlink => "symlink",
            Self::Group => "group",
            Self::User => "user",
            Self::Package => "package",
        }
    }

    /// The action that brings an entity of this kind into existence
    pub fn present_action(&self) -> Action {
        match self {
            Self::Package => Action::Install,
            _ => Action::Create,
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Kind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown resource kind '{s}'"))
    }
}

/// Shared command runner handed to every account and package provider
#[derive(Clone)]
pub struct SharedRunner(Arc<dyn CommandRunner>);

impl SharedRunner {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self(runner)
    }
}

impl fmt::Debug for SharedRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedRunner")
    }
}

impl Deref for SharedRunner {
    type Target = dyn CommandRunner;

    fn deref(&self) -> &Self::Target {
        &*self.0
    }
}

/// What every provider is constructed with
#[derive(Debug, Clone)]
pub struct ProviderEnv {
    pub dry_run: DryRun,
    pub runner: SharedRunner,
}

impl ProviderEnv {
    pub fn new(dry_run: DryRun, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            dry_run,
            runner: SharedRunner::new(runner),
        }
    }
}

/// Builds a provider for one desired-state spec
pub type Factory<S> = fn(S, &ProviderEnv) -> Result<Box<dyn Provider>>;

/// A desired-state type the registry can resolve a provider for
pub trait ResourceSpec: Sized + 'static {
    const KIND: Kind;

    /// Every provider that can manage this kind, by registry name
    fn providers() -> &'static [(&'static str, Factory<Self>)];
}

/// Default provider name for a kind on a platform
pub fn default_provider(platform: Platform, kind: Kind) -> Option<&'static str> {
    use Platform::{Debian, Fedora, Linux, OpenBsd, Osx, Rhel, Ubuntu, Unknown};

    match (kind, platform) {
        (_, Unknown) => None,
        (Kind::Directory | Kind::File | Kind::Symlink, _) => Some("posix"),
        (Kind::Group | Kind::User, Debian | Ubuntu | Fedora | Rhel) => Some("gnu_passwd"),
        (Kind::Group | Kind::User, Linux) => Some("gnu"),
        (Kind::Group | Kind::User, Osx) => Some("macos"),
        (Kind::Group | Kind::User, OpenBsd) => Some("openbsd"),
        (Kind::Package, Debian | Ubuntu) => Some("apt"),
        (Kind::Package, Fedora | Rhel) => Some("yum"),
        (Kind::Package, Osx) => Some("brew"),
        (Kind::Package, OpenBsd) => Some("pkg_add"),
        (Kind::Package, Linux) => None,
    }
}

/// Maps resource kinds to provider names
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    platform: Platform,
    overrides: BTreeMap<Kind, String>,
}

impl ProviderRegistry {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            overrides: BTreeMap::new(),
        }
    }

    /// Use `provider` for every resource of `kind`, whatever the platform
    pub fn with_override(mut self, kind: Kind, provider: impl Into<String>) -> Self {
        self.overrides.insert(kind, provider.into());
        self
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn provider_name(&self, kind: Kind) -> Option<&str> {
        self.overrides
            .get(&kind)
            .map(String::as_str)
            .or_else(|| default_provider(self.platform, kind))
    }

    /// Every provider name known for `kind`
    pub fn available(kind: Kind) -> Vec<&'static str> {
        use crate::resource::{
            DirectorySpec, FileSpec, GroupSpec, PackageSpec, SymlinkSpec, UserSpec,
        };

        fn names<S: ResourceSpec>() -> Vec<&'static str> {
            S::providers().iter().map(|(name, _)| *name).collect()
        }

        match kind {
            Kind::Directory => names::<DirectorySpec>(),
            Kind::File => names::<FileSpec>(),
            Kind::Symlink => names::<SymlinkSpec>(),
            Kind::Group => names::<GroupSpec>(),
            Kind::User => names::<UserSpec>(),
            Kind::Package => names::<PackageSpec>(),
        }
    }

    /// Construct the provider for `spec`
    ///
    /// `Ok(None)` when no provider is configured for the kind or the
    /// configured name is unknown; both are logged as warnings.
    pub fn resolve<S: ResourceSpec>(
        &self,
        spec: S,
        env: &ProviderEnv,
    ) -> Result<Option<Box<dyn Provider>>> {
        let kind = S::KIND;
        let Some(name) = self.provider_name(kind) else {
            log::warn!("No {kind} provider for platform {}", self.platform);
            return Ok(None);
        };

        match S::providers().iter().find(|(candidate, _)| *candidate == name) {
            Some((_, factory)) => factory(spec, env).map(Some),
            None => {
                log::warn!("Unknown {kind} provider '{name}'");
                Ok(None)
            }
        }
    }
}
