//! One-call entry points for declaring resources from Rust
//!
//! ```ignore
//! let dsl = Dsl::new(ProviderRegistry::new(platform::detect()), DryRun::global().clone());
//! dsl.directory(DirectorySpec { mode: Some("755".into()), ..DirectorySpec::new("~/src") },
//!     ResourceOptions::default())?;
//! dsl.package(PackageSpec::new("htop"), ResourceOptions::default())?;
//! ```

use declarative::{CommandRunner, DryRun, Resource, ResourceOptions, Result};
use std::sync::Arc;

use crate::provider::{ProviderEnv, ProviderRegistry, ResourceSpec};
use crate::resource::{
    self, DirectorySpec, FileSpec, GroupSpec, PackageSpec, SymlinkSpec, UserSpec, Validate,
};
use crate::runner::SystemRunner;

/// Registry plus the environment every provider is built with
#[derive(Debug, Clone)]
pub struct Dsl {
    registry: ProviderRegistry,
    env: ProviderEnv,
}

impl Dsl {
    /// Run commands on the local system
    pub fn new(registry: ProviderRegistry, dry_run: DryRun) -> Self {
        Self::with_runner(registry, dry_run, Arc::new(SystemRunner))
    }

    pub fn with_runner(
        registry: ProviderRegistry,
        dry_run: DryRun,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            registry,
            env: ProviderEnv::new(dry_run, runner),
        }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn env(&self) -> &ProviderEnv {
        &self.env
    }

    pub fn dry_run(&self) -> &DryRun {
        &self.env.dry_run
    }

    /// Build a resource without running it
    pub fn resource<S>(&self, spec: S, options: ResourceOptions) -> Result<Resource>
    where
        S: ResourceSpec + Validate,
    {
        resource::build(spec, options, &self.registry, &self.env)
    }

    /// Build a resource and run its action, reporting whether it changed anything
    pub fn apply<S>(&self, spec: S, options: ResourceOptions) -> Result<bool>
    where
        S: ResourceSpec + Validate,
    {
        self.resource(spec, options)?.run()
    }

    pub fn directory(&self, spec: DirectorySpec, options: ResourceOptions) -> Result<bool> {
        self.apply(spec, options)
    }

    pub fn file(&self, spec: FileSpec, options: ResourceOptions) -> Result<bool> {
        self.apply(spec, options)
    }

    pub fn symlink(&self, spec: SymlinkSpec, options: ResourceOptions) -> Result<bool> {
        self.apply(spec, options)
    }

    pub fn group(&self, spec: GroupSpec, options: ResourceOptions) -> Result<bool> {
        self.apply(spec, options)
    }

    pub fn user(&self, spec: UserSpec, options: ResourceOptions) -> Result<bool> {
        self.apply(spec, options)
    }

    pub fn package(&self, spec: PackageSpec, options: ResourceOptions) -> Result<bool> {
        self.apply(spec, options)
    }
}
