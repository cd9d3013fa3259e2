//! # Declarative
//!
//! A framework for declarative, idempotent resource management.
//!
//! This crate provides the core abstractions for declaring desired state,
//! checking it against the live system, and converging the system to match.
//!
//! ## Core Concepts
//!
//! - **Resource**: desired state for one OS entity, bound to one provider
//! - **Provider**: the reconciliation engine for a resource
//! - **Mechanism**: the platform-specific half of a provider (existence
//!   check, attribute comparison, create, update, remove)
//! - **Reconciler**: the generic half, shared by every mechanism
//! - **DryRun**: a scoped flag under which providers only report changes
//!
//! ## Example
//!
//! ```ignore
//! use declarative::{Action, DryRun, Mechanism, Reconciler, Resource, ResourceOptions};
//!
//! #[derive(Debug)]
//! struct Marker { path: std::path::PathBuf }
//!
//! impl Mechanism for Marker {
//!     fn kind(&self) -> &'static str { "marker" }
//!     fn provider_name(&self) -> &'static str { "posix" }
//!     fn target(&self) -> String { self.path.display().to_string() }
//!     fn exists(&self) -> declarative::Result<bool> { Ok(self.path.exists()) }
//!     fn in_sync(&self) -> declarative::Result<bool> { Ok(true) }
//!     fn create(&self) -> declarative::Result<()> {
//!         std::fs::write(&self.path, "").map_err(|e| declarative::Error::io(&self.path, e))
//!     }
//!     fn update(&self) -> declarative::Result<()> { Ok(()) }
//!     fn remove(&self) -> declarative::Result<()> {
//!         std::fs::remove_file(&self.path).map_err(|e| declarative::Error::io(&self.path, e))
//!     }
//! }
//!
//! let dry_run = DryRun::new();
//! let provider = Reconciler::new(Marker { path: "/tmp/marker".into() }, dry_run.clone());
//! let mut resource = Resource::new(
//!     "marker", "/tmp/marker", Action::Create,
//!     Some(Box::new(provider)), ResourceOptions::default(), dry_run,
//! );
//! assert!(resource.run()?);
//! assert!(!resource.run()?);
//! ```
//!
//! ## Seams
//!
//! - [`CommandRunner`]: executes external commands for platform mechanisms
//! - [`ProgressCallback`]: receives progress updates from the executor
//!
//! This allows the crate to be used without hard dependencies on a
//! process-spawning implementation or a UI.

pub mod context;
pub mod diff;
pub mod error;
pub mod executor;
pub mod provider;
pub mod resource;
pub mod types;

// Re-export main types at crate root
pub use context::{CommandRunner, DryRun, DryRunGuard, ExecOptions};
pub use diff::{DriftSummary, ResourceDrift, compute_drift, group_by_kind};
pub use error::{Error, Result};
pub use executor::{NoProgress, ProgressCallback, Runnable, execute, execute_simple};
pub use provider::{Mechanism, Provider, Reconciler, UpdateFlag};
pub use resource::{Resource, ResourceOptions, UpdateCallback};
pub use types::{Action, ApplyResult, CommandOutput, ExecuteOptions, ExecuteSummary};
