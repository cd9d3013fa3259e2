//! keel: declarative, idempotent configuration management
//!
//! Resources describe the desired state of files, directories, symlinks,
//! users, groups and packages; providers from [`provider`] converge the live
//! system to it. See [`dsl::Dsl`] for programmatic use and [`manifest`] for
//! the TOML format the `keel` binary reads.

pub mod attrs;
pub mod config;
pub mod dsl;
pub mod engine;
pub mod manifest;
pub mod paths;
pub mod platform;
pub mod provider;
pub mod resource;
pub mod runner;
pub mod ui;

pub use dsl::Dsl;
pub use resource::{DirectorySpec, FileSpec, GroupSpec, PackageSpec, SymlinkSpec, UserSpec};
