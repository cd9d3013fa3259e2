//! Attribute and identity resolution used by the filesystem providers
//!
//! - [`FileOwner`]: `user:group` parsing
//! - [`Mode`]: octal and symbolic mode notation
//! - [`FilePermissions`]: desired mode/ownership for one path
//! - [`ids`]: name to uid/gid resolution and the process umask

pub mod ids;
pub mod mode;
pub mod owner;
pub mod permissions;

pub use mode::Mode;
pub use owner::FileOwner;
pub use permissions::{FilePermissions, FileType};
