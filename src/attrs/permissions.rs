//! Mode and ownership of one filesystem entry.

use declarative::{Error, Result};
use std::fs::{self, Metadata, Permissions};
use std::io;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};

use super::ids::{resolve_gid, resolve_uid, umask};
use super::mode::Mode;
use super::owner::FileOwner;

/// Kind of entry the permissions apply to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    File,
    Directory,
    /// A symlink itself; mode is not managed, ownership uses lchown
    Link,
}

/// Desired mode and ownership for a path
///
/// Every field is optional; an unset field is never checked or changed.
/// Owner and group names are resolved to ids each time they are compared or
/// applied, so an account created earlier in the same run is found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePermissions {
    path: PathBuf,
    file_type: FileType,
    user: Option<String>,
    group: Option<String>,
    mode: Option<Mode>,
}

impl FilePermissions {
    /// Normalize mode/owner/group attributes
    ///
    /// `owner` may carry a group (`user:group`); an explicit `group` wins.
    pub fn new(
        path: impl Into<PathBuf>,
        file_type: FileType,
        mode: Option<&str>,
        owner: Option<&str>,
        group: Option<&str>,
    ) -> Result<Self> {
        let owner = owner.map(FileOwner::parse).transpose()?.unwrap_or_default();
        let group = group.map(str::to_string).or(owner.group);

        Ok(Self {
            path: path.into(),
            file_type,
            user: owner.user,
            group,
            mode: mode.map(Mode::parse).transpose()?,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Desired uid; fails with [`Error::UnknownUser`] for a name with no account
    pub fn uid(&self) -> Result<Option<u32>> {
        self.user.as_deref().map(resolve_uid).transpose()
    }

    /// Desired gid; fails with [`Error::UnknownGroup`] for a name with no group
    pub fn gid(&self) -> Result<Option<u32>> {
        self.group.as_deref().map(resolve_gid).transpose()
    }

    /// Whether any attribute is managed at all
    pub fn is_managed(&self) -> bool {
        self.user.is_some() || self.group.is_some() || self.managed_mode().is_some()
    }

    fn managed_mode(&self) -> Option<&Mode> {
        match self.file_type {
            FileType::Link => None,
            _ => self.mode.as_ref(),
        }
    }

    /// Mode a freshly created entry of this type gets under the current umask
    pub fn default_mode(file_type: FileType) -> u32 {
        let base = match file_type {
            FileType::Directory => 0o777,
            FileType::File | FileType::Link => 0o666,
        };
        base & !umask()
    }

    /// Numeric mode wanted for the entry, resolved against its live mode
    /// (or the default mode when it does not exist yet)
    pub fn desired_mode(&self) -> Result<Option<u32>> {
        let Some(mode) = self.managed_mode() else {
            return Ok(None);
        };
        let base = match self.metadata()? {
            Some(meta) => meta.mode() & 0o7777,
            None => Self::default_mode(self.file_type),
        };
        Ok(Some(mode.apply(base, self.file_type == FileType::Directory)))
    }

    fn metadata(&self) -> Result<Option<Metadata>> {
        let result = match self.file_type {
            FileType::Link => fs::symlink_metadata(&self.path),
            _ => fs::metadata(&self.path),
        };
        match result {
            Ok(meta) => Ok(Some(meta)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::io(&self.path, e)),
        }
    }

    /// Whether the live entry already has every managed attribute
    pub fn uptodate(&self) -> Result<bool> {
        let Some(meta) = self.metadata()? else {
            return Ok(!self.is_managed());
        };

        if self.uid()?.is_some_and(|uid| uid != meta.uid()) {
            return Ok(false);
        }
        if self.gid()?.is_some_and(|gid| gid != meta.gid()) {
            return Ok(false);
        }
        if let Some(mode) = self.desired_mode()?
            && mode != meta.mode() & 0o7777
        {
            return Ok(false);
        }
        Ok(true)
    }

    /// Apply the managed attributes that differ from the live entry
    ///
    /// Ownership goes first: chown may clear setuid/setgid bits.
    pub fn update(&self) -> Result<()> {
        let Some(meta) = self.metadata()? else {
            return Err(Error::io(
                &self.path,
                io::Error::from(io::ErrorKind::NotFound),
            ));
        };

        let uid = self.uid()?.filter(|uid| *uid != meta.uid());
        let gid = self.gid()?.filter(|gid| *gid != meta.gid());
        if uid.is_some() || gid.is_some() {
            let chown: fn(&Path, Option<u32>, Option<u32>) -> io::Result<()> =
                match self.file_type {
                    FileType::Link => |p, u, g| std::os::unix::fs::lchown(p, u, g),
                    _ => |p, u, g| std::os::unix::fs::chown(p, u, g),
                };
            chown(&self.path, uid, gid).map_err(|e| Error::io(&self.path, e))?;
        }

        if let Some(mode) = self.desired_mode()? {
            let current = self.metadata()?.map_or(0, |m| m.mode() & 0o7777);
            if mode != current {
                fs::set_permissions(&self.path, Permissions::from_mode(mode))
                    .map_err(|e| Error::io(&self.path, e))?;
            }
        }
        Ok(())
    }
}
