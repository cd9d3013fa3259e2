//! POSIX directory provider

use declarative::{Error, Mechanism, Provider, Reconciler, Result};
use std::fs;
use std::io;
use std::path::PathBuf;

use super::{Factory, Kind, ProviderEnv, ResourceSpec};
use crate::attrs::{FilePermissions, FileType};
use crate::resource::DirectorySpec;

#[derive(Debug)]
pub struct Directory {
    path: PathBuf,
    permissions: FilePermissions,
}

impl Directory {
    pub fn new(spec: &DirectorySpec) -> Result<Self> {
        let path = spec.path();
        let permissions = FilePermissions::new(
            &path,
            FileType::Directory,
            spec.mode.as_deref(),
            spec.owner.as_deref(),
            spec.group.as_deref(),
        )?;
        Ok(Self { path, permissions })
    }
}

impl Mechanism for Directory {
    fn kind(&self) -> &'static str {
        Kind::Directory.as_str()
    }

    fn provider_name(&self) -> &'static str {
        "posix"
    }

    fn target(&self) -> String {
        self.path.display().to_string()
    }

    fn exists(&self) -> Result<bool> {
        match fs::metadata(&self.path) {
            Ok(meta) if meta.is_dir() => Ok(true),
            Ok(_) => Err(Error::Conflict {
                path: self.path.clone(),
                expected: "directory",
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::io(&self.path, e)),
        }
    }

    fn in_sync(&self) -> Result<bool> {
        self.permissions.uptodate()
    }

    fn create(&self) -> Result<()> {
        fs::create_dir_all(&self.path).map_err(|e| Error::io(&self.path, e))?;
        self.permissions.update()
    }

    fn update(&self) -> Result<()> {
        self.permissions.update()
    }

    /// Non-recursive: a directory with entries fails with the OS error
    fn remove(&self) -> Result<()> {
        fs::remove_dir(&self.path).map_err(|e| Error::io(&self.path, e))
    }
}

fn posix(spec: DirectorySpec, env: &ProviderEnv) -> Result<Box<dyn Provider>> {
    Ok(Box::new(Reconciler::new(
        Directory::new(&spec)?,
        env.dry_run.clone(),
    )))
}

const PROVIDERS: &[(&str, Factory<DirectorySpec>)] = &[("posix", posix)];

impl ResourceSpec for DirectorySpec {
    const KIND: Kind = Kind::Directory;

    fn providers() -> &'static [(&'static str, Factory<Self>)] {
        PROVIDERS
    }
}
