//! POSIX symlink provider

use declarative::{Error, Mechanism, Provider, Reconciler, Result};
use std::fs;
use std::io;
use std::os::unix::fs::symlink;
use std::path::PathBuf;

use super::{Factory, Kind, ProviderEnv, ResourceSpec};
use crate::attrs::{FilePermissions, FileType};
use crate::resource::SymlinkSpec;

#[derive(Debug)]
pub struct Symlink {
    path: PathBuf,
    target: PathBuf,
    permissions: FilePermissions,
}

impl Symlink {
    pub fn new(spec: &SymlinkSpec) -> Result<Self> {
        let path = spec.path();
        let permissions = FilePermissions::new(
            &path,
            FileType::Link,
            None,
            spec.owner.as_deref(),
            spec.group.as_deref(),
        )?;
        Ok(Self {
            path,
            target: PathBuf::from(&spec.target),
            permissions,
        })
    }

    fn points_at_target(&self) -> Result<bool> {
        let current = fs::read_link(&self.path).map_err(|e| Error::io(&self.path, e))?;
        Ok(current == self.target)
    }

    fn link(&self) -> Result<()> {
        symlink(&self.target, &self.path).map_err(|e| Error::io(&self.path, e))
    }
}

impl Mechanism for Symlink {
    fn kind(&self) -> &'static str {
        Kind::Symlink.as_str()
    }

    fn provider_name(&self) -> &'static str {
        "posix"
    }

    fn target(&self) -> String {
        self.path.display().to_string()
    }

    fn exists(&self) -> Result<bool> {
        match fs::symlink_metadata(&self.path) {
            Ok(meta) if meta.file_type().is_symlink() => Ok(true),
            Ok(_) => Err(Error::Conflict {
                path: self.path.clone(),
                expected: "symlink",
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::io(&self.path, e)),
        }
    }

    fn in_sync(&self) -> Result<bool> {
        Ok(self.points_at_target()? && self.permissions.uptodate()?)
    }

    fn create(&self) -> Result<()> {
        self.link()?;
        self.permissions.update()
    }

    /// Relink when the destination differs
    ///
    /// `remove_file` unlinks the symlink itself, never a directory it
    /// points at.
    fn update(&self) -> Result<()> {
        if !self.points_at_target()? {
            fs::remove_file(&self.path).map_err(|e| Error::io(&self.path, e))?;
            self.link()?;
        }
        self.permissions.update()
    }

    fn remove(&self) -> Result<()> {
        fs::remove_file(&self.path).map_err(|e| Error::io(&self.path, e))
    }
}

fn posix(spec: SymlinkSpec, env: &ProviderEnv) -> Result<Box<dyn Provider>> {
    Ok(Box::new(Reconciler::new(
        Symlink::new(&spec)?,
        env.dry_run.clone(),
    )))
}

const PROVIDERS: &[(&str, Factory<SymlinkSpec>)] = &[("posix", posix)];

impl ResourceSpec for SymlinkSpec {
    const KIND: Kind = Kind::Symlink;

    fn providers() -> &'static [(&'static str, Factory<Self>)] {
        PROVIDERS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::{Action, DryRun};
    use std::path::Path;
    use tempfile::TempDir;

    fn provider(link: &Path, target: &Path) -> Reconciler<Symlink> {
        let spec = SymlinkSpec::new(link.to_string_lossy(), target.to_string_lossy());
        Reconciler::new(Symlink::new(&spec).unwrap(), DryRun::new())
    }

    #[test]
    fn create_links_once() {
        let tmp = TempDir::new().unwrap();
        let link = tmp.path().join("baz");
        let target = tmp.path().join("qux");

        let mut res = provider(&link, &target);
        res.run(Action::Create).unwrap();
        assert!(res.take_updated());
        assert_eq!(fs::read_link(&link).unwrap(), target);

        res.run(Action::Create).unwrap();
        assert!(!res.take_updated());
    }

    #[test]
    fn wrong_target_is_relinked() {
        let tmp = TempDir::new().unwrap();
        let link = tmp.path().join("baz");
        let old = tmp.path().join("qux");
        let new = tmp.path().join("quux");
        symlink(&old, &link).unwrap();

        let mut res = provider(&link, &new);
        assert!(res.mechanism().exists().unwrap());
        assert!(!res.uptodate(Action::Create).unwrap());

        res.run(Action::Create).unwrap();
        assert!(res.take_updated());
        assert_eq!(fs::read_link(&link).unwrap(), new);
    }

    #[test]
    fn link_to_directory_is_replaced_not_traversed() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("dir");
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("inside"), "").unwrap();
        let link = tmp.path().join("link");
        symlink(&dir, &link).unwrap();

        let mut res = provider(&link, &tmp.path().join("elsewhere"));
        res.run(Action::Create).unwrap();
        assert!(dir.join("inside").exists());
        assert!(!dir.join("elsewhere").exists());
        assert_eq!(fs::read_link(&link).unwrap(), tmp.path().join("elsewhere"));
    }

    #[test]
    fn comparison_is_literal() {
        let tmp = TempDir::new().unwrap();
        let link = tmp.path().join("rel");
        symlink("target", &link).unwrap();

        let res = provider(&link, &tmp.path().join("target"));
        assert!(!res.uptodate(Action::Create).unwrap());
    }

    #[test]
    fn regular_file_is_a_conflict() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("file");
        fs::write(&path, "data").unwrap();

        let mut res = provider(&path, Path::new("/etc/hosts"));
        assert!(matches!(
            res.run(Action::Create),
            Err(Error::Conflict { expected: "symlink", .. })
        ));
        assert_eq!(fs::read_to_string(&path).unwrap(), "data");
    }

    #[test]
    fn remove_unlinks() {
        let tmp = TempDir::new().unwrap();
        let link = tmp.path().join("l");
        let target = tmp.path().join("t");
        symlink(&target, &link).unwrap();

        let mut res = provider(&link, &target);
        res.run(Action::Remove).unwrap();
        assert!(res.take_updated());
        assert!(fs::symlink_metadata(&link).is_err());
    }
}
