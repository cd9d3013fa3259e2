//! POSIX file provider
//!
//! Content is written to a temporary file in the destination's directory and
//! renamed into place, so readers never observe a partial write.

use declarative::{Error, Mechanism, Provider, Reconciler, Result};
use std::fs::{self, Permissions};
use std::io::{self, Write};
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};

use super::{Factory, Kind, ProviderEnv, ResourceSpec};
use crate::attrs::{FilePermissions, FileType, ids};
use crate::resource::FileSpec;

#[derive(Debug)]
pub struct File {
    path: PathBuf,
    content: Option<String>,
    permissions: FilePermissions,
}

impl File {
    pub fn new(spec: &FileSpec) -> Result<Self> {
        let path = spec.path();
        let permissions = FilePermissions::new(
            &path,
            FileType::File,
            spec.mode.as_deref(),
            spec.owner.as_deref(),
            spec.group.as_deref(),
        )?;
        Ok(Self {
            path,
            content: spec.content.clone(),
            permissions,
        })
    }

    /// Where content actually lands: the destination of a symlinked file
    fn write_path(&self) -> PathBuf {
        match fs::symlink_metadata(&self.path) {
            Ok(meta) if meta.file_type().is_symlink() => fs::canonicalize(&self.path)
                .or_else(|_| {
                    fs::read_link(&self.path).map(|dest| match self.path.parent() {
                        Some(parent) if dest.is_relative() => parent.join(dest),
                        _ => dest,
                    })
                })
                .unwrap_or_else(|_| self.path.clone()),
            _ => self.path.clone(),
        }
    }

    fn current_content(&self) -> Result<Option<Vec<u8>>> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::io(&self.path, e)),
        }
    }

    fn content_matches(&self) -> Result<bool> {
        let Some(wanted) = &self.content else {
            return Ok(true);
        };
        Ok(self
            .current_content()?
            .is_some_and(|current| blake3::hash(&current) == blake3::hash(wanted.as_bytes())))
    }

    fn write(&self, content: &[u8]) -> Result<()> {
        let dest = self.write_path();
        write_atomic(&dest, content).map_err(|e| Error::io(&dest, e))
    }
}

/// Ids to hand to fchown so a replacement keeps the old file's ownership
///
/// Only root can give a file to another user; anyone else keeps their own
/// uid and can at most carry the group over.
fn inherited_ids(old: (u32, u32), created: (u32, u32), euid: u32) -> (Option<u32>, Option<u32>) {
    let uid = (old.0 != created.0 && euid == 0).then_some(old.0);
    let gid = (old.1 != created.1).then_some(old.1);
    (uid, gid)
}

/// Replace `dest` with `content` via a sibling temporary file and rename
///
/// The replaced file's mode and ownership carry over as far as this process
/// is allowed to set them; a new file gets the umask default.
fn write_atomic(dest: &Path, content: &[u8]) -> io::Result<()> {
    let dir = match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::Builder::new()
        .prefix(".keel-")
        .tempfile_in(dir)?;
    tmp.write_all(content)?;
    tmp.as_file().sync_all()?;

    match fs::metadata(dest) {
        Ok(old) => {
            let created = tmp.as_file().metadata()?;
            let (uid, gid) = inherited_ids(
                (old.uid(), old.gid()),
                (created.uid(), created.gid()),
                ids::effective_uid(),
            );
            if uid.is_some() || gid.is_some() {
                match std::os::unix::fs::fchown(tmp.as_file(), uid, gid) {
                    Ok(()) => {}
                    Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                        log::debug!("{} keeps the writer's group: {e}", dest.display());
                    }
                    Err(e) => return Err(e),
                }
            }
            tmp.as_file()
                .set_permissions(Permissions::from_mode(old.mode() & 0o7777))?;
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tmp.as_file().set_permissions(Permissions::from_mode(
                FilePermissions::default_mode(FileType::File),
            ))?;
        }
        Err(e) => return Err(e),
    }

    tmp.persist(dest).map_err(|e| e.error)?;
    Ok(())
}

impl Mechanism for File {
    fn kind(&self) -> &'static str {
        Kind::File.as_str()
    }

    fn provider_name(&self) -> &'static str {
        "posix"
    }

    fn target(&self) -> String {
        self.path.display().to_string()
    }

    fn exists(&self) -> Result<bool> {
        match fs::metadata(&self.path) {
            Ok(meta) if meta.is_dir() => Err(Error::Conflict {
                path: self.path.clone(),
                expected: "file",
            }),
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::io(&self.path, e)),
        }
    }

    fn in_sync(&self) -> Result<bool> {
        Ok(self.content_matches()? && self.permissions.uptodate()?)
    }

    fn create(&self) -> Result<()> {
        self.write(self.content.as_deref().unwrap_or_default().as_bytes())?;
        self.permissions.update()
    }

    fn update(&self) -> Result<()> {
        if let Some(content) = &self.content
            && !self.content_matches()?
        {
            self.write(content.as_bytes())?;
        }
        self.permissions.update()
    }

    fn remove(&self) -> Result<()> {
        fs::remove_file(&self.path).map_err(|e| Error::io(&self.path, e))
    }

    fn preview(&self) {
        let Some(wanted) = &self.content else {
            return;
        };
        let current = match self.current_content() {
            Ok(Some(bytes)) => String::from_utf8_lossy(&bytes).into_owned(),
            Ok(None) => String::new(),
            Err(e) => {
                log::debug!("cannot diff {}: {e}", self.path.display());
                return;
            }
        };
        if current == *wanted {
            return;
        }

        let path = self.path.display().to_string();
        let diff = similar::TextDiff::from_lines(current.as_str(), wanted.as_str());
        log::debug!(
            "content diff for '{path}':\n{}",
            diff.unified_diff().header(&path, &path)
        );
    }
}

fn posix(spec: FileSpec, env: &ProviderEnv) -> Result<Box<dyn Provider>> {
    Ok(Box::new(Reconciler::new(
        File::new(&spec)?,
        env.dry_run.clone(),
    )))
}

const PROVIDERS: &[(&str, Factory<FileSpec>)] = &[("posix", posix)];

impl ResourceSpec for FileSpec {
    const KIND: Kind = Kind::File;

    fn providers() -> &'static [(&'static str, Factory<Self>)] {
        PROVIDERS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::{Action, DryRun};
    use tempfile::TempDir;

    fn provider(spec: FileSpec) -> Reconciler<File> {
        Reconciler::new(File::new(&spec).unwrap(), DryRun::new())
    }

    fn spec_at(path: &Path) -> FileSpec {
        FileSpec::new(path.to_string_lossy())
    }

    fn mode_of(path: &Path) -> u32 {
        fs::metadata(path).unwrap().permissions().mode() & 0o7777
    }

    #[test]
    fn create_writes_content_once() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("motd");
        let mut file = provider(spec_at(&path).content("hello\n"));

        file.run(Action::Create).unwrap();
        assert!(file.take_updated());
        assert_eq!(fs::read_to_string(&path).unwrap(), "hello\n");
        assert_eq!(mode_of(&path), FilePermissions::default_mode(FileType::File));

        file.run(Action::Create).unwrap();
        assert!(!file.take_updated());
    }

    #[test]
    fn unset_content_keeps_existing_content() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bar");
        fs::write(&path, "old").unwrap();
        fs::set_permissions(&path, Permissions::from_mode(0o600)).unwrap();

        let mut unchanged = provider(spec_at(&path));
        unchanged.run(Action::Create).unwrap();
        assert!(!unchanged.take_updated());

        let mut chmod = provider(FileSpec {
            mode: Some("644".into()),
            ..spec_at(&path)
        });
        chmod.run(Action::Create).unwrap();
        assert!(chmod.take_updated());
        assert_eq!(fs::read_to_string(&path).unwrap(), "old");
        assert_eq!(mode_of(&path), 0o644);
    }

    #[test]
    fn unset_content_creates_empty_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("empty");
        let mut file = provider(spec_at(&path));
        file.run(Action::Create).unwrap();
        assert!(file.take_updated());
        assert_eq!(fs::read(&path).unwrap(), b"");
    }

    #[test]
    fn only_root_gives_a_replacement_away() {
        assert_eq!(inherited_ids((0, 0), (1000, 1000), 1000), (None, Some(0)));
        assert_eq!(inherited_ids((0, 0), (1000, 1000), 0), (Some(0), Some(0)));
        assert_eq!(inherited_ids((1000, 50), (1000, 1000), 1000), (None, Some(50)));
        assert_eq!(inherited_ids((1000, 1000), (1000, 1000), 1000), (None, None));
    }

    #[test]
    fn replaced_file_keeps_its_mode() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("script");
        fs::write(&path, "#!/bin/sh\n").unwrap();
        fs::set_permissions(&path, Permissions::from_mode(0o750)).unwrap();

        let mut file = provider(spec_at(&path).content("#!/bin/sh\necho hi\n"));
        file.run(Action::Create).unwrap();
        assert!(file.take_updated());
        assert_eq!(mode_of(&path), 0o750);
        assert_eq!(fs::read_to_string(&path).unwrap(), "#!/bin/sh\necho hi\n");
    }

    #[test]
    fn writing_through_a_symlink_replaces_its_destination() {
        let tmp = TempDir::new().unwrap();
        let real = tmp.path().join("real");
        let link = tmp.path().join("link");
        fs::write(&real, "old").unwrap();
        std::os::unix::fs::symlink(&real, &link).unwrap();

        let mut file = provider(spec_at(&link).content("new"));
        file.run(Action::Create).unwrap();
        assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        assert_eq!(fs::read_to_string(&real).unwrap(), "new");
    }

    #[test]
    fn directory_in_the_way_is_a_conflict() {
        let tmp = TempDir::new().unwrap();
        let mut file = provider(spec_at(tmp.path()).content("x"));
        assert!(matches!(
            file.run(Action::Create),
            Err(Error::Conflict { expected: "file", .. })
        ));
    }

    #[test]
    fn dry_run_does_not_write() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("conf");
        fs::write(&path, "a = 1\n").unwrap();

        let dry_run = DryRun::new();
        let mut file = Reconciler::new(
            File::new(&spec_at(&path).content("a = 2\n")).unwrap(),
            dry_run.clone(),
        );
        dry_run.run(|| file.run(Action::Create)).unwrap();
        assert!(file.take_updated());
        assert_eq!(fs::read_to_string(&path).unwrap(), "a = 1\n");
    }

    #[test]
    fn remove_deletes_the_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("gone");
        fs::write(&path, "").unwrap();

        let mut file = provider(spec_at(&path));
        file.run(Action::Remove).unwrap();
        assert!(file.take_updated());
        assert!(!path.exists());

        file.run(Action::Remove).unwrap();
        assert!(!file.take_updated());
    }
}
