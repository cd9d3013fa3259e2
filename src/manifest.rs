//! TOML manifests: an ordered list of `[[resource]]` tables
//!
//! ```toml
//! [[resource]]
//! type = "directory"
//! name = "~/projects"
//! mode = "755"
//! on_update = "echo changed"
//!
//! [[resource]]
//! type = "package"
//! name = "htop"
//! action = "remove"
//! ```

use anyhow::{Context, Result};
use declarative::{Action, Error, Resource, ResourceOptions, Runnable};
use serde::Deserialize;
use std::path::Path;

use crate::dsl::Dsl;
use crate::provider::{Kind, SharedRunner};
use crate::resource::{DirectorySpec, FileSpec, GroupSpec, PackageSpec, SymlinkSpec, UserSpec};
use crate::runner;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default, rename = "resource")]
    pub resources: Vec<Entry>,
}

/// Desired state for one resource, tagged by `type`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Spec {
    Directory(DirectorySpec),
    File(FileSpec),
    Symlink(SymlinkSpec),
    Group(GroupSpec),
    User(UserSpec),
    Package(PackageSpec),
}

impl Spec {
    pub fn kind(&self) -> Kind {
        match self {
            Self::Directory(_) => Kind::Directory,
            Self::File(_) => Kind::File,
            Self::Symlink(_) => Kind::Symlink,
            Self::Group(_) => Kind::Group,
            Self::User(_) => Kind::User,
            Self::Package(_) => Kind::Package,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Directory(s) => &s.name,
            Self::File(s) => &s.name,
            Self::Symlink(s) => &s.name,
            Self::Group(s) => &s.name,
            Self::User(s) => &s.name,
            Self::Package(s) => &s.name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Entry {
    #[serde(flatten)]
    pub spec: Spec,
    #[serde(default)]
    pub action: Option<Action>,
    #[serde(default)]
    pub ignore_failure: bool,
    /// Shell command run with `sh -c` after the resource changes
    #[serde(default)]
    pub on_update: Option<String>,
}

impl Entry {
    fn options(&self, runner: &SharedRunner) -> ResourceOptions {
        let mut options = ResourceOptions::default().ignore_failure(self.ignore_failure);
        if let Some(action) = self.action {
            options = options.action(action);
        }
        if let Some(script) = self.on_update.clone() {
            let runner = runner.clone();
            options = options.on_update(move || runner::run_shell(&*runner, &script).map(drop));
        }
        options
    }

    /// Validate the entry and bind it to its provider
    pub fn into_resource(self, dsl: &Dsl) -> declarative::Result<Resource> {
        let options = self.options(&dsl.env().runner);
        match self.spec {
            Spec::Directory(spec) => dsl.resource(spec, options),
            Spec::File(spec) => dsl.resource(spec, options),
            Spec::Symlink(spec) => dsl.resource(spec, options),
            Spec::Group(spec) => dsl.resource(spec, options),
            Spec::User(spec) => dsl.resource(spec, options),
            Spec::Package(spec) => dsl.resource(spec, options),
        }
    }
}

/// A manifest entry that is validated and bound to its provider when it
/// runs, so it sees the effects of the entries before it
pub struct PendingResource<'a> {
    dsl: &'a Dsl,
    kind: &'static str,
    name: String,
    entry: Option<Entry>,
    resource: Option<Resource>,
}

impl<'a> PendingResource<'a> {
    pub fn new(dsl: &'a Dsl, entry: Entry) -> Self {
        Self {
            dsl,
            kind: entry.spec.kind().as_str(),
            name: entry.spec.name().to_string(),
            entry: Some(entry),
            resource: None,
        }
    }

    /// The built resource, once [`Runnable::run`] has been called
    pub fn resource(&self) -> Option<&Resource> {
        self.resource.as_ref()
    }

    fn build(&mut self) -> declarative::Result<()> {
        let Some(entry) = self.entry.take() else {
            return Ok(());
        };
        let ignore_failure = entry.ignore_failure;
        match entry.into_resource(self.dsl) {
            Ok(resource) => self.resource = Some(resource),
            Err(err @ Error::NoProvider { .. }) => return Err(err),
            Err(err) if ignore_failure => {
                log::error!("{} '{}' is invalid: {}", self.kind, self.name, err);
            }
            Err(err) => return Err(err),
        }
        Ok(())
    }
}

impl Runnable for PendingResource<'_> {
    fn kind(&self) -> &str {
        self.kind
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn run(&mut self) -> declarative::Result<bool> {
        self.build()?;
        match self.resource.as_mut() {
            Some(resource) => resource.run(),
            None => Ok(false),
        }
    }
}

impl Manifest {
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse manifest")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse manifest: {}", path.display()))
    }

    /// Wrap every entry for building at run time, in manifest order
    pub fn into_pending(self, dsl: &Dsl) -> Vec<PendingResource<'_>> {
        self.resources
            .into_iter()
            .map(|entry| PendingResource::new(dsl, entry))
            .collect()
    }

    /// Build every resource, in manifest order
    pub fn into_resources(self, dsl: &Dsl) -> Result<Vec<Resource>> {
        self.resources
            .into_iter()
            .enumerate()
            .map(|(index, entry)| {
                let label = format!("{} '{}'", entry.spec.kind(), entry.spec.name());
                entry
                    .into_resource(dsl)
                    .with_context(|| format!("Invalid resource #{} ({label})", index + 1))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::Platform;
    use crate::provider::ProviderRegistry;
    use crate::runner::testing::FakeRunner;
    use declarative::DryRun;
    use std::sync::Arc;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
[[resource]]
type = "directory"
name = "/srv/app"
mode = "755"
owner = "root"

[[resource]]
type = "group"
name = "admins"
gid = 500
members = ["alice", "bob"]

[[resource]]
type = "package"
name = "htop"
version = "3.2.2-2"
action = "remove"
ignore_failure = true
"#;

    fn dsl(runner: &Arc<FakeRunner>) -> Dsl {
        Dsl::with_runner(
            ProviderRegistry::new(Platform::Debian),
            DryRun::new(),
            runner.clone(),
        )
    }

    #[test]
    fn parses_entries_in_order() {
        let manifest = Manifest::parse(SAMPLE).unwrap();
        assert_eq!(manifest.resources.len(), 3);

        let dir = &manifest.resources[0];
        assert_eq!(
            dir.spec,
            Spec::Directory(DirectorySpec {
                mode: Some("755".into()),
                owner: Some("root".into()),
                ..DirectorySpec::new("/srv/app")
            })
        );
        assert_eq!(dir.action, None);

        let group = &manifest.resources[1];
        assert_eq!(group.spec.kind(), Kind::Group);
        assert_eq!(
            group.spec,
            Spec::Group(GroupSpec {
                gid: Some(500),
                members: Some(vec!["alice".into(), "bob".into()]),
                ..GroupSpec::new("admins")
            })
        );

        let pkg = &manifest.resources[2];
        assert_eq!(pkg.action, Some(Action::Remove));
        assert!(pkg.ignore_failure);
    }

    #[test]
    fn empty_manifest_is_valid() {
        assert!(Manifest::parse("").unwrap().resources.is_empty());
    }

    #[test]
    fn unknown_type_is_rejected() {
        let err = Manifest::parse("[[resource]]\ntype = \"service\"\nname = \"sshd\"\n");
        assert!(err.is_err());
    }

    #[test]
    fn symlink_requires_target() {
        assert!(Manifest::parse("[[resource]]\ntype = \"symlink\"\nname = \"/tmp/l\"\n").is_err());
    }

    #[test]
    fn resources_keep_manifest_order_and_defaults() {
        let runner = Arc::new(FakeRunner::new());
        let resources = Manifest::parse(SAMPLE)
            .unwrap()
            .into_resources(&dsl(&runner))
            .unwrap();

        let summary: Vec<_> = resources
            .iter()
            .map(|r| (r.kind(), r.name().to_string(), r.action()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("directory", "/srv/app".to_string(), Action::Create),
                ("group", "admins".to_string(), Action::Create),
                ("package", "htop".to_string(), Action::Remove),
            ]
        );
    }

    #[test]
    fn invalid_action_names_the_entry() {
        let manifest = Manifest::parse(
            "[[resource]]\ntype = \"file\"\nname = \"/tmp/x\"\naction = \"install\"\n",
        )
        .unwrap();
        let err = manifest
            .into_resources(&dsl(&Arc::new(FakeRunner::new())))
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid resource #1 (file '/tmp/x')");
    }

    #[test]
    fn on_update_runs_through_the_shell() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("app.conf");
        let manifest = format!(
            "[[resource]]\ntype = \"file\"\nname = \"{}\"\ncontent = \"a\"\n\
             on_update = \"systemctl reload app\"\n",
            path.display()
        );
        let runner = Arc::new(FakeRunner::new());
        let mut resources = Manifest::parse(&manifest)
            .unwrap()
            .into_resources(&dsl(&runner))
            .unwrap();

        assert!(resources[0].run().unwrap());
        assert!(!resources[0].run().unwrap());
        assert_eq!(runner.calls(), vec!["sh -c systemctl reload app"]);
    }

    #[test]
    fn pending_entries_build_when_run() {
        let tmp = TempDir::new().unwrap();
        let manifest = format!(
            "[[resource]]\ntype = \"directory\"\nname = \"{}\"\n",
            tmp.path().join("d").display()
        );
        let dsl = dsl(&Arc::new(FakeRunner::new()));
        let mut pending = Manifest::parse(&manifest).unwrap().into_pending(&dsl);

        assert_eq!(pending[0].kind(), "directory");
        assert!(pending[0].resource().is_none());
        assert!(pending[0].run().unwrap());
        assert!(pending[0].resource().is_some());
        assert!(!pending[0].run().unwrap());
        assert!(tmp.path().join("d").is_dir());
    }

    #[test]
    fn invalid_pending_entry_honors_ignore_failure() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("x");
        let entry = |ignore: bool| {
            format!(
                "[[resource]]\ntype = \"file\"\nname = \"{}\"\nmode = \"bogus\"\n\
                 ignore_failure = {ignore}\n",
                path.display()
            )
        };
        let dsl = dsl(&Arc::new(FakeRunner::new()));

        let mut strict = Manifest::parse(&entry(false)).unwrap().into_pending(&dsl);
        assert!(matches!(strict[0].run(), Err(Error::InvalidMode(m)) if m == "bogus"));

        let mut lenient = Manifest::parse(&entry(true)).unwrap().into_pending(&dsl);
        assert!(!lenient[0].run().unwrap());
        assert!(lenient[0].resource().is_none());
        assert!(!path.exists());
    }

    #[test]
    fn load_reports_the_path() {
        let err = Manifest::load(Path::new("/nonexistent/keel.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/keel.toml"));
    }
}
