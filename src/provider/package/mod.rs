//! Package providers
//!
//! A package "exists" when any version is installed. A requested version is
//! an attribute: a different installed version is out of date, and
//! installing again converges it.

mod apt;
mod brew;
mod pkg_add;
mod yum;

pub use apt::Apt;
pub use brew::Brew;
pub use pkg_add::PkgAdd;
pub use yum::Yum;

use declarative::{Action, Mechanism, Provider, Reconciler, Result};
use std::fmt;

use super::{Factory, Kind, ProviderEnv, ResourceSpec};
use crate::resource::PackageSpec;

/// Package-manager primitives
pub trait PackageManager: fmt::Debug + Send {
    fn provider_name(&self) -> &'static str;

    /// Installed versions of `name`, restricted to `version` when given
    ///
    /// "Not installed" and "no such package" are both an empty list.
    fn installed_versions(&self, name: &str, version: Option<&str>) -> Result<Vec<String>>;

    fn install(&self, name: &str, version: Option<&str>) -> Result<()>;

    fn remove(&self, name: &str) -> Result<()>;
}

#[derive(Debug)]
pub struct PackageMechanism<P> {
    spec: PackageSpec,
    manager: P,
}

impl<P: PackageManager> PackageMechanism<P> {
    pub fn new(spec: PackageSpec, manager: P) -> Self {
        Self { spec, manager }
    }
}

impl<P: PackageManager> Mechanism for PackageMechanism<P> {
    fn kind(&self) -> &'static str {
        Kind::Package.as_str()
    }

    fn provider_name(&self) -> &'static str {
        self.manager.provider_name()
    }

    fn target(&self) -> String {
        self.spec.name.clone()
    }

    fn present_action(&self) -> Action {
        Action::Install
    }

    fn exists(&self) -> Result<bool> {
        Ok(!self
            .manager
            .installed_versions(&self.spec.name, None)?
            .is_empty())
    }

    fn in_sync(&self) -> Result<bool> {
        match self.spec.version.as_deref() {
            Some(version) => Ok(!self
                .manager
                .installed_versions(&self.spec.name, Some(version))?
                .is_empty()),
            None => Ok(true),
        }
    }

    fn create(&self) -> Result<()> {
        if let Some(version) = &self.spec.version {
            log::debug!("pinning package '{}' to version {version}", self.spec.name);
        }
        self.manager
            .install(&self.spec.name, self.spec.version.as_deref())
    }

    fn update(&self) -> Result<()> {
        self.create()
    }

    fn remove(&self) -> Result<()> {
        self.manager.remove(&self.spec.name)
    }
}

fn reconciler<P: PackageManager + 'static>(
    spec: PackageSpec,
    manager: P,
    env: &ProviderEnv,
) -> Box<dyn Provider> {
    Box::new(Reconciler::new(
        PackageMechanism::new(spec, manager),
        env.dry_run.clone(),
    ))
}

fn apt(spec: PackageSpec, env: &ProviderEnv) -> Result<Box<dyn Provider>> {
    Ok(reconciler(spec, Apt::new(env.runner.clone()), env))
}

fn yum(spec: PackageSpec, env: &ProviderEnv) -> Result<Box<dyn Provider>> {
    Ok(reconciler(spec, Yum::new(env.runner.clone()), env))
}

fn brew(mut spec: PackageSpec, env: &ProviderEnv) -> Result<Box<dyn Provider>> {
    if let Some(version) = spec.version.take() {
        log::warn!(
            "brew cannot pin versions; ignoring version '{version}' for '{}'",
            spec.name
        );
    }
    Ok(reconciler(spec, Brew::new(env.runner.clone()), env))
}

fn pkg_add(spec: PackageSpec, env: &ProviderEnv) -> Result<Box<dyn Provider>> {
    Ok(reconciler(spec, PkgAdd::new(env.runner.clone()), env))
}

const PROVIDERS: &[(&str, Factory<PackageSpec>)] = &[
    ("apt", apt),
    ("yum", yum),
    ("brew", brew),
    ("pkg_add", pkg_add),
];

impl ResourceSpec for PackageSpec {
    const KIND: Kind = Kind::Package;

    fn providers() -> &'static [(&'static str, Factory<Self>)] {
        PROVIDERS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::SharedRunner;
    use crate::runner::testing::FakeRunner;
    use declarative::{CommandOutput, DryRun};
    use std::sync::Arc;

    const QUERY: &str = "dpkg-query --show --showformat=${db:Status-Abbrev}${Version}\\n htop";

    fn apt_provider(
        spec: PackageSpec,
        runner: &Arc<FakeRunner>,
    ) -> Reconciler<PackageMechanism<Apt>> {
        let apt = Apt::new(SharedRunner::new(runner.clone()));
        Reconciler::new(PackageMechanism::new(spec, apt), DryRun::new())
    }

    #[test]
    fn install_then_noop() {
        let runner = Arc::new(FakeRunner::new());
        runner
            .respond(
                QUERY,
                CommandOutput::failed(1, "", "dpkg-query: no packages found matching htop\n"),
            )
            .always(QUERY, CommandOutput::ok("ii 3.2.2-2\n"));

        let mut pkg = apt_provider(PackageSpec::new("htop"), &runner);
        pkg.run(Action::Install).unwrap();
        assert!(pkg.take_updated());
        assert_eq!(
            runner.calls_to(&["apt-get"]),
            vec!["DEBIAN_FRONTEND=noninteractive apt-get install -y -q htop"]
        );

        pkg.run(Action::Install).unwrap();
        assert!(!pkg.take_updated());
        assert_eq!(runner.calls_to(&["apt-get"]).len(), 1);
    }

    #[test]
    fn wrong_version_is_reinstalled_as_update() {
        let runner = Arc::new(FakeRunner::new());
        runner.always(QUERY, CommandOutput::ok("ii 3.2.2-2\n"));
        let spec = PackageSpec {
            version: Some("3.3.0-1".into()),
            ..PackageSpec::new("htop")
        };

        let mut pkg = apt_provider(spec, &runner);
        assert_eq!(pkg.mechanism().target(), "htop");
        assert!(pkg.mechanism().exists().unwrap());
        assert!(!pkg.uptodate(Action::Install).unwrap());
        pkg.run(Action::Install).unwrap();
        assert_eq!(
            runner.calls_to(&["apt-get"]),
            vec!["DEBIAN_FRONTEND=noninteractive apt-get install -y -q htop=3.3.0-1"]
        );
    }

    #[test]
    fn remove_when_installed() {
        let runner = Arc::new(FakeRunner::new());
        runner.always(QUERY, CommandOutput::ok("ii 3.2.2-2\n"));

        let mut pkg = apt_provider(PackageSpec::new("htop"), &runner);
        assert!(!pkg.uptodate(Action::Remove).unwrap());
        pkg.run(Action::Remove).unwrap();
        assert!(pkg.take_updated());
        assert_eq!(
            runner.calls_to(&["apt-get"]),
            vec!["DEBIAN_FRONTEND=noninteractive apt-get remove -y -q htop"]
        );
    }

    #[test]
    fn create_is_not_a_package_action() {
        let runner = Arc::new(FakeRunner::new());
        let pkg = apt_provider(PackageSpec::new("htop"), &runner);
        assert!(pkg.uptodate(Action::Create).unwrap_err().is_programming_error());
    }

    #[test]
    fn brew_drops_requested_versions() {
        let runner = Arc::new(FakeRunner::new());
        let env = ProviderEnv::new(DryRun::new(), runner.clone());
        let spec = PackageSpec {
            version: Some("1.0".into()),
            ..PackageSpec::new("jq")
        };
        let pkg = brew(spec, &env).unwrap();
        assert_eq!(pkg.target(), "jq");
    }
}
