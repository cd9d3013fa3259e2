//! User provider

use declarative::{Error, Mechanism, Provider, Reconciler, Result};
use std::fmt;

use super::dscl::Dscl;
use super::group::name_set;
use super::useradd::{Flavor, Useradd};
use super::{Factory, Kind, ProviderEnv, ResourceSpec};
use crate::resource::UserSpec;

/// Live state of a user account
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserInfo {
    pub uid: u32,
    /// Primary group id
    pub gid: u32,
    /// First comma-separated GECOS field
    pub full_name: String,
    pub home: String,
    pub shell: String,
    /// Supplementary groups
    pub groups: Vec<String>,
}

/// Desired attributes that differ from the live account
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserChanges {
    pub uid: Option<u32>,
    /// As given (name or gid) alongside the gid it resolved to
    pub primary_group: Option<String>,
    pub primary_gid: Option<u32>,
    /// The full desired supplementary list
    pub groups: Option<Vec<String>>,
    pub full_name: Option<String>,
    pub home: Option<String>,
    pub shell: Option<String>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Platform primitives for user accounts
pub trait UserManager: fmt::Debug + Send {
    fn provider_name(&self) -> &'static str;

    fn query_user(&self, name: &str) -> Result<Option<UserInfo>>;

    /// Gid of a group by name, `None` when there is no such group
    fn group_gid(&self, group: &str) -> Result<Option<u32>>;

    fn create_user(&self, user: &UserSpec) -> Result<()>;

    /// Apply `changes`; every set field differs from `current`
    fn update_user(&self, name: &str, current: &UserInfo, changes: &UserChanges) -> Result<()>;

    fn remove_user(&self, name: &str) -> Result<()>;
}

#[derive(Debug)]
pub struct UserMechanism<U> {
    spec: UserSpec,
    manager: U,
}

impl<U: UserManager> UserMechanism<U> {
    pub fn new(spec: UserSpec, manager: U) -> Self {
        Self { spec, manager }
    }

    fn primary_gid(&self, group: &str) -> Result<u32> {
        if let Ok(gid) = group.parse() {
            return Ok(gid);
        }
        self.manager
            .group_gid(group)?
            .ok_or_else(|| Error::UnknownGroup(group.to_string()))
    }

    fn changes(&self, info: &UserInfo) -> Result<UserChanges> {
        let spec = &self.spec;
        let differs = |wanted: &Option<String>, live: &str| {
            wanted.as_deref().filter(|w| *w != live).map(str::to_string)
        };

        let mut changes = UserChanges {
            uid: spec.uid.filter(|uid| *uid != info.uid),
            groups: spec
                .groups
                .as_ref()
                .filter(|groups| name_set(groups) != name_set(&info.groups))
                .cloned(),
            full_name: differs(&spec.full_name, &info.full_name),
            home: differs(&spec.home, &info.home),
            shell: differs(&spec.shell, &info.shell),
            ..UserChanges::default()
        };

        if let Some(group) = &spec.primary_group {
            let gid = self.primary_gid(group)?;
            if gid != info.gid {
                changes.primary_group = Some(group.clone());
                changes.primary_gid = Some(gid);
            }
        }
        Ok(changes)
    }
}

impl<U: UserManager> Mechanism for UserMechanism<U> {
    fn kind(&self) -> &'static str {
        Kind::User.as_str()
    }

    fn provider_name(&self) -> &'static str {
        self.manager.provider_name()
    }

    fn target(&self) -> String {
        self.spec.name.clone()
    }

    fn exists(&self) -> Result<bool> {
        Ok(self.manager.query_user(&self.spec.name)?.is_some())
    }

    fn in_sync(&self) -> Result<bool> {
        match self.manager.query_user(&self.spec.name)? {
            Some(info) => Ok(self.changes(&info)?.is_empty()),
            None => Ok(false),
        }
    }

    fn create(&self) -> Result<()> {
        self.manager.create_user(&self.spec)
    }

    fn update(&self) -> Result<()> {
        let Some(info) = self.manager.query_user(&self.spec.name)? else {
            return self.create();
        };
        let changes = self.changes(&info)?;
        if changes.is_empty() {
            return Ok(());
        }
        self.manager.update_user(&self.spec.name, &info, &changes)
    }

    fn remove(&self) -> Result<()> {
        self.manager.remove_user(&self.spec.name)
    }
}

fn useradd(flavor: Flavor, spec: UserSpec, env: &ProviderEnv) -> Box<dyn Provider> {
    let manager = Useradd::new(flavor, env.runner.clone());
    Box::new(Reconciler::new(
        UserMechanism::new(spec, manager),
        env.dry_run.clone(),
    ))
}

fn gnu(spec: UserSpec, env: &ProviderEnv) -> Result<Box<dyn Provider>> {
    Ok(useradd(Flavor::Gnu, spec, env))
}

fn gnu_passwd(spec: UserSpec, env: &ProviderEnv) -> Result<Box<dyn Provider>> {
    Ok(useradd(Flavor::GnuPasswd, spec, env))
}

fn openbsd(spec: UserSpec, env: &ProviderEnv) -> Result<Box<dyn Provider>> {
    Ok(useradd(Flavor::OpenBsd, spec, env))
}

fn macos(spec: UserSpec, env: &ProviderEnv) -> Result<Box<dyn Provider>> {
    Ok(Box::new(Reconciler::new(
        UserMechanism::new(spec, Dscl::new(env.runner.clone())),
        env.dry_run.clone(),
    )))
}

const PROVIDERS: &[(&str, Factory<UserSpec>)] = &[
    ("gnu", gnu),
    ("gnu_passwd", gnu_passwd),
    ("openbsd", openbsd),
    ("macos", macos),
];

impl ResourceSpec for UserSpec {
    const KIND: Kind = Kind::User;

    fn providers() -> &'static [(&'static str, Factory<Self>)] {
        PROVIDERS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::SharedRunner;
    use crate::runner::testing::FakeRunner;
    use declarative::{Action, CommandOutput, DryRun};
    use std::sync::Arc;

    const ALICE: &str = "alice:x:1001:1001:Alice,,,:/home/alice:/bin/bash\n";
    const GROUPS: &str = "alice:x:1001:\nstaff:x:50:alice\nwheel:x:10:root\n";

    fn provider(
        flavor: Flavor,
        spec: UserSpec,
        runner: &Arc<FakeRunner>,
    ) -> Reconciler<UserMechanism<Useradd>> {
        let manager = Useradd::new(flavor, SharedRunner::new(runner.clone()));
        Reconciler::new(UserMechanism::new(spec, manager), DryRun::new())
    }

    fn existing_alice() -> Arc<FakeRunner> {
        let runner = Arc::new(FakeRunner::new());
        runner
            .always("getent passwd alice", CommandOutput::ok(ALICE))
            .always("getent group", CommandOutput::ok(GROUPS))
            .always("getent group staff", CommandOutput::ok("staff:x:50:alice\n"));
        runner
    }

    #[test]
    fn create_assembles_useradd_flags_in_order() {
        let runner = Arc::new(FakeRunner::new());
        runner.always("getent passwd deploy", CommandOutput::failed(2, "", ""));
        let spec = UserSpec {
            uid: Some(990),
            full_name: Some("Deploy Bot".into()),
            groups: Some(vec!["docker".into(), "www".into()]),
            shell: Some("/bin/sh".into()),
            home: Some("/srv/deploy".into()),
            primary_group: Some("deploy".into()),
            system: true,
            ..UserSpec::new("deploy")
        };

        let mut user = provider(Flavor::GnuPasswd, spec, &runner);
        user.run(Action::Create).unwrap();
        assert!(user.take_updated());

        let calls = runner.calls_to(&["useradd"]);
        assert_eq!(calls.len(), 1);
        let args: Vec<&str> = calls[0].split(' ').collect();
        assert_eq!(
            args,
            [
                "useradd", "--system", "-u", "990", "-g", "deploy", "-G", "docker,www", "-c",
                "Deploy", "Bot", "-d", "/srv/deploy", "-s", "/bin/sh", "deploy",
            ]
        );
    }

    #[test]
    fn openbsd_system_users_get_a_uid_range() {
        let runner = Arc::new(FakeRunner::new());
        runner.always("getent passwd _svc", CommandOutput::failed(2, "", ""));
        let spec = UserSpec {
            system: true,
            ..UserSpec::new("_svc")
        };
        provider(Flavor::OpenBsd, spec, &runner).run(Action::Create).unwrap();
        assert_eq!(runner.calls_to(&["useradd"]), vec!["useradd -r 100..999 _svc"]);
    }

    #[test]
    fn matching_account_is_uptodate() {
        let runner = existing_alice();
        let spec = UserSpec {
            uid: Some(1001),
            full_name: Some("Alice".into()),
            groups: Some(vec!["staff".into()]),
            shell: Some("/bin/bash".into()),
            home: Some("/home/alice".into()),
            primary_group: Some("1001".into()),
            ..UserSpec::new("alice")
        };
        let mut user = provider(Flavor::Gnu, spec, &runner);
        assert!(user.uptodate(Action::Create).unwrap());
        user.run(Action::Create).unwrap();
        assert!(!user.take_updated());
        assert!(runner.calls_to(&["usermod", "useradd"]).is_empty());
    }

    #[test]
    fn usermod_touches_only_differing_attributes() {
        let runner = existing_alice();
        let spec = UserSpec {
            uid: Some(1001),
            shell: Some("/bin/zsh".into()),
            groups: Some(vec!["staff".into(), "wheel".into()]),
            primary_group: Some("staff".into()),
            ..UserSpec::new("alice")
        };
        let mut user = provider(Flavor::Gnu, spec, &runner);
        user.run(Action::Create).unwrap();
        assert!(user.take_updated());
        assert_eq!(
            runner.calls_to(&["usermod"]),
            vec!["usermod -g staff -G staff,wheel -s /bin/zsh alice"]
        );
    }

    #[test]
    fn openbsd_replaces_group_list_with_dash_s() {
        let runner = existing_alice();
        let spec = UserSpec {
            groups: Some(vec!["wheel".into()]),
            ..UserSpec::new("alice")
        };
        provider(Flavor::OpenBsd, spec, &runner).run(Action::Create).unwrap();
        assert_eq!(runner.calls_to(&["usermod"]), vec!["usermod -S wheel alice"]);
    }

    #[test]
    fn unknown_primary_group_is_an_error() {
        let runner = existing_alice();
        runner.always("getent group nope", CommandOutput::failed(2, "", ""));
        let spec = UserSpec {
            primary_group: Some("nope".into()),
            ..UserSpec::new("alice")
        };
        let user = provider(Flavor::Gnu, spec, &runner);
        assert!(matches!(
            user.uptodate(Action::Create),
            Err(Error::UnknownGroup(g)) if g == "nope"
        ));
    }

    #[test]
    fn remove_runs_userdel() {
        let runner = existing_alice();
        let mut user = provider(Flavor::GnuPasswd, UserSpec::new("alice"), &runner);
        user.run(Action::Remove).unwrap();
        assert!(user.take_updated());
        assert_eq!(runner.calls_to(&["userdel"]), vec!["userdel alice"]);
    }
}
