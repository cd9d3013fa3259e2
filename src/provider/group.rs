//! Group provider
//!
//! [`GroupMechanism`] holds the comparison and member-set logic once; each
//! platform supplies a [`GroupManager`] with the actual primitives.

use declarative::{Error, Mechanism, Provider, Reconciler, Result};
use std::collections::BTreeSet;
use std::fmt;

use super::dscl::Dscl;
use super::useradd::{Flavor, Useradd};
use super::{Factory, Kind, ProviderEnv, ResourceSpec};
use crate::resource::GroupSpec;

/// Live state of a group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupInfo {
    pub gid: u32,
    pub members: Vec<String>,
}

/// Platform primitives for groups
pub trait GroupManager: fmt::Debug + Send {
    fn provider_name(&self) -> &'static str;

    /// `None` when the group does not exist
    fn query_group(&self, name: &str) -> Result<Option<GroupInfo>>;

    /// Create the group record (gid and system flag, no members)
    fn create_group(&self, group: &GroupSpec) -> Result<()>;

    fn set_gid(&self, name: &str, gid: u32) -> Result<()>;

    fn remove_group(&self, name: &str) -> Result<()>;

    fn add_member(&self, _group: &str, _user: &str) -> Result<()> {
        Err(Error::NotImplemented {
            provider: self.provider_name(),
            operation: "add_member",
        })
    }

    fn remove_member(&self, _group: &str, _user: &str) -> Result<()> {
        Err(Error::NotImplemented {
            provider: self.provider_name(),
            operation: "remove_member",
        })
    }
}

/// Order-insensitive, duplicate-insensitive view of a name list
pub(crate) fn name_set(names: &[String]) -> BTreeSet<&str> {
    names.iter().map(String::as_str).collect()
}

/// Bring `group`'s members from `current` to exactly `desired`
///
/// Additions run before removals, each in name order.
pub fn set_members<G: GroupManager + ?Sized>(
    manager: &G,
    group: &str,
    current: &[String],
    desired: &[String],
) -> Result<()> {
    let current = name_set(current);
    let desired = name_set(desired);

    for user in desired.difference(&current) {
        manager.add_member(group, user)?;
    }
    for user in current.difference(&desired) {
        manager.remove_member(group, user)?;
    }
    Ok(())
}

#[derive(Debug)]
pub struct GroupMechanism<G> {
    spec: GroupSpec,
    manager: G,
}

impl<G: GroupManager> GroupMechanism<G> {
    pub fn new(spec: GroupSpec, manager: G) -> Self {
        Self { spec, manager }
    }

    fn gid_matches(&self, info: &GroupInfo) -> bool {
        self.spec.gid.is_none_or(|gid| gid == info.gid)
    }

    fn members_match(&self, info: &GroupInfo) -> bool {
        self.spec
            .members
            .as_deref()
            .is_none_or(|members| name_set(members) == name_set(&info.members))
    }
}

impl<G: GroupManager> Mechanism for GroupMechanism<G> {
    fn kind(&self) -> &'static str {
        Kind::Group.as_str()
    }

    fn provider_name(&self) -> &'static str {
        self.manager.provider_name()
    }

    fn target(&self) -> String {
        self.spec.name.clone()
    }

    fn exists(&self) -> Result<bool> {
        Ok(self.manager.query_group(&self.spec.name)?.is_some())
    }

    fn in_sync(&self) -> Result<bool> {
        Ok(self
            .manager
            .query_group(&self.spec.name)?
            .is_some_and(|info| self.gid_matches(&info) && self.members_match(&info)))
    }

    fn create(&self) -> Result<()> {
        self.manager.create_group(&self.spec)?;
        if let Some(members) = &self.spec.members {
            set_members(&self.manager, &self.spec.name, &[], members)?;
        }
        Ok(())
    }

    fn update(&self) -> Result<()> {
        let Some(info) = self.manager.query_group(&self.spec.name)? else {
            return self.create();
        };

        if let Some(gid) = self.spec.gid
            && gid != info.gid
        {
            self.manager.set_gid(&self.spec.name, gid)?;
        }
        if let Some(members) = &self.spec.members
            && !self.members_match(&info)
        {
            set_members(&self.manager, &self.spec.name, &info.members, members)?;
        }
        Ok(())
    }

    fn remove(&self) -> Result<()> {
        self.manager.remove_group(&self.spec.name)
    }
}

fn useradd(flavor: Flavor, spec: GroupSpec, env: &ProviderEnv) -> Box<dyn Provider> {
    let manager = Useradd::new(flavor, env.runner.clone());
    Box::new(Reconciler::new(
        GroupMechanism::new(spec, manager),
        env.dry_run.clone(),
    ))
}

fn gnu(spec: GroupSpec, env: &ProviderEnv) -> Result<Box<dyn Provider>> {
    Ok(useradd(Flavor::Gnu, spec, env))
}

fn gnu_passwd(spec: GroupSpec, env: &ProviderEnv) -> Result<Box<dyn Provider>> {
    Ok(useradd(Flavor::GnuPasswd, spec, env))
}

fn openbsd(spec: GroupSpec, env: &ProviderEnv) -> Result<Box<dyn Provider>> {
    Ok(useradd(Flavor::OpenBsd, spec, env))
}

fn macos(spec: GroupSpec, env: &ProviderEnv) -> Result<Box<dyn Provider>> {
    Ok(Box::new(Reconciler::new(
        GroupMechanism::new(spec, Dscl::new(env.runner.clone())),
        env.dry_run.clone(),
    )))
}

const PROVIDERS: &[(&str, Factory<GroupSpec>)] = &[
    ("gnu", gnu),
    ("gnu_passwd", gnu_passwd),
    ("openbsd", openbsd),
    ("macos", macos),
];

impl ResourceSpec for GroupSpec {
    const KIND: Kind = Kind::Group;

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

    fn provider(
        flavor: Flavor,
        spec: GroupSpec,
        runner: &Arc<FakeRunner>,
    ) -> Reconciler<GroupMechanism<Useradd>> {
        let manager = Useradd::new(flavor, SharedRunner::new(runner.clone()));
        Reconciler::new(GroupMechanism::new(spec, manager), DryRun::new())
    }

    fn absent() -> CommandOutput {
        CommandOutput::failed(2, "", "")
    }

    fn admins() -> GroupSpec {
        GroupSpec {
            gid: Some(500),
            members: Some(vec!["alice".into(), "bob".into()]),
            ..GroupSpec::new("admins")
        }
    }

    #[test]
    fn create_adds_group_then_members() {
        let runner = Arc::new(FakeRunner::new());
        runner.always("getent group admins", absent());

        let mut group = provider(Flavor::GnuPasswd, admins(), &runner);
        group.run(Action::Create).unwrap();
        assert!(group.take_updated());
        assert_eq!(
            runner.calls_to(&["groupadd", "gpasswd"]),
            vec![
                "groupadd -g 500 admins",
                "gpasswd -a alice admins",
                "gpasswd -a bob admins",
            ]
        );
    }

    #[test]
    fn matching_group_is_uptodate() {
        let runner = Arc::new(FakeRunner::new());
        runner.always(
            "getent group admins",
            CommandOutput::ok("admins:x:500:bob,alice,alice\n"),
        );

        let mut group = provider(Flavor::Gnu, admins(), &runner);
        assert!(group.uptodate(Action::Create).unwrap());
        group.run(Action::Create).unwrap();
        assert!(!group.take_updated());
        assert!(runner.calls_to(&["groupadd", "groupmod", "usermod", "gpasswd"]).is_empty());
    }

    #[test]
    fn unset_attributes_are_never_compared() {
        let runner = Arc::new(FakeRunner::new());
        runner.always("getent group admins", CommandOutput::ok("admins:x:42:carol\n"));

        let group = provider(Flavor::Gnu, GroupSpec::new("admins"), &runner);
        assert!(group.uptodate(Action::Create).unwrap());
    }

    #[test]
    fn update_fixes_only_what_differs() {
        let runner = Arc::new(FakeRunner::new());
        runner.always("getent group admins", CommandOutput::ok("admins:x:499:alice,carol\n"));

        let mut group = provider(Flavor::Gnu, admins(), &runner);
        group.run(Action::Create).unwrap();
        assert!(group.take_updated());
        assert_eq!(
            runner.calls_to(&["groupmod", "usermod", "gpasswd"]),
            vec![
                "groupmod -g 500 admins",
                "usermod -a -G admins bob",
                "gpasswd -d carol admins",
            ]
        );
    }

    #[test]
    fn system_flag_follows_flavor() {
        for (flavor, expected) in [
            (Flavor::Gnu, "groupadd -r svc"),
            (Flavor::GnuPasswd, "groupadd --system svc"),
            (Flavor::OpenBsd, "groupadd svc"),
        ] {
            let runner = Arc::new(FakeRunner::new());
            runner.always("getent group svc", absent());
            let spec = GroupSpec {
                system: true,
                ..GroupSpec::new("svc")
            };
            provider(flavor, spec, &runner).run(Action::Create).unwrap();
            assert_eq!(runner.calls_to(&["groupadd"]), vec![expected]);
        }
    }

    #[test]
    fn remove_runs_groupdel() {
        let runner = Arc::new(FakeRunner::new());
        runner.always("getent group admins", CommandOutput::ok("admins:x:500:\n"));

        let mut group = provider(Flavor::Gnu, GroupSpec::new("admins"), &runner);
        group.run(Action::Remove).unwrap();
        assert!(group.take_updated());
        assert_eq!(runner.calls_to(&["groupdel"]), vec!["groupdel admins"]);
    }

    #[test]
    fn tool_failures_carry_diagnostics() {
        let runner = Arc::new(FakeRunner::new());
        runner
            .always("getent group admins", absent())
            .always(
                "groupadd -g 500 admins",
                CommandOutput::failed(4, "", "groupadd: GID '500' already exists\n"),
            );

        let mut group = provider(Flavor::Gnu, admins(), &runner);
        let err = group.run(Action::Create).unwrap_err();
        assert_eq!(
            err.to_string(),
            "failed to create group 'admins': \"groupadd: GID '500' already exists\""
        );
        assert!(!group.take_updated());
    }

    #[test]
    fn dry_run_only_queries() {
        let runner = Arc::new(FakeRunner::new());
        runner.always("getent group admins", absent());
        let manager = Useradd::new(Flavor::Gnu, SharedRunner::new(runner.clone()));
        let dry_run = DryRun::new();
        let mut group = Reconciler::new(GroupMechanism::new(admins(), manager), dry_run.clone());

        dry_run.run(|| group.run(Action::Create)).unwrap();
        assert!(group.take_updated());
        assert_eq!(runner.calls(), vec!["getent group admins"]);
    }

    #[derive(Debug)]
    struct NoMembers;

    impl GroupManager for NoMembers {
        fn provider_name(&self) -> &'static str {
            "bare"
        }
        fn query_group(&self, _name: &str) -> Result<Option<GroupInfo>> {
            Ok(None)
        }
        fn create_group(&self, _group: &GroupSpec) -> Result<()> {
            Ok(())
        }
        fn set_gid(&self, _name: &str, _gid: u32) -> Result<()> {
            Ok(())
        }
        fn remove_group(&self, _name: &str) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn missing_member_primitives_are_not_implemented() {
        let err = set_members(&NoMembers, "g", &[], &["alice".to_string()]).unwrap_err();
        assert!(err.is_programming_error());
        assert_eq!(
            err.to_string(),
            "add_member is not implemented by the bare provider"
        );
    }
}
