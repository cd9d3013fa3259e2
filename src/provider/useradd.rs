//! The useradd/groupadd tool family (shadow-utils and OpenBSD)
//!
//! One implementation assembles every flag; [`Flavor`] only decides the
//! system-account option and how supplementary memberships are edited.
//! Account state is read back with `getent`.

use declarative::{Error, ExecOptions, Result};

use super::SharedRunner;
use super::group::{GroupInfo, GroupManager};
use super::user::{UserChanges, UserInfo, UserManager};
use crate::resource::{GroupSpec, UserSpec};

/// getent's exit status for "key not found in database"
const GETENT_NOT_FOUND: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    /// shadow-utils, memberships through `usermod -a -G`
    Gnu,
    /// shadow-utils, memberships through `gpasswd`
    GnuPasswd,
    OpenBsd,
}

impl Flavor {
    pub fn name(self) -> &'static str {
        match self {
            Self::Gnu => "gnu",
            Self::GnuPasswd => "gnu_passwd",
            Self::OpenBsd => "openbsd",
        }
    }

    fn user_system_args(self) -> &'static [&'static str] {
        match self {
            Self::Gnu => &["-r"],
            Self::GnuPasswd => &["--system"],
            Self::OpenBsd => &["-r", "100..999"],
        }
    }

    /// `None` when groupadd has no notion of system groups
    fn group_system_args(self) -> Option<&'static [&'static str]> {
        match self {
            Self::Gnu => Some(&["-r"]),
            Self::GnuPasswd => Some(&["--system"]),
            Self::OpenBsd => None,
        }
    }

    /// usermod flag that replaces the supplementary group list
    fn group_list_flag(self) -> &'static str {
        match self {
            Self::OpenBsd => "-S",
            Self::Gnu | Self::GnuPasswd => "-G",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Useradd {
    flavor: Flavor,
    runner: SharedRunner,
}

impl Useradd {
    pub fn new(flavor: Flavor, runner: SharedRunner) -> Self {
        Self { flavor, runner }
    }

    fn exec(&self, cmd: &str, args: &[String], context: &str) -> Result<()> {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.runner
            .exec_or_fail(cmd, &args, context, ExecOptions::default())
            .map(drop)
    }

    /// Look one key up in a getent database; `None` when it is absent
    fn getent(&self, database: &str, key: Option<&str>) -> Result<Option<String>> {
        let mut args = vec![database];
        args.extend(key);
        let output = self.runner.run("getent", &args, &[])?;

        if output.success {
            return Ok(Some(output.stdout_str()));
        }
        if output.code == Some(GETENT_NOT_FOUND) {
            return Ok(None);
        }
        Err(Error::command_failed(
            format!("getent {} failed", args.join(" ")),
            &output.stderr_str(),
        ))
    }

    /// Supplementary groups listing `user` as a member
    fn supplementary_groups(&self, user: &str) -> Result<Vec<String>> {
        let listing = self.getent("group", None)?.unwrap_or_default();
        let mut groups = Vec::new();
        for line in listing.lines().filter(|l| !l.trim().is_empty()) {
            let (name, info) = parse_group_line(line)?;
            if info.members.iter().any(|m| m == user) {
                groups.push(name);
            }
        }
        Ok(groups)
    }
}

fn malformed(database: &str, line: &str) -> Error {
    Error::MalformedOutput {
        command: format!("getent {database}"),
        message: format!("bad entry '{line}'"),
    }
}

/// `name:password:gid:member,member`
pub(crate) fn parse_group_line(line: &str) -> Result<(String, GroupInfo)> {
    let fields: Vec<&str> = line.trim_end().split(':').collect();
    let [name, _, gid, members] = fields.as_slice() else {
        return Err(malformed("group", line));
    };
    let gid = gid.parse().map_err(|_| malformed("group", line))?;
    let members = members
        .split(',')
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .collect();
    Ok(((*name).to_string(), GroupInfo { gid, members }))
}

/// `name:password:uid:gid:gecos:home:shell`
pub(crate) fn parse_passwd_line(line: &str) -> Result<UserInfo> {
    let fields: Vec<&str> = line.trim_end().split(':').collect();
    let [_, _, uid, gid, gecos, home, shell] = fields.as_slice() else {
        return Err(malformed("passwd", line));
    };
    Ok(UserInfo {
        uid: uid.parse().map_err(|_| malformed("passwd", line))?,
        gid: gid.parse().map_err(|_| malformed("passwd", line))?,
        full_name: gecos.split(',').next().unwrap_or_default().to_string(),
        home: (*home).to_string(),
        shell: (*shell).to_string(),
        groups: Vec::new(),
    })
}

fn first_line(output: &str) -> Option<&str> {
    output.lines().find(|l| !l.trim().is_empty())
}

impl GroupManager for Useradd {
    fn provider_name(&self) -> &'static str {
        self.flavor.name()
    }

    fn query_group(&self, name: &str) -> Result<Option<GroupInfo>> {
        let Some(output) = self.getent("group", Some(name))? else {
            return Ok(None);
        };
        let line = first_line(&output).ok_or_else(|| malformed("group", &output))?;
        Ok(Some(parse_group_line(line)?.1))
    }

    fn create_group(&self, group: &GroupSpec) -> Result<()> {
        let mut args = Vec::new();
        if group.system {
            match self.flavor.group_system_args() {
                Some(system) => args.extend(system.iter().map(|s| (*s).to_string())),
                None => log::debug!(
                    "{} groupadd has no system option; ignoring it for '{}'",
                    self.flavor.name(),
                    group.name
                ),
            }
        }
        if let Some(gid) = group.gid {
            args.extend(["-g".to_string(), gid.to_string()]);
        }
        args.push(group.name.clone());
        self.exec(
            "groupadd",
            &args,
            &format!("failed to create group '{}'", group.name),
        )
    }

    fn set_gid(&self, name: &str, gid: u32) -> Result<()> {
        self.exec(
            "groupmod",
            &["-g".to_string(), gid.to_string(), name.to_string()],
            &format!("failed to change gid of group '{name}'"),
        )
    }

    fn remove_group(&self, name: &str) -> Result<()> {
        self.exec(
            "groupdel",
            &[name.to_string()],
            &format!("failed to remove group '{name}'"),
        )
    }

    fn add_member(&self, group: &str, user: &str) -> Result<()> {
        let (cmd, args): (&str, Vec<&str>) = match self.flavor {
            Flavor::Gnu => ("usermod", vec!["-a", "-G", group, user]),
            Flavor::GnuPasswd => ("gpasswd", vec!["-a", user, group]),
            Flavor::OpenBsd => ("usermod", vec!["-G", group, user]),
        };
        let args: Vec<String> = args.into_iter().map(str::to_string).collect();
        self.exec(cmd, &args, &format!("failed to add '{user}' to group '{group}'"))
    }

    fn remove_member(&self, group: &str, user: &str) -> Result<()> {
        let context = format!("failed to remove '{user}' from group '{group}'");
        match self.flavor {
            Flavor::Gnu | Flavor::GnuPasswd => self.exec(
                "gpasswd",
                &["-d".to_string(), user.to_string(), group.to_string()],
                &context,
            ),
            Flavor::OpenBsd => {
                let rest: Vec<String> = self
                    .supplementary_groups(user)?
                    .into_iter()
                    .filter(|g| g != group)
                    .collect();
                self.exec(
                    "usermod",
                    &["-S".to_string(), rest.join(","), user.to_string()],
                    &context,
                )
            }
        }
    }
}

impl UserManager for Useradd {
    fn provider_name(&self) -> &'static str {
        self.flavor.name()
    }

    fn query_user(&self, name: &str) -> Result<Option<UserInfo>> {
        let Some(output) = self.getent("passwd", Some(name))? else {
            return Ok(None);
        };
        let line = first_line(&output).ok_or_else(|| malformed("passwd", &output))?;
        let mut info = parse_passwd_line(line)?;
        info.groups = self.supplementary_groups(name)?;
        Ok(Some(info))
    }

    fn group_gid(&self, group: &str) -> Result<Option<u32>> {
        Ok(self.query_group(group)?.map(|info| info.gid))
    }

    fn create_user(&self, user: &UserSpec) -> Result<()> {
        let mut args: Vec<String> = Vec::new();
        if user.system {
            args.extend(self.flavor.user_system_args().iter().map(|s| (*s).to_string()));
        }
        push_flag(&mut args, "-u", user.uid.map(|uid| uid.to_string()));
        push_flag(&mut args, "-g", user.primary_group.clone());
        push_flag(&mut args, "-G", user.groups.as_ref().map(|g| g.join(",")));
        push_flag(&mut args, "-c", user.full_name.clone());
        push_flag(&mut args, "-d", user.home.clone());
        push_flag(&mut args, "-s", user.shell.clone());
        args.push(user.name.clone());
        self.exec(
            "useradd",
            &args,
            &format!("failed to create user '{}'", user.name),
        )
    }

    fn update_user(&self, name: &str, _current: &UserInfo, changes: &UserChanges) -> Result<()> {
        let mut args: Vec<String> = Vec::new();
        push_flag(&mut args, "-u", changes.uid.map(|uid| uid.to_string()));
        push_flag(&mut args, "-g", changes.primary_group.clone());
        push_flag(
            &mut args,
            self.flavor.group_list_flag(),
            changes.groups.as_ref().map(|g| g.join(",")),
        );
        push_flag(&mut args, "-c", changes.full_name.clone());
        push_flag(&mut args, "-d", changes.home.clone());
        push_flag(&mut args, "-s", changes.shell.clone());
        if args.is_empty() {
            return Ok(());
        }
        args.push(name.to_string());
        self.exec("usermod", &args, &format!("failed to update user '{name}'"))
    }

    fn remove_user(&self, name: &str) -> Result<()> {
        self.exec(
            "userdel",
            &[name.to_string()],
            &format!("failed to remove user '{name}'"),
        )
    }
}

fn push_flag(args: &mut Vec<String>, flag: &str, value: Option<String>) {
    if let Some(value) = value {
        args.push(flag.to_string());
        args.push(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::testing::FakeRunner;
    use declarative::CommandOutput;
    use std::sync::Arc;

    fn useradd(flavor: Flavor, runner: &Arc<FakeRunner>) -> Useradd {
        Useradd::new(flavor, SharedRunner::new(runner.clone()))
    }

    #[test]
    fn group_lines_parse() {
        let (name, info) = parse_group_line("wheel:x:10:root,alice\n").unwrap();
        assert_eq!(name, "wheel");
        assert_eq!(info.gid, 10);
        assert_eq!(info.members, vec!["root", "alice"]);

        let (_, empty) = parse_group_line("nogroup:x:65534:").unwrap();
        assert!(empty.members.is_empty());
    }

    #[test]
    fn passwd_lines_parse_first_gecos_field() {
        let info =
            parse_passwd_line("alice:x:1000:1000:Alice Liddell,,,:/home/alice:/bin/zsh").unwrap();
        assert_eq!(info.uid, 1000);
        assert_eq!(info.gid, 1000);
        assert_eq!(info.full_name, "Alice Liddell");
        assert_eq!(info.home, "/home/alice");
        assert_eq!(info.shell, "/bin/zsh");
    }

    #[test]
    fn malformed_entries_are_errors() {
        assert!(matches!(
            parse_group_line("wheel:x:ten:"),
            Err(Error::MalformedOutput { .. })
        ));
        assert!(parse_passwd_line("alice:x:1000").is_err());
    }

    #[test]
    fn getent_not_found_is_absent_but_other_failures_error() {
        let runner = Arc::new(FakeRunner::new());
        runner
            .always("getent group ghost", CommandOutput::failed(2, "", ""))
            .always("getent group broken", CommandOutput::failed(1, "", "bad nsswitch\n"));
        let tool = useradd(Flavor::Gnu, &runner);

        assert_eq!(tool.query_group("ghost").unwrap(), None);
        let err = tool.query_group("broken").unwrap_err();
        assert_eq!(err.to_string(), "getent group broken failed: \"bad nsswitch\"");
    }

    #[test]
    fn supplementary_groups_come_from_the_group_database() {
        let runner = Arc::new(FakeRunner::new());
        runner.always(
            "getent group",
            CommandOutput::ok("wheel:x:10:root,alice\nstaff:x:50:alice\nusers:x:100:bob\n"),
        );
        let tool = useradd(Flavor::Gnu, &runner);
        assert_eq!(tool.supplementary_groups("alice").unwrap(), vec!["wheel", "staff"]);
    }

    #[test]
    fn membership_commands_per_flavor() {
        let expectations = [
            (Flavor::Gnu, "usermod -a -G admins alice", "gpasswd -d alice admins"),
            (Flavor::GnuPasswd, "gpasswd -a alice admins", "gpasswd -d alice admins"),
            (Flavor::OpenBsd, "usermod -G admins alice", "usermod -S wheel alice"),
        ];
        for (flavor, add, remove) in expectations {
            let runner = Arc::new(FakeRunner::new());
            runner.always(
                "getent group",
                CommandOutput::ok("wheel:x:0:alice\nadmins:x:500:alice\n"),
            );
            let tool = useradd(flavor, &runner);
            tool.add_member("admins", "alice").unwrap();
            tool.remove_member("admins", "alice").unwrap();
            assert_eq!(runner.calls_to(&["usermod", "gpasswd"]), vec![add, remove]);
        }
    }
}
