//! macOS directory-service accounts via `dscl` and `dseditgroup`
//!
//! Records are built one attribute per `dscl` call. Reads use `dscl -plist`
//! so values never need whitespace splitting.

use declarative::{Error, ExecOptions, Result};
use plist::{Dictionary, Value};
use std::collections::BTreeSet;
use std::io::Cursor;
use std::ops::Range;

use super::SharedRunner;
use super::group::{GroupInfo, GroupManager, name_set};
use super::user::{UserChanges, UserInfo, UserManager};
use crate::resource::{GroupSpec, UserSpec};

/// Ids handed to system accounts when none is given
const SYSTEM_IDS: Range<u32> = 200..500;

/// Lowest id for regular accounts
const FIRST_REGULAR_ID: u32 = 501;

#[derive(Debug, Clone)]
pub struct Dscl {
    runner: SharedRunner,
}

impl Dscl {
    pub fn new(runner: SharedRunner) -> Self {
        Self { runner }
    }

    fn dscl(&self, args: &[&str], context: &str) -> Result<String> {
        self.runner
            .exec_or_fail("dscl", args, context, ExecOptions::default())
    }

    fn create_attr(&self, record: &str, attr: &str, value: &str) -> Result<()> {
        self.dscl(
            &[".", "-create", record, attr, value],
            &format!("failed to set {attr} on {record}"),
        )
        .map(drop)
    }

    fn edit_membership(&self, op: &str, group: &str, user: &str, context: &str) -> Result<()> {
        self.runner
            .exec_or_fail(
                "dseditgroup",
                &["-o", "edit", op, user, "-t", "user", group],
                context,
                ExecOptions::default(),
            )
            .map(drop)
    }

    /// Read a record as a plist dictionary; `None` when it does not exist
    fn read(&self, record: &str) -> Result<Option<Dictionary>> {
        let output = self.runner.run("dscl", &["-plist", ".", "-read", record], &[])?;
        if !output.success {
            let stderr = output.stderr_str();
            if stderr.contains("eDSRecordNotFound") || stderr.contains("-14136") {
                return Ok(None);
            }
            return Err(Error::command_failed(format!("failed to read {record}"), &stderr));
        }
        parse_record(record, &output.stdout_str()).map(Some)
    }

    /// Every numeric value of `attr` across `/Groups` or `/Users`
    fn ids_in_use(&self, path: &str, attr: &str) -> Result<BTreeSet<u32>> {
        let listing = self.dscl(&[".", "-list", path, attr], &format!("failed to list {path}"))?;
        Ok(listing
            .lines()
            .filter_map(|line| line.split_whitespace().nth(1)?.parse().ok())
            .collect())
    }

    fn group_memberships(&self, user: &str) -> Result<Vec<String>> {
        let listing = self.dscl(
            &[".", "-list", "/Groups", "GroupMembership"],
            "failed to list /Groups",
        )?;
        Ok(listing
            .lines()
            .filter_map(|line| {
                let mut fields = line.split_whitespace();
                let group = fields.next()?;
                fields.any(|m| m == user).then(|| group.to_string())
            })
            .collect())
    }
}

/// Pick an id for a new account
///
/// System accounts get the lowest free id in [`SYSTEM_IDS`]; others get one
/// above the highest id in use, never below [`FIRST_REGULAR_ID`].
pub fn allocate_id(used: &BTreeSet<u32>, system: bool) -> Result<u32> {
    if system {
        let Range { start, end } = SYSTEM_IDS;
        return (start..end)
            .find(|id| !used.contains(id))
            .ok_or(Error::IdRangeExhausted { start, end });
    }
    let next = used.last().map_or(FIRST_REGULAR_ID, |max| max.saturating_add(1));
    Ok(next.max(FIRST_REGULAR_ID))
}

fn parse_record(record: &str, plist: &str) -> Result<Dictionary> {
    let malformed = |message: String| Error::MalformedOutput {
        command: format!("dscl -plist . -read {record}"),
        message,
    };
    match Value::from_reader(Cursor::new(plist.as_bytes())) {
        Ok(Value::Dictionary(dict)) => Ok(dict),
        Ok(_) => Err(malformed("expected a dictionary at root".to_string())),
        Err(e) => Err(malformed(e.to_string())),
    }
}

/// Every string value of a standard attribute
fn attr_values(dict: &Dictionary, attr: &str) -> Vec<String> {
    let value = dict
        .get(&format!("dsAttrTypeStandard:{attr}"))
        .or_else(|| dict.get(attr));
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_string().map(str::to_string))
            .collect(),
        Some(Value::String(s)) => vec![s.clone()],
        _ => Vec::new(),
    }
}

fn attr_string(dict: &Dictionary, attr: &str) -> String {
    attr_values(dict, attr).into_iter().next().unwrap_or_default()
}

fn attr_id(record: &str, dict: &Dictionary, attr: &str) -> Result<u32> {
    let raw = attr_string(dict, attr);
    raw.parse().map_err(|_| Error::MalformedOutput {
        command: format!("dscl -plist . -read {record}"),
        message: format!("{attr} '{raw}' is not a number"),
    })
}

fn group_record(name: &str) -> String {
    format!("/Groups/{name}")
}

fn user_record(name: &str) -> String {
    format!("/Users/{name}")
}

impl GroupManager for Dscl {
    fn provider_name(&self) -> &'static str {
        "macos"
    }

    fn query_group(&self, name: &str) -> Result<Option<GroupInfo>> {
        let record = group_record(name);
        let Some(dict) = self.read(&record)? else {
            return Ok(None);
        };
        Ok(Some(GroupInfo {
            gid: attr_id(&record, &dict, "PrimaryGroupID")?,
            members: attr_values(&dict, "GroupMembership"),
        }))
    }

    fn create_group(&self, group: &GroupSpec) -> Result<()> {
        let gid = match group.gid {
            Some(gid) => gid,
            None => allocate_id(
                &self.ids_in_use("/Groups", "PrimaryGroupID")?,
                group.system,
            )?,
        };
        let record = group_record(&group.name);
        self.dscl(
            &[".", "-create", &record],
            &format!("failed to create group '{}'", group.name),
        )?;
        self.create_attr(&record, "PrimaryGroupID", &gid.to_string())
    }

    fn set_gid(&self, name: &str, gid: u32) -> Result<()> {
        self.create_attr(&group_record(name), "PrimaryGroupID", &gid.to_string())
    }

    fn remove_group(&self, name: &str) -> Result<()> {
        self.dscl(
            &[".", "-delete", &group_record(name)],
            &format!("failed to remove group '{name}'"),
        )
        .map(drop)
    }

    fn add_member(&self, group: &str, user: &str) -> Result<()> {
        self.edit_membership(
            "-a",
            group,
            user,
            &format!("failed to add '{user}' to group '{group}'"),
        )
    }

    fn remove_member(&self, group: &str, user: &str) -> Result<()> {
        self.edit_membership(
            "-d",
            group,
            user,
            &format!("failed to remove '{user}' from group '{group}'"),
        )
    }
}

impl Dscl {
    fn resolve_gid(&self, group: &str) -> Result<u32> {
        if let Ok(gid) = group.parse() {
            return Ok(gid);
        }
        self.group_gid(group)?
            .ok_or_else(|| Error::UnknownGroup(group.to_string()))
    }
}

impl UserManager for Dscl {
    fn provider_name(&self) -> &'static str {
        "macos"
    }

    fn query_user(&self, name: &str) -> Result<Option<UserInfo>> {
        let record = user_record(name);
        let Some(dict) = self.read(&record)? else {
            return Ok(None);
        };
        Ok(Some(UserInfo {
            uid: attr_id(&record, &dict, "UniqueID")?,
            gid: attr_id(&record, &dict, "PrimaryGroupID")?,
            full_name: attr_string(&dict, "RealName"),
            home: attr_string(&dict, "NFSHomeDirectory"),
            shell: attr_string(&dict, "UserShell"),
            groups: self.group_memberships(name)?,
        }))
    }

    fn group_gid(&self, group: &str) -> Result<Option<u32>> {
        Ok(self.query_group(group)?.map(|info| info.gid))
    }

    fn create_user(&self, user: &UserSpec) -> Result<()> {
        let uid = match user.uid {
            Some(uid) => uid,
            None => allocate_id(&self.ids_in_use("/Users", "UniqueID")?, user.system)?,
        };
        let primary_gid = user
            .primary_group
            .as_deref()
            .map(|group| self.resolve_gid(group))
            .transpose()?;

        let record = user_record(&user.name);
        self.dscl(
            &[".", "-create", &record],
            &format!("failed to create user '{}'", user.name),
        )?;
        self.create_attr(&record, "UniqueID", &uid.to_string())?;
        if let Some(gid) = primary_gid {
            self.create_attr(&record, "PrimaryGroupID", &gid.to_string())?;
        }
        if let Some(full_name) = &user.full_name {
            self.create_attr(&record, "RealName", full_name)?;
        }
        if let Some(shell) = &user.shell {
            self.create_attr(&record, "UserShell", shell)?;
        }
        if let Some(home) = &user.home {
            self.create_attr(&record, "NFSHomeDirectory", home)?;
        }
        for group in name_set(user.groups.as_deref().unwrap_or_default()) {
            self.add_member(group, &user.name)?;
        }
        Ok(())
    }

    fn update_user(&self, name: &str, current: &UserInfo, changes: &UserChanges) -> Result<()> {
        let record = user_record(name);
        if let Some(uid) = changes.uid {
            self.create_attr(&record, "UniqueID", &uid.to_string())?;
        }
        if let Some(gid) = changes.primary_gid {
            self.create_attr(&record, "PrimaryGroupID", &gid.to_string())?;
        }
        if let Some(full_name) = &changes.full_name {
            self.create_attr(&record, "RealName", full_name)?;
        }
        if let Some(shell) = &changes.shell {
            self.create_attr(&record, "UserShell", shell)?;
        }
        if let Some(home) = &changes.home {
            self.create_attr(&record, "NFSHomeDirectory", home)?;
        }
        if let Some(groups) = &changes.groups {
            let have = name_set(&current.groups);
            let want = name_set(groups);
            for group in want.difference(&have) {
                self.add_member(group, name)?;
            }
            for group in have.difference(&want) {
                self.remove_member(group, name)?;
            }
        }
        Ok(())
    }

    fn remove_user(&self, name: &str) -> Result<()> {
        self.dscl(
            &[".", "-delete", &user_record(name)],
            &format!("failed to remove user '{name}'"),
        )
        .map(drop)
    }
}
