//! Typed desired-state attribute sets and resource construction
//!
//! Each `*Spec` carries the attributes one resource kind recognizes. Unset
//! (`None`) attributes are unmanaged. [`build`] validates a spec, resolves its
//! provider through the registry and wraps both in a [`Resource`].

use declarative::{Action, Error, Resource, ResourceOptions, Result};
use serde::Deserialize;
use std::path::PathBuf;

use crate::paths;
use crate::provider::{Kind, ProviderEnv, ProviderRegistry, ResourceSpec};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DirectorySpec {
    pub name: String,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FileSpec {
    pub name: String,
    /// Full file content; `None` leaves an existing file's content alone
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SymlinkSpec {
    pub name: String,
    /// Link destination, compared literally with `readlink`
    pub target: String,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct GroupSpec {
    pub name: String,
    #[serde(default)]
    pub gid: Option<u32>,
    /// Exact member set; order and duplicates do not matter
    #[serde(default)]
    pub members: Option<Vec<String>>,
    #[serde(default)]
    pub system: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UserSpec {
    pub name: String,
    #[serde(default)]
    pub uid: Option<u32>,
    #[serde(default)]
    pub full_name: Option<String>,
    /// Exact supplementary group set
    #[serde(default)]
    pub groups: Option<Vec<String>>,
    #[serde(default)]
    pub shell: Option<String>,
    #[serde(default)]
    pub home: Option<String>,
    /// Group name or numeric gid
    #[serde(default)]
    pub primary_group: Option<String>,
    #[serde(default)]
    pub system: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PackageSpec {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
}

impl DirectorySpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn path(&self) -> PathBuf {
        PathBuf::from(&self.name)
    }
}

impl FileSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn path(&self) -> PathBuf {
        PathBuf::from(&self.name)
    }
}

impl SymlinkSpec {
    pub fn new(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            ..Self::default()
        }
    }

    pub fn path(&self) -> PathBuf {
        PathBuf::from(&self.name)
    }
}

impl GroupSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

impl UserSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

impl PackageSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
        }
    }
}

/// Spec-level validation and normalization, run before provider resolution
pub trait Validate: Sized {
    /// Name the resource is reported under
    fn name(&self) -> &str;

    /// Expand paths and reject malformed attributes
    fn normalize(self) -> Result<Self>;
}

fn invalid(kind: Kind, name: &str, attribute: &'static str, message: &str) -> Error {
    Error::InvalidAttribute {
        kind: kind.as_str(),
        name: name.to_string(),
        attribute,
        message: message.to_string(),
    }
}

fn expand_path(kind: Kind, name: &str) -> Result<String> {
    if name.trim().is_empty() {
        return Err(invalid(kind, name, "name", "path must not be empty"));
    }
    Ok(paths::expand_home(name).to_string_lossy().into_owned())
}

/// Account and package names are passed as single command arguments
fn check_identifier(kind: Kind, name: &str, attribute: &'static str) -> Result<()> {
    if name.is_empty() {
        return Err(invalid(kind, name, attribute, "must not be empty"));
    }
    if name.starts_with('-') || name.contains(|c: char| c == ':' || c == ',' || c.is_whitespace())
    {
        return Err(invalid(
            kind,
            name,
            attribute,
            "may not start with '-' or contain ':', ',' or whitespace",
        ));
    }
    Ok(())
}

impl Validate for DirectorySpec {
    fn name(&self) -> &str {
        &self.name
    }

    fn normalize(mut self) -> Result<Self> {
        self.name = expand_path(Kind::Directory, &self.name)?;
        Ok(self)
    }
}

impl Validate for FileSpec {
    fn name(&self) -> &str {
        &self.name
    }

    fn normalize(mut self) -> Result<Self> {
        self.name = expand_path(Kind::File, &self.name)?;
        Ok(self)
    }
}

impl Validate for SymlinkSpec {
    fn name(&self) -> &str {
        &self.name
    }

    fn normalize(mut self) -> Result<Self> {
        self.name = expand_path(Kind::Symlink, &self.name)?;
        if self.target.is_empty() {
            return Err(invalid(Kind::Symlink, &self.name, "target", "must not be empty"));
        }
        if self.target.starts_with('~') {
            self.target = paths::expand_home(&self.target)
                .to_string_lossy()
                .into_owned();
        }
        Ok(self)
    }
}

impl Validate for GroupSpec {
    fn name(&self) -> &str {
        &self.name
    }

    fn normalize(self) -> Result<Self> {
        check_identifier(Kind::Group, &self.name, "name")?;
        for member in self.members.iter().flatten() {
            check_identifier(Kind::Group, member, "members").map_err(|_| {
                invalid(Kind::Group, &self.name, "members", &format!("bad member '{member}'"))
            })?;
        }
        Ok(self)
    }
}

impl Validate for UserSpec {
    fn name(&self) -> &str {
        &self.name
    }

    fn normalize(mut self) -> Result<Self> {
        check_identifier(Kind::User, &self.name, "name")?;
        for group in self.groups.iter().flatten() {
            check_identifier(Kind::User, group, "groups").map_err(|_| {
                invalid(Kind::User, &self.name, "groups", &format!("bad group '{group}'"))
            })?;
        }
        if let Some(primary) = &self.primary_group {
            check_identifier(Kind::User, primary, "primary_group")?;
        }
        if self.full_name.as_deref().is_some_and(|n| n.contains(':')) {
            return Err(invalid(Kind::User, &self.name, "full_name", "may not contain ':'"));
        }
        if let Some(home) = &self.home {
            self.home = Some(paths::expand_home(home).to_string_lossy().into_owned());
        }
        Ok(self)
    }
}

impl Validate for PackageSpec {
    fn name(&self) -> &str {
        &self.name
    }

    fn normalize(self) -> Result<Self> {
        check_identifier(Kind::Package, &self.name, "name")?;
        if self.version.as_deref().is_some_and(str::is_empty) {
            return Err(invalid(Kind::Package, &self.name, "version", "must not be empty"));
        }
        Ok(self)
    }
}

/// Validate `spec`, resolve its provider and bind both into a [`Resource`]
///
/// The provider is resolved exactly once, here. A kind without a provider on
/// this platform still yields a resource whose actions fail with
/// [`Error::NoProvider`].
pub fn build<S>(
    spec: S,
    options: ResourceOptions,
    registry: &ProviderRegistry,
    env: &ProviderEnv,
) -> Result<Resource>
where
    S: ResourceSpec + Validate,
{
    let kind = S::KIND;
    let present = kind.present_action();
    if let Some(action) = options.action
        && action != present
        && action != Action::Remove
    {
        return Err(Error::InvalidAction {
            kind: kind.as_str(),
            action: action.to_string(),
        });
    }

    let spec = spec.normalize()?;
    let name = spec.name().to_string();
    let provider = registry.resolve(spec, env)?;
    Ok(Resource::new(
        kind.as_str(),
        name,
        present,
        provider,
        options,
        env.dry_run.clone(),
    ))
}
