use declarative::{Error, Result};
use std::str::FromStr;

/// Owner specification: `user`, `user:group`, `:group`, or numeric ids
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileOwner {
    pub user: Option<String>,
    pub group: Option<String>,
}

impl FileOwner {
    pub fn parse(spec: &str) -> Result<Self> {
        let mut parts = spec.split(':');
        let user = parts.next().unwrap_or_default();
        let group = parts.next();
        if parts.next().is_some() {
            return Err(Error::InvalidOwner(spec.to_string()));
        }

        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());
        Ok(Self {
            user: non_empty(user),
            group: group.and_then(non_empty),
        })
    }
}

impl FromStr for FileOwner {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
