//! Platform detection.
//!
//! The platform selects default providers. It comes from the compile-time OS
//! and, on Linux, from `/etc/os-release`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const OS_RELEASE: &str = "/etc/os-release";

/// Host platform, as far as provider selection cares
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Debian,
    Ubuntu,
    Fedora,
    Rhel,
    /// Any other Linux distribution
    Linux,
    Osx,
    OpenBsd,
    /// Nothing keel has defaults for
    Unknown,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debian => "debian",
            Self::Ubuntu => "ubuntu",
            Self::Fedora => "fedora",
            Self::Rhel => "rhel",
            Self::Linux => "linux",
            Self::Osx => "osx",
            Self::OpenBsd => "openbsd",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debian" => Ok(Self::Debian),
            "ubuntu" => Ok(Self::Ubuntu),
            "fedora" => Ok(Self::Fedora),
            "rhel" | "centos" | "rocky" | "almalinux" => Ok(Self::Rhel),
            "linux" => Ok(Self::Linux),
            "osx" | "macos" | "darwin" => Ok(Self::Osx),
            "openbsd" => Ok(Self::OpenBsd),
            other => Err(format!("unknown platform '{other}'")),
        }
    }
}

/// Detect the current platform.
pub fn detect() -> Platform {
    match std::env::consts::OS {
        "macos" => Platform::Osx,
        "openbsd" => Platform::OpenBsd,
        "linux" => match std::fs::read_to_string(OS_RELEASE) {
            Ok(content) => from_os_release(&content),
            Err(e) => {
                log::debug!("Could not read {OS_RELEASE}: {e}");
                Platform::Linux
            }
        },
        _ => Platform::Unknown,
    }
}

/// Classify a Linux distribution from `os-release` content.
///
/// `ID` wins over `ID_LIKE`; derivatives fall back to the first family in
/// `ID_LIKE` keel knows about.
pub fn from_os_release(content: &str) -> Platform {
    let field = |key: &str| {
        content.lines().find_map(|line| {
            let (k, v) = line.split_once('=')?;
            (k.trim() == key).then(|| v.trim().trim_matches('"').to_string())
        })
    };

    let candidates = field("ID")
        .into_iter()
        .chain(field("ID_LIKE").into_iter().flat_map(|like| {
            like.split_whitespace()
                .map(str::to_string)
                .collect::<Vec<_>>()
        }));

    for id in candidates {
        match id.parse::<Platform>() {
            Ok(Platform::Osx | Platform::OpenBsd | Platform::Linux) | Err(_) => {}
            Ok(platform) => return platform,
        }
    }
    Platform::Linux
}
