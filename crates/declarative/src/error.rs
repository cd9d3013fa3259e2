//! Error types for reconciliation.
//!
//! Errors fall into four groups: conflicts found while inspecting the
//! filesystem, failures of external tools, attribute errors found while
//! normalizing desired state, and programming errors (an action a provider
//! does not support, a capability a platform does not implement).

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while checking or converging a resource.
#[derive(Debug, Error)]
pub enum Error {
    /// Something other than the wanted entry type occupies the path
    #[error("{} already exists and is not a {expected}", path.display())]
    Conflict {
        /// Path that holds the conflicting entry
        path: PathBuf,
        /// Entry type the resource wants ("directory", "file", "symlink")
        expected: &'static str,
    },

    /// An external command exited unsuccessfully
    #[error("{context}: \"{output}\"")]
    CommandFailed {
        /// Operation the command was part of
        context: String,
        /// Trimmed diagnostic output of the tool
        output: String,
    },

    /// An external command could not be started at all
    #[error("failed to execute {command}: {source}")]
    Spawn {
        /// Command line that was attempted
        command: String,
        #[source]
        source: io::Error,
    },

    /// The action is not supported by this kind of resource
    #[error("invalid action '{action}' for {kind}")]
    InvalidAction {
        /// Resource kind
        kind: &'static str,
        /// Name of the rejected action
        action: String,
    },

    /// A platform provider does not implement a capability
    #[error("{operation} is not implemented by the {provider} provider")]
    NotImplemented {
        /// Provider name
        provider: &'static str,
        /// Missing operation
        operation: &'static str,
    },

    /// No provider could be resolved for the resource
    #[error("no provider available for {kind} '{name}'")]
    NoProvider {
        /// Resource kind
        kind: &'static str,
        /// Resource name
        name: String,
    },

    /// A desired attribute failed validation
    #[error("invalid {attribute} for {kind} '{name}': {message}")]
    InvalidAttribute {
        /// Resource kind
        kind: &'static str,
        /// Resource name
        name: String,
        /// Attribute name
        attribute: &'static str,
        /// What is wrong with it
        message: String,
    },

    /// Owner string is not `user`, `user:group` or `:group`
    #[error("invalid owner '{0}'")]
    InvalidOwner(String),

    /// Mode string is neither octal nor symbolic notation
    #[error("invalid mode '{0}'")]
    InvalidMode(String),

    /// User name does not resolve to a uid
    #[error("unknown user '{0}'")]
    UnknownUser(String),

    /// Group name does not resolve to a gid
    #[error("unknown group '{0}'")]
    UnknownGroup(String),

    /// Every id in a reserved range is taken
    #[error("no free id left in range {start}..{end}")]
    IdRangeExhausted {
        /// First id of the range
        start: u32,
        /// One past the last id of the range
        end: u32,
    },

    /// A query tool produced output that could not be parsed
    #[error("unexpected output from {command}: {message}")]
    MalformedOutput {
        /// Command whose output was malformed
        command: String,
        /// Description of the problem
        message: String,
    },

    /// Filesystem operation failed
    #[error("{}: {source}", path.display())]
    Io {
        /// Path the operation touched
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl Error {
    /// Wrap an I/O error with the path it concerns.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Build a `CommandFailed` error from a context and raw tool output.
    pub fn command_failed(context: impl Into<String>, output: &str) -> Self {
        Self::CommandFailed {
            context: context.into(),
            output: output.trim().to_string(),
        }
    }

    /// Whether this is a programming error rather than an environment problem.
    pub fn is_programming_error(&self) -> bool {
        matches!(self, Self::InvalidAction { .. } | Self::NotImplemented { .. })
    }
}

/// Result alias for reconciliation operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_failed_message_quotes_trimmed_output() {
        let err = Error::command_failed("groupadd failed", "groupadd: group 'x' exists\n");
        assert_eq!(
            err.to_string(),
            "groupadd failed: \"groupadd: group 'x' exists\""
        );
    }

    #[test]
    fn conflict_names_expected_type() {
        let err = Error::Conflict {
            path: PathBuf::from("/tmp/foo"),
            expected: "directory",
        };
        assert_eq!(
            err.to_string(),
            "/tmp/foo already exists and is not a directory"
        );
    }

    #[test]
    fn programming_errors_are_classified() {
        let invalid = Error::InvalidAction {
            kind: "file",
            action: "install".into(),
        };
        let missing = Error::NotImplemented {
            provider: "gnu",
            operation: "add_member",
        };
        assert!(invalid.is_programming_error());
        assert!(missing.is_programming_error());
        assert!(!Error::UnknownUser("nobody".into()).is_programming_error());
    }
}
