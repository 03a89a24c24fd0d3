//! Error types for convergence operations.
//!
//! A nonzero exit status from an external command is normal data, not an
//! error; only a process that cannot be launched at all surfaces as
//! [`Error::CommandLaunch`]. Mutating actions that require a command to
//! succeed report [`Error::CommandFailed`].

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while converging a single resource.
///
/// Any of these aborts the current convergence pass; the daemon loop
/// decides whether that means a scheduled retry or process termination.
#[derive(Debug, Error)]
pub enum Error {
    /// Current-state inspection failed for a reason other than
    /// "the managed entity is absent" (absence is a valid state).
    #[error("failed to probe current state of {path}: {source}")]
    Probe {
        /// Path of the entity being inspected
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// The revision expression is the reserved default-remote alias,
    /// which cannot be resolved to a single reference.
    #[error(
        "revision '{0}' is ambiguous: the default remote alias cannot be \
         resolved, use a branch, tag, or commit id instead"
    )]
    AmbiguousRevision(String),

    /// No remote reference matched the revision expression.
    #[error("unable to resolve '{revision}' to a revision in {repository}")]
    UnresolvableRevision {
        /// The revision expression that failed to resolve
        revision: String,
        /// The repository URL that was queried
        repository: String,
    },

    /// An ownership change was attempted without sufficient privilege.
    #[error("insufficient privilege to {operation} {path}")]
    Privilege {
        /// The attempted operation (e.g. "change owner of")
        operation: &'static str,
        /// Path of the affected file
        path: PathBuf,
    },

    /// The external process could not be launched at all.
    #[error("failed to launch '{program}': {source}")]
    CommandLaunch {
        /// The program that could not be spawned
        program: String,
        /// Underlying spawn error
        #[source]
        source: std::io::Error,
    },

    /// A command that must succeed exited with a nonzero status.
    #[error("'{command}' exited with status {status}: {stderr}")]
    CommandFailed {
        /// The full command line that failed
        command: String,
        /// Exit status of the process
        status: i32,
        /// Captured standard error output
        stderr: String,
    },

    /// A symbolic owner or group name does not exist on this system.
    #[error("unknown {kind} '{name}'")]
    UnknownIdent {
        /// "user" or "group"
        kind: &'static str,
        /// The name that failed to resolve
        name: String,
    },

    /// IO error with context about what was being done.
    #[error("{context}: {source}")]
    Io {
        /// What was being attempted
        context: String,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Wrap an IO error with a description of the failed operation.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

/// Convenience result type for convergence operations.
pub type Result<T> = std::result::Result<T, Error>;
