use std::path::PathBuf;

use thiserror::Error;

use crate::infrastructure::git::GitError;
use crate::infrastructure::RegistryError;
use crate::mail::MailError;

pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of [`Error`], used by callers that need to react
/// (exit codes, remediation hints) without matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The identity does not currently exist.
    NotFound,
    /// An absence precondition was violated.
    Conflict,
    /// Wrong state for the requested transition; usually fixed with `force`.
    Precondition,
    /// A collaborator (registry, mail, git, filesystem) failed.
    External,
    /// Caller supplied a malformed name or configuration.
    Invalid,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("worker not found: {rig}/{name}")]
    WorkerNotFound { rig: String, name: String },

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("session already running: {0}")]
    SessionRunning(String),

    #[error("worker already exists: {rig}/{name}")]
    WorkerExists { rig: String, name: String },

    #[error("witness already running for rig '{rig}' (pid {pid})")]
    AlreadyRunning { rig: String, pid: i32 },

    #[error("witness not running for rig '{0}'")]
    NotRunning(String),

    #[error("crew workspace {rig}/{name} has uncommitted changes (use force to remove anyway)")]
    HasChanges { rig: String, name: String },

    #[error("rig not found: {0}")]
    RigNotFound(PathBuf),

    #[error("invalid worker name '{name}': {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("{op}: {source}")]
    Registry {
        op: &'static str,
        #[source]
        source: RegistryError,
    },

    #[error("{op}: {source}")]
    Mail {
        op: &'static str,
        #[source]
        source: MailError,
    },

    #[error("{op}: {source}")]
    SourceControl {
        op: &'static str,
        #[source]
        source: GitError,
    },

    #[error("witness state {}: {source}", path.display())]
    State {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{op} {}: {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config {}: {message}", path.display())]
    Config { path: PathBuf, message: String },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::WorkerNotFound { .. } | Error::SessionNotFound(_) | Error::RigNotFound(_) => {
                ErrorKind::NotFound
            }
            Error::SessionRunning(_) | Error::WorkerExists { .. } | Error::AlreadyRunning { .. } => {
                ErrorKind::Conflict
            }
            Error::NotRunning(_) | Error::HasChanges { .. } => ErrorKind::Precondition,
            Error::InvalidName { .. } | Error::Config { .. } => ErrorKind::Invalid,
            Error::Registry { .. }
            | Error::Mail { .. }
            | Error::SourceControl { .. }
            | Error::State { .. }
            | Error::Io { .. } => ErrorKind::External,
        }
    }

    pub(crate) fn registry(op: &'static str) -> impl FnOnce(RegistryError) -> Error {
        move |source| Error::Registry { op, source }
    }

    pub(crate) fn mail(op: &'static str) -> impl FnOnce(MailError) -> Error {
        move |source| Error::Mail { op, source }
    }

    pub(crate) fn git(op: &'static str) -> impl FnOnce(GitError) -> Error {
        move |source| Error::SourceControl { op, source }
    }

    pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Error {
        let path = path.into();
        move |source| Error::Io { op, path, source }
    }
}
