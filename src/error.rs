//! Error types for cadence
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (bad args, unknown task)
//! - 4: Operation failed (storage, remote store, engine shut down)

use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the cadence CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for cadence operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Task id '{0}' is ambiguous")]
    AmbiguousTaskId(String),

    // Operation failures (exit code 4)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Failed to persist {path}: {message}")]
    Persist { path: PathBuf, message: String },

    #[error("Remote store error: {0}")]
    Remote(String),

    #[error("Task engine is no longer running")]
    EngineClosed,

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl Error {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidArgument(_)
            | Error::InvalidConfig(_)
            | Error::TaskNotFound(_)
            | Error::AmbiguousTaskId(_) => exit_codes::USER_ERROR,

            Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::Persist { .. }
            | Error::Remote(_)
            | Error::EngineClosed
            | Error::Join(_) => exit_codes::OPERATION_FAILED,
        }
    }
}

/// Result type alias for cadence operations
pub type Result<T> = std::result::Result<T, Error>;

/// Non-fatal conditions reported alongside an operation's result.
///
/// None of these abort the operation that produced them; the in-memory
/// collection is always left in a consistent state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// The persisted blob could not be read; the collection was kept.
    ReadFailed(String),
    /// The persisted blob could not be decoded; the collection was kept.
    DecodeFailed(String),
    /// A write-through failed; the in-memory mutation was kept.
    PersistFailed(String),
    /// A remote read failed; the remote projection is empty.
    RemoteReadFailed(String),
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Diagnostic::ReadFailed(msg) => write!(f, "failed to read stored tasks: {msg}"),
            Diagnostic::DecodeFailed(msg) => write!(f, "failed to decode stored tasks: {msg}"),
            Diagnostic::PersistFailed(msg) => write!(f, "failed to save tasks: {msg}"),
            Diagnostic::RemoteReadFailed(msg) => write!(f, "failed to read remote tasks: {msg}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_errors_map_to_user_exit_code() {
        assert_eq!(
            Error::TaskNotFound("abc".into()).exit_code(),
            exit_codes::USER_ERROR
        );
        assert_eq!(
            Error::AmbiguousTaskId("a".into()).exit_code(),
            exit_codes::USER_ERROR
        );
    }

    #[test]
    fn operation_errors_map_to_failure_exit_code() {
        assert_eq!(Error::EngineClosed.exit_code(), exit_codes::OPERATION_FAILED);
        assert_eq!(
            Error::Remote("offline".into()).exit_code(),
            exit_codes::OPERATION_FAILED
        );
    }

    #[test]
    fn diagnostic_messages_name_the_failure() {
        let diag = Diagnostic::PersistFailed("disk full".into());
        assert_eq!(diag.to_string(), "failed to save tasks: disk full");
        let diag = Diagnostic::ReadFailed("permission denied".into());
        assert_eq!(diag.to_string(), "failed to read stored tasks: permission denied");
    }
}
