//! Error types for the transfer orchestrator
//!
//! This module defines the semantic error kinds from the design (§7):
//! configuration, precondition, resource, transfer, integrity, and cleanup
//! failures, each carrying enough context for debugging and for the CLI to
//! choose a process exit code.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for transfer orchestrator operations
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// Invalid argument shape or an unsupported socket naming pattern
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A sanity check failed before any firewall or replication state changed
    #[error("precondition failed on '{host}': {message}")]
    Precondition { host: String, message: String },

    /// Port allocation was exhausted after the configured number of retries
    #[error("resource exhausted: {0}")]
    Resource(String),

    /// The sender pipeline exited with a nonzero status
    #[error("transfer to '{host}' failed with exit code {code}")]
    Transfer { host: String, code: i32 },

    /// Post-transfer size or checksum verification failed
    #[error("integrity check failed for '{host}:{path}': {message}")]
    Integrity {
        host: String,
        path: PathBuf,
        message: String,
    },

    /// A mandatory cleanup step (firewall close, replication restart) failed.
    /// Never overwrites an earlier in-flight failure; only reported alongside it.
    #[error("cleanup failed on '{host}': {message}")]
    Cleanup { host: String, message: String },

    /// Failure to execute or interpret the remote command channel itself
    #[error("remote execution error on '{host}': {message}")]
    RemoteExecution { host: String, message: String },

    /// I/O error with path context
    #[error("I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The run was cancelled externally (§4.5/§5); cleanup still runs.
    #[error("transfer cancelled")]
    Cancelled,
}

impl OrchestratorError {
    /// Create a precondition error
    pub fn precondition(host: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Precondition {
            host: host.into(),
            message: message.into(),
        }
    }

    /// Create a remote execution error
    pub fn remote(host: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RemoteExecution {
            host: host.into(),
            message: message.into(),
        }
    }

    /// Create an integrity mismatch error
    pub fn integrity(
        host: impl Into<String>,
        path: impl Into<PathBuf>,
        message: impl Into<String>,
    ) -> Self {
        Self::Integrity {
            host: host.into(),
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an I/O error with path context
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// The process exit code this error should surface as, per §6: exit codes
    /// are either the first sender nonzero exit or a sentinel for
    /// precondition/integrity failures.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration(_) => 2,
            Self::Transfer { code, .. } => *code,
            Self::Precondition { .. } => 70,
            Self::Integrity { .. } => 71,
            Self::Resource(_) => 72,
            Self::Cleanup { .. } => 73,
            Self::RemoteExecution { .. } => 74,
            Self::Io { .. } => 1,
            Self::Cancelled => 75,
        }
    }

    /// Whether this failure happened before any firewall/replication state
    /// was mutated (true for configuration and precondition errors).
    pub fn is_pre_run(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::Precondition { .. })
    }
}

/// Result type alias for transfer orchestrator operations
pub type Result<T> = std::result::Result<T, OrchestratorError>;

impl From<std::io::Error> for OrchestratorError {
    fn from(err: std::io::Error) -> Self {
        OrchestratorError::Io {
            path: PathBuf::new(),
            source: err,
        }
    }
}

/// Extension trait for adding path context to `std::io::Result`
pub trait IoResultExt<T> {
    /// Add path context to an I/O error
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| OrchestratorError::io(path, e))
    }
}
