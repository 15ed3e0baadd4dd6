//! Application error types with rich context

use std::path::PathBuf;
use thiserror::Error;

use crate::operation::Operation;
use crate::types::ConfigField;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Application error types organized by layer/domain
#[derive(Debug, Error)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Common/Infrastructure Errors
    // ─────────────────────────────────────────────────────────────
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ─────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────
    /// The persisted flashing configuration could not be read or written.
    #[error("Configuration persistence error: {message}")]
    Persistence { message: String },

    /// No configuration has been loaded, so nothing can be edited or run.
    #[error("No configuration is loaded")]
    ConfigUnavailable,

    #[error("Settings error: {message}")]
    Settings { message: String },

    #[error("Unknown configuration field: {name}")]
    InvalidField { name: String },

    #[error("Rejected selection {path}: {reason}")]
    InvalidSelection { path: PathBuf, reason: String },

    // ─────────────────────────────────────────────────────────────
    // Operation Errors
    // ─────────────────────────────────────────────────────────────
    #[error("{operation} is not ready, missing: {}", join_fields(.missing))]
    Precondition {
        operation: Operation,
        missing: Vec<ConfigField>,
    },

    #[error("Cannot start {requested}: {running} is still running")]
    OperationInProgress {
        requested: Operation,
        running: Operation,
    },

    #[error("{operation} could not reach the backend: {message}")]
    BackendInvocation {
        operation: Operation,
        message: String,
    },

    #[error("{operation} failed with exit code {exit_code} after {duration_ms}ms")]
    OperationFailed {
        operation: Operation,
        exit_code: i32,
        duration_ms: u64,
    },

    #[error("Unknown operation: {name}")]
    UnknownOperation { name: String },

    // ─────────────────────────────────────────────────────────────
    // Backend/Process Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to spawn {program}: {reason}")]
    ProcessSpawn { program: String, reason: String },

    #[error("Process error: {message}")]
    Process { message: String },

    #[error("Command timed out after {secs} seconds")]
    CommandTimeout { secs: u64 },

    #[error("Required tool not found on PATH: {tool}")]
    ToolNotFound { tool: String },

    // ─────────────────────────────────────────────────────────────
    // Channel/Communication Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Channel send error: {message}")]
    ChannelSend { message: String },

    #[error("Channel closed unexpectedly")]
    ChannelClosed,
}

fn join_fields(fields: &[ConfigField]) -> String {
    fields
        .iter()
        .map(|f| f.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

// ─────────────────────────────────────────────────────────────────
// Convenience Constructors
// ─────────────────────────────────────────────────────────────────

impl Error {
    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence {
            message: message.into(),
        }
    }

    pub fn settings(message: impl Into<String>) -> Self {
        Self::Settings {
            message: message.into(),
        }
    }

    pub fn process(message: impl Into<String>) -> Self {
        Self::Process {
            message: message.into(),
        }
    }

    pub fn process_spawn(program: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ProcessSpawn {
            program: program.into(),
            reason: reason.into(),
        }
    }

    pub fn channel_send(message: impl Into<String>) -> Self {
        Self::ChannelSend {
            message: message.into(),
        }
    }

    pub fn invalid_selection(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidSelection {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn backend_invocation(operation: Operation, message: impl Into<String>) -> Self {
        Self::BackendInvocation {
            operation,
            message: message.into(),
        }
    }

    /// Check if this is a recoverable error
    ///
    /// Recoverable errors leave the console usable: the operator can fix the
    /// input, wait for the device, or re-run the operation.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Persistence { .. }
                | Error::ConfigUnavailable
                | Error::Precondition { .. }
                | Error::OperationInProgress { .. }
                | Error::BackendInvocation { .. }
                | Error::OperationFailed { .. }
                | Error::CommandTimeout { .. }
                | Error::InvalidSelection { .. }
                | Error::ChannelSend { .. }
        )
    }

    /// Check if this error should trigger application exit
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::ToolNotFound { .. } | Error::InvalidField { .. } | Error::UnknownOperation { .. }
        )
    }
}

// ─────────────────────────────────────────────────────────────────
// Error Context Extensions
// ─────────────────────────────────────────────────────────────────

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let err = e.into();
            tracing::error!("{}: {:?}", context.into(), err);
            err
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let err = e.into();
            tracing::error!("{}: {:?}", f(), err);
            err
        })
    }
}
