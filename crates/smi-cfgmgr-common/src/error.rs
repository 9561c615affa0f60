//! Error types for SMI fabric manager operations.
//!
//! Only conditions that abort a run (or a single shell call) are modelled
//! here. Per-device conditions such as a vanished parent adapter are
//! collected as findings by the manager and never travel as `Err`.

use std::io;
use thiserror::Error;

/// Result type alias for SMI fabric manager operations.
pub type SmiResult<T> = Result<T, SmiError>;

/// Errors that can occur while reconciling or supervising SMI devices.
#[derive(Debug, Error)]
pub enum SmiError {
    /// Failed to execute a shell command (spawn error).
    #[error("Failed to execute shell command '{command}': {source}")]
    ShellExec {
        /// The command that failed to execute.
        command: String,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// A required external tool is not installed or not on PATH.
    #[error("Required tool '{tool}' is not available")]
    ToolUnavailable {
        /// Program name as it appears in the command template.
        tool: String,
    },

    /// The inventory reported no adapter of the targeted hardware class.
    #[error("No physical adapters matching '{model}' found")]
    NoHardwareFound {
        /// The hardware model filter that matched nothing.
        model: String,
    },

    /// Reconciliation finished with an empty endpoint set.
    #[error("No SMI endpoint devices resolved after reconciliation")]
    NoEndpointsResolved,

    /// Configuration validation error.
    #[error("Invalid configuration for {field}: {message}")]
    InvalidConfig {
        /// The field that failed validation.
        field: String,
        /// Error message.
        message: String,
    },

    /// Operator prompt could not be shown or answered.
    #[error("Operator interaction failed: {message}")]
    Interaction {
        /// Error message.
        message: String,
    },

    /// Filesystem error (run directory, log sinks).
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Internal error (unexpected state).
    #[error("Internal error: {message}")]
    Internal {
        /// Error message.
        message: String,
    },
}

impl SmiError {
    /// Creates a tool unavailable error.
    pub fn tool_unavailable(tool: impl Into<String>) -> Self {
        Self::ToolUnavailable { tool: tool.into() }
    }

    /// Creates a no hardware found error.
    pub fn no_hardware_found(model: impl Into<String>) -> Self {
        Self::NoHardwareFound {
            model: model.into(),
        }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates an operator interaction error.
    pub fn interaction(message: impl Into<String>) -> Self {
        Self::Interaction {
            message: message.into(),
        }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}
