//! Error types for fiberlink
//!
//! Every failure the bridge can observe is a [`BridgeError`]. Errors tied to a
//! pending run settle that run's future; errors with no addressable run go to
//! the bridge's error handler; caller misuse is returned synchronously.

use thiserror::Error;

use crate::fiber::ScriptId;
use crate::status::ScriptStatus;

/// Result type alias for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Structured error types for script bridge operations
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BridgeError {
    /// Start was called while the script was not startable
    #[error("Script {id} cannot start while {status}")]
    InvalidState { id: ScriptId, status: ScriptStatus },

    /// Operation on a disposed script handle
    #[error("Script {0} is already disposed")]
    UseAfterDispose(ScriptId),

    /// The native VM reported an error for a running script
    #[error("Script error: {0}")]
    ScriptExecution(String),

    /// A native upcall referenced a script id the registry does not know
    #[error("Unrouteable upcall for script {id}: {detail}")]
    Unrouteable { id: ScriptId, detail: String },

    /// A system command needs a facility that is not configured
    #[error("{command} is not supported: {reason}")]
    NotSupported { command: String, reason: String },

    /// A forwarded command failed inside the host router
    #[error("Command `{command}` failed: {message}")]
    ForwardedHandler { command: String, message: String },

    /// The run was canceled through its cancellation token
    #[error("Script run was canceled")]
    Canceled,

    /// A second live script was registered under an id already in use
    #[error("Script {0} is already registered")]
    DuplicateScript(ScriptId),

    /// A command payload could not be decoded
    #[error("Codec error in `{command}`: {message}")]
    Codec { command: String, message: String },

    /// Invalid bridge configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl BridgeError {
    /// Create a script execution error
    pub fn script_execution(message: impl Into<String>) -> Self {
        Self::ScriptExecution(message.into())
    }

    /// Create an unsupported-command error
    pub fn not_supported(command: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::NotSupported {
            command: command.into(),
            reason: reason.into(),
        }
    }

    /// Create a codec error
    pub fn codec(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Codec {
            command: command.into(),
            message: message.into(),
        }
    }

    /// Check if this error is the cancellation outcome of a run
    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled)
    }

    /// Script id carried by the error, if any
    pub fn script_id(&self) -> Option<ScriptId> {
        match self {
            Self::InvalidState { id, .. } | Self::Unrouteable { id, .. } => Some(*id),
            Self::UseAfterDispose(id) | Self::DuplicateScript(id) => Some(*id),
            _ => None,
        }
    }

    /// Short stable name of the error kind, used as a log field
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidState { .. } => "InvalidState",
            Self::UseAfterDispose(_) => "UseAfterDispose",
            Self::ScriptExecution(_) => "ScriptExecution",
            Self::Unrouteable { .. } => "Unrouteable",
            Self::NotSupported { .. } => "NotSupported",
            Self::ForwardedHandler { .. } => "ForwardedHandler",
            Self::Canceled => "Canceled",
            Self::DuplicateScript(_) => "DuplicateScript",
            Self::Codec { .. } => "Codec",
            Self::Config(_) => "Config",
        }
    }
}
