//! Client Error Taxonomy
//!
//! Every failure the orchestration layer can observe falls into one of a small
//! number of kinds. None of them is fatal: the Conductor and the instruction
//! engine convert each one into a visible error turn or a notification, and the
//! existing turn log is never touched.

use thiserror::Error;

use crate::capability::{Capability, NativeErrorCode};

/// Errors produced by the Backend Client
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    /// Network unreachable, connection reset, or timeout
    #[error("transport error: {0}")]
    Transport(String),

    /// The backend answered but the body could not be understood
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The backend answered with a non-success HTTP status
    #[error("backend returned {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body (possibly truncated)
        body: String,
    },
}

impl BackendError {
    /// Build a transport error for an expired deadline
    #[must_use]
    pub fn timeout(after: std::time::Duration) -> Self {
        Self::Transport(format!("request timed out after {}s", after.as_secs()))
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Protocol(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Errors surfaced by the orchestration layer
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    /// Network unreachable or timed out
    #[error("transport error: {0}")]
    Transport(String),

    /// Malformed backend response
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A device capability was not granted
    #[error("permission denied for {0}")]
    PermissionDenied(Capability),

    /// A directive is missing required fields
    #[error("invalid directive: {0}")]
    InvalidDirective(String),

    /// The platform bridge reported a failure
    #[error("native action failed ({code}): {detail}")]
    NativeAction {
        /// Enumerated bridge error code
        code: NativeErrorCode,
        /// Human-readable detail from the platform
        detail: String,
    },

    /// A local resource (e.g. a selected image) could not be read
    #[error("attachment error: {0}")]
    Attachment(String),
}

impl ClientError {
    /// Whether the session can simply continue after this error
    ///
    /// Every kind is recoverable from the session's point of view; the
    /// distinction is whether retrying the same action could succeed.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::NativeAction { .. })
    }

    /// Text suitable for an error turn in the conversation
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Transport(detail) => {
                format!("Couldn't reach the assistant: {detail}")
            }
            Self::Protocol(detail) => {
                format!("The assistant sent a response I couldn't read: {detail}")
            }
            Self::PermissionDenied(capability) => {
                format!("Permission to use {capability} was not granted.")
            }
            Self::InvalidDirective(detail) => {
                format!("I couldn't carry out that action: {detail}")
            }
            Self::NativeAction { code, detail } => {
                format!("The device reported an error ({code}): {detail}")
            }
            Self::Attachment(detail) => format!("Couldn't use that image: {detail}"),
        }
    }
}

impl From<BackendError> for ClientError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Transport(detail) => Self::Transport(detail),
            BackendError::Protocol(detail) => Self::Protocol(detail),
            BackendError::Status { status, body } => {
                if status >= 500 {
                    Self::Transport(format!("backend returned {status}: {body}"))
                } else {
                    Self::Protocol(format!("backend returned {status}: {body}"))
                }
            }
        }
    }
}
