//! Error taxonomy shared by the REST and MCP surfaces
//!
//! Subsystems raise their own error enums; at the edge they collapse into
//! [`KickError`], which knows its HTTP status and which messages are safe to
//! show a caller verbatim.

use axum::http::StatusCode;

use crate::auth::AuthError;
use crate::commands::CommandError;
use crate::logs::LogError;
use crate::queue::QueueError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KickError {
    /// Missing or unrecognized token
    #[error("{0}")]
    Unauthenticated(String),

    /// Known token lacking the required scope
    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    TooLarge(String),

    #[error("Command not allowed: {command}")]
    NotAllowed {
        command: String,
        allowed: Vec<String>,
    },

    #[error("{0}")]
    Unavailable(String),

    /// Detail is logged, never returned
    #[error("{0}")]
    Internal(String),
}

impl KickError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            KickError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            KickError::Forbidden(_) | KickError::NotAllowed { .. } => StatusCode::FORBIDDEN,
            KickError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            KickError::NotFound(_) => StatusCode::NOT_FOUND,
            KickError::TooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            KickError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            KickError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to return to a caller
    pub fn public_message(&self) -> String {
        match self {
            KickError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<AuthError> for KickError {
    fn from(err: AuthError) -> Self {
        if err.is_unauthenticated() {
            KickError::Unauthenticated(err.to_string())
        } else {
            KickError::Forbidden(err.to_string())
        }
    }
}

impl From<LogError> for KickError {
    fn from(err: LogError) -> Self {
        match err {
            LogError::InvalidFilename
            | LogError::ExtensionNotAllowed
            | LogError::InvalidFilter(_) => {
                KickError::InvalidInput(err.to_string())
            }
            LogError::NotFound(_) => KickError::NotFound(err.to_string()),
            LogError::TooLarge { .. } => KickError::TooLarge(err.to_string()),
            LogError::Io(_) => KickError::Internal(err.to_string()),
        }
    }
}

impl From<CommandError> for KickError {
    fn from(err: CommandError) -> Self {
        match err {
            CommandError::NotAllowed(command) => KickError::NotAllowed {
                command,
                allowed: Vec::new(),
            },
        }
    }
}

impl From<QueueError> for KickError {
    fn from(err: QueueError) -> Self {
        KickError::Unavailable(err.to_string())
    }
}
