//! Domain errors - failures reported by the gateway's external collaborators

use thiserror::Error;

/// Failure of a remote call to the business tier
#[derive(Debug, Error)]
pub enum LogicError {
    #[error("Business tier unreachable: {0}")]
    Unavailable(String),

    #[error("Business tier returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Business tier call timed out")]
    Timeout,

    #[error("Malformed business tier response: {0}")]
    InvalidResponse(String),

    #[error("Business tier refused the call (code {code}): {msg}")]
    Refused { code: i32, msg: String },
}

impl LogicError {
    /// Whether the remote side actively answered (as opposed to being unreachable)
    pub fn is_remote_answer(&self) -> bool {
        matches!(
            self,
            Self::Status { .. } | Self::InvalidResponse(_) | Self::Refused { .. }
        )
    }
}

/// Failure of the service registry backend
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Registry backend error: {0}")]
    Backend(String),

    #[error("Invalid registry entry at {key}: {reason}")]
    InvalidEntry { key: String, reason: String },
}
