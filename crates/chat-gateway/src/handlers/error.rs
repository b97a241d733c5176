//! Handler error types

use chat_core::{LogicError, RoomId};
use thiserror::Error;

use crate::connection::BucketError;
use crate::protocol::FrameError;

/// Errors raised while handling a client frame
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Join or TCP frame without an auth token
    #[error("Missing auth token")]
    MissingAuthToken,

    /// TCP frame whose room id is not strictly positive
    #[error("Invalid room id: {0}")]
    InvalidRoomId(RoomId),

    /// Business tier answered with user id 0
    #[error("Join rejected by business tier")]
    Rejected,

    /// Room send before a successful join
    #[error("Connection has not joined")]
    NotJoined,

    #[error("Malformed payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("Business tier error: {0}")]
    Logic(#[from] LogicError),

    #[error("Bucket error: {0}")]
    Bucket(#[from] BucketError),
}

impl HandlerError {
    /// Stable label for structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingAuthToken => "missing_auth_token",
            Self::InvalidRoomId(_) => "invalid_room_id",
            Self::Rejected => "rejected",
            Self::NotJoined => "not_joined",
            Self::Decode(_) => "decode",
            Self::Frame(_) => "frame",
            Self::Logic(_) => "logic",
            Self::Bucket(_) => "bucket",
        }
    }
}

/// Result type for handlers
pub type HandlerResult<T> = Result<T, HandlerError>;
