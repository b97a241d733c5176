//! Server startup errors

use chat_common::AppError;
use thiserror::Error;

/// Failures that keep the gateway from starting or serving
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server is missing {0}")]
    MissingDependency(&'static str),

    #[error("Listener failed: {0}")]
    Serve(#[source] std::io::Error),

    #[error("Logic client error: {0}")]
    LogicClient(String),
}

impl ServerError {
    pub fn bind(addr: impl std::fmt::Display, source: std::io::Error) -> Self {
        Self::Bind {
            addr: addr.to_string(),
            source,
        }
    }
}

pub type ServerResult<T> = Result<T, ServerError>;

impl From<ServerError> for AppError {
    fn from(err: ServerError) -> Self {
        match err {
            ServerError::Bind { addr, source } => AppError::bind(addr, source),
            other => AppError::internal(other),
        }
    }
}
