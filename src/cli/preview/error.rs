//! Request error types.

use thiserror::Error;

use crate::core::is_not_found;

/// Errors raised while resolving a request.
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ServeError {
    pub fn status(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::InvalidPath(_) | Self::Internal(_) => 500,
        }
    }

    /// `NotFound(what)` if `err` is a missing file, otherwise `Internal`.
    pub fn absent_or(err: anyhow::Error, what: impl Into<String>) -> Self {
        if is_not_found(&err) {
            Self::NotFound(what.into())
        } else {
            Self::Internal(err)
        }
    }
}

impl From<std::io::Error> for ServeError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.into())
    }
}
