use thiserror::Error;
use crate::validator::TransitionError;

pub type Result<T> = std::result::Result<T, TripError>;

#[derive(Error, Debug)]
pub enum TripError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Access forbidden: {0}")]
    Forbidden(String),

    #[error("Forbidden transition: {0}")]
    Transition(#[from] TransitionError),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Ledger error: {0}")]
    Ledger(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(String),
}

/// Coarse classification handed to whatever boundary surfaces the error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    BadRequest,
    Forbidden,
    NotFound,
    Internal,
}

impl TripError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TripError::BadRequest(_) => ErrorKind::BadRequest,
            TripError::Forbidden(_) | TripError::Transition(_) => ErrorKind::Forbidden,
            TripError::NotFound(_) => ErrorKind::NotFound,
            TripError::Serialization(_)
            | TripError::Database(_)
            | TripError::Ledger(_)
            | TripError::Config(_)
            | TripError::Io(_) => ErrorKind::Internal,
        }
    }
}

impl From<serde_json::Error> for TripError {
    fn from(err: serde_json::Error) -> Self {
        TripError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for TripError {
    fn from(err: std::io::Error) -> Self {
        TripError::Io(err.to_string())
    }
}
