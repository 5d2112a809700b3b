//! Crate-level error type
//!
//! Repository operations return [`RepositoryResult`](crate::repository::RepositoryResult)
//! directly. [`Error`] collects everything else that can fail around them
//! (configuration loading, runtime construction for the blocking adapter) and
//! also converts from [`RepositoryError`] so applications can use one `?`
//! chain.

use thiserror::Error;

use crate::repository::RepositoryError;

/// Result type alias using the crate error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the crate
///
/// Large error variants are boxed to reduce stack size
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(Box<figment::Error>),

    /// Structured repository error with operation context
    #[error("{0}")]
    Repository(#[from] RepositoryError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(Box::new(err))
    }
}

impl Error {
    /// The repository error, if this is one
    pub fn as_repository(&self) -> Option<&RepositoryError> {
        match self {
            Self::Repository(err) => Some(err),
            _ => None,
        }
    }
}
