//! Storage collaborator error types
//!
//! Every failure raised by a [`Store`](super::Store) implementation is a
//! [`StorageError`]. The repository never rewrites these; it carries them to the
//! caller inside a [`RepositoryError`](crate::repository::RepositoryError).
//!
//! # Example
//!
//! ```rust
//! use entity_repository::store::{StorageError, StorageErrorKind, StorageOperation};
//!
//! let error = StorageError::constraint_violation("duplicate key 7").with_context("widgets");
//! assert_eq!(error.operation, StorageOperation::Commit);
//! assert_eq!(error.kind, StorageErrorKind::ConstraintViolation);
//! assert!(!error.is_retriable());
//! ```

use std::fmt;

/// Storage operation being performed when the error occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageOperation {
    /// Executing a query
    Query,
    /// Adding changes to the pending change set
    Stage,
    /// Flushing the pending change set
    Commit,
}

impl fmt::Display for StorageOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Query => write!(f, "query"),
            Self::Stage => write!(f, "stage"),
            Self::Commit => write!(f, "commit"),
        }
    }
}

/// Category of storage error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageErrorKind {
    /// Constraint violation (duplicate key, unique, foreign key)
    ConstraintViolation,
    /// Optimistic concurrency conflict (row changed or vanished)
    ConcurrencyConflict,
    /// Lost or refused connection to the backing store
    ConnectionFailed,
    /// Query could not be executed
    QueryFailed,
    /// Caller cancelled the operation
    Cancelled,
    /// Other/unknown error
    Other,
}

impl fmt::Display for StorageErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConstraintViolation => write!(f, "constraint_violation"),
            Self::ConcurrencyConflict => write!(f, "concurrency_conflict"),
            Self::ConnectionFailed => write!(f, "connection_failed"),
            Self::QueryFailed => write!(f, "query_failed"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Structured storage error with operation context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageError {
    /// The operation being performed when the error occurred
    pub operation: StorageOperation,
    /// The category of error
    pub kind: StorageErrorKind,
    /// Human-readable error message
    pub message: String,
    /// Additional context (e.g., collection name)
    pub context: Option<String>,
}

impl StorageError {
    /// Create a new storage error
    pub fn new(
        operation: StorageOperation,
        kind: StorageErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            operation,
            kind,
            message: message.into(),
            context: None,
        }
    }

    /// Create a constraint violation raised during commit
    pub fn constraint_violation(message: impl Into<String>) -> Self {
        Self::new(
            StorageOperation::Commit,
            StorageErrorKind::ConstraintViolation,
            message,
        )
    }

    /// Create a concurrency conflict raised during commit
    pub fn concurrency_conflict(message: impl Into<String>) -> Self {
        Self::new(
            StorageOperation::Commit,
            StorageErrorKind::ConcurrencyConflict,
            message,
        )
    }

    /// Create a connection failure for the given operation
    pub fn connection_failed(operation: StorageOperation, message: impl Into<String>) -> Self {
        Self::new(operation, StorageErrorKind::ConnectionFailed, message)
    }

    /// Create a query failure
    pub fn query_failed(message: impl Into<String>) -> Self {
        Self::new(
            StorageOperation::Query,
            StorageErrorKind::QueryFailed,
            message,
        )
    }

    /// Create a cancellation error for the given operation
    pub fn cancelled(operation: StorageOperation) -> Self {
        Self::new(
            operation,
            StorageErrorKind::Cancelled,
            "Operation cancelled by caller",
        )
    }

    /// Add context to an existing error
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Check if this error is retriable (transient errors that may succeed on retry)
    pub fn is_retriable(&self) -> bool {
        matches!(
            self.kind,
            StorageErrorKind::ConnectionFailed | StorageErrorKind::ConcurrencyConflict
        )
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Storage {} error during {}: {}",
            self.kind, self.operation, self.message
        )?;
        if let Some(ref ctx) = self.context {
            write!(f, " [context: {}]", ctx)?;
        }
        Ok(())
    }
}

impl std::error::Error for StorageError {}

/// Result type for storage collaborator operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;
