//! Repository error types
//!
//! This module provides structured error types for repository operations,
//! allowing fine-grained error handling and meaningful error messages.
//!
//! Storage failures are never rewritten: the collaborator's [`StorageError`] is
//! kept as-is and exposed through [`RepositoryError::storage_error`] and
//! [`std::error::Error::source`].
//!
//! # Example
//!
//! ```rust
//! use entity_repository::repository::{RepositoryError, RepositoryErrorKind, RepositoryOperation};
//!
//! let error = RepositoryError::empty_input(RepositoryOperation::Delete).with_entity_type("widgets");
//! assert!(matches!(error.kind, RepositoryErrorKind::EmptyInput));
//! assert!(error.storage_error().is_none());
//! ```

use std::fmt;

use crate::store::StorageError;

/// Operation being performed when the repository error occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepositoryOperation {
    /// Inserting one or more entities
    Add,
    /// Updating one or more entities
    Update,
    /// Deleting one or more entities (physical or soft)
    Delete,
    /// Classifying entities for the delete strategy
    Classify,
    /// Fetching the first matching entity
    GetFirstOrDefault,
    /// Fetching every matching entity
    GetList,
    /// Committing an explicit scope
    ScopeCommit,
}

impl fmt::Display for RepositoryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add => write!(f, "add"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
            Self::Classify => write!(f, "classify"),
            Self::GetFirstOrDefault => write!(f, "get_first_or_default"),
            Self::GetList => write!(f, "get_list"),
            Self::ScopeCommit => write!(f, "scope_commit"),
        }
    }
}

/// Category of repository error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepositoryErrorKind {
    /// A batch operation received an empty collection
    EmptyInput,
    /// A batch mixed soft-delete capable and non-capable entities
    MixedCapability,
    /// The store failed while staging or committing changes
    StorageCommit,
    /// The store failed while executing a query
    StorageQuery,
}

impl fmt::Display for RepositoryErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyInput => write!(f, "empty_input"),
            Self::MixedCapability => write!(f, "mixed_capability"),
            Self::StorageCommit => write!(f, "storage_commit"),
            Self::StorageQuery => write!(f, "storage_query"),
        }
    }
}

/// Structured repository error with operation context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryError {
    /// The operation being performed when the error occurred
    pub operation: RepositoryOperation,
    /// The category of error
    pub kind: RepositoryErrorKind,
    /// Human-readable error message
    pub message: String,
    /// The collection of the entity type involved (e.g., "widgets")
    pub entity_type: Option<String>,
    /// The unmodified storage failure, for storage kinds
    storage: Option<StorageError>,
}

impl RepositoryError {
    /// Create a new repository error
    pub fn new(
        operation: RepositoryOperation,
        kind: RepositoryErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            operation,
            kind,
            message: message.into(),
            entity_type: None,
            storage: None,
        }
    }

    /// Create an "empty input" error
    pub fn empty_input(operation: RepositoryOperation) -> Self {
        Self::new(
            operation,
            RepositoryErrorKind::EmptyInput,
            "Operation requires at least one entity",
        )
    }

    /// Create a "mixed capability" error
    pub fn mixed_capability(operation: RepositoryOperation, position: usize) -> Self {
        Self::new(
            operation,
            RepositoryErrorKind::MixedCapability,
            format!(
                "Entity at position {} does not share the soft-delete capability of the first entity",
                position
            ),
        )
    }

    /// Wrap a storage failure raised while staging or committing
    pub fn storage_commit(operation: RepositoryOperation, error: StorageError) -> Self {
        Self {
            operation,
            kind: RepositoryErrorKind::StorageCommit,
            message: error.message.clone(),
            entity_type: None,
            storage: Some(error),
        }
    }

    /// Wrap a storage failure raised while executing a query
    pub fn storage_query(operation: RepositoryOperation, error: StorageError) -> Self {
        Self {
            operation,
            kind: RepositoryErrorKind::StorageQuery,
            message: error.message.clone(),
            entity_type: None,
            storage: Some(error),
        }
    }

    /// Add entity type context to an existing error
    #[must_use]
    pub fn with_entity_type(mut self, entity_type: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self
    }

    /// Set the operation that caused the error
    #[must_use]
    pub fn with_operation(mut self, operation: RepositoryOperation) -> Self {
        self.operation = operation;
        self
    }

    /// The storage failure exactly as the collaborator reported it
    pub fn storage_error(&self) -> Option<&StorageError> {
        self.storage.as_ref()
    }

    /// Consume the error, returning the storage failure if there is one
    pub fn into_storage_error(self) -> Option<StorageError> {
        self.storage
    }

    /// Check if this error is retriable (transient storage errors only)
    pub fn is_retriable(&self) -> bool {
        self.storage
            .as_ref()
            .is_some_and(StorageError::is_retriable)
    }
}

impl fmt::Display for RepositoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Repository {} error during {}: {}",
            self.kind, self.operation, self.message
        )?;
        if let Some(ref entity_type) = self.entity_type {
            write!(f, " [{}]", entity_type)?;
        }
        Ok(())
    }
}

impl std::error::Error for RepositoryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.storage
            .as_ref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Result type for repository operations
pub type RepositoryResult<T> = std::result::Result<T, RepositoryError>;
