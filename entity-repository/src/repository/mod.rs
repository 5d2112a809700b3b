//! Generic repository over a storage collaborator
//!
//! This module provides the CRUD facade and the pieces it is built from,
//! giving calling code one interface for every entity type regardless of the
//! store behind it.
//!
//! # Features
//!
//! - **Generic CRUD**: [`Repository`] with add, update, delete and reads, each
//!   mutation committing once
//! - **Soft Delete**: [`Capability`] decides per call between flagging and
//!   physical removal
//! - **Query Composition**: [`QueryOptions`] applies filter, order and include in a
//!   fixed order whatever order they were supplied in
//! - **Lazy Queries**: [`Queryable`] for further composition before execution
//! - **Units of Work**: [`Scope`] for several changes under one commit
//! - **Blocking Access**: [`BlockingRepository`] drives the same async core
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use entity_repository::entity::{Entity, EntityKey};
//! use entity_repository::repository::{OrderBy, QueryOptions, Repository};
//! use entity_repository::store::MemoryStore;
//! use tokio_util::sync::CancellationToken;
//!
//! #[derive(Debug, Clone)]
//! struct Tag {
//!     key: Option<EntityKey>,
//!     label: String,
//! }
//!
//! impl Entity for Tag {
//!     const COLLECTION: &'static str = "tags";
//!
//!     fn key(&self) -> Option<EntityKey> {
//!         self.key
//!     }
//!
//!     fn set_key(&mut self, key: EntityKey) {
//!         self.key = Some(key);
//!     }
//! }
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let tags = Repository::<_, Tag>::new(Arc::new(MemoryStore::new()));
//! let cancel = CancellationToken::new();
//!
//! let mut red = Tag { key: None, label: "red".into() };
//! tags.add(&mut red, &cancel).await.unwrap();
//! tags.add_and_return(Tag { key: None, label: "blue".into() }, &cancel).await.unwrap();
//!
//! let sorted = tags
//!     .get_list(QueryOptions::new().order_by(OrderBy::asc(|t: &Tag| t.label.clone())), &cancel)
//!     .await
//!     .unwrap();
//! assert_eq!(sorted[0].label, "blue");
//!
//! // No soft-delete flag, so the row is removed
//! tags.delete(&mut red, &cancel).await.unwrap();
//! assert_eq!(tags.get_list(QueryOptions::new(), &cancel).await.unwrap().len(), 1);
//! # });
//! ```

mod blocking;
pub mod capability;
mod error;
mod facade;
mod ordering;
mod query;
mod queryable;
mod scope;

#[cfg(test)]
mod fixtures;

// Re-export all public types
pub use blocking::BlockingRepository;
pub use capability::{Capability, DeleteStrategy};
pub use error::{RepositoryError, RepositoryErrorKind, RepositoryOperation, RepositoryResult};
pub use facade::Repository;
pub use ordering::{OrderBy, OrderDirection};
pub use query::{IncludeSet, Predicate, Query, QueryOptions, TrackingMode};
pub use queryable::Queryable;
pub use scope::Scope;
