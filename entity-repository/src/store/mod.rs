//! Storage collaborator interface
//!
//! The repository performs no storage work itself. Everything that touches data
//! goes through a [`Store`]: query materialization, staging of inserts, updates
//! and removals, and committing the pending change set.
//!
//! Implementations own their thread-safety. Staging is synchronous bookkeeping;
//! materialization and commit are the only points where an async store is
//! expected to suspend.
//!
//! # Example
//!
//! ```rust,ignore
//! use entity_repository::store::{Store, StorageResult};
//!
//! struct SqlStore { /* connection, unit of work */ }
//!
//! impl Store for SqlStore {
//!     async fn materialize<E: Entity>(
//!         &self,
//!         query: Query<E>,
//!         cancel: &CancellationToken,
//!     ) -> StorageResult<Vec<E>> {
//!         // Translate filter, order and include into the native query API
//!         todo!()
//!     }
//!
//!     // ... other required methods
//! }
//! ```

mod error;
mod memory;

use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::entity::Entity;
use crate::repository::Query;

pub use error::{StorageError, StorageErrorKind, StorageOperation, StorageResult};
pub use memory::{Catalog, ChangeKind, MemoryStore, StagedChange};

/// Persistent entity store the repository delegates to
///
/// Queries are evaluated in the order filter, order, include. Staged changes
/// stay pending until [`Store::commit`] flushes them as one atomic unit or
/// [`Store::discard`] drops them.
pub trait Store: Send + Sync {
    /// Execute the query and return every matching entity
    fn materialize<E: Entity>(
        &self,
        query: Query<E>,
        cancel: &CancellationToken,
    ) -> impl Future<Output = StorageResult<Vec<E>>> + Send;

    /// Execute the query and return the first matching entity, if any
    ///
    /// Relations are only expanded for the returned entity.
    fn materialize_first<E: Entity>(
        &self,
        query: Query<E>,
        cancel: &CancellationToken,
    ) -> impl Future<Output = StorageResult<Option<E>>> + Send;

    /// Stage entities for insertion
    ///
    /// The store assigns keys to entities that do not carry one yet, writing
    /// them back into the caller's instances.
    fn stage_insert<E: Entity>(&self, entities: &mut [E]) -> StorageResult<()>;

    /// Write keys into entities that do not carry one, without staging them
    ///
    /// Entities keyed this way can be handed to [`Store::stage_insert`] later.
    fn assign_keys<E: Entity>(&self, entities: &mut [E]) -> StorageResult<()>;

    /// Stage entities for update
    fn stage_update<E: Entity>(&self, entities: &[E]) -> StorageResult<()>;

    /// Stage entities for physical removal
    fn stage_remove<E: Entity>(&self, entities: &[E]) -> StorageResult<()>;

    /// Flush the pending change set, returning the number of changes written
    fn commit(&self, cancel: &CancellationToken)
        -> impl Future<Output = StorageResult<usize>> + Send;

    /// Drop the pending change set without writing it
    fn discard(&self);
}
