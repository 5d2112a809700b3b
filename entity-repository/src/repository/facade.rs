//! Generic CRUD facade over a storage collaborator
//!
//! Every mutating operation stages its changes and commits them in the same
//! call. Reads compose their [`QueryOptions`] in the fixed filter, order,
//! include order and never commit.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::capability::{self, Capability, DeleteStrategy};
use super::error::{RepositoryError, RepositoryOperation, RepositoryResult};
use super::query::{QueryOptions, TrackingMode};
use super::queryable::Queryable;
use super::scope::Scope;
use crate::config::RepositoryConfig;
use crate::entity::Entity;
use crate::store::{StorageError, StorageResult, Store};

/// Repository for one entity type over a shared [`Store`]
///
/// # Example
///
/// ```rust,ignore
/// let store = Arc::new(MemoryStore::new());
/// let widgets = Repository::<_, Widget>::new(Arc::clone(&store));
/// let cancel = CancellationToken::new();
///
/// let mut widget = Widget::new("bolt");
/// widgets.add(&mut widget, &cancel).await?;
///
/// // Soft delete: the flag is set and the row stays
/// widgets.delete(&mut widget, &cancel).await?;
///
/// let heavy = widgets
///     .get_list(
///         QueryOptions::new()
///             .filter(|w: &Widget| w.weight > 10)
///             .order_by(OrderBy::desc(|w: &Widget| w.weight)),
///         &cancel,
///     )
///     .await?;
/// ```
pub struct Repository<S, E> {
    store: Arc<S>,
    config: RepositoryConfig,
    _entity: PhantomData<fn() -> E>,
}

impl<S, E> Clone for Repository<S, E> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: self.config,
            _entity: PhantomData,
        }
    }
}

impl<S, E: Entity> fmt::Debug for Repository<S, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("collection", &E::COLLECTION)
            .field("config", &self.config)
            .finish()
    }
}

impl<S: Store, E: Entity> Repository<S, E> {
    /// Create a repository with the default configuration
    pub fn new(store: Arc<S>) -> Self {
        Self::with_config(store, RepositoryConfig::default())
    }

    /// Create a repository with an explicit configuration
    pub fn with_config(store: Arc<S>, config: RepositoryConfig) -> Self {
        Self {
            store,
            config,
            _entity: PhantomData,
        }
    }

    /// The underlying store
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// The repository configuration
    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    /// Tracking mode applied when a read does not choose one
    pub fn default_tracking(&self) -> TrackingMode {
        TrackingMode::from_disable_flag(self.config.disable_tracking)
    }

    /// Insert an entity and commit
    ///
    /// The store-assigned key is written back into `entity`.
    pub async fn add(&self, entity: &mut E, cancel: &CancellationToken) -> RepositoryResult<usize> {
        self.add_many(std::slice::from_mut(entity), cancel).await
    }

    /// Insert entities and commit once
    pub async fn add_many(
        &self,
        entities: &mut [E],
        cancel: &CancellationToken,
    ) -> RepositoryResult<usize> {
        let staged = self.store.stage_insert(entities);
        self.persist(RepositoryOperation::Add, staged, cancel).await
    }

    /// Insert an entity, commit, and return it with its generated key
    pub async fn add_and_return(
        &self,
        mut entity: E,
        cancel: &CancellationToken,
    ) -> RepositoryResult<E> {
        self.add(&mut entity, cancel).await?;
        Ok(entity)
    }

    /// Update an entity and commit
    pub async fn update(&self, entity: &E, cancel: &CancellationToken) -> RepositoryResult<usize> {
        self.update_many(std::slice::from_ref(entity), cancel).await
    }

    /// Update entities and commit once
    pub async fn update_many(
        &self,
        entities: &[E],
        cancel: &CancellationToken,
    ) -> RepositoryResult<usize> {
        let staged = self.store.stage_update(entities);
        self.persist(RepositoryOperation::Update, staged, cancel).await
    }

    /// Delete an entity and commit
    ///
    /// Soft-delete capable entities have their flag set and are persisted as an
    /// update; all others are physically removed.
    pub async fn delete(&self, entity: &mut E, cancel: &CancellationToken) -> RepositoryResult<usize> {
        self.delete_many(std::slice::from_mut(entity), cancel).await
    }

    /// Delete entities and commit once
    ///
    /// The batch is classified by its first element and that strategy applies
    /// to every element. With `reject_mixed_capability` set, a batch whose
    /// elements disagree is refused instead.
    ///
    /// # Errors
    ///
    /// `EmptyInput` (and `MixedCapability` when configured) are raised before
    /// the store is touched. When staging or the commit fails, soft-deleted
    /// entities get their previous flag values back.
    pub async fn delete_many(
        &self,
        entities: &mut [E],
        cancel: &CancellationToken,
    ) -> RepositoryResult<usize> {
        match classify_delete(&self.config, entities)? {
            DeleteStrategy::PhysicalRemove => {
                let staged = self.store.stage_remove(entities);
                self.persist(RepositoryOperation::Delete, staged, cancel).await
            }
            DeleteStrategy::SoftFlag => {
                let previous: Vec<_> = entities.iter_mut().map(capability::mark_deleted).collect();
                let staged = self.store.stage_update(entities);
                let result = self.persist(RepositoryOperation::Delete, staged, cancel).await;
                if result.is_err() {
                    for (entity, previous) in entities.iter_mut().zip(previous) {
                        capability::restore_deleted(entity, previous);
                    }
                }
                result
            }
        }
    }

    /// First entity matching the options, or `None`
    pub async fn get_first_or_default(
        &self,
        options: QueryOptions<E>,
        cancel: &CancellationToken,
    ) -> RepositoryResult<Option<E>> {
        let query = options.compose(self.default_tracking());
        self.store
            .materialize_first(query, cancel)
            .await
            .map_err(|e| query_error::<E>(RepositoryOperation::GetFirstOrDefault, e))
    }

    /// Every entity matching the options
    pub async fn get_list(
        &self,
        options: QueryOptions<E>,
        cancel: &CancellationToken,
    ) -> RepositoryResult<Vec<E>> {
        let query = options.compose(self.default_tracking());
        self.store
            .materialize(query, cancel)
            .await
            .map_err(|e| query_error::<E>(RepositoryOperation::GetList, e))
    }

    /// Lazy, further composable query over the options
    ///
    /// Nothing is executed until [`Queryable::to_list`] or [`Queryable::first`].
    pub fn get_queryable(&self, options: QueryOptions<E>) -> Queryable<'_, S, E> {
        Queryable::new(self.store.as_ref(), options.compose(self.default_tracking()))
    }

    /// Start an explicit unit of work that commits once
    pub fn scope(&self) -> Scope<'_, S, E> {
        Scope::new(self)
    }

    async fn persist(
        &self,
        operation: RepositoryOperation,
        staged: StorageResult<()>,
        cancel: &CancellationToken,
    ) -> RepositoryResult<usize> {
        staged.map_err(|e| commit_error::<E>(operation, e))?;
        commit::<S, E>(self.store.as_ref(), operation, cancel).await
    }
}

/// Probe the batch and pick the delete strategy for all of it
pub(crate) fn classify_delete<E: Entity>(
    config: &RepositoryConfig,
    entities: &[E],
) -> RepositoryResult<DeleteStrategy> {
    let capability = if config.reject_mixed_capability {
        Capability::ensure_uniform(entities)
    } else {
        Capability::of_batch(entities)
    }
    .map_err(|e| e.with_operation(RepositoryOperation::Delete))?;

    let strategy = capability.strategy();
    tracing::debug!(
        collection = E::COLLECTION,
        strategy = %strategy,
        count = entities.len(),
        "Delete classified"
    );
    Ok(strategy)
}

/// Commit the pending set, discarding it if the store refuses
pub(crate) async fn commit<S: Store, E: Entity>(
    store: &S,
    operation: RepositoryOperation,
    cancel: &CancellationToken,
) -> RepositoryResult<usize> {
    match store.commit(cancel).await {
        Ok(count) => {
            tracing::debug!(
                collection = E::COLLECTION,
                operation = %operation,
                count,
                "Changes committed"
            );
            Ok(count)
        }
        Err(error) => {
            store.discard();
            Err(commit_error::<E>(operation, error))
        }
    }
}

pub(crate) fn commit_error<E: Entity>(
    operation: RepositoryOperation,
    error: StorageError,
) -> RepositoryError {
    tracing::warn!(
        collection = E::COLLECTION,
        operation = %operation,
        error = %error,
        "Storage rejected changes"
    );
    RepositoryError::storage_commit(operation, error).with_entity_type(E::COLLECTION)
}

pub(crate) fn query_error<E: Entity>(
    operation: RepositoryOperation,
    error: StorageError,
) -> RepositoryError {
    tracing::warn!(
        collection = E::COLLECTION,
        operation = %operation,
        error = %error,
        "Storage query failed"
    );
    RepositoryError::storage_query(operation, error).with_entity_type(E::COLLECTION)
}
