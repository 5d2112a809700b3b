//! Blocking adapter over the async repository
//!
//! Each call drives the corresponding async operation to completion on a
//! current-thread tokio runtime, so both forms share one implementation.
//! Calling these methods from inside an async context panics (tokio refuses to
//! block a runtime thread); use [`Repository`] there instead.

use std::sync::Arc;

use tokio::runtime::{Builder, Runtime};
use tokio_util::sync::CancellationToken;

use super::error::RepositoryResult;
use super::facade::Repository;
use super::query::QueryOptions;
use super::queryable::Queryable;
use crate::entity::Entity;
use crate::error::Result;
use crate::store::Store;

/// Synchronous CRUD surface
pub struct BlockingRepository<S, E> {
    inner: Repository<S, E>,
    runtime: Arc<Runtime>,
    cancel: CancellationToken,
}

impl<S: Store, E: Entity> BlockingRepository<S, E> {
    /// Wrap a repository with its own current-thread runtime
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the runtime cannot be built.
    pub fn new(repository: Repository<S, E>) -> Result<Self> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        Ok(Self::with_runtime(repository, Arc::new(runtime)))
    }

    /// Wrap a repository, sharing an existing runtime
    pub fn with_runtime(repository: Repository<S, E>, runtime: Arc<Runtime>) -> Self {
        Self {
            inner: repository,
            runtime,
            cancel: CancellationToken::new(),
        }
    }

    /// The wrapped async repository
    pub fn repository(&self) -> &Repository<S, E> {
        &self.inner
    }

    /// Token passed to every operation; cancelling it fails later calls
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// See [`Repository::add`]
    pub fn add(&self, entity: &mut E) -> RepositoryResult<usize> {
        self.runtime.block_on(self.inner.add(entity, &self.cancel))
    }

    /// See [`Repository::add_many`]
    pub fn add_many(&self, entities: &mut [E]) -> RepositoryResult<usize> {
        self.runtime.block_on(self.inner.add_many(entities, &self.cancel))
    }

    /// See [`Repository::add_and_return`]
    pub fn add_and_return(&self, entity: E) -> RepositoryResult<E> {
        self.runtime
            .block_on(self.inner.add_and_return(entity, &self.cancel))
    }

    /// See [`Repository::update`]
    pub fn update(&self, entity: &E) -> RepositoryResult<usize> {
        self.runtime.block_on(self.inner.update(entity, &self.cancel))
    }

    /// See [`Repository::update_many`]
    pub fn update_many(&self, entities: &[E]) -> RepositoryResult<usize> {
        self.runtime
            .block_on(self.inner.update_many(entities, &self.cancel))
    }

    /// See [`Repository::delete`]
    pub fn delete(&self, entity: &mut E) -> RepositoryResult<usize> {
        self.runtime.block_on(self.inner.delete(entity, &self.cancel))
    }

    /// See [`Repository::delete_many`]
    pub fn delete_many(&self, entities: &mut [E]) -> RepositoryResult<usize> {
        self.runtime
            .block_on(self.inner.delete_many(entities, &self.cancel))
    }

    /// See [`Repository::get_first_or_default`]
    pub fn get_first_or_default(&self, options: QueryOptions<E>) -> RepositoryResult<Option<E>> {
        self.runtime
            .block_on(self.inner.get_first_or_default(options, &self.cancel))
    }

    /// See [`Repository::get_list`]
    pub fn get_list(&self, options: QueryOptions<E>) -> RepositoryResult<Vec<E>> {
        self.runtime
            .block_on(self.inner.get_list(options, &self.cancel))
    }

    /// See [`Repository::get_queryable`]; execute with [`Self::to_list`] or [`Self::first`]
    pub fn get_queryable(&self, options: QueryOptions<E>) -> Queryable<'_, S, E> {
        self.inner.get_queryable(options)
    }

    /// Execute a queryable and return every matching entity
    pub fn to_list(&self, queryable: Queryable<'_, S, E>) -> RepositoryResult<Vec<E>> {
        self.runtime.block_on(queryable.to_list(&self.cancel))
    }

    /// Execute a queryable and return the first matching entity
    pub fn first(&self, queryable: Queryable<'_, S, E>) -> RepositoryResult<Option<E>> {
        self.runtime.block_on(queryable.first(&self.cancel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixtures::{self, tag, Tag, Widget};
    use crate::repository::{OrderBy, RepositoryErrorKind};
    use crate::store::{ChangeKind, MemoryStore, StorageErrorKind};

    fn runtime() -> Runtime {
        Builder::new_current_thread().enable_all().build().unwrap()
    }

    fn seeded(runtime: &Runtime) -> Arc<MemoryStore> {
        runtime.block_on(fixtures::seeded()).0
    }

    #[test]
    fn test_blocking_and_async_reads_agree() {
        let async_runtime = runtime();
        let store = seeded(&async_runtime);
        let repo = Repository::<_, Widget>::new(Arc::clone(&store));
        let blocking = BlockingRepository::new(repo.clone()).unwrap();
        let cancel = CancellationToken::new();

        let options = || {
            QueryOptions::new()
                .filter(|w: &Widget| w.weight > 4)
                .order_by(OrderBy::desc(|w: &Widget| w.weight))
                .include("tag")
        };

        let expected = async_runtime
            .block_on(repo.get_list(options(), &cancel))
            .unwrap();
        assert_eq!(blocking.get_list(options()).unwrap(), expected);

        let expected_first = async_runtime
            .block_on(repo.get_first_or_default(options(), &cancel))
            .unwrap();
        assert_eq!(blocking.get_first_or_default(options()).unwrap(), expected_first);

        let queryable = blocking.get_queryable(options());
        assert_eq!(blocking.to_list(queryable).unwrap(), expected);
    }

    #[test]
    fn test_blocking_crud() {
        let store = seeded(&runtime());
        let blocking = BlockingRepository::new(Repository::<_, Tag>::new(Arc::clone(&store))).unwrap();

        let mut green = tag("green");
        assert_eq!(blocking.add(&mut green).unwrap(), 1);
        green.label = "lime".to_string();
        blocking.update(&green).unwrap();
        blocking.delete(&mut green).unwrap();

        assert_eq!(store.journal().last().map(|c| c.kind), Some(ChangeKind::Remove));
        let labels: Vec<_> = blocking
            .get_list(QueryOptions::new())
            .unwrap()
            .into_iter()
            .map(|t| t.label)
            .collect();
        assert_eq!(labels, vec!["red", "blue"]);

        let error = blocking.delete_many(&mut []).unwrap_err();
        assert_eq!(error.kind, RepositoryErrorKind::EmptyInput);
    }

    #[test]
    fn test_shared_runtime_and_cancellation() {
        let runtime = Arc::new(runtime());
        let store = seeded(&runtime);
        let blocking = BlockingRepository::with_runtime(
            Repository::<_, Widget>::new(Arc::clone(&store)),
            Arc::clone(&runtime),
        );

        let queryable = blocking
            .get_queryable(QueryOptions::new())
            .order_by(OrderBy::asc(|w: &Widget| w.weight));
        assert_eq!(blocking.first(queryable).unwrap().map(|w| w.name), Some("nut".to_string()));

        blocking.cancellation_token().cancel();
        let error = blocking.get_list(QueryOptions::new()).unwrap_err();
        assert_eq!(
            error.storage_error().map(|e| e.kind),
            Some(StorageErrorKind::Cancelled)
        );
    }
}
