//! Explicit unit of work
//!
//! A [`Scope`] collects adds, updates and deletes without touching the store's
//! pending set. [`Scope::commit`] hands everything to the store and commits it
//! once; [`Scope::rollback`], or dropping the scope unfinished, throws the
//! collected changes away. Mutations made through the repository while a scope
//! is open neither include nor discard its changes.

use tokio_util::sync::CancellationToken;

use super::capability::{self, DeleteStrategy};
use super::error::{RepositoryOperation, RepositoryResult};
use super::facade::{classify_delete, commit, commit_error, Repository};
use crate::entity::Entity;
use crate::store::{StorageResult, Store};

enum Staged<E> {
    Insert(Vec<E>),
    Update(Vec<E>),
    Remove(Vec<E>),
}

impl<E: Entity> Staged<E> {
    fn len(&self) -> usize {
        match self {
            Self::Insert(rows) | Self::Update(rows) | Self::Remove(rows) => rows.len(),
        }
    }

    fn stage<S: Store>(self, store: &S) -> StorageResult<()> {
        match self {
            Self::Insert(mut rows) => store.stage_insert(&mut rows),
            Self::Update(rows) => store.stage_update(&rows),
            Self::Remove(rows) => store.stage_remove(&rows),
        }
    }
}

/// Pending changes awaiting a single commit
///
/// Inserted entities receive their keys when they are added to the scope.
/// Soft-deleted entities are flagged at that point too and stay flagged if
/// the scope is rolled back.
///
/// # Example
///
/// ```rust,ignore
/// let mut scope = widgets.scope();
/// scope.add(&mut fresh)?;
/// scope.delete(&mut stale)?;
/// scope.commit(&cancel).await?;
/// ```
#[must_use = "an uncommitted scope discards its changes when dropped"]
pub struct Scope<'r, S: Store, E: Entity> {
    repository: &'r Repository<S, E>,
    changes: Vec<Staged<E>>,
    finished: bool,
}

impl<'r, S: Store, E: Entity> Scope<'r, S, E> {
    pub(crate) fn new(repository: &'r Repository<S, E>) -> Self {
        Self {
            repository,
            changes: Vec::new(),
            finished: false,
        }
    }

    /// Number of entities staged so far
    pub fn staged_count(&self) -> usize {
        self.changes.iter().map(Staged::len).sum()
    }

    /// Stage an insert; the store-assigned key is written back
    pub fn add(&mut self, entity: &mut E) -> RepositoryResult<()> {
        self.add_many(std::slice::from_mut(entity))
    }

    /// Stage inserts
    pub fn add_many(&mut self, entities: &mut [E]) -> RepositoryResult<()> {
        self.store()
            .assign_keys(entities)
            .map_err(|e| commit_error::<E>(RepositoryOperation::Add, e))?;
        self.changes.push(Staged::Insert(entities.to_vec()));
        Ok(())
    }

    /// Stage an update
    pub fn update(&mut self, entity: &E) -> RepositoryResult<()> {
        self.update_many(std::slice::from_ref(entity))
    }

    /// Stage updates
    pub fn update_many(&mut self, entities: &[E]) -> RepositoryResult<()> {
        self.changes.push(Staged::Update(entities.to_vec()));
        Ok(())
    }

    /// Stage a delete using the entity's capability
    pub fn delete(&mut self, entity: &mut E) -> RepositoryResult<DeleteStrategy> {
        self.delete_many(std::slice::from_mut(entity))
    }

    /// Stage a batch delete, classified like `Repository::delete_many`
    pub fn delete_many(&mut self, entities: &mut [E]) -> RepositoryResult<DeleteStrategy> {
        let strategy = classify_delete(self.repository.config(), entities)?;
        let staged = match strategy {
            DeleteStrategy::SoftFlag => {
                for entity in entities.iter_mut() {
                    capability::mark_deleted(entity);
                }
                Staged::Update(entities.to_vec())
            }
            DeleteStrategy::PhysicalRemove => Staged::Remove(entities.to_vec()),
        };
        self.changes.push(staged);
        Ok(strategy)
    }

    /// Stage every collected change and commit them at once
    pub async fn commit(mut self, cancel: &CancellationToken) -> RepositoryResult<usize> {
        self.finished = true;
        let store = self.store();
        let staged = std::mem::take(&mut self.changes)
            .into_iter()
            .try_for_each(|change| change.stage(store));
        if let Err(error) = staged {
            store.discard();
            return Err(commit_error::<E>(RepositoryOperation::ScopeCommit, error));
        }
        commit::<S, E>(store, RepositoryOperation::ScopeCommit, cancel).await
    }

    /// Discard every staged change
    pub fn rollback(mut self) {
        self.finished = true;
        tracing::debug!(
            collection = E::COLLECTION,
            staged = self.staged_count(),
            "Scope rolled back"
        );
        self.changes.clear();
    }

    fn store(&self) -> &'r S {
        self.repository.store().as_ref()
    }
}

impl<S: Store, E: Entity> Drop for Scope<'_, S, E> {
    fn drop(&mut self) {
        if !self.finished && !self.changes.is_empty() {
            tracing::warn!(
                collection = E::COLLECTION,
                staged = self.staged_count(),
                "Scope dropped without commit, changes discarded"
            );
        }
    }
}
