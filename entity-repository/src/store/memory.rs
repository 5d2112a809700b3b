//! In-process reference store
//!
//! [`MemoryStore`] keeps one ordered table per entity collection and a pending
//! change set that is validated and applied atomically on commit. It exists so
//! repositories can run end to end without a database. A store created with
//! [`MemoryStore::recording`] also keeps a journal of staging calls so tests can
//! assert on dispatch decisions.

use std::any::Any;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;

use super::error::{StorageError, StorageErrorKind, StorageOperation, StorageResult};
use super::Store;
use crate::entity::{Entity, EntityKey};
use crate::repository::Query;

type Tables = HashMap<&'static str, Box<dyn Any + Send + Sync>>;
type Table<E> = BTreeMap<EntityKey, E>;
type Expander<E> = Arc<dyn Fn(&mut E, &Catalog<'_>) + Send + Sync>;
type Apply = Box<dyn FnOnce(&mut Tables) -> StorageResult<()> + Send>;

/// Kind of change staged against the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// A new record
    Insert,
    /// A replacement of an existing record
    Update,
    /// A physical removal
    Remove,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Insert => write!(f, "insert"),
            Self::Update => write!(f, "update"),
            Self::Remove => write!(f, "remove"),
        }
    }
}

/// One staging call received by the store, in arrival order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StagedChange {
    /// What was staged
    pub kind: ChangeKind,
    /// Collection of the staged entity
    pub collection: &'static str,
    /// Key of the staged entity
    pub key: EntityKey,
}

/// Read-only view over committed rows, handed to include expanders
pub struct Catalog<'a> {
    tables: &'a Tables,
}

impl Catalog<'_> {
    /// Every committed row of a collection, in key order
    pub fn all<R: Entity>(&self) -> Vec<R> {
        self.rows::<R>()
            .map(|table| table.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Committed rows of a collection matching the predicate, in key order
    pub fn filter<R: Entity>(&self, predicate: impl Fn(&R) -> bool) -> Vec<R> {
        self.rows::<R>()
            .map(|table| table.values().filter(|r| predicate(*r)).cloned().collect())
            .unwrap_or_default()
    }

    /// A committed row by key
    pub fn find<R: Entity>(&self, key: EntityKey) -> Option<R> {
        self.rows::<R>().and_then(|table| table.get(&key).cloned())
    }

    fn rows<R: Entity>(&self) -> Option<&Table<R>> {
        table::<R>(self.tables, StorageOperation::Query).ok().flatten()
    }
}

struct PendingChange {
    kind: ChangeKind,
    collection: &'static str,
    key: EntityKey,
    exists: fn(&Tables, EntityKey) -> StorageResult<bool>,
    apply: Apply,
}

/// Internal state protected by a `std::sync::Mutex`
///
/// The mutex is never held across `.await` points.
struct StoreState {
    tables: Tables,
    expanders: HashMap<(&'static str, String), Box<dyn Any + Send + Sync>>,
    pending: Vec<PendingChange>,
    journal: Option<Vec<StagedChange>>,
    tracked: HashSet<(&'static str, EntityKey)>,
    /// Next key handed out to an entity staged without one
    next_key: u64,
    commits: usize,
    expansions: usize,
    fail_next_commit: Option<StorageError>,
}

impl StoreState {
    fn stage<E: Entity>(&mut self, kind: ChangeKind, key: EntityKey, apply: Apply) {
        if let Some(journal) = &mut self.journal {
            journal.push(StagedChange {
                kind,
                collection: E::COLLECTION,
                key,
            });
        }
        self.pending.push(PendingChange {
            kind,
            collection: E::COLLECTION,
            key,
            exists: contains::<E>,
            apply,
        });
    }

    /// Give unkeyed entities the next keys in sequence
    ///
    /// Nothing is written back unless every key in the batch fits.
    fn assign_keys<E: Entity>(&mut self, entities: &mut [E]) -> StorageResult<Vec<EntityKey>> {
        let mut next_key = self.next_key;
        let mut keys = Vec::with_capacity(entities.len());
        for entity in entities.iter() {
            let key = entity.key().unwrap_or(EntityKey::new(next_key));
            let after = key.get().checked_add(1).ok_or_else(|| {
                StorageError::new(
                    StorageOperation::Stage,
                    StorageErrorKind::ConstraintViolation,
                    format!("Key {} exhausts the key sequence", key),
                )
                .with_context(E::COLLECTION)
            })?;
            next_key = next_key.max(after);
            keys.push(key);
        }

        for (entity, key) in entities.iter_mut().zip(&keys) {
            if entity.key().is_none() {
                entity.set_key(*key);
            }
        }
        self.next_key = next_key;
        Ok(keys)
    }

    fn expander<E: Entity>(&self, relation: &str) -> StorageResult<Expander<E>> {
        self.expanders
            .get(&(E::COLLECTION, relation.to_string()))
            .and_then(|expander| (**expander).downcast_ref::<Expander<E>>())
            .cloned()
            .ok_or_else(|| {
                StorageError::query_failed(format!(
                    "Relation '{}' is not registered for '{}'",
                    relation,
                    E::COLLECTION
                ))
                .with_context(E::COLLECTION)
            })
    }
}

/// Reference [`Store`] backed by process memory
///
/// Keys come from a single per-store sequence starting at 1. Relations are made
/// includable with [`MemoryStore::register_include`].
///
/// # Example
///
/// ```rust,ignore
/// let store = MemoryStore::new();
/// store.register_include::<Book, _>("author", |book, catalog| {
///     book.author = catalog.find::<Author>(book.author_key);
/// });
/// ```
pub struct MemoryStore {
    state: Mutex<StoreState>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.inspect(|state| {
            f.debug_struct("MemoryStore")
                .field("collections", &state.tables.len())
                .field("pending", &state.pending.len())
                .field("commits", &state.commits)
                .finish()
        })
    }
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::with_journal(None)
    }

    /// Create an empty store that journals every staging call
    pub fn recording() -> Self {
        Self::with_journal(Some(Vec::new()))
    }

    fn with_journal(journal: Option<Vec<StagedChange>>) -> Self {
        Self {
            state: Mutex::new(StoreState {
                tables: Tables::new(),
                expanders: HashMap::new(),
                pending: Vec::new(),
                journal,
                tracked: HashSet::new(),
                next_key: 1,
                commits: 0,
                expansions: 0,
                fail_next_commit: None,
            }),
        }
    }

    /// Make `relation` includable on `E`
    ///
    /// The expander runs once per returned row and may read any committed
    /// collection through the [`Catalog`]. Registering the same relation again
    /// replaces the previous expander.
    pub fn register_include<E, F>(&self, relation: impl Into<String>, expander: F)
    where
        E: Entity,
        F: Fn(&mut E, &Catalog<'_>) + Send + Sync + 'static,
    {
        let expander: Expander<E> = Arc::new(expander);
        self.modify(|state| {
            state
                .expanders
                .insert((E::COLLECTION, relation.into()), Box::new(expander));
        });
    }

    /// Make the next commit fail with `error`, discarding its pending changes
    pub fn fail_next_commit(&self, error: StorageError) {
        self.modify(|state| state.fail_next_commit = Some(error));
    }

    /// Every staging call received so far, in order
    ///
    /// Always empty unless the store was created with [`MemoryStore::recording`].
    pub fn journal(&self) -> Vec<StagedChange> {
        self.inspect(|state| state.journal.clone().unwrap_or_default())
    }

    /// Number of commit attempts, successful or not
    pub fn commit_count(&self) -> usize {
        self.inspect(|state| state.commits)
    }

    /// Number of times an include expander ran on a row
    pub fn expansion_count(&self) -> usize {
        self.inspect(|state| state.expansions)
    }

    /// Number of staged changes awaiting commit
    pub fn pending_count(&self) -> usize {
        self.inspect(|state| state.pending.len())
    }

    /// Number of distinct rows attached by tracking queries
    pub fn tracked_count(&self) -> usize {
        self.inspect(|state| state.tracked.len())
    }

    fn lock(&self, operation: StorageOperation) -> StorageResult<MutexGuard<'_, StoreState>> {
        self.state.lock().map_err(|_| {
            StorageError::new(
                operation,
                StorageErrorKind::Other,
                "Memory store state is poisoned",
            )
        })
    }

    fn inspect<T>(&self, f: impl FnOnce(&StoreState) -> T) -> T {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }

    fn modify<T>(&self, f: impl FnOnce(&mut StoreState) -> T) -> T {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    async fn evaluate<E: Entity>(
        &self,
        query: Query<E>,
        cancel: &CancellationToken,
        limit: Option<usize>,
    ) -> StorageResult<Vec<E>> {
        tokio::task::yield_now().await;
        if cancel.is_cancelled() {
            return Err(StorageError::cancelled(StorageOperation::Query).with_context(E::COLLECTION));
        }

        let mut guard = self.lock(StorageOperation::Query)?;
        let state = &mut *guard;

        let expanders = query
            .includes()
            .iter()
            .map(|relation| state.expander::<E>(relation))
            .collect::<StorageResult<Vec<_>>>()?;

        let mut rows: Vec<E> = match table::<E>(&state.tables, StorageOperation::Query)? {
            Some(table) => table.values().filter(|e| query.matches(e)).cloned().collect(),
            None => Vec::new(),
        };
        query.sort(&mut rows);
        if let Some(limit) = limit {
            rows.truncate(limit);
        }

        let catalog = Catalog {
            tables: &state.tables,
        };
        for expander in &expanders {
            for row in &mut rows {
                expander(row, &catalog);
                state.expansions += 1;
            }
        }

        if query.tracking().is_tracking() {
            state.tracked.extend(
                rows.iter()
                    .filter_map(|row| row.key())
                    .map(|key| (E::COLLECTION, key)),
            );
        }

        tracing::trace!(
            collection = E::COLLECTION,
            rows = rows.len(),
            tracking = %query.tracking(),
            "Memory store query evaluated"
        );
        Ok(rows)
    }
}

impl Store for MemoryStore {
    async fn materialize<E: Entity>(
        &self,
        query: Query<E>,
        cancel: &CancellationToken,
    ) -> StorageResult<Vec<E>> {
        self.evaluate(query, cancel, None).await
    }

    async fn materialize_first<E: Entity>(
        &self,
        query: Query<E>,
        cancel: &CancellationToken,
    ) -> StorageResult<Option<E>> {
        let rows = self.evaluate(query, cancel, Some(1)).await?;
        Ok(rows.into_iter().next())
    }

    fn stage_insert<E: Entity>(&self, entities: &mut [E]) -> StorageResult<()> {
        let mut state = self.lock(StorageOperation::Stage)?;
        let keys = state.assign_keys(entities)?;

        for (key, entity) in keys.into_iter().zip(entities.iter()) {
            let row = entity.clone();
            state.stage::<E>(
                ChangeKind::Insert,
                key,
                Box::new(move |tables| {
                    table_mut::<E>(tables)?.insert(key, row);
                    Ok(())
                }),
            );
        }
        Ok(())
    }

    fn assign_keys<E: Entity>(&self, entities: &mut [E]) -> StorageResult<()> {
        self.lock(StorageOperation::Stage)?.assign_keys(entities)?;
        Ok(())
    }

    fn stage_update<E: Entity>(&self, entities: &[E]) -> StorageResult<()> {
        let keys = keys_of(entities)?;
        let mut state = self.lock(StorageOperation::Stage)?;

        for (key, entity) in keys.into_iter().zip(entities) {
            let row = entity.clone();
            state.stage::<E>(
                ChangeKind::Update,
                key,
                Box::new(move |tables| {
                    table_mut::<E>(tables)?.insert(key, row);
                    Ok(())
                }),
            );
        }
        Ok(())
    }

    fn stage_remove<E: Entity>(&self, entities: &[E]) -> StorageResult<()> {
        let keys = keys_of(entities)?;
        let mut state = self.lock(StorageOperation::Stage)?;

        for key in keys {
            state.stage::<E>(
                ChangeKind::Remove,
                key,
                Box::new(move |tables| {
                    table_mut::<E>(tables)?.remove(&key);
                    Ok(())
                }),
            );
        }
        Ok(())
    }

    async fn commit(&self, cancel: &CancellationToken) -> StorageResult<usize> {
        tokio::task::yield_now().await;

        let mut guard = self.lock(StorageOperation::Commit)?;
        let state = &mut *guard;
        state.commits += 1;
        let pending = std::mem::take(&mut state.pending);

        if cancel.is_cancelled() {
            return Err(StorageError::cancelled(StorageOperation::Commit));
        }
        if let Some(error) = state.fail_next_commit.take() {
            return Err(error);
        }

        validate(&state.tables, &pending)?;

        let count = pending.len();
        for change in pending {
            if change.kind == ChangeKind::Remove {
                state.tracked.remove(&(change.collection, change.key));
            }
            (change.apply)(&mut state.tables)?;
        }

        tracing::trace!(count, "Memory store commit applied");
        Ok(count)
    }

    fn discard(&self) {
        self.modify(|state| state.pending.clear());
    }
}

fn table<E: Entity>(tables: &Tables, operation: StorageOperation) -> StorageResult<Option<&Table<E>>> {
    match tables.get(E::COLLECTION) {
        Some(table) => (**table)
            .downcast_ref::<Table<E>>()
            .map(Some)
            .ok_or_else(|| type_mismatch::<E>(operation)),
        None => Ok(None),
    }
}

fn table_mut<E: Entity>(tables: &mut Tables) -> StorageResult<&mut Table<E>> {
    let table = tables
        .entry(E::COLLECTION)
        .or_insert_with(|| Box::new(Table::<E>::new()) as Box<dyn Any + Send + Sync>);
    (**table)
        .downcast_mut::<Table<E>>()
        .ok_or_else(|| type_mismatch::<E>(StorageOperation::Commit))
}

fn contains<E: Entity>(tables: &Tables, key: EntityKey) -> StorageResult<bool> {
    Ok(table::<E>(tables, StorageOperation::Commit)?.is_some_and(|table| table.contains_key(&key)))
}

fn type_mismatch<E: Entity>(operation: StorageOperation) -> StorageError {
    StorageError::new(
        operation,
        StorageErrorKind::Other,
        format!(
            "Collection '{}' holds a different entity type",
            E::COLLECTION
        ),
    )
    .with_context(E::COLLECTION)
}

fn keys_of<E: Entity>(entities: &[E]) -> StorageResult<Vec<EntityKey>> {
    entities
        .iter()
        .map(|entity| {
            entity.key().ok_or_else(|| {
                StorageError::new(
                    StorageOperation::Stage,
                    StorageErrorKind::ConcurrencyConflict,
                    "Entity has no key and was never persisted",
                )
                .with_context(E::COLLECTION)
            })
        })
        .collect()
}

/// Check the whole change set against committed rows before anything is written
fn validate(tables: &Tables, pending: &[PendingChange]) -> StorageResult<()> {
    let mut overlay: HashMap<(&'static str, EntityKey), bool> = HashMap::new();

    for change in pending {
        let slot = (change.collection, change.key);
        let exists = match overlay.get(&slot) {
            Some(exists) => *exists,
            None => (change.exists)(tables, change.key)?,
        };

        match change.kind {
            ChangeKind::Insert if exists => {
                return Err(StorageError::constraint_violation(format!(
                    "Duplicate key {}",
                    change.key
                ))
                .with_context(change.collection));
            }
            ChangeKind::Update | ChangeKind::Remove if !exists => {
                return Err(StorageError::concurrency_conflict(format!(
                    "No row with key {} to {}",
                    change.key, change.kind
                ))
                .with_context(change.collection));
            }
            _ => {}
        }

        overlay.insert(slot, change.kind != ChangeKind::Remove);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{OrderBy, Predicate};

    #[derive(Debug, Clone, PartialEq)]
    struct Author {
        key: Option<EntityKey>,
        name: String,
    }

    impl Entity for Author {
        const COLLECTION: &'static str = "authors";

        fn key(&self) -> Option<EntityKey> {
            self.key
        }

        fn set_key(&mut self, key: EntityKey) {
            self.key = Some(key);
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Book {
        key: Option<EntityKey>,
        title: String,
        pages: u32,
        author_key: EntityKey,
        author: Option<Author>,
    }

    impl Entity for Book {
        const COLLECTION: &'static str = "books";

        fn key(&self) -> Option<EntityKey> {
            self.key
        }

        fn set_key(&mut self, key: EntityKey) {
            self.key = Some(key);
        }
    }

    fn author(name: &str) -> Author {
        Author {
            key: None,
            name: name.to_string(),
        }
    }

    fn book(title: &str, pages: u32, author_key: EntityKey) -> Book {
        Book {
            key: None,
            title: title.to_string(),
            pages,
            author_key,
            author: None,
        }
    }

    async fn seeded() -> (MemoryStore, CancellationToken) {
        let store = MemoryStore::recording();
        let cancel = CancellationToken::new();
        store.register_include::<Book, _>("author", |book, catalog| {
            book.author = catalog.find::<Author>(book.author_key);
        });

        let mut authors = vec![author("Le Guin"), author("Herbert")];
        store.stage_insert(&mut authors).unwrap();
        let mut books = vec![
            book("Dune", 412, authors[1].key.unwrap()),
            book("Lathe", 184, authors[0].key.unwrap()),
            book("Earthsea", 205, authors[0].key.unwrap()),
        ];
        store.stage_insert(&mut books).unwrap();
        assert_eq!(store.commit(&cancel).await.unwrap(), 5);
        (store, cancel)
    }

    #[test]
    fn test_keys_assigned_from_one() {
        let store = MemoryStore::new();
        let mut authors = vec![author("a"), author("b")];
        store.stage_insert(&mut authors).unwrap();
        assert_eq!(authors[0].key, Some(EntityKey::new(1)));
        assert_eq!(authors[1].key, Some(EntityKey::new(2)));
        assert_eq!(store.pending_count(), 2);
    }

    #[tokio::test]
    async fn test_staged_rows_invisible_until_commit() {
        let store = MemoryStore::new();
        let cancel = CancellationToken::new();
        store.stage_insert(&mut [author("a")]).unwrap();

        let rows = store.materialize(Query::<Author>::all(), &cancel).await.unwrap();
        assert!(rows.is_empty());

        store.commit(&cancel).await.unwrap();
        let rows = store.materialize(Query::<Author>::all(), &cancel).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(store.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_filter_order_include() {
        let (store, cancel) = seeded().await;
        let query = Query::all()
            .filter(Predicate::new(|b: &Book| b.pages < 300))
            .order(OrderBy::asc(|b: &Book| b.title.clone()))
            .expand("author")
            .without_tracking();

        let rows = store.materialize(query, &cancel).await.unwrap();
        let titles: Vec<_> = rows.iter().map(|b| b.title.as_str()).collect();
        assert_eq!(titles, vec!["Earthsea", "Lathe"]);
        assert!(rows
            .iter()
            .all(|b| b.author.as_ref().map(|a| a.name.as_str()) == Some("Le Guin")));
        // Only the two surviving rows were expanded
        assert_eq!(store.expansion_count(), 2);
    }

    #[tokio::test]
    async fn test_first_expands_single_row() {
        let (store, cancel) = seeded().await;
        let query = Query::all()
            .order(OrderBy::desc(|b: &Book| b.pages))
            .expand("author");

        let first = store.materialize_first(query, &cancel).await.unwrap().unwrap();
        assert_eq!(first.title, "Dune");
        assert_eq!(first.author.unwrap().name, "Herbert");
        assert_eq!(store.expansion_count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_relation_is_query_failure() {
        let (store, cancel) = seeded().await;
        let error = store
            .materialize(Query::<Book>::all().expand("publisher"), &cancel)
            .await
            .unwrap_err();
        assert_eq!(error.kind, StorageErrorKind::QueryFailed);
        assert_eq!(error.operation, StorageOperation::Query);
    }

    #[tokio::test]
    async fn test_tracking_attaches_rows() {
        let (store, cancel) = seeded().await;
        store
            .materialize(Query::<Book>::all().without_tracking(), &cancel)
            .await
            .unwrap();
        assert_eq!(store.tracked_count(), 0);

        store
            .materialize(Query::<Book>::all().with_tracking(), &cancel)
            .await
            .unwrap();
        assert_eq!(store.tracked_count(), 3);
    }

    #[tokio::test]
    async fn test_duplicate_insert_applies_nothing() {
        let (store, cancel) = seeded().await;
        let mut fresh = author("Banks");
        let mut duplicate = author("Copy");
        duplicate.key = Some(EntityKey::new(1));

        store.stage_insert(std::slice::from_mut(&mut fresh)).unwrap();
        store.stage_insert(std::slice::from_mut(&mut duplicate)).unwrap();
        let error = store.commit(&cancel).await.unwrap_err();

        assert_eq!(error.kind, StorageErrorKind::ConstraintViolation);
        assert_eq!(error.context.as_deref(), Some("authors"));
        assert_eq!(store.pending_count(), 0);
        let names: Vec<_> = store
            .materialize(Query::<Author>::all(), &cancel)
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.name)
            .collect();
        assert_eq!(names, vec!["Le Guin", "Herbert"]);
    }

    #[tokio::test]
    async fn test_update_of_missing_row_conflicts() {
        let (store, cancel) = seeded().await;
        let mut ghost = author("Ghost");
        ghost.key = Some(EntityKey::new(99));

        store.stage_update(&[ghost]).unwrap();
        let error = store.commit(&cancel).await.unwrap_err();
        assert_eq!(error.kind, StorageErrorKind::ConcurrencyConflict);
        assert!(error.is_retriable());
    }

    #[test]
    fn test_unkeyed_update_rejected_at_stage() {
        let store = MemoryStore::recording();
        let error = store.stage_update(&[author("x")]).unwrap_err();
        assert_eq!(error.operation, StorageOperation::Stage);
        assert_eq!(store.pending_count(), 0);
        assert!(store.journal().is_empty());
    }

    #[tokio::test]
    async fn test_remove_then_reinsert_in_one_commit() {
        let (store, cancel) = seeded().await;
        let mut rows = store.materialize(Query::<Author>::all(), &cancel).await.unwrap();
        store.stage_remove(&rows[..1]).unwrap();
        store.stage_insert(&mut rows[..1]).unwrap();
        assert_eq!(store.commit(&cancel).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_journal_records_staging_calls() {
        let (store, cancel) = seeded().await;
        let before = store.journal().len();
        let rows = store.materialize(Query::<Book>::all(), &cancel).await.unwrap();

        store.stage_update(&rows[..1]).unwrap();
        store.stage_remove(&rows[1..2]).unwrap();
        store.commit(&cancel).await.unwrap();

        let journal = store.journal();
        assert_eq!(journal.len(), before + 2);
        assert_eq!(journal[before].kind, ChangeKind::Update);
        assert_eq!(journal[before + 1].kind, ChangeKind::Remove);
        assert_eq!(journal[before + 1].collection, "books");
    }

    #[tokio::test]
    async fn test_cancelled_query_and_commit() {
        let (store, _) = seeded().await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let error = store
            .materialize(Query::<Book>::all(), &cancel)
            .await
            .unwrap_err();
        assert_eq!(error.kind, StorageErrorKind::Cancelled);

        store.stage_insert(&mut [author("late")]).unwrap();
        let error = store.commit(&cancel).await.unwrap_err();
        assert_eq!(error.kind, StorageErrorKind::Cancelled);
        assert_eq!(error.operation, StorageOperation::Commit);
        assert_eq!(store.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_fail_next_commit_discards_pending() {
        let (store, cancel) = seeded().await;
        store.fail_next_commit(StorageError::connection_failed(
            StorageOperation::Commit,
            "connection reset",
        ));
        store.stage_insert(&mut [author("lost")]).unwrap();

        let error = store.commit(&cancel).await.unwrap_err();
        assert_eq!(error.kind, StorageErrorKind::ConnectionFailed);
        assert_eq!(store.pending_count(), 0);

        // Failure is one-shot
        assert_eq!(store.commit(&cancel).await.unwrap(), 0);
        let authors = store.materialize(Query::<Author>::all(), &cancel).await.unwrap();
        assert_eq!(authors.len(), 2);
    }

    #[test]
    fn test_discard_drops_pending() {
        let store = MemoryStore::recording();
        store.stage_insert(&mut [author("a")]).unwrap();
        store.discard();
        assert_eq!(store.pending_count(), 0);
        assert_eq!(store.journal().len(), 1);
    }

    #[tokio::test]
    async fn test_plain_store_keeps_no_journal() {
        let store = MemoryStore::new();
        let cancel = CancellationToken::new();
        let mut authors: Vec<_> = (0..100).map(|i| author(&i.to_string())).collect();
        store.stage_insert(&mut authors).unwrap();
        store.commit(&cancel).await.unwrap();
        store.stage_remove(&authors).unwrap();
        store.commit(&cancel).await.unwrap();

        assert!(store.journal().is_empty());
        assert!(store.materialize(Query::<Author>::all(), &cancel).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_releases_tracked_rows() {
        let (store, cancel) = seeded().await;
        let rows = store
            .materialize(Query::<Book>::all().with_tracking(), &cancel)
            .await
            .unwrap();
        assert_eq!(store.tracked_count(), 3);

        store.stage_remove(&rows[..2]).unwrap();
        store.commit(&cancel).await.unwrap();
        assert_eq!(store.tracked_count(), 1);
    }

    #[test]
    fn test_key_sequence_overflow_is_rejected() {
        let store = MemoryStore::new();
        let mut last = author("last");
        last.key = Some(EntityKey::new(u64::MAX));
        let mut batch = vec![author("fresh"), last];

        let error = store.stage_insert(&mut batch).unwrap_err();
        assert_eq!(error.kind, StorageErrorKind::ConstraintViolation);
        assert_eq!(error.operation, StorageOperation::Stage);
        assert_eq!(batch[0].key, None);
        assert_eq!(store.pending_count(), 0);

        // The sequence is untouched by the refused batch
        store.stage_insert(&mut batch[..1]).unwrap();
        assert_eq!(batch[0].key, Some(EntityKey::new(1)));
    }

    #[test]
    fn test_assign_keys_stages_nothing() {
        let store = MemoryStore::recording();
        let mut authors = vec![author("a"), author("b")];
        store.assign_keys(&mut authors).unwrap();
        assert_eq!(authors[1].key, Some(EntityKey::new(2)));
        assert_eq!(store.pending_count(), 0);
        assert!(store.journal().is_empty());
    }

    #[test]
    fn test_catalog_reads_committed_rows() {
        let mut tables = Tables::new();
        let mut row = author("Le Guin");
        row.key = Some(EntityKey::new(4));
        table_mut::<Author>(&mut tables)
            .unwrap()
            .insert(EntityKey::new(4), row.clone());

        let catalog = Catalog { tables: &tables };
        assert_eq!(catalog.find::<Author>(EntityKey::new(4)), Some(row));
        assert_eq!(catalog.all::<Author>().len(), 1);
        assert!(catalog.filter::<Author>(|a| a.name == "Banks").is_empty());
        assert!(catalog.all::<Book>().is_empty());
    }

    #[test]
    fn test_change_kind_display() {
        assert_eq!(ChangeKind::Insert.to_string(), "insert");
        assert_eq!(ChangeKind::Update.to_string(), "update");
        assert_eq!(ChangeKind::Remove.to_string(), "remove");
    }
}
