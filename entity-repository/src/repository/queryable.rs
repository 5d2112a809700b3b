//! Lazy query handle returned by `Repository::get_queryable`

use std::fmt;

use tokio_util::sync::CancellationToken;

use super::error::{RepositoryOperation, RepositoryResult};
use super::facade::query_error;
use super::ordering::OrderBy;
use super::query::{Predicate, Query, TrackingMode};
use crate::entity::Entity;
use crate::store::Store;

/// A composed query that has not been executed yet
///
/// Further directives can be chained in any order; evaluation still filters,
/// then orders, then expands.
pub struct Queryable<'r, S, E> {
    store: &'r S,
    query: Query<E>,
}

impl<S, E> fmt::Debug for Queryable<'_, S, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Queryable")
            .field("query", &self.query)
            .finish()
    }
}

impl<'r, S: Store, E: Entity> Queryable<'r, S, E> {
    pub(crate) fn new(store: &'r S, query: Query<E>) -> Self {
        Self { store, query }
    }

    /// Narrow further; AND-combined with any existing filter
    #[must_use]
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.query = self.query.filter(Predicate::new(predicate));
        self
    }

    /// Replace the ordering
    #[must_use]
    pub fn order_by(mut self, ordering: OrderBy<E>) -> Self {
        self.query = self.query.order(ordering);
        self
    }

    /// Break ties left by the current ordering
    #[must_use]
    pub fn then_by(mut self, ordering: OrderBy<E>) -> Self {
        self.query = self.query.then_order(ordering);
        self
    }

    /// Eager-load another relation
    #[must_use]
    pub fn include(mut self, relation: impl Into<String>) -> Self {
        self.query = self.query.expand(relation);
        self
    }

    /// Attach results to the change journal
    #[must_use]
    pub fn with_tracking(mut self) -> Self {
        self.query = self.query.tracked(TrackingMode::Tracking);
        self
    }

    /// Read-only results
    #[must_use]
    pub fn without_tracking(mut self) -> Self {
        self.query = self.query.tracked(TrackingMode::NoTracking);
        self
    }

    /// The composed query
    pub fn query(&self) -> &Query<E> {
        &self.query
    }

    /// Detach the composed query from the store
    pub fn into_query(self) -> Query<E> {
        self.query
    }

    /// Execute and return every matching entity
    pub async fn to_list(self, cancel: &CancellationToken) -> RepositoryResult<Vec<E>> {
        self.store
            .materialize(self.query, cancel)
            .await
            .map_err(|e| query_error::<E>(RepositoryOperation::GetList, e))
    }

    /// Execute and return the first matching entity
    pub async fn first(self, cancel: &CancellationToken) -> RepositoryResult<Option<E>> {
        self.store
            .materialize_first(self.query, cancel)
            .await
            .map_err(|e| query_error::<E>(RepositoryOperation::GetFirstOrDefault, e))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::repository::fixtures::{self, Widget};
    use crate::repository::{OrderBy, QueryOptions, Repository, TrackingMode};

    #[tokio::test]
    async fn test_nothing_runs_until_materialized() {
        let (store, cancel) = fixtures::seeded().await;
        let repo = Repository::<_, Widget>::new(Arc::clone(&store));

        let queryable = repo.get_queryable(QueryOptions::new().include("tag"));
        assert_eq!(store.expansion_count(), 0);

        let rows = queryable.to_list(&cancel).await.unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(store.expansion_count(), 4);
    }

    #[tokio::test]
    async fn test_further_composition() {
        let (store, cancel) = fixtures::seeded().await;
        let repo = Repository::<_, Widget>::new(Arc::clone(&store));

        let rows = repo
            .get_queryable(QueryOptions::new().filter(|w: &Widget| w.weight > 3))
            .filter(|w: &Widget| w.weight < 20)
            .order_by(OrderBy::asc(|w: &Widget| w.tag_key))
            .then_by(OrderBy::desc(|w: &Widget| w.weight))
            .to_list(&cancel)
            .await
            .unwrap();

        let names: Vec<_> = rows.iter().map(|w| w.name.as_str()).collect();
        assert_eq!(names, vec!["bolt", "gear"]);
    }

    #[tokio::test]
    async fn test_first_and_tracking_toggle() {
        let (store, cancel) = fixtures::seeded().await;
        let repo = Repository::<_, Widget>::new(Arc::clone(&store));

        let queryable = repo
            .get_queryable(QueryOptions::new())
            .order_by(OrderBy::desc(|w: &Widget| w.weight))
            .with_tracking();
        assert_eq!(queryable.query().tracking(), TrackingMode::Tracking);

        let heaviest = queryable.first(&cancel).await.unwrap().unwrap();
        assert_eq!(heaviest.name, "axle");
        assert_eq!(store.tracked_count(), 1);
    }

    #[tokio::test]
    async fn test_into_query_keeps_directives() {
        let (store, _) = fixtures::seeded().await;
        let repo = Repository::<_, Widget>::new(Arc::clone(&store));

        let query = repo
            .get_queryable(QueryOptions::new().include("tag"))
            .filter(|w: &Widget| w.is_deleted)
            .without_tracking()
            .into_query();

        assert!(query.has_filter());
        assert!(query.includes().contains("tag"));
        assert_eq!(query.tracking(), TrackingMode::NoTracking);
    }
}
