//! Query model and the directive builder
//!
//! A [`Query`] is a storage-independent description of a read: an optional
//! predicate, an optional ordering, a set of relations to eager-load, and a
//! tracking mode. Storage collaborators evaluate it in a fixed order:
//!
//! 1. filter by the predicate
//! 2. order the surviving rows
//! 3. expand the included relations on the rows that remain
//!
//! [`QueryOptions`] is the caller-facing directive set. Whatever order its
//! builder methods are called in, [`QueryOptions::compose`] always applies
//! filter, then order, then include, and finally the tracking mode.
//!
//! # Example
//!
//! ```rust
//! use entity_repository::repository::{OrderBy, QueryOptions, TrackingMode};
//!
//! #[derive(Clone)]
//! struct Order {
//!     id: u64,
//!     total: u32,
//! }
//!
//! // Directives supplied "out of order" still compose as filter → order → include
//! let query = QueryOptions::new()
//!     .include("lines")
//!     .order_by(OrderBy::desc(|o: &Order| o.total))
//!     .filter(|o: &Order| o.total > 10)
//!     .compose(TrackingMode::NoTracking);
//!
//! assert!(query.has_filter());
//! assert!(query.ordering().is_some());
//! assert!(query.includes().contains("lines"));
//! assert_eq!(query.tracking(), TrackingMode::NoTracking);
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use super::ordering::OrderBy;

/// Whether materialized entities are attached to the store's change journal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackingMode {
    /// Read-only results, nothing attached
    #[default]
    NoTracking,
    /// Results are attached for later change detection
    Tracking,
}

impl TrackingMode {
    /// Map a `disable_tracking` flag to a mode
    pub const fn from_disable_flag(disable_tracking: bool) -> Self {
        if disable_tracking {
            Self::NoTracking
        } else {
            Self::Tracking
        }
    }

    /// Whether results are tracked
    pub const fn is_tracking(self) -> bool {
        matches!(self, Self::Tracking)
    }
}

impl fmt::Display for TrackingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoTracking => write!(f, "no_tracking"),
            Self::Tracking => write!(f, "tracking"),
        }
    }
}

/// Row predicate used by the filter directive
pub struct Predicate<E>(Arc<dyn Fn(&E) -> bool + Send + Sync>);

impl<E> Clone for Predicate<E> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<E> fmt::Debug for Predicate<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Predicate(..)")
    }
}

impl<E: 'static> Predicate<E> {
    /// Wrap a closure
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        Self(Arc::new(predicate))
    }

    /// Conjunction of two predicates
    #[must_use]
    pub fn and(self, other: Predicate<E>) -> Self {
        let (left, right) = (self.0, other.0);
        Self(Arc::new(move |entity: &E| left(entity) && right(entity)))
    }
}

impl<E> Predicate<E> {
    /// Evaluate the predicate
    pub fn test(&self, entity: &E) -> bool {
        (self.0)(entity)
    }
}

/// Names of the relations to eager-load
pub type IncludeSet = BTreeSet<String>;

/// Storage-independent query over one entity collection
pub struct Query<E> {
    predicate: Option<Predicate<E>>,
    ordering: Option<OrderBy<E>>,
    includes: IncludeSet,
    tracking: TrackingMode,
}

impl<E> Clone for Query<E> {
    fn clone(&self) -> Self {
        Self {
            predicate: self.predicate.clone(),
            ordering: self.ordering.clone(),
            includes: self.includes.clone(),
            tracking: self.tracking,
        }
    }
}

impl<E> fmt::Debug for Query<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("filtered", &self.predicate.is_some())
            .field("ordering", &self.ordering)
            .field("includes", &self.includes)
            .field("tracking", &self.tracking)
            .finish()
    }
}

impl<E> Default for Query<E> {
    fn default() -> Self {
        Self::all()
    }
}

impl<E> Query<E> {
    /// Unfiltered, unordered query over the whole collection
    ///
    /// A freshly begun query is trackable; the builder switches tracking off
    /// unless the caller asks for it.
    pub fn all() -> Self {
        Self {
            predicate: None,
            ordering: None,
            includes: IncludeSet::new(),
            tracking: TrackingMode::Tracking,
        }
    }

    /// Replace the ordering
    #[must_use]
    pub fn order(mut self, ordering: OrderBy<E>) -> Self {
        self.ordering = Some(ordering);
        self
    }

    /// Add an eager-loaded relation
    #[must_use]
    pub fn expand(mut self, relation: impl Into<String>) -> Self {
        self.includes.insert(relation.into());
        self
    }

    /// Add every relation in the set
    #[must_use]
    pub fn expand_all(mut self, relations: IncludeSet) -> Self {
        self.includes.extend(relations);
        self
    }

    /// Mark the query as non-tracking
    #[must_use]
    pub fn without_tracking(mut self) -> Self {
        self.tracking = TrackingMode::NoTracking;
        self
    }

    /// Mark the query as tracking
    #[must_use]
    pub fn with_tracking(mut self) -> Self {
        self.tracking = TrackingMode::Tracking;
        self
    }

    /// Set the tracking mode
    #[must_use]
    pub fn tracked(mut self, tracking: TrackingMode) -> Self {
        self.tracking = tracking;
        self
    }

    /// Whether the row passes the filter directive
    pub fn matches(&self, entity: &E) -> bool {
        self.predicate
            .as_ref()
            .map_or(true, |predicate| predicate.test(entity))
    }

    /// Apply the ordering directive in place (no-op without one)
    pub fn sort(&self, rows: &mut [E]) {
        if let Some(ordering) = &self.ordering {
            ordering.sort(rows);
        }
    }

    /// Whether a filter directive is present
    pub fn has_filter(&self) -> bool {
        self.predicate.is_some()
    }

    /// The ordering directive
    pub fn ordering(&self) -> Option<&OrderBy<E>> {
        self.ordering.as_ref()
    }

    /// The relations to eager-load
    pub fn includes(&self) -> &IncludeSet {
        &self.includes
    }

    /// The tracking mode
    pub fn tracking(&self) -> TrackingMode {
        self.tracking
    }

    pub(crate) fn then_order(mut self, ordering: OrderBy<E>) -> Self {
        match self.ordering.as_mut() {
            Some(existing) => existing.extend(ordering),
            None => self.ordering = Some(ordering),
        }
        self
    }
}

impl<E: 'static> Query<E> {
    /// Narrow by a predicate; repeated filters are AND-combined
    #[must_use]
    pub fn filter(mut self, predicate: Predicate<E>) -> Self {
        self.predicate = Some(match self.predicate.take() {
            Some(existing) => existing.and(predicate),
            None => predicate,
        });
        self
    }
}

/// Optional read directives: filter, order, include, tracking
///
/// Every directive is optional. Builder calls may come in any order; the
/// composed [`Query`] is always built filter → order → include → tracking.
pub struct QueryOptions<E> {
    filter: Option<Predicate<E>>,
    order_by: Option<OrderBy<E>>,
    include: IncludeSet,
    tracking: Option<TrackingMode>,
}

impl<E> Clone for QueryOptions<E> {
    fn clone(&self) -> Self {
        Self {
            filter: self.filter.clone(),
            order_by: self.order_by.clone(),
            include: self.include.clone(),
            tracking: self.tracking,
        }
    }
}

impl<E> fmt::Debug for QueryOptions<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryOptions")
            .field("filter", &self.filter.is_some())
            .field("order_by", &self.order_by)
            .field("include", &self.include)
            .field("tracking", &self.tracking)
            .finish()
    }
}

impl<E> Default for QueryOptions<E> {
    fn default() -> Self {
        Self {
            filter: None,
            order_by: None,
            include: IncludeSet::new(),
            tracking: None,
        }
    }
}

impl<E: 'static> QueryOptions<E> {
    /// No directives
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter directive; repeated calls are AND-combined
    #[must_use]
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        let predicate = Predicate::new(predicate);
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and(predicate),
            None => predicate,
        });
        self
    }

    /// Ordering directive; a later call replaces an earlier one
    #[must_use]
    pub fn order_by(mut self, ordering: OrderBy<E>) -> Self {
        self.order_by = Some(ordering);
        self
    }

    /// Eager-load directive for one relation
    #[must_use]
    pub fn include(mut self, relation: impl Into<String>) -> Self {
        self.include.insert(relation.into());
        self
    }

    /// Explicit tracking mode, overriding the repository default
    #[must_use]
    pub fn tracking(mut self, tracking: TrackingMode) -> Self {
        self.tracking = Some(tracking);
        self
    }

    /// Attach results to the change journal
    #[must_use]
    pub fn with_tracking(self) -> Self {
        self.tracking(TrackingMode::Tracking)
    }

    /// Read-only results
    #[must_use]
    pub fn without_tracking(self) -> Self {
        self.tracking(TrackingMode::NoTracking)
    }

    /// Build the query in the fixed directive order
    ///
    /// `default_tracking` applies when no explicit tracking mode was given.
    pub fn compose(self, default_tracking: TrackingMode) -> Query<E> {
        let mut query = Query::all();

        if let Some(predicate) = self.filter {
            query = query.filter(predicate);
        }

        if let Some(ordering) = self.order_by {
            query = query.order(ordering);
        }

        if !self.include.is_empty() {
            query = query.expand_all(self.include);
        }

        match self.tracking.unwrap_or(default_tracking) {
            TrackingMode::NoTracking => query.without_tracking(),
            TrackingMode::Tracking => query.with_tracking(),
        }
    }
}
