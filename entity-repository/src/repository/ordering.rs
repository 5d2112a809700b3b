//! Ordering directives for repository queries
//!
//! An [`OrderBy`] is a list of sort keys, each extracted from the entity and
//! compared in an [`OrderDirection`]. Later keys only break ties left by earlier
//! ones. Sorting is stable, so rows that compare equal keep collection order.
//!
//! # Example
//!
//! ```rust
//! use entity_repository::repository::{OrderBy, OrderDirection};
//!
//! #[derive(Clone)]
//! struct Product {
//!     category: String,
//!     price: u32,
//! }
//!
//! let order = OrderBy::asc(|p: &Product| p.category.clone())
//!     .then_desc(|p: &Product| p.price);
//! assert_eq!(order.len(), 2);
//!
//! let cheap = Product { category: "a".into(), price: 1 };
//! let dear = Product { category: "a".into(), price: 9 };
//! assert_eq!(order.compare(&dear, &cheap), std::cmp::Ordering::Less);
//! assert_eq!(format!("{}", OrderDirection::Descending), "desc");
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// Direction for ordering results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderDirection {
    /// Sort in ascending order (A-Z, 0-9)
    #[default]
    Ascending,
    /// Sort in descending order (Z-A, 9-0)
    Descending,
}

impl fmt::Display for OrderDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ascending => write!(f, "asc"),
            Self::Descending => write!(f, "desc"),
        }
    }
}

type Comparator<E> = Arc<dyn Fn(&E, &E) -> Ordering + Send + Sync>;

struct SortKey<E> {
    compare: Comparator<E>,
    direction: OrderDirection,
}

impl<E> Clone for SortKey<E> {
    fn clone(&self) -> Self {
        Self {
            compare: Arc::clone(&self.compare),
            direction: self.direction,
        }
    }
}

/// Ordering directive made of one or more sort keys
pub struct OrderBy<E> {
    keys: Vec<SortKey<E>>,
}

impl<E> Clone for OrderBy<E> {
    fn clone(&self) -> Self {
        Self {
            keys: self.keys.clone(),
        }
    }
}

impl<E> fmt::Debug for OrderBy<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let directions: Vec<OrderDirection> = self.keys.iter().map(|k| k.direction).collect();
        f.debug_struct("OrderBy")
            .field("directions", &directions)
            .finish()
    }
}

impl<E: 'static> OrderBy<E> {
    /// Order by the extracted key in the given direction
    pub fn by<K, F>(key: F, direction: OrderDirection) -> Self
    where
        K: Ord,
        F: Fn(&E) -> K + Send + Sync + 'static,
    {
        Self {
            keys: vec![Self::sort_key(key, direction)],
        }
    }

    /// Order by the extracted key, ascending
    pub fn asc<K, F>(key: F) -> Self
    where
        K: Ord,
        F: Fn(&E) -> K + Send + Sync + 'static,
    {
        Self::by(key, OrderDirection::Ascending)
    }

    /// Order by the extracted key, descending
    pub fn desc<K, F>(key: F) -> Self
    where
        K: Ord,
        F: Fn(&E) -> K + Send + Sync + 'static,
    {
        Self::by(key, OrderDirection::Descending)
    }

    /// Add a tie-breaking key in the given direction
    #[must_use]
    pub fn then_by<K, F>(mut self, key: F, direction: OrderDirection) -> Self
    where
        K: Ord,
        F: Fn(&E) -> K + Send + Sync + 'static,
    {
        self.keys.push(Self::sort_key(key, direction));
        self
    }

    /// Add an ascending tie-breaking key
    #[must_use]
    pub fn then_asc<K, F>(self, key: F) -> Self
    where
        K: Ord,
        F: Fn(&E) -> K + Send + Sync + 'static,
    {
        self.then_by(key, OrderDirection::Ascending)
    }

    /// Add a descending tie-breaking key
    #[must_use]
    pub fn then_desc<K, F>(self, key: F) -> Self
    where
        K: Ord,
        F: Fn(&E) -> K + Send + Sync + 'static,
    {
        self.then_by(key, OrderDirection::Descending)
    }

    fn sort_key<K, F>(key: F, direction: OrderDirection) -> SortKey<E>
    where
        K: Ord,
        F: Fn(&E) -> K + Send + Sync + 'static,
    {
        SortKey {
            compare: Arc::new(move |a: &E, b: &E| key(a).cmp(&key(b))),
            direction,
        }
    }
}

impl<E> OrderBy<E> {
    /// Compare two entities under this ordering
    pub fn compare(&self, a: &E, b: &E) -> Ordering {
        for key in &self.keys {
            let ordering = match key.direction {
                OrderDirection::Ascending => (key.compare)(a, b),
                OrderDirection::Descending => (key.compare)(b, a),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }

    /// Stable in-place sort
    pub fn sort(&self, rows: &mut [E]) {
        rows.sort_by(|a, b| self.compare(a, b));
    }

    /// Number of sort keys
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the ordering has no sort keys
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub(crate) fn extend(&mut self, other: OrderBy<E>) {
        self.keys.extend(other.keys);
    }
}
