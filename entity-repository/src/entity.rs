//! Entity contract shared by the repository and storage collaborators
//!
//! Entities are caller-defined records. The repository never looks inside them;
//! the only things it needs are the collection name, the storage-managed
//! identity, and whether the type declares the soft-delete capability.
//!
//! # Example
//!
//! ```rust
//! use entity_repository::entity::{Entity, EntityKey, SoftDelete};
//!
//! #[derive(Debug, Clone, Default)]
//! struct Widget {
//!     key: Option<EntityKey>,
//!     name: String,
//!     is_deleted: bool,
//! }
//!
//! impl SoftDelete for Widget {
//!     fn is_deleted(&self) -> bool {
//!         self.is_deleted
//!     }
//!
//!     fn set_deleted(&mut self, deleted: bool) {
//!         self.is_deleted = deleted;
//!     }
//! }
//!
//! impl Entity for Widget {
//!     const COLLECTION: &'static str = "widgets";
//!
//!     fn key(&self) -> Option<EntityKey> {
//!         self.key
//!     }
//!
//!     fn set_key(&mut self, key: EntityKey) {
//!         self.key = Some(key);
//!     }
//!
//!     fn soft_delete(&self) -> Option<&dyn SoftDelete> {
//!         Some(self)
//!     }
//!
//!     fn soft_delete_mut(&mut self) -> Option<&mut dyn SoftDelete> {
//!         Some(self)
//!     }
//! }
//! ```

use std::fmt;

/// Storage-assigned identity of a persisted entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityKey(u64);

impl EntityKey {
    /// Wrap a raw key value
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Raw key value
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for EntityKey {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Declared soft-delete capability
///
/// Types implementing this trait expose a boolean deletion flag. Deleting such an
/// entity through the repository sets the flag and persists the entity as an
/// update instead of removing its record.
pub trait SoftDelete {
    /// Current value of the deletion flag
    fn is_deleted(&self) -> bool;

    /// Set the deletion flag
    fn set_deleted(&mut self, deleted: bool);
}

/// A record type persisted through a repository
///
/// `COLLECTION` names the set of records the type lives in. Keys are managed by
/// the storage collaborator: entities start without one and receive it when they
/// are staged for insertion.
///
/// The two `soft_delete` accessors default to `None`. Types that implement
/// [`SoftDelete`] override both to return `Some(self)`.
pub trait Entity: Clone + Send + Sync + 'static {
    /// Name of the collection holding this entity type
    const COLLECTION: &'static str;

    /// Storage-assigned identity, if the entity has been staged or persisted
    fn key(&self) -> Option<EntityKey>;

    /// Record the storage-assigned identity
    fn set_key(&mut self, key: EntityKey);

    /// Shared view of the soft-delete capability, if declared
    fn soft_delete(&self) -> Option<&dyn SoftDelete> {
        None
    }

    /// Mutable view of the soft-delete capability, if declared
    fn soft_delete_mut(&mut self) -> Option<&mut dyn SoftDelete> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone)]
    struct Plain {
        key: Option<EntityKey>,
    }

    impl Entity for Plain {
        const COLLECTION: &'static str = "plain";

        fn key(&self) -> Option<EntityKey> {
            self.key
        }

        fn set_key(&mut self, key: EntityKey) {
            self.key = Some(key);
        }
    }

    #[test]
    fn test_entity_key_display() {
        assert_eq!(EntityKey::new(42).to_string(), "42");
        assert_eq!(EntityKey::from(7).get(), 7);
    }

    #[test]
    fn test_entity_key_ordering() {
        assert!(EntityKey::new(1) < EntityKey::new(2));
    }

    #[test]
    fn test_soft_delete_defaults_to_none() {
        let mut plain = Plain { key: None };
        assert!(plain.soft_delete().is_none());
        assert!(plain.soft_delete_mut().is_none());
    }

    #[test]
    fn test_set_key() {
        let mut plain = Plain { key: None };
        plain.set_key(EntityKey::new(3));
        assert_eq!(plain.key(), Some(EntityKey::new(3)));
    }
}
