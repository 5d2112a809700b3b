//! Soft-delete capability probe
//!
//! Deciding how to delete an entity is a runtime question answered by the entity
//! itself: types that declare [`SoftDelete`](crate::entity::SoftDelete) are
//! flagged and persisted as updates, everything else is physically removed.
//!
//! Batches are classified from their first element and the resulting strategy is
//! applied to the whole batch. [`Capability::ensure_uniform`] is the strict
//! variant that rejects batches whose elements disagree.

use std::fmt;

use super::error::{RepositoryError, RepositoryOperation, RepositoryResult};
use crate::entity::Entity;

/// Result of probing an entity for the soft-delete capability
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// The entity exposes a deletion flag
    SoftDeleteCapable,
    /// The entity has no deletion flag
    NotCapable,
}

/// How a delete is carried out in storage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteStrategy {
    /// Remove the record
    PhysicalRemove,
    /// Set the deletion flag and persist as an update
    SoftFlag,
}

impl fmt::Display for DeleteStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PhysicalRemove => write!(f, "physical_remove"),
            Self::SoftFlag => write!(f, "soft_flag"),
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SoftDeleteCapable => write!(f, "soft_delete_capable"),
            Self::NotCapable => write!(f, "not_capable"),
        }
    }
}

impl Capability {
    /// Probe a single entity
    pub fn of<E: Entity>(entity: &E) -> Self {
        if entity.soft_delete().is_some() {
            Self::SoftDeleteCapable
        } else {
            Self::NotCapable
        }
    }

    /// Classify a batch by its first element
    ///
    /// # Errors
    ///
    /// Returns an `EmptyInput` error when the batch is empty.
    pub fn of_batch<E: Entity>(entities: &[E]) -> RepositoryResult<Self> {
        entities.first().map(Self::of).ok_or_else(|| {
            RepositoryError::empty_input(RepositoryOperation::Classify).with_entity_type(E::COLLECTION)
        })
    }

    /// Check that every element shares the first element's capability
    ///
    /// # Errors
    ///
    /// Returns `EmptyInput` for an empty batch and `MixedCapability` naming the
    /// first disagreeing position otherwise.
    pub fn ensure_uniform<E: Entity>(entities: &[E]) -> RepositoryResult<Self> {
        let capability = Self::of_batch(entities)?;
        match entities.iter().position(|e| Self::of(e) != capability) {
            Some(position) => Err(RepositoryError::mixed_capability(
                RepositoryOperation::Classify,
                position,
            )
            .with_entity_type(E::COLLECTION)),
            None => Ok(capability),
        }
    }

    /// Strategy implied by the capability
    pub const fn strategy(self) -> DeleteStrategy {
        match self {
            Self::SoftDeleteCapable => DeleteStrategy::SoftFlag,
            Self::NotCapable => DeleteStrategy::PhysicalRemove,
        }
    }
}

/// Set the deletion flag to `true`, returning its previous value
///
/// Returns `None`, leaving the entity untouched, when it is not capable.
pub fn mark_deleted<E: Entity>(entity: &mut E) -> Option<bool> {
    entity.soft_delete_mut().map(|flag| {
        let previous = flag.is_deleted();
        flag.set_deleted(true);
        previous
    })
}

/// Put back a flag value returned by [`mark_deleted`]
pub fn restore_deleted<E: Entity>(entity: &mut E, previous: Option<bool>) {
    if let (Some(flag), Some(previous)) = (entity.soft_delete_mut(), previous) {
        flag.set_deleted(previous);
    }
}
