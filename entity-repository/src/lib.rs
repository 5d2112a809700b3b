//! # entity-repository
//!
//! Storage-agnostic generic repository: one CRUD surface for every entity type,
//! independent of the store's native query API.
//!
//! ## Features
//!
//! - **Fixed-order query composition**: optional filter, order and include
//!   directives always apply as filter → order → include, then the tracking mode
//! - **Soft-delete dispatch**: entities declaring a deletion flag are flagged and
//!   updated, everything else is physically removed
//! - **Async core with blocking adapter**: one implementation behind both forms
//! - **Pluggable storage**: anything implementing [`store::Store`]; an in-process
//!   [`store::MemoryStore`] ships as the reference collaborator
//! - **Configuration**: Figment layering of defaults, TOML files and environment
//! - **Observability**: structured `tracing` output
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use entity_repository::prelude::*;
//!
//! #[derive(Debug, Clone)]
//! struct Widget {
//!     key: Option<EntityKey>,
//!     name: String,
//!     weight: u32,
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
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<()> {
//!     let config = Config::load()?;
//!     init_tracing(&config)?;
//!
//!     let store = Arc::new(MemoryStore::new());
//!     let widgets = Repository::<_, Widget>::with_config(store, config.repository);
//!     let cancel = CancellationToken::new();
//!
//!     let mut bolt = Widget { key: None, name: "bolt".into(), weight: 5, is_deleted: false };
//!     widgets.add(&mut bolt, &cancel).await?;
//!     widgets.delete(&mut bolt, &cancel).await?;
//!
//!     let live = widgets
//!         .get_list(
//!             QueryOptions::new()
//!                 .filter(|w: &Widget| !w.is_deleted)
//!                 .order_by(OrderBy::desc(|w: &Widget| w.weight)),
//!             &cancel,
//!         )
//!         .await?;
//!     assert!(live.is_empty());
//!
//!     shutdown_tracing();
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod entity;
pub mod error;
pub mod observability;
pub mod repository;
pub mod store;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{Config, LogFormat, LoggingConfig, RepositoryConfig};

    pub use crate::entity::{Entity, EntityKey, SoftDelete};

    pub use crate::error::{Error, Result};

    pub use crate::observability::{init_tracing, shutdown_tracing};

    pub use crate::repository::{
        BlockingRepository, Capability, DeleteStrategy, OrderBy, OrderDirection, Queryable,
        QueryOptions, Repository, RepositoryError, RepositoryErrorKind, RepositoryOperation,
        RepositoryResult, Scope, TrackingMode,
    };

    pub use crate::store::{
        MemoryStore, StorageError, StorageErrorKind, StorageOperation, StorageResult, Store,
    };

    pub use tokio_util::sync::CancellationToken;
}
