//! Entities and seeded stores shared by the repository tests

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::entity::{Entity, EntityKey, SoftDelete};
use crate::repository::Repository;
use crate::store::MemoryStore;

/// Soft-delete capable entity with an includable `tag` relation
#[derive(Debug, Clone, PartialEq, Default)]
pub(crate) struct Widget {
    pub key: Option<EntityKey>,
    pub name: String,
    pub weight: u32,
    pub tag_key: Option<EntityKey>,
    pub tag: Option<Tag>,
    pub is_deleted: bool,
}

impl SoftDelete for Widget {
    fn is_deleted(&self) -> bool {
        self.is_deleted
    }

    fn set_deleted(&mut self, deleted: bool) {
        self.is_deleted = deleted;
    }
}

impl Entity for Widget {
    const COLLECTION: &'static str = "widgets";

    fn key(&self) -> Option<EntityKey> {
        self.key
    }

    fn set_key(&mut self, key: EntityKey) {
        self.key = Some(key);
    }

    fn soft_delete(&self) -> Option<&dyn SoftDelete> {
        Some(self)
    }

    fn soft_delete_mut(&mut self) -> Option<&mut dyn SoftDelete> {
        Some(self)
    }
}

/// Entity without a deletion flag
#[derive(Debug, Clone, PartialEq, Default)]
pub(crate) struct Tag {
    pub key: Option<EntityKey>,
    pub label: String,
}

impl Entity for Tag {
    const COLLECTION: &'static str = "tags";

    fn key(&self) -> Option<EntityKey> {
        self.key
    }

    fn set_key(&mut self, key: EntityKey) {
        self.key = Some(key);
    }
}

/// Entity whose capability is decided per value
#[derive(Debug, Clone, PartialEq, Default)]
pub(crate) struct Note {
    pub key: Option<EntityKey>,
    pub text: String,
    pub archivable: bool,
    pub archived: bool,
}

impl SoftDelete for Note {
    fn is_deleted(&self) -> bool {
        self.archived
    }

    fn set_deleted(&mut self, deleted: bool) {
        self.archived = deleted;
    }
}

impl Entity for Note {
    const COLLECTION: &'static str = "notes";

    fn key(&self) -> Option<EntityKey> {
        self.key
    }

    fn set_key(&mut self, key: EntityKey) {
        self.key = Some(key);
    }

    fn soft_delete(&self) -> Option<&dyn SoftDelete> {
        self.archivable.then_some(self as &dyn SoftDelete)
    }

    fn soft_delete_mut(&mut self) -> Option<&mut dyn SoftDelete> {
        if self.archivable {
            Some(self)
        } else {
            None
        }
    }
}

pub(crate) fn widget(name: &str, weight: u32, tag: Option<&Tag>) -> Widget {
    Widget {
        name: name.to_string(),
        weight,
        tag_key: tag.and_then(|t| t.key),
        ..Default::default()
    }
}

pub(crate) fn tag(label: &str) -> Tag {
    Tag {
        key: None,
        label: label.to_string(),
    }
}

pub(crate) fn note(text: &str, archivable: bool) -> Note {
    Note {
        text: text.to_string(),
        archivable,
        ..Default::default()
    }
}

/// Journaling store with the `tag` relation registered on widgets
pub(crate) fn store() -> Arc<MemoryStore> {
    let store = MemoryStore::recording();
    store.register_include::<Widget, _>("tag", |widget, catalog| {
        widget.tag = widget.tag_key.and_then(|key| catalog.find::<Tag>(key));
    });
    Arc::new(store)
}

/// Store holding tags `red`, `blue` and widgets `bolt`, `gear`, `nut`, `axle`
pub(crate) async fn seeded() -> (Arc<MemoryStore>, CancellationToken) {
    let store = store();
    let cancel = CancellationToken::new();

    let tags = Repository::<_, Tag>::new(Arc::clone(&store));
    let mut red = tag("red");
    let mut blue = tag("blue");
    tags.add(&mut red, &cancel).await.unwrap();
    tags.add(&mut blue, &cancel).await.unwrap();

    let widgets = Repository::<_, Widget>::new(Arc::clone(&store));
    let mut rows = vec![
        widget("bolt", 5, Some(&red)),
        widget("gear", 12, Some(&blue)),
        widget("nut", 3, Some(&red)),
        widget("axle", 20, None),
    ];
    widgets.add_many(&mut rows, &cancel).await.unwrap();

    (store, cancel)
}
