//! Keyed storage shared by the registry's gateway and sink tables.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::watch;

type Listing<T> = Arc<Vec<Arc<T>>>;

/// Entities of one kind, addressable by a string key.
///
/// Writers go through the `DashMap`; every change republishes a full
/// listing on a `watch` channel so readers never hold a shard lock while
/// they format or sort.
pub(crate) struct EntityCollection<T> {
    entries: DashMap<String, Arc<T>>,
    listing: watch::Sender<Listing<T>>,
}

impl<T: Send + Sync + 'static> EntityCollection<T> {
    pub(crate) fn new() -> Self {
        Self {
            entries: DashMap::new(),
            listing: watch::Sender::new(Arc::new(Vec::new())),
        }
    }

    /// Store `entity` under `key`; `true` when nothing was there before.
    pub(crate) fn upsert(&self, key: String, entity: T) -> bool {
        let fresh = self.entries.insert(key, Arc::new(entity)).is_none();
        self.publish();
        fresh
    }

    pub(crate) fn remove(&self, key: &str) -> Option<Arc<T>> {
        let (_, entity) = self.entries.remove(key)?;
        self.publish();
        Some(entity)
    }

    /// Drop every entity for which `matches` holds and hand them back.
    pub(crate) fn remove_where(&self, mut matches: impl FnMut(&T) -> bool) -> Vec<Arc<T>> {
        let mut dropped = Vec::new();
        self.entries.retain(|_, entity| {
            if matches(&**entity) {
                dropped.push(Arc::clone(entity));
                false
            } else {
                true
            }
        });
        if !dropped.is_empty() {
            self.publish();
        }
        dropped
    }

    pub(crate) fn get(&self, key: &str) -> Option<Arc<T>> {
        self.entries.get(key).map(|entry| Arc::clone(&entry))
    }

    pub(crate) fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Latest published listing, in no particular order.
    pub(crate) fn snapshot(&self) -> Listing<T> {
        Arc::clone(&self.listing.borrow())
    }

    fn publish(&self) {
        let listing: Vec<Arc<T>> = self.entries.iter().map(|e| Arc::clone(e.value())).collect();
        // send_replace succeeds with or without receivers.
        self.listing.send_replace(Arc::new(listing));
    }
}
