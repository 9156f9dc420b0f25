//! Per-mapper identity map.
//!
//! The map remembers which live instance represents a persisted `(class, id)` pair so repeated
//! lookups hand out the same object. It holds weak handles only: once every caller has dropped
//! an object, its entry is dead and gets pruned on the next access.

use mea::mutex::Mutex;
use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Weak},
};

use crate::{
    document::Mapped,
    error::{MappingError, MappingResult},
    id::Id,
};

type Key = (&'static str, Id);

/// Cache of live objects keyed by class and id.
///
/// The lock is only held for the map operation itself, never across a store call.
pub struct IdentityMap<T> {
    entries: Mutex<HashMap<Key, Weak<T>>>,
}

impl<T: Mapped> IdentityMap<T> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the live instance cached for `(class, id)`.
    pub async fn get(&self, class: &'static str, id: &Id) -> Option<Arc<T>> {
        let mut entries = self.entries.lock().await;
        let key = (class, id.clone());

        match entries.get(&key).map(Weak::upgrade) {
            Some(Some(object)) => Some(object),
            Some(None) => {
                entries.remove(&key);
                None
            }
            None => None,
        }
    }

    /// Caches `object` and returns the instance that represents its key.
    ///
    /// When a live instance is already cached for the key, that instance wins and `object`
    /// is dropped.
    pub async fn put(&self, object: Arc<T>) -> MappingResult<Arc<T>> {
        let id = object
            .id()
            .cloned()
            .ok_or(MappingError::NotPersisted { class: T::class_name() })?;
        let key = (T::class_name(), id);

        let mut entries = self.entries.lock().await;
        if let Some(existing) = entries.get(&key).and_then(Weak::upgrade) {
            return Ok(existing);
        }

        entries.insert(key, Arc::downgrade(&object));
        Ok(object)
    }

    /// Drops the entry for `id`, if any.
    pub async fn invalidate(&self, id: &Id) {
        self.entries
            .lock()
            .await
            .remove(&(T::class_name(), id.clone()));
    }

    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }

    /// Number of live entries.
    pub async fn len(&self) -> usize {
        let mut entries = self.entries.lock().await;
        entries.retain(|_, object| object.strong_count() > 0);
        entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl<T> fmt::Debug for IdentityMap<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityMap").finish_non_exhaustive()
    }
}

impl<T: Mapped> Default for IdentityMap<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Note {
        id: Option<Id>,
        text: String,
    }

    impl Mapped for Note {
        fn class_name() -> &'static str {
            "Note"
        }

        fn id(&self) -> Option<&Id> {
            self.id.as_ref()
        }

        fn set_id(&mut self, id: Id) {
            self.id = Some(id);
        }
    }

    fn note(id: &str, text: &str) -> Arc<Note> {
        Arc::new(Note { id: Some(Id::from(id)), text: text.into() })
    }

    #[tokio::test]
    async fn first_live_instance_wins() {
        let map = IdentityMap::new();
        let first = map.put(note("n1", "first")).await.unwrap();
        let second = map.put(note("n1", "second")).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.text, "first");

        let cached = map.get("Note", &Id::from("n1")).await.unwrap();
        assert!(Arc::ptr_eq(&first, &cached));
    }

    #[tokio::test]
    async fn dropped_objects_are_not_returned() {
        let map = IdentityMap::new();
        map.put(note("n1", "gone")).await.unwrap();

        assert!(map.get("Note", &Id::from("n1")).await.is_none());
        assert!(map.is_empty().await);
    }

    #[tokio::test]
    async fn unpersisted_objects_are_refused() {
        let map = IdentityMap::new();
        let result = map.put(Arc::new(Note::default())).await;

        assert!(matches!(result, Err(MappingError::NotPersisted { class: "Note" })));
    }

    #[tokio::test]
    async fn invalidate_forgets_one_entry() {
        let map = IdentityMap::new();
        let kept = map.put(note("n1", "kept")).await.unwrap();
        let other = map.put(note("n2", "other")).await.unwrap();

        map.invalidate(&Id::from("n1")).await;

        assert!(map.get("Note", &Id::from("n1")).await.is_none());
        assert!(map.get("Note", &Id::from("n2")).await.is_some());
        drop((kept, other));
    }
}
