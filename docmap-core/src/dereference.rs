//! Batch resolution of references.
//!
//! Loading a referenced association one object at a time costs one store round trip per
//! reference. The [`Dereferencer`] collects every reference in a set of values first, groups
//! them by class and fetches each class in a single batch.

use indexmap::IndexMap;
use log::debug;
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use crate::{
    document::{ErasedObject, Mapped, downcast_object},
    error::MappingResult,
    id::{Id, Reference},
    registry::MapperRegistry,
    value::{Association, Value},
};

/// Resolves references to loaded objects.
#[derive(Debug)]
pub struct Dereferencer {
    registry: Arc<MapperRegistry>,
    resolved: HashMap<Reference, Arc<dyn ErasedObject>>,
}

impl Dereferencer {
    pub fn new(registry: Arc<MapperRegistry>) -> Self {
        Self {
            registry,
            resolved: HashMap::new(),
        }
    }

    /// Loads every reference found in `values`, nested lists included.
    ///
    /// References already resolved are not fetched again. References whose object no longer
    /// exists stay unresolved.
    pub async fn load<'v>(
        &mut self,
        values: impl IntoIterator<Item = &'v Value>,
    ) -> MappingResult<()> {
        let mut seen = HashSet::new();
        let mut by_class: IndexMap<String, Vec<Id>> = IndexMap::new();

        let mut pending: Vec<&Value> = values.into_iter().collect();
        while let Some(value) = pending.pop() {
            match value {
                Value::List(items) => pending.extend(items),
                Value::Reference(reference) => {
                    if !self.resolved.contains_key(reference) && seen.insert(reference) {
                        by_class
                            .entry(reference.class.clone())
                            .or_default()
                            .push(reference.id.clone());
                    }
                }
                _ => {}
            }
        }

        for (class, ids) in by_class {
            let mapper = self.registry.lookup(&class)?;
            debug!(
                "event=dereference module=dereferencer class={class} references={}",
                ids.len()
            );

            for object in mapper.load_many(ids).await? {
                if let Some(id) = object.object_id() {
                    let reference = Reference::new(object.object_class(), id.clone());
                    self.resolved.insert(reference, object);
                }
            }
        }

        Ok(())
    }

    /// Returns the loaded object for a reference.
    pub fn get(&self, reference: &Reference) -> Option<Arc<dyn ErasedObject>> {
        self.resolved.get(reference).cloned()
    }

    /// Replaces loaded references in `value` by their objects, element-wise for lists.
    /// Anything else is returned unchanged.
    pub fn resolve(&self, value: Value) -> Value {
        match value {
            Value::Reference(reference) => match self.get(&reference) {
                Some(object) => Value::Object(object),
                None => Value::Reference(reference),
            },
            Value::List(items) => {
                Value::List(items.into_iter().map(|item| self.resolve(item)).collect())
            }
            other => other,
        }
    }

    /// Typed variant of [`resolve`](Self::resolve) for associations.
    pub fn resolve_association<U: Mapped>(&self, association: Association<U>) -> Association<U> {
        match association {
            Association::Reference(reference) => match self
                .get(&reference)
                .and_then(downcast_object::<U>)
            {
                Some(object) => Association::Loaded(object),
                None => Association::Reference(reference),
            },
            other => other,
        }
    }

    /// Number of resolved references.
    pub fn len(&self) -> usize {
        self.resolved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty()
    }
}
