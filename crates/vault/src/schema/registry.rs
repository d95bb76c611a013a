//! In-memory registry of entity schemas, keyed by entity name.
//!
//! Always holds the built-in [`EntityKind`] schemas. Schemas loaded from an
//! OpenAPI document are layered on top and can be swapped at runtime.
//! The registry uses `arc-swap` for lock-free reads on the hot path.

use std::{collections::HashMap, sync::Arc};

use arc_swap::ArcSwap;
use thiserror::Error;

use super::{EntityKind, EntitySchema};

/// Errors from the schema registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The requested entity name has no schema.
    #[error("unknown entity type: {0}")]
    UnknownEntity(String),
}

/// Shared, lock-free registry of entity schemas.
///
/// Internally backed by [`ArcSwap`] so readers never block and the background
/// refresh task can atomically swap in a completely new map.
#[derive(Clone, Debug)]
pub struct SchemaRegistry {
    inner: Arc<ArcSwap<HashMap<String, Arc<EntitySchema>>>>,
}

impl SchemaRegistry {
    /// Create a registry holding only the built-in entities.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ArcSwap::new(Arc::new(builtin_map()))),
        }
    }

    /// Return the number of entity schemas currently registered.
    pub fn len(&self) -> usize {
        self.inner.load().len()
    }

    /// Returns `true` if no schemas are registered.
    pub fn is_empty(&self) -> bool {
        self.inner.load().is_empty()
    }

    /// Registered entity names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.load().keys().cloned().collect();
        names.sort();
        names
    }

    /// Look up a schema by entity name.
    ///
    /// This is a lock-free read; safe to call on the hot encryption path.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownEntity`] if `name` is not present.
    pub fn get(&self, name: &str) -> Result<Arc<EntitySchema>, RegistryError> {
        self.inner
            .load()
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownEntity(name.to_owned()))
    }

    /// Atomically replace every document-defined schema.
    ///
    /// Built-ins are re-seeded first, so a schema dropped from the document
    /// falls back to its built-in definition (if any) rather than vanishing.
    /// Loaded schemas win over built-ins of the same name.
    pub fn replace_loaded(&self, loaded: Vec<EntitySchema>) {
        let mut map = builtin_map();
        for schema in loaded {
            map.insert(schema.name.clone(), Arc::new(schema));
        }
        self.inner.store(Arc::new(map));
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn builtin_map() -> HashMap<String, Arc<EntitySchema>> {
    EntityKind::ALL
        .into_iter()
        .map(|kind| (kind.name().to_owned(), Arc::new(kind.schema())))
        .collect()
}
