//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use crate::crypto::FieldCipher;
use crate::key::{EncryptionKey, KeySource, LoadedKey};
use crate::schema::SchemaRegistry;

/// Application state shared across all request handlers.
///
/// All fields are cheaply cloneable (`Arc`-wrapped or already `Arc`-backed) so
/// that Axum can clone the state for each request without copying expensive data.
#[derive(Clone)]
pub struct AppState {
    /// Cipher bound to the process key.
    pub cipher: FieldCipher,
    /// Whether the key was configured or generated at startup.
    pub key_source: KeySource,
    /// Lock-free registry of entity schemas.
    pub registry: SchemaRegistry,
    /// Name of the HTTP header used to identify the entity of each request.
    pub entity_header_name: Arc<String>,
}

impl AppState {
    /// Create a new [`AppState`] from the loaded key, registry and header name.
    pub fn new(loaded: LoadedKey, registry: SchemaRegistry, entity_header_name: String) -> Self {
        Self {
            cipher: FieldCipher::new(loaded.key),
            key_source: loaded.source,
            registry,
            entity_header_name: Arc::new(entity_header_name),
        }
    }
}

impl Default for AppState {
    /// Creates an [`AppState`] with an ephemeral key and the built-in
    /// entities, suitable for tests.
    fn default() -> Self {
        Self::new(
            LoadedKey {
                key: EncryptionKey::generate(),
                source: KeySource::Ephemeral,
            },
            SchemaRegistry::new(),
            "X-Entity-Type".into(),
        )
    }
}
