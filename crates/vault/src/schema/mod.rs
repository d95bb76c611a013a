//! Entity schemas: which fields of which record type are sensitive.
//!
//! # Responsibilities
//!
//! - Provide the compile-time table of DiaVise entities ([`EntityKind`]).
//! - Optionally load an OpenAPI document from disk, index every property
//!   annotated `x-pii: true` / `x-phi: true`, and refresh it on an interval.
//! - Given an entity name, return the [`EntitySchema`] the codec applies.
//!
//! # Module invariants
//!
//! - **No crypto dependencies.** This module must not import anything from
//!   `crate::crypto` or `crate::key`.

pub mod builtin;
pub mod registry;
pub mod resolver;

pub use builtin::EntityKind;
pub use registry::{RegistryError, SchemaRegistry};

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use openapiv3::OpenAPI;
use tokio::time;
use tracing::{info, warn};

/// How a decrypted value is turned back into JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Left as a string. Dates travel as ISO-8601 strings and use this kind.
    Text,
    /// Parsed back into a JSON number.
    Number,
    /// Parsed back into a JSON integer.
    Integer,
}

/// One sensitive field, addressed by dot-notation path.
///
/// `[]` after a segment expands into every array element:
/// `"current_medications[].dosage"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub path: String,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub fn new(path: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// Which fields of a record are sensitive.
#[derive(Debug, Clone)]
pub enum FieldRule {
    /// A fixed list of paths.
    Paths(Vec<FieldSpec>),
    /// Every key of the object at `path`, applied only when at least one of
    /// the top-level boolean flags in `when_any` is `true`.
    AllKeysUnder { path: String, when_any: Vec<String> },
}

/// The sensitive-field definition for one entity type.
#[derive(Debug, Clone)]
pub struct EntitySchema {
    pub name: String,
    pub rule: FieldRule,
}

/// Read an OpenAPI document (YAML or JSON) and resolve its entity schemas.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is neither valid YAML nor JSON.
pub async fn load_document(path: &Path) -> Result<Vec<EntitySchema>> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read schema document {}", path.display()))?;

    let api: OpenAPI = if let Ok(parsed) = serde_yaml::from_str(&text) {
        parsed
    } else if let Ok(parsed) = serde_json::from_str(&text) {
        parsed
    } else {
        anyhow::bail!(
            "failed to parse schema document {}: not valid YAML or JSON",
            path.display()
        );
    };

    Ok(resolver::resolve_entities(&api))
}

/// Load the schema document at `path` and atomically install it in `registry`.
///
/// # Errors
///
/// Propagates [`load_document`] failures; the registry is left untouched.
pub async fn load_all(path: &Path, registry: &SchemaRegistry) -> Result<()> {
    let entities = load_document(path).await?;
    if entities.is_empty() {
        warn!(path = %path.display(), "schema document defines no entities");
    }
    for entity in &entities {
        info!(entity = %entity.name, "loaded entity schema");
    }
    registry.replace_loaded(entities);
    info!(count = registry.len(), "schema registry refreshed");
    Ok(())
}

/// Spawn a background task that periodically reloads the schema document.
///
/// On reload failure the previous registry contents are retained and a
/// warning is emitted; the service continues with stale schemas.
pub fn refresh_task(
    path: PathBuf,
    interval: Duration,
    registry: SchemaRegistry,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        // The first tick fires immediately and startup has already loaded.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(e) = load_all(&path, &registry).await {
                warn!(error = %e, "schema refresh failed; retaining previous registry");
            }
        }
    })
}
