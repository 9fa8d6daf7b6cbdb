use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use log::{debug, warn};

use crate::errors::SchemaError;
use crate::schema::{DocumentType, Schema, SchemaBuilder};

#[derive(Default)]
struct Registry {
    by_type: HashMap<TypeId, Arc<Schema>>,
    by_name: HashMap<String, Arc<Schema>>,
    /// Names claimed by a `DocumentType`, with the type that claimed them.
    owners: HashMap<String, TypeId>,
}

static REGISTRY: OnceLock<RwLock<Registry>> = OnceLock::new();

fn registry() -> &'static RwLock<Registry> {
    REGISTRY.get_or_init(|| RwLock::new(Registry::default()))
}

/// The schema of `D`, built from its declaration on first use and cached afterwards.
///
/// Fails with [`SchemaError::DuplicateSchema`] when another type already uses `D::NAME`.
pub fn schema_for<D: DocumentType + ?Sized>() -> Result<Arc<Schema>, SchemaError> {
    let type_id = TypeId::of::<D>();
    if let Some(schema) = registry()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .by_type
        .get(&type_id)
    {
        return Ok(schema.clone());
    }

    let built = D::declare(SchemaBuilder::new(D::NAME)).build()?;
    let mut guard = registry().write().unwrap_or_else(PoisonError::into_inner);
    if let Some(schema) = guard.by_type.get(&type_id) {
        return Ok(schema.clone());
    }
    match guard.owners.get(D::NAME) {
        Some(owner) if *owner != type_id => {
            return Err(SchemaError::DuplicateSchema { name: D::NAME.to_string() });
        }
        _ => {}
    }
    if guard.by_name.contains_key(D::NAME) {
        warn!("document type schema '{}' replaces a runtime schema of the same name", D::NAME);
    }

    let schema = Arc::new(built);
    guard.by_type.insert(type_id, schema.clone());
    guard.by_name.insert(D::NAME.to_string(), schema.clone());
    guard.owners.insert(D::NAME.to_string(), type_id);
    debug!("registered schema '{}' with {} fields", schema.name(), schema.len());
    Ok(schema)
}

/// Register a schema built at runtime so it can be found by name.
///
/// A runtime schema may replace an earlier runtime schema of the same name,
/// but not one declared by a [`DocumentType`].
pub fn register_schema(schema: Schema) -> Result<Arc<Schema>, SchemaError> {
    let mut guard = registry().write().unwrap_or_else(PoisonError::into_inner);
    if guard.owners.contains_key(schema.name()) {
        return Err(SchemaError::DuplicateSchema {
            name: schema.name().to_string(),
        });
    }
    let schema = Arc::new(schema);
    if guard.by_name.insert(schema.name().to_string(), schema.clone()).is_some() {
        warn!("runtime schema '{}' replaced an earlier registration", schema.name());
    }
    Ok(schema)
}

pub fn get_schema(name: &str) -> Result<Arc<Schema>, SchemaError> {
    registry()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .by_name
        .get(name)
        .cloned()
        .ok_or_else(|| SchemaError::UnknownSchema { name: name.to_string() })
}
