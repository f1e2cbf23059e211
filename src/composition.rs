//! Schema completion and variant composition
//!
//! Completion normalizes a descriptor into an [`EntitySchema`]. Variant
//! composition merges a variant descriptor onto its base: the base's
//! properties are inherited and overridden by the variant's, and required
//! names are the ordered union of both, base first.

use indexmap::IndexSet;

use crate::error::{CeramicError, Result};
use crate::types::{DEFAULT_SCHEMA_TYPE, EntitySchema, SchemaDescriptor};

/// Normalize a descriptor into an entity schema
///
/// `$ref` properties are kept as-is and resolved on use.
///
/// # Errors
///
/// Returns [`CeramicError::InvalidSchema`] if the descriptor has no id.
pub fn complete_entity_schema(descriptor: &SchemaDescriptor) -> Result<EntitySchema> {
    let doc = &descriptor.schema;
    if doc.id.trim().is_empty() {
        return Err(CeramicError::invalid_schema(&doc.id, "schema id is empty"));
    }

    Ok(EntitySchema {
        id: doc.id.clone(),
        kind: doc
            .kind
            .clone()
            .unwrap_or_else(|| DEFAULT_SCHEMA_TYPE.to_string()),
        title: doc.title.clone(),
        description: doc.description.clone(),
        properties: doc.properties.clone(),
        required: doc.required.iter().cloned().collect(),
        ctor: descriptor.ctor.clone(),
        discriminator: descriptor.discriminator.clone(),
        base: None,
    })
}

/// Merge a variant descriptor onto its base
///
/// The variant keeps its own ctor when it has one and otherwise inherits the
/// base's. The base discriminator is never inherited.
///
/// # Errors
///
/// Returns [`CeramicError::InvalidSchema`] if either id is empty or the
/// variant reuses the base id.
pub fn complete_virtual_entity_schema(
    variant: &SchemaDescriptor,
    base: &SchemaDescriptor,
) -> Result<EntitySchema> {
    let base_schema = complete_entity_schema(base)?;
    let variant_schema = complete_entity_schema(variant)?;

    if variant_schema.id == base_schema.id {
        return Err(CeramicError::invalid_schema(
            &variant_schema.id,
            "variant id must differ from its base",
        ));
    }

    let mut properties = base_schema.properties;
    properties.extend(variant_schema.properties);

    let mut required: IndexSet<String> = base_schema.required;
    required.extend(variant_schema.required);

    Ok(EntitySchema {
        id: variant_schema.id,
        kind: variant
            .schema
            .kind
            .clone()
            .unwrap_or(base_schema.kind),
        title: variant_schema.title.or(base_schema.title),
        description: variant_schema.description.or(base_schema.description),
        properties,
        required,
        ctor: variant_schema.ctor.or(base_schema.ctor),
        discriminator: variant_schema.discriminator,
        base: Some(base_schema.id),
    })
}
