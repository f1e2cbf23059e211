//! Table-backed variant selection

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::trace;

use crate::catalog::SchemaCatalog;
use crate::error::{CeramicError, Result};
use crate::traits::Discriminator;
use crate::types::EntitySchema;

/// Selects a variant by the string value of one data field
///
/// The value must name either the base schema itself or one of the variants
/// registered for it at `init` time. Anything else is a
/// [`CeramicError::DiscriminatorError`].
#[derive(Debug, Clone)]
pub struct FieldDiscriminator {
    field: String,
}

impl Default for FieldDiscriminator {
    fn default() -> Self {
        Self::new("type")
    }
}

impl FieldDiscriminator {
    /// Discriminate on `field`
    #[must_use]
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }

    /// Name of the discriminating field
    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }
}

#[async_trait]
impl Discriminator for FieldDiscriminator {
    async fn discriminate(
        &self,
        data: &Value,
        base: &EntitySchema,
        catalog: &SchemaCatalog,
    ) -> Result<Arc<EntitySchema>> {
        let tag = data
            .get(&self.field)
            .and_then(Value::as_str)
            .ok_or_else(|| {
                CeramicError::discriminator(
                    &base.id,
                    format!("data has no string field '{}'", self.field),
                )
            })?;

        if tag != base.id && !catalog.is_variant_of(tag, &base.id) {
            return Err(CeramicError::discriminator(
                &base.id,
                format!(
                    "'{tag}' is not a variant of '{}' (known: {})",
                    base.id,
                    catalog.variants_of(&base.id).join(", ")
                ),
            ));
        }

        trace!("Discriminated '{}' as '{tag}'", base.id);
        catalog.resolve_ref(tag).await
    }
}
