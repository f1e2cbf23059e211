//! Trait seams for the collaborators the core consumes but does not own

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::catalog::{ResolutionContext, SchemaCatalog};
use crate::entity::Entity;
use crate::error::Result;
use crate::types::{EntitySchema, PropertySpec, SchemaDescriptor};

/// Creates domain entities from plain data
///
/// Implemented for any `Fn(&Map<String, Value>) -> Box<dyn Entity>`, so a
/// constructor function can be attached directly to a descriptor.
pub trait EntityFactory: Send + Sync {
    /// Instantiate an entity from the top-level fields of `data`
    ///
    /// # Errors
    ///
    /// Returns an error if the data cannot be turned into an entity.
    fn create(&self, data: &Map<String, Value>) -> Result<Box<dyn Entity>>;
}

impl<F> EntityFactory for F
where
    F: Fn(&Map<String, Value>) -> Box<dyn Entity> + Send + Sync,
{
    fn create(&self, data: &Map<String, Value>) -> Result<Box<dyn Entity>> {
        Ok(self(data))
    }
}

/// Picks the concrete schema for one data instance at construction time
#[async_trait]
pub trait Discriminator: Send + Sync {
    /// Select the schema `data` should be built with
    ///
    /// # Errors
    ///
    /// Returns [`CeramicError::DiscriminatorError`](crate::CeramicError) when
    /// no schema matches, or a resolution error from the catalog.
    async fn discriminate(
        &self,
        data: &Value,
        base: &EntitySchema,
        catalog: &SchemaCatalog,
    ) -> Result<Arc<EntitySchema>>;
}

/// Supplies schemas that are not registered in the catalog
#[async_trait]
pub trait DynamicSchemaLoader: Send + Sync {
    /// Load the descriptor for `id`
    ///
    /// `Ok(None)` means the loader does not know the id. Dependencies may be
    /// resolved through `ctx.resolve`, which keeps cycle detection intact.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying source fails.
    async fn load(&self, id: &str, ctx: &ResolutionContext<'_>)
    -> Result<Option<SchemaDescriptor>>;
}

/// One primitive constraint violation reported by a matcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintViolation {
    /// Violated keyword (`type`, `minimum`, `pattern`, ...)
    pub constraint: String,
    /// Human-readable explanation
    pub message: String,
    /// Location inside the value, such as `[2]` for an array element
    pub location: Option<String>,
}

impl ConstraintViolation {
    /// Create a violation for the whole value
    pub fn new(constraint: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            constraint: constraint.into(),
            message: message.into(),
            location: None,
        }
    }

    /// Set the location inside the value
    #[must_use]
    pub fn at(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

/// Checks a value against a primitive property spec
pub trait ConstraintMatcher: Send + Sync {
    /// All violations of `spec` by `value`, in keyword order
    fn check(&self, value: &Value, spec: &PropertySpec) -> Vec<ConstraintViolation>;

    /// Get the matcher name
    fn name(&self) -> &str;
}
