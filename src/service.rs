//! The `Ceramic` façade
//!
//! Bundles one catalog, one constraint matcher and the configuration, and
//! exposes the whole construct/update/validate surface on top of them.

use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::builder::{BuildOptions, EntityBuilder};
use crate::catalog::SchemaCatalog;
use crate::composition;
use crate::config::CeramicConfig;
use crate::entity::Entity;
use crate::error::Result;
use crate::traits::{ConstraintMatcher, DynamicSchemaLoader};
use crate::types::{EntitySchema, SchemaDescriptor, VirtualSchemaGroup};
use crate::validator::{BasicConstraintMatcher, ConstraintErrors, Validator};

/// Schema catalog plus entity construction and validation
pub struct Ceramic {
    catalog: Arc<SchemaCatalog>,
    matcher: Arc<dyn ConstraintMatcher>,
    config: CeramicConfig,
}

impl Default for Ceramic {
    fn default() -> Self {
        Self::new(CeramicConfig::default())
    }
}

impl Ceramic {
    /// Create an instance without a dynamic loader
    #[must_use]
    pub fn new(config: CeramicConfig) -> Self {
        Self {
            catalog: Arc::new(SchemaCatalog::new(config.catalog.clone())),
            matcher: Arc::new(BasicConstraintMatcher::new()),
            config,
        }
    }

    /// Create an instance that loads unknown schemas through `loader`
    #[must_use]
    pub fn with_loader(config: CeramicConfig, loader: Arc<dyn DynamicSchemaLoader>) -> Self {
        Self {
            catalog: Arc::new(SchemaCatalog::with_loader(config.catalog.clone(), loader)),
            matcher: Arc::new(BasicConstraintMatcher::new()),
            config,
        }
    }

    /// Replace the constraint matcher used for primitive checks
    #[must_use]
    pub fn with_matcher(mut self, matcher: Arc<dyn ConstraintMatcher>) -> Self {
        debug!("Using constraint matcher '{}'", matcher.name());
        self.matcher = matcher;
        self
    }

    /// Register descriptors and virtual groups
    ///
    /// # Errors
    ///
    /// Returns [`CeramicError::InvalidSchema`](crate::CeramicError::InvalidSchema)
    /// if a descriptor cannot be completed.
    pub fn init<D, G>(&self, descriptors: D, virtual_groups: G) -> Result<&Self>
    where
        D: IntoIterator<Item = SchemaDescriptor>,
        G: IntoIterator<Item = VirtualSchemaGroup>,
    {
        self.catalog.init(descriptors, virtual_groups)?;
        Ok(self)
    }

    /// Complete a descriptor without registering it
    ///
    /// # Errors
    ///
    /// Returns [`CeramicError::InvalidSchema`](crate::CeramicError::InvalidSchema)
    /// for a descriptor without id.
    pub fn complete_entity_schema(&self, descriptor: &SchemaDescriptor) -> Result<EntitySchema> {
        composition::complete_entity_schema(descriptor)
    }

    /// Merge a variant onto its base without registering it
    ///
    /// # Errors
    ///
    /// Returns [`CeramicError::InvalidSchema`](crate::CeramicError::InvalidSchema)
    /// if either descriptor is unusable.
    pub fn complete_virtual_entity_schema(
        &self,
        variant: &SchemaDescriptor,
        base: &SchemaDescriptor,
    ) -> Result<EntitySchema> {
        composition::complete_virtual_entity_schema(variant, base)
    }

    /// Resolve a schema by id, loading it dynamically on a miss
    ///
    /// # Errors
    ///
    /// Returns the errors of [`SchemaCatalog::resolve_ref`].
    pub async fn schema(&self, id: &str) -> Result<Arc<EntitySchema>> {
        self.catalog.resolve_ref(id).await
    }

    /// Construct an entity from `data`
    ///
    /// `options` of `None` validates according to
    /// `validation.validate_on_construct`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`EntityBuilder::construct_entity`].
    pub async fn construct_entity(
        &self,
        data: &Value,
        schema: &EntitySchema,
        options: Option<BuildOptions>,
    ) -> Result<Box<dyn Entity>> {
        self.builder()
            .construct_entity(data, schema, self.options(options))
            .await
    }

    /// Update `entity` in place from `data`
    ///
    /// # Errors
    ///
    /// Returns the errors of [`EntityBuilder::update_entity`].
    pub async fn update_entity(
        &self,
        entity: &mut dyn Entity,
        data: &Value,
        schema: &EntitySchema,
        options: Option<BuildOptions>,
    ) -> Result<()> {
        self.builder()
            .update_entity(entity, data, schema, self.options(options))
            .await
    }

    /// Validate an entity
    ///
    /// # Errors
    ///
    /// Returns an error only if a referenced schema cannot be resolved.
    pub async fn validate(
        &self,
        entity: &dyn Entity,
        schema: &EntitySchema,
    ) -> Result<Option<ConstraintErrors>> {
        self.validator().validate(entity, schema).await
    }

    /// Validate plain data against a schema
    ///
    /// # Errors
    ///
    /// Returns an error only if a referenced schema cannot be resolved.
    pub async fn validate_value(
        &self,
        data: &Value,
        schema: &EntitySchema,
    ) -> Result<Option<ConstraintErrors>> {
        self.validator().validate_value(data, schema).await
    }

    /// Construct an entity of the schema registered under `id`
    ///
    /// # Errors
    ///
    /// Returns resolution errors for `id` and the errors of
    /// [`EntityBuilder::construct_entity`].
    pub async fn construct_by_id(
        &self,
        id: &str,
        data: &Value,
        options: Option<BuildOptions>,
    ) -> Result<Box<dyn Entity>> {
        let schema = self.schema(id).await?;
        self.construct_entity(data, &schema, options).await
    }

    /// The underlying catalog
    #[must_use]
    pub fn catalog(&self) -> &Arc<SchemaCatalog> {
        &self.catalog
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &CeramicConfig {
        &self.config
    }

    fn builder(&self) -> EntityBuilder<'_> {
        EntityBuilder::new(&self.catalog, self.matcher.as_ref())
    }

    fn validator(&self) -> Validator<'_> {
        Validator::new(&self.catalog, self.matcher.as_ref())
    }

    fn options(&self, options: Option<BuildOptions>) -> BuildOptions {
        options.unwrap_or(BuildOptions {
            validate: self.config.validation.validate_on_construct,
        })
    }
}

impl std::fmt::Debug for Ceramic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ceramic")
            .field("catalog", &self.catalog)
            .field("matcher", &self.matcher.name())
            .field("config", &self.config)
            .finish()
    }
}

impl From<CeramicConfig> for Ceramic {
    fn from(config: CeramicConfig) -> Self {
        Self::new(config)
    }
}
