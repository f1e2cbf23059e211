//! Entity construction and update
//!
//! Construction and update share one traversal. At every level the builder
//! picks the concrete schema (running the schema's discriminator, if any),
//! assigns plain fields, and replaces each present reference field with an
//! entity built from the referenced schema.

use futures::future::BoxFuture;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::catalog::SchemaCatalog;
use crate::entity::{self, Entity, Field, Record};
use crate::error::{CeramicError, Result};
use crate::traits::ConstraintMatcher;
use crate::types::{EntitySchema, PropertyShape, PropertySpec};
use crate::validator::{Dispatched, Validator};

/// Options for [`EntityBuilder::construct_entity`] and
/// [`EntityBuilder::update_entity`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildOptions {
    /// Validate the built entity and fail with
    /// [`CeramicError::ValidationFailed`] on errors
    pub validate: bool,
}

impl BuildOptions {
    /// Options with validation enabled
    #[must_use]
    pub fn validated() -> Self {
        Self { validate: true }
    }
}

/// Whether a level of the traversal allocates or mutates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BuildMode {
    /// Allocate new entities
    Construct,
    /// Assign onto existing entities where there are any
    Update,
}

/// Builds entities against one catalog
pub struct EntityBuilder<'a> {
    catalog: &'a SchemaCatalog,
    matcher: &'a dyn ConstraintMatcher,
}

impl<'a> EntityBuilder<'a> {
    /// Create a builder; `matcher` is used when validation is requested
    #[must_use]
    pub fn new(catalog: &'a SchemaCatalog, matcher: &'a dyn ConstraintMatcher) -> Self {
        Self { catalog, matcher }
    }

    /// Construct a new entity from `data`
    ///
    /// Each discriminator on the way runs once; validation reuses the
    /// variants selected here.
    ///
    /// # Errors
    ///
    /// - [`CeramicError::InvalidData`] if `data` is not an object
    /// - [`CeramicError::DiscriminatorError`] if no variant matches
    /// - resolution errors for referenced schemas
    /// - [`CeramicError::ValidationFailed`] if `options.validate` is set and
    ///   the entity is invalid
    pub async fn construct_entity(
        &self,
        data: &Value,
        schema: &EntitySchema,
        options: BuildOptions,
    ) -> Result<Box<dyn Entity>> {
        let dispatched = Dispatched::new();
        let variant = self.dispatch(data, schema).await?;
        let concrete = variant.as_deref().unwrap_or(schema);
        let map = object(data, concrete)?;

        let entity = self.construct(map, concrete, &dispatched).await?;
        if options.validate {
            record(&dispatched, entity.as_ref(), variant.clone());
            self.ensure_valid(entity.as_ref(), concrete, &dispatched).await?;
        }
        Ok(entity)
    }

    /// Assign `data` onto an existing entity
    ///
    /// Fields not mentioned in `data` are left untouched. A single-valued
    /// reference field that already holds an entity is updated in place;
    /// other reference fields are rebuilt.
    ///
    /// # Errors
    ///
    /// The same as [`EntityBuilder::construct_entity`]. On error the entity
    /// may have been partially updated.
    pub async fn update_entity(
        &self,
        entity: &mut dyn Entity,
        data: &Value,
        schema: &EntitySchema,
        options: BuildOptions,
    ) -> Result<()> {
        let dispatched = Dispatched::new();
        let variant = self.dispatch(data, schema).await?;
        let concrete = variant.as_deref().unwrap_or(schema);
        let map = object(data, concrete)?;

        self.assign(entity, map, concrete, BuildMode::Update, &dispatched)
            .await?;
        if options.validate {
            record(&dispatched, entity, variant.clone());
            self.ensure_valid(entity, concrete, &dispatched).await?;
        }
        Ok(())
    }

    async fn dispatch(
        &self,
        data: &Value,
        schema: &EntitySchema,
    ) -> Result<Option<Arc<EntitySchema>>> {
        let Some(discriminator) = &schema.discriminator else {
            return Ok(None);
        };

        match discriminator.discriminate(data, schema, self.catalog).await {
            Ok(selected) => {
                debug!("Dispatched '{}' to '{}'", schema.id, selected.id);
                Ok(Some(selected))
            }
            Err(CeramicError::SchemaNotFound { id, reason }) => Err(CeramicError::discriminator(
                &schema.id,
                format!("selected schema '{id}' is not resolvable: {reason}"),
            )),
            Err(err) => Err(err),
        }
    }

    fn construct<'b>(
        &'b self,
        data: &'b Map<String, Value>,
        schema: &'b EntitySchema,
        dispatched: &'b Dispatched,
    ) -> BoxFuture<'b, Result<Box<dyn Entity>>> {
        Box::pin(async move {
            let mut entity: Box<dyn Entity> = match self.catalog.factory_for(schema) {
                Some(factory) => factory.create(data)?,
                None => Box::new(Record::from_map(data)),
            };
            self.assign(entity.as_mut(), data, schema, BuildMode::Construct, dispatched)
                .await?;
            Ok(entity)
        })
    }

    fn assign<'b>(
        &'b self,
        entity: &'b mut dyn Entity,
        data: &'b Map<String, Value>,
        schema: &'b EntitySchema,
        mode: BuildMode,
        dispatched: &'b Dispatched,
    ) -> BoxFuture<'b, Result<()>> {
        Box::pin(async move {
            if mode == BuildMode::Update {
                for (name, value) in data {
                    let structural = schema.property(name).is_some_and(PropertySpec::is_structural);
                    if structural && !value.is_null() {
                        continue;
                    }
                    entity.set_field(name, Field::Value(value.clone()));
                }
            }

            for (name, spec) in &schema.properties {
                let Some(value) = data.get(name).filter(|value| !value.is_null()) else {
                    continue;
                };
                let Some(nested) = self.catalog.resolve_property(schema, name, spec).await? else {
                    continue;
                };

                let field = if let PropertyShape::Array(items) = spec.shape() {
                    Some(self.build_elements(value, items, &nested, dispatched).await?)
                } else {
                    let existing = match mode {
                        BuildMode::Update => entity.field_mut(name).and_then(Field::as_entity_mut),
                        BuildMode::Construct => None,
                    };
                    self.build_nested(existing, value, &nested, dispatched).await?
                };

                if let Some(field) = field {
                    entity.set_field(name, field);
                }
            }
            Ok(())
        })
    }

    /// Build one nested value; `None` means `existing` was updated in place
    async fn build_nested(
        &self,
        existing: Option<&mut (dyn Entity + 'static)>,
        value: &Value,
        schema: &EntitySchema,
        dispatched: &Dispatched,
    ) -> Result<Option<Field>> {
        let Some(map) = value.as_object() else {
            return Ok(Some(Field::Value(value.clone())));
        };

        let variant = self.dispatch(value, schema).await?;
        let concrete = variant.as_deref().unwrap_or(schema);

        match existing {
            Some(entity) => {
                self.assign(&mut *entity, map, concrete, BuildMode::Update, dispatched)
                    .await?;
                record(dispatched, entity, variant);
                Ok(None)
            }
            None => {
                let entity = self.construct(map, concrete, dispatched).await?;
                record(dispatched, entity.as_ref(), variant);
                Ok(Some(Field::Entity(entity)))
            }
        }
    }

    /// Build each element against `items`, descending through nested arrays
    fn build_elements<'b>(
        &'b self,
        value: &'b Value,
        items: &'b PropertySpec,
        schema: &'b EntitySchema,
        dispatched: &'b Dispatched,
    ) -> BoxFuture<'b, Result<Field>> {
        Box::pin(async move {
            let Some(values) = value.as_array() else {
                return Ok(Field::Value(value.clone()));
            };

            let mut elements = Vec::with_capacity(values.len());
            for element in values {
                let built = if let PropertyShape::Array(inner) = items.shape() {
                    self.build_elements(element, inner, schema, dispatched).await?
                } else {
                    self.build_nested(None, element, schema, dispatched)
                        .await?
                        .unwrap_or_else(|| Field::Value(element.clone()))
                };
                elements.push(built);
            }
            Ok(Field::List(elements))
        })
    }

    async fn ensure_valid(
        &self,
        entity: &dyn Entity,
        schema: &EntitySchema,
        dispatched: &Dispatched,
    ) -> Result<()> {
        let validator = Validator::new(self.catalog, self.matcher).with_dispatched(dispatched);
        match validator.validate(entity, schema).await? {
            None => Ok(()),
            Some(errors) => {
                warn!(
                    "Entity of schema '{}' failed validation with {} errors",
                    schema.id,
                    errors.len()
                );
                Err(CeramicError::ValidationFailed {
                    schema: schema.id.clone(),
                    errors,
                })
            }
        }
    }
}

/// Remember the variant a nested entity was built from
fn record(dispatched: &Dispatched, entity: &dyn Entity, variant: Option<Arc<EntitySchema>>) {
    if let Some(variant) = variant {
        dispatched.insert(entity::address(entity), variant);
    }
}

fn object<'v>(data: &'v Value, schema: &EntitySchema) -> Result<&'v Map<String, Value>> {
    data.as_object().ok_or_else(|| {
        CeramicError::invalid_data(&schema.id, "entity data must be a JSON object")
    })
}
