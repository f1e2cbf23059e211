//! Validation of entities against resolved schemas
//!
//! Errors come out in a fixed order so equal inputs always give equal
//! output:
//!
//! 1. missing required fields, in declaration order
//! 2. primitive violations reported by the [`ConstraintMatcher`], in property
//!    order, including array keywords such as `minItems`
//! 3. violations inside nested references and nested arrays, with property
//!    paths prefixed
//!
//! A schema that declares a discriminator is checked through the variant it
//! selects. Data no variant accepts gives one `discriminator` error.
//!
//! The result is `Ok(None)` when there is nothing to report. Data problems
//! never surface as `Err`; only schema resolution failures do.

pub mod matcher;
pub mod report;

pub use matcher::BasicConstraintMatcher;
pub use report::{ConstraintError, ConstraintErrors};

use dashmap::DashMap;
use futures::future::BoxFuture;
use serde_json::Value;
use std::sync::Arc;

use crate::catalog::SchemaCatalog;
use crate::entity::{self, Entity, Field, Record};
use crate::error::{CeramicError, Result};
use crate::traits::{ConstraintMatcher, ConstraintViolation};
use crate::types::{EntitySchema, PropertyShape, PropertySpec};
use report::{DISCRIMINATOR, TYPE};

/// Schemas chosen by discriminators during one build, keyed by entity address
pub(crate) type Dispatched = DashMap<usize, Arc<EntitySchema>>;

/// Schema an entity is checked against
enum Selection {
    /// The schema passed in
    Given,
    /// A variant picked by the schema's discriminator
    Variant(Arc<EntitySchema>),
    /// The discriminator rejected the data
    Unmatched(String),
}

/// Recursive validator bound to one catalog and matcher
pub struct Validator<'a> {
    catalog: &'a SchemaCatalog,
    matcher: &'a dyn ConstraintMatcher,
    dispatched: Option<&'a Dispatched>,
}

impl<'a> Validator<'a> {
    /// Create a validator
    #[must_use]
    pub fn new(catalog: &'a SchemaCatalog, matcher: &'a dyn ConstraintMatcher) -> Self {
        Self {
            catalog,
            matcher,
            dispatched: None,
        }
    }

    /// Reuse variants the builder already selected instead of discriminating again
    pub(crate) fn with_dispatched(mut self, dispatched: &'a Dispatched) -> Self {
        self.dispatched = Some(dispatched);
        self
    }

    /// Validate an entity
    ///
    /// A schema with a discriminator is checked through the variant its
    /// discriminator selects for the entity, at every level.
    ///
    /// # Errors
    ///
    /// Returns an error only if a referenced schema cannot be resolved.
    pub async fn validate(
        &self,
        entity: &dyn Entity,
        schema: &EntitySchema,
    ) -> Result<Option<ConstraintErrors>> {
        let errors = self.collect(entity, schema).await?;
        Ok(ConstraintErrors::from_vec(errors))
    }

    /// Validate plain data as if it were an entity
    ///
    /// # Errors
    ///
    /// Returns an error only if a referenced schema cannot be resolved.
    pub async fn validate_value(
        &self,
        data: &Value,
        schema: &EntitySchema,
    ) -> Result<Option<ConstraintErrors>> {
        let Some(map) = data.as_object() else {
            return Ok(ConstraintErrors::from_vec(vec![ConstraintError::for_entity(
                TYPE,
                format!("expected object of schema '{}'", schema.id),
            )]));
        };
        self.validate(&Record::from_map(map), schema).await
    }

    async fn select(&self, entity: &dyn Entity, schema: &EntitySchema) -> Result<Selection> {
        let Some(discriminator) = &schema.discriminator else {
            return Ok(Selection::Given);
        };
        let recorded = self
            .dispatched
            .and_then(|dispatched| dispatched.get(&entity::address(entity)))
            .map(|selected| Arc::clone(selected.value()));
        if let Some(selected) = recorded {
            return Ok(Selection::Variant(selected));
        }

        let data = entity.to_value();
        match discriminator.discriminate(&data, schema, self.catalog).await {
            Ok(selected) => Ok(Selection::Variant(selected)),
            Err(CeramicError::DiscriminatorError { reason, .. }) => {
                Ok(Selection::Unmatched(reason))
            }
            Err(CeramicError::SchemaNotFound { id, reason }) => Ok(Selection::Unmatched(format!(
                "selected schema '{id}' is not resolvable: {reason}"
            ))),
            Err(err) => Err(err),
        }
    }

    fn collect<'b>(
        &'b self,
        entity: &'b dyn Entity,
        schema: &'b EntitySchema,
    ) -> BoxFuture<'b, Result<Vec<ConstraintError>>> {
        Box::pin(async move {
            let variant = match self.select(entity, schema).await? {
                Selection::Given => None,
                Selection::Variant(variant) => Some(variant),
                Selection::Unmatched(reason) => {
                    return Ok(vec![ConstraintError::for_entity(DISCRIMINATOR, reason)]);
                }
            };
            let schema = variant.as_deref().unwrap_or(schema);
            let mut errors = Vec::new();

            for name in &schema.required {
                if !entity.has(name) {
                    errors.push(ConstraintError::required(name.as_str()));
                }
            }

            for (name, spec) in &schema.properties {
                let Some(field) = present(entity, name) else {
                    continue;
                };
                match spec.shape() {
                    PropertyShape::Primitive => errors.extend(self.check_own(field, spec, name)),
                    PropertyShape::Array(_) => {
                        errors.extend(self.check_own(field, &spec.constraints_only(), name));
                    }
                    PropertyShape::Reference(_) | PropertyShape::Inline => {}
                }
            }

            for (name, spec) in &schema.properties {
                let Some(field) = present(entity, name) else {
                    continue;
                };
                let Some(nested) = self.catalog.resolve_property(schema, name, spec).await? else {
                    continue;
                };

                if let PropertyShape::Array(items) = spec.shape() {
                    errors.extend(self.check_elements(field, items, &nested, name).await?);
                } else {
                    errors.extend(self.check_nested(field, &nested, name).await?);
                }
            }

            Ok(errors)
        })
    }

    /// Keywords that apply to the field's own value
    fn check_own(&self, field: &Field, spec: &PropertySpec, path: &str) -> Vec<ConstraintError> {
        self.matcher
            .check(&field.to_value(), spec)
            .into_iter()
            .map(|ConstraintViolation { constraint, location, message }| {
                let property = match location {
                    Some(location) => format!("{path}{location}"),
                    None => path.to_string(),
                };
                ConstraintError::new(constraint, property).with_message(message)
            })
            .collect()
    }

    async fn check_nested(
        &self,
        field: &Field,
        schema: &EntitySchema,
        path: &str,
    ) -> Result<Vec<ConstraintError>> {
        let errors = match field {
            Field::Entity(entity) => self.collect(entity.as_ref(), schema).await?,
            Field::Value(Value::Object(map)) => {
                let record = Record::from_map(map);
                self.collect(&record, schema).await?
            }
            _ => {
                return Ok(vec![ConstraintError::new(TYPE, path).with_message(format!(
                    "expected object of schema '{}', found {}",
                    schema.id,
                    describe(field)
                ))]);
            }
        };
        Ok(errors.into_iter().map(|e| e.nested_under(path)).collect())
    }

    /// Check each element against `items`, descending through nested arrays
    fn check_elements<'b>(
        &'b self,
        field: &'b Field,
        items: &'b PropertySpec,
        schema: &'b EntitySchema,
        path: &'b str,
    ) -> BoxFuture<'b, Result<Vec<ConstraintError>>> {
        Box::pin(async move {
            let wrapped: Vec<Field>;
            let elements: &[Field] = match field {
                Field::List(elements) => elements,
                Field::Value(Value::Array(values)) => {
                    wrapped = values.iter().cloned().map(Field::Value).collect();
                    &wrapped
                }
                _ => {
                    return Ok(vec![ConstraintError::new(TYPE, path).with_message(format!(
                        "expected array of '{}', found {}",
                        schema.id,
                        describe(field)
                    ))]);
                }
            };

            let mut errors = Vec::new();
            for (index, element) in elements.iter().enumerate() {
                let path = format!("{path}[{index}]");
                if let PropertyShape::Array(inner) = items.shape() {
                    errors.extend(self.check_own(element, &items.constraints_only(), &path));
                    errors.extend(self.check_elements(element, inner, schema, &path).await?);
                } else {
                    errors.extend(self.check_nested(element, schema, &path).await?);
                }
            }
            Ok(errors)
        })
    }
}

fn present<'e>(entity: &'e dyn Entity, name: &str) -> Option<&'e Field> {
    entity.field(name).filter(|field| !field.is_null())
}

fn describe(field: &Field) -> &'static str {
    match field {
        Field::Entity(_) => "entity",
        Field::List(_) => "list",
        Field::Value(Value::Null) => "null",
        Field::Value(Value::Bool(_)) => "boolean",
        Field::Value(Value::Number(_)) => "number",
        Field::Value(Value::String(_)) => "string",
        Field::Value(Value::Array(_)) => "array",
        Field::Value(Value::Object(_)) => "object",
    }
}
