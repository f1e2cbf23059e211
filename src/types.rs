//! Core type definitions for schema descriptors and resolved entity schemas

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::traits::{Discriminator, EntityFactory};

/// Default `type` of a completed schema
pub const DEFAULT_SCHEMA_TYPE: &str = "object";

/// Caller-authored schema document, loadable from `JSON` or `YAML`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SchemaDocument {
    /// Unique identifier of the schema
    pub id: String,

    /// Schema type, `object` when omitted
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Human-readable title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Description of the schema
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Property specs by field name
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub properties: IndexMap<String, PropertySpec>,

    /// Required field names, in declaration order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
}

impl SchemaDocument {
    /// Create an empty document with the given id
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Parse a document from `JSON` text
    ///
    /// # Errors
    ///
    /// Returns a parse error if the text is not a valid schema document.
    pub fn from_json_str(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Parse a document from `YAML` text
    ///
    /// # Errors
    ///
    /// Returns a parse error if the text is not a valid schema document.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Add a property spec
    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, spec: PropertySpec) -> Self {
        self.properties.insert(name.into(), spec);
        self
    }

    /// Set the required field names
    #[must_use]
    pub fn with_required<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required = names.into_iter().map(Into::into).collect();
        self
    }
}

/// Spec of a single property: primitive, reference, inline object or array
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PropertySpec {
    /// Target schema id of a cross-reference
    #[serde(
        rename = "$ref",
        alias = "ref",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub reference: Option<String>,

    /// Primitive type name (`string`, `number`, `object`, `array`, ...)
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Properties of an inline nested object
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub properties: IndexMap<String, PropertySpec>,

    /// Required names of an inline nested object
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,

    /// Element spec of an array
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<PropertySpec>>,

    /// Remaining keywords, handed to the constraint matcher as-is
    #[serde(flatten)]
    pub constraints: IndexMap<String, Value>,
}

/// How the builder and validator treat a property
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PropertyShape<'a> {
    /// Checked by the constraint matcher only
    Primitive,
    /// Cross-reference to another schema id
    Reference(&'a str),
    /// Nested object declared in place
    Inline,
    /// Array whose elements are references or inline objects
    Array(&'a PropertySpec),
}

impl PropertySpec {
    /// Primitive property of the given type
    #[must_use]
    pub fn primitive(kind: impl Into<String>) -> Self {
        Self {
            kind: Some(kind.into()),
            ..Self::default()
        }
    }

    /// Cross-reference to another schema
    #[must_use]
    pub fn reference(id: impl Into<String>) -> Self {
        Self {
            reference: Some(id.into()),
            ..Self::default()
        }
    }

    /// Array with the given element spec
    #[must_use]
    pub fn array_of(items: PropertySpec) -> Self {
        Self {
            kind: Some("array".to_string()),
            items: Some(Box::new(items)),
            ..Self::default()
        }
    }

    /// Add a primitive constraint keyword
    #[must_use]
    pub fn with_constraint(mut self, name: impl Into<String>, value: Value) -> Self {
        self.constraints.insert(name.into(), value);
        self
    }

    /// Classify this spec
    #[must_use]
    pub fn shape(&self) -> PropertyShape<'_> {
        if let Some(id) = &self.reference {
            return PropertyShape::Reference(id);
        }
        if !self.properties.is_empty() {
            return PropertyShape::Inline;
        }
        match &self.items {
            Some(items) if items.shape() != PropertyShape::Primitive => {
                PropertyShape::Array(items)
            }
            _ => PropertyShape::Primitive,
        }
    }

    /// Only the free-form constraint keywords, without `type` or `items`
    ///
    /// Used to check an array's own keywords (`minItems`, ...) while its
    /// elements are checked against their schema.
    #[must_use]
    pub fn constraints_only(&self) -> Self {
        Self {
            constraints: self.constraints.clone(),
            ..Self::default()
        }
    }

    /// True for references, inline objects and arrays of either
    #[must_use]
    pub fn is_structural(&self) -> bool {
        self.shape() != PropertyShape::Primitive
    }
}

/// Raw schema input: a document plus optional injected behavior
#[derive(Clone, Default)]
pub struct SchemaDescriptor {
    /// The declarative part
    pub schema: SchemaDocument,
    /// Entity factory for this schema
    pub ctor: Option<Arc<dyn EntityFactory>>,
    /// Runtime variant selection
    pub discriminator: Option<Arc<dyn Discriminator>>,
}

impl SchemaDescriptor {
    /// Wrap a document without a factory or discriminator
    #[must_use]
    pub fn new(schema: SchemaDocument) -> Self {
        Self {
            schema,
            ctor: None,
            discriminator: None,
        }
    }

    /// Attach an entity factory
    #[must_use]
    pub fn with_ctor(mut self, ctor: impl EntityFactory + 'static) -> Self {
        self.ctor = Some(Arc::new(ctor));
        self
    }

    /// Attach a discriminator
    #[must_use]
    pub fn with_discriminator(mut self, discriminator: impl Discriminator + 'static) -> Self {
        self.discriminator = Some(Arc::new(discriminator));
        self
    }

    /// Schema id
    #[must_use]
    pub fn id(&self) -> &str {
        &self.schema.id
    }
}

impl From<SchemaDocument> for SchemaDescriptor {
    fn from(schema: SchemaDocument) -> Self {
        Self::new(schema)
    }
}

impl fmt::Debug for SchemaDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaDescriptor")
            .field("schema", &self.schema)
            .field("ctor", &self.ctor.is_some())
            .field("discriminator", &self.discriminator.is_some())
            .finish()
    }
}

/// A base schema and the variants that extend it
#[derive(Debug, Clone)]
pub struct VirtualSchemaGroup {
    /// Variant descriptors, merged onto the base
    pub entity_schemas: Vec<SchemaDescriptor>,
    /// The shared base
    pub base_entity_schema: SchemaDescriptor,
}

impl VirtualSchemaGroup {
    /// Create a group
    #[must_use]
    pub fn new(base: SchemaDescriptor, variants: Vec<SchemaDescriptor>) -> Self {
        Self {
            entity_schemas: variants,
            base_entity_schema: base,
        }
    }
}

/// Resolved, normalized schema; immutable once built
#[derive(Clone)]
pub struct EntitySchema {
    /// Schema id
    pub id: String,
    /// Schema type, always set
    pub kind: String,
    /// Human-readable title
    pub title: Option<String>,
    /// Description of the schema
    pub description: Option<String>,
    /// Property specs; `$ref`s are resolved on use
    pub properties: IndexMap<String, PropertySpec>,
    /// Required names, ordered and duplicate-free
    pub required: IndexSet<String>,
    /// Entity factory
    pub ctor: Option<Arc<dyn EntityFactory>>,
    /// Runtime variant selection
    pub discriminator: Option<Arc<dyn Discriminator>>,
    /// Base schema id when this is a variant
    pub base: Option<String>,
}

impl EntitySchema {
    /// Property spec by name
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&PropertySpec> {
        self.properties.get(name)
    }

    /// Whether `name` is required
    #[must_use]
    pub fn is_required(&self, name: &str) -> bool {
        self.required.contains(name)
    }

    /// Whether this schema was merged onto a base
    #[must_use]
    pub fn is_variant(&self) -> bool {
        self.base.is_some()
    }

    /// Schema for an inline nested object declared under `name`
    #[must_use]
    pub fn inline(&self, name: &str, spec: &PropertySpec) -> Self {
        Self {
            id: format!("{}.{name}", self.id),
            kind: spec
                .kind
                .clone()
                .unwrap_or_else(|| DEFAULT_SCHEMA_TYPE.to_string()),
            title: None,
            description: None,
            properties: spec.properties.clone(),
            required: spec.required.iter().cloned().collect(),
            ctor: None,
            discriminator: None,
            base: None,
        }
    }

    /// Declarative view of this schema
    #[must_use]
    pub fn to_document(&self) -> SchemaDocument {
        SchemaDocument {
            id: self.id.clone(),
            kind: Some(self.kind.clone()),
            title: self.title.clone(),
            description: self.description.clone(),
            properties: self.properties.clone(),
            required: self.required.iter().cloned().collect(),
        }
    }

    /// Descriptor carrying this schema's document and injected behavior
    #[must_use]
    pub fn to_descriptor(&self) -> SchemaDescriptor {
        SchemaDescriptor {
            schema: self.to_document(),
            ctor: self.ctor.clone(),
            discriminator: self.discriminator.clone(),
        }
    }
}

impl fmt::Debug for EntitySchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntitySchema")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("properties", &self.properties.keys().collect::<Vec<_>>())
            .field("required", &self.required)
            .field("ctor", &self.ctor.is_some())
            .field("discriminator", &self.discriminator.is_some())
            .field("base", &self.base)
            .finish_non_exhaustive()
    }
}
