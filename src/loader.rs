//! Dynamic schema loaders
//!
//! [`DirectorySchemaLoader`] reads schema documents from disk on demand and
//! [`StaticSchemaLoader`] serves descriptors kept in memory.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

use crate::catalog::ResolutionContext;
use crate::error::{CeramicError, Result};
use crate::traits::DynamicSchemaLoader;
use crate::types::{PropertyShape, PropertySpec, SchemaDescriptor, SchemaDocument};

/// File extensions tried for each id, in order
const EXTENSIONS: [&str; 3] = ["json", "yaml", "yml"];

/// Loader for schema documents stored as `<id>.json`, `<id>.yaml` or
/// `<id>.yml` under one or more search paths
#[derive(Debug, Clone)]
pub struct DirectorySchemaLoader {
    /// Directories searched in order
    search_paths: Vec<PathBuf>,
    /// Resolve `$ref` targets while loading
    eager_references: bool,
}

impl DirectorySchemaLoader {
    /// Create a loader for a single directory
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_search_paths(vec![root.into()])
    }

    /// Create with specific search paths
    #[must_use]
    pub fn with_search_paths(search_paths: Vec<PathBuf>) -> Self {
        Self {
            search_paths,
            eager_references: false,
        }
    }

    /// Resolve every `$ref` of a loaded document before returning it
    ///
    /// Surfaces missing and circular references at load time instead of at
    /// construction time.
    #[must_use]
    pub fn with_eager_references(mut self, eager: bool) -> Self {
        self.eager_references = eager;
        self
    }

    /// Directories searched, in order
    #[must_use]
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    fn check_id(id: &str) -> Result<()> {
        if id.is_empty() || id.contains(['/', '\\']) || id.contains("..") {
            return Err(CeramicError::not_found(
                id,
                "id cannot be mapped to a schema file",
            ));
        }
        Ok(())
    }

    async fn find(&self, id: &str) -> Option<PathBuf> {
        for dir in &self.search_paths {
            for ext in EXTENSIONS {
                let candidate = dir.join(format!("{id}.{ext}"));
                if tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
                    return Some(candidate);
                }
            }
        }
        None
    }

    async fn read(path: &Path) -> Result<SchemaDocument> {
        let content = tokio::fs::read_to_string(path).await?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => SchemaDocument::from_json_str(&content),
            _ => SchemaDocument::from_yaml_str(&content),
        }
    }
}

#[async_trait]
impl DynamicSchemaLoader for DirectorySchemaLoader {
    async fn load(
        &self,
        id: &str,
        ctx: &ResolutionContext<'_>,
    ) -> Result<Option<SchemaDescriptor>> {
        Self::check_id(id)?;

        let Some(path) = self.find(id).await else {
            trace!("No schema file for '{id}'");
            return Ok(None);
        };

        debug!("Reading schema '{id}' from {}", path.display());
        let mut document = Self::read(&path).await?;
        if document.id.is_empty() {
            document.id = id.to_string();
        }

        if self.eager_references {
            for spec in document.properties.values() {
                if let Some(target) = reference_of(spec) {
                    ctx.resolve(target).await?;
                }
            }
        }

        Ok(Some(SchemaDescriptor::new(document)))
    }
}

fn reference_of(spec: &PropertySpec) -> Option<&str> {
    match spec.shape() {
        PropertyShape::Reference(id) => Some(id),
        PropertyShape::Array(items) => reference_of(items),
        PropertyShape::Primitive | PropertyShape::Inline => None,
    }
}

/// Loader serving descriptors from memory
#[derive(Debug, Default)]
pub struct StaticSchemaLoader {
    descriptors: HashMap<String, SchemaDescriptor>,
}

impl StaticSchemaLoader {
    /// Create an empty loader
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a descriptor, keyed by its id
    #[must_use]
    pub fn with(mut self, descriptor: SchemaDescriptor) -> Self {
        self.descriptors.insert(descriptor.id().to_string(), descriptor);
        self
    }

    /// Number of descriptors held
    #[must_use]
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Whether no descriptor is held
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

#[async_trait]
impl DynamicSchemaLoader for StaticSchemaLoader {
    async fn load(
        &self,
        id: &str,
        _ctx: &ResolutionContext<'_>,
    ) -> Result<Option<SchemaDescriptor>> {
        Ok(self.descriptors.get(id).cloned())
    }
}
