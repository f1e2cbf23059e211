//! Schema catalog: the id → resolved-schema map of one resolution session
//!
//! The catalog is append-only. Schemas registered through [`SchemaCatalog::init`]
//! are completed eagerly; anything else is fetched through the configured
//! [`DynamicSchemaLoader`] on first use and memoized. References inside a
//! schema are never followed at registration time, which lets schemas point
//! forward or at each other.

use dashmap::DashMap;
use futures::future::BoxFuture;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, trace, warn};

use crate::composition::{complete_entity_schema, complete_virtual_entity_schema};
use crate::config::CatalogConfig;
use crate::error::{CeramicError, Result};
use crate::traits::{DynamicSchemaLoader, EntityFactory};
use crate::types::{EntitySchema, PropertyShape, PropertySpec, SchemaDescriptor, VirtualSchemaGroup};

type PendingLoad = Arc<OnceCell<Arc<EntitySchema>>>;

/// Id → schema map with lazy resolution and cycle detection
pub struct SchemaCatalog {
    /// Bound schemas; an id is never rebound
    schemas: DashMap<String, Arc<EntitySchema>>,
    /// Base id → variant ids, in registration order
    variants: DashMap<String, Vec<String>>,
    /// Entity factories registered by schema id
    factories: DashMap<String, Arc<dyn EntityFactory>>,
    /// Loads currently in flight, shared by concurrent top-level requesters
    pending: DashMap<String, PendingLoad>,
    loader: Option<Arc<dyn DynamicSchemaLoader>>,
    config: CatalogConfig,
}

/// State of one top-level resolution, handed to the dynamic loader
///
/// Carries the ids currently being resolved so re-entering one of them is
/// reported as [`CeramicError::CircularSchema`].
pub struct ResolutionContext<'a> {
    catalog: &'a SchemaCatalog,
    path: Vec<String>,
}

impl<'a> ResolutionContext<'a> {
    fn root(catalog: &'a SchemaCatalog) -> Self {
        Self {
            catalog,
            path: Vec::new(),
        }
    }

    fn enter(&self, id: &str) -> Self {
        let mut path = self.path.clone();
        path.push(id.to_string());
        Self {
            catalog: self.catalog,
            path,
        }
    }

    /// Ids being resolved, outermost first
    #[must_use]
    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// Number of resolutions in flight on this path
    #[must_use]
    pub fn depth(&self) -> usize {
        self.path.len()
    }

    /// Whether `id` is already being resolved on this path
    #[must_use]
    pub fn is_resolving(&self, id: &str) -> bool {
        self.path.iter().any(|p| p == id)
    }

    /// The catalog being resolved against
    #[must_use]
    pub fn catalog(&self) -> &'a SchemaCatalog {
        self.catalog
    }

    /// Resolve a dependency of the schema being loaded
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`SchemaCatalog::resolve_ref`], including
    /// [`CeramicError::CircularSchema`] when `id` is already on the path.
    pub fn resolve<'b>(&'b self, id: &'b str) -> BoxFuture<'b, Result<Arc<EntitySchema>>> {
        Box::pin(self.catalog.resolve_in(id, self))
    }
}

impl Default for SchemaCatalog {
    fn default() -> Self {
        Self::new(CatalogConfig::default())
    }
}

impl SchemaCatalog {
    /// Create an empty catalog without a dynamic loader
    #[must_use]
    pub fn new(config: CatalogConfig) -> Self {
        Self {
            schemas: DashMap::new(),
            variants: DashMap::new(),
            factories: DashMap::new(),
            pending: DashMap::new(),
            loader: None,
            config,
        }
    }

    /// Create an empty catalog that falls back to `loader` on misses
    #[must_use]
    pub fn with_loader(config: CatalogConfig, loader: Arc<dyn DynamicSchemaLoader>) -> Self {
        Self {
            loader: Some(loader),
            ..Self::new(config)
        }
    }

    /// Catalog configuration
    #[must_use]
    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    /// Register descriptors and variant groups
    ///
    /// Each descriptor is completed and bound under its id. Each variant of a
    /// group is merged onto the group's base and bound; the base is bound too
    /// if it is not yet, and the base → variant association is recorded for
    /// discriminators. Ids that are already bound keep their first schema.
    ///
    /// # Errors
    ///
    /// Returns [`CeramicError::InvalidSchema`] if a descriptor cannot be
    /// completed. Schemas bound before the failure stay bound.
    pub fn init<D, G>(&self, descriptors: D, virtual_groups: G) -> Result<&Self>
    where
        D: IntoIterator<Item = SchemaDescriptor>,
        G: IntoIterator<Item = VirtualSchemaGroup>,
    {
        for descriptor in descriptors {
            let schema = complete_entity_schema(&descriptor)?;
            self.bind(&descriptor.schema.id, Arc::new(schema));
        }

        for group in virtual_groups {
            let base = &group.base_entity_schema;
            if !self.contains(base.id()) {
                self.bind(base.id(), Arc::new(complete_entity_schema(base)?));
            }

            for variant in &group.entity_schemas {
                let schema = complete_virtual_entity_schema(variant, base)?;
                self.bind(variant.id(), Arc::new(schema));

                let mut ids = self.variants.entry(base.id().to_string()).or_default();
                if !ids.iter().any(|id| id == variant.id()) {
                    ids.push(variant.id().to_string());
                }
            }
            debug!(
                "Registered virtual group '{}' with {} variants",
                base.id(),
                group.entity_schemas.len()
            );
        }

        debug!("Schema catalog initialized with {} schemas", self.len());
        Ok(self)
    }

    /// Bind `schema` under `id` unless the id is already bound
    ///
    /// Returns the schema bound under `id` afterwards.
    pub fn bind(&self, id: &str, schema: Arc<EntitySchema>) -> Arc<EntitySchema> {
        let entry = self.schemas.entry(id.to_string()).or_insert_with(|| {
            trace!("Bound schema '{id}'");
            Arc::clone(&schema)
        });
        if !Arc::ptr_eq(entry.value(), &schema) {
            warn!("Schema '{id}' is already bound; keeping the first definition");
        }
        Arc::clone(entry.value())
    }

    /// Schema bound under `id`, without loading
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<EntitySchema>> {
        self.schemas.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Whether `id` is bound
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.schemas.contains_key(id)
    }

    /// Number of bound schemas
    #[must_use]
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    /// Whether no schema is bound
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Bound ids, sorted
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.schemas.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Variant ids registered for `base_id`, in registration order
    #[must_use]
    pub fn variants_of(&self, base_id: &str) -> Vec<String> {
        self.variants
            .get(base_id)
            .map(|ids| ids.value().clone())
            .unwrap_or_default()
    }

    /// Whether `variant_id` was registered as a variant of `base_id`
    #[must_use]
    pub fn is_variant_of(&self, variant_id: &str, base_id: &str) -> bool {
        self.variants
            .get(base_id)
            .is_some_and(|ids| ids.iter().any(|id| id == variant_id))
    }

    /// Register the factory used for `id` when its schema carries no ctor
    pub fn register_factory(&self, id: impl Into<String>, factory: impl EntityFactory + 'static) {
        self.factories.insert(id.into(), Arc::new(factory));
    }

    /// Factory for a schema: its own ctor, else the one registered for its id
    #[must_use]
    pub fn factory_for(&self, schema: &EntitySchema) -> Option<Arc<dyn EntityFactory>> {
        schema.ctor.clone().or_else(|| {
            self.factories
                .get(&schema.id)
                .map(|entry| Arc::clone(entry.value()))
        })
    }

    /// Resolve `id`, loading it dynamically on a miss
    ///
    /// A hit returns the bound schema. A miss asks the dynamic loader; the
    /// completed result is memoized under `id`. Failures are not memoized.
    ///
    /// # Errors
    ///
    /// - [`CeramicError::SchemaNotFound`] if no loader is configured, the
    ///   loader does not know `id`, or the loader fails
    /// - [`CeramicError::CircularSchema`] if loading `id` re-enters `id`
    /// - [`CeramicError::ResolutionDepthExceeded`] past the configured depth
    pub async fn resolve_ref(&self, id: &str) -> Result<Arc<EntitySchema>> {
        self.resolve_in(id, &ResolutionContext::root(self)).await
    }

    /// Schema that values of property `name` of `owner` are built with
    ///
    /// References resolve through the catalog, inline objects get an
    /// unregistered schema of their own, and arrays (at any nesting depth)
    /// use their innermost element spec. Primitive properties yield `None`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`SchemaCatalog::resolve_ref`].
    pub async fn resolve_property(
        &self,
        owner: &EntitySchema,
        name: &str,
        spec: &PropertySpec,
    ) -> Result<Option<Arc<EntitySchema>>> {
        let mut spec = spec;
        while let PropertyShape::Array(items) = spec.shape() {
            spec = items;
        }
        match spec.shape() {
            PropertyShape::Reference(id) => Ok(Some(self.resolve_ref(id).await?)),
            PropertyShape::Inline => Ok(Some(Arc::new(owner.inline(name, spec)))),
            PropertyShape::Primitive | PropertyShape::Array(_) => Ok(None),
        }
    }

    async fn resolve_in(&self, id: &str, ctx: &ResolutionContext<'_>) -> Result<Arc<EntitySchema>> {
        if let Some(schema) = self.get(id) {
            return Ok(schema);
        }

        if ctx.is_resolving(id) {
            let mut path = ctx.path().to_vec();
            path.push(id.to_string());
            return Err(CeramicError::circular(path));
        }

        // Top-level loads are never limited, only loads nested inside a loader.
        if ctx.depth() > 0 && ctx.depth() >= self.config.max_resolution_depth {
            return Err(CeramicError::ResolutionDepthExceeded {
                id: id.to_string(),
                max_depth: self.config.max_resolution_depth,
            });
        }

        let loader = match &self.loader {
            Some(loader) if self.config.dynamic_loading => loader,
            _ => {
                return Err(CeramicError::not_found(
                    id,
                    "not registered and no dynamic loader is configured",
                ));
            }
        };

        let child = ctx.enter(id);

        // Loads nested inside a loader run directly: waiting here on another
        // requester's load could deadlock on a cross-loader cycle.
        if ctx.depth() > 0 {
            return self.load(loader.as_ref(), id, &child).await;
        }

        let cell: PendingLoad = Arc::clone(self.pending.entry(id.to_string()).or_default().value());
        let result = cell
            .get_or_try_init(|| self.load(loader.as_ref(), id, &child))
            .await
            .map(Arc::clone);
        self.pending.remove_if(id, |_, pending| Arc::ptr_eq(pending, &cell));
        result
    }

    async fn load(
        &self,
        loader: &dyn DynamicSchemaLoader,
        id: &str,
        ctx: &ResolutionContext<'_>,
    ) -> Result<Arc<EntitySchema>> {
        if let Some(schema) = self.get(id) {
            return Ok(schema);
        }

        debug!("Loading schema '{id}' dynamically");
        let descriptor = match loader.load(id, ctx).await {
            Ok(Some(descriptor)) => descriptor,
            Ok(None) => {
                return Err(CeramicError::not_found(id, "unknown to the dynamic loader"));
            }
            Err(err) if err.is_resolution_failure() => return Err(err),
            Err(err) => {
                warn!("Dynamic loader failed for '{id}': {err}");
                return Err(CeramicError::not_found(id, err.to_string()));
            }
        };

        if descriptor.id() != id {
            warn!(
                "Dynamic loader returned schema '{}' for '{id}'; binding it under '{id}'",
                descriptor.id()
            );
        }

        let mut schema = complete_entity_schema(&descriptor)?;
        schema.id = id.to_string();
        Ok(self.bind(id, Arc::new(schema)))
    }
}

impl std::fmt::Debug for SchemaCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaCatalog")
            .field("schemas", &self.ids())
            .field("loader", &self.loader.is_some())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
