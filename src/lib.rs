//! # Ceramic
//!
//! Schema-driven entity construction and validation.
//!
//! Schemas are registered in a [`SchemaCatalog`] (or loaded on demand through
//! a [`DynamicSchemaLoader`](traits::DynamicSchemaLoader)), completed into
//! normalized [`EntitySchema`](types::EntitySchema)s, and then used to turn
//! plain JSON data into typed entity graphs and to validate those graphs.
//!
//! ## Features
//!
//! - **Lazy references**: `$ref` targets are resolved on first use, so
//!   schemas may refer forward and to each other
//! - **Virtual schemas**: variants merged onto a shared base and selected at
//!   construction time by a discriminator
//! - **Update in place**: nested entities keep their identity on update
//! - **Deterministic validation**: errors come out in a fixed order with
//!   dotted property paths

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Entity construction and update
pub mod builder;

/// Id → schema catalog with lazy, memoized resolution
pub mod catalog;

/// Schema completion and variant merging
pub mod composition;

/// Configuration types
pub mod config;

/// Built-in discriminators
pub mod discriminator;

/// Entity model
pub mod entity;

/// Error types
pub mod error;

/// Dynamic schema loaders
pub mod loader;

/// High-level façade
pub mod service;

/// Trait seams for injected behavior
pub mod traits;

/// Schema types
pub mod types;

/// Entity validation
pub mod validator;

pub use builder::{BuildOptions, EntityBuilder};
pub use catalog::{ResolutionContext, SchemaCatalog};
pub use config::CeramicConfig;
pub use discriminator::FieldDiscriminator;
pub use entity::{Entity, Field, Record};
pub use error::{CeramicError, Result};
pub use loader::{DirectorySchemaLoader, StaticSchemaLoader};
pub use service::Ceramic;
pub use validator::{BasicConstraintMatcher, ConstraintError, ConstraintErrors, Validator};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::builder::BuildOptions;
    pub use crate::config::CeramicConfig;
    pub use crate::entity::{Entity, Field, Record};
    pub use crate::error::{CeramicError, Result};
    pub use crate::service::Ceramic;
    pub use crate::traits::*;
    pub use crate::types::*;
    pub use crate::validator::{ConstraintError, ConstraintErrors};
}

#[doc(hidden)]
pub mod __private {
    pub use serde_json::{Map, Value};
}
