//! Error types for schema resolution and entity building

use thiserror::Error;

use crate::validator::ConstraintErrors;

/// Main error type for `Ceramic` operations
#[derive(Error, Debug)]
pub enum CeramicError {
    /// Reference id could not be resolved locally or through the dynamic loader
    #[error("Schema '{id}' not found: {reason}")]
    SchemaNotFound {
        /// Requested schema id
        id: String,
        /// Why resolution failed
        reason: String,
    },

    /// A reference cycle was detected while a schema was still being resolved
    #[error("Circular schema reference: {}", .path.join(" -> "))]
    CircularSchema {
        /// Ids on the in-flight path, ending with the repeated id
        path: Vec<String>,
    },

    /// Nested dynamic resolution went deeper than the configured limit
    #[error("Resolution of '{id}' exceeded maximum depth ({max_depth})")]
    ResolutionDepthExceeded {
        /// Id whose resolution hit the limit
        id: String,
        /// Configured limit
        max_depth: usize,
    },

    /// The discriminator could not pick a concrete schema for the data
    #[error("Discriminator for '{schema}' failed: {reason}")]
    DiscriminatorError {
        /// Base schema carrying the discriminator
        schema: String,
        /// Why no variant was selected
        reason: String,
    },

    /// Construction with validation enabled produced constraint errors
    #[error("Entity of schema '{schema}' failed validation:\n{errors}")]
    ValidationFailed {
        /// Schema the entity was validated against
        schema: String,
        /// Ordered constraint errors
        errors: ConstraintErrors,
    },

    /// A descriptor could not be completed into an entity schema
    #[error("Invalid schema '{id}': {reason}")]
    InvalidSchema {
        /// Offending schema id (may be empty)
        id: String,
        /// What is wrong with it
        reason: String,
    },

    /// Input data has a shape the builder cannot work with
    #[error("Invalid data for schema '{schema}': {reason}")]
    InvalidData {
        /// Schema the data was built against
        schema: String,
        /// What is wrong with the data
        reason: String,
    },

    /// Document parsing errors
    #[error("Failed to parse {format} document: {message}")]
    Parse {
        /// `JSON` or `YAML`
        format: &'static str,
        /// Parser message
        message: String,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for `Ceramic` operations
pub type Result<T> = std::result::Result<T, CeramicError>;

impl CeramicError {
    /// Create a schema-not-found error
    #[must_use]
    pub fn not_found(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SchemaNotFound {
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Create a circular reference error from the in-flight path
    #[must_use]
    pub fn circular(path: Vec<String>) -> Self {
        Self::CircularSchema { path }
    }

    /// Create a discriminator error
    #[must_use]
    pub fn discriminator(schema: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DiscriminatorError {
            schema: schema.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid schema error
    #[must_use]
    pub fn invalid_schema(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSchema {
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid data error
    #[must_use]
    pub fn invalid_data(schema: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidData {
            schema: schema.into(),
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Constraint errors carried by a failed validating build
    #[must_use]
    pub fn constraint_errors(&self) -> Option<&ConstraintErrors> {
        match self {
            Self::ValidationFailed { errors, .. } => Some(errors),
            _ => None,
        }
    }

    /// Whether the error was raised while resolving a schema id
    #[must_use]
    pub fn is_resolution_failure(&self) -> bool {
        matches!(
            self,
            Self::SchemaNotFound { .. }
                | Self::CircularSchema { .. }
                | Self::ResolutionDepthExceeded { .. }
        )
    }
}

impl From<serde_json::Error> for CeramicError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse {
            format: "JSON",
            message: err.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for CeramicError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Parse {
            format: "YAML",
            message: err.to_string(),
        }
    }
}
