//! Constraint error structures

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;

/// Constraint name reported for a missing required field
pub const REQUIRED: &str = "required";

/// Constraint name reported for a value of the wrong shape
pub const TYPE: &str = "type";

/// Constraint name reported when no variant matches the data
pub const DISCRIMINATOR: &str = "discriminator";

/// A single reason an entity failed validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintError {
    /// Violated constraint (`required`, `type`, `minimum`, ...)
    pub constraint_name: String,
    /// Path of the offending property (`author.name`, `tracks[1]`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property: Option<String>,
    /// Human-readable message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ConstraintError {
    /// Create an error for `property`
    pub fn new(constraint_name: impl Into<String>, property: impl Into<String>) -> Self {
        Self {
            constraint_name: constraint_name.into(),
            property: Some(property.into()),
            message: None,
        }
    }

    /// Error about the entity as a whole, before any path is attached
    pub fn for_entity(constraint_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            constraint_name: constraint_name.into(),
            property: None,
            message: Some(message.into()),
        }
    }

    /// Missing required field
    pub fn required(property: impl Into<String>) -> Self {
        let property = property.into();
        let message = format!("'{property}' is required");
        Self::new(REQUIRED, property).with_message(message)
    }

    /// Set the message
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Prefix the property path with `parent`
    #[must_use]
    pub fn nested_under(mut self, parent: &str) -> Self {
        self.property = Some(match self.property.take() {
            Some(child) if child.starts_with('[') => format!("{parent}{child}"),
            Some(child) => format!("{parent}.{child}"),
            None => parent.to_string(),
        });
        self
    }
}

impl fmt::Display for ConstraintError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.constraint_name)?;
        if let Some(property) = &self.property {
            write!(f, " {property}")?;
        }
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        Ok(())
    }
}

/// Non-empty, ordered list of constraint errors
///
/// Validation returns `Option<ConstraintErrors>`: `None` is the "no errors"
/// outcome, so an empty list is never observable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<ConstraintError>", into = "Vec<ConstraintError>")]
pub struct ConstraintErrors(Vec<ConstraintError>);

impl TryFrom<Vec<ConstraintError>> for ConstraintErrors {
    type Error = &'static str;

    fn try_from(errors: Vec<ConstraintError>) -> Result<Self, Self::Error> {
        Self::from_vec(errors).ok_or("constraint error list must not be empty")
    }
}

impl From<ConstraintErrors> for Vec<ConstraintError> {
    fn from(errors: ConstraintErrors) -> Self {
        errors.0
    }
}

impl ConstraintErrors {
    /// Wrap `errors`, or `None` if there are none
    #[must_use]
    pub fn from_vec(errors: Vec<ConstraintError>) -> Option<Self> {
        (!errors.is_empty()).then_some(Self(errors))
    }

    /// Consumes self and returns the inner Vec
    #[must_use]
    pub fn into_inner(self) -> Vec<ConstraintError> {
        self.0
    }

    /// Whether any error has the given constraint name
    #[must_use]
    pub fn has_constraint(&self, constraint_name: &str) -> bool {
        self.0.iter().any(|e| e.constraint_name == constraint_name)
    }

    /// First error for the given property path
    #[must_use]
    pub fn for_property(&self, property: &str) -> Option<&ConstraintError> {
        self.0
            .iter()
            .find(|e| e.property.as_deref() == Some(property))
    }
}

impl Deref for ConstraintErrors {
    type Target = [ConstraintError];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl IntoIterator for ConstraintErrors {
    type Item = ConstraintError;
    type IntoIter = std::vec::IntoIter<ConstraintError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ConstraintErrors {
    type Item = &'a ConstraintError;
    type IntoIter = std::slice::Iter<'a, ConstraintError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for ConstraintErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "  {error}")?;
        }
        Ok(())
    }
}
