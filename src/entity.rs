//! Entity model: the instances built from schemas
//!
//! An [`Entity`] is any type that exposes named [`Field`]s. Domain types are
//! usually declared with [`entity_type!`](crate::entity_type); data without a
//! registered factory becomes a [`Record`].

use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::any::Any;
use std::fmt;

/// A field value on an entity
#[derive(Debug)]
pub enum Field {
    /// Plain data, as supplied by the caller
    Value(Value),
    /// A constructed nested entity
    Entity(Box<dyn Entity>),
    /// Constructed elements of an array-of-reference property
    List(Vec<Field>),
}

impl Field {
    /// Whether the field counts as absent (`null`)
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Value(Value::Null))
    }

    /// Plain value, if this field holds one
    #[must_use]
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(value) => Some(value),
            _ => None,
        }
    }

    /// Nested entity, if this field holds one
    #[must_use]
    pub fn as_entity(&self) -> Option<&(dyn Entity + 'static)> {
        match self {
            Self::Entity(entity) => Some(entity.as_ref()),
            _ => None,
        }
    }

    /// Mutable nested entity, if this field holds one
    pub fn as_entity_mut(&mut self) -> Option<&mut (dyn Entity + 'static)> {
        match self {
            Self::Entity(entity) => Some(entity.as_mut()),
            _ => None,
        }
    }

    /// Elements, if this field is a list
    #[must_use]
    pub fn as_list(&self) -> Option<&[Field]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Downcast a nested entity to its concrete type
    #[must_use]
    pub fn downcast_ref<T: Entity>(&self) -> Option<&T> {
        self.as_entity().and_then(<dyn Entity>::downcast_ref)
    }

    /// Plain-data view, recursing into nested entities
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Value(value) => value.clone(),
            Self::Entity(entity) => entity.to_value(),
            Self::List(items) => Value::Array(items.iter().map(Self::to_value).collect()),
        }
    }
}

impl From<Value> for Field {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<Box<dyn Entity>> for Field {
    fn from(entity: Box<dyn Entity>) -> Self {
        Self::Entity(entity)
    }
}

/// An instance built from a schema
pub trait Entity: Any + Send + Sync + fmt::Debug {
    /// Field by name
    fn field(&self, name: &str) -> Option<&Field>;

    /// Mutable field by name
    fn field_mut(&mut self, name: &str) -> Option<&mut Field>;

    /// Assign a field, replacing any previous value
    fn set_field(&mut self, name: &str, value: Field);

    /// Names of all fields currently set
    fn field_names(&self) -> Vec<String>;

    /// Upcast for downcasting
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast for downcasting
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Plain-data view of the entity
    fn to_value(&self) -> Value {
        let mut map = Map::new();
        for name in self.field_names() {
            if let Some(field) = self.field(&name) {
                map.insert(name, field.to_value());
            }
        }
        Value::Object(map)
    }
}

impl<'a> dyn Entity + 'a {
    /// Whether the entity is a `T`
    #[must_use]
    pub fn is<T: Entity>(&self) -> bool {
        self.as_any().is::<T>()
    }

    /// Downcast to a concrete entity type
    #[must_use]
    pub fn downcast_ref<T: Entity>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Mutable downcast to a concrete entity type
    pub fn downcast_mut<T: Entity>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }

    /// Plain value of a field, if set and not an entity
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.field(name).and_then(Field::as_value)
    }

    /// Whether a field is set to something other than `null`
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.field(name).is_some_and(|field| !field.is_null())
    }
}

/// Address of an entity, stable while it stays behind the same box
pub(crate) fn address(entity: &dyn Entity) -> usize {
    std::ptr::from_ref(entity).cast::<()>().addr()
}

/// Ordered field storage used by [`Record`] and by `entity_type!` types
#[derive(Debug, Default)]
pub struct Record {
    fields: IndexMap<String, Field>,
}

impl Record {
    /// Create an empty record
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Shallow copy of the top-level fields of `data`
    #[must_use]
    pub fn from_map(data: &Map<String, Value>) -> Self {
        Self {
            fields: data
                .iter()
                .map(|(name, value)| (name.clone(), Field::Value(value.clone())))
                .collect(),
        }
    }

    /// Number of fields
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether no field is set
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Field by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    /// Mutable field by name
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Field> {
        self.fields.get_mut(name)
    }

    /// Assign a field
    pub fn insert(&mut self, name: impl Into<String>, value: Field) {
        self.fields.insert(name.into(), value);
    }

    /// Field names in insertion order
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.fields.keys().cloned().collect()
    }
}

impl Entity for Record {
    fn field(&self, name: &str) -> Option<&Field> {
        self.get(name)
    }

    fn field_mut(&mut self, name: &str) -> Option<&mut Field> {
        self.get_mut(name)
    }

    fn set_field(&mut self, name: &str, value: Field) {
        self.insert(name, value);
    }

    fn field_names(&self) -> Vec<String> {
        self.names()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Declare a named entity type backed by a [`Record`]
///
/// The generated type has `new()`, `from_map(&Map)`, a `factory()` usable as a
/// descriptor ctor, and an [`Entity`] implementation.
///
/// ```
/// ceramic::entity_type!(Author);
///
/// let mut data = serde_json::Map::new();
/// data.insert("name".into(), "Middle Class Rut".into());
/// let author = Author::from_map(&data);
/// assert!(author.record().get("name").is_some());
/// ```
#[macro_export]
macro_rules! entity_type {
    ($(#[$meta:meta])* $vis:vis $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Default)]
        $vis struct $name {
            record: $crate::Record,
        }

        impl $name {
            /// Create an entity with no fields
            #[must_use]
            pub fn new() -> Self {
                Self::default()
            }

            /// Shallow copy of the top-level fields of `data`
            #[must_use]
            pub fn from_map(
                data: &$crate::__private::Map<String, $crate::__private::Value>,
            ) -> Self {
                Self {
                    record: $crate::Record::from_map(data),
                }
            }

            /// Entity factory producing this type
            #[must_use]
            pub fn factory() -> impl Fn(
                &$crate::__private::Map<String, $crate::__private::Value>,
            ) -> Box<dyn $crate::Entity>
            + Send
            + Sync
            + 'static {
                |data: &$crate::__private::Map<String, $crate::__private::Value>|
                 -> Box<dyn $crate::Entity> { Box::new(Self::from_map(data)) }
            }

            /// Underlying field storage
            #[must_use]
            pub fn record(&self) -> &$crate::Record {
                &self.record
            }
        }

        impl $crate::Entity for $name {
            fn field(&self, name: &str) -> Option<&$crate::Field> {
                self.record.get(name)
            }

            fn field_mut(&mut self, name: &str) -> Option<&mut $crate::Field> {
                self.record.get_mut(name)
            }

            fn set_field(&mut self, name: &str, value: $crate::Field) {
                self.record.insert(name, value);
            }

            fn field_names(&self) -> Vec<String> {
                self.record.names()
            }

            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }

            fn as_any_mut(&mut self) -> &mut dyn ::std::any::Any {
                self
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    crate::entity_type!(Song);

    #[test]
    fn test_record_shallow_copy_keeps_order() {
        let data = json!({"b": 1, "a": {"nested": true}});
        let record = Record::from_map(data.as_object().expect("object"));
        assert_eq!(record.names(), vec!["b".to_string(), "a".to_string()]);
        assert_eq!(record.to_value(), data);
    }

    #[test]
    fn test_downcast_and_nested_value() {
        let mut song: Box<dyn Entity> = Box::new(Song::new());
        song.set_field("title", Field::Value(json!("Busy Being Born")));
        let mut torrent = Record::new();
        torrent.insert("seeds", Field::Value(json!(1000)));
        song.set_field("torrent", Field::Entity(Box::new(torrent)));

        assert!(song.is::<Song>());
        assert!(!song.is::<Record>());
        assert!(song.field("torrent").and_then(Field::downcast_ref::<Record>).is_some());
        assert_eq!(
            song.to_value(),
            json!({"title": "Busy Being Born", "torrent": {"seeds": 1000}})
        );
    }

    #[test]
    fn test_null_counts_as_absent() {
        let mut record = Record::new();
        record.insert("x", Field::Value(Value::Null));
        let entity: &dyn Entity = &record;
        assert!(!entity.has("x"));
        assert!(!entity.has("y"));
    }
}
