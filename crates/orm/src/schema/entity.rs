//! Entity metadata generated by `#[derive(Entity)]`
//!
//! The derive macro writes the field list, a getter, a narrow setter for
//! fields marked `#[entity(mutable)]` and a constructor taking decoded
//! values. Everything else in the crate reads entities through this trait.

use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::marker::PhantomData;

use crate::error::{MappingError, OrmResult};

use super::table::ForeignKey;

/// Decoded value of one field, `None` is SQL NULL
pub type FieldValue = Option<Box<dyn Any>>;

/// A domain type mapped to a table, procedure, input or output
pub trait Entity: Sized + 'static {
    /// Name and ordered field list
    fn descriptor() -> EntityDescriptor;

    /// Borrow a field by name, `None` when no such field exists
    fn field(&self, name: &str) -> Option<FieldRef<'_>>;

    /// Overwrite a mutable field
    fn set_field(&mut self, name: &str, value: FieldValue) -> OrmResult<()>;

    /// Build an instance from decoded values
    fn construct(values: FieldValues) -> OrmResult<Self>;
}

/// Static description of an entity type
#[derive(Debug, Clone)]
pub struct EntityDescriptor {
    pub type_id: TypeId,
    pub name: &'static str,
    pub fields: Vec<FieldInfo>,
}

impl EntityDescriptor {
    pub fn new<E: 'static>(name: &'static str, fields: Vec<FieldInfo>) -> Self {
        Self {
            type_id: TypeId::of::<E>(),
            name,
            fields,
        }
    }

    pub fn of<E: Entity>() -> Self {
        E::descriptor()
    }

    pub fn field(&self, name: &str) -> Option<&FieldInfo> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// One field of an entity; for `Option<V>` fields the type is `V`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldInfo {
    pub name: &'static str,
    pub type_id: TypeId,
    pub type_name: &'static str,
    pub nullable: bool,
    pub mutable: bool,
}

impl FieldInfo {
    pub fn new<V: 'static>(name: &'static str, nullable: bool, mutable: bool) -> Self {
        Self {
            name,
            type_id: TypeId::of::<V>(),
            type_name: type_name::<V>(),
            nullable,
            mutable,
        }
    }

    /// Type name without its module path
    pub fn short_type_name(&self) -> &'static str {
        short_name(self.type_name)
    }
}

pub(crate) fn short_name(name: &'static str) -> &'static str {
    match name.find('<') {
        Some(_) => name,
        None => name.rsplit("::").next().unwrap_or(name),
    }
}

/// Borrowed view of a field value
#[derive(Clone, Copy)]
pub enum FieldRef<'a> {
    Null,
    Value(&'a dyn Any),
}

impl<'a> FieldRef<'a> {
    pub fn from_option<V: Any>(value: Option<&'a V>) -> Self {
        match value {
            Some(v) => FieldRef::Value(v),
            None => FieldRef::Null,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldRef::Null)
    }

    pub fn downcast<V: Any>(&self) -> Option<&'a V> {
        match self {
            FieldRef::Null => None,
            FieldRef::Value(v) => v.downcast_ref::<V>(),
        }
    }
}

impl fmt::Debug for FieldRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldRef::Null => write!(f, "Null"),
            FieldRef::Value(_) => write!(f, "Value(..)"),
        }
    }
}

/// Decoded field values handed to [`Entity::construct`]
pub struct FieldValues {
    entity: &'static str,
    values: Vec<(&'static str, FieldValue)>,
}

impl FieldValues {
    pub fn new(entity: &'static str) -> Self {
        Self {
            entity,
            values: Vec::new(),
        }
    }

    pub fn insert(&mut self, field: &'static str, value: FieldValue) {
        self.values.push((field, value));
    }

    /// Take a required field
    pub fn take<V: Any>(&mut self, field: &'static str) -> OrmResult<V> {
        let entity = self.entity;
        match self.remove(field)? {
            Some(value) => downcast(entity, field, value),
            None => Err(MappingError::UnexpectedNull { entity, field }.into()),
        }
    }

    /// Take an optional field
    pub fn take_optional<V: Any>(&mut self, field: &'static str) -> OrmResult<Option<V>> {
        let entity = self.entity;
        match self.remove(field)? {
            Some(value) => downcast(entity, field, value).map(Some),
            None => Ok(None),
        }
    }

    /// Convert a value given to a setter of a required field
    pub fn required<V: Any>(entity: &'static str, field: &'static str, value: FieldValue) -> OrmResult<V> {
        match value {
            Some(value) => downcast(entity, field, value),
            None => Err(MappingError::UnexpectedNull { entity, field }.into()),
        }
    }

    /// Convert a value given to a setter of an optional field
    pub fn optional<V: Any>(entity: &'static str, field: &'static str, value: FieldValue) -> OrmResult<Option<V>> {
        value.map(|v| downcast(entity, field, v)).transpose()
    }

    fn remove(&mut self, field: &'static str) -> OrmResult<FieldValue> {
        let index = self
            .values
            .iter()
            .position(|(name, _)| *name == field)
            .ok_or(MappingError::MissingColumn {
                entity: self.entity,
                field,
            })?;
        Ok(self.values.swap_remove(index).1)
    }
}

fn downcast<V: Any>(entity: &'static str, field: &'static str, value: Box<dyn Any>) -> OrmResult<V> {
    value.downcast::<V>().map(|v| *v).map_err(|_| {
        MappingError::FieldType {
            entity,
            field,
            expected: type_name::<V>(),
        }
        .into()
    })
}

/// Error returned by generated setters for fields without `#[entity(mutable)]`
pub fn immutable_field(entity: &'static str, field: &str) -> crate::error::OrmError {
    MappingError::ImmutableField {
        entity,
        field: field.to_string(),
    }
    .into()
}

/// Typed handle to a field of `E` holding values of `V`
pub struct Field<E, V> {
    name: &'static str,
    _marker: PhantomData<fn() -> (E, V)>,
}

impl<E, V> Field<E, V> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<E, V> Clone for Field<E, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E, V> Copy for Field<E, V> {}

impl<E, V> fmt::Debug for Field<E, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Field({}.{})", short_name(type_name::<E>()), self.name)
    }
}

impl<E: Entity, V: Any> Field<E, V> {
    /// Declare this field as a foreign key to the table of `T`
    pub fn references<T: Entity>(self) -> ForeignKey {
        ForeignKey {
            field: self.key(),
            target: TypeId::of::<T>(),
            target_name: short_name(type_name::<T>()),
        }
    }

    /// Read the field from an instance, `None` when NULL
    pub fn get<'a>(&self, row: &'a E) -> Option<&'a V> {
        row.field(self.name).and_then(|f| f.downcast::<V>())
    }

    pub(crate) fn key(&self) -> FieldKey {
        FieldKey {
            owner: TypeId::of::<E>(),
            owner_name: short_name(type_name::<E>()),
            name: self.name,
        }
    }
}

/// Type erased reference to a field of some entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldKey {
    pub owner: TypeId,
    pub owner_name: &'static str,
    pub name: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_values_take() {
        let mut values = FieldValues::new("Parent");
        values.insert("pk", Some(Box::new(3_i32)));
        values.insert("value", None);
        values.insert("name", Some(Box::new("x".to_string())));

        assert_eq!(values.take_optional::<i32>("pk").unwrap(), Some(3));
        assert_eq!(values.take_optional::<String>("value").unwrap(), None);
        assert!(values.take::<i64>("name").is_err());
        assert!(values.take::<String>("missing").is_err());
    }

    #[test]
    fn test_required_rejects_null() {
        let err = FieldValues::required::<i32>("Parent", "pk", None).unwrap_err();
        assert!(err.to_string().contains("NULL"));
        assert_eq!(FieldValues::optional::<i32>("Parent", "pk", Some(Box::new(5))).unwrap(), Some(5));
    }

    #[test]
    fn test_short_type_names() {
        assert_eq!(short_name("alloc::string::String"), "String");
        assert_eq!(short_name("i32"), "i32");
        let info = FieldInfo::new::<String>("value", false, false);
        assert_eq!(info.short_type_name(), "String");
    }
}
