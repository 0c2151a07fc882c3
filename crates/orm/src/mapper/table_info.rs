//! Resolved table metadata

use std::any::TypeId;
use std::fmt;

use crate::backends::{DatabaseValue, Escaper, Row, WireType};
use crate::error::{MappingError, OrmResult};
use crate::query::QueryValue;
use crate::schema::{Entity, EntityDescriptor, FieldInfo, FieldRef, FieldValues};
use crate::serializers::TypeSerializer;

/// Index of a table in the mapper arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId(pub(crate) usize);

impl TableId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A field bound to its serializer
#[derive(Debug, Clone)]
pub struct BoundField {
    pub field: FieldInfo,
    pub serializer: TypeSerializer,
}

impl BoundField {
    pub fn name(&self) -> &'static str {
        self.field.name
    }

    pub fn db_type(&self) -> &str {
        self.serializer.db_type()
    }

    pub fn wire_type(&self) -> WireType {
        self.serializer.wire_type()
    }

    /// Encode the field of an instance as a query parameter
    pub fn query_value<E: Entity>(&self, entity: &'static str, row: &E) -> OrmResult<QueryValue> {
        let value = match row.field(self.field.name) {
            Some(FieldRef::Null) => DatabaseValue::Null,
            Some(FieldRef::Value(v)) => self.serializer.encode(v)?,
            None => {
                return Err(MappingError::UnknownField {
                    entity,
                    field: self.field.name.to_string(),
                }
                .into())
            }
        };
        Ok(QueryValue::new(self.field.name, self.serializer.wire_type(), value))
    }

    /// Decode a raw value into the boxed field type
    pub fn decode(&self, entity: &'static str, raw: &DatabaseValue) -> OrmResult<Option<Box<dyn std::any::Any>>> {
        if raw.is_null() {
            if self.field.nullable {
                return Ok(None);
            }
            return Err(MappingError::UnexpectedNull {
                entity,
                field: self.field.name,
            }
            .into());
        }
        self.serializer.decode(raw).map(Some)
    }
}

/// Every field of an entity bound to a serializer, in declaration order
#[derive(Debug, Clone)]
pub struct EntityBinding {
    pub entity: EntityDescriptor,
    pub fields: Vec<BoundField>,
}

impl EntityBinding {
    pub fn name(&self) -> &'static str {
        self.entity.name
    }

    pub fn field(&self, name: &str) -> Option<&BoundField> {
        self.fields.iter().find(|f| f.field.name == name)
    }

    /// Read the fields of the entity from a row by column name
    pub fn decode<T: Entity>(&self, mut row: Row) -> OrmResult<T> {
        let entity = self.entity.name;
        let mut values = FieldValues::new(entity);
        for bound in &self.fields {
            let raw = row.take_by_name(bound.field.name).ok_or(MappingError::MissingColumn {
                entity,
                field: bound.field.name,
            })?;
            values.insert(bound.field.name, bound.decode(entity, &raw)?);
        }
        T::construct(values)
    }

    /// Encode every field of an instance
    pub fn query_values<E: Entity>(&self, row: &E) -> OrmResult<Vec<QueryValue>> {
        self.fields
            .iter()
            .map(|f| f.query_value(self.entity.name, row))
            .collect()
    }
}

/// Kind of a resolved column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Primary { auto_increment: bool },
    Foreign { target: TableId },
    Other,
}

/// Resolved column of a table
#[derive(Debug, Clone)]
pub struct Column {
    pub(crate) bound: BoundField,
    pub(crate) owner: TypeId,
    pub(crate) table: TableId,
    pub(crate) kind: ColumnKind,
    pub(crate) unique: bool,
    pub(crate) cascade_update: bool,
    pub(crate) cascade_delete: bool,
}

impl Column {
    pub fn name(&self) -> &'static str {
        self.bound.field.name
    }

    pub fn field(&self) -> &FieldInfo {
        &self.bound.field
    }

    pub fn serializer(&self) -> &TypeSerializer {
        &self.bound.serializer
    }

    pub fn db_type(&self) -> &str {
        self.bound.db_type()
    }

    pub fn kind(&self) -> ColumnKind {
        self.kind
    }

    pub fn table(&self) -> TableId {
        self.table
    }

    pub fn owner(&self) -> TypeId {
        self.owner
    }

    pub fn not_null(&self) -> bool {
        !self.bound.field.nullable
    }

    pub fn unique(&self) -> bool {
        self.unique
    }

    pub fn cascade_update(&self) -> bool {
        self.cascade_update
    }

    pub fn cascade_delete(&self) -> bool {
        self.cascade_delete
    }

    pub fn is_primary(&self) -> bool {
        matches!(self.kind, ColumnKind::Primary { .. })
    }

    /// Target table of a foreign column
    pub fn foreign_table(&self) -> Option<TableId> {
        match self.kind {
            ColumnKind::Foreign { target } => Some(target),
            _ => None,
        }
    }
}

/// Fully resolved table
#[derive(Debug, Clone)]
pub struct TableInfo {
    pub(crate) id: TableId,
    pub(crate) schema: String,
    pub(crate) escaper: Escaper,
    pub(crate) binding: EntityBinding,
    pub(crate) columns: Vec<Column>,
    pub(crate) primary_key: usize,
}

impl TableInfo {
    pub fn id(&self) -> TableId {
        self.id
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn name(&self) -> &'static str {
        self.binding.entity.name
    }

    pub fn type_id(&self) -> TypeId {
        self.binding.entity.type_id
    }

    pub fn entity(&self) -> &EntityDescriptor {
        &self.binding.entity
    }

    pub fn binding(&self) -> &EntityBinding {
        &self.binding
    }

    pub fn escaper(&self) -> Escaper {
        self.escaper
    }

    /// Escaped `schema.table` path
    pub fn path(&self) -> String {
        self.escaper.wrap_path(&[&self.schema, self.name()])
    }

    /// Escaped `schema.table.column` path
    pub fn column_path(&self, column: &str) -> String {
        self.escaper.wrap_path(&[&self.schema, self.name(), column])
    }

    /// All columns in field declaration order
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name() == name)
    }

    pub fn primary_key(&self) -> &Column {
        &self.columns[self.primary_key]
    }

    pub fn foreign_keys(&self) -> impl Iterator<Item = &Column> {
        self.columns
            .iter()
            .filter(|c| matches!(c.kind, ColumnKind::Foreign { .. }))
    }

    pub fn other_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.kind == ColumnKind::Other)
    }

    pub fn auto_increment(&self) -> bool {
        matches!(
            self.primary_key().kind,
            ColumnKind::Primary { auto_increment: true }
        )
    }

    /// Columns written by an insert, the auto-increment key is left to the database
    pub fn insert_columns(&self) -> impl Iterator<Item = &Column> {
        let skip_primary = self.auto_increment();
        self.columns
            .iter()
            .filter(move |c| !(skip_primary && c.is_primary()))
    }

    /// Columns written by an update
    pub fn update_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| !c.is_primary())
    }

    /// Whether the primary key of an instance is assigned
    pub fn primary_key_is_set<E: Entity>(&self, row: &E) -> OrmResult<bool> {
        match row.field(self.primary_key().name()) {
            Some(FieldRef::Null) => Ok(false),
            Some(FieldRef::Value(_)) => Ok(true),
            None => Err(MappingError::UnknownField {
                entity: self.name(),
                field: self.primary_key().name().to_string(),
            }
            .into()),
        }
    }

    /// Encode the primary key of an instance
    pub fn primary_key_value<E: Entity>(&self, row: &E) -> OrmResult<QueryValue> {
        self.primary_key().bound.query_value(self.name(), row)
    }

    /// Write a generated key back onto the instance
    pub fn set_primary_key<E: Entity>(&self, row: &mut E, raw: &DatabaseValue) -> OrmResult<()> {
        let pk = &self.primary_key().bound;
        let value = pk.decode(self.name(), raw)?;
        row.set_field(pk.field.name, value)
    }

    /// Forget the primary key of a deleted instance, only auto-increment keys can be cleared
    pub fn clear_primary_key<E: Entity>(&self, row: &mut E) -> OrmResult<()> {
        if self.auto_increment() {
            row.set_field(self.primary_key().name(), None)?;
        }
        Ok(())
    }
}
