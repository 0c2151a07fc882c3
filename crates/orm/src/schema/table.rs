//! Table, schema and procedure declarations

use std::any::{Any, TypeId};
use std::fmt;

use crate::serializers::TypeSerializer;

use super::entity::{Entity, EntityDescriptor, Field, FieldKey};

/// Column constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Constraint {
    AutoIncrement,
    Unique,
    CascadeUpdate,
    CascadeDelete,
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Constraint::AutoIncrement => "AUTO_INCREMENT",
            Constraint::Unique => "UNIQUE",
            Constraint::CascadeUpdate => "CASCADE_UPDATE",
            Constraint::CascadeDelete => "CASCADE_DELETE",
        };
        f.write_str(name)
    }
}

/// Foreign key from a field to the table of another entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForeignKey {
    pub field: FieldKey,
    pub target: TypeId,
    pub target_name: &'static str,
}

/// Constraints declared on one field
#[derive(Debug, Clone)]
pub struct FieldConstraints {
    pub field: FieldKey,
    pub constraints: Vec<Constraint>,
}

/// Serializer override for one field
#[derive(Debug, Clone)]
pub struct ColumnSerializer {
    pub field: FieldKey,
    pub serializer: TypeSerializer,
}

/// Table declaration: an entity and its primary key
#[derive(Debug, Clone)]
pub struct Table {
    pub(crate) entity: EntityDescriptor,
    pub(crate) primary_key: FieldKey,
    pub(crate) foreign_keys: Vec<ForeignKey>,
    pub(crate) constraints: Vec<FieldConstraints>,
    pub(crate) serializers: Vec<TypeSerializer>,
    pub(crate) column_serializers: Vec<ColumnSerializer>,
}

impl Table {
    /// Declare the table of `T` keyed by the given field
    pub fn new<T: Entity, V: Any>(primary_key: Field<T, V>) -> Self {
        Self {
            entity: T::descriptor(),
            primary_key: primary_key.key(),
            foreign_keys: Vec::new(),
            constraints: Vec::new(),
            serializers: Vec::new(),
            column_serializers: Vec::new(),
        }
    }

    pub fn foreign_key(mut self, foreign_key: ForeignKey) -> Self {
        self.foreign_keys.push(foreign_key);
        self
    }

    pub fn constraint<E: Entity, V: Any>(mut self, field: Field<E, V>, constraints: &[Constraint]) -> Self {
        self.constraints.push(FieldConstraints {
            field: field.key(),
            constraints: constraints.to_vec(),
        });
        self
    }

    /// Serializer used by every column of this table
    pub fn serializer(mut self, serializer: TypeSerializer) -> Self {
        self.serializers.push(serializer);
        self
    }

    /// Serializer used by one column only
    pub fn column_serializer<E: Entity, V: Any>(mut self, field: Field<E, V>, serializer: TypeSerializer) -> Self {
        self.column_serializers.push(ColumnSerializer {
            field: field.key(),
            serializer,
        });
        self
    }

    pub fn name(&self) -> &'static str {
        self.entity.name
    }

    pub fn type_id(&self) -> TypeId {
        self.entity.type_id
    }

    /// Constraints declared on a field, in declaration order
    pub(crate) fn constraints_of<'a>(&'a self, field: &'a str) -> impl Iterator<Item = Constraint> + 'a {
        self.constraints
            .iter()
            .filter(move |c| c.field.owner == self.entity.type_id && c.field.name == field)
            .flat_map(|c| c.constraints.iter().copied())
    }
}

/// Stored procedure declaration, arguments are the entity fields
#[derive(Debug, Clone)]
pub struct Procedure {
    pub(crate) entity: EntityDescriptor,
    pub(crate) serializers: Vec<TypeSerializer>,
}

impl Procedure {
    pub fn new<P: Entity>() -> Self {
        Self {
            entity: P::descriptor(),
            serializers: Vec::new(),
        }
    }

    pub fn serializer(mut self, serializer: TypeSerializer) -> Self {
        self.serializers.push(serializer);
        self
    }

    pub fn name(&self) -> &'static str {
        self.entity.name
    }
}

/// Named group of tables and procedures
#[derive(Debug, Clone)]
pub struct Schema {
    pub(crate) name: String,
    pub(crate) tables: Vec<Table>,
    pub(crate) procedures: Vec<Procedure>,
    pub(crate) serializers: Vec<TypeSerializer>,
}

impl Schema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: Vec::new(),
            procedures: Vec::new(),
            serializers: Vec::new(),
        }
    }

    pub fn table(mut self, table: Table) -> Self {
        self.tables.push(table);
        self
    }

    pub fn procedure(mut self, procedure: Procedure) -> Self {
        self.procedures.push(procedure);
        self
    }

    /// Serializer used by every table of this schema
    pub fn serializer(mut self, serializer: TypeSerializer) -> Self {
        self.serializers.push(serializer);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tables(&self) -> &[Table] {
        &self.tables
    }
}
