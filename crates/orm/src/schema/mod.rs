//! Schema Metadata Model
//!
//! Declarations supplied by the caller before any connection is opened.

pub mod entity;
pub mod table;

pub use entity::{
    immutable_field, Entity, EntityDescriptor, Field, FieldInfo, FieldKey, FieldRef, FieldValue, FieldValues,
};
pub use table::{ColumnSerializer, Constraint, FieldConstraints, ForeignKey, Procedure, Schema, Table};
