//! # tabula-orm-derive
//!
//! Derive macro for the tabula-orm `Entity` trait.
//!
//! - `#[derive(Entity)]`: field list, getter, narrow setter and constructor
//! - `#[entity(mutable)]` on a field: allow the ORM to overwrite it, used for
//!   auto-increment primary keys written back after an insert

use proc_macro::TokenStream;

mod entity;

/// Implement `tabula_orm::schema::Entity` for a struct with named fields
///
/// Also adds one `Field` constant per field, named after the field in upper
/// case, for use in schema declarations and hand-written queries.
#[proc_macro_derive(Entity, attributes(entity))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    entity::derive_entity_impl(input)
}
