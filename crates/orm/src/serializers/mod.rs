//! Type Serializer Registry
//!
//! Maps Rust value types to a database column type, a wire type and a pair
//! of encode/decode functions. Lookup priority is column > table > schema >
//! global.

pub mod basic;
pub mod registry;

pub use registry::{SerializerRegistry, TypeSerializer};
