//! Type serializers and their scoped lookup

use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::sync::Arc;

use crate::backends::{DatabaseValue, WireType};
use crate::error::{MappingError, OrmResult};

type Encoder = Arc<dyn Fn(&dyn Any) -> OrmResult<DatabaseValue> + Send + Sync>;
type Decoder = Arc<dyn Fn(&DatabaseValue) -> OrmResult<Box<dyn Any>> + Send + Sync>;

/// Encode/decode strategy of one Rust type
#[derive(Clone)]
pub struct TypeSerializer {
    type_id: TypeId,
    type_name: &'static str,
    db_type: String,
    wire_type: WireType,
    encoder: Encoder,
    decoder: Decoder,
}

impl TypeSerializer {
    /// Create a serializer for values of `T`
    ///
    /// `decode` returns `None` when the database value cannot represent a `T`.
    pub fn new<T, E, D>(db_type: impl Into<String>, wire_type: WireType, encode: E, decode: D) -> Self
    where
        T: Any,
        E: Fn(&T) -> DatabaseValue + Send + Sync + 'static,
        D: Fn(&DatabaseValue) -> Option<T> + Send + Sync + 'static,
    {
        let type_name = type_name::<T>();

        let encoder: Encoder = Arc::new(move |value: &dyn Any| match value.downcast_ref::<T>() {
            Some(v) => Ok(encode(v)),
            None => Err(MappingError::Encode { expected: type_name }.into()),
        });

        let decoder: Decoder = Arc::new(move |value: &DatabaseValue| match decode(value) {
            Some(v) => Ok(Box::new(v) as Box<dyn Any>),
            None => Err(MappingError::Decode {
                type_name,
                value: value.to_string(),
            }
            .into()),
        });

        Self {
            type_id: TypeId::of::<T>(),
            type_name,
            db_type: db_type.into(),
            wire_type,
            encoder,
            decoder,
        }
    }

    /// Like [`TypeSerializer::new`] for types whose values may not fit the column
    ///
    /// `encode` returns `None` for a value the database type cannot hold.
    pub fn try_new<T, E, D>(db_type: impl Into<String>, wire_type: WireType, encode: E, decode: D) -> Self
    where
        T: Any + fmt::Display,
        E: Fn(&T) -> Option<DatabaseValue> + Send + Sync + 'static,
        D: Fn(&DatabaseValue) -> Option<T> + Send + Sync + 'static,
    {
        let db_type = db_type.into();
        let column_type = db_type.clone();
        let mut serializer = Self::new::<T, _, _>(db_type, wire_type, |_| DatabaseValue::Null, decode);
        let type_name = serializer.type_name;
        serializer.encoder = Arc::new(move |value: &dyn Any| {
            let v = value
                .downcast_ref::<T>()
                .ok_or(MappingError::Encode { expected: type_name })?;
            encode(v).ok_or_else(|| {
                MappingError::OutOfRange {
                    type_name,
                    db_type: column_type.clone(),
                    value: v.to_string(),
                }
                .into()
            })
        });
        serializer
    }

    /// Same strategy under another column type, e.g. `VARCHAR(100)` instead of `TEXT`
    pub fn with_db_type(mut self, db_type: impl Into<String>) -> Self {
        self.db_type = db_type.into();
        self
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn db_type(&self) -> &str {
        &self.db_type
    }

    pub fn wire_type(&self) -> WireType {
        self.wire_type
    }

    pub fn encode(&self, value: &dyn Any) -> OrmResult<DatabaseValue> {
        (self.encoder)(value)
    }

    pub fn decode(&self, value: &DatabaseValue) -> OrmResult<Box<dyn Any>> {
        (self.decoder)(value)
    }
}

impl fmt::Debug for TypeSerializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeSerializer")
            .field("type_name", &self.type_name)
            .field("db_type", &self.db_type)
            .field("wire_type", &self.wire_type)
            .finish()
    }
}

/// Global serializers plus scoped lookup
#[derive(Debug, Clone, Default)]
pub struct SerializerRegistry {
    global: Vec<TypeSerializer>,
}

impl SerializerRegistry {
    pub fn new(serializers: impl IntoIterator<Item = TypeSerializer>) -> Self {
        Self {
            global: serializers.into_iter().collect(),
        }
    }

    pub fn register(&mut self, serializer: TypeSerializer) {
        self.global.push(serializer);
    }

    pub fn global(&self) -> &[TypeSerializer] {
        &self.global
    }

    /// Find the serializer of a type
    ///
    /// Scopes are searched in the given order (most specific first) before
    /// the global list; the first serializer of a matching type wins.
    pub fn resolve(&self, type_id: TypeId, scopes: &[&[TypeSerializer]]) -> Option<TypeSerializer> {
        scopes
            .iter()
            .flat_map(|scope| scope.iter())
            .chain(self.global.iter())
            .find(|s| s.type_id == type_id)
            .cloned()
    }
}
