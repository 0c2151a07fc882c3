//! Catalog: every declaration resolved and validated once at startup
//!
//! A [`Catalog`] is immutable after [`Catalog::new`] and is shared between
//! threads behind an `Arc`. SQL generation lives on the catalog (see
//! [`crate::query`]) because it only needs resolved metadata.

use crate::backends::{Escaper, SqlDialect};
use crate::error::OrmResult;
use crate::mapper::Mapper;
use crate::schema::{Entity, EntityDescriptor, Schema};
use crate::serializers::TypeSerializer;
use crate::validation::Validator;

/// Declarations handed to [`Catalog::new`]
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    pub(crate) dialect: SqlDialect,
    pub(crate) schemas: Vec<Schema>,
    pub(crate) serializers: Vec<TypeSerializer>,
    pub(crate) inputs: Vec<EntityDescriptor>,
    pub(crate) outputs: Vec<EntityDescriptor>,
}

impl CatalogConfig {
    pub fn new(dialect: SqlDialect) -> Self {
        Self {
            dialect,
            schemas: Vec::new(),
            serializers: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn schema(mut self, schema: Schema) -> Self {
        self.schemas.push(schema);
        self
    }

    /// Register global serializers, e.g. `serializers::basic::all()`
    pub fn serializers(mut self, serializers: impl IntoIterator<Item = TypeSerializer>) -> Self {
        self.serializers.extend(serializers);
        self
    }

    pub fn serializer(mut self, serializer: TypeSerializer) -> Self {
        self.serializers.push(serializer);
        self
    }

    /// Register a type used as input of hand-written queries
    pub fn input<I: Entity>(mut self) -> Self {
        self.inputs.push(I::descriptor());
        self
    }

    /// Register a type used as output of hand-written queries
    pub fn output<O: Entity>(mut self) -> Self {
        self.outputs.push(O::descriptor());
        self
    }

    pub fn dialect(&self) -> SqlDialect {
        self.dialect
    }

    pub fn schemas(&self) -> &[Schema] {
        &self.schemas
    }
}

/// Resolved and validated declarations
#[derive(Debug)]
pub struct Catalog {
    dialect: SqlDialect,
    schemas: Vec<String>,
    mapper: Mapper,
}

impl Catalog {
    /// Resolve the declarations and run every validation check
    pub fn new(config: CatalogConfig) -> OrmResult<Self> {
        let mapper = Mapper::resolve(&config)?;
        Validator::new(&config, &mapper).validate()?;

        tracing::info!(
            "Catalog ready for {} with {} schemas and {} tables",
            config.dialect,
            config.schemas.len(),
            mapper.tables().len()
        );

        Ok(Self {
            dialect: config.dialect,
            schemas: config.schemas.iter().map(|s| s.name.clone()).collect(),
            mapper,
        })
    }

    pub fn dialect(&self) -> SqlDialect {
        self.dialect
    }

    pub fn escaper(&self) -> Escaper {
        self.dialect.escaper()
    }

    pub fn mapper(&self) -> &Mapper {
        &self.mapper
    }

    /// Names of the declared schemas in declaration order
    pub fn schemas(&self) -> &[String] {
        &self.schemas
    }
}
