//! Metadata Resolver
//!
//! Turns declared schemas into an arena of [`TableInfo`] indexed by
//! [`TableId`]. Tables are classified first and foreign keys are linked in a
//! second pass, so tables may reference each other in any order.

pub mod table_info;

use std::any::{type_name, TypeId};
use std::collections::HashMap;

use crate::backends::{Escaper, Row};
use crate::catalog::CatalogConfig;
use crate::error::{ConfigError, OrmResult, QueryError};
use crate::schema::entity::short_name;
use crate::schema::{Constraint, Entity, EntityDescriptor, FieldInfo, ForeignKey, Schema, Table};
use crate::serializers::{SerializerRegistry, TypeSerializer};

pub use table_info::{BoundField, Column, ColumnKind, EntityBinding, TableId, TableInfo};

/// Resolved stored procedure
#[derive(Debug, Clone)]
pub struct ProcedureInfo {
    pub(crate) schema: String,
    pub(crate) escaper: Escaper,
    pub(crate) binding: EntityBinding,
}

impl ProcedureInfo {
    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn name(&self) -> &'static str {
        self.binding.entity.name
    }

    pub fn arguments(&self) -> &[BoundField] {
        &self.binding.fields
    }

    pub fn binding(&self) -> &EntityBinding {
        &self.binding
    }

    /// Escaped `schema.procedure` path
    pub fn path(&self) -> String {
        self.escaper.wrap_path(&[&self.schema, self.name()])
    }
}

/// Resolved, immutable metadata of every declared type
#[derive(Debug)]
pub struct Mapper {
    tables: Vec<TableInfo>,
    table_index: HashMap<TypeId, TableId>,
    inputs: HashMap<TypeId, EntityBinding>,
    outputs: HashMap<TypeId, EntityBinding>,
    procedures: HashMap<TypeId, ProcedureInfo>,
}

type PendingForeignKeys<'a> = Vec<(usize, &'a ForeignKey)>;

impl Mapper {
    /// Resolve every declaration of the configuration
    ///
    /// A type declared twice keeps its first declaration; duplicates are
    /// reported by the validation harness.
    pub fn resolve(config: &CatalogConfig) -> OrmResult<Self> {
        let registry = SerializerRegistry::new(config.serializers.iter().cloned());
        let escaper = config.dialect.escaper();

        // Arena slots
        let mut table_index = HashMap::new();
        let mut declared: Vec<(&Schema, &Table)> = Vec::new();
        for schema in &config.schemas {
            for table in &schema.tables {
                if table_index.contains_key(&table.type_id()) {
                    continue;
                }
                table_index.insert(table.type_id(), TableId(declared.len()));
                declared.push((schema, table));
            }
        }

        // First pass: columns and serializers
        let mut tables = Vec::with_capacity(declared.len());
        let mut pending = Vec::with_capacity(declared.len());
        for (index, (schema, table)) in declared.iter().enumerate() {
            let (info, foreign) = resolve_table(TableId(index), schema, table, &registry, escaper)?;
            tables.push(info);
            pending.push(foreign);
        }

        // Second pass: foreign keys point into the arena
        for (info, foreign) in tables.iter_mut().zip(pending) {
            for (column, fk) in foreign {
                let target = table_index.get(&fk.target).copied().ok_or_else(|| {
                    ConfigError::DanglingForeignKey {
                        owner: format!("{}.{}", info.schema, info.name()),
                        field: fk.field.name,
                        target: fk.target_name,
                    }
                })?;
                info.columns[column].kind = ColumnKind::Foreign { target };
            }
        }

        let mut procedures = HashMap::new();
        for schema in &config.schemas {
            for procedure in &schema.procedures {
                let owner = format!("{}.{}", schema.name, procedure.name());
                let binding = bind(
                    &procedure.entity,
                    &registry,
                    &[&procedure.serializers, &schema.serializers],
                    &owner,
                    true,
                )?;
                procedures
                    .entry(procedure.entity.type_id)
                    .or_insert(ProcedureInfo {
                        schema: schema.name.clone(),
                        escaper,
                        binding,
                    });
            }
        }

        let mut inputs = HashMap::new();
        for entity in &config.inputs {
            let binding = bind(entity, &registry, &[], entity.name, false)?;
            inputs.entry(entity.type_id).or_insert(binding);
        }

        let mut outputs = HashMap::new();
        for entity in &config.outputs {
            let binding = bind(entity, &registry, &[], entity.name, false)?;
            outputs.entry(entity.type_id).or_insert(binding);
        }

        tracing::debug!(
            "Resolved {} tables, {} procedures, {} inputs and {} outputs",
            tables.len(),
            procedures.len(),
            inputs.len(),
            outputs.len()
        );

        Ok(Self {
            tables,
            table_index,
            inputs,
            outputs,
            procedures,
        })
    }

    /// Every table in arena order
    pub fn tables(&self) -> &[TableInfo] {
        &self.tables
    }

    pub fn table_by_id(&self, id: TableId) -> Option<&TableInfo> {
        self.tables.get(id.0)
    }

    pub fn table_of(&self, type_id: TypeId) -> Option<&TableInfo> {
        self.table_index.get(&type_id).and_then(|id| self.tables.get(id.0))
    }

    pub fn table<T: 'static>(&self) -> OrmResult<&TableInfo> {
        self.table_of(TypeId::of::<T>()).ok_or_else(|| {
            QueryError::UnregisteredTable {
                entity: short_name(type_name::<T>()),
            }
            .into()
        })
    }

    pub fn procedure<P: 'static>(&self) -> OrmResult<&ProcedureInfo> {
        self.procedures.get(&TypeId::of::<P>()).ok_or_else(|| {
            QueryError::UnregisteredProcedure {
                entity: short_name(type_name::<P>()),
            }
            .into()
        })
    }

    pub fn procedures(&self) -> impl Iterator<Item = &ProcedureInfo> {
        self.procedures.values()
    }

    pub fn input<I: 'static>(&self) -> OrmResult<&EntityBinding> {
        self.inputs.get(&TypeId::of::<I>()).ok_or_else(|| {
            QueryError::UnregisteredInput {
                entity: short_name(type_name::<I>()),
            }
            .into()
        })
    }

    /// Binding used to decode rows into `O`, tables are valid outputs
    pub fn output<O: 'static>(&self) -> OrmResult<&EntityBinding> {
        let type_id = TypeId::of::<O>();
        self.outputs
            .get(&type_id)
            .or_else(|| self.table_of(type_id).map(|t| &t.binding))
            .ok_or_else(|| {
                QueryError::UnregisteredOutput {
                    entity: short_name(type_name::<O>()),
                }
                .into()
            })
    }

    /// Decode one row into `T`
    pub fn decode<T: Entity>(&self, row: Row) -> OrmResult<T> {
        self.output::<T>()?.decode(row)
    }

    /// Decode every row into `T`
    pub fn decode_many<T: Entity>(&self, rows: Vec<Row>) -> OrmResult<Vec<T>> {
        let binding = self.output::<T>()?;
        rows.into_iter().map(|row| binding.decode(row)).collect()
    }
}

fn resolve_table<'a>(
    id: TableId,
    schema: &Schema,
    table: &'a Table,
    registry: &SerializerRegistry,
    escaper: Escaper,
) -> OrmResult<(TableInfo, PendingForeignKeys<'a>)> {
    let entity = &table.entity;
    let owner = format!("{}.{}", schema.name, entity.name);

    if entity.fields.is_empty() {
        return Err(ConfigError::EmptyEntity { entity: entity.name }.into());
    }
    let primary_key = entity
        .fields
        .iter()
        .position(|f| f.name == table.primary_key.name)
        .ok_or(ConfigError::UnknownField {
            entity: entity.name,
            field: table.primary_key.name,
        })?;

    let mut columns = Vec::with_capacity(entity.fields.len());
    let mut pending = Vec::new();
    for (index, field) in entity.fields.iter().enumerate() {
        let overrides: Vec<TypeSerializer> = table
            .column_serializers
            .iter()
            .filter(|c| c.field.owner == entity.type_id && c.field.name == field.name)
            .map(|c| c.serializer.clone())
            .collect();
        let serializer = registry
            .resolve(field.type_id, &[&overrides, &table.serializers, &schema.serializers])
            .ok_or_else(|| ConfigError::MissingSerializer {
                owner: owner.clone(),
                field: field.name,
                type_name: field.type_name,
            })?;

        let kind = if index == primary_key {
            ColumnKind::Primary {
                auto_increment: infer_auto_increment(&owner, field, &serializer)?,
            }
        } else {
            let foreign = table
                .foreign_keys
                .iter()
                .find(|fk| fk.field.owner == entity.type_id && fk.field.name == field.name);
            if let Some(fk) = foreign {
                pending.push((index, fk));
            }
            ColumnKind::Other
        };

        let constraints: Vec<Constraint> = table.constraints_of(field.name).collect();
        columns.push(Column {
            bound: BoundField {
                field: *field,
                serializer,
            },
            owner: entity.type_id,
            table: id,
            kind,
            unique: constraints.contains(&Constraint::Unique),
            cascade_update: constraints.contains(&Constraint::CascadeUpdate),
            cascade_delete: constraints.contains(&Constraint::CascadeDelete),
        });
    }

    let binding = EntityBinding {
        entity: entity.clone(),
        fields: columns.iter().map(|c| c.bound.clone()).collect(),
    };

    let info = TableInfo {
        id,
        schema: schema.name.clone(),
        escaper,
        binding,
        columns,
        primary_key,
    };
    Ok((info, pending))
}

/// Mutable optional integer keys are generated by the database, immutable
/// required keys are assigned by the caller
fn infer_auto_increment(owner: &str, field: &FieldInfo, serializer: &TypeSerializer) -> Result<bool, ConfigError> {
    match (field.mutable, field.nullable) {
        (true, true) if serializer.wire_type().is_integer() => Ok(true),
        (true, true) => Err(ConfigError::NonIntegerAutoIncrement {
            owner: owner.to_string(),
            field: field.name,
            type_name: field.type_name,
        }),
        (false, false) => Ok(false),
        (mutable, nullable) => Err(ConfigError::PrimaryKeyMutability {
            owner: owner.to_string(),
            field: field.name,
            mutable,
            nullable,
        }),
    }
}

fn bind(
    entity: &EntityDescriptor,
    registry: &SerializerRegistry,
    scopes: &[&[TypeSerializer]],
    owner: &str,
    allow_empty: bool,
) -> Result<EntityBinding, ConfigError> {
    if entity.fields.is_empty() && !allow_empty {
        return Err(ConfigError::EmptyEntity { entity: entity.name });
    }
    let fields = entity
        .fields
        .iter()
        .map(|field| {
            registry
                .resolve(field.type_id, scopes)
                .map(|serializer| BoundField {
                    field: *field,
                    serializer,
                })
                .ok_or_else(|| ConfigError::MissingSerializer {
                    owner: owner.to_string(),
                    field: field.name,
                    type_name: field.type_name,
                })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(EntityBinding {
        entity: entity.clone(),
        fields,
    })
}
