//! Validation Harness
//!
//! Every rule is a pure function over the declarations and the resolved
//! graph returning the first [`Violation`] it finds. [`Validator`] runs them
//! all at startup, before any SQL is generated.

use std::collections::HashSet;
use std::hash::Hash;

use thiserror::Error;

use crate::catalog::CatalogConfig;
use crate::mapper::{ColumnKind, Mapper};
use crate::schema::{Constraint, EntityDescriptor, Schema, Table};
use crate::security::is_c_like;
use crate::serializers::TypeSerializer;

/// A broken rule of the declarations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Violation {
    #[error("At least one schema must be registered")]
    NoSchemas,

    #[error("Schema '{schema}' has no tables")]
    EmptySchema { schema: String },

    #[error("Schema '{schema}' is registered multiple times")]
    DuplicateSchema { schema: String },

    #[error("Table '{table}' is registered multiple times")]
    DuplicateTable { table: String },

    #[error("Foreign key '{table}.{field}' is registered multiple times")]
    DuplicateForeignKey { table: String, field: &'static str },

    #[error("Constraints of '{table}.{field}' are registered multiple times")]
    DuplicateConstraint { table: String, field: &'static str },

    #[error("Serializer for '{type_name}' is registered multiple times in {scope}")]
    DuplicateSerializer { scope: String, type_name: &'static str },

    #[error("Procedure '{procedure}' is registered multiple times")]
    DuplicateProcedure { procedure: String },

    #[error("Input '{entity}' is registered multiple times")]
    DuplicateInput { entity: &'static str },

    #[error("Output '{entity}' is registered multiple times")]
    DuplicateOutput { entity: &'static str },

    #[error("{kind} name '{name}' is not a valid identifier")]
    InvalidName { kind: &'static str, name: String },

    #[error("Table '{table}' references field '{field}' of '{owner}'")]
    ForeignField {
        table: String,
        owner: &'static str,
        field: &'static str,
    },

    #[error("Table '{table}' references unknown field '{field}'")]
    UnknownField { table: String, field: &'static str },

    #[error("Table '{table}' has its primary key '{field}' registered as a foreign key")]
    PrimaryKeyInForeignKeys { table: String, field: &'static str },

    #[error("Foreign key '{table}.{field}' is '{found}' but the referenced primary key is '{expected}'")]
    ForeignKeyType {
        table: String,
        field: &'static str,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Primary key '{table}.{field}' can not have constraint {constraint}")]
    PrimaryKeyConstraint {
        table: String,
        field: &'static str,
        constraint: Constraint,
    },

    #[error("Foreign key '{table}.{field}' can not have constraint {constraint}")]
    ForeignKeyConstraint {
        table: String,
        field: &'static str,
        constraint: Constraint,
    },

    #[error("Column '{table}.{field}' has constraint {constraint} which only applies to {applies_to}")]
    MisplacedConstraint {
        table: String,
        field: &'static str,
        constraint: Constraint,
        applies_to: &'static str,
    },

    #[error("Column '{table}.{column}' can not be traced to a field of its owner")]
    UntraceableColumn { table: String, column: &'static str },

    #[error("Tables do not share one identifier escaping convention")]
    MixedEscapers,
}

/// A single validation rule
pub type Check = fn(&CatalogConfig, &Mapper) -> Result<(), Violation>;

/// Every rule in the order it runs
pub const CHECKS: &[Check] = &[
    check_not_empty,
    check_unique_schemas,
    check_unique_tables,
    check_unique_foreign_keys,
    check_unique_constraints,
    check_unique_serializers,
    check_unique_procedures,
    check_unique_inputs,
    check_unique_outputs,
    check_names,
    check_declared_fields,
    check_primary_key_not_foreign,
    check_foreign_key_types,
    check_constraint_placement,
    check_columns_traceable,
    check_escapers,
];

/// Runs [`CHECKS`] over one configuration
pub struct Validator<'a> {
    config: &'a CatalogConfig,
    mapper: &'a Mapper,
}

impl<'a> Validator<'a> {
    pub fn new(config: &'a CatalogConfig, mapper: &'a Mapper) -> Self {
        Self { config, mapper }
    }

    /// Every broken rule, one per check
    pub fn violations(&self) -> Vec<Violation> {
        CHECKS
            .iter()
            .filter_map(|check| check(self.config, self.mapper).err())
            .collect()
    }

    /// Fail with the first broken rule
    pub fn validate(&self) -> Result<(), Violation> {
        for check in CHECKS {
            if let Err(violation) = check(self.config, self.mapper) {
                tracing::error!("Catalog validation failed: {}", violation);
                return Err(violation);
            }
        }
        Ok(())
    }
}

fn first_duplicate<K: Eq + Hash, T>(items: impl IntoIterator<Item = T>, key: impl Fn(&T) -> K) -> Option<T> {
    let mut seen = HashSet::new();
    items.into_iter().find(|item| !seen.insert(key(item)))
}

fn tables(config: &CatalogConfig) -> impl Iterator<Item = (&Schema, &Table)> {
    config
        .schemas
        .iter()
        .flat_map(|schema| schema.tables.iter().map(move |table| (schema, table)))
}

fn path(schema: &Schema, table: &Table) -> String {
    format!("{}.{}", schema.name, table.name())
}

pub fn check_not_empty(config: &CatalogConfig, _: &Mapper) -> Result<(), Violation> {
    if config.schemas.is_empty() {
        return Err(Violation::NoSchemas);
    }
    match config.schemas.iter().find(|s| s.tables.is_empty()) {
        Some(schema) => Err(Violation::EmptySchema {
            schema: schema.name.clone(),
        }),
        None => Ok(()),
    }
}

pub fn check_unique_schemas(config: &CatalogConfig, _: &Mapper) -> Result<(), Violation> {
    match first_duplicate(&config.schemas, |s| s.name.clone()) {
        Some(schema) => Err(Violation::DuplicateSchema {
            schema: schema.name.clone(),
        }),
        None => Ok(()),
    }
}

/// A type may back one table only, and one schema can not hold two tables
/// of the same name
pub fn check_unique_tables(config: &CatalogConfig, _: &Mapper) -> Result<(), Violation> {
    if let Some((schema, table)) = first_duplicate(tables(config), |(_, t)| t.type_id()) {
        return Err(Violation::DuplicateTable {
            table: path(schema, table),
        });
    }
    match first_duplicate(tables(config), |(s, t)| (s.name.clone(), t.name())) {
        Some((schema, table)) => Err(Violation::DuplicateTable {
            table: path(schema, table),
        }),
        None => Ok(()),
    }
}

pub fn check_unique_foreign_keys(config: &CatalogConfig, _: &Mapper) -> Result<(), Violation> {
    for (schema, table) in tables(config) {
        if let Some(fk) = first_duplicate(&table.foreign_keys, |fk| fk.field) {
            return Err(Violation::DuplicateForeignKey {
                table: path(schema, table),
                field: fk.field.name,
            });
        }
    }
    Ok(())
}

pub fn check_unique_constraints(config: &CatalogConfig, _: &Mapper) -> Result<(), Violation> {
    for (schema, table) in tables(config) {
        if let Some(c) = first_duplicate(&table.constraints, |c| c.field) {
            return Err(Violation::DuplicateConstraint {
                table: path(schema, table),
                field: c.field.name,
            });
        }
        for c in &table.constraints {
            if first_duplicate(&c.constraints, |c| **c).is_some() {
                return Err(Violation::DuplicateConstraint {
                    table: path(schema, table),
                    field: c.field.name,
                });
            }
        }
    }
    Ok(())
}

fn unique_serializers(scope: impl FnOnce() -> String, serializers: &[TypeSerializer]) -> Result<(), Violation> {
    match first_duplicate(serializers, |s| s.type_id()) {
        Some(s) => Err(Violation::DuplicateSerializer {
            scope: scope(),
            type_name: s.type_name(),
        }),
        None => Ok(()),
    }
}

/// Within each scope a value type has one serializer; column overrides are
/// unique per field
pub fn check_unique_serializers(config: &CatalogConfig, _: &Mapper) -> Result<(), Violation> {
    unique_serializers(|| "global serializers".to_string(), &config.serializers)?;
    for schema in &config.schemas {
        unique_serializers(|| format!("schema '{}'", schema.name), &schema.serializers)?;
        for table in &schema.tables {
            unique_serializers(|| format!("table '{}'", path(schema, table)), &table.serializers)?;
            if let Some(c) = first_duplicate(&table.column_serializers, |c| (c.field, c.serializer.type_id())) {
                return Err(Violation::DuplicateSerializer {
                    scope: format!("column '{}.{}'", path(schema, table), c.field.name),
                    type_name: c.serializer.type_name(),
                });
            }
        }
        for procedure in &schema.procedures {
            unique_serializers(
                || format!("procedure '{}.{}'", schema.name, procedure.name()),
                &procedure.serializers,
            )?;
        }
    }
    Ok(())
}

pub fn check_unique_procedures(config: &CatalogConfig, _: &Mapper) -> Result<(), Violation> {
    let procedures = config
        .schemas
        .iter()
        .flat_map(|s| s.procedures.iter().map(move |p| (s, p)));
    match first_duplicate(procedures, |(_, p)| p.entity.type_id) {
        Some((schema, procedure)) => Err(Violation::DuplicateProcedure {
            procedure: format!("{}.{}", schema.name, procedure.name()),
        }),
        None => Ok(()),
    }
}

fn duplicate_entity(entities: &[EntityDescriptor]) -> Option<&'static str> {
    first_duplicate(entities, |e| e.type_id).map(|e| e.name)
}

pub fn check_unique_inputs(config: &CatalogConfig, _: &Mapper) -> Result<(), Violation> {
    match duplicate_entity(&config.inputs) {
        Some(entity) => Err(Violation::DuplicateInput { entity }),
        None => Ok(()),
    }
}

pub fn check_unique_outputs(config: &CatalogConfig, _: &Mapper) -> Result<(), Violation> {
    match duplicate_entity(&config.outputs) {
        Some(entity) => Err(Violation::DuplicateOutput { entity }),
        None => Ok(()),
    }
}

/// Schema, table, column, procedure and argument names are C-like identifiers
pub fn check_names(config: &CatalogConfig, _: &Mapper) -> Result<(), Violation> {
    let invalid = |kind: &'static str, name: &str| -> Result<(), Violation> {
        if is_c_like(name) {
            Ok(())
        } else {
            Err(Violation::InvalidName {
                kind,
                name: name.to_string(),
            })
        }
    };

    for schema in &config.schemas {
        invalid("Schema", &schema.name)?;
        for table in &schema.tables {
            invalid("Table", table.name())?;
            for field in &table.entity.fields {
                invalid("Column", field.name)?;
            }
        }
        for procedure in &schema.procedures {
            invalid("Procedure", procedure.name())?;
            for field in &procedure.entity.fields {
                invalid("Argument", field.name)?;
            }
        }
    }
    Ok(())
}

/// Foreign keys, constraints and column serializers name fields of the
/// table entity
pub fn check_declared_fields(config: &CatalogConfig, _: &Mapper) -> Result<(), Violation> {
    for (schema, table) in tables(config) {
        let keys = table
            .foreign_keys
            .iter()
            .map(|fk| fk.field)
            .chain(table.constraints.iter().map(|c| c.field))
            .chain(table.column_serializers.iter().map(|c| c.field))
            .chain(std::iter::once(table.primary_key));

        for key in keys {
            if key.owner != table.type_id() {
                return Err(Violation::ForeignField {
                    table: path(schema, table),
                    owner: key.owner_name,
                    field: key.name,
                });
            }
            if table.entity.field(key.name).is_none() {
                return Err(Violation::UnknownField {
                    table: path(schema, table),
                    field: key.name,
                });
            }
        }
    }
    Ok(())
}

pub fn check_primary_key_not_foreign(config: &CatalogConfig, _: &Mapper) -> Result<(), Violation> {
    for (schema, table) in tables(config) {
        if table.foreign_keys.iter().any(|fk| fk.field == table.primary_key) {
            return Err(Violation::PrimaryKeyInForeignKeys {
                table: path(schema, table),
                field: table.primary_key.name,
            });
        }
    }
    Ok(())
}

pub fn check_foreign_key_types(_: &CatalogConfig, mapper: &Mapper) -> Result<(), Violation> {
    for table in mapper.tables() {
        for column in table.foreign_keys() {
            let target = column
                .foreign_table()
                .and_then(|id| mapper.table_by_id(id))
                .map(|t| t.primary_key().field());
            if let Some(pk) = target {
                if pk.type_id != column.field().type_id {
                    return Err(Violation::ForeignKeyType {
                        table: format!("{}.{}", table.schema(), table.name()),
                        field: column.name(),
                        expected: pk.type_name,
                        found: column.field().type_name,
                    });
                }
            }
        }
    }
    Ok(())
}

/// `Unique` and cascades never on primary keys, `AutoIncrement` only on an
/// auto-increment primary key, cascades only on foreign keys
pub fn check_constraint_placement(config: &CatalogConfig, mapper: &Mapper) -> Result<(), Violation> {
    for (schema, table) in tables(config) {
        let Some(info) = mapper.table_of(table.type_id()) else {
            continue;
        };
        for declared in &table.constraints {
            let Some(column) = info.column(declared.field.name) else {
                continue;
            };
            for &constraint in &declared.constraints {
                let violation = match (column.kind(), constraint) {
                    (ColumnKind::Primary { .. }, Constraint::Unique)
                    | (ColumnKind::Primary { .. }, Constraint::CascadeUpdate)
                    | (ColumnKind::Primary { .. }, Constraint::CascadeDelete) => {
                        Some(Violation::PrimaryKeyConstraint {
                            table: path(schema, table),
                            field: column.name(),
                            constraint,
                        })
                    }
                    (ColumnKind::Primary { auto_increment: false }, Constraint::AutoIncrement) => {
                        Some(Violation::MisplacedConstraint {
                            table: path(schema, table),
                            field: column.name(),
                            constraint,
                            applies_to: "mutable optional integer primary keys",
                        })
                    }
                    (ColumnKind::Foreign { .. }, Constraint::AutoIncrement) => Some(Violation::ForeignKeyConstraint {
                        table: path(schema, table),
                        field: column.name(),
                        constraint,
                    }),
                    (ColumnKind::Other, Constraint::AutoIncrement) => Some(Violation::MisplacedConstraint {
                        table: path(schema, table),
                        field: column.name(),
                        constraint,
                        applies_to: "primary keys",
                    }),
                    (ColumnKind::Other, Constraint::CascadeUpdate) | (ColumnKind::Other, Constraint::CascadeDelete) => {
                        Some(Violation::MisplacedConstraint {
                            table: path(schema, table),
                            field: column.name(),
                            constraint,
                            applies_to: "foreign keys",
                        })
                    }
                    _ => None,
                };
                if let Some(violation) = violation {
                    return Err(violation);
                }
            }
        }
    }
    Ok(())
}

/// Every resolved column is a real field of the entity owning its table
pub fn check_columns_traceable(_: &CatalogConfig, mapper: &Mapper) -> Result<(), Violation> {
    for table in mapper.tables() {
        for column in table.columns() {
            let traceable = column.owner() == table.type_id()
                && column.table() == table.id()
                && table.entity().field(column.name()) == Some(column.field());
            if !traceable {
                return Err(Violation::UntraceableColumn {
                    table: format!("{}.{}", table.schema(), table.name()),
                    column: column.name(),
                });
            }
        }
    }
    Ok(())
}

pub fn check_escapers(_: &CatalogConfig, mapper: &Mapper) -> Result<(), Violation> {
    let escapers: HashSet<_> = mapper
        .tables()
        .iter()
        .map(|t| t.escaper())
        .chain(mapper.procedures().map(|p| p.escaper))
        .collect();
    if escapers.len() > 1 {
        return Err(Violation::MixedEscapers);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::SqlDialect;
    use crate::schema::{Procedure, Table};
    use crate::serializers::basic;
    use crate::Entity;

    #[derive(Entity)]
    struct Parent {
        #[entity(mutable)]
        pk: Option<i32>,
        value: String,
    }

    #[derive(Entity)]
    struct Child {
        #[entity(mutable)]
        pk: Option<i32>,
        parent_pk: i32,
        label: i64,
    }

    #[derive(Entity)]
    struct Tag {
        key: String,
        note: String,
    }

    #[derive(Entity)]
    struct Touch {
        pk: i32,
    }

    fn config(schema: Schema) -> CatalogConfig {
        CatalogConfig::new(SqlDialect::Sqlite)
            .serializers(basic::all())
            .schema(schema)
    }

    fn violations(config: &CatalogConfig) -> Vec<Violation> {
        let mapper = Mapper::resolve(config).unwrap();
        Validator::new(config, &mapper).violations()
    }

    fn valid_schema() -> Schema {
        Schema::new("main")
            .table(Table::new(Parent::PK))
            .table(Table::new(Child::PK).foreign_key(Child::PARENT_PK.references::<Parent>()))
    }

    #[test]
    fn test_valid_configuration_passes() {
        assert!(violations(&config(valid_schema())).is_empty());
    }

    #[test]
    fn test_empty_configuration() {
        let config = CatalogConfig::new(SqlDialect::Sqlite);
        assert_eq!(violations(&config), vec![Violation::NoSchemas]);

        let config = config.schema(Schema::new("main"));
        assert_eq!(
            violations(&config),
            vec![Violation::EmptySchema { schema: "main".into() }]
        );
    }

    #[test]
    fn test_duplicate_table_and_schema() {
        let config = config(valid_schema()).schema(Schema::new("main").table(Table::new(Parent::PK)));
        let found = violations(&config);
        assert!(found.contains(&Violation::DuplicateSchema { schema: "main".into() }));
        assert!(found.contains(&Violation::DuplicateTable {
            table: "main.Parent".into()
        }));
    }

    #[test]
    fn test_duplicate_foreign_key_and_constraint() {
        let schema = Schema::new("main").table(Table::new(Parent::PK)).table(
            Table::new(Child::PK)
                .foreign_key(Child::PARENT_PK.references::<Parent>())
                .foreign_key(Child::PARENT_PK.references::<Parent>())
                .constraint(Child::LABEL, &[Constraint::Unique])
                .constraint(Child::LABEL, &[Constraint::Unique]),
        );
        let found = violations(&config(schema));
        assert!(found.contains(&Violation::DuplicateForeignKey {
            table: "main.Child".into(),
            field: "parent_pk"
        }));
        assert!(found.contains(&Violation::DuplicateConstraint {
            table: "main.Child".into(),
            field: "label"
        }));
    }

    #[test]
    fn test_duplicate_serializers_per_scope() {
        let schema = valid_schema()
            .serializer(basic::string())
            .serializer(basic::string().with_db_type("VARCHAR(10)"));
        let found = violations(&config(schema));
        assert_eq!(found.len(), 1);
        assert!(matches!(
            &found[0],
            Violation::DuplicateSerializer { scope, .. } if scope == "schema 'main'"
        ));

        let global = config(valid_schema()).serializer(basic::integer());
        assert!(matches!(
            violations(&global).as_slice(),
            [Violation::DuplicateSerializer { .. }]
        ));
    }

    #[test]
    fn test_duplicate_procedure_input_output() {
        let schema = valid_schema()
            .procedure(Procedure::new::<Touch>())
            .procedure(Procedure::new::<Touch>());
        let config = config(schema).input::<Tag>().input::<Tag>().output::<Tag>().output::<Tag>();
        let found = violations(&config);
        assert!(found.contains(&Violation::DuplicateProcedure {
            procedure: "main.Touch".into()
        }));
        assert!(found.contains(&Violation::DuplicateInput { entity: "Tag" }));
        assert!(found.contains(&Violation::DuplicateOutput { entity: "Tag" }));
    }

    #[test]
    fn test_schema_names_must_be_c_like() {
        let schema = Schema::new("my schema").table(Table::new(Parent::PK));
        assert_eq!(
            violations(&config(schema)),
            vec![Violation::InvalidName {
                kind: "Schema",
                name: "my schema".into()
            }]
        );
    }

    #[test]
    fn test_primary_key_can_not_be_foreign() {
        let schema = Schema::new("main")
            .table(Table::new(Parent::PK))
            .table(Table::new(Child::PK).foreign_key(Child::PK.references::<Parent>()));
        assert!(violations(&config(schema)).contains(&Violation::PrimaryKeyInForeignKeys {
            table: "main.Child".into(),
            field: "pk"
        }));
    }

    #[test]
    fn test_foreign_key_type_must_match() {
        let schema = Schema::new("main")
            .table(Table::new(Parent::PK))
            .table(Table::new(Child::PK).foreign_key(Child::LABEL.references::<Parent>()));
        let found = violations(&config(schema));
        assert!(matches!(
            found.as_slice(),
            [Violation::ForeignKeyType { field: "label", .. }]
        ));
    }

    #[test]
    fn test_constraint_placement() {
        let schema = Schema::new("main").table(Table::new(Parent::PK)).table(
            Table::new(Child::PK)
                .foreign_key(Child::PARENT_PK.references::<Parent>())
                .constraint(Child::PK, &[Constraint::Unique]),
        );
        assert!(matches!(
            violations(&config(schema)).as_slice(),
            [Violation::PrimaryKeyConstraint { constraint: Constraint::Unique, .. }]
        ));

        let schema = Schema::new("main").table(Table::new(Parent::PK)).table(
            Table::new(Child::PK)
                .foreign_key(Child::PARENT_PK.references::<Parent>())
                .constraint(Child::PARENT_PK, &[Constraint::AutoIncrement, Constraint::CascadeDelete])
                .constraint(Child::LABEL, &[Constraint::CascadeUpdate]),
        );
        let found = violations(&config(schema));
        assert!(matches!(
            found.as_slice(),
            [Violation::ForeignKeyConstraint { field: "parent_pk", .. }]
        ));

        let schema = Schema::new("main")
            .table(Table::new(Tag::KEY).constraint(Tag::KEY, &[Constraint::AutoIncrement]));
        assert!(matches!(
            violations(&config(schema)).as_slice(),
            [Violation::MisplacedConstraint { field: "key", .. }]
        ));
    }

    #[test]
    fn test_fields_of_other_entities_are_rejected() {
        let schema = Schema::new("main")
            .table(Table::new(Parent::PK).constraint(Child::LABEL, &[Constraint::Unique]))
            .table(Table::new(Child::PK));
        assert!(violations(&config(schema)).contains(&Violation::ForeignField {
            table: "main.Parent".into(),
            owner: "Child",
            field: "label"
        }));
    }
}
