//! Fixtures shared by the integration tests
#![allow(dead_code)]

use std::sync::Arc;

use tabula_orm::serializers::basic;
use tabula_orm::{
    Catalog, CatalogConfig, Constraint, DatabasePoolConfig, Entity, Procedure, Schema, Service, SqlDialect, Table,
};
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq, Entity)]
pub struct Parent {
    #[entity(mutable)]
    pub pk: Option<i32>,
    pub value: String,
}

impl Parent {
    pub fn new(value: &str) -> Self {
        Self {
            pk: None,
            value: value.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Entity)]
pub struct Child {
    #[entity(mutable)]
    pub pk: Option<i32>,
    pub parent_pk: i32,
    pub value: String,
    pub note: Option<String>,
}

/// Table with a caller assigned key
#[derive(Debug, Clone, PartialEq, Entity)]
pub struct Tag {
    pub code: String,
    pub label: String,
}

#[derive(Debug, Entity)]
pub struct ParentFilter {
    pub value: String,
}

#[derive(Debug, PartialEq, Entity)]
pub struct Total {
    pub total: i64,
}

#[derive(Debug, Entity)]
pub struct Archive {
    pub parent_pk: i32,
}

pub fn config(dialect: SqlDialect) -> CatalogConfig {
    let schema = Schema::new("main")
        .table(Table::new(Parent::PK))
        .table(
            Table::new(Child::PK)
                .foreign_key(Child::PARENT_PK.references::<Parent>())
                .constraint(Child::PARENT_PK, &[Constraint::CascadeDelete]),
        )
        .table(Table::new(Tag::CODE).constraint(Tag::LABEL, &[Constraint::Unique]));

    let schema = if dialect == SqlDialect::Sqlite {
        schema
    } else {
        schema.procedure(Procedure::new::<Archive>())
    };

    CatalogConfig::new(dialect)
        .serializers(basic::all())
        .schema(schema)
        .input::<ParentFilter>()
        .output::<Total>()
}

pub fn catalog(dialect: SqlDialect) -> Catalog {
    Catalog::new(config(dialect)).expect("test catalog is valid")
}

/// Service over a fresh SQLite file with every table created
pub struct TestDb {
    pub service: Service,
    _dir: TempDir,
}

pub fn database() -> TestDb {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("test.db").display());
    let config = DatabasePoolConfig::new(url).max_connections(4);
    let service = Service::connect(Arc::new(catalog(SqlDialect::Sqlite)), config).unwrap();

    service
        .autocommit(|conn| {
            conn.table().create::<Parent>()?;
            conn.table().create::<Child>()?;
            conn.table().create::<Tag>()?;
            Ok(())
        })
        .unwrap();

    TestDb { service, _dir: dir }
}

/// Insert `n` parents named `p1..pn` and return them with their keys
pub fn seed_parents(service: &Service, n: usize) -> Vec<Parent> {
    service
        .autocommit(|conn| {
            let mut parents: Vec<Parent> = (1..=n).map(|i| Parent::new(&format!("p{}", i))).collect();
            conn.row().insert_many(&mut parents)?;
            Ok(parents)
        })
        .unwrap()
}
