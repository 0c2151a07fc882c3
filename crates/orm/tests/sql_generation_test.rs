mod common;

use common::{catalog, Archive, Child, Parent, ParentFilter, Tag};
use tabula_orm::{Cursor, DatabaseValue, Order, OrmError, Page, QueryBuilder, QueryError, SqlBuilder, SqlDialect};

fn values(query: &tabula_orm::Query) -> Vec<DatabaseValue> {
    query.values.iter().map(|v| v.value.clone()).collect()
}

#[test]
fn test_create_table_per_dialect() {
    let pg = catalog(SqlDialect::PostgreSql);
    assert_eq!(
        pg.create_table::<Parent>().unwrap().sql,
        r#"CREATE TABLE IF NOT EXISTS "main"."Parent" ("pk" SERIAL PRIMARY KEY, "value" TEXT NOT NULL)"#
    );

    let mysql = catalog(SqlDialect::MySql);
    assert_eq!(
        mysql.create_table::<Parent>().unwrap().sql,
        "CREATE TABLE IF NOT EXISTS `main`.`Parent` (`pk` INTEGER AUTO_INCREMENT PRIMARY KEY, `value` TEXT NOT NULL)"
    );

    let sqlite = catalog(SqlDialect::Sqlite);
    assert_eq!(
        sqlite.create_table::<Parent>().unwrap().sql,
        r#"CREATE TABLE IF NOT EXISTS "main"."Parent" ("pk" INTEGER PRIMARY KEY AUTOINCREMENT, "value" TEXT NOT NULL)"#
    );
}

#[test]
fn test_create_table_with_constraints() {
    let pg = catalog(SqlDialect::PostgreSql);
    assert_eq!(
        pg.create_table::<Child>().unwrap().sql,
        concat!(
            r#"CREATE TABLE IF NOT EXISTS "main"."Child" ("pk" SERIAL PRIMARY KEY, "parent_pk" INTEGER NOT NULL, "#,
            r#""value" TEXT NOT NULL, "note" TEXT, "#,
            r#"FOREIGN KEY ("parent_pk") REFERENCES "main"."Parent" ("pk") ON DELETE CASCADE)"#
        )
    );
    assert_eq!(
        pg.create_table::<Tag>().unwrap().sql,
        r#"CREATE TABLE IF NOT EXISTS "main"."Tag" ("code" TEXT PRIMARY KEY, "label" TEXT NOT NULL UNIQUE)"#
    );

    // SQLite resolves references inside the schema of the table
    let sqlite = catalog(SqlDialect::Sqlite);
    assert!(sqlite
        .create_table::<Child>()
        .unwrap()
        .sql
        .ends_with(r#"FOREIGN KEY ("parent_pk") REFERENCES "Parent" ("pk") ON DELETE CASCADE)"#));
}

#[test]
fn test_row_statements() {
    let pg = catalog(SqlDialect::PostgreSql);
    let parent = Parent {
        pk: Some(7),
        value: "seven".to_string(),
    };

    let insert = pg.insert_row(&parent, false).unwrap();
    assert_eq!(
        insert.sql,
        r#"INSERT INTO "main"."Parent" ("value") VALUES ($1) RETURNING "pk""#
    );
    assert_eq!(values(&insert), [DatabaseValue::from("seven")]);

    let batch = pg.insert_row(&parent, true).unwrap();
    assert_eq!(batch.sql, r#"INSERT INTO "main"."Parent" ("value") VALUES ($1)"#);

    let update = pg.update_row(&parent).unwrap();
    assert_eq!(update.sql, r#"UPDATE "main"."Parent" SET "value" = $1 WHERE "pk" = $2"#);
    assert_eq!(values(&update), [DatabaseValue::from("seven"), DatabaseValue::Int32(7)]);

    let delete = pg.delete_row(&parent).unwrap();
    assert_eq!(delete.sql, r#"DELETE FROM "main"."Parent" WHERE "pk" = $1"#);
    assert_eq!(values(&delete), [DatabaseValue::Int32(7)]);
}

#[test]
fn test_caller_assigned_key_is_inserted() {
    let mysql = catalog(SqlDialect::MySql);
    let tag = Tag {
        code: "db".to_string(),
        label: "Databases".to_string(),
    };
    let insert = mysql.insert_row(&tag, false).unwrap();
    assert_eq!(insert.sql, "INSERT INTO `main`.`Tag` (`code`, `label`) VALUES (?, ?)");
    assert_eq!(
        mysql.update_row(&tag).unwrap().sql,
        "UPDATE `main`.`Tag` SET `label` = ? WHERE `code` = ?"
    );
}

#[test]
fn test_pagination_statements() {
    let sqlite = catalog(SqlDialect::Sqlite);
    let page = sqlite
        .select_page(&Page::new(2, Parent::PK).limit(20).order(Order::Desc))
        .unwrap();
    assert_eq!(page.sql, r#"SELECT * FROM "main"."Parent" ORDER BY "pk" DESC LIMIT ? OFFSET ?"#);
    assert_eq!(values(&page), [DatabaseValue::Int64(20), DatabaseValue::Int64(40)]);

    let pg = catalog(SqlDialect::PostgreSql);
    let cursor = pg
        .select_cursor(&Cursor::new(10, Parent::PK).limit(5).order(Order::Desc))
        .unwrap();
    assert_eq!(
        cursor.sql,
        r#"SELECT * FROM "main"."Parent" WHERE "pk" <= $1 ORDER BY "pk" DESC LIMIT $2"#
    );
    assert_eq!(values(&cursor), [DatabaseValue::Int32(10), DatabaseValue::Int64(5)]);

    let cursor = pg.select_cursor(&Cursor::new("m".to_string(), Parent::VALUE)).unwrap();
    assert!(cursor.sql.contains(r#"WHERE "value" >= $1 ORDER BY "value" ASC"#));
}

#[test]
fn test_select_by_pk_checks_key_type() {
    let pg = catalog(SqlDialect::PostgreSql);
    let query = pg.select_by_pk::<Parent, i32>(&3).unwrap();
    assert_eq!(query.sql, r#"SELECT * FROM "main"."Parent" WHERE "pk" = $1"#);

    let err = pg.select_by_pk::<Parent, i64>(&3).unwrap_err();
    match err {
        OrmError::Query(QueryError::PrimaryKeyType { entity, expected, found }) => {
            assert_eq!(entity, "Parent");
            assert_eq!(expected, "i32");
            assert_eq!(found, "i64");
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_schema_statements() {
    let pg = catalog(SqlDialect::PostgreSql);
    assert_eq!(pg.create_schema("audit").unwrap().sql, r#"CREATE SCHEMA IF NOT EXISTS "audit""#);
    assert_eq!(
        pg.drop_schema("audit", true).unwrap().sql,
        r#"DROP SCHEMA IF EXISTS "audit" CASCADE"#
    );

    let mysql = catalog(SqlDialect::MySql);
    assert_eq!(mysql.drop_schema("audit", true).unwrap().sql, "DROP SCHEMA IF EXISTS `audit`");
    assert_eq!(mysql.drop_table::<Parent>(true).unwrap().sql, "DROP TABLE IF EXISTS `main`.`Parent` CASCADE");

    let err = pg.create_schema("bad name; --").unwrap_err();
    assert!(matches!(err, OrmError::Query(QueryError::InvalidIdentifier { .. })));

    let sqlite = catalog(SqlDialect::Sqlite);
    assert!(matches!(
        sqlite.create_schema("audit").unwrap_err(),
        OrmError::Query(QueryError::Unsupported { dialect: "SQLite", .. })
    ));
    assert_eq!(sqlite.drop_table::<Parent>(true).unwrap().sql, r#"DROP TABLE IF EXISTS "main"."Parent""#);
}

#[test]
fn test_procedure_statements() {
    let pg = catalog(SqlDialect::PostgreSql);
    assert_eq!(
        pg.create_procedure::<Archive>("DELETE FROM main.\"Child\" WHERE parent_pk = parent_pk;")
            .unwrap()
            .sql,
        "CREATE OR REPLACE PROCEDURE \"main\".\"Archive\"(\"parent_pk\" INTEGER)\nLANGUAGE plpgsql\nAS $$\nBEGIN\n\
         DELETE FROM main.\"Child\" WHERE parent_pk = parent_pk;\nEND;\n$$"
    );
    let call = pg.call_procedure(&Archive { parent_pk: 4 }).unwrap();
    assert_eq!(call.sql, r#"CALL "main"."Archive"($1)"#);
    assert_eq!(values(&call), [DatabaseValue::Int32(4)]);

    let mysql = catalog(SqlDialect::MySql);
    assert_eq!(
        mysql.create_procedure::<Archive>("SELECT 1;").unwrap().sql,
        "CREATE PROCEDURE `main`.`Archive`(IN `parent_pk` INTEGER)\nBEGIN\nSELECT 1;\nEND"
    );
    assert_eq!(
        mysql.drop_procedure::<Archive>().unwrap().sql,
        "DROP PROCEDURE IF EXISTS `main`.`Archive`"
    );

    // not registered as a procedure on SQLite
    let sqlite = catalog(SqlDialect::Sqlite);
    assert!(matches!(
        sqlite.call_procedure(&Archive { parent_pk: 1 }).unwrap_err(),
        OrmError::Query(QueryError::UnregisteredProcedure { .. })
    ));
}

#[test]
fn test_unregistered_table() {
    let pg = catalog(SqlDialect::PostgreSql);
    let err = pg.select_table::<ParentFilter>().unwrap_err();
    assert!(matches!(
        err,
        OrmError::Query(QueryError::UnregisteredTable { entity: "ParentFilter" })
    ));
}

#[test]
fn test_query_builder_binds_inputs() {
    let pg = catalog(SqlDialect::PostgreSql);
    let filter = ParentFilter {
        value: "x".to_string(),
    };
    let qb = QueryBuilder::new(&pg, &filter).unwrap();
    let sql = format!(
        "SELECT * FROM {} WHERE {} = {} OR {} = {}",
        qb.table::<Parent>().unwrap(),
        qb.column(Parent::VALUE).unwrap(),
        qb.input(ParentFilter::VALUE).unwrap(),
        qb.name(Parent::VALUE),
        qb.input(ParentFilter::VALUE).unwrap()
    );
    let query = qb.build(sql);
    assert_eq!(
        query.sql,
        r#"SELECT * FROM "main"."Parent" WHERE "main"."Parent"."value" = $1 OR "value" = $2"#
    );
    assert_eq!(values(&query), [DatabaseValue::from("x"), DatabaseValue::from("x")]);

    let sql = SqlBuilder::new(&pg);
    assert_eq!(sql.select::<Tag>().unwrap(), r#"SELECT * FROM "main"."Tag""#);
    assert_eq!(sql.delete::<Tag>().unwrap(), r#"DELETE FROM "main"."Tag""#);
    assert_eq!(sql.procedure::<Archive>().unwrap(), r#""main"."Archive""#);
}
