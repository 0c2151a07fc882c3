mod common;

use common::catalog;
use tabula_orm::{Exporter, SqlDialect};

#[test]
fn test_plant_uml_with_every_column() {
    let catalog = catalog(SqlDialect::Sqlite);
    let diagram = Exporter::new(&catalog).plant_uml(true, true, true);

    let expected = "\
@startuml
skinparam backgroundColor darkgray
skinparam ClassBackgroundColor lightgray

package main <<Folder>> {
\tclass main.Parent {
\t\tpk: i32
\t\tvalue: String
\t}
\tclass main.Child {
\t\tpk: i32
\t\tparent_pk: Parent
\t\tvalue: String
\t\tnote: String
\t}
\tclass main.Tag {
\t\tcode: String
\t\tlabel: String
\t}
}

main.Child -down-> main.Parent: parent_pk

@enduml";
    assert_eq!(diagram, expected);
}

#[test]
fn test_plant_uml_keeps_relationships_without_columns() {
    let catalog = catalog(SqlDialect::Sqlite);
    let diagram = Exporter::new(&catalog).plant_uml(false, false, false);

    assert!(diagram.contains("\tclass main.Child {\n\t}"));
    assert!(diagram.contains("main.Child -down-> main.Parent: parent_pk"));
    assert!(!diagram.contains("value"));
}

#[test]
fn test_db_diagram_io() {
    let catalog = catalog(SqlDialect::PostgreSql);
    let diagram = Exporter::new(&catalog).db_diagram_io(false);

    let expected = "\
Table main.Parent {
\tpk i32 [primary key]
}
Table main.Child {
\tpk i32 [primary key]
\tparent_pk Parent [ref: > main.Parent.pk]
}
Table main.Tag {
\tcode String [primary key]
}

TableGroup main {
\tmain.Parent
\tmain.Child
\tmain.Tag
}";
    assert_eq!(diagram, expected);

    let detailed = Exporter::new(&catalog).db_diagram_io(true);
    assert!(detailed.contains("\tvalue String\n\tnote String\n}"));
    assert!(detailed.contains("\tlabel String\n}"));
}
