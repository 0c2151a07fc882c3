//! Diagram export of a resolved catalog
//!
//! Tables are emitted in declaration order, grouped by schema.

use crate::catalog::Catalog;
use crate::mapper::TableInfo;

pub struct Exporter<'c> {
    catalog: &'c Catalog,
}

impl<'c> Exporter<'c> {
    pub fn new(catalog: &'c Catalog) -> Self {
        Self { catalog }
    }

    /// [PlantUML](https://plantuml.com/class-diagram) class diagram, one
    /// package per schema and one arrow per foreign key
    pub fn plant_uml(&self, with_primary_key: bool, with_foreign_keys: bool, with_other_columns: bool) -> String {
        let mut text = vec![
            "@startuml".to_string(),
            "skinparam backgroundColor darkgray".to_string(),
            "skinparam ClassBackgroundColor lightgray".to_string(),
            String::new(),
        ];
        let mut relationships = Vec::new();

        for schema in self.catalog.schemas() {
            text.push(format!("package {} <<Folder>> {{", schema));
            for table in self.tables_of(schema) {
                let class = diagram_path(table);
                text.push(format!("\tclass {} {{", class));

                let pk = table.primary_key();
                if with_primary_key {
                    text.push(format!("\t\t{}: {}", pk.name(), pk.field().short_type_name()));
                }
                for fk in table.foreign_keys() {
                    let Some(target) = self.target(fk) else { continue };
                    relationships.push(format!("{} -down-> {}: {}", class, diagram_path(target), fk.name()));
                    if with_foreign_keys {
                        text.push(format!("\t\t{}: {}", fk.name(), target.name()));
                    }
                }
                if with_other_columns {
                    for column in table.other_columns() {
                        text.push(format!("\t\t{}: {}", column.name(), column.field().short_type_name()));
                    }
                }
                text.push("\t}".to_string());
            }
            text.push("}".to_string());
        }

        text.push(String::new());
        text.extend(relationships);
        text.push(String::new());
        text.push("@enduml".to_string());
        text.join("\n")
    }

    /// [dbdiagram.io](https://dbdiagram.io) tables with references and one
    /// table group per schema
    pub fn db_diagram_io(&self, with_other_columns: bool) -> String {
        let mut text = Vec::new();
        let mut groups = Vec::new();

        for schema in self.catalog.schemas() {
            groups.push(format!("TableGroup {} {{", schema));
            for table in self.tables_of(schema) {
                let path = diagram_path(table);
                groups.push(format!("\t{}", path));
                text.push(format!("Table {} {{", path));

                let pk = table.primary_key();
                text.push(format!("\t{} {} [primary key]", pk.name(), pk.field().short_type_name()));
                for fk in table.foreign_keys() {
                    let Some(target) = self.target(fk) else { continue };
                    text.push(format!(
                        "\t{} {} [ref: > {}.{}]",
                        fk.name(),
                        target.name(),
                        diagram_path(target),
                        target.primary_key().name()
                    ));
                }
                if with_other_columns {
                    for column in table.other_columns() {
                        text.push(format!("\t{} {}", column.name(), column.field().short_type_name()));
                    }
                }
                text.push("}".to_string());
            }
            groups.push("}".to_string());
        }

        text.push(String::new());
        text.extend(groups);
        text.join("\n")
    }

    fn tables_of<'s>(&'s self, schema: &'s str) -> impl Iterator<Item = &'c TableInfo> + 's {
        self.catalog
            .mapper()
            .tables()
            .iter()
            .filter(move |t| t.schema() == schema)
    }

    fn target(&self, fk: &crate::mapper::Column) -> Option<&'c TableInfo> {
        fk.foreign_table().and_then(|id| self.catalog.mapper().table_by_id(id))
    }
}

fn diagram_path(table: &TableInfo) -> String {
    format!("{}.{}", table.schema(), table.name())
}
