use tabula_orm::schema::{FieldRef, FieldValues};
use tabula_orm::Entity;
use tabula_orm::{MappingError, OrmError};

#[derive(Debug, PartialEq, Entity)]
struct Book {
    #[entity(mutable)]
    id: Option<i64>,
    title: String,
    pages: Option<i32>,
}

fn book() -> Book {
    Book {
        id: None,
        title: "Dune".to_string(),
        pages: Some(412),
    }
}

#[test]
fn test_descriptor_lists_fields_in_order() {
    let descriptor = Book::descriptor();
    assert_eq!(descriptor.name, "Book");

    let names: Vec<_> = descriptor.fields.iter().map(|f| f.name).collect();
    assert_eq!(names, ["id", "title", "pages"]);

    let id = descriptor.field("id").unwrap();
    assert!(id.nullable);
    assert!(id.mutable);
    assert_eq!(id.type_id, std::any::TypeId::of::<i64>());

    let title = descriptor.field("title").unwrap();
    assert!(!title.nullable);
    assert!(!title.mutable);
}

#[test]
fn test_getter_reports_null_and_values() {
    let book = book();
    assert!(matches!(book.field("id"), Some(FieldRef::Null)));
    assert_eq!(book.field("title").and_then(|f| f.downcast::<String>()), Some(&"Dune".to_string()));
    assert_eq!(Book::PAGES.get(&book), Some(&412));
    assert!(book.field("missing").is_none());
}

#[test]
fn test_setter_only_touches_mutable_fields() {
    let mut book = book();
    book.set_field("id", Some(Box::new(7_i64))).unwrap();
    assert_eq!(book.id, Some(7));

    book.set_field("id", None).unwrap();
    assert_eq!(book.id, None);

    let err = book.set_field("title", Some(Box::new("Emma".to_string()))).unwrap_err();
    assert!(matches!(err, OrmError::Mapping(MappingError::ImmutableField { .. })));

    let err = book.set_field("id", Some(Box::new("seven"))).unwrap_err();
    assert!(matches!(err, OrmError::Mapping(MappingError::FieldType { .. })));
}

#[test]
fn test_construct_from_values() {
    let mut values = FieldValues::new("Book");
    values.insert("id", Some(Box::new(3_i64)));
    values.insert("title", Some(Box::new("Solaris".to_string())));
    values.insert("pages", None);

    let book = Book::construct(values).unwrap();
    assert_eq!(
        book,
        Book {
            id: Some(3),
            title: "Solaris".to_string(),
            pages: None,
        }
    );
}

#[test]
fn test_construct_rejects_null_required_field() {
    let mut values = FieldValues::new("Book");
    values.insert("id", None);
    values.insert("title", None);
    values.insert("pages", None);

    let err = Book::construct(values).unwrap_err();
    assert!(matches!(
        err,
        OrmError::Mapping(MappingError::UnexpectedNull { field: "title", .. })
    ));
}
