use tabula_orm::schema::Field;
use tabula_orm::Entity;

#[derive(Debug, Entity)]
pub struct Author {
    #[entity(mutable)]
    pub id: Option<i32>,
    pub name: String,
    pub nickname: Option<String>,
}

fn main() {
    let id: Field<Author, i32> = Author::ID;
    let name: Field<Author, String> = Author::NAME;
    assert_eq!(id.name(), "id");
    assert_eq!(name.name(), "name");
    assert_eq!(Author::descriptor().fields.len(), 3);
}
