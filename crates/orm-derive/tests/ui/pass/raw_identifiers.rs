use tabula_orm::Entity;

#[derive(Entity)]
struct Token {
    r#type: String,
    r#match: i64,
}

fn main() {
    assert_eq!(Token::TYPE.name(), "type");
    assert_eq!(Token::MATCH.name(), "match");
}
